#![allow(dead_code)]

use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use deepnote_signin_lib::test_support::{RecordingBridge, RecordingSurface, ScriptedGateway};
use deepnote_signin_lib::{
    GatewayOutcome, PresentationSurface, ProviderCredential, SignInCoordinator, SignInGateways,
    SignInProvider, StaticPresentationHost,
};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Restores touched environment variables on drop. Hold `env_lock()` while using it.
#[derive(Default)]
pub struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn save_once(&mut self, key: &'static str) {
        if self.saved.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.saved.push((key, std::env::var_os(key)));
    }

    pub fn set_var(&mut self, key: &'static str, value: impl Into<OsString>) {
        self.save_once(key);
        std::env::set_var(key, value.into());
    }

    pub fn remove_var(&mut self, key: &'static str) {
        self.save_once(key);
        std::env::remove_var(key);
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

pub fn google_credential(id_token: Option<&str>) -> GatewayOutcome {
    let mut credential =
        ProviderCredential::new(SignInProvider::Google).with_access_token("ya29.test-access");
    if let Some(token) = id_token {
        credential = credential.with_id_token(token);
    }
    GatewayOutcome::Credential(credential)
}

/// Coordinator wired to scripted gateways, a recording bridge and an optional surface.
pub struct Harness {
    pub coordinator: Arc<SignInCoordinator>,
    pub google: Arc<ScriptedGateway>,
    pub apple: Arc<ScriptedGateway>,
    pub line: Arc<ScriptedGateway>,
    pub bridge: Arc<RecordingBridge>,
    pub surface: Arc<RecordingSurface>,
}

pub struct HarnessBuilder {
    google: ScriptedGateway,
    apple: ScriptedGateway,
    line: ScriptedGateway,
    bridge: RecordingBridge,
    with_surface: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            google: ScriptedGateway::new(SignInProvider::Google).requiring_surface(),
            apple: ScriptedGateway::new(SignInProvider::Apple),
            line: ScriptedGateway::new(SignInProvider::Line),
            bridge: RecordingBridge::new(),
            with_surface: true,
        }
    }

    pub fn google(mut self, f: impl FnOnce(ScriptedGateway) -> ScriptedGateway) -> Self {
        self.google = f(self.google);
        self
    }

    pub fn apple(mut self, f: impl FnOnce(ScriptedGateway) -> ScriptedGateway) -> Self {
        self.apple = f(self.apple);
        self
    }

    pub fn line(mut self, f: impl FnOnce(ScriptedGateway) -> ScriptedGateway) -> Self {
        self.line = f(self.line);
        self
    }

    pub fn bridge(mut self, bridge: RecordingBridge) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn without_surface(mut self) -> Self {
        self.with_surface = false;
        self
    }

    pub fn build(self) -> Harness {
        let google = Arc::new(self.google);
        let apple = Arc::new(self.apple);
        let line = Arc::new(self.line);
        let bridge = Arc::new(self.bridge);
        let surface = Arc::new(RecordingSurface::default());

        let host = if self.with_surface {
            StaticPresentationHost::new(Some(surface.clone() as Arc<dyn PresentationSurface>))
        } else {
            StaticPresentationHost::new(None)
        };

        let coordinator = SignInCoordinator::new(
            SignInGateways {
                google: google.clone(),
                apple: apple.clone(),
                line: line.clone(),
            },
            bridge.clone(),
            Arc::new(host),
        )
        .expect("coordinator");

        Harness {
            coordinator: Arc::new(coordinator),
            google,
            apple,
            line,
            bridge,
            surface,
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
