//! Usage: Public test helpers for integration tests (scripted collaborators).

use crate::domain::sign_in::{
    AuthBridge, AuthSession, BoxFuture, GatewayOutcome, IdentityProviderGateway,
    PresentationSurface, ProviderCredential, SignInError, SignInProvider,
};
use crate::shared::error::{AppError, AppResult};
use crate::shared::mutex_ext::MutexExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

pub fn session_for(provider: SignInProvider) -> AuthSession {
    AuthSession {
        provider,
        user_id: format!("uid-{}", provider.as_key()),
        email: Some(format!("{}@example.com", provider.as_key())),
        display_name: None,
        id_token: "session-id-token".to_string(),
        refresh_token: Some("session-refresh-token".to_string()),
        expires_at: None,
    }
}

/// Gateway that replays queued outcomes. An empty queue yields a `ProviderFailure`.
pub struct ScriptedGateway {
    provider: SignInProvider,
    requires_surface: bool,
    script: Mutex<VecDeque<Result<GatewayOutcome, SignInError>>>,
    calls: AtomicUsize,
    surfaces_seen: AtomicUsize,
    entered: Notify,
    gate: Option<Semaphore>,
}

impl ScriptedGateway {
    pub fn new(provider: SignInProvider) -> Self {
        Self {
            provider,
            requires_surface: false,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            surfaces_seen: AtomicUsize::new(0),
            entered: Notify::new(),
            gate: None,
        }
    }

    pub fn requiring_surface(mut self) -> Self {
        self.requires_surface = true;
        self
    }

    /// `authenticate` blocks after being entered until `release` is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn then(self, outcome: Result<GatewayOutcome, SignInError>) -> Self {
        self.push(outcome);
        self
    }

    pub fn push(&self, outcome: Result<GatewayOutcome, SignInError>) {
        self.script.lock_or_recover().push_back(outcome);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls that received a presentation surface.
    pub fn surfaces_seen(&self) -> usize {
        self.surfaces_seen.load(Ordering::SeqCst)
    }

    /// Resolves once `authenticate` has been entered (at most one pending wakeup is stored).
    pub async fn entered(&self) {
        self.entered.notified().await;
    }
}

impl IdentityProviderGateway for ScriptedGateway {
    fn provider(&self) -> SignInProvider {
        self.provider
    }

    fn requires_presentation_surface(&self) -> bool {
        self.requires_surface
    }

    fn authenticate(
        &self,
        surface: Option<Arc<dyn PresentationSurface>>,
    ) -> BoxFuture<'_, Result<GatewayOutcome, SignInError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if surface.is_some() {
                self.surfaces_seen.fetch_add(1, Ordering::SeqCst);
            }
            self.entered.notify_one();

            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }

            self.script.lock_or_recover().pop_front().unwrap_or_else(|| {
                Err(SignInError::ProviderFailure(format!(
                    "no scripted outcome for {}",
                    self.provider
                )))
            })
        })
    }
}

/// Bridge that records every exchange and answers with a canned session or error.
#[derive(Default)]
pub struct RecordingBridge {
    failure: Option<AppError>,
    credentials: Mutex<Vec<ProviderCredential>>,
    custom_tokens: Mutex<Vec<(SignInProvider, String)>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every exchange fails with `message` (surfaced verbatim as `ExchangeFailed`).
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(AppError::new("AUTH_EXCHANGE_REJECTED", message)),
            ..Self::default()
        }
    }

    pub fn credentials(&self) -> Vec<ProviderCredential> {
        self.credentials.lock_or_recover().clone()
    }

    pub fn custom_tokens(&self) -> Vec<(SignInProvider, String)> {
        self.custom_tokens.lock_or_recover().clone()
    }

    fn answer(&self, provider: SignInProvider) -> AppResult<AuthSession> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(session_for(provider)),
        }
    }
}

impl AuthBridge for RecordingBridge {
    fn complete_sign_in(
        &self,
        credential: ProviderCredential,
    ) -> BoxFuture<'_, AppResult<AuthSession>> {
        Box::pin(async move {
            let provider = credential.provider;
            self.credentials.lock_or_recover().push(credential);
            self.answer(provider)
        })
    }

    fn sign_in_with_custom_token(
        &self,
        provider: SignInProvider,
        custom_token: String,
    ) -> BoxFuture<'_, AppResult<AuthSession>> {
        Box::pin(async move {
            self.custom_tokens
                .lock_or_recover()
                .push((provider, custom_token));
            self.answer(provider)
        })
    }
}

/// Surface that remembers presented URLs instead of opening them.
#[derive(Default)]
pub struct RecordingSurface {
    urls: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock_or_recover().clone()
    }
}

impl PresentationSurface for RecordingSurface {
    fn present(&self, url: &str) -> AppResult<()> {
        self.urls.lock_or_recover().push(url.to_string());
        Ok(())
    }
}
