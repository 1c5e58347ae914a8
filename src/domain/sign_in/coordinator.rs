//! Usage: Sign-in coordinator (single in-flight attempt across all identity providers).
//!
//! State machine: `Idle` <-> `Attempting(provider)`. A start request made while
//! any attempt is outstanding is dropped without side effects. The
//! idle-check-and-transition runs under one lock before the first `.await`, so
//! two near-simultaneous starts are serialized and the second one is ignored.
//! Every accepted attempt settles back to `Idle` exactly once: explicitly on
//! completion, or through `AttemptGuard::drop` when the future is abandoned.

use super::error::SignInError;
use super::gateway::{
    AuthBridge, AuthSession, GatewayOutcome, IdentityProviderGateway, PresentationHost,
};
use super::provider::SignInProvider;
use crate::shared::error::AppResult;
use crate::shared::mutex_ext::MutexExt;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Observable state of the sign-in screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignInSnapshot {
    pub active_provider: Option<SignInProvider>,
    pub last_error: Option<String>,
}

/// How a provider's sign-in button should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderButtonState {
    pub loading: bool,
    pub enabled: bool,
}

impl SignInSnapshot {
    pub fn is_busy(&self) -> bool {
        self.active_provider.is_some()
    }

    /// Spinner only on the active provider; every button disabled while busy.
    pub fn button_state(&self, provider: SignInProvider) -> ProviderButtonState {
        ProviderButtonState {
            loading: self.active_provider == Some(provider),
            enabled: !self.is_busy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SignInProgress {
    Started {
        provider: SignInProvider,
    },
    AwaitingUser {
        provider: SignInProvider,
    },
    Exchanging {
        provider: SignInProvider,
    },
    Completed {
        provider: SignInProvider,
    },
    Failed {
        provider: SignInProvider,
        kind: &'static str,
    },
    Ignored {
        provider: SignInProvider,
        active: SignInProvider,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// Another attempt was in flight; nothing happened.
    Ignored,
    SignedIn(AuthSession),
    /// The failure message is available through `SignInSnapshot::last_error`.
    Failed,
}

/// One gateway per supported provider.
#[derive(Clone)]
pub struct SignInGateways {
    pub google: Arc<dyn IdentityProviderGateway>,
    pub apple: Arc<dyn IdentityProviderGateway>,
    pub line: Arc<dyn IdentityProviderGateway>,
}

impl SignInGateways {
    fn get(&self, provider: SignInProvider) -> &Arc<dyn IdentityProviderGateway> {
        match provider {
            SignInProvider::Google => &self.google,
            SignInProvider::Apple => &self.apple,
            SignInProvider::Line => &self.line,
        }
    }

    fn validate(&self) -> AppResult<()> {
        for provider in SignInProvider::ALL {
            let registered = self.get(provider).provider();
            if registered != provider {
                return Err(format!(
                    "SEC_INVALID_INPUT: gateway registered for {provider} reports {registered}"
                )
                .into());
            }
        }
        Ok(())
    }
}

struct SharedState {
    snapshot: Mutex<SignInSnapshot>,
    state_tx: watch::Sender<SignInSnapshot>,
    progress_tx: broadcast::Sender<SignInProgress>,
}

impl SharedState {
    fn emit(&self, event: SignInProgress) {
        let _ = self.progress_tx.send(event);
    }

    fn settle(&self, provider: SignInProvider, error: Option<String>) {
        let mut snapshot = self.snapshot.lock_or_recover();
        if snapshot.active_provider != Some(provider) {
            tracing::error!(
                provider = %provider,
                active = ?snapshot.active_provider,
                "sign-in attempt settled while another provider was active"
            );
        }
        snapshot.active_provider = None;
        if let Some(message) = error {
            snapshot.last_error = Some(message);
        }
        self.state_tx.send_replace(snapshot.clone());
    }
}

/// Accepted attempt. Returns the coordinator to `Idle` when settled or dropped.
struct AttemptGuard {
    shared: Arc<SharedState>,
    provider: SignInProvider,
    settled: bool,
}

impl AttemptGuard {
    fn succeed(mut self) {
        self.settled = true;
        self.shared.settle(self.provider, None);
    }

    fn fail(mut self, err: &SignInError) {
        self.settled = true;
        self.shared.settle(self.provider, Some(err.user_message()));
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(
                provider = %self.provider,
                "sign-in attempt abandoned before completion"
            );
            self.shared.settle(self.provider, None);
        }
    }
}

pub struct SignInCoordinator {
    shared: Arc<SharedState>,
    gateways: SignInGateways,
    bridge: Arc<dyn AuthBridge>,
    host: Arc<dyn PresentationHost>,
}

impl SignInCoordinator {
    pub fn new(
        gateways: SignInGateways,
        bridge: Arc<dyn AuthBridge>,
        host: Arc<dyn PresentationHost>,
    ) -> AppResult<Self> {
        gateways.validate()?;
        let (state_tx, _) = watch::channel(SignInSnapshot::default());
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Ok(Self {
            shared: Arc::new(SharedState {
                snapshot: Mutex::new(SignInSnapshot::default()),
                state_tx,
                progress_tx,
            }),
            gateways,
            bridge,
            host,
        })
    }

    pub fn snapshot(&self) -> SignInSnapshot {
        self.shared.snapshot.lock_or_recover().clone()
    }

    pub fn active_provider(&self) -> Option<SignInProvider> {
        self.shared.snapshot.with_locked(|s| s.active_provider)
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.snapshot.with_locked(|s| s.last_error.clone())
    }

    pub fn is_busy(&self) -> bool {
        self.active_provider().is_some()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SignInSnapshot> {
        self.shared.state_tx.subscribe()
    }

    pub fn progress(&self) -> broadcast::Receiver<SignInProgress> {
        self.shared.progress_tx.subscribe()
    }

    pub async fn start_google_sign_in(&self) -> SignInOutcome {
        self.sign_in(SignInProvider::Google).await
    }

    pub async fn start_apple_sign_in(&self) -> SignInOutcome {
        self.sign_in(SignInProvider::Apple).await
    }

    pub async fn start_line_sign_in(&self) -> SignInOutcome {
        self.sign_in(SignInProvider::Line).await
    }

    /// Run one attempt for `provider`, or return `Ignored` if any attempt is in flight.
    pub async fn sign_in(&self, provider: SignInProvider) -> SignInOutcome {
        match self.try_begin(provider) {
            Some(guard) => self.run_attempt(guard).await,
            None => SignInOutcome::Ignored,
        }
    }

    /// Decide accept/reject on the calling context, then run the accepted attempt as a
    /// tokio task. Must be called from within a tokio runtime.
    pub fn spawn_sign_in(
        self: &Arc<Self>,
        provider: SignInProvider,
    ) -> Option<JoinHandle<SignInOutcome>> {
        let guard = self.try_begin(provider)?;
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.run_attempt(guard).await }))
    }

    fn try_begin(&self, provider: SignInProvider) -> Option<AttemptGuard> {
        let mut snapshot = self.shared.snapshot.lock_or_recover();
        if let Some(active) = snapshot.active_provider {
            drop(snapshot);
            tracing::debug!(
                provider = %provider,
                active = %active,
                "sign-in already in flight; start ignored"
            );
            self.shared.emit(SignInProgress::Ignored { provider, active });
            return None;
        }
        snapshot.active_provider = Some(provider);
        self.shared.state_tx.send_replace(snapshot.clone());
        drop(snapshot);

        Some(AttemptGuard {
            shared: Arc::clone(&self.shared),
            provider,
            settled: false,
        })
    }

    async fn run_attempt(&self, guard: AttemptGuard) -> SignInOutcome {
        let provider = guard.provider;
        let started = Instant::now();
        tracing::info!(provider = %provider, "sign-in started");
        self.shared.emit(SignInProgress::Started { provider });

        match self.attempt(provider).await {
            Ok(session) => {
                guard.succeed();
                tracing::info!(
                    provider = %provider,
                    user_id = %session.user_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sign-in completed"
                );
                self.shared.emit(SignInProgress::Completed { provider });
                SignInOutcome::SignedIn(session)
            }
            Err(err) => {
                guard.fail(&err);
                tracing::warn!(
                    provider = %provider,
                    kind = err.kind(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sign-in failed: {err}"
                );
                self.shared.emit(SignInProgress::Failed {
                    provider,
                    kind: err.kind(),
                });
                SignInOutcome::Failed
            }
        }
    }

    async fn attempt(&self, provider: SignInProvider) -> Result<AuthSession, SignInError> {
        let gateway = self.gateways.get(provider);
        let surface = if gateway.requires_presentation_surface() {
            let surface = self
                .host
                .presentation_surface()
                .ok_or(SignInError::PresentationUnavailable)?;
            Some(surface)
        } else {
            None
        };

        self.shared.emit(SignInProgress::AwaitingUser { provider });
        match gateway.authenticate(surface).await? {
            GatewayOutcome::Session(session) => Ok(session),
            GatewayOutcome::Credential(credential) => {
                if credential.id_token().is_none() {
                    return Err(SignInError::TokenMissing);
                }
                self.shared.emit(SignInProgress::Exchanging { provider });
                self.bridge
                    .complete_sign_in(credential)
                    .await
                    .map_err(SignInError::exchange)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_snapshot_enables_every_button() {
        let snapshot = SignInSnapshot::default();
        assert!(!snapshot.is_busy());
        for provider in SignInProvider::ALL {
            assert_eq!(
                snapshot.button_state(provider),
                ProviderButtonState {
                    loading: false,
                    enabled: true
                }
            );
        }
    }

    #[test]
    fn busy_snapshot_disables_all_buttons_and_spins_only_active_one() {
        let snapshot = SignInSnapshot {
            active_provider: Some(SignInProvider::Apple),
            last_error: None,
        };
        assert!(snapshot.is_busy());
        assert_eq!(
            snapshot.button_state(SignInProvider::Apple),
            ProviderButtonState {
                loading: true,
                enabled: false
            }
        );
        assert_eq!(
            snapshot.button_state(SignInProvider::Google),
            ProviderButtonState {
                loading: false,
                enabled: false
            }
        );
    }

    #[test]
    fn progress_events_serialize_with_step_tag() {
        let event = SignInProgress::Failed {
            provider: SignInProvider::Line,
            kind: "user_cancelled",
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["step"], "failed");
        assert_eq!(json["provider"], "line");
        assert_eq!(json["kind"], "user_cancelled");
    }
}
