//! Usage: Wires settings into a ready-to-use `SignInCoordinator` handle.

use crate::domain::sign_in::{
    AuthBridge, PresentationHost, SignInCoordinator, SignInGateways, SignInProvider,
};
use crate::gateway::http_client::build_http_client;
use crate::gateway::identity_toolkit::FirebaseAuthBridge;
use crate::gateway::oauth::adapters::line::CustomTokenClient;
use crate::gateway::oauth::adapters::{AppleGateway, GoogleGateway, LineGateway};
use crate::gateway::oauth::flow::OAuthLoopbackFlow;
use crate::gateway::oauth::providers::OAuthClient;
use crate::infra::settings::SignInSettings;
use crate::shared::error::AppResult;
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub settings: SignInSettings,
    pub coordinator: Arc<SignInCoordinator>,
}

impl AppState {
    /// Builds the production gateways (loopback OAuth + Identity Toolkit bridge).
    pub fn from_settings(
        settings: SignInSettings,
        host: Arc<dyn PresentationHost>,
    ) -> AppResult<Self> {
        let http = build_http_client(settings.http_connect_timeout_seconds)?;
        let bridge: Arc<dyn AuthBridge> =
            Arc::new(FirebaseAuthBridge::new(http.clone(), &settings.firebase));
        let callback_timeout = Duration::from_secs(u64::from(settings.callback_timeout_seconds));
        let flow =
            |client: OAuthClient| OAuthLoopbackFlow::new(client, http.clone(), callback_timeout);

        let gateways = SignInGateways {
            google: Arc::new(GoogleGateway::new(flow(OAuthClient::from_settings(
                SignInProvider::Google,
                &settings.google,
            )))),
            apple: Arc::new(AppleGateway::new(
                flow(OAuthClient::from_settings(SignInProvider::Apple, &settings.apple)),
                Arc::clone(&host),
                Arc::clone(&bridge),
            )),
            line: Arc::new(LineGateway::new(
                flow(OAuthClient::from_line_settings(&settings.line)),
                Arc::clone(&host),
                Arc::clone(&bridge),
                CustomTokenClient::new(http.clone(), settings.line.custom_token_url.clone()),
            )),
        };

        for provider in SignInProvider::ALL {
            if !is_configured(&settings, provider) {
                tracing::warn!(provider = %provider, "client id not configured; sign-in will fail");
            }
        }

        let coordinator = SignInCoordinator::new(gateways, bridge, host)?;
        Ok(Self {
            settings,
            coordinator: Arc::new(coordinator),
        })
    }
}

fn is_configured(settings: &SignInSettings, provider: SignInProvider) -> bool {
    match provider {
        SignInProvider::Google => settings.google.is_configured(),
        SignInProvider::Apple => settings.apple.is_configured(),
        SignInProvider::Line => !settings.line.channel_id.trim().is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::presentation::StaticPresentationHost;

    #[test]
    fn default_settings_build_an_idle_coordinator() {
        let state = AppState::from_settings(
            SignInSettings::default(),
            Arc::new(StaticPresentationHost::new(None)),
        )
        .expect("app state");
        assert!(!state.coordinator.is_busy());
        assert_eq!(state.coordinator.last_error(), None);
    }

    #[tokio::test]
    async fn unconfigured_client_surfaces_provider_failure() {
        let state = AppState::from_settings(
            SignInSettings::default(),
            Arc::new(StaticPresentationHost::console()),
        )
        .expect("app state");
        let outcome = state.coordinator.start_google_sign_in().await;
        assert_eq!(outcome, crate::domain::sign_in::SignInOutcome::Failed);
        assert!(!state.coordinator.is_busy());
        assert_eq!(
            state.coordinator.last_error().as_deref(),
            Some(crate::domain::sign_in::NOT_CONFIGURED_MESSAGE)
        );
    }
}
