//! Usage: Interactive authorization-code flow shared by every provider gateway.
//!
//! bind loopback listener -> present authorize URL -> wait for redirect ->
//! exchange code. Suspends only while the user is on the provider's page and
//! during the token request.

use super::callback_server::{CallbackListener, CALLBACK_TIMEOUT_CODE};
use super::pkce::PkcePair;
use super::providers::OAuthClient;
use super::token_exchange::{self, OAuthTokenSet, TokenExchangeRequest};
use crate::domain::sign_in::{PresentationSurface, SignInError};
use crate::shared::security::random_hex;
use std::time::Duration;

/// Callback `error` values that mean the user backed out of the consent page.
const CANCEL_ERROR_CODES: &[&str] = &["access_denied", "user_cancelled_authorize", "user_cancel"];

#[derive(Debug)]
pub(crate) struct LoopbackAuthorization {
    pub(crate) tokens: OAuthTokenSet,
    pub(crate) nonce: Option<String>,
}

pub(crate) struct OAuthLoopbackFlow {
    client: OAuthClient,
    http: reqwest::Client,
    callback_timeout: Duration,
}

impl OAuthLoopbackFlow {
    pub(crate) fn new(
        client: OAuthClient,
        http: reqwest::Client,
        callback_timeout: Duration,
    ) -> Self {
        Self {
            client,
            http,
            callback_timeout,
        }
    }

    pub(crate) async fn run(
        &self,
        surface: &dyn PresentationSurface,
    ) -> Result<LoopbackAuthorization, SignInError> {
        let endpoints = self.client.endpoints;
        let provider = endpoints.provider;
        self.client
            .ensure_configured()
            .map_err(SignInError::provider)?;

        let pkce = PkcePair::generate();
        let state = random_hex(32);
        let nonce = endpoints.sends_nonce.then(|| random_hex(16));

        let listener = CallbackListener::bind(self.client.callback_port)
            .await
            .map_err(SignInError::provider)?;
        let redirect_uri = self.client.redirect_uri(listener.port());
        let auth_url = self
            .client
            .authorize_url(
                &redirect_uri,
                &state,
                Some(&pkce.code_challenge),
                nonce.as_deref(),
            )
            .map_err(SignInError::provider)?;

        // The listener is already bound, so a fast redirect queues in the backlog.
        if let Err(err) = surface.present(&auth_url) {
            tracing::warn!(provider = %provider, "failed to present sign-in page: {err}");
            return Err(SignInError::PresentationUnavailable);
        }
        tracing::debug!(
            provider = %provider,
            port = listener.port(),
            "waiting for oauth redirect"
        );

        let payload = listener
            .wait_for_redirect(endpoints.callback_path, &state, self.callback_timeout)
            .await
            .map_err(|err| {
                if err.code() == CALLBACK_TIMEOUT_CODE {
                    tracing::info!(
                        provider = %provider,
                        "oauth redirect never arrived; treating as cancelled"
                    );
                    SignInError::UserCancelled
                } else {
                    SignInError::provider(err)
                }
            })?;

        if let Some(error) = payload.error.as_deref() {
            return Err(callback_error(
                provider.display_name(),
                error,
                payload.error_description.as_deref(),
            ));
        }
        let code = payload.code.ok_or_else(|| {
            SignInError::ProviderFailure(format!(
                "{}から認可コードを受け取れませんでした",
                provider.display_name()
            ))
        })?;

        let tokens = token_exchange::exchange_authorization_code(
            &self.http,
            &TokenExchangeRequest {
                token_uri: self.client.token_url.clone(),
                client_id: self.client.client_id.clone(),
                client_secret: self.client.client_secret.clone(),
                code,
                redirect_uri,
                code_verifier: endpoints.supports_pkce.then(|| pkce.code_verifier),
            },
        )
        .await
        .map_err(SignInError::provider)?;

        Ok(LoopbackAuthorization { tokens, nonce })
    }
}

fn callback_error(provider_name: &str, error: &str, description: Option<&str>) -> SignInError {
    let error = error.trim();
    if CANCEL_ERROR_CODES
        .iter()
        .any(|code| code.eq_ignore_ascii_case(error))
    {
        return SignInError::UserCancelled;
    }
    let detail = description
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(error);
    SignInError::ProviderFailure(format!("{provider_name}でのログインに失敗しました: {detail}"))
}
