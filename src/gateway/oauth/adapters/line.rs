//! Usage: LINE Login gateway.
//!
//! The auth backend does not federate LINE directly: the LINE access token is
//! posted to the configured custom-token endpoint, and the returned custom
//! token is signed in through the bridge.

use crate::domain::sign_in::{
    AuthBridge, BoxFuture, GatewayOutcome, IdentityProviderGateway, PresentationHost,
    PresentationSurface, SignInError, SignInProvider,
};
use crate::gateway::identity_toolkit::UNREADABLE_RESPONSE;
use crate::gateway::oauth::flow::OAuthLoopbackFlow;
use crate::gateway::oauth::token_exchange::sanitize_oauth_error_body_snippet;
use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomTokenRequest<'a> {
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomTokenResponse {
    #[serde(default, alias = "custom_token", alias = "token")]
    custom_token: Option<String>,
}

pub(crate) struct CustomTokenClient {
    http: reqwest::Client,
    url: String,
}

impl CustomTokenClient {
    pub(crate) fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// `Ok(None)` when the backend answered but carried no token.
    async fn mint(
        &self,
        access_token: &str,
        id_token: Option<&str>,
        nonce: Option<&str>,
    ) -> AppResult<Option<String>> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err("CONFIG_MISSING: LINE custom token endpoint is not configured"
                .to_string()
                .into());
        }

        let response = self
            .http
            .post(url)
            .json(&CustomTokenRequest {
                access_token,
                id_token,
                nonce,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("line custom token request failed: {e}");
                "AUTH_EXCHANGE_FAILED: ログインサーバーに接続できませんでした".to_string()
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::warn!("line custom token response read failed: {e}");
            UNREADABLE_RESPONSE.to_string()
        })?;
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                body = %sanitize_oauth_error_body_snippet(&body),
                "line custom token endpoint rejected access token"
            );
            return Err(format!(
                "AUTH_EXCHANGE_REJECTED: LINEアカウントを確認できませんでした (status {})",
                status.as_u16()
            )
            .into());
        }

        let parsed: CustomTokenResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("line custom token response json invalid: {e}");
            UNREADABLE_RESPONSE.to_string()
        })?;
        Ok(parsed
            .custom_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}

pub struct LineGateway {
    flow: OAuthLoopbackFlow,
    host: Arc<dyn PresentationHost>,
    bridge: Arc<dyn AuthBridge>,
    custom_tokens: CustomTokenClient,
}

impl LineGateway {
    pub(crate) fn new(
        flow: OAuthLoopbackFlow,
        host: Arc<dyn PresentationHost>,
        bridge: Arc<dyn AuthBridge>,
        custom_tokens: CustomTokenClient,
    ) -> Self {
        Self {
            flow,
            host,
            bridge,
            custom_tokens,
        }
    }
}

impl IdentityProviderGateway for LineGateway {
    fn provider(&self) -> SignInProvider {
        SignInProvider::Line
    }

    fn authenticate(
        &self,
        _surface: Option<Arc<dyn PresentationSurface>>,
    ) -> BoxFuture<'_, Result<GatewayOutcome, SignInError>> {
        Box::pin(async move {
            let surface = self
                .host
                .presentation_surface()
                .ok_or(SignInError::PresentationUnavailable)?;
            let authorization = self.flow.run(surface.as_ref()).await?;
            let tokens = &authorization.tokens;

            let custom_token = self
                .custom_tokens
                .mint(
                    &tokens.access_token,
                    tokens.id_token.as_deref(),
                    authorization.nonce.as_deref(),
                )
                .await
                .map_err(SignInError::exchange)?
                .ok_or(SignInError::TokenMissing)?;

            let session = self
                .bridge
                .sign_in_with_custom_token(SignInProvider::Line, custom_token)
                .await
                .map_err(SignInError::exchange)?;
            Ok(GatewayOutcome::Session(session))
        })
    }
}
