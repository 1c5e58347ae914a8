//! Usage: Google sign-in gateway.
//!
//! Specializations:
//! - Needs the host-supplied presentation surface (checked by the coordinator)
//! - Returns the raw ID/access token pair; the coordinator exchanges it
//! - Access tokens are expected in `ya29.*` form

use crate::domain::sign_in::{
    BoxFuture, GatewayOutcome, IdentityProviderGateway, PresentationSurface, ProviderCredential,
    SignInError, SignInProvider,
};
use crate::gateway::oauth::flow::OAuthLoopbackFlow;
use std::sync::Arc;

pub struct GoogleGateway {
    flow: OAuthLoopbackFlow,
}

impl GoogleGateway {
    pub(crate) fn new(flow: OAuthLoopbackFlow) -> Self {
        Self { flow }
    }
}

impl IdentityProviderGateway for GoogleGateway {
    fn provider(&self) -> SignInProvider {
        SignInProvider::Google
    }

    fn requires_presentation_surface(&self) -> bool {
        true
    }

    fn authenticate(
        &self,
        surface: Option<Arc<dyn PresentationSurface>>,
    ) -> BoxFuture<'_, Result<GatewayOutcome, SignInError>> {
        Box::pin(async move {
            let surface = surface.ok_or(SignInError::PresentationUnavailable)?;
            let authorization = self.flow.run(surface.as_ref()).await?;
            let tokens = authorization.tokens;

            if !tokens.access_token.trim().starts_with("ya29.") {
                tracing::warn!("google access token is not ya29.*; exchange may be rejected");
            }

            let mut credential = ProviderCredential::new(SignInProvider::Google)
                .with_access_token(tokens.access_token);
            credential.id_token = tokens.id_token;
            Ok(GatewayOutcome::Credential(credential))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::oauth::providers::{OAuthClient, GOOGLE_ENDPOINTS};
    use std::time::Duration;

    fn gateway() -> GoogleGateway {
        let client = OAuthClient {
            endpoints: &GOOGLE_ENDPOINTS,
            client_id: "123.apps.googleusercontent.com".to_string(),
            client_secret: None,
            callback_port: 0,
            auth_url: GOOGLE_ENDPOINTS.auth_url.to_string(),
            token_url: GOOGLE_ENDPOINTS.token_url.to_string(),
        };
        GoogleGateway::new(OAuthLoopbackFlow::new(
            client,
            reqwest::Client::new(),
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn google_gateway_requires_host_surface() {
        let gateway = gateway();
        assert_eq!(gateway.provider(), SignInProvider::Google);
        assert!(gateway.requires_presentation_surface());
    }

    #[tokio::test]
    async fn missing_surface_fails_before_any_network_io() {
        let err = gateway()
            .authenticate(None)
            .await
            .expect_err("should fail");
        assert_eq!(err, SignInError::PresentationUnavailable);
    }
}
