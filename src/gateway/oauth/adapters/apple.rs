//! Usage: Sign in with Apple gateway.
//!
//! Specializations:
//! - No PKCE; a nonce binds the ID token to this attempt
//! - Presents on the host surface itself and exchanges through the bridge internally

use crate::domain::sign_in::{
    AuthBridge, BoxFuture, GatewayOutcome, IdentityProviderGateway, PresentationHost,
    PresentationSurface, ProviderCredential, SignInError, SignInProvider,
};
use crate::gateway::oauth::flow::OAuthLoopbackFlow;
use std::sync::Arc;

pub struct AppleGateway {
    flow: OAuthLoopbackFlow,
    host: Arc<dyn PresentationHost>,
    bridge: Arc<dyn AuthBridge>,
}

impl AppleGateway {
    pub(crate) fn new(
        flow: OAuthLoopbackFlow,
        host: Arc<dyn PresentationHost>,
        bridge: Arc<dyn AuthBridge>,
    ) -> Self {
        Self { flow, host, bridge }
    }
}

impl IdentityProviderGateway for AppleGateway {
    fn provider(&self) -> SignInProvider {
        SignInProvider::Apple
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

            let id_token = authorization
                .tokens
                .id_token
                .ok_or(SignInError::TokenMissing)?;
            let mut credential = ProviderCredential::new(SignInProvider::Apple)
                .with_id_token(id_token)
                .with_access_token(authorization.tokens.access_token);
            credential.nonce = authorization.nonce;

            let session = self
                .bridge
                .complete_sign_in(credential)
                .await
                .map_err(SignInError::exchange)?;
            Ok(GatewayOutcome::Session(session))
        })
    }
}
