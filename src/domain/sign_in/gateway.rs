//! Usage: Collaborator seams of the sign-in coordinator.
//!
//! Each provider flow implements `IdentityProviderGateway`; credential exchange
//! goes through `AuthBridge`; the host application supplies the surface the
//! interactive flow is shown on through `PresentationHost`. All traits are
//! object-safe so the coordinator can hold them as `Arc<dyn ...>`.

use super::error::SignInError;
use super::provider::SignInProvider;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Provider-issued proof of identity, not yet exchanged for a session.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredential {
    pub provider: SignInProvider,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub nonce: Option<String>,
}

impl ProviderCredential {
    pub fn new(provider: SignInProvider) -> Self {
        Self {
            provider,
            id_token: None,
            access_token: None,
            nonce: None,
        }
    }

    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Trimmed ID token, `None` when absent or blank.
    pub fn id_token(&self) -> Option<&str> {
        non_blank(self.id_token.as_deref())
    }

    pub fn access_token(&self) -> Option<&str> {
        non_blank(self.access_token.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("provider", &self.provider)
            .field("id_token", &self.id_token.as_deref().map(mask_token))
            .field("access_token", &self.access_token.as_deref().map(mask_token))
            .field("nonce", &self.nonce.is_some())
            .finish()
    }
}

/// Application session returned by the auth bridge. Never persisted here.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    pub provider: SignInProvider,
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub id_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("provider", &self.provider)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("id_token", &mask_token(&self.id_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Credential the coordinator still has to exchange through the bridge.
    Credential(ProviderCredential),
    /// The gateway already exchanged its credential internally.
    Session(AuthSession),
}

/// Host UI context an interactive flow is shown on.
pub trait PresentationSurface: Send + Sync {
    fn present(&self, url: &str) -> AppResult<()>;
}

pub trait PresentationHost: Send + Sync {
    /// `None` when the host currently has nothing to present on.
    fn presentation_surface(&self) -> Option<Arc<dyn PresentationSurface>>;
}

pub trait IdentityProviderGateway: Send + Sync {
    fn provider(&self) -> SignInProvider;

    /// Whether the coordinator must obtain a host surface before calling `authenticate`.
    fn requires_presentation_surface(&self) -> bool {
        false
    }

    fn authenticate(
        &self,
        surface: Option<Arc<dyn PresentationSurface>>,
    ) -> BoxFuture<'_, Result<GatewayOutcome, SignInError>>;
}

pub trait AuthBridge: Send + Sync {
    /// Exchange a provider credential for an application session.
    fn complete_sign_in(&self, credential: ProviderCredential)
        -> BoxFuture<'_, AppResult<AuthSession>>;

    /// Sign in with a backend-minted custom token (providers the backend federates itself).
    fn sign_in_with_custom_token(
        &self,
        provider: SignInProvider,
        custom_token: String,
    ) -> BoxFuture<'_, AppResult<AuthSession>>;
}
