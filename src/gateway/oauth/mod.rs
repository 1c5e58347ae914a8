//! Usage: OAuth authorization-code flow helpers for interactive provider sign-in.
//!
//! Each provider is described by a static `OAuthEndpoints` table; the adapters
//! wrap `OAuthLoopbackFlow` and implement `IdentityProviderGateway`.

pub(crate) mod adapters;
pub(crate) mod callback_server;
pub(crate) mod flow;
pub(crate) mod pkce;
pub(crate) mod providers;
pub(crate) mod token_exchange;
