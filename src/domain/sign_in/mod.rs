//! Usage: Sign-in orchestration for the authentication screen.
//!
//! `SignInCoordinator` owns the only mutable state (active provider + last error);
//! provider flows, credential exchange and the host presentation surface are
//! injected through the traits in `gateway`.

mod coordinator;
mod error;
mod gateway;
mod provider;

pub use coordinator::{
    ProviderButtonState, SignInCoordinator, SignInGateways, SignInOutcome, SignInProgress,
    SignInSnapshot,
};
pub use error::{
    SignInError, INVALID_CALLBACK_MESSAGE, NOT_CONFIGURED_MESSAGE,
    PRESENTATION_UNAVAILABLE_MESSAGE, TOKEN_MISSING_MESSAGE, TOKEN_REJECTED_MESSAGE,
    UNEXPECTED_FAILURE_MESSAGE, USER_CANCELLED_MESSAGE,
};
pub use gateway::{
    AuthBridge, AuthSession, BoxFuture, GatewayOutcome, IdentityProviderGateway,
    PresentationHost, PresentationSurface, ProviderCredential,
};
pub use provider::SignInProvider;
