//! Sign-in orchestration for DeepNote: Google, Apple and LINE identity
//! providers behind a single-flight coordinator, exchanged for an application
//! session through the Identity Toolkit REST API.

mod app;
mod domain;
mod gateway;
mod infra;
mod shared;
pub mod test_support;

pub use app::app_state::AppState;
pub use app::logging;
pub use domain::sign_in::{
    AuthBridge, AuthSession, BoxFuture, GatewayOutcome, IdentityProviderGateway,
    PresentationHost, PresentationSurface, ProviderButtonState, ProviderCredential,
    SignInCoordinator, SignInError, SignInGateways, SignInOutcome, SignInProgress,
    SignInProvider, SignInSnapshot, INVALID_CALLBACK_MESSAGE, NOT_CONFIGURED_MESSAGE,
    PRESENTATION_UNAVAILABLE_MESSAGE, TOKEN_MISSING_MESSAGE, TOKEN_REJECTED_MESSAGE,
    UNEXPECTED_FAILURE_MESSAGE, USER_CANCELLED_MESSAGE,
};
pub use gateway::identity_toolkit::FirebaseAuthBridge;
pub use gateway::presentation::{
    ConsoleSurface, StaticPresentationHost, SystemBrowser, SystemBrowserHost,
};
pub use infra::settings;
pub use infra::settings::SignInSettings;
pub use shared::error::{AppError, AppResult};
