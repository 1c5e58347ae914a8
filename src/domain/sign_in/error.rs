//! Usage: Sign-in failure taxonomy; `Display` is the message shown on the sign-in screen.

use crate::shared::error::AppError;

pub const PRESENTATION_UNAVAILABLE_MESSAGE: &str = "ログイン画面を取得できませんでした";
pub const TOKEN_MISSING_MESSAGE: &str = "認証トークンを取得できませんでした";
pub const USER_CANCELLED_MESSAGE: &str = "ログインがキャンセルされました";
pub const NOT_CONFIGURED_MESSAGE: &str = "ログインの設定が完了していません";
pub const INVALID_CALLBACK_MESSAGE: &str =
    "ログインの応答を確認できませんでした。もう一度お試しください";
pub const TOKEN_REJECTED_MESSAGE: &str =
    "認証サーバーがログインを受け付けませんでした。もう一度お試しください";
pub const UNEXPECTED_FAILURE_MESSAGE: &str =
    "ログイン中にエラーが発生しました。もう一度お試しください";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignInError {
    /// The host could not supply a surface to show the interactive flow on.
    #[error("{}", PRESENTATION_UNAVAILABLE_MESSAGE)]
    PresentationUnavailable,
    /// The provider completed but returned no usable identity token.
    #[error("{}", TOKEN_MISSING_MESSAGE)]
    TokenMissing,
    /// The backend rejected the provider credential.
    #[error("{0}")]
    ExchangeFailed(String),
    #[error("{}", USER_CANCELLED_MESSAGE)]
    UserCancelled,
    /// Anything else raised inside a gateway.
    #[error("{0}")]
    ProviderFailure(String),
}

/// Screen text for an infrastructure error code. The raw message stays in the logs.
fn localized(code: &str) -> &'static str {
    match code {
        "CONFIG_MISSING" => NOT_CONFIGURED_MESSAGE,
        "SEC_INVALID_INPUT" => INVALID_CALLBACK_MESSAGE,
        "OAUTH_TOKEN_REJECTED" => TOKEN_REJECTED_MESSAGE,
        _ => UNEXPECTED_FAILURE_MESSAGE,
    }
}

impl SignInError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PresentationUnavailable => "presentation_unavailable",
            Self::TokenMissing => "token_missing",
            Self::ExchangeFailed(_) => "exchange_failed",
            Self::UserCancelled => "user_cancelled",
            Self::ProviderFailure(_) => "provider_failure",
        }
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// `AUTH_EXCHANGE_*` messages are written for the screen already.
    pub(crate) fn exchange(err: AppError) -> Self {
        match err.code() {
            "AUTH_EXCHANGE_REJECTED" | "AUTH_EXCHANGE_FAILED" => {
                Self::ExchangeFailed(err.message().to_string())
            }
            code => {
                tracing::warn!(code, "credential exchange failed: {}", err.message());
                Self::ExchangeFailed(localized(code).to_string())
            }
        }
    }

    pub(crate) fn provider(err: AppError) -> Self {
        tracing::warn!(code = err.code(), "sign-in flow failed: {}", err.message());
        Self::ProviderFailure(localized(err.code()).to_string())
    }
}
