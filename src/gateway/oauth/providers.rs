//! Usage: Provider-specific OAuth endpoint, scope and authorize-parameter tables.

use crate::domain::sign_in::SignInProvider;
use crate::infra::settings::{LineSettings, OAuthClientSettings};
use crate::shared::error::AppResult;
use crate::shared::security::sha256_hex;

#[derive(Debug, Clone, Copy)]
pub(crate) struct OAuthEndpoints {
    pub(crate) provider: SignInProvider,
    pub(crate) auth_url: &'static str,
    pub(crate) token_url: &'static str,
    pub(crate) scopes: &'static [&'static str],
    pub(crate) redirect_host: &'static str,
    pub(crate) callback_path: &'static str,
    pub(crate) supports_pkce: bool,
    pub(crate) sends_nonce: bool,
    // Authorize request carries SHA-256(nonce); the raw value goes to the auth backend.
    pub(crate) hashes_nonce: bool,
    pub(crate) extra_authorize_params: &'static [(&'static str, &'static str)],
}

pub(crate) const GOOGLE_ENDPOINTS: OAuthEndpoints = OAuthEndpoints {
    provider: SignInProvider::Google,
    auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    scopes: &["openid", "email", "profile"],
    redirect_host: "127.0.0.1",
    callback_path: "/oauth2callback",
    supports_pkce: true,
    sends_nonce: false,
    hashes_nonce: false,
    extra_authorize_params: &[("prompt", "select_account")],
};

// Apple only allows `response_mode=query` when no name/email scope is requested.
pub(crate) const APPLE_ENDPOINTS: OAuthEndpoints = OAuthEndpoints {
    provider: SignInProvider::Apple,
    auth_url: "https://appleid.apple.com/auth/authorize",
    token_url: "https://appleid.apple.com/auth/token",
    scopes: &[],
    redirect_host: "localhost",
    callback_path: "/apple/callback",
    supports_pkce: false,
    sends_nonce: true,
    hashes_nonce: true,
    extra_authorize_params: &[("response_mode", "query")],
};

pub(crate) const LINE_ENDPOINTS: OAuthEndpoints = OAuthEndpoints {
    provider: SignInProvider::Line,
    auth_url: "https://access.line.me/oauth2/v2.1/authorize",
    token_url: "https://api.line.me/oauth2/v2.1/token",
    scopes: &["openid", "profile"],
    redirect_host: "localhost",
    callback_path: "/line/callback",
    supports_pkce: true,
    sends_nonce: true,
    hashes_nonce: false,
    extra_authorize_params: &[("bot_prompt", "normal")],
};

pub(crate) fn endpoints_for(provider: SignInProvider) -> &'static OAuthEndpoints {
    match provider {
        SignInProvider::Google => &GOOGLE_ENDPOINTS,
        SignInProvider::Apple => &APPLE_ENDPOINTS,
        SignInProvider::Line => &LINE_ENDPOINTS,
    }
}

/// Endpoint table plus the client registration loaded from settings.
#[derive(Debug, Clone)]
pub(crate) struct OAuthClient {
    pub(crate) endpoints: &'static OAuthEndpoints,
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) callback_port: u16,
    pub(crate) auth_url: String,
    pub(crate) token_url: String,
}

fn endpoint_or(configured: Option<&str>, fallback: &str) -> String {
    configured
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl OAuthClient {
    pub(crate) fn new(endpoints: &'static OAuthEndpoints, client_id: &str) -> Self {
        Self {
            endpoints,
            client_id: client_id.trim().to_string(),
            client_secret: None,
            callback_port: 0,
            auth_url: endpoints.auth_url.to_string(),
            token_url: endpoints.token_url.to_string(),
        }
    }

    pub(crate) fn from_settings(
        provider: SignInProvider,
        settings: &OAuthClientSettings,
    ) -> Self {
        let endpoints = endpoints_for(provider);
        Self {
            client_secret: settings.client_secret.clone(),
            callback_port: settings.callback_port,
            auth_url: endpoint_or(settings.auth_url.as_deref(), endpoints.auth_url),
            token_url: endpoint_or(settings.token_url.as_deref(), endpoints.token_url),
            ..Self::new(endpoints, &settings.client_id)
        }
    }

    pub(crate) fn from_line_settings(settings: &LineSettings) -> Self {
        Self {
            client_secret: settings.channel_secret.clone(),
            callback_port: settings.callback_port,
            auth_url: endpoint_or(settings.auth_url.as_deref(), LINE_ENDPOINTS.auth_url),
            token_url: endpoint_or(settings.token_url.as_deref(), LINE_ENDPOINTS.token_url),
            ..Self::new(&LINE_ENDPOINTS, &settings.channel_id)
        }
    }

    pub(crate) fn ensure_configured(&self) -> AppResult<()> {
        if self.client_id.is_empty() {
            return Err(format!(
                "CONFIG_MISSING: {} client id is not configured",
                self.endpoints.provider.display_name()
            )
            .into());
        }
        Ok(())
    }

    pub(crate) fn redirect_uri(&self, port: u16) -> String {
        format!(
            "http://{}:{port}{}",
            self.endpoints.redirect_host, self.endpoints.callback_path
        )
    }

    pub(crate) fn authorize_url(
        &self,
        redirect_uri: &str,
        state: &str,
        code_challenge: Option<&str>,
        nonce: Option<&str>,
    ) -> AppResult<String> {
        let cfg = self.endpoints;
        let mut url = reqwest::Url::parse(&self.auth_url)
            .map_err(|e| format!("SYSTEM_ERROR: invalid oauth auth url: {e}"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            if !cfg.scopes.is_empty() {
                query.append_pair("scope", &cfg.scopes.join(" "));
            }
            query.append_pair("state", state);
            if let Some(challenge) = code_challenge.filter(|_| cfg.supports_pkce) {
                query.append_pair("code_challenge", challenge);
                query.append_pair("code_challenge_method", "S256");
            }
            if let Some(nonce) = nonce.filter(|_| cfg.sends_nonce) {
                if cfg.hashes_nonce {
                    query.append_pair("nonce", &sha256_hex(nonce));
                } else {
                    query.append_pair("nonce", nonce);
                }
            }
            for (key, value) in cfg.extra_authorize_params {
                query.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }
}
