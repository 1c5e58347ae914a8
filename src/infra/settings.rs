//! Usage: Sign-in settings (TOML schema, defaults, sanitising and env overrides).

use crate::shared::error::AppResult;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_SETTINGS_FILE_NAME: &str = "deepnote-signin.toml";
pub const SETTINGS_PATH_ENV: &str = "DEEPNOTE_SIGNIN_CONFIG";
pub const DEFAULT_IDENTITY_TOOLKIT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_IDP_REQUEST_URI: &str = "http://localhost";
pub const DEFAULT_CALLBACK_TIMEOUT_SECONDS: u32 = 300;
const MIN_CALLBACK_TIMEOUT_SECONDS: u32 = 10;
const MAX_CALLBACK_TIMEOUT_SECONDS: u32 = 30 * 60;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECONDS: u32 = 10;
const MAX_HTTP_CONNECT_TIMEOUT_SECONDS: u32 = 120;
pub const DEFAULT_GOOGLE_CALLBACK_PORT: u16 = 8085;
pub const DEFAULT_APPLE_CALLBACK_PORT: u16 = 8086;
pub const DEFAULT_LINE_CALLBACK_PORT: u16 = 8087;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_RETENTION_DAYS: u32 = 7;
const MAX_LOG_RETENTION_DAYS: u32 = 90;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseSettings {
    pub api_key: String,
    pub identity_toolkit_base_url: String,
    // `requestUri` sent with signInWithIdp; must be an authorized domain of the project.
    pub request_uri: String,
}

impl Default for FirebaseSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            identity_toolkit_base_url: DEFAULT_IDENTITY_TOOLKIT_BASE_URL.to_string(),
            request_uri: DEFAULT_IDP_REQUEST_URI.to_string(),
        }
    }
}

/// `[google]` / `[apple]` table. A table that omits `callback_port` keeps that
/// provider's default port; `0` asks for a dynamic one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuthClientSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub callback_port: u16,
    /// Replaces the provider's authorize endpoint (staging, local emulators).
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
}

impl OAuthClientSettings {
    fn with_port(callback_port: u16) -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            callback_port,
            auth_url: None,
            token_url: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty()
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct OAuthClientTable {
    client_id: String,
    client_secret: Option<String>,
    callback_port: Option<u16>,
    auth_url: Option<String>,
    token_url: Option<String>,
}

impl OAuthClientTable {
    fn into_settings(self, default_port: u16) -> OAuthClientSettings {
        OAuthClientSettings {
            client_id: self.client_id,
            client_secret: self.client_secret,
            callback_port: self.callback_port.unwrap_or(default_port),
            auth_url: self.auth_url,
            token_url: self.token_url,
        }
    }
}

fn google_client<'de, D: Deserializer<'de>>(d: D) -> Result<OAuthClientSettings, D::Error> {
    OAuthClientTable::deserialize(d).map(|t| t.into_settings(DEFAULT_GOOGLE_CALLBACK_PORT))
}

fn apple_client<'de, D: Deserializer<'de>>(d: D) -> Result<OAuthClientSettings, D::Error> {
    OAuthClientTable::deserialize(d).map(|t| t.into_settings(DEFAULT_APPLE_CALLBACK_PORT))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    pub channel_id: String,
    pub channel_secret: Option<String>,
    pub callback_port: u16,
    // Backend endpoint that turns a LINE access token into a custom auth token.
    pub custom_token_url: String,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            channel_secret: None,
            callback_port: DEFAULT_LINE_CALLBACK_PORT,
            custom_token_url: String::new(),
            auth_url: None,
            token_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
    pub retention_days: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
            retention_days: DEFAULT_LOG_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignInSettings {
    pub schema_version: u32,
    pub firebase: FirebaseSettings,
    #[serde(deserialize_with = "google_client")]
    pub google: OAuthClientSettings,
    #[serde(deserialize_with = "apple_client")]
    pub apple: OAuthClientSettings,
    pub line: LineSettings,
    pub callback_timeout_seconds: u32,
    pub http_connect_timeout_seconds: u32,
    pub logging: LoggingSettings,
}

impl Default for SignInSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            firebase: FirebaseSettings::default(),
            google: OAuthClientSettings::with_port(DEFAULT_GOOGLE_CALLBACK_PORT),
            apple: OAuthClientSettings::with_port(DEFAULT_APPLE_CALLBACK_PORT),
            line: LineSettings::default(),
            callback_timeout_seconds: DEFAULT_CALLBACK_TIMEOUT_SECONDS,
            http_connect_timeout_seconds: DEFAULT_HTTP_CONNECT_TIMEOUT_SECONDS,
            logging: LoggingSettings::default(),
        }
    }
}

/// Settings file location: `$DEEPNOTE_SIGNIN_CONFIG`, else `./deepnote-signin.toml`.
pub fn default_path() -> PathBuf {
    std::env::var_os(SETTINGS_PATH_ENV)
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE_NAME))
}

/// Read settings from `path`; a missing file yields defaults. Env overrides are applied
/// after parsing, sanitising last.
pub fn read(path: &Path) -> AppResult<SignInSettings> {
    let mut settings = if path.exists() {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            format!(
                "SYSTEM_ERROR: failed to read settings {}: {e}",
                path.display()
            )
        })?;
        parse(&raw)?
    } else {
        tracing::debug!(path = %path.display(), "settings file not found; using defaults");
        SignInSettings::default()
    };

    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    if sanitize(&mut settings) {
        tracing::info!(path = %path.display(), "settings sanitized");
    }
    Ok(settings)
}

pub fn parse(raw: &str) -> AppResult<SignInSettings> {
    toml::from_str::<SignInSettings>(raw)
        .map_err(|e| format!("SEC_INVALID_INPUT: invalid settings toml: {e}").into())
}

pub fn write(path: &Path, settings: &SignInSettings) -> AppResult<()> {
    let encoded = toml::to_string_pretty(settings)
        .map_err(|e| format!("SYSTEM_ERROR: failed to encode settings: {e}"))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encoded).map_err(|e| {
        format!(
            "SYSTEM_ERROR: failed to write settings {}: {e}",
            path.display()
        )
    })?;
    Ok(())
}

/// Secrets are usually injected through the environment rather than the file.
pub(crate) fn apply_overrides(
    settings: &mut SignInSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = get("DEEPNOTE_FIREBASE_API_KEY") {
        settings.firebase.api_key = v;
    }
    if let Some(v) = get("DEEPNOTE_IDENTITY_TOOLKIT_BASE_URL") {
        settings.firebase.identity_toolkit_base_url = v;
    }
    if let Some(v) = get("DEEPNOTE_GOOGLE_CLIENT_ID") {
        settings.google.client_id = v;
    }
    if let Some(v) = get("DEEPNOTE_GOOGLE_CLIENT_SECRET") {
        settings.google.client_secret = Some(v);
    }
    if let Some(v) = get("DEEPNOTE_APPLE_CLIENT_ID") {
        settings.apple.client_id = v;
    }
    if let Some(v) = get("DEEPNOTE_APPLE_CLIENT_SECRET") {
        settings.apple.client_secret = Some(v);
    }
    if let Some(v) = get("DEEPNOTE_LINE_CHANNEL_ID") {
        settings.line.channel_id = v;
    }
    if let Some(v) = get("DEEPNOTE_LINE_CHANNEL_SECRET") {
        settings.line.channel_secret = Some(v);
    }
    if let Some(v) = get("DEEPNOTE_LINE_CUSTOM_TOKEN_URL") {
        settings.line.custom_token_url = v;
    }
}

fn sanitize_timeouts(settings: &mut SignInSettings) -> bool {
    let mut changed = false;

    if settings.callback_timeout_seconds == 0 {
        settings.callback_timeout_seconds = DEFAULT_CALLBACK_TIMEOUT_SECONDS;
        changed = true;
    }
    let clamped = settings
        .callback_timeout_seconds
        .clamp(MIN_CALLBACK_TIMEOUT_SECONDS, MAX_CALLBACK_TIMEOUT_SECONDS);
    if clamped != settings.callback_timeout_seconds {
        settings.callback_timeout_seconds = clamped;
        changed = true;
    }

    if settings.http_connect_timeout_seconds == 0 {
        settings.http_connect_timeout_seconds = DEFAULT_HTTP_CONNECT_TIMEOUT_SECONDS;
        changed = true;
    }
    if settings.http_connect_timeout_seconds > MAX_HTTP_CONNECT_TIMEOUT_SECONDS {
        settings.http_connect_timeout_seconds = MAX_HTTP_CONNECT_TIMEOUT_SECONDS;
        changed = true;
    }

    changed
}

fn sanitize_urls(settings: &mut SignInSettings) -> bool {
    let mut changed = false;

    let base = settings.firebase.identity_toolkit_base_url.trim();
    let normalized = if base.is_empty() {
        DEFAULT_IDENTITY_TOOLKIT_BASE_URL.to_string()
    } else {
        base.trim_end_matches('/').to_string()
    };
    if normalized != settings.firebase.identity_toolkit_base_url {
        settings.firebase.identity_toolkit_base_url = normalized;
        changed = true;
    }

    if settings.firebase.request_uri.trim().is_empty() {
        settings.firebase.request_uri = DEFAULT_IDP_REQUEST_URI.to_string();
        changed = true;
    }

    changed
}

fn sanitize_optionals(settings: &mut SignInSettings) -> bool {
    let mut changed = false;
    for secret in [
        &mut settings.google.client_secret,
        &mut settings.apple.client_secret,
        &mut settings.line.channel_secret,
        &mut settings.google.auth_url,
        &mut settings.google.token_url,
        &mut settings.apple.auth_url,
        &mut settings.apple.token_url,
        &mut settings.line.auth_url,
        &mut settings.line.token_url,
    ] {
        if secret.as_deref().is_some_and(|v| v.trim().is_empty()) {
            *secret = None;
            changed = true;
        }
    }
    changed
}

fn sanitize_logging(settings: &mut SignInSettings) -> bool {
    let mut changed = false;
    if settings.logging.level.trim().is_empty() {
        settings.logging.level = DEFAULT_LOG_LEVEL.to_string();
        changed = true;
    }
    if settings.logging.retention_days == 0 {
        settings.logging.retention_days = DEFAULT_LOG_RETENTION_DAYS;
        changed = true;
    }
    if settings.logging.retention_days > MAX_LOG_RETENTION_DAYS {
        settings.logging.retention_days = MAX_LOG_RETENTION_DAYS;
        changed = true;
    }
    changed
}

/// Returns `true` when anything was rewritten.
pub(crate) fn sanitize(settings: &mut SignInSettings) -> bool {
    let mut changed = false;
    if settings.schema_version == 0 {
        settings.schema_version = SCHEMA_VERSION;
        changed = true;
    }
    changed |= sanitize_timeouts(settings);
    changed |= sanitize_urls(settings);
    changed |= sanitize_optionals(settings);
    changed |= sanitize_logging(settings);
    changed
}
