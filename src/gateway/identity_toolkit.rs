//! Usage: `AuthBridge` backed by the Identity Toolkit REST API (Firebase Auth).
//!
//! - `accounts:signInWithIdp` exchanges a provider ID/access token
//! - `accounts:signInWithCustomToken` signs in with a backend-minted token
//!
//! Rejections are mapped to presentable Japanese messages; raw bodies are only
//! logged, with token-like fields masked.

use crate::domain::sign_in::{
    AuthBridge, AuthSession, BoxFuture, ProviderCredential, SignInProvider,
};
use crate::gateway::oauth::token_exchange::sanitize_oauth_error_body_snippet;
use crate::infra::settings::FirebaseSettings;
use crate::shared::error::AppResult;
use crate::shared::time::now_unix_seconds;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const UNREADABLE_RESPONSE: &str =
    "AUTH_EXCHANGE_FAILED: 認証サーバーの応答を読み取れませんでした";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithCustomTokenRequest<'a> {
    token: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SignInResponse {
    local_id: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
}

pub struct FirebaseAuthBridge {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    request_uri: String,
}

impl FirebaseAuthBridge {
    pub fn new(http: reqwest::Client, settings: &FirebaseSettings) -> Self {
        Self {
            http,
            base_url: settings
                .identity_toolkit_base_url
                .trim()
                .trim_end_matches('/')
                .to_string(),
            api_key: settings.api_key.trim().to_string(),
            request_uri: settings.request_uri.trim().to_string(),
        }
    }

    fn endpoint(&self, method: &str) -> AppResult<Url> {
        if self.api_key.is_empty() {
            return Err("CONFIG_MISSING: firebase api key is not configured"
                .to_string()
                .into());
        }
        let mut url = Url::parse(&format!("{}/accounts:{method}", self.base_url))
            .map_err(|e| format!("SYSTEM_ERROR: invalid identity toolkit url: {e}"))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        method: &'static str,
        provider: SignInProvider,
        body: &B,
    ) -> AppResult<SignInResponse> {
        let url = self.endpoint(method)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(
                    provider = %provider,
                    method,
                    "identity toolkit request failed: {e}"
                );
                "AUTH_EXCHANGE_FAILED: ログインサーバーに接続できませんでした".to_string()
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::warn!(
                provider = %provider,
                method,
                "identity toolkit response read failed: {e}"
            );
            UNREADABLE_RESPONSE.to_string()
        })?;

        if !status.is_success() {
            tracing::warn!(
                provider = %provider,
                method,
                status = status.as_u16(),
                body = %sanitize_oauth_error_body_snippet(&text),
                "identity toolkit rejected sign-in"
            );
            let code = parse_error_code(&text).unwrap_or_default();
            return Err(format!("AUTH_EXCHANGE_REJECTED: {}", rejection_message(&code)).into());
        }

        serde_json::from_str::<SignInResponse>(&text).map_err(|e| {
            tracing::warn!(
                provider = %provider,
                method,
                "identity toolkit response json invalid: {e}"
            );
            UNREADABLE_RESPONSE.into()
        })
    }
}

impl AuthBridge for FirebaseAuthBridge {
    fn complete_sign_in(
        &self,
        credential: ProviderCredential,
    ) -> BoxFuture<'_, AppResult<AuthSession>> {
        Box::pin(async move {
            let provider = credential.provider;
            let request = SignInWithIdpRequest {
                post_body: idp_post_body(&credential)?,
                request_uri: &self.request_uri,
                return_secure_token: true,
                return_idp_credential: true,
            };
            let response = self.post("signInWithIdp", provider, &request).await?;
            session_from_response(provider, response)
        })
    }

    fn sign_in_with_custom_token(
        &self,
        provider: SignInProvider,
        custom_token: String,
    ) -> BoxFuture<'_, AppResult<AuthSession>> {
        Box::pin(async move {
            let request = SignInWithCustomTokenRequest {
                token: &custom_token,
                return_secure_token: true,
            };
            let response = self
                .post("signInWithCustomToken", provider, &request)
                .await?;
            session_from_response(provider, response)
        })
    }
}

/// `application/x-www-form-urlencoded` body expected in `postBody`.
fn idp_post_body(credential: &ProviderCredential) -> AppResult<String> {
    let mut scratch = Url::parse("http://localhost/")
        .map_err(|e| format!("SYSTEM_ERROR: form encoder init failed: {e}"))?;
    {
        let mut pairs = scratch.query_pairs_mut();
        if let Some(id_token) = credential.id_token() {
            pairs.append_pair("id_token", id_token);
        }
        if let Some(access_token) = credential.access_token() {
            pairs.append_pair("access_token", access_token);
        }
        if let Some(nonce) = credential.nonce.as_deref() {
            pairs.append_pair("nonce", nonce);
        }
        pairs.append_pair("providerId", credential.provider.identity_toolkit_id());
    }
    Ok(scratch.query().unwrap_or_default().to_string())
}

fn session_from_response(
    provider: SignInProvider,
    response: SignInResponse,
) -> AppResult<AuthSession> {
    let id_token = response
        .id_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            "AUTH_EXCHANGE_FAILED: 認証サーバーの応答にトークンが含まれていません".to_string()
        })?;
    let user_id = response
        .local_id
        .filter(|v| !v.trim().is_empty())
        .or_else(|| jwt_subject(&id_token))
        .ok_or_else(|| {
            "AUTH_EXCHANGE_FAILED: 認証サーバーの応答にユーザーIDが含まれていません".to_string()
        })?;
    let expires_at = response
        .expires_in
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| now_unix_seconds().saturating_add(v));

    Ok(AuthSession {
        provider,
        user_id,
        email: response.email.filter(|v| !v.trim().is_empty()),
        display_name: response.display_name.filter(|v| !v.trim().is_empty()),
        id_token,
        refresh_token: response.refresh_token.filter(|v| !v.trim().is_empty()),
        expires_at,
    })
}

/// Reads `user_id`/`sub` from an ID token payload; the signature is not checked.
fn jwt_subject(id_token: &str) -> Option<String> {
    let payload = id_token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;
    claims
        .get("user_id")
        .or_else(|| claims.get("sub"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_error_code(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?;
    // e.g. "INVALID_IDP_RESPONSE : Invalid Idp Response: id_token audience mismatch"
    let code = message.split(':').next()?.trim();
    (!code.is_empty()).then(|| code.to_string())
}

fn rejection_message(code: &str) -> &'static str {
    match code {
        "INVALID_IDP_RESPONSE" | "INVALID_ID_TOKEN" | "INVALID_CUSTOM_TOKEN"
        | "CREDENTIAL_MISMATCH" => "認証情報を確認できませんでした。もう一度お試しください",
        "USER_DISABLED" => "このアカウントは無効化されています",
        "OPERATION_NOT_ALLOWED" => "このログイン方法は現在利用できません",
        "FEDERATED_USER_ID_ALREADY_LINKED" | "EMAIL_EXISTS" => {
            "このアカウントは別のログイン方法で登録されています"
        }
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "しばらく時間をおいてからもう一度お試しください",
        _ => "ログインに失敗しました",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn decode_form(raw: &str) -> HashMap<String, String> {
        Url::parse(&format!("http://localhost/?{raw}"))
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn post_body_carries_tokens_and_provider_id() {
        let credential = ProviderCredential::new(SignInProvider::Google)
            .with_id_token("eyJ.a+b.c")
            .with_access_token("ya29.x");
        let form = decode_form(&idp_post_body(&credential).unwrap());
        assert_eq!(form["id_token"], "eyJ.a+b.c");
        assert_eq!(form["access_token"], "ya29.x");
        assert_eq!(form["providerId"], "google.com");
        assert!(!form.contains_key("nonce"));
    }

    #[test]
    fn apple_post_body_includes_nonce() {
        let credential = ProviderCredential::new(SignInProvider::Apple)
            .with_id_token("eyJ.p.s")
            .with_nonce("raw-nonce");
        let form = decode_form(&idp_post_body(&credential).unwrap());
        assert_eq!(form["providerId"], "apple.com");
        assert_eq!(form["nonce"], "raw-nonce");
    }

    #[test]
    fn error_code_is_extracted_from_message_prefix() {
        let body = r#"{"error":{"code":400,"message":"INVALID_IDP_RESPONSE : audience mismatch","errors":[]}}"#;
        assert_eq!(parse_error_code(body).as_deref(), Some("INVALID_IDP_RESPONSE"));
        assert_eq!(parse_error_code("not json"), None);
        assert_eq!(
            rejection_message("USER_DISABLED"),
            "このアカウントは無効化されています"
        );
        assert_eq!(rejection_message("SOMETHING_NEW"), "ログインに失敗しました");
    }

    #[test]
    fn custom_token_sessions_take_user_id_from_token_claims() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"user_id":"line:U123","sub":"ignored"}"#);
        let id_token = format!("eyJhbGciOiJSUzI1NiJ9.{payload}.sig");
        let session = session_from_response(
            SignInProvider::Line,
            SignInResponse {
                id_token: Some(id_token),
                refresh_token: Some("rt".into()),
                expires_in: Some("3600".into()),
                ..SignInResponse::default()
            },
        )
        .expect("session");
        assert_eq!(session.user_id, "line:U123");
        assert!(session.expires_at.is_some());
        assert_eq!(session.refresh_token.as_deref(), Some("rt"));
    }

    #[test]
    fn response_without_id_token_is_rejected() {
        let err = session_from_response(
            SignInProvider::Google,
            SignInResponse {
                local_id: Some("uid".into()),
                ..SignInResponse::default()
            },
        )
        .expect_err("should fail");
        assert_eq!(err.code(), "AUTH_EXCHANGE_FAILED");
    }

    #[test]
    fn missing_api_key_fails_fast() {
        let bridge = FirebaseAuthBridge::new(reqwest::Client::new(), &FirebaseSettings::default());
        let err = bridge.endpoint("signInWithIdp").expect_err("should fail");
        assert_eq!(err.code(), "CONFIG_MISSING");
    }
}
