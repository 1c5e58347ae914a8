//! Usage: Authorization-code redemption at the provider's token endpoint.

use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use serde::Deserialize;
use serde_json::Value;

const ERROR_DETAIL_MAX_CHARS: usize = 240;
const LOG_SNIPPET_MAX_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub(crate) struct TokenExchangeRequest {
    pub(crate) token_uri: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) code: String,
    pub(crate) redirect_uri: String,
    pub(crate) code_verifier: Option<String>,
}

impl TokenExchangeRequest {
    fn form(&self) -> Vec<(&'static str, &str)> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", self.code.trim()),
            ("redirect_uri", self.redirect_uri.trim()),
            ("client_id", self.client_id.trim()),
        ];
        let optional = [
            ("code_verifier", self.code_verifier.as_deref()),
            ("client_secret", self.client_secret.as_deref()),
        ];
        for (key, value) in optional {
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                form.push((key, value));
            }
        }
        form
    }
}

#[derive(Clone)]
pub(crate) struct OAuthTokenSet {
    pub(crate) access_token: String,
    pub(crate) id_token: Option<String>,
}

impl std::fmt::Debug for OAuthTokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenSet")
            .field("access_token", &mask_token(&self.access_token))
            .field("id_token", &self.id_token.as_deref().map(mask_token))
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenResponse {
    access_token: Option<String>,
    id_token: Option<String>,
}

/// RFC 6749 §5.2 error body; Google-style nested `{"error": {...}}` objects too.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenErrorResponse {
    error: Option<Value>,
    error_description: Option<String>,
}

pub(crate) async fn exchange_authorization_code(
    client: &reqwest::Client,
    req: &TokenExchangeRequest,
) -> AppResult<OAuthTokenSet> {
    let response = client
        .post(req.token_uri.trim())
        .form(&req.form())
        .send()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: oauth token exchange request failed: {e}"))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: oauth token response read failed: {e}"))?;
    parse_token_response(status, &body)
}

pub(crate) fn parse_token_response(status: u16, body: &str) -> AppResult<OAuthTokenSet> {
    if !(200..300).contains(&status) {
        tracing::warn!(
            status,
            body = %sanitize_oauth_error_body_snippet(body),
            "oauth token endpoint rejected authorization code"
        );
        return Err(rejection(status, body).into());
    }

    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| format!("SYSTEM_ERROR: oauth token response json invalid: {e}"))?;

    let access_token = non_blank(parsed.access_token)
        .ok_or_else(|| "SYSTEM_ERROR: oauth token response missing access_token".to_string())?;
    Ok(OAuthTokenSet {
        access_token,
        id_token: non_blank(parsed.id_token),
    })
}

fn rejection(status: u16, body: &str) -> String {
    let details: TokenErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let (code, nested_message) = match details.error {
        Some(Value::String(code)) => (Some(code), None),
        Some(Value::Object(obj)) => {
            let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
            (text("code").or_else(|| text("status")), text("message"))
        }
        _ => (None, None),
    };

    let mut msg = format!("OAUTH_TOKEN_REJECTED: token endpoint returned status={status}");
    if let Some(code) = non_blank(code) {
        msg.push_str(&format!(" code={code}"));
    }
    if let Some(detail) = non_blank(details.error_description).or(non_blank(nested_message)) {
        let detail: String = detail.chars().take(ERROR_DETAIL_MAX_CHARS).collect();
        msg.push_str(&format!(" message={detail}"));
    }
    msg
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn masks_value(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    key == "code" || key.contains("token") || key.contains("secret")
}

fn mask_sensitive_fields(value: &mut Value) {
    match value {
        Value::Object(map) => map.iter_mut().for_each(|(key, nested)| match nested {
            Value::String(raw) if masks_value(key) => *raw = mask_token(raw),
            _ => mask_sensitive_fields(nested),
        }),
        Value::Array(items) => items.iter_mut().for_each(mask_sensitive_fields),
        _ => {}
    }
}

/// Bounded, token-masked rendering of an error body for logs.
pub(crate) fn sanitize_oauth_error_body_snippet(body: &str) -> String {
    let rendered = match serde_json::from_str::<Value>(body) {
        Ok(mut value) => {
            mask_sensitive_fields(&mut value);
            value.to_string()
        }
        Err(_) => body.to_string(),
    };
    rendered.chars().take(LOG_SNIPPET_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_response_yields_tokens() {
        let body = r#"{"access_token":"ya29.abc","id_token":"eyJ.x.y","expires_in":"3599"}"#;
        let set = parse_token_response(200, body).expect("token set");
        assert_eq!(set.access_token, "ya29.abc");
        assert_eq!(set.id_token.as_deref(), Some("eyJ.x.y"));
    }

    #[test]
    fn blank_id_token_is_dropped() {
        let body = r#"{"access_token":"at","id_token":"  ","expires_in":3600}"#;
        let set = parse_token_response(200, body).expect("token set");
        assert_eq!(set.id_token, None);
    }

    #[test]
    fn missing_access_token_is_an_error() {
        let err = parse_token_response(200, r#"{"id_token":"eyJ"}"#).expect_err("should fail");
        assert!(err.message().contains("missing access_token"));
    }

    #[test]
    fn rejected_grant_reports_oauth_error_fields() {
        let err = parse_token_response(
            400,
            r#"{"error":"invalid_grant","error_description":"Bad Request"}"#,
        )
        .expect_err("should fail");
        assert_eq!(err.code(), "OAUTH_TOKEN_REJECTED");
        assert!(err.message().contains("code=invalid_grant"));
        assert!(err.message().contains("message=Bad Request"));
    }

    #[test]
    fn nested_error_objects_are_understood() {
        let msg = rejection(
            401,
            r#"{"error":{"code":"INVALID_ARGUMENT","message":"Invalid client"}}"#,
        );
        assert!(msg.contains("status=401"));
        assert!(msg.contains("code=INVALID_ARGUMENT"));
        assert!(msg.contains("message=Invalid client"));
        assert_eq!(
            rejection(502, "<html>bad gateway</html>"),
            "OAUTH_TOKEN_REJECTED: token endpoint returned status=502"
        );
    }

    #[test]
    fn form_skips_blank_optional_fields() {
        let req = TokenExchangeRequest {
            token_uri: "https://example.com/token".to_string(),
            client_id: "cid".to_string(),
            client_secret: Some("  ".to_string()),
            code: "the-code".to_string(),
            redirect_uri: "http://localhost:8087/line/callback".to_string(),
            code_verifier: Some("verifier".to_string()),
        };
        let form = req.form();
        assert!(form.contains(&("code_verifier", "verifier")));
        assert!(form.iter().all(|(key, _)| *key != "client_secret"));
    }

    #[test]
    fn log_snippet_masks_token_fields() {
        let raw = r#"{"error":"invalid_request","refresh_token":"abcd1234xyz9876","nested":{"id_token":"idtokenvalue123456"}}"#;
        let snippet = sanitize_oauth_error_body_snippet(raw);
        assert!(snippet.contains(mask_token("abcd1234xyz9876").as_str()));
        assert!(!snippet.contains("abcd1234xyz9876"));
        assert!(!snippet.contains("idtokenvalue123456"));
        assert!(snippet.contains("invalid_request"));
    }
}
