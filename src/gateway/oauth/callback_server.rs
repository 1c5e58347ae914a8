//! Usage: Loopback listener that waits for the provider's authorization redirect.
//!
//! Binds 127.0.0.1 and ::1 on one port, since "localhost" may resolve to either.
//! Requests for other paths (favicon, browser preconnects) get a 404 and the wait
//! continues until the redirect arrives or the deadline passes.

use crate::shared::error::AppResult;
use crate::shared::security::constant_time_eq;
use reqwest::Url;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

pub(crate) const CALLBACK_TIMEOUT_CODE: &str = "AUTH_CALLBACK_TIMEOUT";

const LOOPBACK_V4: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const LOOPBACK_V6: IpAddr = IpAddr::V6(Ipv6Addr::LOCALHOST);
const MAX_REQUEST_BYTES: usize = 8192;
// Bounds how long one silent connection (e.g. a browser preconnect) can hold the loop.
const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(2);

struct Page {
    status: &'static str,
    body: &'static str,
}

const SIGNED_IN_PAGE: Page = Page {
    status: "200 OK",
    body: "<html><head><meta charset=\"utf-8\"></head><body><h1>ログインしました</h1><p>このウィンドウを閉じてアプリに戻ってください。</p></body></html>",
};
const FAILED_PAGE: Page = Page {
    status: "400 Bad Request",
    body: "<html><head><meta charset=\"utf-8\"></head><body><h1>ログインできませんでした</h1><p>このウィンドウを閉じて、もう一度お試しください。</p></body></html>",
};
const NOT_FOUND_PAGE: Page = Page {
    status: "404 Not Found",
    body: "",
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct OAuthCallbackPayload {
    pub(crate) code: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) error_description: Option<String>,
}

#[derive(Debug)]
pub(crate) struct CallbackListener {
    port: u16,
    v4: Option<TcpListener>,
    v6: Option<TcpListener>,
}

impl CallbackListener {
    /// Binds `preferred_port`; a busy port (or 0) falls back to an OS-assigned one.
    pub(crate) async fn bind(preferred_port: u16) -> AppResult<Self> {
        if preferred_port != 0 {
            match Self::bind_fixed(preferred_port).await {
                Ok(listener) => return Ok(listener),
                Err(err) => tracing::debug!(
                    preferred_port,
                    "oauth callback port unavailable ({err}); using a dynamic port"
                ),
            }
        }
        Self::bind_dynamic()
            .await
            .map_err(|err| format!("SYSTEM_ERROR: oauth callback bind failed: {err}").into())
    }

    async fn bind_fixed(port: u16) -> Result<Self, String> {
        let v4 = TcpListener::bind(SocketAddr::new(LOOPBACK_V4, port)).await;
        let v6 = TcpListener::bind(SocketAddr::new(LOOPBACK_V6, port)).await;
        match (v4, v6) {
            (Err(e4), Err(e6)) => Err(format!(
                "{LOOPBACK_V4}:{port} ({e4}); [{LOOPBACK_V6}]:{port} ({e6})"
            )),
            (v4, v6) => Ok(Self {
                port,
                v4: v4.ok(),
                v6: v6.ok(),
            }),
        }
    }

    async fn bind_dynamic() -> Result<Self, String> {
        let mut errors = Vec::new();
        for (primary, secondary) in [(LOOPBACK_V4, LOOPBACK_V6), (LOOPBACK_V6, LOOPBACK_V4)] {
            let listener = match TcpListener::bind(SocketAddr::new(primary, 0)).await {
                Ok(listener) => listener,
                Err(err) => {
                    errors.push(format!("{primary} ({err})"));
                    continue;
                }
            };
            let port = listener
                .local_addr()
                .map_err(|e| format!("{primary} (local_addr failed: {e})"))?
                .port();
            // Second family is best-effort on the same port.
            let other = TcpListener::bind(SocketAddr::new(secondary, port)).await.ok();
            let (v4, v6) = if primary.is_ipv4() {
                (Some(listener), other)
            } else {
                (other, Some(listener))
            };
            return Ok(Self { port, v4, v6 });
        }
        Err(errors.join("; "))
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    async fn accept(&self) -> io::Result<TcpStream> {
        let (stream, _) = match (&self.v4, &self.v6) {
            (Some(v4), Some(v6)) => tokio::select! {
                accepted = v4.accept() => accepted?,
                accepted = v6.accept() => accepted?,
            },
            (Some(listener), None) | (None, Some(listener)) => listener.accept().await?,
            (None, None) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "no callback listener bound",
                ))
            }
        };
        Ok(stream)
    }

    /// Waits for the redirect on `callback_path` and checks its `state`.
    pub(crate) async fn wait_for_redirect(
        self,
        callback_path: &str,
        expected_state: &str,
        timeout: Duration,
    ) -> AppResult<OAuthCallbackPayload> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut stream = tokio::time::timeout_at(deadline, self.accept())
                .await
                .map_err(|_| format!("{CALLBACK_TIMEOUT_CODE}: oauth callback timed out"))?
                .map_err(|e| format!("SYSTEM_ERROR: oauth callback accept failed: {e}"))?;

            let read_deadline = deadline.min(Instant::now() + CONNECTION_READ_TIMEOUT);
            let read = tokio::time::timeout_at(read_deadline, read_request_url(&mut stream)).await;
            let Ok(read) = read else {
                tracing::debug!("dropping idle loopback connection");
                continue;
            };
            let url = match read {
                Ok(url) if url.path() == callback_path => url,
                Ok(url) => {
                    tracing::debug!(path = url.path(), "ignoring unrelated loopback request");
                    respond(&mut stream, &NOT_FOUND_PAGE).await;
                    continue;
                }
                Err(err) => {
                    tracing::debug!("ignoring malformed loopback request: {err}");
                    respond(&mut stream, &NOT_FOUND_PAGE).await;
                    continue;
                }
            };

            let result = payload_from_url(&url).and_then(|payload| {
                validate_state(&payload, expected_state)?;
                Ok(payload)
            });
            let page = match &result {
                Ok(payload) if payload.error.is_none() => &SIGNED_IN_PAGE,
                _ => &FAILED_PAGE,
            };
            respond(&mut stream, page).await;
            return result;
        }
    }
}

async fn read_request_url(stream: &mut TcpStream) -> AppResult<Url> {
    let mut buffer = vec![0u8; MAX_REQUEST_BYTES];
    let size = stream
        .read(&mut buffer)
        .await
        .map_err(|e| format!("SYSTEM_ERROR: oauth callback read failed: {e}"))?;
    let request = String::from_utf8_lossy(&buffer[..size]);
    request_url(&request)
}

/// Request line `GET <target> HTTP/1.1` resolved against the loopback origin.
fn request_url(request: &str) -> AppResult<Url> {
    let mut parts = request.lines().next().unwrap_or_default().split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return Err("SYSTEM_ERROR: oauth callback must be a GET request"
            .to_string()
            .into());
    };
    if !target.starts_with('/') {
        return Err("SYSTEM_ERROR: oauth callback target must be origin-form"
            .to_string()
            .into());
    }
    Url::parse(&format!("http://localhost{target}"))
        .map_err(|e| format!("SYSTEM_ERROR: invalid oauth callback target: {e}").into())
}

fn payload_from_url(url: &Url) -> AppResult<OAuthCallbackPayload> {
    let mut payload = OAuthCallbackPayload::default();
    for (key, value) in url.query_pairs() {
        let slot = match key.as_ref() {
            "code" => &mut payload.code,
            "state" => &mut payload.state,
            "error" => &mut payload.error,
            "error_description" => &mut payload.error_description,
            _ => continue,
        };
        *slot = Some(value.into_owned());
    }
    if payload.code.is_none() && payload.error.is_none() {
        return Err("SYSTEM_ERROR: oauth callback carries neither code nor error"
            .to_string()
            .into());
    }
    Ok(payload)
}

fn validate_state(payload: &OAuthCallbackPayload, expected_state: &str) -> AppResult<()> {
    let Some(state) = payload.state.as_deref() else {
        return Err("SEC_INVALID_INPUT: oauth callback missing state"
            .to_string()
            .into());
    };
    if !constant_time_eq(state.as_bytes(), expected_state.as_bytes()) {
        return Err("SEC_INVALID_INPUT: oauth callback state mismatch"
            .to_string()
            .into());
    }
    Ok(())
}

async fn respond(stream: &mut TcpStream, page: &Page) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        page.status,
        page.body.len(),
        page.body
    );
    // The browser may already have gone away; the redirect was read either way.
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
