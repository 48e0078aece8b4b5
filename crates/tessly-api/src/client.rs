// Async HTTP client for the Tessie REST API.
//
// Base: https://api.tessie.com
// Auth: Authorization: Bearer <token>
//
// Two families of endpoints live here: the owner-API compatible snapshot
// routes under /api/1/vehicles, and the Tessie command routes under /{vin}.

use reqwest::Method;
use reqwest::header::CONTENT_LENGTH;
use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::transport::TransportConfig;

const PREVIEW_CHARS: usize = 200;

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Tessie REST API.
///
/// Every call returns the decoded JSON body as a [`serde_json::Value`];
/// interpretation of vehicle payloads belongs to `tessly-core`.
#[derive(Debug, Clone)]
pub struct TessieClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl TessieClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a bearer token and transport config.
    pub fn new(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_authorized_client(token)?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            timeout_secs: TransportConfig::default().timeout.as_secs(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Append percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Generic request ──────────────────────────────────────────────

    /// Issue a request against a path relative to the base URL.
    ///
    /// A `None` body on POST/PUT/PATCH still sends an explicit empty
    /// body with `Content-Length: 0`, which the command endpoints need.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        self.send(method, url, body).await
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value, Error> {
        debug!("{method} {}", redact(&url));

        let needs_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
        let mut builder = self.http.request(method, url);
        builder = match body {
            Some(json) => builder.json(json),
            None if needs_body => builder.header(CONTENT_LENGTH, "0").body(Vec::<u8>::new()),
            None => builder,
        };

        let resp = builder.send().await.map_err(|e| self.map_send_error(e))?;
        self.handle_response(resp).await
    }

    // ── Snapshot endpoints ───────────────────────────────────────────

    /// `GET /api/1/vehicles/{vin}/vehicle_data`: the full vehicle snapshot.
    ///
    /// Returned as-is; the `response` envelope is unwrapped by the caller.
    pub async fn vehicle_data(&self, vin: &str) -> Result<Value, Error> {
        let url = self.url(&["api", "1", "vehicles", vin, "vehicle_data"])?;
        self.send(Method::GET, url, None).await
    }

    /// `GET /api/1/vehicles`: every vehicle on the account.
    pub async fn list_vehicles(&self) -> Result<Value, Error> {
        let url = self.url(&["api", "1", "vehicles"])?;
        self.send(Method::GET, url, None).await
    }

    // ── Tessie endpoints ─────────────────────────────────────────────

    /// `GET /{vin}/status`: `{"status": "awake" | "asleep" | ...}`.
    pub async fn vehicle_status(&self, vin: &str) -> Result<Value, Error> {
        let url = self.url(&[vin, "status"])?;
        self.send(Method::GET, url, None).await
    }

    /// `POST /{vin}/wake`.
    pub async fn wake(&self, vin: &str) -> Result<Value, Error> {
        let url = self.url(&[vin, "wake"])?;
        self.send(Method::POST, url, None).await
    }

    /// `POST /{vin}/command/{name}`, optionally blocking until the car
    /// confirms (`wait_for_completion=true`).
    pub async fn command(
        &self,
        vin: &str,
        name: &str,
        params: Option<&Value>,
        wait_for_completion: bool,
    ) -> Result<Value, Error> {
        let mut url = self.url(&[vin, "command", name])?;
        if wait_for_completion {
            url.query_pairs_mut()
                .append_pair("wait_for_completion", "true");
        }
        self.send(Method::POST, url, params).await
    }

    // ── Response handling ────────────────────────────────────────────

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }

    async fn handle_response(&self, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.map_send_error(e))?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("HTTP {}: {}", status.as_u16(), error_message(&body, status)),
            });
        }

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Parse and force a trailing slash so relative joins keep the base path.
fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message", "reason"] {
            if let Some(msg) = json.get(key).and_then(Value::as_str) {
                return msg.to_owned();
            }
        }
    }
    if body.trim().is_empty() {
        status.to_string()
    } else {
        preview(body)
    }
}

fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_CHARS).collect()
}

/// Drop the query string so tokens never reach the logs.
pub(crate) fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.query().is_some() {
        shown.set_query(Some("…"));
    }
    shown.to_string()
}
