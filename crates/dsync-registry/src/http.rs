//! HTTP adapter for the registry REST API.
//!
//! Session model: one login per run. The bearer token is acquired in
//! [`HttpRegistryClient::login`], stored read-only, and sent on every later
//! request. It is never refreshed mid-run; an expired token surfaces as an
//! `Api { status: 401, .. }` error to the caller.
//!
//! No retries and no backoff live here. The only timeout is the reqwest
//! client's per-request timeout.

use std::fmt;
use std::time::Duration;

use dsync_reconcile::{DidNumber, NumberEntry, RawRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{BulkAction, LookupOutcome, RegistryError, RegistryPage, RegistryReader, RegistryWriter};

/// Longest slice of a response body quoted in an error message.
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// Endpoint + credentials
// ---------------------------------------------------------------------------

/// Where the registry lives and which account/organization scope to use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryEndpoint {
    pub base_url: String,
    pub account_id: String,
    pub org_id: String,
    pub request_timeout: Duration,
}

impl RegistryEndpoint {
    pub fn new(
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        org_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            account_id: account_id.into(),
            org_id: org_id.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    fn root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    fn login_url(&self) -> String {
        format!("{}/auth/login", self.root())
    }

    fn dids_url(&self) -> String {
        format!(
            "{}/accounts/{}/organizations/{}/dids",
            self.root(),
            self.account_id,
            self.org_id
        )
    }
}

/// Login credentials. **Values are redacted in `Debug` output.**
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Bearer credential acquired once per run. **Redacted in `Debug` output.**
#[derive(Clone)]
pub struct Session {
    access_token: String,
}

impl Session {
    pub fn from_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DidListResponse {
    #[serde(default)]
    dids: Vec<WireDid>,
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireDid {
    /// Usually a string; tolerate bare JSON numbers.
    #[serde(default)]
    number: Value,
    #[serde(default)]
    branded_name: Option<String>,
}

impl WireDid {
    fn into_raw_row(self) -> RawRow {
        let number_raw = match self.number {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        };
        RawRow {
            number_raw,
            branded_name_raw: self.branded_name,
        }
    }
}

#[derive(Debug, Serialize)]
struct BulkRequest<'a> {
    action: &'static str,
    numbers: Vec<BulkItem<'a>>,
}

#[derive(Debug, Serialize)]
struct BulkItem<'a> {
    number: &'a str,
    #[serde(rename = "brandedName", skip_serializing_if = "Option::is_none")]
    branded_name: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Live registry adapter. Implements both [`RegistryReader`] and
/// [`RegistryWriter`] over one authenticated session.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    http: reqwest::Client,
    endpoint: RegistryEndpoint,
    session: Session,
}

impl HttpRegistryClient {
    /// Log in once and return a client bound to the resulting session.
    pub async fn login(
        endpoint: RegistryEndpoint,
        credentials: &Credentials,
    ) -> Result<Self, RegistryError> {
        let http = build_http(&endpoint)?;

        let resp = http
            .post(endpoint.login_url())
            .json(&LoginRequest {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| RegistryError::Transport(format!("login request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(RegistryError::Auth(format!(
                "login rejected status={}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| RegistryError::Decode(format!("login response: {e}")))?;

        let token = body
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| RegistryError::Auth("login response has no access_token".into()))?;

        debug!(base_url = %endpoint.base_url, "registry session acquired");

        Ok(Self {
            http,
            endpoint,
            session: Session::from_token(token),
        })
    }

    /// Build a client around an already-acquired session.
    pub fn with_session(endpoint: RegistryEndpoint, session: Session) -> Result<Self, RegistryError> {
        Ok(Self {
            http: build_http(&endpoint)?,
            endpoint,
            session,
        })
    }

    pub fn endpoint(&self) -> &RegistryEndpoint {
        &self.endpoint
    }
}

fn build_http(endpoint: &RegistryEndpoint) -> Result<reqwest::Client, RegistryError> {
    if endpoint.base_url.trim().is_empty() {
        return Err(RegistryError::Config("registry base_url is empty".into()));
    }
    reqwest::Client::builder()
        .timeout(endpoint.request_timeout)
        .build()
        .map_err(|e| RegistryError::Config(format!("http client build failed: {e}")))
}

async fn error_body(resp: reqwest::Response) -> String {
    match resp.text().await {
        Ok(t) if t.len() > ERROR_BODY_PREVIEW => {
            let cut = (0..=ERROR_BODY_PREVIEW)
                .rev()
                .find(|i| t.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}...", &t[..cut])
        }
        Ok(t) if t.is_empty() => "<empty body>".to_string(),
        Ok(t) => t,
        Err(e) => format!("<unreadable body: {e}>"),
    }
}

#[async_trait::async_trait]
impl RegistryReader for HttpRegistryClient {
    fn source_name(&self) -> &'static str {
        "http"
    }

    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<RegistryPage, RegistryError> {
        debug!(page, page_size, "registry list page");

        let resp = self
            .http
            .get(self.endpoint.dids_url())
            .header(reqwest::header::AUTHORIZATION, self.session.bearer())
            .query(&[("page", page), ("pageSize", page_size)])
            .send()
            .await
            .map_err(|e| RegistryError::Transport(format!("list page {page}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RegistryError::Api {
                status: status.as_u16(),
                message: error_body(resp).await,
            });
        }

        let body: DidListResponse = resp
            .json()
            .await
            .map_err(|e| RegistryError::Decode(format!("list page {page}: {e}")))?;

        Ok(RegistryPage {
            records: body.dids.into_iter().map(WireDid::into_raw_row).collect(),
            total_pages: body.total_pages.unwrap_or(1).max(1),
        })
    }

    async fn lookup(&self, number: &DidNumber) -> LookupOutcome {
        let url = format!("{}/{}", self.endpoint.dids_url(), number);

        let resp = match self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.session.bearer())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return LookupOutcome::Error(format!("transport: {e}")),
        };

        let status = resp.status();
        if status.is_success() {
            LookupOutcome::Found
        } else if status == reqwest::StatusCode::NOT_FOUND {
            LookupOutcome::NotFound
        } else {
            LookupOutcome::Error(format!(
                "status={}: {}",
                status.as_u16(),
                error_body(resp).await
            ))
        }
    }
}

#[async_trait::async_trait]
impl RegistryWriter for HttpRegistryClient {
    async fn bulk_mutate(
        &self,
        action: BulkAction,
        batch: &[NumberEntry],
    ) -> Result<(), RegistryError> {
        let payload = BulkRequest {
            action: action.as_str(),
            numbers: batch
                .iter()
                .map(|e| BulkItem {
                    number: e.number.as_str(),
                    branded_name: match action {
                        BulkAction::Add => e.branded_name.as_deref(),
                        BulkAction::Delete => None,
                    },
                })
                .collect(),
        };

        let resp = self
            .http
            .post(format!("{}/bulk", self.endpoint.dids_url()))
            .header(reqwest::header::AUTHORIZATION, self.session.bearer())
            .json(&payload)
            .send()
            .await
            .map_err(|e| RegistryError::Transport(format!("bulk {action}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RegistryError::Api {
                status: status.as_u16(),
                message: error_body(resp).await,
            });
        }
        Ok(())
    }
}

// -----------------
// Tests (no network)
// -----------------
