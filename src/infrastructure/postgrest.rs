use crate::domain::SubmissionRecord;
use crate::infrastructure::database::{StoreError, StoreFuture, SubmissionStore};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const NO_ROWS: &str = "PGRST116";

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

type Filters<'a> = [(&'a str, String)];

/// Record store backed by a hosted table exposed through a PostgREST API
/// (`{base}/rest/v1/{table}`), over HTTP or HTTPS.
pub struct PostgrestStore {
    client: Client,
    table_url: String,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(
        base_url: &str,
        api_key: &str,
        table: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Backend(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            client,
            table_url: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table),
            api_key: api_key.to_string(),
        })
    }

    /// Request against the table with the given filters; the client
    /// percent-encodes the query string.
    fn request(&self, method: Method, filters: &Filters<'_>) -> RequestBuilder {
        self.client
            .request(method, &self.table_url)
            .query(filters)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Sends a request and buffers the response. Only connection-level
    /// failures become errors here; HTTP status handling is left to callers.
    async fn send(
        &self,
        request: RequestBuilder,
    ) -> Result<(StatusCode, HeaderMap, Vec<u8>), StoreError> {
        let response = request.send().await.map_err(transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        debug!("{} -> {}", response.url().path(), status);

        let body = response.bytes().await.map_err(transport)?;
        Ok((status, headers, body.to_vec()))
    }

    async fn count_matching(&self, filters: &Filters<'_>) -> Result<usize, StoreError> {
        let request = self
            .request(Method::HEAD, filters)
            .header("Prefer", "count=exact");

        let (status, headers, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }

        headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| StoreError::Backend("response carried no row count".to_string()))
    }
}

impl SubmissionStore for PostgrestStore {
    fn insert<'a>(&'a self, record: &'a SubmissionRecord) -> StoreFuture<'a, SubmissionRecord> {
        Box::pin(async move {
            let body = serde_json::to_vec(record).map_err(|e| StoreError::Backend(e.to_string()))?;
            let request = self
                .request(Method::POST, &[("select", "*".to_string())])
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, SINGLE_OBJECT)
                .header("Prefer", "return=representation")
                .body(body);

            let (status, _, body) = self.send(request).await?;
            if !status.is_success() {
                return Err(match classify(status, &body) {
                    StoreError::Conflict(_) => StoreError::Conflict(record.identifier.clone()),
                    other => other,
                });
            }

            parse_record(&body)
        })
    }

    fn fetch_by_identifier<'a>(
        &'a self,
        identifier: &'a str,
    ) -> StoreFuture<'a, Option<SubmissionRecord>> {
        Box::pin(async move {
            let filters = [("ndn", format!("eq.{identifier}")), ("select", "*".to_string())];
            let request = self
                .request(Method::GET, &filters)
                .header(ACCEPT, SINGLE_OBJECT);

            let (status, _, body) = self.send(request).await?;
            if status.is_success() {
                return parse_record(&body).map(Some);
            }

            match classify(status, &body) {
                StoreError::NotFound(_) => Ok(None),
                other => Err(other),
            }
        })
    }

    fn exists_by_identifier<'a>(&'a self, identifier: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let filters = [("ndn", format!("eq.{identifier}")), ("select", "ndn".to_string())];
            Ok(self.count_matching(&filters).await? > 0)
        })
    }

    fn update_rendered_image<'a>(
        &'a self,
        identifier: &'a str,
        image: &'a str,
    ) -> StoreFuture<'a, SubmissionRecord> {
        Box::pin(async move {
            let filters = [
                ("ndn", format!("eq.{identifier}")),
                ("certificate_image", "is.null".to_string()),
                ("select", "*".to_string()),
            ];
            let body = serde_json::json!({ "certificate_image": image }).to_string();
            let request = self
                .request(Method::PATCH, &filters)
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, SINGLE_OBJECT)
                .header("Prefer", "return=representation")
                .body(body);

            let (status, _, body) = self.send(request).await?;
            if status.is_success() {
                return parse_record(&body);
            }

            match classify(status, &body) {
                // Nothing matched: either no such record or the image is already set
                StoreError::NotFound(_) => {
                    if self.exists_by_identifier(identifier).await? {
                        Err(StoreError::Conflict(format!(
                            "{identifier} already has a rendered image"
                        )))
                    } else {
                        Err(StoreError::NotFound(identifier.to_string()))
                    }
                }
                other => Err(other),
            }
        })
    }

    fn count(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            self.count_matching(&[("select", "ndn".to_string())])
                .await
        })
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Transport(format!("request timed out: {err}"))
    } else {
        StoreError::Transport(err.to_string())
    }
}

fn parse_record(body: &[u8]) -> Result<SubmissionRecord, StoreError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("Unexpected record payload from store: {}", e);
        StoreError::Schema(format!("unexpected record shape: {e}"))
    })
}

/// Maps a failed PostgREST response onto the store taxonomy.
fn classify(status: StatusCode, body: &[u8]) -> StoreError {
    let err: PostgrestError = serde_json::from_slice(body).unwrap_or_default();
    let message = match (&err.message, &err.details) {
        (Some(m), Some(d)) => format!("{m} ({d})"),
        (Some(m), None) => m.clone(),
        _ => format!("HTTP {status}"),
    };

    match err.code.as_deref() {
        Some("23505") => StoreError::Conflict(message),
        Some("42P01") | Some("42703") | Some("PGRST204") | Some("PGRST205") => {
            StoreError::Schema(message)
        }
        Some("42501") => StoreError::Permission(message),
        Some(NO_ROWS) => StoreError::NotFound(message),
        _ => match status {
            StatusCode::CONFLICT => StoreError::Conflict(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Permission(message),
            StatusCode::NOT_FOUND => StoreError::Schema(message),
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => StoreError::Transport(message),
            _ => StoreError::Backend(message),
        },
    }
}

/// Total from a `Content-Range` value such as `0-0/12` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}
