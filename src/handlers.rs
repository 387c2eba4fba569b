// HTTP surface of the clearance service. `main` builds the state once and
// hands it to `serve`; integration tests drive `serve` on an ephemeral port.

use crate::application::{
    AttachImageUseCase, ExistsResponse, HandoffResponse, HealthResponse, ImageError,
    ImageRequest, ImageResponse, IssuerGate, SubmitError, SubmitResponse, SubmitUseCase,
    VerificationState, VerifyFailure, VerifyUseCase,
};
use crate::config::{Config, StoreBackend};
use crate::domain::{Certificate, Ndn, SubmissionForm};
use crate::infrastructure::{Handoff, PostgrestStore, SqliteStore, StoreError, SubmissionStore};
use hyper::body::{Bytes, HttpBody};
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// Room for a 5 MiB image once base64 and JSON framing are added
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Everything a request needs, built once at startup.
pub struct AppState {
    pub store: Arc<dyn SubmissionStore>,
    pub submit: SubmitUseCase,
    pub verify: VerifyUseCase,
    pub images: AttachImageUseCase,
    pub handoff: Handoff,
    pub issuer: IssuerGate,
    pub public_base_url: String,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn SubmissionStore>) -> Self {
        Self {
            submit: SubmitUseCase::new(store.clone(), config.generator.clone())
                .with_options(config.field_options.clone()),
            verify: VerifyUseCase::new(store.clone(), &config.public_base_url)
                .with_preference(config.render),
            images: AttachImageUseCase::new(store.clone()),
            handoff: Handoff::new(config.handoff_ttl),
            issuer: config.issuer.clone(),
            public_base_url: config.public_base_url.clone(),
            store,
        }
    }
}

/// Opens the configured record store.
/// A SQLite file that cannot be opened falls back to an in-memory database.
pub fn open_store(backend: &StoreBackend) -> Result<Arc<dyn SubmissionStore>, StoreError> {
    match backend {
        StoreBackend::Sqlite { path } => {
            let store = SqliteStore::new(path).or_else(|e| {
                warn!("Could not open {}: {}; using in-memory store", path, e);
                SqliteStore::new_in_memory()
            })?;
            Ok(Arc::new(store))
        }
        StoreBackend::Postgrest {
            url,
            key,
            table,
            timeout,
        } => {
            info!("Using hosted table {} at {}", table, url);
            Ok(Arc::new(PostgrestStore::new(url, key, table, *timeout)?))
        }
    }
}

pub async fn serve<F>(
    listener: std::net::TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), hyper::Error>
where
    F: Future<Output = ()>,
{
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();

        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle_request(req, state.clone())))
        }
    });

    Server::from_tcp(listener)?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn handle_request(
    req: Request<Body>,
    state: Arc<AppState>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    debug!("{} {}", method, path);

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let response = match (&method, segments.as_slice()) {
        (&Method::GET, ["health"]) => health(&state).await,
        (&Method::POST, ["api", "submissions"]) => submit(req, &state).await,
        (&Method::GET, ["api", "handoff", token]) => take_handoff(token, &state),
        (&Method::GET, ["api", "submissions", ndn, "exists"]) => exists(ndn, &state).await,
        (&Method::PUT, ["api", "submissions", ndn, "image"]) => {
            attach_image(ndn, req, &state).await
        }
        (&Method::GET, ["verify"]) | (&Method::GET, ["verify.html"]) => {
            verify(query_param(query.as_deref(), "ndn"), &state).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "not_found", "Not Found"),
    };

    Ok(response)
}

async fn health(state: &AppState) -> Response<Body> {
    match state.store.count().await {
        Ok(count) => json_response(
            StatusCode::OK,
            &HealthResponse {
                status: "ok",
                submissions: Some(count),
            },
        ),
        Err(e) => {
            error!("Health check could not reach store: {}", e);
            json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &HealthResponse {
                    status: "degraded",
                    submissions: None,
                },
            )
        }
    }
}

async fn submit(req: Request<Body>, state: &AppState) -> Response<Body> {
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !state.issuer.permits(authorization.as_deref()) {
        warn!("Rejected submission without a valid issuer token");
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "A valid issuer token is required to issue certificates",
        );
    }

    let body = match read_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let form: SubmissionForm = match serde_json::from_slice(&body) {
        Ok(form) => form,
        Err(e) => {
            warn!("Failed to parse submission: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "bad_request",
                &format!("Invalid submission format: {e}"),
            );
        }
    };

    match state.submit.execute(&form).await {
        Ok(record) => {
            let certificate = Certificate::from_record(&record, &state.public_base_url);
            let handoff_token = state.handoff.put(record.clone());

            json_response(
                StatusCode::CREATED,
                &SubmitResponse {
                    ndn: record.identifier.clone(),
                    handoff_token,
                    record,
                    certificate,
                },
            )
        }
        Err(e) => error_response(submit_status(&e), e.kind(), &e.user_message()),
    }
}

fn take_handoff(token: &str, state: &AppState) -> Response<Body> {
    let Ok(token) = Uuid::parse_str(token) else {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "Malformed handoff token");
    };

    match state.handoff.take(&token) {
        Some(record) => {
            let certificate = Certificate::from_record(&record, &state.public_base_url);
            json_response(StatusCode::OK, &HandoffResponse { record, certificate })
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            "No pending submission for this token",
        ),
    }
}

async fn exists(identifier: &str, state: &AppState) -> Response<Body> {
    let ndn = match Ndn::parse(identifier) {
        Ok(ndn) => ndn,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "validation", &e.to_string()),
    };

    match state.store.exists_by_identifier(ndn.as_str()).await {
        Ok(exists) => json_response(
            StatusCode::OK,
            &ExistsResponse {
                ndn: ndn.into_inner(),
                exists,
            },
        ),
        Err(e) => {
            error!("Existence check failed for {}: {}", ndn, e);
            error_response(store_status(&e), e.kind(), "Could not check this document number")
        }
    }
}

async fn attach_image(identifier: &str, req: Request<Body>, state: &AppState) -> Response<Body> {
    let body = match read_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let request: ImageRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "bad_request",
                &format!("Invalid image request: {e}"),
            )
        }
    };

    match state.images.execute(identifier, &request.image).await {
        Ok(record) => json_response(
            StatusCode::OK,
            &ImageResponse {
                ndn: record.identifier,
                stored: true,
            },
        ),
        Err(e) => {
            let status = match &e {
                ImageError::Identifier(_) => StatusCode::BAD_REQUEST,
                ImageError::NotDataUrl | ImageError::InvalidBase64(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ImageError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                ImageError::AlreadySet(_) => StatusCode::CONFLICT,
                ImageError::Store(store) => store_status(store),
            };
            error_response(status, e.kind(), &e.to_string())
        }
    }
}

async fn verify(identifier: Option<&str>, state: &AppState) -> Response<Body> {
    let outcome: VerificationState = state.verify.execute(identifier).await;

    let status = match outcome.reason() {
        None => StatusCode::OK,
        Some(VerifyFailure::MissingIdentifier) | Some(VerifyFailure::MalformedIdentifier) => {
            StatusCode::BAD_REQUEST
        }
        Some(VerifyFailure::NotFound) => StatusCode::NOT_FOUND,
        Some(VerifyFailure::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
    };

    json_response(status, &outcome)
}

fn submit_status(err: &SubmitError) -> StatusCode {
    match err {
        SubmitError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmitError::IdentifierExhausted(_) => StatusCode::CONFLICT,
        SubmitError::Store(e) => store_status(e),
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Schema(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Permission(_) => StatusCode::FORBIDDEN,
        StoreError::Transport(_) => StatusCode::BAD_GATEWAY,
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

async fn read_body(req: Request<Body>) -> Result<Bytes, Response<Body>> {
    let too_large = || {
        error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "bad_request",
            "Request body too large",
        )
    };

    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.map_or(false, |len| len > MAX_BODY_BYTES) {
        return Err(too_large());
    }

    // Chunked bodies carry no length; count while reading
    let mut body = req.into_body();
    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| {
            warn!("Failed to read request body: {}", e);
            error_response(StatusCode::BAD_REQUEST, "bad_request", "Unreadable request body")
        })?;
        if buf.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(too_large());
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(bytes) => with_json_body(status, bytes),
        Err(e) => {
            error!("Failed to encode response: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "backend",
                "Internal server error",
            )
        }
    }
}

fn error_response(status: StatusCode, kind: &str, message: &str) -> Response<Body> {
    let body = json::object! {
        "error" => message,
        "kind" => kind
    };
    with_json_body(status, body.dump())
}

fn with_json_body(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
