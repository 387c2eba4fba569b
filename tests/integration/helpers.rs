use clearance::config::Config;
use clearance::handlers::{serve, AppState};
use clearance::{SqliteStore, SubmissionStore};
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Client, Method, Request, StatusCode};
use json::JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// A clearance server bound to an ephemeral port for the duration of a test.
pub struct TestApp {
    pub base_url: String,
    pub store: Arc<dyn SubmissionStore>,
    client: Client<HttpConnector>,
}

impl TestApp {
    /// Starts a server over a fresh in-memory store.
    pub async fn spawn(settings: &[(&str, &str)]) -> Self {
        let store: Arc<dyn SubmissionStore> = Arc::new(SqliteStore::new_in_memory().unwrap());
        Self::spawn_with_store(settings, store).await
    }

    pub async fn spawn_with_store(settings: &[(&str, &str)], store: Arc<dyn SubmissionStore>) -> Self {
        let vars: HashMap<String, String> = settings
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(move |key| vars.get(key).cloned()).unwrap();
        let state = Arc::new(AppState::new(&config, store.clone()));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Err(e) = serve(listener, state, std::future::pending()).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            store,
            client: Client::new(),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        token: Option<&str>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{}{}", self.base_url, path));
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();
        let response = self.client.request(request).await.unwrap();
        let status = response.status();
        let bytes: Bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();

        (status, parse_json(&bytes))
    }

    pub async fn get(&self, path: &str) -> (StatusCode, JsonValue) {
        self.request(Method::GET, path, None, None).await
    }

    pub async fn post_submission(&self, form: &JsonValue, token: Option<&str>) -> (StatusCode, JsonValue) {
        self.request(Method::POST, "/api/submissions", Some(form.dump()), token)
            .await
    }

    pub async fn put_image(&self, ndn: &str, image: &str) -> (StatusCode, JsonValue) {
        let body = json::object! { "image" => image };
        self.request(
            Method::PUT,
            &format!("/api/submissions/{}/image", ndn),
            Some(body.dump()),
            None,
        )
        .await
    }
}

fn parse_json(bytes: &[u8]) -> JsonValue {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| json::parse(s).ok())
        .unwrap_or(JsonValue::Null)
}

/// Form body as the issuance page sends it.
pub fn submission_form() -> JsonValue {
    json::object! {
        "title" => "Thesis X",
        "student_name" => "A. Example",
        "institution" => "Example University",
        "faculty" => "Engineering",
        "department" => "Computing",
        "submission_type" => "Thesis",
        "ncvs_compliance" => "Compliant",
        "academic_report" => "Submitted"
    }
}

pub const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgo=";
