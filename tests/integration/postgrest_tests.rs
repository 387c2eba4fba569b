use super::helpers::{submission_form, TestApp, PNG_DATA_URL};
use super::mock_server::MockPostgrest;
use chrono::{TimeZone, Utc};
use clearance::application::{SubmitError, SubmitUseCase};
use clearance::config::StoreBackend;
use clearance::domain::SubmissionForm;
use clearance::handlers::open_store;
use clearance::{IdentifierGenerator, Ndn, PostgrestStore, StoreError, SubmissionRecord, SubmissionStore};
use hyper::StatusCode;
use std::sync::Arc;
use std::time::Duration;

async fn store_with_mock() -> (MockPostgrest, PostgrestStore) {
    let mock = MockPostgrest::new("submissions");
    let url = mock.start().await;
    let store = PostgrestStore::new(&url, "anon-key", "submissions", Duration::from_secs(2)).unwrap();
    (mock, store)
}

fn record(identifier: &str) -> SubmissionRecord {
    let at = Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap();
    SubmissionRecord::new(&Ndn::parse(identifier).unwrap(), &record_form(), at)
}

#[tokio::test]
async fn test_insert_then_fetch() {
    let (mock, store) = store_with_mock().await;
    let original = record("PRJ-1700000000000075123");

    let inserted = store.insert(&original).await.unwrap();
    assert_eq!(inserted, original);

    let fetched = store
        .fetch_by_identifier("PRJ-1700000000000075123")
        .await
        .unwrap();
    assert_eq!(fetched, Some(original));

    let rows = mock.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["ndn"], "PRJ-1700000000000075123");
    assert_eq!(rows[0]["ncvs_compliance"], "Compliant");
}

#[tokio::test]
async fn test_fetch_unknown_is_none() {
    let (_mock, store) = store_with_mock().await;

    let fetched = store.fetch_by_identifier("PRJ-1700000000000099999").await;

    assert!(matches!(fetched, Ok(None)));
}

#[tokio::test]
async fn test_duplicate_insert_conflicts() {
    let (_mock, store) = store_with_mock().await;
    store.insert(&record("PRJ-1700000000000075123")).await.unwrap();

    let result = store.insert(&record("PRJ-1700000000000075123")).await;

    assert!(matches!(result, Err(StoreError::Conflict(ref id)) if id == "PRJ-1700000000000075123"));
}

#[tokio::test]
async fn test_exists_and_count() {
    let (mock, store) = store_with_mock().await;
    assert_eq!(store.count().await.unwrap(), 0);

    store.insert(&record("PRJ-1700000000000000001")).await.unwrap();
    store.insert(&record("PRJ-1700000000000000002")).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 2);
    assert!(store.exists_by_identifier("PRJ-1700000000000000001").await.unwrap());
    assert!(!store.exists_by_identifier("PRJ-1700000000000000003").await.unwrap());

    assert!(mock.requests().iter().any(|r| r.starts_with("HEAD ")));
}

#[tokio::test]
async fn test_rendered_image_set_once() {
    let (mock, store) = store_with_mock().await;
    store.insert(&record("PRJ-1700000000000075123")).await.unwrap();

    let updated = store
        .update_rendered_image("PRJ-1700000000000075123", PNG_DATA_URL)
        .await
        .unwrap();
    assert_eq!(updated.rendered_image.as_deref(), Some(PNG_DATA_URL));

    let again = store
        .update_rendered_image("PRJ-1700000000000075123", "data:image/png;base64,AAAA")
        .await;
    assert!(matches!(again, Err(StoreError::Conflict(_))));
    assert_eq!(mock.rows()[0]["certificate_image"], PNG_DATA_URL);

    let missing = store
        .update_rendered_image("PRJ-1700000000000099999", PNG_DATA_URL)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_missing_table_is_schema_error() {
    let (mock, store) = store_with_mock().await;
    mock.fail_with(
        StatusCode::NOT_FOUND,
        "42P01",
        "relation \"public.submissions\" does not exist",
    );

    let fetched = store.fetch_by_identifier("PRJ-1700000000000075123").await;
    assert!(matches!(fetched, Err(StoreError::Schema(_))));

    let usecase = SubmitUseCase::new(Arc::new(store), IdentifierGenerator::default());
    let err = usecase.execute(&record_form()).await.unwrap_err();
    assert!(matches!(err, SubmitError::Store(StoreError::Schema(_))));
    assert!(err.user_message().contains("table not found"));
}

#[tokio::test]
async fn test_policy_violation_is_permission_error() {
    let (mock, store) = store_with_mock().await;
    mock.fail_with(
        StatusCode::UNAUTHORIZED,
        "42501",
        "new row violates row-level security policy for table \"submissions\"",
    );

    let result = store.insert(&record("PRJ-1700000000000075123")).await;

    assert!(matches!(result, Err(StoreError::Permission(_))));
}

#[tokio::test]
async fn test_wrong_table_is_schema_error() {
    let mock = MockPostgrest::new("submissions");
    let url = mock.start().await;
    let store = PostgrestStore::new(&url, "anon-key", "clearances", Duration::from_secs(2)).unwrap();

    let result = store.count().await;

    assert!(matches!(result, Err(StoreError::Schema(_))));
}

#[tokio::test]
async fn test_unreachable_store_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let store = PostgrestStore::new(&url, "anon-key", "submissions", Duration::from_secs(2)).unwrap();
    let result = store.fetch_by_identifier("PRJ-1700000000000075123").await;

    assert!(matches!(result, Err(StoreError::Transport(_))));
}

#[tokio::test]
async fn test_https_endpoint_is_attempted() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("https://{}", listener.local_addr().unwrap());
    drop(listener);

    let store = PostgrestStore::new(&url, "anon-key", "submissions", Duration::from_secs(2)).unwrap();
    let result = store.exists_by_identifier("PRJ-1700000000000075123").await;

    // The connection is refused; the scheme itself is accepted
    match result {
        Err(StoreError::Transport(message)) => assert!(!message.contains("scheme"), "{message}"),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_service_over_hosted_table() {
    let mock = MockPostgrest::new("submissions");
    let url = mock.start().await;
    let store = open_store(&StoreBackend::Postgrest {
        url,
        key: "anon-key".to_string(),
        table: "submissions".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();
    let app = TestApp::spawn_with_store(&[], store).await;

    let (status, body) = app.post_submission(&submission_form(), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let ndn = body["ndn"].as_str().unwrap().to_string();

    let (status, verified) = app.get(&format!("/verify?ndn={}", ndn)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["view"]["certificate"]["title"], "Thesis X");

    let (status, _) = app.put_image(&ndn, PNG_DATA_URL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mock.rows()[0]["certificate_image"], PNG_DATA_URL);

    mock.fail_with(StatusCode::UNAUTHORIZED, "42501", "permission denied");
    let (status, body) = app.post_submission(&submission_form(), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "permission");
}

fn record_form() -> SubmissionForm {
    SubmissionForm {
        title: "Thesis X".to_string(),
        student_name: "A. Example".to_string(),
        institution: "Example University".to_string(),
        faculty: "Engineering".to_string(),
        department: "Computing".to_string(),
        submission_type: "Thesis".to_string(),
        compliance_status: "Compliant".to_string(),
        academic_report_status: "Submitted".to_string(),
        contribution: None,
    }
}
