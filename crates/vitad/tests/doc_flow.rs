//! Document capture flow against an in-process backend.

use std::collections::BTreeMap;
use std::time::Duration;

use vita_client::ApiClient;
use vita_core::types::{
    DocSessionRequest, DocSide, DocSideRecord, RuleKind, RuleResult,
};
use vitad::config::Config;
use vitad::http_api::{create_router, AppState};

async fn spawn_backend(config: Config) -> String {
    let state = AppState::new(&config);
    let app = create_router(state, &config.callback_path);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn passport_request() -> DocSessionRequest {
    DocSessionRequest {
        country: "usa".to_string(),
        doc_type: "passport".to_string(),
        rules: None,
    }
}

fn front_record(diagnostic: Option<&str>) -> DocSideRecord {
    DocSideRecord {
        side: DocSide::Front,
        timeout: false,
        diagnostic: diagnostic.map(|d| d.to_string()),
        doc_image: Some("aGVsbG8=".to_string()),
        doc_corners: Some(vec![[0.0, 0.0], [640.0, 0.0], [640.0, 400.0], [0.0, 400.0]]),
        rule_results: vec![
            RuleResult {
                kind: RuleKind::Mrz,
                name: "mrz-td3".to_string(),
                fields: BTreeMap::from([
                    ("documentNumber".to_string(), "X123".to_string()),
                    ("surname".to_string(), "DOE".to_string()),
                ]),
            },
            RuleResult {
                kind: RuleKind::Ocr,
                name: "passport-visual-zone".to_string(),
                fields: BTreeMap::from([("givenNames".to_string(), "JANE".to_string())]),
            },
        ],
    }
}

#[tokio::test]
async fn test_document_session_init_uses_catalogue() {
    let base = spawn_backend(Config::default()).await;
    let client = ApiClient::new(&base).unwrap();

    let handle = client.init_document_session(&passport_request()).await.unwrap();
    assert_eq!(handle.doc_type, "passport");
    assert_eq!(handle.format, "td3");
    assert!(handle.rules.iter().any(|r| r.kind == RuleKind::Mrz));

    let mut unknown = passport_request();
    unknown.doc_type = "library-card".to_string();
    let err = client.init_document_session(&unknown).await.unwrap_err();
    assert!(matches!(
        err,
        vita_client::ApiError::Rejected { ref error_code, .. } if error_code == "VALIDATION"
    ));
}

#[tokio::test]
async fn test_results_unlock_after_callback() {
    let base = spawn_backend(Config::default()).await;
    let client = ApiClient::new(&base).unwrap();

    let handle = client.init_document_session(&passport_request()).await.unwrap();
    let id = handle.session_id;

    // Nothing captured yet.
    let pending = client
        .doc_capture_result(&id, "passport", DocSide::Front, true)
        .await
        .unwrap();
    assert!(pending.is_none());

    // Captured but the completion callback is still outstanding.
    client.push_doc_side_result(&id, &front_record(None)).await.unwrap();
    let pending = client
        .doc_capture_result(&id, "passport", DocSide::Front, true)
        .await
        .unwrap();
    assert!(pending.is_none());

    client.doc_capture_callback(&id, "C-1").await.unwrap();
    let shaped = client
        .doc_capture_result(&id, "passport", DocSide::Front, false)
        .await
        .unwrap()
        .expect("shaped result");

    assert_eq!(shaped.side, DocSide::Front);
    let ocr = shaped.ocr.expect("merged ocr fields");
    assert_eq!(ocr.get("documentNumber").map(String::as_str), Some("X123"));
    assert_eq!(ocr.get("givenNames").map(String::as_str), Some("JANE"));
    assert!(shaped.pdf417.is_none());

    // The back side was never captured.
    let back = client
        .doc_capture_result(&id, "passport", DocSide::Back, false)
        .await
        .unwrap();
    assert!(back.is_none());
}

#[tokio::test]
async fn test_retaken_side_supersedes_earlier_take() {
    let base = spawn_backend(Config::default()).await;
    let client = ApiClient::new(&base).unwrap();

    let handle = client.init_document_session(&passport_request()).await.unwrap();
    let id = handle.session_id;

    client
        .push_doc_side_result(&id, &front_record(Some("blurry")))
        .await
        .unwrap();
    client.doc_capture_callback(&id, "C-1").await.unwrap();
    client
        .push_doc_side_result(&id, &front_record(Some("retake")))
        .await
        .unwrap();

    let shaped = client
        .doc_capture_result(&id, "passport", DocSide::Front, false)
        .await
        .unwrap()
        .expect("shaped result");
    assert_eq!(shaped.diagnostic.as_deref(), Some("retake"));
}

#[tokio::test]
async fn test_callback_without_session_id_is_bad_request() {
    let base = spawn_backend(Config::default()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/doc-capture-callback"))
        .json(&serde_json::json!({ "captureId": "C-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["errorCode"], "VALIDATION");
}

#[tokio::test]
async fn test_callback_for_unknown_session_is_not_found() {
    let base = spawn_backend(Config::default()).await;
    let client = ApiClient::new(&base).unwrap();
    let err = client.doc_capture_callback("ghost", "C-1").await.unwrap_err();
    assert!(err.is_session_not_found());
}

#[tokio::test]
async fn test_unknown_side_is_validation() {
    let base = spawn_backend(Config::default()).await;
    let client = ApiClient::new(&base).unwrap();
    let handle = client.init_document_session(&passport_request()).await.unwrap();

    let resp = reqwest::Client::new()
        .get(format!(
            "{base}/doc-capture-result/{}/passport/top",
            handle.session_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_document_session_is_gone() {
    let config = Config {
        doc_ttl_secs: 0,
        ..Config::default()
    };
    let base = spawn_backend(config).await;
    let client = ApiClient::new(&base).unwrap();

    let handle = client.init_document_session(&passport_request()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = client
        .doc_capture_result(&handle.session_id, "passport", DocSide::Front, false)
        .await
        .unwrap_err();
    assert!(err.is_session_not_found());
}

#[tokio::test]
async fn test_country_listing_includes_configured_extras() {
    let config = Config {
        extra_doc_types: vec![("jpn".to_string(), vec!["passport".to_string()])],
        ..Config::default()
    };
    let base = spawn_backend(config).await;
    let client = ApiClient::new(&base).unwrap();

    let listing = client.country_doc_types().await.unwrap();
    let jpn = listing.iter().find(|c| c.country == "jpn").expect("extra country");
    assert_eq!(jpn.doc_types, vec!["passport"]);
    assert!(listing.iter().any(|c| c.country == "usa"));
}

#[tokio::test]
async fn test_custom_callback_path() {
    let config = Config {
        callback_path: "/hooks/doc-done".to_string(),
        ..Config::default()
    };
    let base = spawn_backend(config).await;
    let client = ApiClient::new(&base)
        .unwrap()
        .with_callback_path("/hooks/doc-done");

    let handle = client.init_document_session(&passport_request()).await.unwrap();
    client
        .push_doc_side_result(&handle.session_id, &front_record(None))
        .await
        .unwrap();
    client.doc_capture_callback(&handle.session_id, "C-9").await.unwrap();

    let shaped = client
        .doc_capture_result(&handle.session_id, "passport", DocSide::Front, false)
        .await
        .unwrap();
    assert!(shaped.is_some());
}
