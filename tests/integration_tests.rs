use axum::http::StatusCode;
use axum_test::TestServer;
use object_browser::{create_in_memory_app, AppServices};
use reqwest::multipart;
use serde_json::{json, Value};
use std::time::Duration;

async fn setup_test_server() -> (TestServer, AppServices) {
    let services = create_in_memory_app().await.unwrap();
    let server = TestServer::new(services.router()).unwrap();
    (server, services)
}

/// Bind the router on an ephemeral port so multipart bodies go over a real socket
async fn spawn_http_server() -> (String, AppServices) {
    let services = create_in_memory_app().await.unwrap();
    let router = services.router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    (format!("http://{}", addr), services)
}

async fn wait_for_upload(client: &reqwest::Client, base: &str, id: &str) -> Value {
    for _ in 0..200 {
        let status: Value = client
            .get(format!("{}/uploads/{}", base, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        match status["state"].as_str() {
            Some("queued") | Some("uploading") => {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            _ => return status,
        }
    }
    panic!("upload {} never finished", id);
}

#[tokio::test]
async fn test_multipart_upload_lands_in_listing() {
    let (base, _services) = spawn_http_server().await;
    let client = reqwest::Client::new();

    let form = multipart::Form::new()
        .part(
            "file",
            multipart::Part::bytes(b"gene,score\nBRCA2,0.9\n".to_vec()).file_name("scores.csv"),
        )
        .part(
            "file",
            multipart::Part::bytes(b"# Notes\n".to_vec()).file_name("README.md"),
        )
        .text("comment", "ignored form field");

    let response = client
        .post(format!("{}/buckets/research-datasets/uploads?folder=batch", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 202);

    let submitted: Value = response.json().await.unwrap();
    let uploads = submitted["uploads"].as_array().unwrap();
    assert_eq!(uploads.len(), 2);

    for upload in uploads {
        let id = upload["id"].as_str().unwrap();
        let finished = wait_for_upload(&client, &base, id).await;
        assert_eq!(finished["state"], "completed");
        assert_eq!(finished["progress"], 100);
    }

    let listing: Value = client
        .get(format!("{}/buckets/research-datasets/objects?folder=batch", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = listing["files"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|file| file["name"].as_str())
        .collect();
    assert_eq!(names, vec!["README.md", "scores.csv"]);

    let families: Vec<&str> = listing["files"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|file| file["type_family"].as_str())
        .collect();
    assert_eq!(families, vec!["document", "tabular"]);

    let root: Value = client
        .get(format!("{}/buckets/research-datasets/objects", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root["folders"][0]["name"], "batch");
    assert_eq!(root["folders"][0]["file_count"], 2);
}

#[tokio::test]
async fn test_rejected_upload_reports_policy_violation() {
    let (base, _services) = spawn_http_server().await;
    let client = reqwest::Client::new();

    let form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(vec![0u8; 32]).file_name("installer.exe"),
    );
    let submitted: Value = client
        .post(format!("{}/buckets/medical-images/uploads", base))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let upload = &submitted["uploads"][0];
    assert_eq!(upload["state"], "failed");
    assert_eq!(upload["error"]["kind"], "policy_violation");

    // Completed or failed tasks cannot be cancelled
    let id = upload["id"].as_str().unwrap();
    let cancel = client
        .delete(format!("{}/uploads/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status().as_u16(), 409);

    // Retrying resubmits as a new task, which the policy rejects again
    let retry = client
        .post(format!("{}/uploads/{}/retry", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(retry.status().as_u16(), 202);
    let retried: Value = retry.json().await.unwrap();
    assert_ne!(retried["id"], upload["id"]);
    assert_eq!(retried["state"], "failed");
}

#[tokio::test]
async fn test_completed_upload_cannot_be_retried() {
    let (server, services) = setup_test_server().await;

    let ids = services
        .uploads
        .submit(
            &object_browser::BucketId::new("clinical-documents").unwrap(),
            &object_browser::FolderPath::root(),
            vec![object_browser::UploadSource::new("consent.pdf", b"%PDF-1.4".to_vec())],
        )
        .unwrap();
    services.uploads.wait_idle().await;

    let status = server.get(&format!("/uploads/{}", ids[0])).await.json::<Value>();
    assert_eq!(status["state"], "completed");
    assert_eq!(status["object"]["name"], "consent.pdf");

    let retry = server.post(&format!("/uploads/{}/retry", ids[0])).await;
    assert_eq!(retry.status_code(), StatusCode::CONFLICT);
    assert_eq!(retry.json::<Value>()["kind"], "already_terminal");

    assert!(server
        .get("/uploads")
        .await
        .json::<Value>()["uploads"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_export_catalog_endpoints() {
    let (server, _services) = setup_test_server().await;

    let formats = server.get("/exports/formats").await.json::<Vec<Value>>();
    let keys: Vec<&str> = formats.iter().filter_map(|f| f["key"].as_str()).collect();
    assert_eq!(keys, vec!["json", "csv", "tsv", "vcf", "pdf-text", "spreadsheet"]);

    let pdf = formats.iter().find(|f| f["key"] == "pdf-text").unwrap();
    assert_eq!(pdf["mime_type"], "application/pdf");
    assert_eq!(pdf["local_extension"], "txt");

    let sections = server.get("/exports/sections").await.json::<Value>();
    let keys: Vec<&str> = sections["sections"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["key"].as_str())
        .collect();
    assert_eq!(keys, vec!["full_report", "variants_only", "risk_summary"]);
}

#[tokio::test]
async fn test_json_export_without_remote_is_local() {
    let (server, _services) = setup_test_server().await;

    let response = server
        .post("/exports")
        .json(&json!({
            "subject_id": "P-9",
            "section": "full_report",
            "format": "json",
            "date": "2024-02-29",
            "records": [{ "gene": "MLH1", "condition": "Lynch syndrome" }]
        }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.header("x-export-route"), "local");

    let body = response.json::<Value>();
    assert_eq!(body["subject_id"], "P-9");
    assert_eq!(body["records"][0]["gene"], "MLH1");
    assert_eq!(body["records"][0]["rsid"], Value::Null);
}

#[tokio::test]
async fn test_unknown_section_is_not_found() {
    let (server, _services) = setup_test_server().await;

    let response = server
        .post("/exports")
        .json(&json!({ "subject_id": "P-9", "section": "appendix", "format": "json" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["details"]["key"], "appendix");
}

#[tokio::test]
async fn test_export_rejects_unsafe_subject_id() {
    let (server, _services) = setup_test_server().await;

    let response = server
        .post("/exports")
        .json(&json!({
            "subject_id": "../../etc/P-9\"",
            "section": "full_report",
            "format": "csv"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["kind"], "invalid_input");
}
