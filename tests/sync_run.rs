//! End-to-end runs of the invocation handler against mocked Zoom and Drive
//! endpoints.

use mockito::{Matcher, Server, ServerGuard};
use recording_sync::config::Config;
use recording_sync::drive::FOLDER_MIME_TYPE;
use recording_sync::sync::{handle_invocation, InvocationResponse};
use serde_json::json;
use std::path::Path;

fn write_key_file(dir: &Path, token_uri: &str) -> std::path::PathBuf {
    let mut key: serde_json::Value =
        serde_json::from_str(include_str!("fixtures/service-account-key.json")).unwrap();
    key["token_uri"] = json!(token_uri);
    let path = dir.join("service-account-key.json");
    std::fs::write(&path, key.to_string()).unwrap();
    path
}

fn config_for(server: &ServerGuard, dir: &Path) -> Config {
    let mut config = Config::default();
    config.zoom.base_url = server.url();
    config.zoom.client_id = Some("id".to_string());
    config.zoom.client_secret = Some("secret".to_string());
    config.zoom.account_id = Some("acct".to_string());
    config.drive.parent_dir_id = Some("root-folder".to_string());
    config.drive.key_file = write_key_file(dir, &format!("{}/token", server.url()));
    config.drive.api_url = format!("{}/drive/v3", server.url());
    config.drive.upload_url = format!("{}/upload/drive/v3", server.url());
    config.transfer.scratch_dir = dir.join("scratch");
    config
}

#[tokio::test]
async fn test_full_run_copies_only_mp4() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    server
        .mock("POST", "/oauth/token")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"access_token": "zoom-token"}"#)
        .create_async()
        .await;

    let listing = json!({
        "total_records": 2,
        "meetings": [
            {"uuid": "m1", "topic": "Standup", "recording_files": [
                {"id": "r1", "file_extension": "MP4", "download_url": format!("{}/rec/r1", server.url())}
            ]},
            {"uuid": "m2", "topic": "Retro", "recording_files": [
                {"id": "r2", "file_extension": "CHAT", "download_url": format!("{}/rec/r2", server.url())}
            ]}
        ]
    });
    server
        .mock("GET", "/v2/users/me/recordings")
        .match_header("authorization", "Bearer zoom-token")
        .with_status(200)
        .with_body(listing.to_string())
        .create_async()
        .await;

    let download_r1 = server
        .mock("GET", "/rec/r1")
        .match_header("authorization", "Bearer zoom-token")
        .with_status(200)
        .with_body("mp4-bytes")
        .expect(1)
        .create_async()
        .await;
    let download_r2 = server
        .mock("GET", "/rec/r2")
        .expect(0)
        .create_async()
        .await;

    server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"access_token": "drive-token"}"#)
        .create_async()
        .await;

    let day_folder = server
        .mock("POST", "/drive/v3/files")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer drive-token")
        .match_body(Matcher::PartialJson(json!({
            "mimeType": FOLDER_MIME_TYPE,
            "parents": ["root-folder"]
        })))
        .with_status(200)
        .with_body(r#"{"id": "day-id"}"#)
        .expect(1)
        .create_async()
        .await;
    let standup_folder = server
        .mock("POST", "/drive/v3/files")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "name": "Standup",
            "parents": ["day-id"]
        })))
        .with_status(200)
        .with_body(r#"{"id": "standup-id"}"#)
        .expect(1)
        .create_async()
        .await;
    let retro_folder = server
        .mock("POST", "/drive/v3/files")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({ "name": "Retro" })))
        .expect(0)
        .create_async()
        .await;

    let upload_session = server
        .mock("POST", "/upload/drive/v3/files")
        .match_query(Matcher::UrlEncoded("uploadType".into(), "resumable".into()))
        .match_body(Matcher::PartialJson(json!({
            "name": "r1.mp4",
            "parents": ["standup-id"]
        })))
        .with_status(200)
        .with_header("location", &format!("{}/upload/session/r1", server.url()))
        .expect(1)
        .create_async()
        .await;
    let upload_body = server
        .mock("PUT", "/upload/session/r1")
        .match_body("mp4-bytes")
        .with_status(200)
        .with_body(r#"{"id": "drive-file-1"}"#)
        .expect(1)
        .create_async()
        .await;

    let response = handle_invocation(&config, &json!({"source": "aws.events"}))
        .await
        .unwrap();
    assert_eq!(response, InvocationResponse { status_code: 204 });

    download_r1.assert_async().await;
    download_r2.assert_async().await;
    day_folder.assert_async().await;
    standup_folder.assert_async().await;
    retro_folder.assert_async().await;
    upload_session.assert_async().await;
    upload_body.assert_async().await;

    let leftovers = std::fs::read_dir(dir.path().join("scratch")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_token_failure_skips_listing() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    server
        .mock("POST", "/oauth/token")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"reason": "Invalid client_id or client_secret"}"#)
        .create_async()
        .await;
    let listing = server
        .mock("GET", "/v2/users/me/recordings")
        .expect(0)
        .create_async()
        .await;
    let folders = server
        .mock("POST", "/drive/v3/files")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let result = handle_invocation(&config, &serde_json::Value::Null).await;
    assert!(result.is_err());

    listing.assert_async().await;
    folders.assert_async().await;
}

#[tokio::test]
async fn test_empty_listing_never_touches_drive() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&server, dir.path());
    // No key file is needed when there is nothing to upload.
    config.drive.key_file = dir.path().join("missing.json");

    server
        .mock("POST", "/oauth/token")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"access_token": "zoom-token"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/v2/users/me/recordings")
        .with_status(200)
        .with_body(r#"{"total_records": 0, "meetings": []}"#)
        .create_async()
        .await;
    let drive_token = server
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;

    let response = handle_invocation(&config, &serde_json::Value::Null)
        .await
        .unwrap();
    assert_eq!(response.status_code, 204);
    drive_token.assert_async().await;
}
