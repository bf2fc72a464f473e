//! HTTP adapter against a local mock registry.
//!
//! GREEN when:
//! - Login happens once and the bearer token rides on every later call.
//! - List pages decode into raw rows and report total_pages.
//! - Direct lookups map 200 / 404 / other to Found / NotFound / Error.
//! - Bulk mutations post the expected payload and surface rejections.

use dsync_reconcile::{DidNumber, NumberEntry};
use dsync_registry::*;
use httpmock::prelude::*;
use serde_json::json;

const DIDS: &str = "/accounts/acc-1/organizations/org-1/dids";

fn endpoint(server: &MockServer) -> RegistryEndpoint {
    RegistryEndpoint::new(server.base_url(), "acc-1", "org-1")
}

fn creds() -> Credentials {
    Credentials {
        email: "ops@example.com".to_string(),
        password: "pw".to_string(),
    }
}

fn did(s: &str) -> DidNumber {
    s.parse().unwrap()
}

async fn logged_in(server: &MockServer) -> HttpRegistryClient {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/login")
                .json_body(json!({"email": "ops@example.com", "password": "pw"}));
            then.status(200).json_body(json!({"access_token": "tok-1"}));
        })
        .await;
    HttpRegistryClient::login(endpoint(server), &creds())
        .await
        .expect("login")
}

#[tokio::test]
async fn login_rejection_is_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(401).body("bad credentials");
        })
        .await;

    let err = HttpRegistryClient::login(endpoint(&server), &creds())
        .await
        .unwrap_err();
    match err {
        RegistryError::Auth(msg) => {
            assert!(msg.contains("401"));
            assert!(!msg.contains("pw\""), "password must not leak: {msg}");
        }
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn login_without_token_is_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200).json_body(json!({"refresh_token": "r"}));
        })
        .await;

    let err = HttpRegistryClient::login(endpoint(&server), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Auth(_)));
}

#[tokio::test]
async fn list_page_decodes_rows_and_total_pages() {
    let server = MockServer::start_async().await;
    let client = logged_in(&server).await;

    let page = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(DIDS)
                .query_param("page", "2")
                .query_param("pageSize", "100")
                .header("authorization", "Bearer tok-1");
            then.status(200).json_body(json!({
                "dids": [
                    {"number": "+1 555 111 1111", "branded_name": "Acme"},
                    {"number": "5552222222", "branded_name": null},
                    {"number": "5553333333"}
                ],
                "total_pages": 3
            }));
        })
        .await;

    let p = client.fetch_page(2, 100).await.unwrap();
    page.assert_async().await;

    assert_eq!(p.total_pages, 3);
    assert_eq!(p.records.len(), 3);
    assert_eq!(p.records[0].number_raw, "+1 555 111 1111");
    assert_eq!(p.records[0].branded_name_raw.as_deref(), Some("Acme"));
    assert_eq!(p.records[1].branded_name_raw, None);
}

#[tokio::test]
async fn list_page_without_total_pages_defaults_to_one() {
    let server = MockServer::start_async().await;
    let client = logged_in(&server).await;

    server
        .mock_async(|when, then| {
            when.method(GET).path(DIDS);
            then.status(200).json_body(json!({"dids": []}));
        })
        .await;

    let p = client.fetch_page(1, 100).await.unwrap();
    assert_eq!(p.total_pages, 1);
    assert!(p.records.is_empty());
}

#[tokio::test]
async fn list_page_error_status_is_api_error() {
    let server = MockServer::start_async().await;
    let client = logged_in(&server).await;

    server
        .mock_async(|when, then| {
            when.method(GET).path(DIDS);
            then.status(503).body("maintenance");
        })
        .await;

    let err = client.fetch_page(1, 100).await.unwrap_err();
    assert_eq!(
        err,
        RegistryError::Api {
            status: 503,
            message: "maintenance".to_string()
        }
    );
}

#[tokio::test]
async fn lookup_maps_status_to_outcome() {
    let server = MockServer::start_async().await;
    let client = logged_in(&server).await;

    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("{DIDS}/5551111111"));
            then.status(200).json_body(json!({"number": "5551111111"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("{DIDS}/5552222222"));
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("{DIDS}/5553333333"));
            then.status(500).body("boom");
        })
        .await;

    assert_eq!(client.lookup(&did("5551111111")).await, LookupOutcome::Found);
    assert_eq!(
        client.lookup(&did("5552222222")).await,
        LookupOutcome::NotFound
    );
    match client.lookup(&did("5553333333")).await {
        LookupOutcome::Error(detail) => assert!(detail.contains("500")),
        other => panic!("expected error outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn bulk_add_posts_numbers_with_labels() {
    let server = MockServer::start_async().await;
    let client = logged_in(&server).await;

    let bulk = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{DIDS}/bulk"))
                .header("authorization", "Bearer tok-1")
                .json_body(json!({
                    "action": "add",
                    "numbers": [
                        {"number": "5551111111", "brandedName": "Acme"},
                        {"number": "5552222222"}
                    ]
                }));
            then.status(200);
        })
        .await;

    let batch = vec![
        NumberEntry::new(did("5551111111"), Some("Acme".into())),
        NumberEntry::new(did("5552222222"), None),
    ];
    client.bulk_mutate(BulkAction::Add, &batch).await.unwrap();
    bulk.assert_async().await;
}

#[tokio::test]
async fn bulk_delete_sends_numbers_only_and_surfaces_rejection() {
    let server = MockServer::start_async().await;
    let client = logged_in(&server).await;

    let bulk = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{DIDS}/bulk")).json_body(json!({
                "action": "delete",
                "numbers": [{"number": "5553333333"}]
            }));
            then.status(422).body("number locked");
        })
        .await;

    let batch = vec![NumberEntry::new(did("5553333333"), Some("Gamma".into()))];
    let err = client
        .bulk_mutate(BulkAction::Delete, &batch)
        .await
        .unwrap_err();

    bulk.assert_async().await;
    assert_eq!(
        err,
        RegistryError::Api {
            status: 422,
            message: "number locked".to_string()
        }
    );
}
