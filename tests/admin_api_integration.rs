//! Integration tests for the intake + admin HTTP API.
//!
//! Each test spins up an Axum server on a random port and drives the real
//! REST contract with reqwest, against both store backings.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use inquiry_intake::inquiries::routes::{AppState, cors_layer, intake_routes};
use inquiry_intake::store::{BoundedMemoryStore, LibSqlStore, MessageStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Start an Axum server on a random port, return its base URL.
async fn start_server(store: Arc<dyn MessageStore>) -> String {
    let app = intake_routes(AppState::new(store)).layer(cors_layer(&[]));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

async fn memory_server() -> String {
    start_server(Arc::new(BoundedMemoryStore::new(1000))).await
}

async fn get_json(client: &Client, url: &str) -> (StatusCode, Value) {
    let resp = client.get(url).send().await.unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

async fn post_json(client: &Client, url: &str, body: Value) -> (StatusCode, Value) {
    let resp = client.post(url).json(&body).send().await.unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

// ── Intake ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_ok() {
    timeout(TEST_TIMEOUT, async {
        let base = memory_server().await;
        let (status, body) = get_json(&Client::new(), &format!("{base}/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn form_submissions_are_classified() {
    timeout(TEST_TIMEOUT, async {
        let base = memory_server().await;
        let client = Client::new();

        let (status, quote) = post_json(
            &client,
            &format!("{base}/api/contact"),
            json!({
                "name": "Dana",
                "email": "dana@builders.io",
                "company": "Builders Inc",
                "message": "Hello",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(quote["type"], "quote");

        let (_, contact) = post_json(
            &client,
            &format!("{base}/api/contact"),
            json!({ "name": "Sam", "email": "sam@home.net", "message": "What are your hours?" }),
        )
        .await;
        assert_eq!(contact["type"], "contact");

        let (status, err) = post_json(
            &client,
            &format!("{base}/api/contact"),
            json!({ "name": "", "email": "sam" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["fields"].as_array().unwrap().len(), 3);

        let (_, list) = get_json(&client, &format!("{base}/api/messages")).await;
        assert_eq!(list["stats"]["total"], 2);
        assert_eq!(list["stats"]["quoteCount"], 1);
        assert_eq!(list["stats"]["contactCount"], 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn webhook_batch_isolates_bad_items() {
    timeout(TEST_TIMEOUT, async {
        let base = memory_server().await;
        let client = Client::new();

        let (status, report) = post_json(
            &client,
            &format!("{base}/api/webhooks/inbound-email"),
            json!([
                { "from": "a@x.com", "to": "desk@us.com", "subject": "Pricing question" },
                { "to": "desk@us.com", "subject": "missing sender" },
                { "From": { "email": "c@x.com", "name": "Cy" }, "To": "desk@us.com", "Subject": "Hello" },
            ]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["received"], 3);
        assert_eq!(report["processed"], 2);
        assert_eq!(report["failed"], 1);
        assert_eq!(report["results"][1]["status"], "failed");
        assert_eq!(report["results"][0]["type"], "quote");
        assert_eq!(report["results"][2]["type"], "contact");

        let (_, list) = get_json(&client, &format!("{base}/api/messages?search=cy")).await;
        assert_eq!(list["messages"][0]["fromName"], "Cy");
    })
    .await
    .expect("test timed out");
}

// ── Admin ────────────────────────────────────────────────────────────

#[tokio::test]
async fn pagination_walks_every_message_once() {
    timeout(TEST_TIMEOUT, async {
        let base = memory_server().await;
        let client = Client::new();

        let submissions = (0..7).map(|i| {
            let client = client.clone();
            let url = format!("{base}/api/contact");
            async move {
                client
                    .post(url)
                    .json(&json!({ "name": format!("P{i}"), "email": format!("p{i}@x.com"), "message": "hi" }))
                    .send()
                    .await
                    .unwrap()
                    .status()
            }
        });
        assert!(join_all(submissions).await.iter().all(|s| *s == StatusCode::CREATED));

        let mut seen = Vec::new();
        let mut offset = 0;
        loop {
            let (_, page) =
                get_json(&client, &format!("{base}/api/messages?limit=3&offset={offset}")).await;
            assert_eq!(page["pagination"]["total"], 7);
            assert_eq!(page["pagination"]["totalPages"], 3);
            for m in page["messages"].as_array().unwrap() {
                seen.push(m["id"].as_str().unwrap().to_string());
            }
            if !page["pagination"]["hasMore"].as_bool().unwrap() {
                break;
            }
            offset += 3;
        }
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(seen.len(), 7);
        assert_eq!(unique.len(), 7);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn read_state_and_deletes_against_libsql() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let store = LibSqlStore::new_local(&dir.path().join("intake.db")).await.unwrap();
        let base = start_server(Arc::new(store)).await;
        let client = Client::new();

        let mut ids = Vec::new();
        for i in 0..3 {
            let (_, created) = post_json(
                &client,
                &format!("{base}/api/contact"),
                json!({ "name": format!("N{i}"), "email": format!("n{i}@x.com"), "message": "hello" }),
            )
            .await;
            ids.push(created["id"].as_str().unwrap().to_string());
        }

        for _ in 0..2 {
            let resp = client
                .post(format!("{base}/api/messages/{}/read", ids[0]))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let (_, list) = get_json(&client, &format!("{base}/api/messages")).await;
        assert_eq!(list["stats"]["unread"], 2);

        let resp = client
            .delete(format!("{base}/api/messages/{}", ids[0]))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = client
            .delete(format!("{base}/api/messages/{}", ids[0]))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = client
            .delete(format!("{base}/api/messages"))
            .json(&json!({ "ids": [ids[1], ids[2], ids[0]] }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["deleted"], 2);

        let (_, list) = get_json(&client, &format!("{base}/api/messages")).await;
        assert_eq!(list["stats"]["total"], 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn conversations_group_email_threads() {
    timeout(TEST_TIMEOUT, async {
        let base = memory_server().await;
        let client = Client::new();

        post_json(
            &client,
            &format!("{base}/api/webhooks/inbound-email"),
            json!([
                {
                    "from": "owner@x.com", "to": "desk@us.com",
                    "subject": "Emergency: roof leak",
                    "messageId": "<leak-1@x.com>",
                    "receivedAt": "2026-05-01T09:00:00Z",
                },
                {
                    "from": "owner@x.com", "to": "desk@us.com",
                    "subject": "Re: Emergency: roof leak",
                    "References": "<leak-1@x.com>",
                    "receivedAt": "2026-05-01T10:00:00Z",
                },
                {
                    "from": "other@x.com", "to": "desk@us.com",
                    "subject": "Newsletter",
                    "receivedAt": "2026-04-01T10:00:00Z",
                },
            ]),
        )
        .await;

        let (status, list) = get_json(&client, &format!("{base}/api/conversations")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["pagination"]["total"], 2);
        assert_eq!(list["stats"]["urgentCount"], 1);
        assert_eq!(list["conversations"][0]["id"], "leak-1@x.com");
        assert_eq!(list["conversations"][0]["messageCount"], 2);
        assert_eq!(list["conversations"][0]["priority"], "high");
        assert_eq!(list["conversations"][0]["status"], "pending");

        let (_, high) = get_json(&client, &format!("{base}/api/conversations?priority=high")).await;
        assert_eq!(high["conversations"].as_array().unwrap().len(), 1);

        let (status, detail) =
            get_json(&client, &format!("{base}/api/conversations/leak-1@x.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["messages"][0]["subject"], "Emergency: roof leak");
        assert_eq!(detail["messages"][1]["subject"], "Re: Emergency: roof leak");

        let (status, body) = get_json(&client, &format!("{base}/api/conversations/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    })
    .await
    .expect("test timed out");
}
