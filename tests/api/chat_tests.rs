//! Chat API Tests

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use uuid::Uuid;

use dm_server::application::services::{ChatEvent, ConnectionHandle, PresenceDirectory};

use crate::common::{sign, test_settings, TestApp};

async fn create_chat(app: &TestApp, token: &str, other: Uuid) -> Value {
    let (status, body) = app
        .post("/api/chats/create", json!({ "other_user_id": other }), Some(token))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

async fn send(app: &TestApp, token: &str, chat_id: &str, text: &str) -> (StatusCode, Value) {
    app.post(
        "/api/chats/message",
        json!({ "chat_id": chat_id, "text": text }),
        Some(token),
    )
    .await
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let app = TestApp::new();
    let chat_id = Uuid::new_v4();

    let (status, body) = app.get("/api/chats", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 10003);

    let (status, _) = app.get(&format!("/api/chats/{chat_id}"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post("/api/chats/create", json!({ "other_user_id": Uuid::new_v4() }), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post(&format!("/api/chats/read/{chat_id}"), json!({}), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.messages.is_empty());
}

#[tokio::test]
async fn test_expired_and_forged_tokens_rejected() {
    let app = TestApp::new();

    let expired = sign(&Uuid::new_v4().to_string(), -120);
    let (status, body) = app.get("/api/chats", Some(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token expired");

    let (status, _) = app.get("/api/chats", Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let numeric_subject = sign("12345", 3600);
    let (status, _) = app.get("/api/chats", Some(&numeric_subject)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_chat_returns_detail_with_other_user() {
    let app = TestApp::new();
    let (alice, alice_token) = app.user("alice");
    let (bob, _) = app.user("bob");

    let chat = create_chat(&app, &alice_token, bob).await;

    let pair = [chat["user1_id"].clone(), chat["user2_id"].clone()];
    assert!(pair.contains(&json!(alice)));
    assert!(pair.contains(&json!(bob)));
    assert_eq!(chat["messages"], json!([]));
    assert_eq!(chat["other_user"]["id"], json!(bob));
    assert_eq!(chat["other_user"]["user_name"], "bob");
    assert_eq!(chat["other_user"]["status"], "offline");
}

#[tokio::test]
async fn test_create_chat_twice_is_rejected_either_direction() {
    let app = TestApp::new();
    let (alice, alice_token) = app.user("alice");
    let (bob, bob_token) = app.user("bob");
    create_chat(&app, &alice_token, bob).await;

    let (status, body) = app
        .post("/api/chats/create", json!({ "other_user_id": bob }), Some(&alice_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Chat already exists");

    let (status, _) = app
        .post("/api/chats/create", json!({ "other_user_id": alice }), Some(&bob_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_chat_with_self_or_unknown_user() {
    let app = TestApp::new();
    let (alice, alice_token) = app.user("alice");

    let (status, _) = app
        .post("/api/chats/create", json!({ "other_user_id": alice }), Some(&alice_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/chats/create",
            json!({ "other_user_id": Uuid::new_v4() }),
            Some(&alice_token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_send_and_list_messages_in_order() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");
    let (bob, bob_token) = app.user("bob");
    let chat = create_chat(&app, &alice_token, bob).await;
    let chat_id = chat["chat_id"].as_str().unwrap();

    for (token, text) in [(&alice_token, "hi"), (&bob_token, "hey"), (&alice_token, "how are you")] {
        let (status, message) = send(&app, token, chat_id, text).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message["message_text"], text);
        assert_eq!(message["is_read"], false);
    }

    let (status, list) = app.get("/api/chats", Some(&bob_token)).await;
    assert_eq!(status, StatusCode::OK);
    let chats = list.as_array().unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["other_user"]["user_name"], "alice");

    let texts: Vec<&str> = chats[0]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message_text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["hi", "hey", "how are you"]);
}

#[tokio::test]
async fn test_send_to_foreign_or_missing_chat_is_not_found() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");
    let (bob, _) = app.user("bob");
    let (_, eve_token) = app.user("eve");
    let chat = create_chat(&app, &alice_token, bob).await;
    let chat_id = chat["chat_id"].as_str().unwrap();

    let (status, _) = send(&app, &eve_token, chat_id, "let me in").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, &alice_token, &Uuid::new_v4().to_string(), "hello?").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.messages.is_empty());
}

#[tokio::test]
async fn test_overlong_message_fails_validation() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");
    let (bob, _) = app.user("bob");
    let chat = create_chat(&app, &alice_token, bob).await;

    let (status, body) = send(&app, &alice_token, chat["chat_id"].as_str().unwrap(), &"x".repeat(4001)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("text:"));
    assert_eq!(body["code"], 10007);
    assert_eq!(body["errors"][0]["field"], "text");
    assert_eq!(
        body["errors"][0]["message"],
        "Message must be at most 4000 characters"
    );
}

#[tokio::test]
async fn test_get_chat_returns_snapshot_then_marks_read() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");
    let (bob, bob_token) = app.user("bob");
    let chat = create_chat(&app, &alice_token, bob).await;
    let chat_id = chat["chat_id"].as_str().unwrap();
    send(&app, &alice_token, chat_id, "one").await;
    send(&app, &bob_token, chat_id, "two").await;

    let (status, first) = app.get(&format!("/api/chats/{chat_id}"), Some(&bob_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["messages"][0]["is_read"], false);
    assert_eq!(first["other_user"]["user_name"], "alice");

    let (_, second) = app.get(&format!("/api/chats/{chat_id}"), Some(&bob_token)).await;
    // Alice's message was read by bob; bob's own message is untouched.
    assert_eq!(second["messages"][0]["is_read"], true);
    assert_eq!(second["messages"][1]["is_read"], false);
}

#[tokio::test]
async fn test_get_chat_not_found_for_outsider_or_bad_id() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");
    let (bob, _) = app.user("bob");
    let (_, eve_token) = app.user("eve");
    let chat = create_chat(&app, &alice_token, bob).await;
    let chat_id = chat["chat_id"].as_str().unwrap();

    let (status, _) = app.get(&format!("/api/chats/{chat_id}"), Some(&eve_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .get(&format!("/api/chats/{}", Uuid::new_v4()), Some(&alice_token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/chats/not-a-uuid", Some(&alice_token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 10002);
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");

    let request = Request::builder()
        .method("POST")
        .uri("/api/chats/create")
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", alice_token))
        .body(Body::from("{\"other_user_id\":"))
        .unwrap();
    let (status, body) = app.request(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 10002);

    let (status, body) = app
        .post("/api/chats/message", json!({ "chat_id": "nope", "text": "hi" }), Some(&alice_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 10002);
    assert!(app.messages.is_empty());
}

#[tokio::test]
async fn test_deleted_participant_hides_chat() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");
    let (bob, _) = app.user("bob");
    let chat = create_chat(&app, &alice_token, bob).await;
    let chat_id = chat["chat_id"].as_str().unwrap();

    assert!(app.directory.remove(bob).is_some());

    let (status, _) = app.get(&format!("/api/chats/{chat_id}"), Some(&alice_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/chats", Some(&alice_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_mark_read_counts_once() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");
    let (bob, bob_token) = app.user("bob");
    let chat = create_chat(&app, &alice_token, bob).await;
    let chat_id = chat["chat_id"].as_str().unwrap();
    send(&app, &alice_token, chat_id, "one").await;
    send(&app, &alice_token, chat_id, "two").await;

    let uri = format!("/api/chats/read/{chat_id}");
    let (status, body) = app.post(&uri, json!({}), Some(&bob_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 2);

    let (_, body) = app.post(&uri, json!({}), Some(&bob_token)).await;
    assert_eq!(body["marked"], 0);

    let (_, eve_token) = app.user("eve");
    let (status, _) = app.post(&uri, json!({}), Some(&eve_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rest_send_does_not_push_by_default() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");
    let (bob, _) = app.user("bob");
    let chat = create_chat(&app, &alice_token, bob).await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    app.state
        .gateway
        .register_connection(bob, ConnectionHandle::new(Uuid::new_v4(), tx));

    send(&app, &alice_token, chat["chat_id"].as_str().unwrap(), "quiet").await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_rest_send_pushes_when_fanout_enabled() {
    let mut settings = test_settings();
    settings.chat.rest_push_fanout = true;
    let app = TestApp::with_settings(settings);
    let (_, alice_token) = app.user("alice");
    let (bob, _) = app.user("bob");
    let chat = create_chat(&app, &alice_token, bob).await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    app.state
        .gateway
        .register_connection(bob, ConnectionHandle::new(Uuid::new_v4(), tx));

    send(&app, &alice_token, chat["chat_id"].as_str().unwrap(), "loud").await;
    match rx.try_recv().unwrap() {
        ChatEvent::ReceiveMessage(message) => assert_eq!(message.message_text, "loud"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_online_status_reflects_live_connection() {
    let app = TestApp::new();
    let (_, alice_token) = app.user("alice");
    let (bob, _) = app.user("bob");
    create_chat(&app, &alice_token, bob).await;

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    app.state
        .gateway
        .register_connection(bob, ConnectionHandle::new(Uuid::new_v4(), tx));

    let (_, list) = app.get("/api/chats", Some(&alice_token)).await;
    assert_eq!(list[0]["other_user"]["status"], "online");
}
