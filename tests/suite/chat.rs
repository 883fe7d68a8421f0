//! Chat protocol through the client facade.

use lectern_engine::{FailureKind, SendOutcome};
use lectern_types::{CurrentView, Role};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{file_client, memory_client, mount_providers};

#[tokio::test]
async fn session_survives_reload_and_is_replaced_once() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");
    mount_providers(&server, &["p0"], "p0").await;
    Mock::given(method("POST"))
        .and(path("/api/chat/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Hello!",
            "session_id": "session_from_server"
        })))
        .mount(&server)
        .await;

    let (client, _view) = file_client(&server, &state_file);
    assert!(client.state().current_session().is_none());
    assert_eq!(
        client.send_chat("hi").await,
        SendOutcome::Delivered { attempts: 1 }
    );

    let requests = server.received_requests().await.unwrap();
    let first_chat = requests
        .iter()
        .find(|r| r.url.path() == "/api/chat/")
        .unwrap();
    let first_body: serde_json::Value = serde_json::from_slice(&first_chat.body).unwrap();
    let generated = first_body["session_id"].as_str().unwrap().to_string();
    assert!(generated.starts_with("session_"));
    assert_ne!(generated, "session_from_server");
    drop(client);

    let (reloaded, _view) = file_client(&server, &state_file);
    assert_eq!(
        reloaded.state().current_session().unwrap().as_str(),
        "session_from_server"
    );
    reloaded.send_chat("again").await;
    assert!(
        !reloaded
            .state()
            .adopt_session(lectern_types::SessionId::new("session_from_server"))
    );

    let sessions: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/chat/")
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["session_id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(sessions, vec![generated, "session_from_server".to_string()]);
}

#[tokio::test]
async fn exhausted_failover_surfaces_one_terminal_notice() {
    let server = MockServer::start().await;
    mount_providers(&server, &["openai", "anthropic", "local"], "openai").await;
    Mock::given(method("POST"))
        .and(path("/api/chat/"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"retry_after": 60})))
        .expect(6)
        .mount(&server)
        .await;

    let (client, view) = memory_client(&server);
    assert_eq!(
        client.send_chat("explain flexbox").await,
        SendOutcome::Failed(FailureKind::Exhausted { attempts: 6 })
    );

    let directory = client.chat().providers().await;
    assert_eq!(directory.try_index(), 0);
    assert_eq!(directory.current(), Some("openai"));

    let rendered = view.messages();
    assert_eq!(rendered.first().unwrap().role(), Role::User);
    assert_eq!(
        rendered.last().unwrap().text(),
        "All providers are temporarily unavailable. Please try again later."
    );
    assert!(!client.chat().is_busy());
}

#[tokio::test]
async fn opening_chats_loads_history_for_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/history/"))
        .and(query_param("session_id", "session_known"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"message": "q", "response": "a", "created_at": "2024-03-01T12:00:00Z"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, view) = memory_client(&server);
    client
        .state()
        .adopt_session(lectern_types::SessionId::new("session_known"));
    client.open_view(CurrentView::Chats).await;

    let texts: Vec<_> = view
        .messages()
        .iter()
        .map(|m| m.text().to_string())
        .collect();
    assert_eq!(texts, vec!["q", "a"]);
}

#[tokio::test]
async fn csrf_token_is_sent_on_chat_posts() {
    let server = MockServer::start().await;
    mount_providers(&server, &["p0"], "p0").await;
    Mock::given(method("POST"))
        .and(path("/api/chat/"))
        .and(wiremock::matchers::header("X-CSRFToken", "test-csrf"))
        .and(body_partial_json(json!({"message": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _view) = memory_client(&server);
    assert_eq!(
        client.send_chat("hi").await,
        SendOutcome::Delivered { attempts: 1 }
    );
}
