//! Watched and favorite sets across restarts.

use lectern_types::VideoId;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::file_client;

fn read_state(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn replayed_watch_sequence_keeps_each_id_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/mark-watched/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");

    let (client, _view) = file_client(&server, &state_file);
    for id in ["4", "2", "4", "9", "2", "4"] {
        client.mark_watched(&VideoId::from(id)).await;
    }
    drop(client);

    let stored = read_state(&state_file);
    let watched: Vec<String> =
        serde_json::from_str(stored["watchedVideos"].as_str().unwrap()).unwrap();
    assert_eq!(watched, vec!["4", "2", "9"]);

    let (reloaded, _view) = file_client(&server, &state_file);
    assert_eq!(
        reloaded.state().watched(),
        vec![VideoId::from("4"), VideoId::from("2"), VideoId::from("9")]
    );
}

#[tokio::test]
async fn favorite_toggled_twice_restores_stored_value() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");

    let (client, _view) = file_client(&server, &state_file);
    client.toggle_favorite(&VideoId::from("1"));
    client.toggle_favorite(&VideoId::from("5"));
    let before = read_state(&state_file)["favorites"].clone();

    assert!(client.toggle_favorite(&VideoId::from("8")));
    assert!(!client.toggle_favorite(&VideoId::from("8")));
    assert_eq!(read_state(&state_file)["favorites"], before);

    assert!(!client.toggle_favorite(&VideoId::from("1")));
    assert!(client.toggle_favorite(&VideoId::from("1")));
    assert_eq!(read_state(&state_file)["favorites"], before);
    assert_eq!(before.as_str(), Some(r#"["1","5"]"#));
    drop(client);

    let (reloaded, _view) = file_client(&server, &state_file);
    assert!(reloaded.state().is_favorite(&VideoId::from("5")));
    assert!(!reloaded.state().is_favorite(&VideoId::from("8")));
}

#[tokio::test]
async fn numeric_ids_in_stored_sets_match_string_ids() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");
    std::fs::write(
        &state_file,
        r#"{"watchedVideos": "[3, \"3\", 5]", "favorites": "[]"}"#,
    )
    .unwrap();

    let (client, _view) = file_client(&server, &state_file);
    assert_eq!(
        client.state().watched(),
        vec![VideoId::from("3"), VideoId::from("5")]
    );
    assert!(!client.mark_watched(&VideoId::from("3")).await);
}
