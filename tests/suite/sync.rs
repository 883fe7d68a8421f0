//! Push events folded through the client, with REST as the fallback.

use lectern_engine::{NoticeLevel, StreamKind, SyncEvent, ViewCall};
use lectern_types::{Category, CurrentView, VideoId};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    PushServer, attach_push, last_progress, memory_client, mount_catalog, next_data_event,
};

#[tokio::test]
async fn progress_push_never_hides_local_progress() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/user/progress/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let push = PushServer::start().await;

    let (mut client, view) = memory_client(&server);
    client.bootstrap().await;
    client.state().mark_watched(&VideoId::from("1"));
    let mut events = attach_push(&mut client, &push).await;

    // The progress stream asks for a snapshot as soon as it opens.
    push.wait_for_frame(|p, v| p == "/ws/progress/" && v["type"] == "request_progress")
        .await;

    push.push(
        StreamKind::Progress,
        json!({"type": "user_progress", "progress": {"html": 0, "js": 100}}),
    );
    let event = next_data_event(&mut events).await;
    assert!(matches!(event, SyncEvent::Progress(_)));
    client.handle_sync_event(event).await;

    assert_eq!(last_progress(&view, "html"), Some(50));
    assert_eq!(last_progress(&view, "js"), Some(100));

    client.shutdown().await;
}

#[tokio::test]
async fn mark_watched_hints_push_channel_and_writes_rest() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/mark-watched/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let push = PushServer::start().await;

    let (mut client, _view) = memory_client(&server);
    let _events = attach_push(&mut client, &push).await;

    assert!(client.mark_watched(&VideoId::from("7")).await);
    push.wait_for_frame(|p, v| {
        p == "/ws/progress/" && v["type"] == "mark_watched" && v["video_id"] == "7"
    })
    .await;

    client.shutdown().await;
}

#[tokio::test]
async fn video_added_refreshes_over_open_video_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/recent/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    let push = PushServer::start().await;

    let (mut client, view) = memory_client(&server);
    let mut events = attach_push(&mut client, &push).await;

    push.push(
        StreamKind::Videos,
        json!({"type": "video_added", "video": {"id": 11, "title": "Grid layout"}}),
    );
    let event = next_data_event(&mut events).await;
    client.handle_sync_event(event).await;

    assert_eq!(
        view.notices(),
        vec![(NoticeLevel::Info, "New video: Grid layout".to_string())]
    );
    for category in ["html", "js"] {
        push.wait_for_frame(|p, v| {
            p == "/ws/videos/" && v["type"] == "request_videos" && v["category"] == category
        })
        .await;
    }
    push.wait_for_frame(|p, v| p == "/ws/videos/" && v["type"] == "request_recent")
        .await;

    // The server answers the refresh with replace frames.
    client.open_view(CurrentView::Category(Category::from("js"))).await;
    push.push(
        StreamKind::Videos,
        json!({"type": "category_videos", "category": "js", "videos": [{"id": 11, "title": "Grid layout"}]}),
    );
    let event = next_data_event(&mut events).await;
    client.handle_sync_event(event).await;
    assert_eq!(client.state().category(&Category::from("js")).len(), 1);
    assert!(view.calls().iter().any(
        |c| matches!(c, ViewCall::Category(cat, videos) if cat.as_str() == "js" && videos.len() == 1)
    ));

    client.shutdown().await;
}

#[tokio::test]
async fn unknown_push_types_change_nothing() {
    let server = MockServer::start().await;
    let push = PushServer::start().await;

    let (mut client, view) = memory_client(&server);
    let mut events = attach_push(&mut client, &push).await;
    view.take();

    push.push(StreamKind::Videos, json!({"type": "video_starred", "video_id": 1}));
    push.push(
        StreamKind::Videos,
        json!({"type": "recent_videos", "videos": [{"id": 2, "title": "Forms"}]}),
    );

    // The unknown frame is dropped by the channel; the next event is the
    // recent list.
    let event = next_data_event(&mut events).await;
    client.handle_sync_event(event).await;
    assert_eq!(client.state().recent().len(), 1);
    assert_eq!(
        view.notices(),
        vec![(NoticeLevel::Success, "New videos loaded".to_string())]
    );

    client.shutdown().await;
}
