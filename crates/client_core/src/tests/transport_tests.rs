use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::json;
use shared::domain::{LanguageCode, Tone};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

use super::*;

#[derive(Clone)]
struct ScriptedChannel {
    frames: Arc<Vec<String>>,
    initiation: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

async fn ws_process(
    ws: WebSocketUpgrade,
    State(channel): State<ScriptedChannel>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| play(channel, socket))
}

async fn play(channel: ScriptedChannel, mut socket: WebSocket) {
    if let Some(Ok(WsMessage::Text(first))) = socket.recv().await {
        if let Some(tx) = channel.initiation.lock().await.take() {
            let _ = tx.send(first);
        }
    }
    for frame in channel.frames.iter() {
        if socket.send(WsMessage::Text(frame.clone())).await.is_err() {
            return;
        }
    }
    let _ = socket.send(WsMessage::Close(None)).await;
}

async fn spawn_channel(frames: Vec<String>) -> (WsAnalysisConnector, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = oneshot::channel();
    let channel = ScriptedChannel {
        frames: Arc::new(frames),
        initiation: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new()
        .route("/ws/process", get(ws_process))
        .with_state(channel);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (WsAnalysisConnector::new(format!("ws://{addr}/ws/process")), rx)
}

fn request() -> StudioJobRequest {
    StudioJobRequest {
        url: "https://youtu.be/abc".into(),
        duration_minutes: 5,
        language: LanguageCode::new("am"),
        tone: Tone::Neutral,
    }
}

async fn collect(connector: &WsAnalysisConnector) -> Vec<PipelineResult<StudioUpdate>> {
    let stream = connector.open(request()).await.expect("open");
    tokio::time::timeout(std::time::Duration::from_secs(2), stream.collect::<Vec<_>>())
        .await
        .expect("stream finished")
}

#[tokio::test]
async fn streams_updates_until_completed() {
    let frames = vec![
        json!({ "status": "processing", "message": "Downloading", "progress": 10 }).to_string(),
        json!({ "status": "processing", "message": "Translating", "progress": 60.5 }).to_string(),
        json!({
            "status": "completed",
            "message": "done",
            "studio_data": { "studio_script": "S", "target_lang": "am" }
        })
        .to_string(),
        json!({ "status": "processing", "message": "ignored", "progress": 99 }).to_string(),
    ];
    let (connector, initiation) = spawn_channel(frames).await;

    let updates = collect(&connector).await;

    let first = serde_json::from_str::<serde_json::Value>(&initiation.await.expect("initiation"))
        .expect("json initiation");
    assert_eq!(
        first,
        json!({ "url": "https://youtu.be/abc", "duration": 5, "language": "am", "tone": "neutral" })
    );
    assert_eq!(updates.len(), 3);
    assert!(matches!(
        updates[1],
        Ok(StudioUpdate::Processing { progress, .. }) if progress == 60.5
    ));
    match &updates[2] {
        Ok(StudioUpdate::Completed { studio_data, .. }) => {
            assert_eq!(studio_data.studio_script, "S");
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn close_before_terminal_frame_ends_the_stream() {
    let frames =
        vec![json!({ "status": "processing", "message": "Downloading", "progress": 10 }).to_string()];
    let (connector, _initiation) = spawn_channel(frames).await;

    let updates = collect(&connector).await;

    assert_eq!(updates.len(), 1);
    assert!(updates[0].is_ok());
}

#[tokio::test]
async fn rejection_and_garbage_frames_terminate() {
    let (connector, _initiation) =
        spawn_channel(vec![json!({ "error": "Invalid URL" }).to_string()]).await;
    let updates = collect(&connector).await;
    assert!(matches!(
        &updates[..],
        [Ok(StudioUpdate::Error { message })] if message == "Invalid URL"
    ));

    let (connector, _initiation) =
        spawn_channel(vec!["not json".to_string(), "{}".to_string()]).await;
    let updates = collect(&connector).await;
    assert!(matches!(&updates[..], [Err(PipelineError::Protocol(_))]));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let connector = WsAnalysisConnector::new(format!("ws://{addr}/ws/process"));

    let err = match connector.open(request()).await {
        Ok(_) => panic!("connection should fail"),
        Err(err) => err,
    };

    assert!(err.is_transport());
}

#[test]
fn decodes_status_frames() {
    let update = decode_update(r#"{"status":"error","message":"Video unavailable"}"#).unwrap();
    assert!(update.is_terminal());
    assert!(matches!(update, StudioUpdate::Error { message } if message == "Video unavailable"));

    let processing = decode_update(r#"{"status":"processing","progress":5}"#).unwrap();
    assert!(!processing.is_terminal());

    assert!(decode_update(r#"{"status":"queued"}"#).is_err());
}
