use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{Gender, LanguageCode, NarratorId, RefineStyle, Tone};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

#[derive(Clone, Default)]
struct MockState {
    tts_bodies: Arc<Mutex<Vec<Value>>>,
    approve_bodies: Arc<Mutex<Vec<Value>>>,
}

async fn list_videos() -> Json<Value> {
    Json(json!([
        { "_id": "65f0", "title": "How tea conquered the world", "created_at": "2026-01-02" },
        { "_id": "65f1", "title": "Untitled" }
    ]))
}

async fn fetch_project(Path(id): Path<String>) -> Json<Value> {
    if id == "65f0" {
        Json(json!({
            "english_script": "Tea began in China.",
            "studio_script": "ሻይ በቻይና ተጀመረ።",
            "target_lang": "am",
            "viral_hooks": ["You drink it daily"],
            "srt_content": "1\n00:00:00,000 --> 00:00:02,000\nሻይ\n",
            "video_filename": "tea.mp4",
            "mongodb_id": "65f0"
        }))
    } else {
        Json(json!({ "error": "Project not found" }))
    }
}

async fn list_narrators() -> Json<Value> {
    Json(json!([
        { "id": "aria", "name": "Aria", "role": "Storyteller", "lang": "en", "gender": "female" },
        { "id": "ameha", "name": "Ameha", "role": "News", "lang": "am", "gender": "male", "avatar": "/a.png" }
    ]))
}

async fn generate_tts(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state.tts_bodies.lock().await.push(body);
    Json(json!({ "url": "/static/audio/tts_am_female_neutral_1.mp3" }))
}

async fn creative_script_failure() -> Json<Value> {
    Json(json!({ "error": "Gemini quota exceeded" }))
}

async fn refine_crash() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn approve(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state.approve_bodies.lock().await.push(body);
    Json(json!({
        "audio_url": "/static/audio/forge_9.mp3",
        "audio_path": "/srv/static/audio/forge_9.mp3",
        "storyboard": [{ "timestamp": "00:00", "title": "Hook", "prompt": "steam over a cup" }],
        "visual_prompts": ["steam over a cup"]
    }))
}

async fn render_garbage() -> &'static str {
    "<html>not json</html>"
}

async fn spawn_backend() -> (HttpBackend, MockState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = MockState::default();
    let app = Router::new()
        .route("/videos", get(list_videos))
        .route("/project/:id", get(fetch_project))
        .route("/narrators", get(list_narrators))
        .route("/generate-tts", post(generate_tts))
        .route("/generate-creative-script", post(creative_script_failure))
        .route("/refine-script", post(refine_crash))
        .route("/approve-creative-project", post(approve))
        .route("/generate-forge-video", post(render_garbage))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let base = Url::parse(&format!("http://{addr}/")).expect("base url");
    let backend = HttpBackend::new(base, Duration::from_secs(5)).expect("client");
    (backend, state)
}

#[tokio::test]
async fn lists_projects_and_fetches_one() {
    let (backend, _state) = spawn_backend().await;

    let projects = backend.list_projects().await.expect("projects");
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].id, ProjectId::new("65f0"));
    assert_eq!(projects[1].created_at, None);

    let artifact = backend
        .fetch_project(&ProjectId::new("65f0"))
        .await
        .expect("project");
    assert_eq!(artifact.target_lang, "am");
    assert_eq!(artifact.video_filename, "tea.mp4");
    assert!(artifact.rendered_video_path.is_none());
}

#[tokio::test]
async fn error_body_becomes_server_failure() {
    let (backend, _state) = spawn_backend().await;

    let missing = backend.fetch_project(&ProjectId::new("nope")).await;
    assert_eq!(
        missing.unwrap_err(),
        PipelineError::Server("Project not found".into())
    );

    let script = backend
        .generate_creative_script(CreativeScriptRequest {
            idea: "history of coffee".into(),
            duration: 3,
            lang: LanguageCode::new("en"),
        })
        .await;
    assert_eq!(
        script.unwrap_err(),
        PipelineError::Server("Gemini quota exceeded".into())
    );
}

#[tokio::test]
async fn http_status_failure_is_a_transport_error() {
    let (backend, _state) = spawn_backend().await;

    let err = backend
        .refine_script(RefineRequest {
            script: "draft".into(),
            style: RefineStyle::Viral,
        })
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.display_message(), "connection lost");
}

#[tokio::test]
async fn undecodable_body_is_a_protocol_error() {
    let (backend, _state) = spawn_backend().await;

    let err = backend
        .generate_forge_video(RenderRequest {
            audio_path: "/srv/static/audio/forge_9.mp3".into(),
            segments: Vec::new(),
            bg_music: "explainer".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Protocol(_)));
}

#[tokio::test]
async fn request_bodies_use_backend_field_names() {
    let (backend, state) = spawn_backend().await;

    let tts = backend
        .generate_tts(TtsRequest {
            text: "selam".into(),
            lang: LanguageCode::new("am"),
            gender: Gender::Female,
            tone: Tone::Neutral,
            filename: "tts_am_female_neutral_1.mp3".into(),
        })
        .await
        .expect("tts");
    assert_eq!(
        tts.url.as_deref(),
        Some("/static/audio/tts_am_female_neutral_1.mp3")
    );
    assert_eq!(
        state.tts_bodies.lock().await[0],
        json!({
            "text": "selam",
            "lang": "am",
            "gender": "female",
            "tone": "neutral",
            "filename": "tts_am_female_neutral_1.mp3"
        })
    );

    let assets = backend
        .approve_creative_project(ApproveRequest {
            script: "Coffee was found by goats.".into(),
            lang: LanguageCode::new("en"),
            narrator_id: NarratorId::new("aria"),
            segments: Vec::new(),
            idea: "history of coffee".into(),
        })
        .await
        .expect("assets");
    assert_eq!(assets.storyboard.len(), 1);
    let body = &state.approve_bodies.lock().await[0];
    assert_eq!(body["narratorId"], "aria");
    assert_eq!(body["lang"], "en");
}

#[tokio::test]
async fn narrators_decode_with_optional_avatar() {
    let (backend, _state) = spawn_backend().await;

    let narrators = backend.list_narrators().await.expect("narrators");

    assert_eq!(narrators.len(), 2);
    assert_eq!(narrators[0].gender, Gender::Female);
    assert_eq!(narrators[0].avatar, None);
    assert_eq!(narrators[1].avatar.as_deref(), Some("/a.png"));
}

#[test]
fn endpoint_keeps_base_path_prefix() {
    let backend = HttpBackend::new(
        Url::parse("http://studio.local/api/").expect("url"),
        Duration::from_secs(1),
    )
    .expect("client");

    let url = backend.endpoint(&["project", "a b"]).expect("endpoint");

    assert_eq!(url.as_str(), "http://studio.local/api/project/a%20b");
}
