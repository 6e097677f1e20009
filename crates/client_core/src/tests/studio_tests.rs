use shared::protocol::StudioUpdate;

use super::*;
use crate::{events::event_channel, fakes::*};

fn pipeline_with(
    analysis: &Arc<FakeAnalysis>,
    catalog: &Arc<FakeCatalog>,
) -> (Arc<StudioPipeline>, broadcast::Receiver<PipelineEvent>) {
    let events = event_channel();
    let receiver = events.subscribe();
    let pipeline = StudioPipeline::new(analysis.clone(), catalog.clone(), events);
    (pipeline, receiver)
}

fn progress(message: &str, progress: f64) -> PipelineResult<StudioUpdate> {
    Ok(StudioUpdate::Processing {
        message: message.into(),
        progress,
    })
}

#[tokio::test]
async fn completed_job_stores_artifact_and_reports_ordered_progress() {
    let analysis = FakeAnalysis::new();
    let updates = analysis.push_channel();
    let catalog = FakeCatalog::new(vec![("p1", sample_artifact("S", "am"))]);
    let (pipeline, mut events) = pipeline_with(&analysis, &catalog);

    let dispatch = pipeline.start(job("https://youtu.be/abc")).await;
    assert_eq!(dispatch, Dispatch::Dispatched);

    updates.send(progress("Downloading", 10.0)).unwrap();
    updates.send(progress("Transcribing", 40.0)).unwrap();
    updates.send(progress("Translating", 70.0)).unwrap();
    updates
        .send(Ok(StudioUpdate::Completed {
            message: "Studio package ready".into(),
            studio_data: Box::new(sample_artifact("S", "am")),
        }))
        .unwrap();

    let seen = studio_until(&mut events, |session| {
        session.status() == StudioStatus::Completed
    })
    .await;
    let observed: Vec<u8> = seen.iter().map(|session| session.progress).collect();
    assert_eq!(observed, vec![0, 10, 40, 70, 100]);
    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(seen[0].message, STARTING_MESSAGE);

    let session = pipeline.snapshot().await;
    assert_eq!(session.progress, 100);
    assert_eq!(session.artifact().map(|a| a.studio_script.as_str()), Some("S"));
    assert_eq!(session.message, "Studio package ready");

    eventually("catalog refresh", || catalog.list_count() == 1).await;
}

#[tokio::test]
async fn blank_url_is_a_no_op() {
    let analysis = FakeAnalysis::new();
    let catalog = FakeCatalog::new(vec![]);
    let (pipeline, mut events) = pipeline_with(&analysis, &catalog);

    let dispatch = pipeline.start(job("   ")).await;

    assert_eq!(dispatch, Dispatch::Ignored(Precondition::EmptyInput));
    assert_eq!(pipeline.snapshot().await.status(), StudioStatus::Idle);
    assert_eq!(analysis.open_count(), 0);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn second_start_while_processing_is_ignored() {
    let analysis = FakeAnalysis::new();
    let _updates = analysis.push_channel();
    let catalog = FakeCatalog::new(vec![]);
    let (pipeline, _events) = pipeline_with(&analysis, &catalog);

    assert!(pipeline.start(job("https://youtu.be/first")).await.is_dispatched());
    eventually("channel open", || analysis.open_count() == 1).await;

    let again = pipeline.start(job("https://youtu.be/second")).await;

    assert_eq!(again, Dispatch::Ignored(Precondition::InFlight));
    let session = pipeline.snapshot().await;
    assert_eq!(session.url, "https://youtu.be/first");
    assert!(session.is_processing());
    assert_eq!(analysis.open_count(), 1);
}

#[tokio::test]
async fn channel_drop_before_terminal_frame_fails_with_connection_lost() {
    let analysis = FakeAnalysis::new();
    let updates = analysis.push_channel();
    let catalog = FakeCatalog::new(vec![]);
    let (pipeline, mut events) = pipeline_with(&analysis, &catalog);

    assert!(pipeline.start(job("https://youtu.be/abc")).await.is_dispatched());
    updates.send(progress("Downloading", 25.0)).unwrap();
    drop(updates);

    let seen = studio_until(&mut events, |session| {
        session.status() == StudioStatus::Error
    })
    .await;
    let failed = seen.last().unwrap();
    assert_eq!(failed.message, CONNECTION_LOST);
    assert_eq!(failed.progress, 25);
    assert!(failed.artifact().is_none());

    let errors: Vec<String> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            PipelineEvent::Error(message) => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![CONNECTION_LOST.to_string()]);
    assert_eq!(catalog.list_count(), 0);
}

#[tokio::test]
async fn server_error_frame_ends_job_with_its_message() {
    let analysis = FakeAnalysis::new();
    let updates = analysis.push_channel();
    let catalog = FakeCatalog::new(vec![]);
    let (pipeline, mut events) = pipeline_with(&analysis, &catalog);

    assert!(pipeline.start(job("https://youtu.be/abc")).await.is_dispatched());
    updates
        .send(Ok(StudioUpdate::Error {
            message: "Video unavailable".into(),
        }))
        .unwrap();

    let seen = studio_until(&mut events, |session| {
        session.status() == StudioStatus::Error
    })
    .await;
    assert_eq!(seen.last().unwrap().message, "Video unavailable");

    // A fresh start is accepted once the job has failed.
    let _next = analysis.push_channel();
    assert!(pipeline.start(job("https://youtu.be/retry")).await.is_dispatched());
}

#[tokio::test]
async fn unreachable_server_fails_the_job() {
    let analysis = FakeAnalysis::new();
    let catalog = FakeCatalog::new(vec![]);
    let (pipeline, mut events) = pipeline_with(&analysis, &catalog);

    assert!(pipeline.start(job("https://youtu.be/abc")).await.is_dispatched());

    let seen = studio_until(&mut events, |session| {
        session.status() == StudioStatus::Error
    })
    .await;
    assert_eq!(seen.last().unwrap().message, CONNECTION_LOST);
}

#[tokio::test]
async fn superseded_subscription_never_touches_the_new_session() {
    let analysis = FakeAnalysis::new();
    let stale = analysis.push_channel();
    let fresh = analysis.push_channel();
    let catalog = FakeCatalog::new(vec![]);
    let (pipeline, mut events) = pipeline_with(&analysis, &catalog);

    assert!(pipeline.start(job("https://youtu.be/old")).await.is_dispatched());
    eventually("first channel open", || analysis.open_count() == 1).await;

    pipeline.reset().await;
    assert!(pipeline.start(job("https://youtu.be/new")).await.is_dispatched());
    eventually("second channel open", || analysis.open_count() == 2).await;

    let _ = stale.send(Ok(StudioUpdate::Completed {
        message: "stale".into(),
        studio_data: Box::new(sample_artifact("OLD", "am")),
    }));
    fresh.send(progress("Transcribing", 20.0)).unwrap();

    let seen = studio_until(&mut events, |session| session.progress == 20).await;
    let current = seen.last().unwrap();
    assert_eq!(current.url, "https://youtu.be/new");
    assert!(current.is_processing());
    assert!(seen
        .iter()
        .all(|session| session.artifact().is_none()));
    assert!(pipeline.snapshot().await.artifact().is_none());
}

#[tokio::test]
async fn load_project_replaces_session_with_stored_artifact() {
    let analysis = FakeAnalysis::new();
    let catalog = FakeCatalog::new(vec![("p1", sample_artifact("Guion", "es"))]);
    let (pipeline, _events) = pipeline_with(&analysis, &catalog);

    let dispatch = pipeline.load_project(&ProjectId::new("p1")).await.unwrap();

    assert!(dispatch.is_dispatched());
    let session = pipeline.snapshot().await;
    assert_eq!(session.status(), StudioStatus::Completed);
    assert_eq!(session.target_language, LanguageCode::new("es"));
    assert_eq!(session.message, LOADED_MESSAGE);
    assert_eq!(session.progress, 100);
    assert_eq!(
        session.artifact().map(|a| a.studio_script.as_str()),
        Some("Guion")
    );
}

#[tokio::test]
async fn load_of_unknown_project_reports_error() {
    let analysis = FakeAnalysis::new();
    let catalog = FakeCatalog::new(vec![("empty", sample_artifact("", "am"))]);
    let (pipeline, _events) = pipeline_with(&analysis, &catalog);

    let missing = pipeline.load_project(&ProjectId::new("nope")).await;
    assert_eq!(
        missing,
        Err(PipelineError::Server("Project not found".into()))
    );
    assert_eq!(pipeline.snapshot().await.status(), StudioStatus::Error);

    let empty = pipeline.load_project(&ProjectId::new("empty")).await;
    assert_eq!(
        empty,
        Err(PipelineError::Server("project not found".into()))
    );
    assert_eq!(pipeline.snapshot().await.message, "project not found");
}

#[tokio::test]
async fn dropped_connection_during_project_load_reports_connection_lost() {
    let analysis = FakeAnalysis::new();
    let catalog = FakeCatalog::failing(PipelineError::Transport("connection reset".into()));
    let (pipeline, mut events) = pipeline_with(&analysis, &catalog);

    let result = pipeline.load_project(&ProjectId::new("p1")).await;

    assert!(result.unwrap_err().is_transport());
    let session = pipeline.snapshot().await;
    assert_eq!(session.status(), StudioStatus::Error);
    assert_eq!(session.message, CONNECTION_LOST);
    let errors: Vec<String> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            PipelineEvent::Error(message) => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![CONNECTION_LOST.to_string()]);
}

#[test]
fn progress_is_clamped_into_percent_range() {
    assert_eq!(clamp_progress(-5.0), 0);
    assert_eq!(clamp_progress(42.4), 42);
    assert_eq!(clamp_progress(250.0), 100);
    assert_eq!(clamp_progress(f64::NAN), 0);
}
