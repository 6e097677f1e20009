use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, Dispatch, ForgeStatus, PipelineEvent, PipelineSession, StudioClient,
    StudioStatus, VoiceRequest,
};
use shared::{
    domain::{Gender, LanguageCode, NarratorId, ProjectId, RefineStyle, Tone},
    protocol::{StudioArtifact, StudioJobRequest},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Drive the video studio backend from the terminal")]
struct Cli {
    /// Overrides the configured backend base url.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a source video into a localized studio package.
    Analyze {
        url: String,
        #[arg(long, default_value_t = 5)]
        duration: u32,
        #[arg(long, default_value = "am")]
        lang: String,
        #[arg(long, default_value = "neutral")]
        tone: Tone,
        #[arg(long)]
        save_subtitles: bool,
        #[arg(long)]
        download_video: bool,
        /// Print the full package as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Synthesize speech for a piece of text.
    Tts {
        text: String,
        #[arg(long, default_value = "am")]
        lang: String,
        #[arg(long, default_value = "female")]
        gender: Gender,
        #[arg(long, default_value = "neutral")]
        tone: Tone,
    },
    /// Idea to script to narrated assets, optionally rendered.
    Forge {
        idea: String,
        #[arg(long, default_value_t = 3)]
        duration: u32,
        #[arg(long, default_value = "en")]
        lang: String,
        #[arg(long)]
        narrator: Option<String>,
        #[arg(long)]
        refine: Option<RefineStyle>,
        /// Stop after the script instead of generating assets.
        #[arg(long)]
        script_only: bool,
        #[arg(long)]
        render: bool,
        #[arg(long)]
        download: bool,
    },
    /// List narrators, optionally for one language.
    Narrators {
        #[arg(long)]
        lang: Option<String>,
    },
    /// List stored projects.
    Projects,
    /// Load one stored project.
    Project {
        id: String,
        #[arg(long)]
        save_subtitles: bool,
        #[arg(long)]
        json: bool,
    },
}

fn require_dispatch(what: &str, dispatch: Dispatch) -> Result<()> {
    match dispatch {
        Dispatch::Dispatched => Ok(()),
        Dispatch::Ignored(reason) => bail!("{what} was not dispatched: {reason:?}"),
    }
}

fn print_artifact(artifact: &StudioArtifact, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(artifact)?);
        return Ok(());
    }
    println!("language: {}", artifact.target_lang);
    println!("\n{}\n", artifact.studio_script);
    for hook in &artifact.viral_hooks {
        println!("hook: {hook}");
    }
    for title in &artifact.metadata.titles {
        println!("title: {title}");
    }
    if let Some(prompt) = artifact.thumbnail_prompt() {
        println!("thumbnail: {prompt}");
    }
    if !artifact.chapters.is_empty() {
        println!("chapters:\n{}", artifact.chapters);
    }
    Ok(())
}

async fn wait_for_studio(
    events: &mut tokio::sync::broadcast::Receiver<PipelineEvent>,
) -> Result<PipelineSession> {
    loop {
        match events.recv().await {
            Ok(PipelineEvent::StudioChanged(session)) => match session.status() {
                StudioStatus::Processing => {
                    println!("[{:>3}%] {}", session.progress, session.message)
                }
                StudioStatus::Completed | StudioStatus::Error => return Ok(session),
                StudioStatus::Idle => {}
            },
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
            Err(RecvError::Closed) => bail!("event stream closed"),
        }
    }
}

async fn save_outputs(
    client: &StudioClient,
    artifact: &StudioArtifact,
    subtitles: bool,
    video: bool,
) -> Result<()> {
    if subtitles {
        match client.exporter.save_subtitles(Some(artifact)).await? {
            Some(path) => println!("subtitles saved to {}", path.display()),
            None => println!("no subtitles in this package"),
        }
    }
    if video {
        let media = client
            .exporter
            .rendered_video(artifact)
            .or_else(|| client.exporter.source_video(artifact));
        match client.exporter.download(media).await? {
            Some(path) => println!("video saved to {}", path.display()),
            None => println!("no video in this package"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    let client = StudioClient::new(&settings).context("failed to configure studio client")?;

    match cli.command {
        Command::Analyze {
            url,
            duration,
            lang,
            tone,
            save_subtitles,
            download_video,
            json,
        } => {
            let mut events = client.subscribe();
            let request = StudioJobRequest {
                url,
                duration_minutes: duration,
                language: LanguageCode::new(lang),
                tone,
            };
            require_dispatch("analysis", client.studio.start(request).await)?;
            let session = wait_for_studio(&mut events).await?;
            let Some(artifact) = session.artifact() else {
                bail!("analysis failed: {}", session.message);
            };
            print_artifact(artifact, json)?;
            save_outputs(&client, artifact, save_subtitles, download_video).await?;
        }
        Command::Tts {
            text,
            lang,
            gender,
            tone,
        } => {
            let request = VoiceRequest {
                text,
                lang: LanguageCode::new(lang),
                gender,
                tone,
            };
            require_dispatch("speech", client.voice.generate(request).await?)?;
            if let Some(clip) = client.voice.last_audio().await {
                println!("{} ({})", clip.url, clip.filename);
            }
        }
        Command::Forge {
            idea,
            duration,
            lang,
            narrator,
            refine,
            script_only,
            render,
            download,
        } => {
            let forge = &client.forge;
            require_dispatch("idea", forge.set_idea(idea).await)?;
            require_dispatch("duration", forge.set_duration(duration).await)?;
            require_dispatch("language", forge.set_language(LanguageCode::new(lang)).await)?;
            forge.load_narrators().await?;
            if let Some(id) = narrator {
                require_dispatch("narrator", forge.select_narrator(&NarratorId::new(id)).await)?;
            }

            require_dispatch("script", forge.generate_script().await?)?;
            if let Some(style) = refine {
                require_dispatch("refine", forge.refine(style).await?)?;
            }
            let session = forge.snapshot().await;
            if let Some(blueprint) = session.draft().and_then(|d| d.blueprint.as_deref()) {
                println!("blueprint: {blueprint}");
            }
            for segment in session.segments() {
                println!("[{}] {}: {}", segment.timestamp, segment.title, segment.text);
            }
            if script_only {
                return Ok(());
            }

            require_dispatch("approve", forge.approve().await?)?;
            let session = forge.snapshot().await;
            if let Some(assets) = session.assets() {
                println!("narration: {}", assets.audio_url);
                for frame in &assets.storyboard {
                    println!("storyboard [{}] {}: {}", frame.timestamp, frame.title, frame.prompt);
                }
            }

            if render {
                require_dispatch("render", forge.render_video().await?)?;
                let session = forge.snapshot().await;
                if session.status() == ForgeStatus::Completed {
                    if let Some(video_url) = session.rendered_video_url.as_deref() {
                        println!("video: {video_url}");
                    }
                }
                if download {
                    let media = client
                        .exporter
                        .forge_video(session.rendered_video_url.as_deref());
                    if let Some(path) = client.exporter.download(media).await? {
                        println!("video saved to {}", path.display());
                    }
                }
            } else if download {
                let media = client.exporter.forge_audio(session.assets());
                if let Some(path) = client.exporter.download(media).await? {
                    println!("narration saved to {}", path.display());
                }
            }
        }
        Command::Narrators { lang } => {
            if let Some(lang) = lang {
                require_dispatch(
                    "language",
                    client.forge.set_language(LanguageCode::new(lang)).await,
                )?;
            }
            client.forge.load_narrators().await?;
            let session = client.forge.snapshot().await;
            for narrator in session.narrators_for_language() {
                println!(
                    "{:<10} {:<10} {:<14} {} {}",
                    narrator.id.as_str(),
                    narrator.name,
                    narrator.role,
                    narrator.lang,
                    narrator.gender.as_str()
                );
            }
        }
        Command::Projects => {
            for project in client.studio.refresh_projects().await? {
                println!(
                    "{}  {}  {}",
                    project.id,
                    project.created_at.as_deref().unwrap_or("-"),
                    project.title
                );
            }
        }
        Command::Project {
            id,
            save_subtitles,
            json,
        } => {
            require_dispatch(
                "project load",
                client.studio.load_project(&ProjectId::new(id)).await?,
            )?;
            let session = client.studio.snapshot().await;
            let Some(artifact) = session.artifact() else {
                bail!("project load failed: {}", session.message);
            };
            print_artifact(artifact, json)?;
            save_outputs(&client, artifact, save_subtitles, false).await?;
        }
    }

    Ok(())
}
