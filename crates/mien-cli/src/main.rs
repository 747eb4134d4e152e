use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mien_core::{
    ComparisonResult, DetectionOutcome, FaceMatcher, FaceObservation, GeometricMatcher,
};
use mien_session::{
    spawn_session, FailureReason, Photo, ReplayDetector, SessionHandle, SessionState,
};
use mien_store::Registry;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "mien", about = "Mien face verification CLI")]
struct Cli {
    /// Emit machine-readable JSON instead of human-oriented output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user from a reference photo and its face observation
    Register {
        /// Username to register
        #[arg(short, long)]
        username: String,
        /// Reference photo (PNG or JPEG)
        #[arg(short, long)]
        photo: PathBuf,
        /// Face observation JSON produced by an external detector
        #[arg(short, long)]
        observation: PathBuf,
    },
    /// Verify a live capture against a registered user
    Verify {
        /// Username to verify against
        #[arg(short, long)]
        username: String,
        /// Live face observation JSON
        #[arg(short, long)]
        live: PathBuf,
        /// Live photo the observation was extracted from (optional)
        #[arg(long)]
        live_photo: Option<PathBuf>,
    },
    /// Compare two face observation files directly
    Compare {
        /// Reference observation JSON
        #[arg(short, long)]
        reference: PathBuf,
        /// Live observation JSON
        #[arg(short, long)]
        live: PathBuf,
    },
    /// List registered users
    List,
    /// Remove a registered user
    Remove {
        /// Username to remove
        username: String,
    },
    /// Summarize a face observation file
    Inspect {
        /// Observation JSON to inspect
        observation: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!(
        db_path = %config.db_path.display(),
        center_threshold = config.center_threshold,
        landmark_threshold = config.landmark_threshold,
        "configuration loaded"
    );

    match cli.command {
        Commands::Register {
            username,
            photo,
            observation,
        } => run_register(&config, &username, &photo, &observation, cli.json),
        Commands::Verify {
            username,
            live,
            live_photo,
        } => run_verify(&config, &username, &live, live_photo.as_deref(), cli.json).await,
        Commands::Compare { reference, live } => run_compare(&config, &reference, &live, cli.json),
        Commands::List => run_list(&config, cli.json),
        Commands::Remove { username } => run_remove(&config, &username, cli.json),
        Commands::Inspect { observation } => run_inspect(&observation, cli.json),
    }
}

fn run_register(
    config: &Config,
    username: &str,
    photo_path: &Path,
    observation_path: &Path,
    json: bool,
) -> Result<ExitCode> {
    let registry = open_registry(config)?;
    let observation = read_observation(observation_path)?;

    let bytes = std::fs::read(photo_path)
        .with_context(|| format!("failed to read {}", photo_path.display()))?;
    let photo = Photo::from_encoded_bytes(&bytes)
        .with_context(|| format!("failed to decode {}", photo_path.display()))?;
    let photo_png = photo.to_png_bytes()?;

    let user = registry.register(username, photo_png, &observation)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        println!("registered {} ({})", user.username, user.id);
    }
    Ok(ExitCode::SUCCESS)
}

/// Drive the full verification workflow: the replay detector yields the
/// stored reference observation for the first capture and the supplied
/// live observation for the second.
async fn run_verify(
    config: &Config,
    username: &str,
    live_path: &Path,
    live_photo: Option<&Path>,
    json: bool,
) -> Result<ExitCode> {
    let registry = open_registry(config)?;
    let user = registry
        .lookup(username)?
        .with_context(|| format!("user {username:?} is not registered"))?;
    let live_observation = read_observation(live_path)?;

    let reference_photo = Photo::from_encoded_bytes(&user.photo_png)
        .context("stored reference photo is not a decodable image")?;
    let live_photo = match live_photo {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Photo::from_encoded_bytes(&bytes)
                .with_context(|| format!("failed to decode {}", path.display()))?
        }
        // The replay detector keys on submission order, not pixels.
        None => Photo::from_gray(vec![0], 1, 1)?,
    };

    let detector = ReplayDetector::new([
        DetectionOutcome::Detected(user.observation.clone()),
        DetectionOutcome::Detected(live_observation),
    ]);
    let matcher = GeometricMatcher::new(config.decision_config());
    let handle = spawn_session(Arc::new(detector), Box::new(matcher));

    handle.start_registration().await?;
    handle.submit_reference_photo(reference_photo).await?;
    if let Some(reason) = wait_for_live_phase(&handle).await? {
        return report_failure(&reason, json);
    }
    handle.submit_live_photo(live_photo).await?;

    match handle.wait_until_settled().await? {
        SessionState::Resolved(result) => report_result(&result, json),
        SessionState::Failed(reason) => report_failure(&reason, json),
        other => anyhow::bail!("session settled in unexpected state {}", other.name()),
    }
}

fn run_compare(
    config: &Config,
    reference_path: &Path,
    live_path: &Path,
    json: bool,
) -> Result<ExitCode> {
    let reference = read_observation(reference_path)?;
    let live = read_observation(live_path)?;
    let matcher = GeometricMatcher::new(config.decision_config());
    let result = matcher.compare(&reference, &live);
    report_result(&result, json)
}

fn run_list(config: &Config, json: bool) -> Result<ExitCode> {
    let registry = open_registry(config)?;
    let users = registry.list()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
    } else if users.is_empty() {
        println!("no users registered");
    } else {
        for user in &users {
            println!(
                "{}  {}  {}",
                user.username,
                user.id,
                user.created_at.to_rfc3339()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_remove(config: &Config, username: &str, json: bool) -> Result<ExitCode> {
    let registry = open_registry(config)?;
    let removed = registry.remove(username)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "username": username, "removed": removed })
        );
    } else if removed {
        println!("removed {username}");
    } else {
        println!("user {username:?} is not registered");
    }
    Ok(if removed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_inspect(observation_path: &Path, json: bool) -> Result<ExitCode> {
    let observation = read_observation(observation_path)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "observation": observation,
                "has_core_landmarks": observation.has_core_landmarks(),
            }))?
        );
        return Ok(ExitCode::SUCCESS);
    }

    let bb = observation.bounding_box;
    let center = bb.center();
    println!(
        "bounding box: {:.0}x{:.0} at ({:.0}, {:.0})",
        bb.width(),
        bb.height(),
        bb.left,
        bb.top
    );
    println!("center: ({:.1}, {:.1})", center.x, center.y);
    if observation.landmarks.is_empty() {
        println!("landmarks: none");
    } else {
        let names: Vec<&str> = observation.landmarks.keys().map(|k| k.name()).collect();
        println!("landmarks: {}", names.join(", "));
    }
    println!(
        "core landmarks: {}",
        if observation.has_core_landmarks() {
            "present"
        } else {
            "missing"
        }
    );
    if let Some(id) = observation.tracking_id {
        println!("tracking id: {id}");
    }
    if let Some(p) = observation.attributes.smiling {
        println!("smiling: {p:.2}");
    }
    if let Some(p) = observation.attributes.left_eye_open {
        println!("left eye open: {p:.2}");
    }
    if let Some(p) = observation.attributes.right_eye_open {
        println!("right eye open: {p:.2}");
    }
    Ok(ExitCode::SUCCESS)
}

fn open_registry(config: &Config) -> Result<Registry> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Registry::open(&config.db_path)
        .with_context(|| format!("failed to open registry at {}", config.db_path.display()))
}

fn read_observation(path: &Path) -> Result<FaceObservation> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read observation file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("invalid observation JSON in {}", path.display()))
}

/// Wait until the session wants the live capture, or surface the failure
/// if the reference side already failed.
async fn wait_for_live_phase(handle: &SessionHandle) -> Result<Option<FailureReason>> {
    let mut rx = handle.subscribe();
    loop {
        let state = rx.borrow_and_update().clone();
        match state {
            SessionState::AwaitingLiveCapture => return Ok(None),
            SessionState::Failed(reason) => return Ok(Some(reason)),
            _ => {}
        }
        rx.changed()
            .await
            .map_err(|_| anyhow::anyhow!("session task exited"))?;
    }
}

fn report_result(result: &ComparisonResult, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        let verdict = if result.is_match { "match" } else { "no match" };
        println!("verdict: {verdict} (confidence {:.2})", result.confidence);
        println!("center distance: {:.2}px", result.center_distance);
        match result.mean_landmark_distance {
            Some(d) => println!("mean landmark distance: {:.2}px", d),
            None => println!("mean landmark distance: unavailable; decision used centers only"),
        }
    }
    Ok(if result.is_match {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report_failure(reason: &FailureReason, json: bool) -> Result<ExitCode> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "is_match": false,
                "failure": reason.to_string(),
            }))?
        );
    } else {
        println!("verification failed: {reason}");
    }
    Ok(ExitCode::FAILURE)
}
