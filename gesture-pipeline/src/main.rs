//! Glove Pipeline - Sign-language gesture recognition from glove sensors
//!
//! Runs the sensor-to-text pipeline against a simulated glove.

use gesture_pipeline::app::cli::{Cli, Commands, ConfigAction, ScriptStep};
use gesture_pipeline::app::config::Config;
use gesture_pipeline::output::haptic::RecordingActuator;
use gesture_pipeline::output::notify::RecordingLink;
use gesture_pipeline::output::text::TextAccumulator;
use gesture_pipeline::pipeline::{PipelineBuilder, PipelineHandle};
use gesture_pipeline::recognition::Vocabulary;
use gesture_pipeline::sensors::{HandPose, SimulatedGlove};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Granularity of the script player's stop checks
const PLAYER_SLICE: Duration = Duration::from_millis(20);

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = cli.config_path();

    match cli.command {
        Commands::Run { duration, script } => {
            let config = load_config(cli.config.as_ref())?;
            run_pipeline(duration, script, config, cli.verbose)?;
        }
        Commands::Vocabulary { path } => {
            let config = load_config(cli.config.as_ref())?;
            run_vocabulary(path, &config)?;
        }
        Commands::Config { action } => {
            run_config(action, cli.config.as_ref(), &config_path)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

fn run_pipeline(
    duration: u64,
    script: Vec<ScriptStep>,
    config: Config,
    verbose: bool,
) -> anyhow::Result<()> {
    let mode = config.output.mode;
    let glove = SimulatedGlove::with_pose(HandPose::relaxed());
    let link = RecordingLink::new();
    let actuator = RecordingActuator::new();
    let text = TextAccumulator::new();
    let sentence = text.view();

    let mut builder = PipelineBuilder::new(config.clone())
        .with_drivers(glove.drivers())
        .with_text_accumulator(text);
    if mode.wants_notify() {
        builder = builder.with_wireless_link(Box::new(link.clone()));
    }
    if mode.wants_haptic(config.output.haptic_intensity) {
        builder = builder.with_haptic_actuator(Box::new(actuator.clone()));
    }

    let handle = builder.spawn()?;

    let stop_flag = handle.stop_flag();
    ctrlc::set_handler(move || {
        stop_flag.store(true, std::sync::atomic::Ordering::SeqCst);
    })?;

    if duration == 0 {
        info!("Running until Ctrl+C");
    } else {
        info!("Running for {} seconds", duration);
    }

    let deadline = (duration > 0).then(|| Instant::now() + Duration::from_secs(duration));

    for step in &script {
        info!("Pose '{}' for {:?}", step.name, step.hold);
        glove.set_pose(step.pose);
        if !hold(&handle, Some(Instant::now() + step.hold), deadline) {
            break;
        }
    }
    hold(&handle, None, deadline);

    let stats = handle.shutdown()?;

    if mode.wants_text() {
        println!("Text: {:?}", sentence.text());
    }
    if mode.wants_notify() {
        println!("Notifications sent: {}", link.frames().len());
    }
    if actuator.pulses() > 0 {
        println!("Haptic pulses: {}", actuator.pulses());
    }
    println!(
        "Samples: {} emitted, {} dropped; gestures recognized: {}",
        stats.sampler.emitted, stats.sampler.dropped, stats.processing.recognized
    );
    if verbose {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}

/// Sleep until `until` (or the run deadline), returning false once the
/// run should end
fn hold(handle: &PipelineHandle, until: Option<Instant>, deadline: Option<Instant>) -> bool {
    let end = match (until, deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    loop {
        if handle.is_stopping() {
            return false;
        }
        let now = Instant::now();
        if let Some(deadline) = deadline {
            if now >= deadline {
                return false;
            }
        }
        match end {
            Some(end) if now >= end => return true,
            Some(end) => std::thread::sleep(PLAYER_SLICE.min(end - now)),
            None => std::thread::sleep(PLAYER_SLICE),
        }
    }
}

fn run_vocabulary(path: Option<PathBuf>, config: &Config) -> anyhow::Result<()> {
    let path = path.or_else(|| config.classifier.vocabulary_path.clone());
    let vocabulary = match &path {
        Some(path) => Vocabulary::load(path)?,
        None => Vocabulary::builtin(),
    };

    match &path {
        Some(path) => println!("Vocabulary {:?} ({} templates)\n", path, vocabulary.len()),
        None => println!("Built-in vocabulary ({} templates)\n", vocabulary.len()),
    }

    for (index, template) in vocabulary.iter().enumerate() {
        let kind = if template.is_dynamic { "dynamic" } else { "static" };
        let threshold = template
            .confidence_threshold
            .map(|t| format!("{:.2}", t))
            .unwrap_or_else(|| "default".to_string());
        println!(
            "  {:>2}  {:<12} {:<8} features={:<3} threshold={}",
            index, template.name, kind, template.feature_count, threshold
        );
    }

    Ok(())
}

fn run_config(
    action: ConfigAction,
    explicit: Option<&PathBuf>,
    config_path: &PathBuf,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(explicit)?;
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                warn!("Config already exists at {:?}", config_path);
                println!("Use --force to overwrite");
                return Ok(());
            }
            Config::default().save(config_path)?;
            println!("Wrote default configuration to {:?}", config_path);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}
