//! Command-Line Interface

use crate::sensors::simulated::HandPose;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Glove Pipeline - Recognize sign-language gestures from glove sensor streams
#[derive(Parser, Debug)]
#[command(name = "glove-pipeline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline against the simulated glove
    Run {
        /// Run duration in seconds (0 = until Ctrl+C)
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Pose script, e.g. "B:800,rest:400,A:800" (pose:milliseconds)
        #[arg(short, long, value_delimiter = ',', value_parser = parse_script_step)]
        script: Vec<ScriptStep>,
    },

    /// List the templates of the active vocabulary
    Vocabulary {
        /// Vocabulary file (defaults to the configured one, else built-in)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,
}

/// One entry of a pose script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub name: String,
    pub pose: HandPose,
    pub hold: Duration,
}

/// Parse `pose:millis`
pub fn parse_script_step(s: &str) -> Result<ScriptStep, String> {
    let (name, millis) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("expected pose:milliseconds, got '{}'", s))?;
    let pose = HandPose::from_name(name)
        .ok_or_else(|| format!("unknown pose '{}' (try flat, fist, relaxed)", name))?;
    let millis: u64 = millis
        .parse()
        .map_err(|e| format!("invalid duration '{}': {}", millis, e))?;

    Ok(ScriptStep {
        name: name.to_string(),
        pose,
        hold: Duration::from_millis(millis),
    })
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Config path from `--config`, else the default location
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::app::config::Config::default_path)
    }
}
