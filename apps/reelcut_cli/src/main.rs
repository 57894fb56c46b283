//! reelcut: inspect, assemble and export timeline projects.
//!
//! Usage:
//!   reelcut new <PATH>                 Create an empty project
//!   reelcut import <PROJECT> <MEDIA>   Probe a media file and place it on a track
//!   reelcut info <PROJECT>             Show tracks, clips and assets
//!   reelcut active <PROJECT> --at <T>  List the clips on screen at time T
//!   reelcut preview <PROJECT>          Play the project through mpv
//!   reelcut export <PROJECT>           Render the project to a video file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelcut_core::config::{config_file_path, EngineConfig};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "reelcut", about = "Multi-track timeline engine", version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/reelcut/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty project with one video and one audio track
    New {
        /// Project file to create
        path: PathBuf,

        /// Project name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Probe a media file and add it to a project
    Import {
        /// Project file
        project: PathBuf,

        /// Media file to import
        media: PathBuf,

        /// Track to place the clip on (created when missing)
        #[arg(short, long)]
        track: Option<String>,

        /// Desired start time in seconds; defaults to the end of the track
        #[arg(long)]
        at: Option<f64>,
    },

    /// Show project information
    Info {
        /// Project file
        project: PathBuf,

        /// Print the normalized project document as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the clips that are on screen at a given time
    Active {
        /// Project file
        project: PathBuf,

        /// Global time in seconds
        #[arg(long, default_value = "0")]
        at: f64,
    },

    /// Play a project with one mpv process per media clip
    Preview {
        /// Project file
        project: PathBuf,

        /// Start time in seconds
        #[arg(long, default_value = "0")]
        from: f64,
    },

    /// Export a project to video
    Export {
        /// Project file
        project: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output preset: 1080p, 1080p60, 720p, 4k, shorts
        #[arg(long)]
        preset: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(config_file_path);
    let (config, config_error) = match EngineConfig::try_load(&path) {
        Ok(config) => (config, None),
        Err(e) => (EngineConfig::default(), Some(e)),
    };
    logging::init_logging(&config.logging, cli.verbose);
    if let Some(e) = config_error {
        tracing::warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
    }

    match cli.command {
        Commands::New { path, name } => commands::new::run(path, name, &config),
        Commands::Import {
            project,
            media,
            track,
            at,
        } => commands::import::run(project, media, track, at, &config),
        Commands::Info { project, json } => commands::info::run(project, json),
        Commands::Active { project, at } => commands::active::run(project, at),
        Commands::Preview { project, from } => {
            commands::preview::run(project, from, &config).await
        }
        Commands::Export {
            project,
            output,
            preset,
        } => commands::export::run(project, output, preset).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn export_accepts_preset_and_output() {
        let cli = Cli::try_parse_from([
            "reelcut",
            "export",
            "demo.reelcut",
            "-o",
            "out.mp4",
            "--preset",
            "720p",
        ])
        .unwrap();
        match cli.command {
            Commands::Export {
                project,
                output,
                preset,
            } => {
                assert_eq!(project, PathBuf::from("demo.reelcut"));
                assert_eq!(output, Some(PathBuf::from("out.mp4")));
                assert_eq!(preset.as_deref(), Some("720p"));
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["reelcut", "active", "p.reelcut", "--at", "2.5", "-v"])
            .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Active { at, .. } if at == 2.5));
    }
}
