//! Shortsmith CLI — serve the export API or render scenes locally.
//!
//! Usage:
//!   shortsmith serve [--bind ADDR]     Run the HTTP export server
//!   shortsmith render [OPTIONS]        Render a scene from local files
//!   shortsmith check                   Check engine and font availability

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use shortsmith_common::config::AppConfig;
use shortsmith_scene_model::RenderMode;

mod commands;
mod server;

#[derive(Parser)]
#[command(
    name = "shortsmith",
    about = "Render short vertical videos from clips and declarative styling",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/shortsmith/config.json)
    #[arg(short, long, global = true, env = "SHORTSMITH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP export server
    Serve {
        /// Address to bind (overrides the config file)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Render a scene from local files
    Render {
        /// Layout to render
        #[arg(long, value_enum)]
        mode: ModeArg,

        /// Scene config JSON (same shape as the API `config` field)
        #[arg(long = "scene")]
        scene: Option<PathBuf>,

        /// Ranking clip, repeat in render order
        #[arg(long = "clip")]
        clips: Vec<PathBuf>,

        /// Split-screen main clip
        #[arg(long)]
        main: Option<PathBuf>,

        /// Split-screen background clip
        #[arg(long)]
        background: Option<PathBuf>,

        /// Background music
        #[arg(long)]
        music: Option<PathBuf>,

        /// Output file (defaults to a generated name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the engine command instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check engine and font availability
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Ranking,
    Splitscreen,
}

impl From<ModeArg> for RenderMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Ranking => RenderMode::Ranking,
            ModeArg::Splitscreen => RenderMode::SplitScreen,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    shortsmith_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Serve { bind } => commands::serve::run(config, bind).await,
        Commands::Render {
            mode,
            scene,
            clips,
            main,
            background,
            music,
            output,
            dry_run,
        } => {
            commands::render::run(
                config,
                commands::render::RenderArgs {
                    mode: mode.into(),
                    scene,
                    clips,
                    main,
                    background,
                    music,
                    output,
                    dry_run,
                },
            )
            .await
        }
        Commands::Check => commands::check::run(config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from([
            "shortsmith",
            "render",
            "--mode",
            "ranking",
            "--clip",
            "a.mp4",
            "--clip",
            "b.mp4",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Render {
                mode, clips, dry_run, ..
            } => {
                assert_eq!(RenderMode::from(mode), RenderMode::Ranking);
                assert_eq!(clips, vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")]);
                assert!(dry_run);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_scene_file_and_app_config_are_separate_flags() {
        let cli = Cli::try_parse_from([
            "shortsmith",
            "render",
            "--config",
            "app.json",
            "--mode",
            "splitscreen",
            "--scene",
            "split.json",
            "--main",
            "talk.mp4",
            "--background",
            "bg.mp4",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("app.json")));
        match cli.command {
            Commands::Render { scene, main, .. } => {
                assert_eq!(scene, Some(PathBuf::from("split.json")));
                assert_eq!(main, Some(PathBuf::from("talk.mp4")));
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_parse_serve_bind() {
        let cli = Cli::try_parse_from(["shortsmith", "-v", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Serve { bind } => assert_eq!(bind, Some("0.0.0.0:9000".parse().unwrap())),
            _ => panic!("expected serve"),
        }
    }
}
