// SPDX-License-Identifier: MIT OR Apache-2.0
//! `ShadeGraph` Editor - node-based material graph editor
//!
//! Edits a single material file: nodes are placed from a palette, wired
//! socket to socket, and tuned in the inspector. Every edit is undoable and
//! the material is autosaved shortly after editing stops.
//!
//! ## Usage
//!
//! ```text
//! shadegraph_editor [--config PATH] [--replay SCRIPT] [MATERIAL]
//! ```
//!
//! With `--replay` the editor runs headless, applying the scripted steps to
//! the material and saving it before exit.

mod app;
mod config;
mod replay;
mod store;
mod watcher;

use app::{AppError, ShadeGraphApp};
use config::{AppConfig, CONFIG_FILE};
use shadegraph_editor_graph::{LogStatusSink, ManualClock, MaterialGraphEditor, NodeRegistry, SurfaceCompiler};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use store::FileMaterialStore;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    replay: Option<PathBuf>,
    material: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    parsed.config = Some(args.next().ok_or("--config needs a path")?.into());
                }
                "--replay" => {
                    parsed.replay = Some(args.next().ok_or("--replay needs a script")?.into());
                }
                flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
                _ if parsed.material.is_some() => return Err(format!("unexpected argument {arg}")),
                _ => parsed.material = Some(arg.into()),
            }
        }
        Ok(parsed)
    }
}

fn replay(config: &AppConfig, script_path: &Path, material: PathBuf) -> Result<(), AppError> {
    let script = replay::Script::load(script_path)?;
    let store = FileMaterialStore::new(material);
    tracing::info!("Replaying {} against {}", script_path.display(), store.path().display());

    let registry = Arc::new(NodeRegistry::new());
    let clock = ManualClock::new();
    let mut editor = MaterialGraphEditor::open(
        config.editor_settings(),
        Arc::clone(&registry),
        Box::new(store),
        Some(Box::new(SurfaceCompiler::new(registry))),
        Box::new(LogStatusSink),
        Rc::new(clock.clone()),
    )?;

    let summary = replay::run(&script, &mut editor, &clock)?;
    editor.close().map_err(replay::ReplayError::from)?;
    tracing::info!(
        "Replayed {} steps: {} nodes, {} connections, preview {}",
        summary.steps,
        summary.nodes,
        summary.connections,
        if summary.has_preview { "ready" } else { "unavailable" }
    );
    Ok(())
}

fn main() {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("usage: shadegraph_editor [--config PATH] [--replay SCRIPT] [MATERIAL]");
            std::process::exit(2);
        }
    };

    let config_path = args.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let (config, config_error) = match AppConfig::load(&config_path) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ShadeGraph Editor v{}", env!("CARGO_PKG_VERSION"));
    match config_error {
        Some(err) => tracing::warn!("Ignoring {}: {err}", config_path.display()),
        None if !config_path.exists() => match config.save(&config_path) {
            Ok(()) => tracing::info!("Wrote default config to {}", config_path.display()),
            Err(err) => tracing::warn!("Could not write {}: {err}", config_path.display()),
        },
        None => {}
    }

    let material = args.material.unwrap_or_else(|| config.material_path.clone());
    let result = match &args.replay {
        Some(script) => replay(&config, script, material),
        None => ShadeGraphApp::new(config, &material).and_then(ShadeGraphApp::run),
    };

    if let Err(e) = result {
        tracing::error!("Editor crashed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, String> {
        Args::parse(args.iter().map(ToString::to_string))
    }

    #[test]
    fn test_parse_args() {
        let args = parse(&["--config", "a.ron", "--replay", "s.ron", "m.json"]).unwrap();
        assert_eq!(
            args,
            Args {
                config: Some("a.ron".into()),
                replay: Some("s.ron".into()),
                material: Some("m.json".into()),
            }
        );
        assert_eq!(parse(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
        assert!(parse(&["a.json", "b.json"]).is_err());
    }
}
