use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

mod app;
mod config;
mod data_uri;
mod error;
mod gemini;
mod handler;
mod logging;
mod preview;
mod prompt;
mod tui;
mod ui;

use app::{App, AppStatus};
use config::Config;
use gemini::GeminiClient;
use logging::LogTarget;

#[derive(Parser)]
#[command(name = "architect")]
#[command(version, about = "Turn product photos into three-view orthographic drawings")]
struct Cli {
    /// Product photo to load on startup
    #[arg(short, long, global = true)]
    image: Option<PathBuf>,

    /// Drafting context (materials, features to preserve)
    #[arg(short, long, global = true)]
    context: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a drawing without the TUI and export it as PNG
    Generate {
        /// Directory for the exported PNG (defaults to the configured export dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,
    /// Set a value: model, endpoint, api-key or export-dir (empty clears)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => run_tui(cli.image, cli.context, cli.verbose).await,
        Some(Commands::Generate { output, json }) => {
            logging::init(LogTarget::Stderr, cli.verbose)?;
            let image = cli.image.context("--image is required for generate")?;
            run_headless(image, cli.context, output, json).await
        }
        Some(Commands::Config { action }) => run_config(action),
    }
}

async fn run_tui(image: Option<PathBuf>, context: Option<String>, verbose: bool) -> Result<()> {
    let log_path = logging::init(LogTarget::File, verbose)?;
    let config = Config::load()?;
    info!(log = ?log_path, model = %config.model, "starting vision architect");

    let mut app = App::new(Arc::new(GeminiClient::new(&config)), config.export_dir());
    if let Some(context) = context {
        app.context.insert_str(&context);
    }
    if let Some(path) = image {
        app.begin_upload(path);
    }
    if config::resolve_api_key(config.api_key.as_deref()).is_none() {
        app.notice = Some(
            "No API key found. Set GEMINI_API_KEY or run `architect config set api-key <KEY>`".to_string(),
        );
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("exiting");
    result
}

async fn run_headless(
    image: PathBuf,
    context: Option<String>,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = Config::load()?;
    let mut app = App::new(Arc::new(GeminiClient::new(&config)), config.export_dir());
    if let Some(context) = context {
        app.context.insert_str(&context);
    }

    app.begin_upload(image);
    app.wait_for_tasks().await;
    if app.selected_image.is_none() {
        bail!(app.notice.take().unwrap_or_else(|| "Could not load image".to_string()));
    }

    app.submit();
    app.wait_for_tasks().await;

    if app.status != AppStatus::Success {
        let message = app
            .error
            .take()
            .unwrap_or_else(|| error::GENERIC_FAILURE_MESSAGE.to_string());
        if json {
            println!("{}", serde_json::json!({ "status": "error", "error": message }));
        }
        bail!(message);
    }

    let dir = output.unwrap_or_else(|| app.export_dir.clone());
    let path = app.export_result(&dir)?;
    let result = app.result.as_ref().context("Generation finished without a result")?;

    if json {
        let body = serde_json::json!({
            "status": "success",
            "path": path,
            "prompt": result.prompt,
            "timestamp": result.timestamp,
            "model": app.model(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{} -> {}", result.prompt, path.display());
    }
    Ok(())
}

fn run_config(action: ConfigAction) -> Result<()> {
    let path = Config::get_config_path()?;
    let mut config = Config::load()?;

    match action {
        ConfigAction::Show => {
            println!("config:     {}", path.display());
            println!("model:      {}", config.model);
            println!("endpoint:   {}", config.endpoint);
            println!("export-dir: {}", config.export_dir().display());
            match config.key_source() {
                Some(source) => println!("api-key:    set ({source})"),
                None => println!("api-key:    not set"),
            }
        }
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("Updated {key} in {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "architect", "generate", "--image", "chair.jpg", "--context", "red chair", "--json",
        ])
        .unwrap();
        assert_eq!(cli.image, Some(PathBuf::from("chair.jpg")));
        assert_eq!(cli.context.as_deref(), Some("red chair"));
        assert!(matches!(cli.command, Some(Commands::Generate { json: true, output: None })));
    }

    #[test]
    fn test_cli_defaults_to_tui() {
        let cli = Cli::try_parse_from(["architect", "--image", "a.png"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_config_set() {
        let cli = Cli::try_parse_from(["architect", "config", "set", "model", "x"]).unwrap();
        match cli.command {
            Some(Commands::Config { action: ConfigAction::Set { key, value } }) => {
                assert_eq!(key, "model");
                assert_eq!(value, "x");
            }
            _ => panic!("expected config set"),
        }
    }
}
