//! rill - streaming terminal chat client

mod commands;
mod config;
mod ui;

use clap::Parser;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use rill_ai::providers::openai::{OPENROUTER_API_KEY_ENV, OpenAiCompatGateway};
use rill_ai::{DecoderConfig, models};
use rill_chat::{ChatHandle, Controller, ControllerConfig, Submission};
use tracing_subscriber::EnvFilter;

/// rill - chat with OpenRouter models from the terminal
#[derive(Parser, Debug)]
#[command(name = "rill")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: openai/gpt-oss-120b)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature, 0.0 - 2.0 (default: 0.7)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// OpenAI-compatible endpoint root (default: OpenRouter)
    #[arg(long)]
    base_url: Option<String>,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// List catalogued models
    #[arg(long)]
    list_models: bool,
}

/// Settings after merging CLI flags, config file and environment
#[derive(Debug, Clone)]
struct Settings {
    controller: ControllerConfig,
    base_url: Option<String>,
    api_key: Option<String>,
}

fn resolve_settings(args: &Args, cfg: &config::Config) -> anyhow::Result<Settings> {
    let model_id = args
        .model
        .clone()
        .or(cfg.model.clone())
        .unwrap_or_else(|| models::DEFAULT_MODEL_ID.to_string());

    let temperature = args
        .temperature
        .or(cfg.temperature)
        .unwrap_or(rill_ai::types::DEFAULT_TEMPERATURE);
    rill_ai::types::validate_temperature(temperature)?;

    Ok(Settings {
        controller: ControllerConfig {
            model_id,
            temperature,
            read_timeout: cfg.read_timeout_secs.map(Duration::from_secs),
            stream_timeout: cfg.stream_timeout_secs.map(Duration::from_secs),
            decoder: DecoderConfig {
                max_malformed_lines: cfg.malformed_line_cap(),
            },
            ..Default::default()
        },
        base_url: args.base_url.clone().or(cfg.base_url.clone()),
        api_key: cfg.get_api_key(),
    })
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rill=debug,rill_ai=debug,rill_chat=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);
    dotenvy::dotenv().ok();

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if args.list_models {
        let current = args.model.as_deref().unwrap_or(models::DEFAULT_MODEL_ID);
        println!("{}", commands::ModelCommand::list_models_text(current));
        return Ok(());
    }

    let cfg = config::Config::load();
    let settings = resolve_settings(&args, &cfg)?;

    if settings.api_key.is_none() {
        eprintln!("Warning: no API key found.");
        eprintln!("Set it with: export {}=your-key", OPENROUTER_API_KEY_ENV);
        eprintln!("Or add it to the config file: rill --init-config");
        eprintln!();
    }

    let mut gateway = OpenAiCompatGateway::with_optional_key(settings.api_key.clone());
    if let Some(base_url) = &settings.base_url {
        gateway = gateway.with_base_url(base_url.as_str());
    }
    tracing::debug!(base_url = gateway.base_url(), "gateway configured");

    let chat = Controller::new(Arc::new(gateway), settings.controller);
    spawn_interrupt_handler(chat.handle());

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&chat, &command).await;
    }

    run_interactive(&chat).await
}

/// Ctrl-C stops a streaming reply; pressed while idle it exits.
fn spawn_interrupt_handler(handle: ChatHandle) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !handle.cancel() {
                eprintln!();
                std::process::exit(130);
            }
            tracing::debug!("turn cancelled from keyboard");
        }
    });
}

async fn run_command(chat: &Controller, command: &str) -> anyhow::Result<()> {
    let mut renderer = ui::Renderer::new(io::stdout(), io::stdout().is_terminal());
    match ui::run_turn(chat, command, &mut renderer).await {
        Submission::Completed => Ok(()),
        Submission::Failed(e) => Err(e.into()),
        Submission::Cancelled => std::process::exit(130),
        Submission::Rejected(reason) => anyhow::bail!("prompt not sent: {:?}", reason),
    }
}

async fn run_interactive(chat: &Controller) -> anyhow::Result<()> {
    let is_tty = io::stdout().is_terminal();

    // Show minimal startup info (only if TTY)
    if io::stderr().is_terminal() {
        let settings = chat.settings();
        eprintln!("rill ({}, temperature {:.1})", settings.model_id, settings.temperature);
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        let settings = chat.settings();
        if let Some(result) =
            commands::execute_command(input, &settings.model_id, settings.temperature)
        {
            match result {
                commands::CommandResult::Clear => {
                    chat.clear();
                    println!("Cleared conversation.");
                }
                commands::CommandResult::Exit => {
                    break;
                }
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                }
                commands::CommandResult::ChangeModel(model_id) => {
                    println!("Switched to: {}", model_id);
                    chat.set_model(model_id);
                }
                commands::CommandResult::ChangeTemperature(temperature) => {
                    match chat.set_temperature(temperature) {
                        Ok(()) => println!("Temperature set to: {:.1}", temperature),
                        Err(e) => println!("{}", e),
                    }
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();
        let mut renderer = ui::Renderer::new(io::stdout(), is_tty);
        let outcome = ui::run_turn(chat, input, &mut renderer).await;
        if let Submission::Rejected(reason) = outcome {
            tracing::debug!("input ignored: {:?}", reason);
        }
        println!();
    }

    Ok(())
}
