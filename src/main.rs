use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use crossbeam_channel::{Receiver, unbounded};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};
use tracing_subscriber::EnvFilter;
use voxbridge::audio::capture::{CpalAudioSource, list_devices, suppress_audio_warnings};
use voxbridge::audio::{AudioSource, WavAudioSource};
use voxbridge::cli::{Cli, Commands, ConfigAction};
use voxbridge::clock::{ManualClock, SystemClock};
use voxbridge::config::Config;
use voxbridge::llm::OllamaClient;
use voxbridge::recognizer::vosk::VoskLoader;
use voxbridge::session::{SourceFactory, run_session};
use voxbridge::shell::{render_log_line, run_shell, spawn_input_reader};
use voxbridge::speech::{CommandSynthesizer, SpeechQueue};
use voxbridge::{Announcer, CommandHandler, Listener, SessionContext, SessionSettings, ShellEvent};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    tracing::debug!(version = voxbridge::version_string(), "voxbridge starting");

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref(), cli.device)?;
            run_interactive(&config)?;
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Replay { wav }) => {
            let config = load_config(cli.config.as_deref(), cli.device)?;
            run_replay(&config, &wav)?;
        }
        Some(Commands::Ask { prompt }) => {
            let config = load_config(cli.config.as_deref(), cli.device)?;
            run_ask(&config, &prompt.join(" "))?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref(), cli.device)?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxbridge",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Diagnostics go to stderr through tracing; the level follows -q/-v.
fn init_tracing(quiet: bool, verbose: u8) {
    let filter = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "warn,voxbridge=debug",
        (false, _) => "info,voxbridge=trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/voxbridge/config.toml)
/// 3. Built-in defaults
///
/// `--device` overrides the configured input device.
fn load_config(custom_path: Option<&Path>, device: Option<String>) -> Result<Config> {
    let mut config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path())?,
    };

    if device.is_some() {
        config.audio.device = device;
    }

    config.validate()?;
    Ok(config)
}

/// Shared wiring: speech worker, event channel, LLM client, recognizer loader.
fn build_context(config: &Config) -> Result<(SessionContext, Receiver<ShellEvent>, JoinHandle<()>)> {
    let (speech, speech_worker) = SpeechQueue::spawn(CommandSynthesizer::system(&config.speech));
    let (events_tx, events_rx) = unbounded();
    let announcer = Announcer::new(events_tx, speech);

    let llm = OllamaClient::new(&config.llm)?;
    tracing::debug!(endpoint = %llm.endpoint(), "LLM client ready");
    let handler = CommandHandler::new(Arc::new(llm), announcer.clone());

    let context = SessionContext {
        settings: SessionSettings::from_config(config),
        loader: Arc::new(VoskLoader::new(&config.assistant.model_path)),
        announcer,
        handler,
    };

    Ok((context, events_rx, speech_worker))
}

/// Print log lines until every sender is gone.
fn spawn_log_printer(events: Receiver<ShellEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in events {
            match event {
                ShellEvent::Log(line) => render_log_line(&line),
                ShellEvent::Status(status) => tracing::info!(%status, "status"),
                ShellEvent::Listening(_) => {}
            }
        }
    })
}

fn run_interactive(config: &Config) -> Result<()> {
    suppress_audio_warnings();

    let (context, events, _speech_worker) = build_context(config)?;

    let device = config.audio.device.clone();
    let sample_rate = config.audio.sample_rate;
    let sources: SourceFactory = Arc::new(move || -> voxbridge::Result<Box<dyn AudioSource>> {
        let source = CpalAudioSource::new(device.as_deref(), sample_rate)?;
        Ok(Box::new(source) as Box<dyn AudioSource>)
    });

    let mut listener = Listener::new(context, sources, SystemClock);
    let input = spawn_input_reader();
    run_shell(&mut listener, &events, &input);

    // The speech worker is not joined: pending speech is dropped on quit
    Ok(())
}

fn run_replay(config: &Config, wav: &Path) -> Result<()> {
    let (context, events, speech_worker) = build_context(config)?;
    let printer = spawn_log_printer(events);

    let clock = ManualClock::new();
    let sample_rate = config.audio.sample_rate;
    let replay_clock = clock.clone();
    let active = Arc::new(AtomicBool::new(true));

    run_session(
        &context,
        move || {
            let source = WavAudioSource::open(wav, sample_rate)?.with_clock(replay_clock);
            Ok(Box::new(source) as Box<dyn AudioSource>)
        },
        clock,
        &active,
    );

    drop(context);
    join_quietly(printer, "log printer");
    join_quietly(speech_worker, "speech worker");
    Ok(())
}

fn run_ask(config: &Config, prompt: &str) -> Result<()> {
    let (context, events, speech_worker) = build_context(config)?;
    let printer = spawn_log_printer(events);

    context.announcer.note(&format!("> Query: {prompt}"));
    let outcome = context.handler.handle(prompt);

    drop(context);
    join_quietly(printer, "log printer");
    join_quietly(speech_worker, "speech worker");
    outcome.context("LLM query failed")
}

fn join_quietly(handle: JoinHandle<()>, name: &str) {
    if handle.join().is_err() {
        eprintln!("voxbridge: {name} thread panicked");
    }
}

/// List available audio input devices.
fn list_audio_devices() -> Result<()> {
    suppress_audio_warnings();
    let devices = list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&Path>,
    device: Option<String>,
) -> Result<()> {
    match action {
        ConfigAction::Dump => {
            let config = load_config(custom_path, device)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
            if !path.exists() {
                eprintln!("{}", "(not created yet, built-in defaults apply)".dimmed());
            }
        }
    }
    Ok(())
}
