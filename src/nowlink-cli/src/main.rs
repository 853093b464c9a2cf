use anyhow::Result;
use clap::{Parser, Subcommand};
use nowlink_core::{init_logging, AppDirs, Config};
use nowlink_remote::{
    CommandRunner, HelperCommand, HelperConfig, RemoteController, RemoteEvent,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "nowlink", version, about = "Now-playing bridge for the media-remote helper")]
struct Cli {
    /// Helper executable override (takes precedence over config)
    #[arg(long, global = true)]
    helper: Option<PathBuf>,
    /// Helper binding-path override (takes precedence over config)
    #[arg(long, global = true)]
    binding: Option<PathBuf>,
    /// Bundle identifier of the target player
    #[arg(long, global = true)]
    target: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream now-playing events to stdout until interrupted
    Watch,
    /// Resume playback
    Play,
    /// Pause playback
    Pause,
    /// Toggle between play and pause
    Toggle,
    /// Skip to the next track
    Next,
    /// Return to the previous track
    Previous,
    /// Stop playback
    Stop,
    /// Seek to an absolute position
    Seek {
        /// Position in seconds
        seconds: f64,
    },
    /// Print the current now-playing state
    Get {
        /// Print the raw JSON event instead of a summary line
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = Config::load_or_default(&dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;
    let helper = helper_config(&cli, &config)?;

    match cli.command {
        Command::Watch => watch(helper).await,
        Command::Play => run_command(helper, HelperCommand::Play).await,
        Command::Pause => run_command(helper, HelperCommand::Pause).await,
        Command::Toggle => run_command(helper, HelperCommand::TogglePlayPause).await,
        Command::Next => run_command(helper, HelperCommand::NextTrack).await,
        Command::Previous => run_command(helper, HelperCommand::PreviousTrack).await,
        Command::Stop => run_command(helper, HelperCommand::Stop).await,
        Command::Seek { seconds } => run_command(helper, HelperCommand::SetTime(seconds)).await,
        Command::Get { json } => get(helper, json).await,
    }
}

/// Merges CLI overrides into the file config and resolves the helper setup.
fn helper_config(cli: &Cli, config: &Config) -> Result<HelperConfig> {
    let mut merged = config.clone();
    if let Some(path) = &cli.helper {
        merged.helper.path = Some(path.clone());
    }
    if let Some(binding) = &cli.binding {
        merged.helper.binding = Some(binding.clone());
    }
    if let Some(target) = &cli.target {
        merged.helper.target_id = Some(target.clone());
    }
    Ok(HelperConfig::from_config(&merged)?)
}

async fn watch(helper: HelperConfig) -> Result<()> {
    let (mut controller, mut events) = RemoteController::new(helper);
    controller.start_listening();
    tracing::info!("watching now-playing events (ctrl-c to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(RemoteEvent::ListenerTerminated) => {
                    println!("listener terminated");
                    break;
                }
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }

    controller.stop_listening().await;
    Ok(())
}

fn print_event(event: &RemoteEvent) {
    match event {
        RemoteEvent::Track(Some(event)) => println!("track: {}", describe(event)),
        RemoteEvent::Track(None) => println!("no active player"),
        RemoteEvent::PlaybackTime(seconds) => println!("position: {seconds:.1}s"),
        RemoteEvent::DecodeError { source, raw } => {
            eprintln!("decode error: {source} ({} raw bytes)", raw.len());
        }
        RemoteEvent::ListenerTerminated => println!("listener terminated"),
    }
}

async fn run_command(helper: HelperConfig, command: HelperCommand) -> Result<()> {
    let runner = CommandRunner::new(helper);
    let output = runner.run(command).await?;

    if !output.stdout.is_empty() {
        println!("{}", output.stdout);
    }
    if !output.success() {
        if !output.stderr.is_empty() {
            eprintln!("{}", output.stderr);
        }
        std::process::exit(output.status.code().unwrap_or(1));
    }
    Ok(())
}

async fn get(helper: HelperConfig, json: bool) -> Result<()> {
    let runner = CommandRunner::new(helper);
    match runner.fetch_now_playing().await? {
        Some(event) if json => println!("{}", serde_json::to_string_pretty(&event)?),
        Some(event) => println!("{}", describe(&event)),
        None => println!("no active player"),
    }
    Ok(())
}

fn describe(event: &nowlink_core::TrackEvent) -> String {
    let payload = &event.payload;
    let mut line = format!(
        "{} — {}",
        payload.title.as_deref().unwrap_or("(unknown title)"),
        payload.artist.as_deref().unwrap_or("(unknown artist)"),
    );
    if let Some(album) = &payload.album {
        line.push_str(&format!(" ({album})"));
    }
    match payload.is_playing {
        Some(true) => line.push_str(" [playing]"),
        Some(false) => line.push_str(" [paused]"),
        None => {}
    }
    if let Some(elapsed) = payload.elapsed_time_micros {
        line.push_str(&format!(" at {:.1}s", elapsed / 1_000_000.0));
    }
    line
}
