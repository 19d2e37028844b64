mod console;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use bingbong_core::{AppConfig, ChannelSink, MetronomeSession, Tick};
use clap::{Parser, Subcommand};
use console::{Command, TickPrinter, HELP};
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn main() -> bingbong_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { bpm, beats, config } => run_play(config.as_deref(), bpm, beats),
        Commands::Interactive { bpm, config } => run_interactive(config.as_deref(), bpm),
        Commands::Config { config } => {
            let config = load_config(config.as_deref(), None)?;
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, bpm: Option<u32>) -> bingbong_core::Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(bpm) = bpm {
        config.metronome.initial_bpm = bpm;
    }
    config.validate()?;
    Ok(config)
}

fn run_play(path: Option<&Path>, bpm: Option<u32>, beats: Option<u64>) -> bingbong_core::Result<()> {
    let config = load_config(path, bpm)?;
    let printer = TickPrinter::new(config.metronome.sink.clone());
    let (sink, ticks) = ChannelSink::new();
    let mut session = MetronomeSession::new(&config.metronome, sink)?;

    tracing::info!(bpm = session.bpm(), ?beats, "starting playback");
    if beat_limit_reached(0, beats) {
        tracing::info!(played = 0, "playback finished");
        return Ok(());
    }
    // without a beat count, play until stdin closes
    let eof = match beats {
        Some(_) => None,
        None => Some(spawn_stdin_reader()?),
    };

    session.toggle()?;
    let mut played = 0_u64;
    loop {
        match ticks.recv_timeout(POLL_INTERVAL) {
            Ok(tick) => {
                println!("{}", printer.render(&tick));
                played += 1;
                if beat_limit_reached(played, beats) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if let Some(lines) = &eof {
            if matches!(lines.try_recv(), Err(mpsc::TryRecvError::Disconnected)) {
                break;
            }
        }
    }
    session.toggle()?;

    tracing::info!(played, "playback finished");
    Ok(())
}

fn beat_limit_reached(played: u64, beats: Option<u64>) -> bool {
    beats.is_some_and(|limit| played >= limit)
}

fn run_interactive(path: Option<&Path>, bpm: Option<u32>) -> bingbong_core::Result<()> {
    let config = load_config(path, bpm)?;
    let printer = TickPrinter::new(config.metronome.sink.clone());
    let (sink, ticks) = ChannelSink::new();
    let mut session = MetronomeSession::new(&config.metronome, sink)?;
    let lines = spawn_stdin_reader()?;

    println!("{HELP}");
    print_status(&session);

    loop {
        drain_ticks(&ticks, &printer);
        let line = match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        // every failure here is recoverable: report it and keep the prior state
        if let Err(err) = apply(&mut session, command) {
            tracing::debug!(?command, %err, "command rejected");
            println!("{err}");
        }
    }

    if session.is_playing() {
        session.toggle()?;
    }
    Ok(())
}

fn apply(session: &mut MetronomeSession, command: Command) -> bingbong_core::Result<()> {
    match command {
        Command::Toggle => {
            session.toggle()?;
            print_status(session);
        }
        Command::Edit => {
            let staged = session.begin_edit()?;
            println!("editing, staged {staged} bpm");
        }
        Command::Nudge(detents) => {
            let staged = session.nudge(detents)?;
            println!("staged {staged} bpm");
        }
        Command::Set(value) => {
            let staged = session.set_staged(value)?;
            println!("staged {staged} bpm");
        }
        Command::Done => {
            let bpm = session.commit_edit()?;
            println!("tempo set to {bpm} bpm");
        }
        Command::Cancel => {
            session.cancel_edit()?;
            println!("kept {} bpm", session.bpm());
        }
        Command::Status => print_status(session),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

fn print_status(session: &MetronomeSession) {
    let indicator = session.indicator(Instant::now());
    let editing = if session.is_editing() {
        format!(", editing (staged {})", session.edit().staged_bpm())
    } else {
        String::new()
    };
    println!(
        "{} bpm, {}{editing}",
        session.bpm(),
        console::describe(&indicator)
    );
}

fn drain_ticks(ticks: &Receiver<Tick>, printer: &TickPrinter) {
    for tick in ticks.try_iter() {
        println!("{}", printer.render(&tick));
    }
}

/// Reads stdin on a helper thread so the owning thread never blocks on input.
/// The channel disconnects at end of input.
fn spawn_stdin_reader() -> bingbong_core::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("bingbong-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Wrist-sized metronome", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play ticks at a fixed tempo.
    Play {
        /// Tempo in beats per minute. Overrides the configuration file.
        #[arg(short, long)]
        bpm: Option<u32>,
        /// Stop after this many ticks. Without it, play until stdin closes.
        #[arg(short = 'n', long)]
        beats: Option<u64>,
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Drive the metronome with line commands on stdin.
    Interactive {
        /// Initial tempo in beats per minute.
        #[arg(short, long)]
        bpm: Option<u32>,
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration as JSON.
    Config {
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use bingbong_core::{NullSink, StagePolicy};

    use super::*;

    fn session() -> MetronomeSession {
        MetronomeSession::new(&AppConfig::default().metronome, NullSink).unwrap()
    }

    #[test]
    fn cli_flag_overrides_initial_bpm() {
        let config = load_config(None, Some(77)).unwrap();
        assert_eq!(config.metronome.initial_bpm, 77);
        assert_eq!(config.metronome.stage_policy, StagePolicy::Clamp);
    }

    #[test]
    fn zero_beats_plays_nothing() {
        assert!(beat_limit_reached(0, Some(0)));
        assert!(!beat_limit_reached(0, Some(1)));
        assert!(beat_limit_reached(1, Some(1)));
        assert!(!beat_limit_reached(1_000, None));
        run_play(None, Some(420), Some(0)).unwrap();
    }

    #[test]
    fn out_of_range_flag_is_rejected() {
        assert!(load_config(None, Some(0)).is_err());
        assert!(load_config(None, Some(421)).is_err());
    }

    #[test]
    fn edit_flow_through_commands() {
        let mut session = session();
        apply(&mut session, Command::Toggle).unwrap();
        apply(&mut session, Command::Edit).unwrap();
        assert!(!session.is_playing());

        apply(&mut session, Command::Set(200)).unwrap();
        apply(&mut session, Command::Nudge(-1)).unwrap();
        apply(&mut session, Command::Done).unwrap();
        assert_eq!(session.bpm(), 199);
        assert!(!session.is_playing());
    }

    #[test]
    fn commands_outside_an_edit_are_reported() {
        let mut session = session();
        assert!(apply(&mut session, Command::Done).is_err());
        assert!(apply(&mut session, Command::Nudge(1)).is_err());
        assert_eq!(session.bpm(), 120);
    }

    #[test]
    fn cli_parses_play_arguments() {
        let cli = Cli::parse_from(["bingbong", "play", "--bpm", "90", "-n", "4"]);
        match cli.command {
            Commands::Play { bpm, beats, config } => {
                assert_eq!(bpm, Some(90));
                assert_eq!(beats, Some(4));
                assert!(config.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
