//! Interactive `play` command.
//!
//! Commands typed on stdin are read on a helper thread and handed over a
//! channel; the session itself is only touched from the poll loop here.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use log::{debug, warn};
use crate::audio::engine::AudioEngine;
use crate::audio::session::{format_time, Clock, POLL_INTERVAL};
use crate::library::Library;
use crate::{LibraryError, PlaybackSession, Result, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    /// Seek to a percentage of the track.
    Seek(f64),
    /// Volume in percent.
    Volume(f64),
    Status,
    Stop,
}

impl PlayerCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or_default().to_lowercase();
        let mut percent = || -> Result<f64> {
            let raw = parts
                .next()
                .ok_or_else(|| LibraryError::InvalidInput(format!("`{}` needs a percentage", verb)))?;
            raw.trim_end_matches('%')
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| LibraryError::InvalidInput(format!("not a number: {}", raw)))
        };
        match verb.as_str() {
            "seek" | "s" => Ok(Self::Seek(percent()?)),
            "vol" | "volume" | "v" => Ok(Self::Volume(percent()?)),
            "status" | "" => Ok(Self::Status),
            "stop" | "q" | "quit" => Ok(Self::Stop),
            other => Err(LibraryError::InvalidInput(format!(
                "unknown command `{}` (try seek <pct>, vol <pct>, stop)",
                other
            ))),
        }
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Applies one typed command. Returns `false` once playback should end.
pub fn handle_command<E: AudioEngine, C: Clock>(
    session: &mut PlaybackSession<E, C>,
    command: PlayerCommand,
) -> bool {
    match command {
        PlayerCommand::Seek(pct) => {
            if let Err(e) = session.seek(pct) {
                eprintln!("Seek failed: {}", e);
            }
        }
        PlayerCommand::Volume(pct) => session.set_volume((pct / 100.0) as f32),
        PlayerCommand::Status => println!("{}", session.time_label()),
        PlayerCommand::Stop => {
            session.stop();
            return false;
        }
    }
    session.is_playing()
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Started { filename, song_length, .. } => {
            let length = if *song_length > 0.0 {
                format_time(*song_length)
            } else {
                "--:--".to_string()
            };
            println!("♪ Now playing: {} [{}]", filename, length);
        }
        SessionEvent::Seeked { target } => println!("\nSeeked to {}", format_time(*target)),
        SessionEvent::VolumeChanged { volume } => println!("\nVolume: {:.0}%", volume * 100.0),
        SessionEvent::Stopped { reason } => println!("\n■ Playback {}", reason),
        SessionEvent::Position { .. } => {}
    }
}

/// Plays `id` until it finishes or the user stops it.
pub fn run(library: &Library, id: i64, volume: Option<u8>, start_at: Option<f64>) -> Result<()> {
    let mut session = PlaybackSession::open_default()?;
    if let Some(volume) = volume {
        session.set_volume(f32::from(volume) / 100.0);
    }
    session.set_observer(print_event);

    session.play(library, id)?;
    if let Some(pct) = start_at {
        if let Err(e) = session.seek(pct) {
            warn!("Could not start at {}%: {}", pct, e);
        }
    }

    let commands = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut last_label = String::new();

    while session.is_playing() {
        while stdin_open {
            match commands.try_recv() {
                Ok(line) => match PlayerCommand::parse(&line) {
                    Ok(command) => {
                        if !handle_command(&mut session, command) {
                            break;
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("stdin closed, playing to the end");
                    stdin_open = false;
                }
            }
        }

        if session.poll_tick().is_some() {
            let label = session.time_label();
            if label != last_label {
                print!("\r{} ({:.0}%)", label, session.progress_percent());
                let _ = io::stdout().flush();
                last_label = label;
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}
