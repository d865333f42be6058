//! Audio output backends.
//!
//! The session only needs "start this file from this offset" and "how long
//! since that call", so that is all the trait asks for. There is no
//! random-access seek here on purpose: a seek is a reload from an offset.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};
use log::debug;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use crate::{LibraryError, Result};

pub trait AudioEngine {
    /// Replaces whatever is loaded with `path`, starting `start_offset` into
    /// the file.
    fn load_and_play(&mut self, path: &Path, volume: f32, start_offset: Duration) -> Result<()>;

    fn stop(&mut self);

    fn set_volume(&mut self, volume: f32);

    /// Time since the last `load_and_play`, or `None` when nothing is loaded.
    /// This is not a position in the file.
    fn elapsed(&self) -> Option<Duration>;

    /// Whether audio is still coming out.
    fn is_busy(&self) -> bool;
}

/// rodio-backed engine playing on the default output device.
pub struct RodioEngine {
    // Keep this alive for the lifetime of the engine!
    stream: OutputStream,
    sink: Option<Sink>,
    started_at: Option<Instant>,
}

impl RodioEngine {
    /// Fails with `PlaybackUnavailable` when no output device can be opened.
    pub fn open() -> Result<Self> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| LibraryError::PlaybackUnavailable(e.to_string()))?;
        Ok(Self {
            stream,
            sink: None,
            started_at: None,
        })
    }
}

impl AudioEngine for RodioEngine {
    fn load_and_play(&mut self, path: &Path, volume: f32, start_offset: Duration) -> Result<()> {
        self.stop();

        let file = File::open(path)?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| LibraryError::PlaybackLoad(format!("{}: {}", path.display(), e)))?;

        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_volume(volume.clamp(0.0, 1.0));
        sink.append(decoder.skip_duration(start_offset));
        sink.play();

        debug!("Playing {} from {:?}", path.display(), start_offset);
        self.sink = Some(sink);
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.started_at = None;
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(sink) = &self.sink {
            sink.set_volume(volume.clamp(0.0, 1.0));
        }
    }

    fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|started| started.elapsed())
    }

    fn is_busy(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| !sink.empty())
    }
}
