//! Playback session state machine.
//!
//! The engine can only start a file from an offset and report time elapsed
//! since that start. The session keeps the offset of the last (re)load and
//! adds it back in, which is how it tracks position and fakes seeking.
//!
//! Everything runs on one thread: the owner calls [`PlaybackSession::poll_tick`]
//! every [`POLL_INTERVAL`] while a track is loaded.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use log::{debug, error, info};
use crate::audio::engine::{AudioEngine, RodioEngine};
use crate::library::Library;
use crate::{LibraryError, MetadataExtractor, Result};

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long the poll loop stays suppressed after a seek.
pub const SEEK_GUARD: Duration = Duration::from_millis(200);
pub const DEFAULT_VOLUME: f32 = 0.7;

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    /// Playing, with position polling suppressed until the seek guard ends.
    Seeking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    User,
    /// `play` was called again for the track already playing.
    Toggled,
    /// Another track was started.
    Replaced,
    Finished,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started {
        track_id: i64,
        filename: String,
        song_length: f64,
    },
    Position {
        position: f64,
        song_length: f64,
    },
    Seeked {
        target: f64,
    },
    VolumeChanged {
        volume: f32,
    },
    Stopped {
        reason: StopReason,
    },
}

/// Absolute position in the file: time since the last reload plus the offset
/// that reload started from, clamped to the track length when it is known.
pub fn absolute_position(elapsed: Duration, start_offset: f64, song_length: f64) -> f64 {
    let position = elapsed.as_secs_f64() + start_offset;
    if song_length > 0.0 {
        position.min(song_length)
    } else {
        position
    }
}

/// Formats seconds as `M:SS`.
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

type Observer = Box<dyn FnMut(&SessionEvent)>;
type DurationProbe = Box<dyn Fn(&Path) -> f64>;

pub struct PlaybackSession<E: AudioEngine, C: Clock = SystemClock> {
    engine: E,
    clock: C,
    state: PlaybackState,
    currently_playing: Option<i64>,
    current_path: Option<PathBuf>,
    volume: f32,
    song_length: f64,
    song_start_time: f64,
    /// Last displayed position, refreshed by `poll_tick` and `seek`.
    position: f64,
    seek_guard_until: Option<Instant>,
    duration_probe: DurationProbe,
    observer: Option<Observer>,
}

impl PlaybackSession<RodioEngine> {
    /// Session on the default output device, or `PlaybackUnavailable`.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(RodioEngine::open()?, SystemClock))
    }
}

impl<E: AudioEngine, C: Clock> PlaybackSession<E, C> {
    pub fn new(engine: E, clock: C) -> Self {
        Self {
            engine,
            clock,
            state: PlaybackState::Idle,
            currently_playing: None,
            current_path: None,
            volume: DEFAULT_VOLUME,
            song_length: 0.0,
            song_start_time: 0.0,
            position: 0.0,
            seek_guard_until: None,
            duration_probe: Box::new(|path: &Path| MetadataExtractor::probe_duration(path)),
            observer: None,
        }
    }

    /// Replaces how track length is determined on `play`.
    pub fn with_duration_probe(mut self, probe: impl Fn(&Path) -> f64 + 'static) -> Self {
        self.duration_probe = Box::new(probe);
        self
    }

    pub fn set_observer(&mut self, observer: impl FnMut(&SessionEvent) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    fn emit(&mut self, event: SessionEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state != PlaybackState::Idle
    }

    pub fn is_seeking(&self) -> bool {
        self.state == PlaybackState::Seeking
    }

    pub fn currently_playing(&self) -> Option<i64> {
        self.currently_playing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn song_length(&self) -> f64 {
        self.song_length
    }

    pub fn song_start_time(&self) -> f64 {
        self.song_start_time
    }

    /// Last position computed by the poll loop (or set by a seek).
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn can_seek(&self) -> bool {
        self.currently_playing.is_some() && self.song_length > 0.0
    }

    /// Starts `id` from the beginning. A different track that is already
    /// playing is stopped first; playing the current track again stops it.
    pub fn play(&mut self, library: &Library, id: i64) -> Result<()> {
        if self.is_playing() {
            if self.currently_playing == Some(id) {
                self.stop_with(StopReason::Toggled);
                return Ok(());
            }
            self.stop_with(StopReason::Replaced);
        }

        let track = library.track(id)?;
        let path = library.existing_path(id)?;

        if let Err(err) = self.engine.load_and_play(&path, self.volume, Duration::ZERO) {
            error!("Failed to play {}: {}", path.display(), err);
            self.stop_with(StopReason::Error);
            return Err(into_load_error(err));
        }

        self.song_length = (self.duration_probe)(&path).max(0.0);
        self.song_start_time = 0.0;
        self.position = 0.0;
        self.seek_guard_until = None;
        self.currently_playing = Some(id);
        self.current_path = Some(path);
        self.state = PlaybackState::Playing;

        info!("Now playing {} ({})", track.filename, format_time(self.song_length));
        let song_length = self.song_length;
        self.emit(SessionEvent::Started {
            track_id: id,
            filename: track.filename,
            song_length,
        });
        Ok(())
    }

    /// Play/stop button: stops `id` if it is the track playing, otherwise
    /// plays it. Returns whether something is playing afterwards.
    pub fn toggle(&mut self, library: &Library, id: i64) -> Result<bool> {
        self.play(library, id)?;
        Ok(self.is_playing())
    }

    /// Safe from any state; calling it while idle does nothing.
    pub fn stop(&mut self) {
        self.stop_with(StopReason::User);
    }

    fn stop_with(&mut self, reason: StopReason) {
        let was_active = self.is_playing();
        self.engine.stop();

        self.state = PlaybackState::Idle;
        self.currently_playing = None;
        self.current_path = None;
        self.song_length = 0.0;
        self.song_start_time = 0.0;
        self.position = 0.0;
        self.seek_guard_until = None;

        if was_active {
            debug!("Playback stopped: {}", reason);
            self.emit(SessionEvent::Stopped { reason });
        }
    }

    /// Jumps to `percentage` (0-100) of the track by reloading it from that
    /// offset. Polling stays suppressed for [`SEEK_GUARD`] afterwards.
    pub fn seek(&mut self, percentage: f64) -> Result<()> {
        if !percentage.is_finite() {
            return Err(LibraryError::InvalidInput(format!(
                "seek position must be a number between 0 and 100, got {}",
                percentage
            )));
        }
        if !self.can_seek() {
            return Err(LibraryError::SeekUnavailable);
        }
        let Some(path) = self.current_path.clone() else {
            return Err(LibraryError::SeekUnavailable);
        };

        self.state = PlaybackState::Seeking;
        self.seek_guard_until = Some(self.clock.now() + SEEK_GUARD);

        let target = percentage.clamp(0.0, 100.0) / 100.0 * self.song_length;
        if let Err(err) = self
            .engine
            .load_and_play(&path, self.volume, Duration::from_secs_f64(target))
        {
            error!("Seek error: {}", err);
            self.stop_with(StopReason::Error);
            return Err(into_load_error(err));
        }

        // The engine's elapsed time now counts from `target`.
        self.song_start_time = target;
        self.position = target;
        debug!("Seeked to {}", format_time(target));
        self.emit(SessionEvent::Seeked { target });
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if self.is_playing() {
            self.engine.set_volume(self.volume);
        }
        let volume = self.volume;
        self.emit(SessionEvent::VolumeChanged { volume });
    }

    /// One iteration of the position poll loop. Returns the new position, or
    /// `None` when nothing is playing or polling is suppressed by a seek.
    pub fn poll_tick(&mut self) -> Option<f64> {
        match self.state {
            PlaybackState::Idle => return None,
            PlaybackState::Seeking => {
                let guard_over = self
                    .seek_guard_until
                    .map_or(true, |until| self.clock.now() >= until);
                if !guard_over {
                    return None;
                }
                self.seek_guard_until = None;
                self.state = PlaybackState::Playing;
            }
            PlaybackState::Playing => {}
        }

        if !self.engine.is_busy() {
            self.stop_with(StopReason::Finished);
            return None;
        }

        let elapsed = self.engine.elapsed().unwrap_or_default();
        self.position = absolute_position(elapsed, self.song_start_time, self.song_length);
        let (position, song_length) = (self.position, self.song_length);
        self.emit(SessionEvent::Position {
            position,
            song_length,
        });
        Some(position)
    }

    /// Position as a percentage of the track, 0 when the length is unknown.
    pub fn progress_percent(&self) -> f64 {
        if self.song_length > 0.0 {
            self.position / self.song_length * 100.0
        } else {
            0.0
        }
    }

    /// `M:SS / M:SS`, or `--:-- / --:--` when the length is unknown.
    pub fn time_label(&self) -> String {
        if self.song_length > 0.0 {
            format!("{} / {}", format_time(self.position), format_time(self.song_length))
        } else {
            "--:-- / --:--".to_string()
        }
    }
}

fn into_load_error(err: LibraryError) -> LibraryError {
    match err {
        LibraryError::PlaybackLoad(_) => err,
        other => LibraryError::PlaybackLoad(other.to_string()),
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::User => "stopped",
            StopReason::Toggled => "toggled off",
            StopReason::Replaced => "replaced by another track",
            StopReason::Finished => "finished",
            StopReason::Error => "error",
        };
        f.write_str(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::rc::Rc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use crate::TrackFilter;

    #[derive(Default)]
    struct FakeEngine {
        loads: Vec<(PathBuf, Duration)>,
        elapsed: Option<Duration>,
        busy: bool,
        fail_next_load: bool,
        volume: f32,
    }

    impl AudioEngine for FakeEngine {
        fn load_and_play(&mut self, path: &Path, volume: f32, start_offset: Duration) -> Result<()> {
            if self.fail_next_load {
                self.fail_next_load = false;
                return Err(LibraryError::PlaybackLoad("decoder exploded".into()));
            }
            self.loads.push((path.to_path_buf(), start_offset));
            self.elapsed = Some(Duration::ZERO);
            self.busy = true;
            self.volume = volume;
            Ok(())
        }

        fn stop(&mut self) {
            self.elapsed = None;
            self.busy = false;
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }

        fn elapsed(&self) -> Option<Duration> {
            self.elapsed
        }

        fn is_busy(&self) -> bool {
            self.busy
        }
    }

    #[derive(Clone)]
    struct ManualClock {
        now: Rc<Cell<Instant>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Rc::new(Cell::new(Instant::now())),
            }
        }

        fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    struct Fixture {
        _dir: TempDir,
        library: Library,
        ids: Vec<i64>,
        clock: ManualClock,
        session: PlaybackSession<FakeEngine, ManualClock>,
        events: Rc<RefCell<Vec<SessionEvent>>>,
    }

    fn fixture(song_length: f64) -> Fixture {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp3"), b"a").unwrap();
        fs::write(dir.path().join("b.mp3"), b"b").unwrap();
        let mut library = Library::open(dir.path()).unwrap();
        library.scan(|_| {}).unwrap();
        let ids = library
            .tracks(&TrackFilter::default())
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();

        let clock = ManualClock::new();
        let mut session = PlaybackSession::new(FakeEngine::default(), clock.clone())
            .with_duration_probe(move |_| song_length);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.set_observer(move |event| sink.borrow_mut().push(event.clone()));

        Fixture {
            _dir: dir,
            library,
            ids,
            clock,
            session,
            events,
        }
    }

    #[test]
    fn position_adds_reload_offset_and_clamps() {
        assert_eq!(absolute_position(Duration::from_secs(5), 60.0, 200.0), 65.0);
        assert_eq!(absolute_position(Duration::from_secs(50), 180.0, 200.0), 200.0);
        assert_eq!(absolute_position(Duration::from_secs(3), 0.0, 0.0), 3.0);
    }

    #[test]
    fn time_formatting() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(3600.0), "60:00");
    }

    #[test]
    fn stop_twice_from_idle_is_harmless() {
        let mut f = fixture(100.0);
        f.session.stop();
        f.session.stop();
        assert_eq!(f.session.state(), PlaybackState::Idle);
        assert!(f.events.borrow().is_empty());
    }

    #[test]
    fn play_starts_from_zero_and_polls_position() {
        let mut f = fixture(100.0);
        f.session.play(&f.library, f.ids[0]).unwrap();

        assert_eq!(f.session.state(), PlaybackState::Playing);
        assert_eq!(f.session.currently_playing(), Some(f.ids[0]));
        assert_eq!(f.session.song_length(), 100.0);
        assert_eq!(f.session.engine().loads[0].1, Duration::ZERO);

        f.session.engine_mut().elapsed = Some(Duration::from_secs(12));
        assert_eq!(f.session.poll_tick(), Some(12.0));
        assert_eq!(f.session.time_label(), "0:12 / 1:40");
    }

    #[test]
    fn seek_reloads_from_offset_and_suppresses_polling_during_guard() {
        let mut f = fixture(200.0);
        f.session.play(&f.library, f.ids[0]).unwrap();

        f.session.seek(25.0).unwrap();
        assert_eq!(f.session.state(), PlaybackState::Seeking);
        assert_eq!(f.session.song_start_time(), 50.0);
        assert_eq!(f.session.engine().loads.last().unwrap().1, Duration::from_secs(50));

        // Inside the guard window the poll loop reads nothing.
        f.clock.advance(Duration::from_millis(100));
        assert_eq!(f.session.poll_tick(), None);
        assert!(f.session.is_seeking());

        f.clock.advance(SEEK_GUARD);
        f.session.engine_mut().elapsed = Some(POLL_INTERVAL);
        let position = f.session.poll_tick().unwrap();
        assert_eq!(f.session.state(), PlaybackState::Playing);
        assert!((position - 50.0).abs() <= POLL_INTERVAL.as_secs_f64());
        assert_eq!(f.session.progress_percent().round(), 25.0);
    }

    #[test]
    fn seek_requires_known_length() {
        let mut f = fixture(0.0);
        assert!(matches!(f.session.seek(50.0), Err(LibraryError::SeekUnavailable)));

        f.session.play(&f.library, f.ids[0]).unwrap();
        assert!(matches!(f.session.seek(50.0), Err(LibraryError::SeekUnavailable)));
        assert_eq!(f.session.engine().loads.len(), 1);
        assert_eq!(f.session.time_label(), "--:-- / --:--");
    }

    #[test]
    fn engine_finishing_ends_in_idle() {
        let mut f = fixture(100.0);
        f.session.play(&f.library, f.ids[0]).unwrap();
        f.session.engine_mut().busy = false;

        assert_eq!(f.session.poll_tick(), None);
        assert_eq!(f.session.state(), PlaybackState::Idle);
        assert_eq!(f.session.currently_playing(), None);
        assert_eq!(
            f.events.borrow().last(),
            Some(&SessionEvent::Stopped {
                reason: StopReason::Finished
            })
        );
    }

    #[test]
    fn seek_rejects_non_finite_percentages() {
        let mut f = fixture(200.0);
        f.session.play(&f.library, f.ids[0]).unwrap();
        f.session.engine_mut().elapsed = Some(Duration::from_secs(30));
        assert_eq!(f.session.poll_tick(), Some(30.0));

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(f.session.seek(bad), Err(LibraryError::InvalidInput(_))));
        }
        assert_eq!(f.session.state(), PlaybackState::Playing);
        assert_eq!(f.session.song_start_time(), 0.0);
        assert_eq!(f.session.position(), 30.0);
        assert_eq!(f.session.engine().loads.len(), 1);
    }

    #[test]
    fn playing_the_current_track_again_stops_it() {
        let mut f = fixture(100.0);
        f.session.play(&f.library, f.ids[0]).unwrap();
        f.session.play(&f.library, f.ids[0]).unwrap();

        assert_eq!(f.session.state(), PlaybackState::Idle);
        assert_eq!(f.session.currently_playing(), None);
        assert_eq!(f.session.engine().loads.len(), 1);
        assert_eq!(
            f.events.borrow().last(),
            Some(&SessionEvent::Stopped {
                reason: StopReason::Toggled
            })
        );
    }

    #[test]
    fn toggle_on_playing_track_stops_it() {
        let mut f = fixture(100.0);
        assert!(f.session.toggle(&f.library, f.ids[0]).unwrap());
        assert!(!f.session.toggle(&f.library, f.ids[0]).unwrap());
        assert_eq!(f.session.state(), PlaybackState::Idle);
    }

    #[test]
    fn playing_another_track_replaces_the_current_one() {
        let mut f = fixture(100.0);
        f.session.play(&f.library, f.ids[0]).unwrap();
        f.session.seek(50.0).unwrap();
        f.session.play(&f.library, f.ids[1]).unwrap();

        assert_eq!(f.session.currently_playing(), Some(f.ids[1]));
        assert_eq!(f.session.song_start_time(), 0.0);
        assert_eq!(f.session.state(), PlaybackState::Playing);
        assert!(f.events.borrow().contains(&SessionEvent::Stopped {
            reason: StopReason::Replaced
        }));
    }

    #[test]
    fn vanished_file_leaves_session_idle() {
        let mut f = fixture(100.0);
        let path = f.library.track(f.ids[0]).unwrap().absolute_path(f.library.root());
        fs::remove_file(path).unwrap();

        let err = f.session.play(&f.library, f.ids[0]).unwrap_err();
        assert!(matches!(err, LibraryError::FileMissing(_)));
        assert!(matches!(f.session.play(&f.library, 4242), Err(LibraryError::NotFound(4242))));
        assert_eq!(f.session.state(), PlaybackState::Idle);
        assert!(f.session.engine().loads.is_empty());
    }

    #[test]
    fn load_failure_forces_idle() {
        let mut f = fixture(100.0);
        f.session.engine_mut().fail_next_load = true;

        let err = f.session.play(&f.library, f.ids[0]).unwrap_err();
        assert!(matches!(err, LibraryError::PlaybackLoad(_)));
        assert_eq!(f.session.state(), PlaybackState::Idle);
        assert_eq!(f.session.currently_playing(), None);
    }

    #[test]
    fn seek_failure_forces_idle() {
        let mut f = fixture(100.0);
        f.session.play(&f.library, f.ids[0]).unwrap();
        f.session.engine_mut().fail_next_load = true;

        assert!(f.session.seek(10.0).is_err());
        assert_eq!(f.session.state(), PlaybackState::Idle);
        assert_eq!(f.session.song_length(), 0.0);
    }

    #[test]
    fn volume_is_clamped_and_used_for_reloads() {
        let mut f = fixture(100.0);
        f.session.set_volume(1.7);
        assert_eq!(f.session.volume(), 1.0);

        f.session.set_volume(0.25);
        f.session.play(&f.library, f.ids[0]).unwrap();
        assert_eq!(f.session.engine().volume, 0.25);

        f.session.set_volume(0.5);
        assert_eq!(f.session.engine().volume, 0.5);
    }
}
