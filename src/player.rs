//! Audio player with polling-based completion detection.
//!
//! Rodio exposes no native completion event, so a background poll loop
//! watches the backend's busy flag and fires a one-shot callback on the
//! busy→idle transition. The rodio output itself lives on a dedicated
//! thread (`Sink` is not `Send`) and is driven over an mpsc channel, with a
//! reply channel so open/decode errors surface synchronously to `play`.

use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

/// How often the completion loop checks the backend.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One-shot callback invoked when playback of a resource ends naturally.
pub type CompletionFn = Box<dyn FnOnce() + Send + 'static>;

/// Playback state of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
    Completed,
}

// ── Backend abstraction ─────────────────────────────────────────────────────

/// Low-level playback driver. Plays one resource at a time; a new `start`
/// replaces whatever was playing.
pub trait AudioBackend: Send {
    fn start(&mut self, path: &Path) -> Result<(), String>;
    fn stop(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn is_busy(&self) -> bool;
    fn position(&self) -> Duration;
}

/// Elapsed-time bookkeeping shared by both backends.
/// Accumulates played time across pauses.
#[derive(Debug, Default)]
struct PositionClock {
    resumed_at: Option<Instant>,
    played: Duration,
    active: bool,
}

impl PositionClock {
    fn start(&mut self) {
        self.resumed_at = Some(Instant::now());
        self.played = Duration::ZERO;
        self.active = true;
    }

    fn stop(&mut self) {
        self.resumed_at = None;
        self.played = Duration::ZERO;
        self.active = false;
    }

    fn pause(&mut self) {
        if let Some(at) = self.resumed_at.take() {
            self.played += at.elapsed();
        }
    }

    fn resume(&mut self) {
        if self.active && self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn elapsed(&self) -> Duration {
        let running = self
            .resumed_at
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO);
        self.played + running
    }
}

// ── Simulated backend ───────────────────────────────────────────────────────

/// Clock-driven fake backend for headless tests and simulated runs. Every
/// `start` "plays" for a fixed clip length without touching the audio device.
pub struct SimulatedBackend {
    clip_length: Duration,
    clock: PositionClock,
    paused: bool,
}

impl SimulatedBackend {
    pub fn new(clip_length: Duration) -> Self {
        SimulatedBackend {
            clip_length,
            clock: PositionClock::default(),
            paused: false,
        }
    }
}

impl AudioBackend for SimulatedBackend {
    fn start(&mut self, _path: &Path) -> Result<(), String> {
        self.clock.start();
        self.paused = false;
        Ok(())
    }

    fn stop(&mut self) {
        self.clock.stop();
        self.paused = false;
    }

    fn pause(&mut self) {
        if self.clock.active && !self.paused {
            self.clock.pause();
            self.paused = true;
        }
    }

    fn resume(&mut self) {
        if self.paused {
            self.clock.resume();
            self.paused = false;
        }
    }

    fn is_busy(&self) -> bool {
        self.clock.active && self.clock.elapsed() < self.clip_length
    }

    fn position(&self) -> Duration {
        if self.clock.active {
            self.clock.elapsed().min(self.clip_length)
        } else {
            Duration::ZERO
        }
    }
}

// ── Rodio backend ───────────────────────────────────────────────────────────

enum BackendCmd {
    Start {
        path: PathBuf,
        reply: mpsc::Sender<Result<(), String>>,
    },
    Stop,
    Pause,
    Resume,
    Shutdown,
}

/// Real playback via rodio. The `OutputStream`/`Sink` pair is owned by a
/// dedicated `audio-backend` thread (neither is `Send`); this handle talks
/// to it over a channel and is itself `Send`.
pub struct RodioBackend {
    tx: mpsc::Sender<BackendCmd>,
    busy: Arc<AtomicBool>,
    clock: Mutex<PositionClock>,
}

impl RodioBackend {
    /// Spawn the backend thread. The audio device is opened lazily on the
    /// first `start`, so construction never fails on headless machines.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<BackendCmd>();
        let busy = Arc::new(AtomicBool::new(false));
        let busy_flag = busy.clone();

        std::thread::Builder::new()
            .name("audio-backend".into())
            .spawn(move || {
                backend_thread_loop(rx, busy_flag);
            })
            .expect("failed to spawn audio-backend thread");

        RodioBackend {
            tx,
            busy,
            clock: Mutex::new(PositionClock::default()),
        }
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for RodioBackend {
    fn start(&mut self, path: &Path) -> Result<(), String> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(BackendCmd::Start {
                path: path.to_path_buf(),
                reply: reply_tx,
            })
            .map_err(|_| "Audio backend thread is gone".to_string())?;
        reply_rx
            .recv()
            .map_err(|_| "Audio backend thread is gone".to_string())??;
        self.clock.lock().unwrap().start();
        Ok(())
    }

    fn stop(&mut self) {
        let _ = self.tx.send(BackendCmd::Stop);
        self.busy.store(false, Ordering::SeqCst);
        self.clock.lock().unwrap().stop();
    }

    fn pause(&mut self) {
        let _ = self.tx.send(BackendCmd::Pause);
        self.clock.lock().unwrap().pause();
    }

    fn resume(&mut self) {
        let _ = self.tx.send(BackendCmd::Resume);
        self.clock.lock().unwrap().resume();
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn position(&self) -> Duration {
        self.clock.lock().unwrap().elapsed()
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        let _ = self.tx.send(BackendCmd::Shutdown);
    }
}

/// Main loop for the audio-backend thread. Owns the rodio output.
fn backend_thread_loop(rx: mpsc::Receiver<BackendCmd>, busy: Arc<AtomicBool>) {
    let mut output: Option<(OutputStream, Sink)> = None;
    let mut was_playing = false;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(BackendCmd::Start { path, reply }) => {
                // Lazy-init the output on first use
                if output.is_none() {
                    match open_output() {
                        Ok(pair) => output = Some(pair),
                        Err(e) => {
                            let _ = reply.send(Err(e));
                            continue;
                        }
                    }
                }
                let Some((_, sink)) = output.as_ref() else {
                    continue;
                };
                match decode_file(&path) {
                    Ok(source) => {
                        sink.stop();
                        sink.append(source);
                        sink.play();
                        was_playing = true;
                        busy.store(true, Ordering::SeqCst);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Ok(BackendCmd::Stop) => {
                if let Some((_, sink)) = &output {
                    sink.stop();
                }
                was_playing = false;
                busy.store(false, Ordering::SeqCst);
            }
            Ok(BackendCmd::Pause) => {
                if let Some((_, sink)) = &output {
                    sink.pause();
                }
            }
            Ok(BackendCmd::Resume) => {
                if let Some((_, sink)) = &output {
                    sink.play();
                }
            }
            Ok(BackendCmd::Shutdown) => {
                if let Some((_, sink)) = &output {
                    sink.stop();
                }
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Natural end of the current source
                if was_playing {
                    if let Some((_, sink)) = &output {
                        if sink.empty() {
                            was_playing = false;
                            busy.store(false, Ordering::SeqCst);
                        }
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn open_output() -> Result<(OutputStream, Sink), String> {
    let (stream, handle) =
        OutputStream::try_default().map_err(|e| format!("Failed to open audio output: {}", e))?;
    let sink =
        Sink::try_new(&handle).map_err(|e| format!("Failed to create audio sink: {}", e))?;
    Ok((stream, sink))
}

fn decode_file(path: &Path) -> Result<Decoder<BufReader<File>>, String> {
    let file =
        File::open(path).map_err(|e| format!("Cannot open '{}': {}", path.display(), e))?;
    Decoder::new(BufReader::new(file))
        .map_err(|e| format!("Cannot decode '{}': {}", path.display(), e))
}

// ── Player ──────────────────────────────────────────────────────────────────

struct PlayerShared {
    state: PlayerState,
    generation: u64,
    on_complete: Option<CompletionFn>,
}

/// Plays exactly one resource at a time and fires a one-shot completion
/// callback when playback ends naturally.
///
/// Each `play` bumps a generation counter and spawns a fresh poll loop;
/// `stop` bumps the generation too, which cancels the in-flight loop and
/// guarantees no stale callback fires after a caller observes `Stopped`.
pub struct AudioPlayer {
    backend: Arc<Mutex<Box<dyn AudioBackend>>>,
    shared: Arc<Mutex<PlayerShared>>,
}

impl AudioPlayer {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        AudioPlayer {
            backend: Arc::new(Mutex::new(backend)),
            shared: Arc::new(Mutex::new(PlayerShared {
                state: PlayerState::Stopped,
                generation: 0,
                on_complete: None,
            })),
        }
    }

    /// Player backed by the real audio device.
    pub fn rodio() -> Self {
        AudioPlayer::new(Box::new(RodioBackend::new()))
    }

    /// Player backed by the clock-driven fake.
    pub fn simulated(clip_length: Duration) -> Self {
        AudioPlayer::new(Box::new(SimulatedBackend::new(clip_length)))
    }

    /// Begin playback of `path`, replacing any current resource and any
    /// previously registered callback. A missing resource is an error and
    /// playback is not started.
    pub fn play(&self, path: &Path, on_complete: CompletionFn) -> Result<(), String> {
        if !path.is_file() {
            return Err(format!("Audio resource not found: {}", path.display()));
        }

        {
            let mut backend = self.backend.lock().unwrap();
            backend.stop();
            backend.start(path)?;
        }

        let generation = {
            let mut shared = self.shared.lock().unwrap();
            shared.generation += 1;
            shared.state = PlayerState::Playing;
            shared.on_complete = Some(on_complete);
            shared.generation
        };

        let backend = self.backend.clone();
        let shared = self.shared.clone();
        std::thread::Builder::new()
            .name("playback-poll".into())
            .spawn(move || {
                poll_for_completion(backend, shared, generation);
            })
            .expect("failed to spawn playback-poll thread");

        Ok(())
    }

    /// Halt playback immediately and discard the pending callback.
    /// Never fires completion.
    pub fn stop(&self) {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.generation += 1;
            shared.on_complete = None;
            shared.state = PlayerState::Stopped;
        }
        self.backend.lock().unwrap().stop();
    }

    /// Pause playback. The completion loop idles while paused.
    pub fn pause(&self) {
        let mut shared = self.shared.lock().unwrap();
        if shared.state == PlayerState::Playing {
            shared.state = PlayerState::Paused;
            drop(shared);
            self.backend.lock().unwrap().pause();
        }
    }

    /// Continue paused playback from its current position.
    pub fn resume(&self) {
        let mut shared = self.shared.lock().unwrap();
        if shared.state == PlayerState::Paused {
            shared.state = PlayerState::Playing;
            drop(shared);
            self.backend.lock().unwrap().resume();
        }
    }

    /// True while a resource is playing or paused.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.shared.lock().unwrap().state,
            PlayerState::Playing | PlayerState::Paused
        )
    }

    /// Elapsed playback time of the current resource.
    pub fn position(&self) -> Duration {
        self.backend.lock().unwrap().position()
    }

    pub fn state(&self) -> PlayerState {
        self.shared.lock().unwrap().state
    }
}

/// Completion-detection loop. Exits as soon as its generation is stale, so
/// `stop` (or a replacing `play`) cancels it without firing the callback.
fn poll_for_completion(
    backend: Arc<Mutex<Box<dyn AudioBackend>>>,
    shared: Arc<Mutex<PlayerShared>>,
    generation: u64,
) {
    loop {
        std::thread::sleep(POLL_INTERVAL);

        {
            let s = shared.lock().unwrap();
            if s.generation != generation {
                return;
            }
            if s.state == PlayerState::Paused {
                continue;
            }
        }

        let busy = backend.lock().unwrap().is_busy();
        if busy {
            continue;
        }

        let callback = {
            let mut s = shared.lock().unwrap();
            if s.generation != generation {
                return;
            }
            s.state = PlayerState::Completed;
            s.on_complete.take()
        };
        if let Some(cb) = callback {
            cb();
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn touch(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"fake audio").unwrap();
        path
    }

    fn counting_callback(counter: &Arc<AtomicUsize>) -> CompletionFn {
        let c = counter.clone();
        Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn play_rejects_missing_resource() {
        let player = AudioPlayer::simulated(Duration::from_millis(50));
        let result = player.play(Path::new("__missing__.mp3"), Box::new(|| {}));
        assert!(result.is_err());
        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[test]
    fn completion_fires_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(&dir, "clip.mp3");
        let player = AudioPlayer::simulated(Duration::from_millis(80));
        let fired = Arc::new(AtomicUsize::new(0));

        player.play(&path, counting_callback(&fired)).unwrap();
        assert!(player.is_busy());

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(player.state(), PlayerState::Completed);
        assert!(!player.is_busy());
    }

    #[test]
    fn stop_discards_pending_callback() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(&dir, "clip.mp3");
        let player = AudioPlayer::simulated(Duration::from_millis(200));
        let fired = Arc::new(AtomicUsize::new(0));

        player.play(&path, counting_callback(&fired)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        player.stop();
        assert_eq!(player.state(), PlayerState::Stopped);

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn replacing_play_supersedes_previous_callback() {
        let dir = tempfile::tempdir().unwrap();
        let first = touch(&dir, "first.mp3");
        let second = touch(&dir, "second.mp3");
        let player = AudioPlayer::simulated(Duration::from_millis(100));
        let first_fired = Arc::new(AtomicUsize::new(0));
        let second_fired = Arc::new(AtomicUsize::new(0));

        player
            .play(&first, counting_callback(&first_fired))
            .unwrap();
        player
            .play(&second, counting_callback(&second_fired))
            .unwrap();

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(first_fired.load(Ordering::SeqCst), 0);
        assert_eq!(second_fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pause_suspends_completion_and_resume_continues() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(&dir, "clip.mp3");
        let player = AudioPlayer::simulated(Duration::from_millis(100));
        let fired = Arc::new(AtomicUsize::new(0));

        player.play(&path, counting_callback(&fired)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        player.pause();
        assert_eq!(player.state(), PlayerState::Paused);
        assert!(player.is_busy());

        // Well past the clip length, but paused — no completion
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        player.resume();
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn position_advances_while_playing() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(&dir, "clip.mp3");
        let player = AudioPlayer::simulated(Duration::from_secs(5));

        assert_eq!(player.position(), Duration::ZERO);
        player.play(&path, Box::new(|| {})).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert!(player.position() >= Duration::from_millis(40));
    }

    #[test]
    fn simulated_backend_busy_lifecycle() {
        let mut backend = SimulatedBackend::new(Duration::from_millis(40));
        assert!(!backend.is_busy());
        backend.start(Path::new("whatever.mp3")).unwrap();
        assert!(backend.is_busy());
        std::thread::sleep(Duration::from_millis(60));
        assert!(!backend.is_busy());
        backend.stop();
        assert_eq!(backend.position(), Duration::ZERO);
    }

    #[test]
    fn rodio_backend_handle_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<RodioBackend>();
    }
}
