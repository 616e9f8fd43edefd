//! Station controller — the top-level orchestrator for unattended
//! operation. Binds the DJ scheduler, the content selector, and the
//! playback controller together, inserts outros after songs, keeps
//! counters, and exposes a point-in-time status snapshot.

use crate::catalog::{Catalog, Song};
use crate::config::StationConfig;
use crate::content::{ContentCategory, ContentSelector};
use crate::controller::{PlaybackController, PlaybackListener};
use crate::dj::DjScheduler;
use crate::player::AudioPlayer;
use crate::queue::{ItemType, PlaybackQueue, QueueItem};
use crate::weather::{WeatherProvider, WeatherService};
use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of "now" for persona resolution. Injectable so tests can pin the
/// clock to a known hour.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

fn wall_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

// ── Log buffer ──────────────────────────────────────────────────────────────

const LOG_BUFFER_MAX: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

/// Bounded in-memory event trail. Oldest entries fall off the front.
#[derive(Default)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn new() -> Self {
        LogBuffer {
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, level: &str, message: String) {
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        self.entries.push_back(LogEntry {
            timestamp,
            level: level.to_string(),
            message,
        });
        while self.entries.len() > LOG_BUFFER_MAX {
            self.entries.pop_front();
        }
    }

    pub fn recent(&self, count: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StationState {
    Playing,
    Paused,
    Stopped,
}

impl std::fmt::Display for StationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StationState::Playing => write!(f, "playing"),
            StationState::Paused => write!(f, "paused"),
            StationState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Immutable point-in-time snapshot. Counters are copies — callers polling
/// repeatedly see monotonically non-decreasing counts, never live state.
#[derive(Debug, Clone, Serialize)]
pub struct StationStatus {
    pub state: StationState,
    pub uptime_secs: u64,
    pub songs_played: u64,
    pub outros_played: u64,
    pub errors_count: u64,
}

struct StationShared {
    state: StationState,
    started_at: Option<Instant>,
    songs_played: u64,
    outros_played: u64,
    errors_count: u64,
    /// A show block is on air; outro insertion is suppressed.
    show_active: bool,
    /// Last song id handed to the queue, for rotation de-duplication.
    last_song_id: Option<String>,
}

// ── Event hook ──────────────────────────────────────────────────────────────

/// The station's playback listener. Runs on the controller's serialized
/// timeline; mutates only station state and the queue handed to it.
struct StationHook {
    shared: Arc<Mutex<StationShared>>,
    selector: Arc<Mutex<ContentSelector>>,
    scheduler: DjScheduler,
    log: Arc<Mutex<LogBuffer>>,
    clock: Clock,
}

impl PlaybackListener for StationHook {
    fn on_item_started(&self, item: &QueueItem) {
        // Starting a non-show item does NOT end the block: a song riding
        // inside one is covered by it and earns no outro. The flag drops
        // when the closing outro finishes, or when the last queued show
        // item drains from a block that has no outro.
        if matches!(item.item_type, ItemType::Show | ItemType::ShowIntro) {
            self.shared.lock().unwrap().show_active = true;
        }
        self.log.lock().unwrap().push(
            "info",
            format!("started {}: {}", item.item_type, item.path.display()),
        );
    }

    fn on_item_finished(&self, item: &QueueItem, queue: &mut PlaybackQueue) {
        match item.item_type {
            ItemType::Song => self.song_finished(item, queue),
            ItemType::ShowOutro => {
                self.shared.lock().unwrap().show_active = false;
            }
            ItemType::Show | ItemType::ShowIntro => {
                if !queue.has_show_item() {
                    self.shared.lock().unwrap().show_active = false;
                }
            }
            _ => {}
        }
    }

    fn on_item_error(&self, item: &QueueItem, error: &str) {
        self.shared.lock().unwrap().errors_count += 1;
        self.log.lock().unwrap().push(
            "error",
            format!("skipping {}: {}", item.path.display(), error),
        );
    }
}

impl StationHook {
    /// A song just finished: count it, and unless a show is in progress,
    /// front-insert a matching outro for the active persona. A missing
    /// outro is silence, not an error.
    fn song_finished(&self, item: &QueueItem, queue: &mut PlaybackQueue) {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.songs_played += 1;
            if shared.show_active {
                return;
            }
        }
        let Some(song_id) = &item.song_id else {
            return;
        };

        let now = (self.clock)();
        let persona = self.scheduler.current_persona(now);
        let mut selector = self.selector.lock().unwrap();
        if let Some(outro) = selector.pick(Some(song_id), persona, ContentCategory::Outro, None) {
            selector.mark_used(&outro);
            queue.push_front(QueueItem::outro(outro.clone(), song_id));
            let mut shared = self.shared.lock().unwrap();
            shared.outros_played += 1;
            drop(shared);
            self.log.lock().unwrap().push(
                "info",
                format!("queued outro for {}: {}", song_id, outro.display()),
            );
        }
    }
}

// ── Station controller ──────────────────────────────────────────────────────

pub struct StationController {
    controller: PlaybackController,
    scheduler: DjScheduler,
    selector: Arc<Mutex<ContentSelector>>,
    weather: Mutex<WeatherService>,
    shared: Arc<Mutex<StationShared>>,
    log: Arc<Mutex<LogBuffer>>,
    clock: Clock,
    queue_low_water: usize,
}

impl StationController {
    pub fn new(player: AudioPlayer, config: &StationConfig) -> Self {
        Self::with_collaborators(
            player,
            config,
            wall_clock(),
            Box::new(crate::weather::StaticWeatherProvider::default()),
        )
    }

    /// Construct with an explicit clock and weather provider (tests pin
    /// the clock to a known hour; real deployments plug in a live source).
    pub fn with_collaborators(
        player: AudioPlayer,
        config: &StationConfig,
        clock: Clock,
        weather_provider: Box<dyn WeatherProvider>,
    ) -> Self {
        let controller = PlaybackController::new(player);
        let scheduler = config.scheduler();
        let selector = Arc::new(Mutex::new(ContentSelector::new(
            config.content_root.clone(),
        )));
        let shared = Arc::new(Mutex::new(StationShared {
            state: StationState::Stopped,
            started_at: None,
            songs_played: 0,
            outros_played: 0,
            errors_count: 0,
            show_active: false,
            last_song_id: None,
        }));
        let log = Arc::new(Mutex::new(LogBuffer::new()));

        controller.subscribe(Box::new(StationHook {
            shared: shared.clone(),
            selector: selector.clone(),
            scheduler: scheduler.clone(),
            log: log.clone(),
            clock: clock.clone(),
        }));

        StationController {
            controller,
            scheduler,
            selector,
            weather: Mutex::new(WeatherService::new(
                weather_provider,
                Duration::from_secs(config.weather_ttl_secs),
            )),
            shared,
            log,
            clock,
            queue_low_water: config.queue_low_water,
        }
    }

    // ── Transport ───────────────────────────────────────────────────────

    /// Begin (or continue) broadcasting from the queue. The uptime origin
    /// resets on every stopped→playing transition; pause does not reset it.
    pub fn start(&self) -> Result<(), String> {
        self.controller.start()?;
        let mut shared = self.shared.lock().unwrap();
        if shared.state == StationState::Stopped {
            shared.started_at = Some(Instant::now());
        }
        shared.state = StationState::Playing;
        Ok(())
    }

    /// Pause playback. A station with nothing bound has nothing to pause,
    /// so its state is left alone.
    pub fn pause(&self) {
        self.controller.pause();
        if self.controller.current_item().is_some() {
            self.shared.lock().unwrap().state = StationState::Paused;
        }
    }

    pub fn resume(&self) -> Result<(), String> {
        self.controller.resume()?;
        if self.controller.current_item().is_some() {
            self.shared.lock().unwrap().state = StationState::Playing;
        }
        Ok(())
    }

    /// Halt the broadcast. Safe to call from any state; always leaves the
    /// station stopped with playback halted and the uptime clock cleared.
    pub fn stop(&self) {
        self.controller.stop();
        let mut shared = self.shared.lock().unwrap();
        shared.state = StationState::Stopped;
        shared.started_at = None;
    }

    pub fn skip(&self) {
        self.controller.skip();
    }

    // ── Scheduling ──────────────────────────────────────────────────────

    /// Queue a song, with its persona-matched intro in front when one
    /// exists (intros fall back persona-wide; see the content selector).
    pub fn add_song(&self, song: &Song) {
        let now = (self.clock)();
        let persona = self.scheduler.current_persona(now).clone();
        let intro = {
            let mut selector = self.selector.lock().unwrap();
            let picked = selector.pick(Some(&song.id), &persona, ContentCategory::Intro, None);
            if let Some(p) = &picked {
                selector.mark_used(p);
            }
            picked
        };

        match intro {
            Some(intro_path) => {
                self.controller
                    .add_song_with_intro(song.path.clone(), intro_path, &song.id)
            }
            None => self
                .controller
                .enqueue(QueueItem::song(song.path.clone(), &song.id)),
        }
        self.shared.lock().unwrap().last_song_id = Some(song.id.clone());
        self.log
            .lock()
            .unwrap()
            .push("info", format!("queued song {} ({})", song.id, song.title));
    }

    /// Insert a time announcement for the current hour as the next item.
    /// Requires an exact-hour file; returns false (and plays nothing) when
    /// none exists — a wrong-hour announcement is worse than silence.
    pub fn announce_time(&self, when: NaiveDateTime) -> bool {
        let persona = self.scheduler.current_persona(when).clone();
        let picked = {
            let mut selector = self.selector.lock().unwrap();
            let picked =
                selector.pick(None, &persona, ContentCategory::Time, Some(when.hour()));
            if let Some(p) = &picked {
                selector.mark_used(p);
            }
            picked
        };
        match picked {
            Some(path) => {
                self.controller.insert_next(QueueItem::announcement(path));
                true
            }
            None => false,
        }
    }

    /// Insert a weather spot for the active persona as the next item. The
    /// weather service always yields a value (fresh, stale, or synthetic);
    /// its summary goes to the log alongside the spot.
    pub fn announce_weather(&self) -> bool {
        let conditions = self.weather.lock().unwrap().current();
        let now = (self.clock)();
        let persona = self.scheduler.current_persona(now).clone();
        let picked = {
            let mut selector = self.selector.lock().unwrap();
            let picked = selector.pick(None, &persona, ContentCategory::Weather, None);
            if let Some(p) = &picked {
                selector.mark_used(p);
            }
            picked
        };
        match picked {
            Some(path) => {
                self.log.lock().unwrap().push(
                    "info",
                    format!("queued weather spot ({})", conditions.summary()),
                );
                self.controller.insert_next(QueueItem::announcement(path));
                true
            }
            None => false,
        }
    }

    /// Queue a show block: the persona's show intro (when the content root
    /// has one), the episodes in order, then the show outro. Refused during
    /// a persona handoff hour.
    pub fn start_show(&self, episodes: &[PathBuf]) -> Result<(), String> {
        let now = (self.clock)();
        if self.scheduler.is_transition(now) {
            return Err("Cannot start a show during a persona handoff hour".to_string());
        }
        if episodes.is_empty() {
            return Err("Show has no episodes".to_string());
        }

        let persona = self.scheduler.current_persona(now).clone();
        let (intro, outro) = {
            // No persona-wide fallback here: a song intro must never open a
            // show, so this bypasses `pick` and matches "show" files only.
            let selector = self.selector.lock().unwrap();
            let pick_one = |candidates: Vec<PathBuf>| {
                if candidates.is_empty() {
                    None
                } else {
                    Some(candidates[fastrand::usize(..candidates.len())].clone())
                }
            };
            (
                pick_one(selector.find_candidates(
                    Some("show"),
                    &persona,
                    ContentCategory::Intro,
                    None,
                )),
                pick_one(selector.find_candidates(
                    Some("show"),
                    &persona,
                    ContentCategory::Outro,
                    None,
                )),
            )
        };

        if let Some(path) = intro {
            self.controller
                .enqueue(QueueItem::new(path, ItemType::ShowIntro, None));
        }
        for episode in episodes {
            self.controller.enqueue(QueueItem::show(episode.clone()));
        }
        if let Some(path) = outro {
            self.controller
                .enqueue(QueueItem::new(path, ItemType::ShowOutro, None));
        }
        self.log
            .lock()
            .unwrap()
            .push("info", format!("queued show block ({} episodes)", episodes.len()));
        Ok(())
    }

    /// Keep the queue at its low-water mark from the catalog rotation.
    /// Steady-state: this is what keeps the stream running indefinitely.
    pub fn top_up_from_catalog(&self, catalog: &Catalog) {
        while self.controller.queue_len() < self.queue_low_water {
            let last = self.shared.lock().unwrap().last_song_id.clone();
            match catalog.pick_rotation(last.as_deref()) {
                Some(song) => self.add_song(song),
                None => break,
            }
        }
    }

    // ── Observation ─────────────────────────────────────────────────────

    /// Point-in-time snapshot; never a view into live counters.
    pub fn get_status(&self) -> StationStatus {
        let shared = self.shared.lock().unwrap();
        StationStatus {
            state: shared.state,
            uptime_secs: shared
                .started_at
                .map(|at| at.elapsed().as_secs())
                .unwrap_or(0),
            songs_played: shared.songs_played,
            outros_played: shared.outros_played,
            errors_count: shared.errors_count,
        }
    }

    pub fn recent_log(&self, count: usize) -> Vec<LogEntry> {
        self.log.lock().unwrap().recent(count)
    }

    /// The underlying playback controller, for queue inspection.
    pub fn playback(&self) -> &PlaybackController {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_clock(hour: u32) -> Clock {
        Arc::new(move || {
            NaiveDate::from_ymd_opt(2026, 8, 25)
                .unwrap()
                .and_hms_opt(hour, 30, 0)
                .unwrap()
        })
    }

    #[test]
    fn log_buffer_is_bounded() {
        let mut log = LogBuffer::new();
        for i in 0..(LOG_BUFFER_MAX + 50) {
            log.push("info", format!("entry {}", i));
        }
        assert_eq!(log.len(), LOG_BUFFER_MAX);
        let recent = log.recent(1);
        assert_eq!(recent[0].message, format!("entry {}", LOG_BUFFER_MAX + 49));
    }

    #[test]
    fn station_state_display() {
        assert_eq!(format!("{}", StationState::Playing), "playing");
        assert_eq!(format!("{}", StationState::Stopped), "stopped");
    }

    #[test]
    fn status_serializes_with_lowercase_state() {
        let status = StationStatus {
            state: StationState::Paused,
            uptime_secs: 12,
            songs_played: 3,
            outros_played: 1,
            errors_count: 0,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"state\":\"paused\""));
    }

    #[test]
    fn stop_is_safe_from_any_state() {
        let config = StationConfig::default();
        let station = StationController::with_collaborators(
            AudioPlayer::simulated(Duration::from_millis(50)),
            &config,
            fixed_clock(10),
            Box::new(crate::weather::StaticWeatherProvider::default()),
        );
        station.stop();
        assert_eq!(station.get_status().state, StationState::Stopped);
        station.pause();
        station.stop();
        assert_eq!(station.get_status().state, StationState::Stopped);
    }

    #[test]
    fn uptime_resets_on_stop_and_restart() {
        let config = StationConfig::default();
        let station = StationController::with_collaborators(
            AudioPlayer::simulated(Duration::from_millis(50)),
            &config,
            fixed_clock(10),
            Box::new(crate::weather::StaticWeatherProvider::default()),
        );
        station.start().unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert!(station.get_status().uptime_secs >= 1);

        station.stop();
        assert_eq!(station.get_status().uptime_secs, 0);

        // Restart measures from the new start, not the first one
        station.start().unwrap();
        assert_eq!(station.get_status().uptime_secs, 0);
    }

    #[test]
    fn pause_on_an_idle_station_is_not_reported_as_paused() {
        let config = StationConfig::default();
        let station = StationController::with_collaborators(
            AudioPlayer::simulated(Duration::from_millis(50)),
            &config,
            fixed_clock(10),
            Box::new(crate::weather::StaticWeatherProvider::default()),
        );
        station.pause();
        assert_eq!(station.get_status().state, StationState::Stopped);
        station.resume().unwrap();
        assert_eq!(station.get_status().state, StationState::Stopped);
    }

    #[test]
    fn show_refused_during_transition_hour() {
        let config = StationConfig::default();
        let station = StationController::with_collaborators(
            AudioPlayer::simulated(Duration::from_millis(50)),
            &config,
            fixed_clock(19), // evening handoff hour
            Box::new(crate::weather::StaticWeatherProvider::default()),
        );
        let result = station.start_show(&["ep1.mp3".into()]);
        assert!(result.is_err());
        assert_eq!(station.playback().queue_len(), 0);
    }

    #[test]
    fn show_with_no_episodes_is_an_error() {
        let config = StationConfig::default();
        let station = StationController::with_collaborators(
            AudioPlayer::simulated(Duration::from_millis(50)),
            &config,
            fixed_clock(10),
            Box::new(crate::weather::StaticWeatherProvider::default()),
        );
        assert!(station.start_show(&[]).is_err());
    }

    #[test]
    fn show_block_is_queued_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("persona_a_show_intro.mp3"), b"audio").unwrap();
        std::fs::write(dir.path().join("persona_a_show_outro.mp3"), b"audio").unwrap();
        let mut config = StationConfig::default();
        config.content_root = dir.path().to_path_buf();
        let station = StationController::with_collaborators(
            AudioPlayer::simulated(Duration::from_millis(50)),
            &config,
            fixed_clock(10),
            Box::new(crate::weather::StaticWeatherProvider::default()),
        );
        station
            .start_show(&["ep1.mp3".into(), "ep2.mp3".into()])
            .unwrap();
        assert_eq!(station.playback().queue_len(), 4);
        assert_eq!(
            station.playback().peek_next().unwrap().item_type,
            ItemType::ShowIntro
        );
    }

    #[test]
    fn show_without_bumpers_is_just_the_episodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StationConfig::default();
        config.content_root = dir.path().to_path_buf();
        let station = StationController::with_collaborators(
            AudioPlayer::simulated(Duration::from_millis(50)),
            &config,
            fixed_clock(10),
            Box::new(crate::weather::StaticWeatherProvider::default()),
        );
        station.start_show(&["ep1.mp3".into()]).unwrap();
        assert_eq!(station.playback().queue_len(), 1);
        assert_eq!(
            station.playback().peek_next().unwrap().item_type,
            ItemType::Show
        );
    }

    #[test]
    fn announce_time_without_matching_hour_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StationConfig::default();
        config.content_root = dir.path().to_path_buf();
        let station = StationController::with_collaborators(
            AudioPlayer::simulated(Duration::from_millis(50)),
            &config,
            fixed_clock(10),
            Box::new(crate::weather::StaticWeatherProvider::default()),
        );
        assert!(!station.announce_time((station.clock)()));
        assert_eq!(station.playback().queue_len(), 0);
    }

    #[test]
    fn top_up_respects_low_water_mark() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StationConfig::default();
        config.content_root = dir.path().to_path_buf();
        config.queue_low_water = 3;
        let station = StationController::with_collaborators(
            AudioPlayer::simulated(Duration::from_millis(50)),
            &config,
            fixed_clock(10),
            Box::new(crate::weather::StaticWeatherProvider::default()),
        );

        let catalog = Catalog {
            songs: vec![
                Song {
                    id: "a".into(),
                    path: "a.mp3".into(),
                    title: "A".into(),
                    artist: "X".into(),
                },
                Song {
                    id: "b".into(),
                    path: "b.mp3".into(),
                    title: "B".into(),
                    artist: "X".into(),
                },
            ],
        };
        station.top_up_from_catalog(&catalog);
        assert!(station.playback().queue_len() >= 3);

        // Empty catalog never loops forever
        station.playback().clear_queue();
        station.top_up_from_catalog(&Catalog::new());
        assert_eq!(station.playback().queue_len(), 0);
    }
}
