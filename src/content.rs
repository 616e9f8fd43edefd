//! Pre-generated announcement discovery.
//!
//! The content root is the index: no manifest is consulted. Resources are
//! matched by case-insensitive substring against the persona marker, the
//! category marker, and (when given) the song id. Usage tracking biases
//! picks away from immediate repeats; it is in-memory only and resets on
//! restart.

use crate::dj::Persona;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported audio extensions for announcement files.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "aac", "m4a"];

/// What kind of announcement is being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Intro,
    Outro,
    Time,
    Weather,
}

impl ContentCategory {
    /// Filename marker for this category.
    pub fn marker(&self) -> &'static str {
        match self {
            ContentCategory::Intro => "intro",
            ContentCategory::Outro => "outro",
            ContentCategory::Time => "time",
            ContentCategory::Weather => "weather",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker())
    }
}

/// Resolves concrete announcement files for a song/persona/category, with
/// de-duplication across repeated picks.
pub struct ContentSelector {
    root: PathBuf,
    used: HashMap<String, HashSet<PathBuf>>,
}

impl ContentSelector {
    pub fn new(root: PathBuf) -> Self {
        ContentSelector {
            root,
            used: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All resources in the content root matching the persona + category
    /// (+ song id when given). Time lookups require an exact hour token in
    /// the filename — a wrong-hour announcement is worse than silence, so
    /// there is deliberately no generic fallback here.
    ///
    /// A missing or unreadable root yields no candidates, never an error.
    pub fn find_candidates(
        &self,
        song_id: Option<&str>,
        persona: &Persona,
        category: ContentCategory,
        hour: Option<u32>,
    ) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };

        let persona_marker = persona.marker();
        let category_marker = category.marker();
        let song_marker = song_id.map(|s| s.to_lowercase());

        let mut matches = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let ext = match path.extension() {
                Some(e) => e.to_string_lossy().to_lowercase(),
                None => continue,
            };
            if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }

            let stem = match path.file_stem() {
                Some(s) => s.to_string_lossy().to_lowercase(),
                None => continue,
            };

            if !stem.contains(&persona_marker) || !stem.contains(category_marker) {
                continue;
            }
            if let Some(song) = &song_marker {
                if !stem.contains(song.as_str()) {
                    continue;
                }
            }
            if category == ContentCategory::Time {
                match hour {
                    Some(h) if stem_has_hour_token(&stem, h) => {}
                    _ => continue,
                }
            }

            matches.push(path);
        }

        matches
    }

    /// Pick one resource among the candidates, preferring ones not yet used
    /// for their tracking key. Once everything has been used, repeats are
    /// allowed — exhaustion never turns into "none available". The choice
    /// is uniform random so repeated calls show variety.
    ///
    /// Intro lookups fall back to any intro for the persona when no
    /// song-specific file exists; time lookups never fall back.
    pub fn pick(
        &self,
        song_id: Option<&str>,
        persona: &Persona,
        category: ContentCategory,
        hour: Option<u32>,
    ) -> Option<PathBuf> {
        let mut candidates = self.find_candidates(song_id, persona, category, hour);
        if candidates.is_empty() && category == ContentCategory::Intro && song_id.is_some() {
            candidates = self.find_candidates(None, persona, category, hour);
        }
        if candidates.is_empty() {
            return None;
        }

        let fresh: Vec<&PathBuf> = candidates
            .iter()
            .filter(|path| !self.was_used(path))
            .collect();
        let pool: Vec<&PathBuf> = if fresh.is_empty() {
            candidates.iter().collect()
        } else {
            fresh
        };
        let idx = fastrand::usize(..pool.len());
        Some(pool[idx].clone())
    }

    /// Record a pick so later calls for the same tracking key avoid it
    /// until the alternatives are exhausted.
    pub fn mark_used(&mut self, path: &Path) {
        let key = tracking_key(path);
        self.used.entry(key).or_default().insert(path.to_path_buf());
    }

    fn was_used(&self, path: &Path) -> bool {
        let key = tracking_key(path);
        self.used
            .get(&key)
            .map(|set| set.contains(path))
            .unwrap_or(false)
    }
}

/// Tracking key for a resource: the lowercased stem with any trailing
/// variant suffix (digits, spaces, separators) stripped, so
/// `persona_a_song1_outro.mp3` and `persona_a_song1_outro_2.mp3` share one
/// key.
fn tracking_key(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    stem.trim_end_matches(|c: char| c.is_ascii_digit() || c == '_' || c == '-' || c == ' ')
        .to_string()
}

/// True if the stem contains `hour` as a standalone numeric token, so hour
/// 6 matches `_06` or `_6` but never `16`.
fn stem_has_hour_token(stem: &str, hour: u32) -> bool {
    stem.split(|c: char| !c.is_ascii_digit())
        .filter(|tok| !tok.is_empty())
        .any(|tok| tok.parse::<u32>().map(|n| n == hour).unwrap_or(false))
}
