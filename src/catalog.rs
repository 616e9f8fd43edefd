use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One entry in the pre-built song catalog. The id is the stable identifier
/// that intros/outros are correlated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
}

/// Catalog of playable songs, consumed read-only. Library scanning and
/// metadata extraction happen elsewhere; this is just the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub songs: Vec<Song>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog { songs: Vec::new() }
    }

    /// Load a catalog from JSON, or return an empty one if the file is
    /// missing or corrupt.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str(&data) {
                    Ok(catalog) => return catalog,
                    Err(e) => eprintln!("Warning: corrupt catalog file, starting empty: {}", e),
                },
                Err(e) => eprintln!("Warning: could not read catalog file: {}", e),
            }
        }
        Catalog::new()
    }

    /// Persist the catalog as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| format!("Serialize error: {}", e))?;
        fs::write(path, json).map_err(|e| format!("Write error: {}", e))?;
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&Song> {
        self.songs.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Uniform-random rotation pick, avoiding an immediate repeat of
    /// `exclude_last` whenever any other id is available. When every entry
    /// carries the excluded id (single-song catalogs, duplicate ids) a
    /// repeat beats dead air.
    pub fn pick_rotation(&self, exclude_last: Option<&str>) -> Option<&Song> {
        if self.songs.is_empty() {
            return None;
        }
        let eligible: Vec<&Song> = self
            .songs
            .iter()
            .filter(|s| Some(s.id.as_str()) != exclude_last)
            .collect();
        if eligible.is_empty() {
            return self.songs.first();
        }
        Some(eligible[fastrand::usize(..eligible.len())])
    }
}
