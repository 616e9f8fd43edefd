use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

/// Kind of broadcast item sitting in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Song,
    Intro,
    Outro,
    Show,
    ShowIntro,
    ShowOutro,
    /// Standalone spot (time or weather announcement).
    Announcement,
}

impl ItemType {
    /// True for items that belong to a show block.
    pub fn is_show_block(&self) -> bool {
        matches!(
            self,
            ItemType::Show | ItemType::ShowIntro | ItemType::ShowOutro
        )
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Song => write!(f, "song"),
            ItemType::Intro => write!(f, "intro"),
            ItemType::Outro => write!(f, "outro"),
            ItemType::Show => write!(f, "show"),
            ItemType::ShowIntro => write!(f, "show_intro"),
            ItemType::ShowOutro => write!(f, "show_outro"),
            ItemType::Announcement => write!(f, "announcement"),
        }
    }
}

/// One schedulable unit of audio. Immutable once created — ownership flows
/// from the station to the queue to the controller to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub path: PathBuf,
    pub item_type: ItemType,
    /// Correlates intros/outros to their song.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
}

impl QueueItem {
    pub fn new(path: PathBuf, item_type: ItemType, song_id: Option<String>) -> Self {
        QueueItem {
            path,
            item_type,
            song_id,
        }
    }

    pub fn song(path: PathBuf, song_id: &str) -> Self {
        QueueItem::new(path, ItemType::Song, Some(song_id.to_string()))
    }

    pub fn intro(path: PathBuf, song_id: &str) -> Self {
        QueueItem::new(path, ItemType::Intro, Some(song_id.to_string()))
    }

    pub fn outro(path: PathBuf, song_id: &str) -> Self {
        QueueItem::new(path, ItemType::Outro, Some(song_id.to_string()))
    }

    pub fn announcement(path: PathBuf) -> Self {
        QueueItem::new(path, ItemType::Announcement, None)
    }

    pub fn show(path: PathBuf) -> Self {
        QueueItem::new(path, ItemType::Show, None)
    }
}

/// Double-ended queue of broadcast items.
///
/// Normally-appended items play in FIFO order. `push_front` jumps ahead of
/// everything previously queued, which is how "intro immediately precedes
/// its song" is guaranteed: append the song, then front-insert the intro.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    items: VecDeque<QueueItem>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        PlaybackQueue {
            items: VecDeque::new(),
        }
    }

    /// Append an item to the back of the queue.
    pub fn push_back(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    /// Insert an item at the front, ahead of everything already queued.
    pub fn push_front(&mut self, item: QueueItem) {
        self.items.push_front(item);
    }

    /// Remove and return the next item. Empty queue is "nothing to play
    /// next", not an error.
    pub fn pop_front(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    /// Look at the next item without removing it.
    pub fn peek_front(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// True if any queued item belongs to a show block.
    pub fn has_show_item(&self) -> bool {
        self.items.iter().any(|i| i.item_type.is_show_block())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
