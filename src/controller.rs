//! Playback controller — owns the queue and the player, advances the queue
//! automatically on completion, and exposes item lifecycle hooks.
//!
//! All state transitions happen behind one mutex, so callbacks from the
//! player's completion loop and direct calls from any thread land on a
//! single serialized timeline. Listeners run on that timeline and must not
//! call back into the controller; the finished hook gets mutable queue
//! access instead, which is how follow-up items (outros) are front-inserted
//! before the next queued item starts.

use crate::player::{AudioPlayer, CompletionFn, PlayerState};
use crate::queue::{PlaybackQueue, QueueItem};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Observer for item lifecycle events. `on_item_started` fires strictly
/// before the matching `on_item_finished`; the next item's started hook
/// fires strictly after the previous item's finished hook.
pub trait PlaybackListener: Send {
    fn on_item_started(&self, item: &QueueItem);
    fn on_item_finished(&self, item: &QueueItem, queue: &mut PlaybackQueue);
    /// A player error while auto-advancing. The item is skipped and the
    /// broadcast continues.
    fn on_item_error(&self, _item: &QueueItem, _error: &str) {}
}

struct ControllerInner {
    queue: PlaybackQueue,
    player: AudioPlayer,
    is_playing: bool,
    /// Monotonic id of the most recent `begin_item`. Completion callbacks
    /// carry the id they were issued for, so a callback extracted by the
    /// player's poll loop just before a skip/restart cannot be attributed
    /// to the item that replaced its own.
    play_seq: u64,
    /// The item bound to the player. Retained across pause so resume can
    /// continue it; non-None iff something started and was not superseded.
    current_item: Option<QueueItem>,
}

type ListenerList = Arc<Mutex<Vec<Box<dyn PlaybackListener>>>>;

/// Clonable handle; clones share the same queue, player, and listeners.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Mutex<ControllerInner>>,
    listeners: ListenerList,
}

impl PlaybackController {
    pub fn new(player: AudioPlayer) -> Self {
        PlaybackController {
            inner: Arc::new(Mutex::new(ControllerInner {
                queue: PlaybackQueue::new(),
                player,
                is_playing: false,
                play_seq: 0,
                current_item: None,
            })),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a lifecycle listener. Listeners are invoked in
    /// registration order.
    pub fn subscribe(&self, listener: Box<dyn PlaybackListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    // ── Queue access ────────────────────────────────────────────────────

    pub fn enqueue(&self, item: QueueItem) {
        self.inner.lock().unwrap().queue.push_back(item);
    }

    /// Insert an item so it plays before everything already queued.
    pub fn insert_next(&self, item: QueueItem) {
        self.inner.lock().unwrap().queue.push_front(item);
    }

    /// Queue a song with its intro, guaranteeing the intro immediately
    /// precedes the song regardless of current queue depth.
    pub fn add_song_with_intro(&self, song_path: PathBuf, intro_path: PathBuf, song_id: &str) {
        let mut g = self.inner.lock().unwrap();
        g.queue.push_back(QueueItem::song(song_path, song_id));
        g.queue.push_front(QueueItem::intro(intro_path, song_id));
    }

    pub fn clear_queue(&self) {
        self.inner.lock().unwrap().queue.clear();
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn peek_next(&self) -> Option<QueueItem> {
        self.inner.lock().unwrap().queue.peek_front().cloned()
    }

    // ── Transport ───────────────────────────────────────────────────────

    /// Begin playing from the queue. No-op when already playing or when
    /// the queue is empty. A player error on the first item is propagated —
    /// playing nothing would stall the broadcast undetected.
    pub fn start(&self) -> Result<(), String> {
        let mut g = self.inner.lock().unwrap();
        if g.is_playing {
            return Ok(());
        }
        match g.queue.pop_front() {
            Some(item) => self.begin_item(&mut g, item),
            None => Ok(()),
        }
    }

    /// Pause playback, deliberately retaining `current_item` so `resume`
    /// can continue it.
    pub fn pause(&self) {
        let mut g = self.inner.lock().unwrap();
        if g.is_playing {
            g.player.pause();
            g.is_playing = false;
        }
    }

    /// Resume playback. A paused player continues from its position; if the
    /// player was stopped outright but an item is still bound, that item is
    /// replayed from the top (the documented restart-from-start fallback).
    pub fn resume(&self) -> Result<(), String> {
        let mut g = self.inner.lock().unwrap();
        if g.is_playing {
            return Ok(());
        }
        if g.player.state() == PlayerState::Paused {
            g.player.resume();
            g.is_playing = true;
            return Ok(());
        }
        match g.current_item.clone() {
            Some(item) => self.begin_item(&mut g, item),
            None => Ok(()),
        }
    }

    /// Discard the current item (its completion is suppressed, no finished
    /// hook) and immediately play the next queued item.
    pub fn skip(&self) {
        let mut g = self.inner.lock().unwrap();
        g.player.stop();
        g.is_playing = false;
        g.current_item = None;
        self.advance(&mut g);
    }

    /// Halt playback. The queue is left intact; `current_item` is cleared.
    pub fn stop(&self) {
        let mut g = self.inner.lock().unwrap();
        g.player.stop();
        g.is_playing = false;
        g.current_item = None;
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().is_playing
    }

    pub fn current_item(&self) -> Option<QueueItem> {
        self.inner.lock().unwrap().current_item.clone()
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Bind `item` to the player and start it. The completion callback
    /// holds weak references so a dropped controller never keeps itself
    /// alive through a pending callback.
    fn begin_item(&self, g: &mut ControllerInner, item: QueueItem) -> Result<(), String> {
        g.play_seq += 1;
        let token = g.play_seq;
        g.current_item = Some(item.clone());
        {
            let ls = self.listeners.lock().unwrap();
            for l in ls.iter() {
                l.on_item_started(&item);
            }
        }

        let inner_weak = Arc::downgrade(&self.inner);
        let listeners_weak = Arc::downgrade(&self.listeners);
        let on_complete: CompletionFn = Box::new(move || {
            if let (Some(inner), Some(listeners)) =
                (inner_weak.upgrade(), listeners_weak.upgrade())
            {
                PlaybackController { inner, listeners }.handle_completion(token);
            }
        });

        match g.player.play(&item.path, on_complete) {
            Ok(()) => {
                g.is_playing = true;
                Ok(())
            }
            Err(e) => {
                g.current_item = None;
                g.is_playing = false;
                Err(e)
            }
        }
    }

    /// Invoked by the player's completion loop. Fires the finished hook
    /// (which may front-insert follow-up items), then auto-advances —
    /// gapless, with no external polling.
    fn handle_completion(&self, token: u64) {
        let mut g = self.inner.lock().unwrap();
        if !g.is_playing || g.play_seq != token {
            // Completion raced an explicit stop/skip, or was issued for an
            // item that has since been replaced; either way the item it
            // describes is no longer ours.
            return;
        }
        let Some(finished) = g.current_item.take() else {
            return;
        };
        g.is_playing = false;
        {
            let ls = self.listeners.lock().unwrap();
            for l in ls.iter() {
                l.on_item_finished(&finished, &mut g.queue);
            }
        }
        self.advance(&mut g);
    }

    /// Play the next queued item, skipping past items the player rejects
    /// so one broken file cannot stall the broadcast.
    fn advance(&self, g: &mut ControllerInner) {
        while let Some(item) = g.queue.pop_front() {
            match self.begin_item(g, item.clone()) {
                Ok(()) => return,
                Err(e) => {
                    let ls = self.listeners.lock().unwrap();
                    for l in ls.iter() {
                        l.on_item_error(&item, &e);
                    }
                }
            }
        }
    }
}
