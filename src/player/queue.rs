use crate::api::models::Track;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::VecDeque;

/// Local upcoming queue (FIFO for "next") and bounded history (LIFO for
/// "previous").
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackQueue {
    #[serde(rename = "queue")]
    upcoming: VecDeque<Track>,
    history: VecDeque<Track>,
    #[serde(skip)]
    history_limit: usize,
    /// Unshuffled upcoming order while shuffle is on.
    #[serde(skip)]
    original_order: Option<Vec<Track>>,
}

impl PlaybackQueue {
    pub fn new(history_limit: usize) -> Self {
        Self {
            upcoming: VecDeque::new(),
            history: VecDeque::new(),
            history_limit,
            original_order: None,
        }
    }

    pub fn upcoming(&self) -> &VecDeque<Track> {
        &self.upcoming
    }

    pub fn history(&self) -> &VecDeque<Track> {
        &self.history
    }

    pub fn is_shuffled(&self) -> bool {
        self.original_order.is_some()
    }

    /// Replaces the upcoming tracks. History is kept.
    pub fn set_upcoming(&mut self, tracks: Vec<Track>) {
        if self.original_order.is_some() {
            self.original_order = Some(tracks.clone());
            let mut shuffled = tracks;
            shuffled.shuffle(&mut rand::thread_rng());
            self.upcoming = shuffled.into();
        } else {
            self.upcoming = tracks.into();
        }
    }

    pub fn enqueue(&mut self, track: Track) {
        if let Some(original) = self.original_order.as_mut() {
            original.push(track.clone());
        }
        self.upcoming.push_back(track);
    }

    /// Pushes onto history, dropping the oldest entry past the limit.
    pub fn push_history(&mut self, track: Track) {
        self.history.push_back(track);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    /// Pops the queue head. The track it replaces goes to history. `None`
    /// leaves everything untouched.
    pub fn advance(&mut self, current: Option<Track>) -> Option<Track> {
        let next = self.upcoming.pop_front()?;
        self.forget_original(&next);
        if let Some(current) = current {
            self.push_history(current);
        }
        Some(next)
    }

    /// Mirror of [`advance`](Self::advance): pops the most recent history
    /// entry and puts `current` back at the queue head.
    pub fn retreat(&mut self, current: Option<Track>) -> Option<Track> {
        let previous = self.history.pop_back()?;
        if let Some(current) = current {
            if let Some(original) = self.original_order.as_mut() {
                original.insert(0, current.clone());
            }
            self.upcoming.push_front(current);
        }
        Some(previous)
    }

    pub fn shuffle(&mut self) {
        if self.original_order.is_none() {
            self.original_order = Some(self.upcoming.iter().cloned().collect());
        }
        self.upcoming
            .make_contiguous()
            .shuffle(&mut rand::thread_rng());
    }

    /// Restores the pre-shuffle order of whatever is still upcoming.
    pub fn unshuffle(&mut self) {
        let Some(original) = self.original_order.take() else {
            return;
        };
        let mut remaining: Vec<Track> = self.upcoming.drain(..).collect();
        for track in original {
            if let Some(pos) = remaining.iter().position(|t| t.id == track.id) {
                self.upcoming.push_back(remaining.remove(pos));
            }
        }
        // Anything not in the snapshot keeps its relative order at the end.
        self.upcoming.extend(remaining);
    }

    pub fn clear(&mut self) {
        self.upcoming.clear();
        self.history.clear();
        if self.original_order.is_some() {
            self.original_order = Some(Vec::new());
        }
    }

    fn forget_original(&mut self, track: &Track) {
        if let Some(original) = self.original_order.as_mut() {
            if let Some(pos) = original.iter().position(|t| t.id == track.id) {
                original.remove(pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::AlbumRef;

    fn make_track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Track {}", id),
            artists: vec![],
            album: AlbumRef::default(),
            duration_ms: 30_000,
            preview_url: Some(format!("https://p.scdn.co/{}", id)),
            uri: format!("spotify:track:{}", id),
        }
    }

    fn ids(tracks: &VecDeque<Track>) -> Vec<&str> {
        tracks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_advance_then_retreat_restores_shape() {
        let mut q = PlaybackQueue::new(20);
        q.set_upcoming(vec![make_track("b"), make_track("c")]);
        q.push_history(make_track("z"));

        let next = q.advance(Some(make_track("a"))).unwrap();
        assert_eq!(next.id, "b");
        assert_eq!(ids(q.upcoming()), vec!["c"]);
        assert_eq!(ids(q.history()), vec!["z", "a"]);

        let previous = q.retreat(Some(next)).unwrap();
        assert_eq!(previous.id, "a");
        assert_eq!(ids(q.upcoming()), vec!["b", "c"]);
        assert_eq!(ids(q.history()), vec!["z"]);
    }

    #[test]
    fn test_empty_lists_are_noops() {
        let mut q = PlaybackQueue::new(20);
        assert!(q.advance(Some(make_track("a"))).is_none());
        assert!(q.retreat(Some(make_track("a"))).is_none());
        assert!(q.upcoming().is_empty());
        assert!(q.history().is_empty());
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut q = PlaybackQueue::new(3);
        for id in ["1", "2", "3", "4", "5"] {
            q.push_history(make_track(id));
        }
        assert_eq!(ids(q.history()), vec!["3", "4", "5"]);
    }

    #[test]
    fn test_shuffle_unshuffle_restores_order() {
        let mut q = PlaybackQueue::new(20);
        let tracks: Vec<Track> = (0..10).map(|i| make_track(&i.to_string())).collect();
        q.set_upcoming(tracks);

        q.shuffle();
        assert!(q.is_shuffled());
        assert_eq!(q.upcoming().len(), 10);

        let played = q.advance(None).unwrap();
        q.enqueue(make_track("extra"));
        q.unshuffle();

        let mut expected: Vec<String> = (0..10)
            .map(|i| i.to_string())
            .filter(|id| *id != played.id)
            .collect();
        expected.push("extra".into());
        let actual: Vec<String> = q.upcoming().iter().map(|t| t.id.clone()).collect();
        assert_eq!(actual, expected);
        assert!(!q.is_shuffled());
    }

    #[test]
    fn test_serializes_as_queue_and_history() {
        let mut q = PlaybackQueue::new(20);
        q.enqueue(make_track("a"));
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["queue"][0]["id"], "a");
        assert!(json["history"].as_array().unwrap().is_empty());
    }
}
