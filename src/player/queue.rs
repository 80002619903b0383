//! Playback queue: ordered source records with at most one active entry.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metadata::{SourceMetadata, TrackInfo};
use crate::source::{CacheEntry, PlayableHandle};

/// Lifecycle of a queued source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    /// Known, not yet decoded
    #[default]
    Queued,
    /// Decoded ahead of time, not on display
    Loaded,
    /// The one source currently presented
    Active,
}

/// A single entry in the playback queue.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// Canonical source URL
    pub url: Url,
    pub sample_data_url: Option<Url>,
    pub state: SourceState,
    /// Display metadata, explicit or inferred from the URL
    pub info: TrackInfo,
    /// Normalized waveform samples, once decoded
    pub samples: Option<Arc<[f32]>>,
    /// Playable bytes, once fetched
    pub handle: Option<PlayableHandle>,
    pub duration: Option<Duration>,
}

impl SourceRecord {
    /// Create a queued record.
    pub fn new(url: Url, sample_data_url: Option<Url>, metadata: Option<&SourceMetadata>) -> Self {
        let info = TrackInfo::resolve(&url, metadata);
        Self {
            url,
            sample_data_url,
            state: SourceState::Queued,
            info,
            samples: None,
            handle: None,
            duration: None,
        }
    }

    /// Whether samples and a playable handle are both present.
    pub fn is_resolved(&self) -> bool {
        self.samples.is_some() && self.handle.is_some()
    }

    /// Take over the decoded data of a cache entry.
    pub fn attach(&mut self, entry: &CacheEntry) {
        self.samples = Some(Arc::clone(&entry.samples));
        self.handle = Some(entry.handle.clone());
        self.duration = entry.duration;
        if self.sample_data_url.is_none() {
            self.sample_data_url = entry.sample_data_url.clone();
        }
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn creator(&self) -> Option<&str> {
        self.info.creator.as_deref()
    }

    /// Projection handed to hosts.
    pub fn entry(&self) -> PlaylistEntry {
        PlaylistEntry {
            url: self.url.to_string(),
            sample_data_url: self.sample_data_url.as_ref().map(Url::to_string),
            state: self.state,
        }
    }
}

/// Read-only view of a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_data_url: Option<String>,
    pub state: SourceState,
}

/// Input entry for replacing the whole playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaylistItem {
    pub url: Option<String>,
    pub sample_data_url: Option<String>,
    pub state: SourceState,
    pub metadata: Option<SourceMetadata>,
}

impl PlaylistItem {
    pub fn new(url: impl Into<String>, state: SourceState) -> Self {
        Self {
            url: Some(url.into()),
            state,
            ..Self::default()
        }
    }
}

impl From<PlaylistEntry> for PlaylistItem {
    fn from(e: PlaylistEntry) -> Self {
        Self {
            url: Some(e.url),
            sample_data_url: e.sample_data_url,
            state: e.state,
            metadata: None,
        }
    }
}

/// Ordered sources, unique by URL, at most one [`SourceState::Active`].
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    records: Vec<SourceRecord>,
}

impl PlaybackQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&SourceRecord> {
        self.records.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut SourceRecord> {
        self.records.get_mut(index)
    }

    /// Index of the record for `url`.
    pub fn position(&self, url: &Url) -> Option<usize> {
        self.records.iter().position(|r| r.url == *url)
    }

    pub fn find(&self, url: &Url) -> Option<&SourceRecord> {
        self.records.iter().find(|r| r.url == *url)
    }

    pub(crate) fn find_mut(&mut self, url: &Url) -> Option<&mut SourceRecord> {
        self.records.iter_mut().find(|r| r.url == *url)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.records.iter().position(|r| r.state == SourceState::Active)
    }

    pub fn active(&self) -> Option<&SourceRecord> {
        self.active_index().map(|i| &self.records[i])
    }

    /// Append records. All or nothing: any URL already present (or repeated
    /// within the batch) rejects the whole call.
    pub fn enqueue(&mut self, records: Vec<SourceRecord>) -> Result<()> {
        let mut seen: HashSet<&str> = self.records.iter().map(|r| r.url.as_str()).collect();
        for record in &records {
            if !seen.insert(record.url.as_str()) {
                return Err(Error::DuplicateSource(record.url.to_string()));
            }
        }
        self.records.extend(records);
        Ok(())
    }

    /// Remove the record for `url`. The active record cannot be removed.
    pub fn dequeue(&mut self, url: &Url) -> Result<SourceRecord> {
        let index = self
            .position(url)
            .ok_or_else(|| Error::NotFound(url.to_string()))?;
        if self.records[index].state == SourceState::Active {
            return Err(Error::ActiveSourceConflict(format!(
                "cannot dequeue the active source {}",
                url
            )));
        }
        Ok(self.records.remove(index))
    }

    /// Projection of every record in order.
    pub fn playlist(&self) -> Vec<PlaylistEntry> {
        self.records.iter().map(SourceRecord::entry).collect()
    }

    /// Insert at the head of the queue.
    pub(crate) fn insert_front(&mut self, record: SourceRecord) {
        self.records.insert(0, record);
    }

    /// Append without validation; callers check for duplicates first.
    pub(crate) fn push(&mut self, record: SourceRecord) {
        self.records.push(record);
    }

    /// Make `index` the active record, demoting any previous one to loaded.
    pub(crate) fn activate(&mut self, index: usize) {
        for (i, record) in self.records.iter_mut().enumerate() {
            if i == index {
                record.state = SourceState::Active;
            } else if record.state == SourceState::Active {
                record.state = SourceState::Loaded;
            }
        }
    }

    /// Which record an argument-less load should present.
    pub fn next_index(&self) -> Result<usize> {
        match (self.records.len(), self.active_index()) {
            (0, _) => Err(Error::invalid("nothing to load: the queue is empty")),
            (1, _) => Ok(0),
            (_, None) => Ok(0),
            (len, Some(active)) if active + 1 < len => Ok(active + 1),
            (_, Some(active)) => Err(Error::QueueExhausted(self.records[active].url.to_string())),
        }
    }

    /// First queued record after the active one, from the head if none is active.
    pub fn next_queued_index(&self) -> Option<usize> {
        let start = self.active_index().map_or(0, |i| i + 1);
        self.records
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, r)| r.state == SourceState::Queued)
            .map(|(i, _)| i)
    }

    /// Check that `records` may replace this queue without touching the
    /// active marking.
    pub fn validate_replacement(&self, records: &[SourceRecord]) -> Result<()> {
        let mut seen = HashSet::new();
        for record in records {
            if !seen.insert(record.url.as_str()) {
                return Err(Error::DuplicateSource(record.url.to_string()));
            }
        }

        let actives: Vec<&Url> = records
            .iter()
            .filter(|r| r.state == SourceState::Active)
            .map(|r| &r.url)
            .collect();
        if actives.len() > 1 {
            return Err(Error::ActiveSourceConflict(
                "more than one active source".to_string(),
            ));
        }

        match (self.active().map(|r| &r.url), actives.first()) {
            (None, None) => Ok(()),
            (Some(before), Some(after)) if before == *after => Ok(()),
            (None, Some(after)) => Err(Error::ActiveSourceConflict(format!(
                "playlist cannot introduce an active source ({})",
                after
            ))),
            (Some(before), None) => Err(Error::ActiveSourceConflict(format!(
                "playlist cannot drop the active source ({})",
                before
            ))),
            (Some(before), Some(after)) => Err(Error::ActiveSourceConflict(format!(
                "playlist cannot move the active source from {} to {}",
                before, after
            ))),
        }
    }

    /// Swap in a validated record list.
    pub(crate) fn replace(&mut self, records: Vec<SourceRecord>) {
        self.records = records;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn record(name: &str) -> SourceRecord {
        let url = Url::parse(&format!("https://example.com/{}", name)).unwrap();
        SourceRecord::new(url, None, None)
    }

    fn url(name: &str) -> Url {
        Url::parse(&format!("https://example.com/{}", name)).unwrap()
    }

    fn queue_of(names: &[&str]) -> PlaybackQueue {
        let mut queue = PlaybackQueue::new();
        queue.enqueue(names.iter().map(|n| record(n)).collect()).unwrap();
        queue
    }

    #[test]
    fn test_enqueue_preserves_order() {
        let queue = queue_of(&["a.mp3", "b.mp3", "c.mp3"]);
        let urls: Vec<_> = queue.playlist().into_iter().map(|e| e.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/a.mp3",
                "https://example.com/b.mp3",
                "https://example.com/c.mp3"
            ]
        );
        assert!(queue.playlist().iter().all(|e| e.state == SourceState::Queued));
    }

    #[test]
    fn test_enqueue_duplicate_rejects_whole_batch() {
        let mut queue = queue_of(&["a.mp3"]);
        let err = queue
            .enqueue(vec![record("b.mp3"), record("a.mp3")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateSource);
        assert_eq!(queue.len(), 1);

        let err = queue
            .enqueue(vec![record("c.mp3"), record("c.mp3")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateSource);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_dequeue() {
        let mut queue = queue_of(&["a.mp3", "b.mp3"]);
        let removed = queue.dequeue(&url("a.mp3")).unwrap();
        assert_eq!(removed.url, url("a.mp3"));
        assert_eq!(queue.len(), 1);

        let err = queue.dequeue(&url("zzz.mp3")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_dequeue_active_conflicts() {
        let mut queue = queue_of(&["a.mp3", "b.mp3"]);
        queue.activate(0);
        let err = queue.dequeue(&url("a.mp3")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActiveSourceConflict);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_activate_demotes_previous() {
        let mut queue = queue_of(&["a.mp3", "b.mp3"]);
        queue.activate(0);
        queue.activate(1);
        assert_eq!(queue.records()[0].state, SourceState::Loaded);
        assert_eq!(queue.records()[1].state, SourceState::Active);
    }

    #[test]
    fn test_next_index_rules() {
        assert_eq!(
            PlaybackQueue::new().next_index().unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let mut single = queue_of(&["a.mp3"]);
        single.activate(0);
        assert_eq!(single.next_index().unwrap(), 0);

        let mut queue = queue_of(&["a.mp3", "b.mp3"]);
        assert_eq!(queue.next_index().unwrap(), 0);
        queue.activate(0);
        assert_eq!(queue.next_index().unwrap(), 1);
        queue.activate(1);
        assert_eq!(queue.next_index().unwrap_err().kind(), ErrorKind::QueueExhausted);
    }

    #[test]
    fn test_next_queued_skips_loaded() {
        let mut queue = queue_of(&["a.mp3", "b.mp3", "c.mp3"]);
        assert_eq!(queue.next_queued_index(), Some(0));
        queue.activate(0);
        queue.records[1].state = SourceState::Loaded;
        assert_eq!(queue.next_queued_index(), Some(2));
        queue.records[2].state = SourceState::Loaded;
        assert_eq!(queue.next_queued_index(), None);
    }

    #[test]
    fn test_replacement_active_rules() {
        let mut queue = queue_of(&["a.mp3", "b.mp3"]);

        // No active before: introducing one conflicts
        let mut introduce = vec![record("a.mp3")];
        introduce[0].state = SourceState::Active;
        assert_eq!(
            queue.validate_replacement(&introduce).unwrap_err().kind(),
            ErrorKind::ActiveSourceConflict
        );
        assert!(queue.validate_replacement(&[record("b.mp3")]).is_ok());

        queue.activate(0);
        // Dropping the active entry conflicts
        assert_eq!(
            queue.validate_replacement(&[record("b.mp3")]).unwrap_err().kind(),
            ErrorKind::ActiveSourceConflict
        );
        // Moving the active marking conflicts
        let mut moved = vec![record("a.mp3"), record("b.mp3")];
        moved[1].state = SourceState::Active;
        assert_eq!(
            queue.validate_replacement(&moved).unwrap_err().kind(),
            ErrorKind::ActiveSourceConflict
        );
        // Keeping it is fine, even reordered
        let mut kept = vec![record("c.mp3"), record("a.mp3")];
        kept[1].state = SourceState::Active;
        assert!(queue.validate_replacement(&kept).is_ok());
    }

    #[test]
    fn test_replacement_rejects_duplicates() {
        let queue = queue_of(&["a.mp3"]);
        let err = queue
            .validate_replacement(&[record("b.mp3"), record("b.mp3")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateSource);
    }

    #[test]
    fn test_playlist_json_shape() {
        let mut queue = queue_of(&["a.mp3"]);
        queue.activate(0);
        let json = serde_json::to_string(&queue.playlist()).unwrap();
        assert_eq!(json, r#"[{"url":"https://example.com/a.mp3","state":"active"}]"#);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue(Vec<u8>),
        Dequeue(u8),
        Advance,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::vec(0u8..8, 1..4).prop_map(Op::Enqueue),
            (0u8..8).prop_map(Op::Dequeue),
            Just(Op::Advance),
        ]
    }

    proptest! {
        #[test]
        fn prop_unique_urls_and_single_active(ops in prop::collection::vec(op(), 1..40)) {
            let mut queue = PlaybackQueue::new();
            for op in ops {
                let before = queue.len();
                match op {
                    Op::Enqueue(ids) => {
                        let batch: Vec<_> = ids.iter().map(|i| record(&format!("{}.mp3", i))).collect();
                        let n = batch.len();
                        match queue.enqueue(batch) {
                            Ok(()) => prop_assert_eq!(queue.len(), before + n),
                            Err(_) => prop_assert_eq!(queue.len(), before),
                        }
                    }
                    Op::Dequeue(id) => {
                        let _ = queue.dequeue(&url(&format!("{}.mp3", id)));
                    }
                    Op::Advance => {
                        if let Ok(index) = queue.next_index() {
                            queue.activate(index);
                        }
                    }
                }

                let urls: HashSet<_> = queue.records().iter().map(|r| r.url.clone()).collect();
                prop_assert_eq!(urls.len(), queue.len());
                let actives = queue.records().iter().filter(|r| r.state == SourceState::Active).count();
                prop_assert!(actives <= 1);
            }
        }
    }
}
