//! Platform position capability.
//!
//! A [`PositionSource`] hands out watches: each watch is a stream of fixes
//! (or platform failures) that keeps running until it is cleared. Sources
//! shipped here:
//!
//! - [`ReplaySource`] plays a scripted or recorded track, with delays.
//! - [`UnsupportedSource`] stands in for hosts without a location capability.

use super::types::{LocationError, PositionFix};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Identifies an active watch on a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Options passed to the platform when a watch starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Oldest cached position the platform may return.
    pub max_age: Duration,
    pub timeout: Duration,
}

impl WatchOptions {
    /// Fresh, high-accuracy fixes only.
    pub fn precise(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            max_age: Duration::ZERO,
            timeout,
        }
    }
}

/// An error reported by the platform on a watch (denied, hardware failure...).
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformFailure(pub String);

pub type FixEvent = Result<PositionFix, PlatformFailure>;

/// A started watch: its id and the event stream.
pub struct FixStream {
    pub id: WatchId,
    pub events: mpsc::Receiver<FixEvent>,
}

/// A source of device positions.
pub trait PositionSource: Send + Sync {
    /// Start a watch. Fails with [`LocationError::Unsupported`] when the
    /// capability is absent.
    fn watch(&self, opts: WatchOptions) -> Result<FixStream, LocationError>;

    /// Stop a watch. Clearing an unknown or already-cleared id is a no-op.
    fn clear_watch(&self, id: WatchId);
}

// ─── Unsupported ────────────────────────────────────────────────

/// A host with no location capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSource;

impl PositionSource for UnsupportedSource {
    fn watch(&self, _opts: WatchOptions) -> Result<FixStream, LocationError> {
        Err(LocationError::Unsupported)
    }

    fn clear_watch(&self, _id: WatchId) {}
}

// ─── Replay ─────────────────────────────────────────────────────

/// One step of a replayed track.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayStep {
    Fix { lat: f64, lon: f64, accuracy_m: f64 },
    Failure(String),
}

/// A track entry on disk: either a fix or an error, emitted `after_ms` after
/// the previous entry.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrackEntry {
    Fix {
        #[serde(default)]
        after_ms: u64,
        lat: f64,
        lon: f64,
        accuracy_m: f64,
    },
    Failure {
        #[serde(default)]
        after_ms: u64,
        error: String,
    },
}

impl From<TrackEntry> for (Duration, ReplayStep) {
    fn from(entry: TrackEntry) -> Self {
        match entry {
            TrackEntry::Fix { after_ms, lat, lon, accuracy_m } => (
                Duration::from_millis(after_ms),
                ReplayStep::Fix { lat, lon, accuracy_m },
            ),
            TrackEntry::Failure { after_ms, error } => {
                (Duration::from_millis(after_ms), ReplayStep::Failure(error))
            }
        }
    }
}

/// Replays a fixed script of fixes on every watch.
///
/// Each step waits its delay (relative to the previous step) before being
/// emitted. Once the script is exhausted the watch stays open and silent,
/// like a device that stops reporting, until it is cleared.
pub struct ReplaySource {
    script: Vec<(Duration, ReplayStep)>,
    next_id: AtomicU64,
    active: Mutex<HashMap<WatchId, JoinHandle<()>>>,
}

impl ReplaySource {
    pub fn new(script: Vec<(Duration, ReplayStep)>) -> Self {
        Self {
            script,
            next_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Parse a JSON track: `[{"after_ms": 500, "lat": .., "lon": .., "accuracy_m": ..},
    /// {"after_ms": 200, "error": "denied"}, ...]`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<TrackEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries.into_iter().map(Into::into).collect()))
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read track '{}': {}", path.display(), e))?;
        Self::from_json(&data).map_err(|e| format!("invalid track '{}': {}", path.display(), e))
    }

    /// Number of watches started and not yet cleared.
    pub fn active_watches(&self) -> usize {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl PositionSource for ReplaySource {
    fn watch(&self, opts: WatchOptions) -> Result<FixStream, LocationError> {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(16);
        let script = self.script.clone();
        debug!(watch = id.0, steps = script.len(), ?opts, "replay watch started");

        let task = tokio::spawn(async move {
            for (delay, step) in script {
                tokio::time::sleep(delay).await;
                let event = match step {
                    ReplayStep::Fix { lat, lon, accuracy_m } => {
                        Ok(PositionFix::new(lat, lon, accuracy_m))
                    }
                    ReplayStep::Failure(msg) => Err(PlatformFailure(msg)),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            tx.closed().await;
        });

        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, task);
        Ok(FixStream { id, events: rx })
    }

    fn clear_watch(&self, id: WatchId) {
        let removed = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(task) = removed {
            task.abort();
            debug!(watch = id.0, "replay watch cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_replay_emits_in_order_with_delays() {
        let source = ReplaySource::new(vec![
            (Duration::from_millis(100), ReplayStep::Fix { lat: 1.0, lon: 2.0, accuracy_m: 80.0 }),
            (Duration::from_millis(100), ReplayStep::Failure("signal lost".into())),
            (Duration::from_millis(100), ReplayStep::Fix { lat: 1.1, lon: 2.1, accuracy_m: 20.0 }),
        ]);
        let start = tokio::time::Instant::now();
        let mut stream = source.watch(WatchOptions::precise(Duration::from_secs(10))).unwrap();

        let first = stream.events.recv().await.unwrap().unwrap();
        assert_eq!(first.accuracy_m, 80.0);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_millis(200));

        let second = stream.events.recv().await.unwrap();
        assert_eq!(second, Err(PlatformFailure("signal lost".into())));

        let third = stream.events.recv().await.unwrap().unwrap();
        assert_eq!(third.lat, 1.1);
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_clear_watch_is_idempotent() {
        let source = ReplaySource::new(vec![]);
        let a = source.watch(WatchOptions::precise(Duration::from_secs(1))).unwrap();
        let b = source.watch(WatchOptions::precise(Duration::from_secs(1))).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(source.active_watches(), 2);

        source.clear_watch(a.id);
        source.clear_watch(a.id);
        assert_eq!(source.active_watches(), 1);
        source.clear_watch(b.id);
        assert_eq!(source.active_watches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_script_keeps_watch_open() {
        let source = ReplaySource::new(vec![]);
        let mut stream = source.watch(WatchOptions::precise(Duration::from_secs(1))).unwrap();
        let waited = tokio::time::timeout(Duration::from_secs(60), stream.events.recv()).await;
        assert!(waited.is_err(), "stream should stay silent, not close");
    }

    #[test]
    fn test_unsupported_source() {
        let err = UnsupportedSource.watch(WatchOptions::precise(Duration::from_secs(1)));
        assert!(matches!(err, Err(LocationError::Unsupported)));
    }

    #[test]
    fn test_track_json() {
        let source = ReplaySource::from_json(
            r#"[
                {"after_ms": 250, "lat": 6.37, "lon": 2.39, "accuracy_m": 120.0},
                {"after_ms": 100, "error": "permission denied"},
                {"lat": 6.371, "lon": 2.391, "accuracy_m": 15.5}
            ]"#,
        )
        .unwrap();
        assert_eq!(source.script.len(), 3);
        assert_eq!(
            source.script[0],
            (Duration::from_millis(250), ReplayStep::Fix { lat: 6.37, lon: 2.39, accuracy_m: 120.0 })
        );
        assert_eq!(
            source.script[1],
            (Duration::from_millis(100), ReplayStep::Failure("permission denied".into()))
        );
        assert_eq!(source.script[2].0, Duration::ZERO);
    }

    #[test]
    fn test_track_json_rejects_garbage() {
        assert!(ReplaySource::from_json(r#"[{"lat": 1.0}]"#).is_err());
    }
}
