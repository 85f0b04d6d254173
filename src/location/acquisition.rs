//! GPS acquisition: watch the platform, keep the best fix, stop early or at the deadline.
//!
//! Flow:  watch → fixes (keep strictly better ones) → accuracy reached | deadline → clear watch
//!
//! One controller owns at most one session. Starting a new acquisition clears
//! the previous session's watch and tells its task to give up with
//! [`LocationError::Superseded`].

use super::platform::{PlatformFailure, PositionSource, WatchId, WatchOptions};
use super::providers::{self, Geocoder};
use super::types::{LocationError, PositionFix, ResolvedPlace};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Stop refining once a fix is at least this precise, in meters.
pub const DEFAULT_DESIRED_ACCURACY_M: f64 = 50.0;
/// Time budget for refining a position.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(10_000);

struct Session {
    id: u64,
    watch: WatchId,
    cancel: oneshot::Sender<()>,
}

/// Result of resolving a fix into a place.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub place: ResolvedPlace,
    /// Set when the place lookup failed and `place` only carries coordinates.
    pub lookup_error: Option<LocationError>,
}

/// Owns the platform source and the single active session.
pub struct AcquisitionController<S: PositionSource> {
    source: Arc<S>,
    next_session: AtomicU64,
    current: Mutex<Option<Session>>,
}

/// Releases the session on every exit path, including a dropped future.
struct SessionGuard<'a, S: PositionSource> {
    controller: &'a AcquisitionController<S>,
    id: u64,
}

impl<S: PositionSource> Drop for SessionGuard<'_, S> {
    fn drop(&mut self) {
        self.controller.release(self.id);
    }
}

impl<S: PositionSource> AcquisitionController<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            next_session: AtomicU64::new(1),
            current: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Whether a session is currently running.
    pub fn is_active(&self) -> bool {
        self.lock_current().is_some()
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the session's watch, but only if `id` is still the current session.
    fn release(&self, id: u64) {
        let mut current = self.lock_current();
        if current.as_ref().is_some_and(|s| s.id == id) {
            if let Some(session) = current.take() {
                self.source.clear_watch(session.watch);
                debug!(session = id, "acquisition session released");
            }
        }
    }

    /// Cancel whatever session is running. The pending call returns `Superseded`.
    pub fn cancel(&self) {
        if let Some(prev) = self.lock_current().take() {
            self.source.clear_watch(prev.watch);
            let _ = prev.cancel.send(());
            debug!(session = prev.id, "acquisition session cancelled");
        }
    }

    /// Acquire the best fix within `max_wait`, stopping as soon as one is within
    /// `desired_accuracy_m`. `on_improved` sees every fix that beats the previous best.
    pub async fn acquire_fix<F>(
        &self,
        desired_accuracy_m: f64,
        max_wait: Duration,
        mut on_improved: F,
    ) -> Result<PositionFix, LocationError>
    where
        F: FnMut(&PositionFix),
    {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        let mut stream = {
            let mut current = self.lock_current();
            if let Some(prev) = current.take() {
                self.source.clear_watch(prev.watch);
                let _ = prev.cancel.send(());
                debug!(session = prev.id, superseded_by = id, "acquisition superseded");
            }
            let stream = self.source.watch(WatchOptions::precise(max_wait))?;
            *current = Some(Session {
                id,
                watch: stream.id,
                cancel: cancel_tx,
            });
            stream
        };
        let _guard = SessionGuard { controller: self, id };
        debug!(session = id, desired_accuracy_m, ?max_wait, "acquisition started");

        let deadline = tokio::time::sleep(max_wait);
        tokio::pin!(deadline);
        let mut best: Option<PositionFix> = None;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut cancel_rx => break Err(LocationError::Superseded),
                event = stream.events.recv() => match event {
                    Some(Ok(fix)) => {
                        debug!(session = id, lat = fix.lat, lon = fix.lon, accuracy_m = fix.accuracy_m, "fix");
                        if best.map_or(true, |b| fix.improves_on(&b)) {
                            best = Some(fix);
                            on_improved(&fix);
                        }
                        if fix.accuracy_m <= desired_accuracy_m {
                            break Ok(best.unwrap_or(fix));
                        }
                    }
                    Some(Err(PlatformFailure(msg))) => {
                        if best.is_none() {
                            break Err(LocationError::Platform(msg));
                        }
                        warn!(session = id, error = %msg, "platform error after first fix, continuing");
                    }
                    None => break best.ok_or(LocationError::NoFixAcquired),
                },
                _ = &mut deadline => {
                    debug!(session = id, have_fix = best.is_some(), "acquisition deadline reached");
                    break best.ok_or(LocationError::NoFixAcquired);
                }
            }
        };

        match &outcome {
            Ok(fix) => info!(session = id, accuracy_m = fix.accuracy_m, "position acquired"),
            Err(e) => debug!(session = id, error = %e, "acquisition ended without a fix"),
        }
        outcome
    }

    /// Acquire a fix and reverse geocode it.
    ///
    /// A failed lookup still yields the coordinates; the error travels in
    /// [`Resolution::lookup_error`].
    pub async fn acquire<G>(
        &self,
        geocoder: &Arc<G>,
        desired_accuracy_m: f64,
        max_wait: Duration,
    ) -> Result<Resolution, LocationError>
    where
        G: Geocoder + ?Sized + 'static,
    {
        let fix = self.acquire_fix(desired_accuracy_m, max_wait, |_| {}).await?;
        Ok(resolve_fix(geocoder, &fix).await)
    }
}

impl<S: PositionSource> Drop for AcquisitionController<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Reverse geocode `fix`, degrading to bare coordinates on failure.
pub async fn resolve_fix<G>(geocoder: &Arc<G>, fix: &PositionFix) -> Resolution
where
    G: Geocoder + ?Sized + 'static,
{
    match providers::reverse_blocking(Arc::clone(geocoder), fix.lat, fix.lon).await {
        Ok(mut place) => {
            place.accuracy_m = Some(fix.accuracy_m);
            Resolution { place, lookup_error: None }
        }
        Err(e) => {
            warn!(lat = fix.lat, lon = fix.lon, error = %e, "reverse geocoding failed, keeping raw coordinates");
            Resolution {
                place: ResolvedPlace::degraded(fix),
                lookup_error: Some(e),
            }
        }
    }
}
