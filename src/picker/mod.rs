//! The location picker component.
//!
//! Search flow:  input → (busy? empty? offline?) → loading → Nominatim search → selection | notice
//! GPS flow:     (busy? offline?) → loading → acquisition (provisional places) → reverse lookup
//!               → selection, degraded to bare coordinates if the lookup fails

pub mod notify;
pub mod state;

use crate::location::acquisition::{self, AcquisitionController, DEFAULT_DESIRED_ACCURACY_M, DEFAULT_MAX_WAIT};
use crate::location::providers::{self, Geocoder};
use crate::location::types::DEFAULT_RADIUS_M;
use crate::location::{LocationError, PositionSource, ResolvedPlace, SelectedLocation};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

pub use notify::{LocationSink, LogNotifier, Notice, NoticeLevel, Notifier, StderrNotifier};
pub use state::{PresentationState, RequestId};

/// Tunables for a picker instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickerSettings {
    pub desired_accuracy_m: f64,
    pub max_wait: Duration,
    /// Radius handed to the host with each selection.
    pub radius_m: f64,
}

impl Default for PickerSettings {
    fn default() -> Self {
        Self {
            desired_accuracy_m: DEFAULT_DESIRED_ACCURACY_M,
            max_wait: DEFAULT_MAX_WAIT,
            radius_m: DEFAULT_RADIUS_M,
        }
    }
}

type ConnectivityCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// GPS-or-search location picker.
pub struct LocationPicker<S: PositionSource, G: Geocoder + 'static> {
    controller: AcquisitionController<S>,
    geocoder: Arc<G>,
    settings: PickerSettings,
    state: Mutex<PresentationState>,
    notifier: Box<dyn Notifier>,
    sink: Box<dyn LocationSink>,
    is_online: ConnectivityCheck,
}

impl<S: PositionSource, G: Geocoder + 'static> LocationPicker<S, G> {
    pub fn new(source: Arc<S>, geocoder: Arc<G>, settings: PickerSettings) -> Self {
        Self {
            controller: AcquisitionController::new(source),
            geocoder,
            settings,
            state: Mutex::new(PresentationState::new()),
            notifier: Box::new(LogNotifier),
            sink: Box::new(|_: &SelectedLocation| {}),
            is_online: Box::new(|| true),
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn on_location_selected(mut self, sink: impl LocationSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Probe consulted before any network work; `false` fails fast with `Offline`.
    pub fn with_connectivity_check(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.is_online = Box::new(check);
        self
    }

    pub fn settings(&self) -> &PickerSettings {
        &self.settings
    }

    /// Snapshot of the presentation state.
    pub fn state(&self) -> PresentationState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, PresentationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_input(&self, text: impl Into<String>) -> Result<(), LocationError> {
        self.lock_state().set_input(text)
    }

    pub fn reset(&self) -> Result<(), LocationError> {
        self.lock_state().reset()
    }

    /// Hand the displayed place to the host again.
    pub fn confirm(&self) -> Result<SelectedLocation, LocationError> {
        let place = self.lock_state().confirmable()?;
        Ok(self.deliver(place))
    }

    /// Drop the displayed place, keeping the input text for a manual search.
    pub fn clear_place(&self) -> Result<(), LocationError> {
        self.lock_state().clear_place()
    }

    /// Abandon the in-flight operation. A pending GPS request stops its watch
    /// and returns `Superseded`; a pending search result is discarded.
    pub fn cancel(&self) {
        self.controller.cancel();
        if let Some(id) = self.lock_state().abandon() {
            debug!(?id, "operation abandoned");
        }
    }

    fn notify(&self, err: &LocationError) {
        if !err.is_silent() {
            self.notifier.notify(&Notice::from_error(err));
        }
    }

    /// Report a failure that happens before any loading state.
    fn reject(&self, err: LocationError) -> LocationError {
        self.notify(&err);
        err
    }

    fn ensure_online(&self) -> Result<(), LocationError> {
        if (self.is_online)() {
            Ok(())
        } else {
            Err(self.reject(LocationError::Offline))
        }
    }

    fn fail(&self, id: RequestId, err: LocationError) -> LocationError {
        let current = self.lock_state().complete(id, Err(err.clone()));
        if current {
            self.notify(&err);
            err
        } else {
            LocationError::Superseded
        }
    }

    fn deliver(&self, place: ResolvedPlace) -> SelectedLocation {
        let selection = SelectedLocation::new(place, self.settings.radius_m);
        info!(
            city = selection.place.city.as_deref().unwrap_or("-"),
            origin = %selection.place.origin,
            "location selected"
        );
        self.sink.on_location_selected(&selection);
        selection
    }

    /// Forward geocode the current input text.
    pub async fn search(&self) -> Result<SelectedLocation, LocationError> {
        let query = {
            let state = self.lock_state();
            state.ensure_idle()?;
            state.input_text.trim().to_string()
        };
        if query.is_empty() {
            return Err(self.reject(LocationError::EmptyQuery));
        }
        self.ensure_online()?;
        let id = self.lock_state().begin()?;
        debug!(?id, %query, "search started");

        match providers::search_blocking(Arc::clone(&self.geocoder), query).await {
            Ok(place) => {
                let current = self.lock_state().complete(id, Ok(place.clone()));
                if !current {
                    return Err(LocationError::Superseded);
                }
                Ok(self.deliver(place))
            }
            Err(e) => Err(self.fail(id, e)),
        }
    }

    /// Acquire a GPS position and reverse geocode it.
    ///
    /// A failed lookup still delivers the coordinates to the host, with a
    /// warning notice.
    pub async fn locate(&self) -> Result<SelectedLocation, LocationError> {
        self.lock_state().ensure_idle()?;
        self.ensure_online()?;
        let id = self.lock_state().begin()?;
        debug!(?id, "GPS request started");

        let acquired = self
            .controller
            .acquire_fix(self.settings.desired_accuracy_m, self.settings.max_wait, |fix| {
                self.lock_state().show_provisional(id, ResolvedPlace::provisional(fix));
            })
            .await;
        let fix = match acquired {
            Ok(fix) => fix,
            Err(e) => return Err(self.fail(id, e)),
        };

        let resolution = acquisition::resolve_fix(&self.geocoder, &fix).await;
        let current = match resolution.lookup_error {
            None => self.lock_state().complete(id, Ok(resolution.place.clone())),
            Some(e) => {
                let current = self
                    .lock_state()
                    .complete_degraded(id, resolution.place.clone(), e.clone());
                if current {
                    self.notify(&e);
                }
                current
            }
        };
        if !current {
            return Err(LocationError::Superseded);
        }
        Ok(self.deliver(resolution.place))
    }
}
