//! Presentation state rendered by the UI layer.

use crate::location::{LocationError, ResolvedPlace};

/// Identity of one user-initiated operation (a search or a GPS request).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(u64);

/// What the UI shows: the input box, the spinner, the result card, the last notice.
///
/// While an operation is in flight the only accepted transition is that
/// operation's own progress or completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentationState {
    pub input_text: String,
    pub is_loading: bool,
    pub resolved_place: Option<ResolvedPlace>,
    pub last_error: Option<LocationError>,
    in_flight: Option<RequestId>,
    next_request: u64,
    /// Place shown before the in-flight operation, restored if it yields nothing.
    prior_place: Option<ResolvedPlace>,
}

impl PresentationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&mut self, text: impl Into<String>) -> Result<(), LocationError> {
        self.ensure_idle()?;
        self.input_text = text.into();
        Ok(())
    }

    pub fn ensure_idle(&self) -> Result<(), LocationError> {
        if self.is_loading {
            Err(LocationError::Busy)
        } else {
            Ok(())
        }
    }

    /// Start an operation: spinner on, previous notice cleared.
    pub fn begin(&mut self) -> Result<RequestId, LocationError> {
        self.ensure_idle()?;
        self.prior_place = self.resolved_place.clone();
        self.next_request += 1;
        let id = RequestId(self.next_request);
        self.in_flight = Some(id);
        self.is_loading = true;
        self.last_error = None;
        Ok(id)
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        self.in_flight == Some(id)
    }

    /// Intermediate place while a GPS request is refining. Ignored for stale requests.
    pub fn show_provisional(&mut self, id: RequestId, place: ResolvedPlace) -> bool {
        if !self.is_current(id) {
            return false;
        }
        self.resolved_place = Some(place);
        true
    }

    /// Finish an operation. Returns `false`, changing nothing, when `id` is stale.
    ///
    /// A failure puts back the place shown before the operation began.
    pub fn complete(&mut self, id: RequestId, result: Result<ResolvedPlace, LocationError>) -> bool {
        if !self.is_current(id) {
            return false;
        }
        self.in_flight = None;
        self.is_loading = false;
        let prior = self.prior_place.take();
        match result {
            Ok(place) => self.resolved_place = Some(place),
            Err(e) => {
                self.resolved_place = prior;
                if !e.is_silent() {
                    self.last_error = Some(e);
                }
            }
        }
        true
    }

    /// Finish with coordinates only: the place is kept and the lookup failure shown.
    pub fn complete_degraded(&mut self, id: RequestId, place: ResolvedPlace, error: LocationError) -> bool {
        if !self.is_current(id) {
            return false;
        }
        self.in_flight = None;
        self.is_loading = false;
        self.prior_place = None;
        self.resolved_place = Some(place);
        self.last_error = Some(error);
        true
    }

    /// Drop the in-flight operation without a result; its completion becomes stale.
    /// Any provisional place it showed is replaced by the place shown before it.
    pub fn abandon(&mut self) -> Option<RequestId> {
        let id = self.in_flight.take()?;
        self.is_loading = false;
        self.resolved_place = self.prior_place.take();
        Some(id)
    }

    /// The place on display, for handing to the host again.
    pub fn confirmable(&self) -> Result<ResolvedPlace, LocationError> {
        self.ensure_idle()?;
        self.resolved_place.clone().ok_or(LocationError::NoPlaceSelected)
    }

    /// Drop the displayed place so the user can correct it by hand; input text stays.
    pub fn clear_place(&mut self) -> Result<(), LocationError> {
        self.ensure_idle()?;
        self.resolved_place = None;
        Ok(())
    }

    /// Clear input, result and notice.
    pub fn reset(&mut self) -> Result<(), LocationError> {
        self.ensure_idle()?;
        self.input_text.clear();
        self.resolved_place = None;
        self.last_error = None;
        Ok(())
    }
}
