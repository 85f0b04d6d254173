//! Outbound seams: user notices and the host's selection callback.

use crate::location::{LocationError, SelectedLocation};
use std::fmt;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// The operation produced nothing usable.
    Error,
    /// The operation degraded but still delivered a result.
    Warning,
}

/// A message the user should see.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn from_error(err: &LocationError) -> Self {
        let level = match err {
            LocationError::GeocodeUnavailable(_) => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        Self {
            level,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Error => write!(f, "\u{274C} {}", self.message),
            NoticeLevel::Warning => write!(f, "\u{26A0}\u{FE0F}  {}", self.message),
        }
    }
}

/// Where notices go: a toast, a popup, a log line.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

impl<F> Notifier for F
where
    F: Fn(&Notice) + Send + Sync,
{
    fn notify(&self, notice: &Notice) {
        self(notice)
    }
}

/// Notices as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Error => error!(message = %notice.message, "location notice"),
            NoticeLevel::Warning => warn!(message = %notice.message, "location notice"),
        }
    }
}

/// Notices printed to stderr for terminal use.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: &Notice) {
        eprintln!("  {}", notice);
    }
}

/// The host application's "location selected" callback.
pub trait LocationSink: Send + Sync {
    fn on_location_selected(&self, location: &SelectedLocation);
}

impl<F> LocationSink for F
where
    F: Fn(&SelectedLocation) + Send + Sync,
{
    fn on_location_selected(&self, location: &SelectedLocation) {
        self(location)
    }
}
