//! Core types for the location subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default search radius handed to the host with every selection, in meters.
pub const DEFAULT_RADIUS_M: f64 = 500.0;

/// A single position report from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub lat: f64,
    pub lon: f64,
    /// Uncertainty radius reported by the platform, in meters.
    pub accuracy_m: f64,
    pub captured_at: DateTime<Utc>,
}

impl PositionFix {
    pub fn new(lat: f64, lon: f64, accuracy_m: f64) -> Self {
        Self {
            lat,
            lon,
            accuracy_m,
            captured_at: Utc::now(),
        }
    }

    /// True when `self` is strictly more precise than `other`.
    pub fn improves_on(&self, other: &PositionFix) -> bool {
        self.accuracy_m < other.accuracy_m
    }
}

/// How a place was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceOrigin {
    Gps,
    Search,
}

impl fmt::Display for PlaceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gps => write!(f, "GPS"),
            Self::Search => write!(f, "Search"),
        }
    }
}

/// A place with coordinates and, when the lookup succeeded, human-readable names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPlace {
    /// `None` only on a degraded lookup.
    pub city: Option<String>,
    /// Empty string when the service knows no district; `None` on a degraded lookup.
    pub district: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    pub origin: PlaceOrigin,
}

impl ResolvedPlace {
    /// Coordinates without names, used when reverse geocoding is unavailable.
    pub fn degraded(fix: &PositionFix) -> Self {
        Self {
            city: None,
            district: None,
            lat: fix.lat,
            lon: fix.lon,
            accuracy_m: Some(fix.accuracy_m),
            origin: PlaceOrigin::Gps,
        }
    }

    /// Provisional place shown while a GPS session is still refining.
    pub fn provisional(fix: &PositionFix) -> Self {
        Self::degraded(fix)
    }

    pub fn is_degraded(&self) -> bool {
        self.city.is_none()
    }

    pub fn display_line(&self) -> String {
        let name = match (&self.city, self.district.as_deref()) {
            (Some(city), Some(d)) if !d.is_empty() => format!("{}, {}", d, city),
            (Some(city), _) => city.clone(),
            (None, _) => "(unnamed)".to_string(),
        };
        let accuracy = match self.accuracy_m {
            Some(a) => format!(" \u{00B1}{:.0} m", a),
            None => String::new(),
        };
        format!(
            "\u{1F4CD} {} [{}]\n  \u{1F310} {}{}",
            name,
            self.origin,
            format_coords(self.lat, self.lon),
            accuracy
        )
    }
}

/// What the host application receives when the user settles on a place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedLocation {
    #[serde(flatten)]
    pub place: ResolvedPlace,
    pub radius_m: f64,
}

impl SelectedLocation {
    pub fn new(place: ResolvedPlace, radius_m: f64) -> Self {
        Self { place, radius_m }
    }
}

/// Format coordinates as "59.3293°N, 18.0686°E".
pub fn format_coords(lat: f64, lon: f64) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lon >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", lat.abs(), ns, lon.abs(), ew)
}

/// Location errors surfaced to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Geolocation is not supported on this platform")]
    Unsupported,
    #[error("Could not obtain a position: {0}")]
    Platform(String),
    #[error("No position fix was acquired in time. Retry or search manually")]
    NoFixAcquired,
    #[error("Place lookup unavailable: {0}")]
    GeocodeUnavailable(String),
    #[error("Place not found: '{0}'")]
    PlaceNotFound(String),
    #[error("No place to confirm. Search or use GPS first")]
    NoPlaceSelected,
    #[error("Enter a place to search for")]
    EmptyQuery,
    #[error("No internet connection. Check your network")]
    Offline,
    #[error("Another location request is already in progress")]
    Busy,
    #[error("Superseded by a newer location request")]
    Superseded,
}

impl LocationError {
    /// Errors the user never needs to see.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}
