//! Location subsystem for the picker.
//!
//! Provides GPS fix acquisition over a platform position source, Nominatim
//! forward/reverse geocoding, and the address label policy.

pub mod acquisition;
pub mod address;
pub mod platform;
pub mod providers;
pub mod types;

pub use acquisition::{AcquisitionController, Resolution};
pub use platform::{PositionSource, ReplaySource, UnsupportedSource, WatchOptions};
pub use providers::{Geocoder, NominatimClient};
pub use types::{format_coords, LocationError, PlaceOrigin, PositionFix, ResolvedPlace, SelectedLocation};
