//! External collaborators behind trait seams: geocoding and push
//! notifications.

pub mod geocoder;
pub mod notifier;

pub use geocoder::{Geocoder, NominatimGeocoder};
pub use notifier::{NotificationCenter, PushClient};
