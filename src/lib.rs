//! # autonomy-gateway
//!
//! Location-aware public-health telemetry backend. Individuals submit
//! self-reports of symptoms and preventive behaviors tagged with a
//! coordinate; the service fuses them with confirmed-case time series
//! and user-contributed place ratings into an *Autonomy Score* per
//! user and per monitored place, and dispatches nudges when a score's
//! color bucket changes or a local symptom spike appears.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── Services (service/): collection, scoring, ratings, POIs
//!     ├── Workflow Engine (workflows/): refresh + nudge state machines
//!     │
//!     ├── Score Engine (score/): pure functions
//!     ├── Domain Model (domain/)
//!     │
//!     ├── Store (persistence/): PostgreSQL
//!     └── External (external/): geocoder, push transport
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod external;
pub mod localization;
pub mod persistence;
pub mod score;
pub mod service;
pub mod workflows;
