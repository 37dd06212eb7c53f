//! Durable nudge workflows.
//!
//! [`WorkflowEngine`] runs the state machines described by the scoring
//! pipeline: account/POI state refresh with notification fan-out, the
//! delayed symptom follow-up, and the behavior reminders with their
//! cool-downs. Single-flight per workflow id; bounded retries per
//! activity.

pub mod engine;
pub mod nudge;
pub mod score_refresh;

pub use engine::{WorkflowEngine, WorkflowError};
pub use score_refresh::{NotificationProfile, PoiMetricState};
