//! Service layer: business logic orchestration.
//!
//! Stateless coordinators over the storage seam and the external
//! clients. Handlers stay thin; the actual operations live here or in
//! `workflows`.

pub mod metric_service;
pub mod poi_service;
pub mod profile_service;
pub mod rating_service;
pub mod report_items;
pub mod report_service;

pub use metric_service::MetricService;
pub use poi_service::PoiService;
pub use profile_service::ProfileService;
pub use rating_service::RatingService;
pub use report_service::ReportService;
