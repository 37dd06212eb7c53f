//! REST endpoint handlers organized by resource.

pub mod account;
pub mod help;
pub mod poi;
pub mod profile;
pub mod rating;
pub mod report;
pub mod report_item;
pub mod score;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(account::routes())
        .merge(profile::routes())
        .merge(poi::routes())
        .merge(rating::routes())
        .merge(report::routes())
        .merge(report_item::routes())
        .merge(help::routes())
        .merge(score::routes())
}
