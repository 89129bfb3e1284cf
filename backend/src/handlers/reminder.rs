//! HTTP handlers for reminders

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::Reminder;

use crate::services::ReminderService;
use crate::AppState;

/// Query parameters for pending reminders
#[derive(Debug, Deserialize)]
pub struct ReminderQuery {
    /// Defaults to today (UTC)
    pub as_of: Option<NaiveDate>,
}

pub async fn list_reminders(
    State(state): State<AppState>,
    Query(query): Query<ReminderQuery>,
) -> Json<Vec<Reminder>> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let service = ReminderService::new(state.store);
    Json(service.pending_reminders(as_of))
}
