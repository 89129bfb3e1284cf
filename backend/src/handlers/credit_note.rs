//! HTTP handlers for credit notes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{CreateCreditNoteInput, CreditNote};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::CreditNoteService;
use crate::AppState;

/// Query parameters for listing credit notes
#[derive(Debug, Deserialize)]
pub struct ListCreditNotesQuery {
    pub total_sale_id: Option<Uuid>,
}

/// Issue a credit note for over-billed quantities of a total sale
pub async fn create_credit_note(
    State(state): State<AppState>,
    Json(input): Json<CreateCreditNoteInput>,
) -> AppResult<(StatusCode, Json<CreditNote>)> {
    let service = CreditNoteService::new(state.store);
    let note = service.create_credit_note(input).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_credit_note(
    State(state): State<AppState>,
    Path(credit_note_id): Path<Uuid>,
) -> AppResult<Json<CreditNote>> {
    let service = CreditNoteService::new(state.store);
    Ok(Json(service.get_credit_note(credit_note_id)?))
}

pub async fn list_credit_notes(
    State(state): State<AppState>,
    Query(query): Query<ListCreditNotesQuery>,
) -> Json<Vec<CreditNote>> {
    let service = CreditNoteService::new(state.store);
    Json(service.list_credit_notes(query.total_sale_id))
}

/// Settle a credit note, returning its stock to virtual inventory
pub async fn settle_credit_note(
    State(state): State<AppState>,
    Path(credit_note_id): Path<Uuid>,
) -> AppResult<Json<CreditNote>> {
    let service = CreditNoteService::new(state.store);
    Ok(Json(service.settle_credit_note(credit_note_id).await?))
}
