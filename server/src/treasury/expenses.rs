//! Expense handlers. Only the treasurer records and settles expenses.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::error::{TreasuryError, TreasuryResult};
use super::queries;
use super::types::{
    parse_optional_body, ApproveExpenseRequest, CreateExpenseRequest, Expense, ExpenseQuery,
    ExpenseStatus, UpdateExpenseRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::OfficerRoleCode;
use crate::util::{page_bounds, Page};

const TREASURER: &[OfficerRoleCode] = &[OfficerRoleCode::Tes];

async fn expense_or_404(state: &AppState, id: Uuid) -> TreasuryResult<Expense> {
    queries::find_expense(&state.db, id)
        .await?
        .ok_or(TreasuryError::NotFound("Expense"))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ExpenseQuery>,
) -> TreasuryResult<Json<Page<Expense>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_expenses(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn create_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateExpenseRequest>,
) -> TreasuryResult<(StatusCode, Json<Expense>)> {
    auth.require_role(TREASURER)?;
    body.validate()?;

    let payment_date = match body.status {
        ExpenseStatus::Paid => body.payment_date.or_else(|| Some(Utc::now().date_naive())),
        _ => body.payment_date,
    };
    let expense = queries::insert_expense(&state.db, &body, payment_date, auth.id).await?;
    tracing::info!(expense_id = %expense.id, amount = expense.amount, "Expense recorded");
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn get_expense(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<Expense>> {
    Ok(Json(expense_or_404(&state, id).await?))
}

pub async fn update_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateExpenseRequest>,
) -> TreasuryResult<Json<Expense>> {
    auth.require_role(TREASURER)?;
    body.validate()?;
    let mut expense = expense_or_404(&state, id).await?;

    body.apply(&mut expense);
    expense.stamp_payment(Utc::now().date_naive());
    queries::save_expense(&state.db, &expense).await?;
    Ok(Json(expense))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<StatusCode> {
    auth.require_role(TREASURER)?;
    if !queries::delete_expense(&state.db, id).await? {
        return Err(TreasuryError::NotFound("Expense"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST expenses/{id}/approve` with an optional `{payment_date}`.
pub async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> TreasuryResult<Json<Value>> {
    auth.require_role(TREASURER)?;
    let body: ApproveExpenseRequest =
        parse_optional_body(&body).map_err(TreasuryError::Validation)?;
    let mut expense = expense_or_404(&state, id).await?;
    if expense.status != ExpenseStatus::Pending {
        return Err(TreasuryError::InvalidState("Only pending expenses can be approved"));
    }

    expense.status = ExpenseStatus::Paid;
    expense.payment_date = Some(body.payment_date.unwrap_or_else(|| Utc::now().date_naive()));
    expense.approved_by = Some(auth.id);
    queries::save_expense(&state.db, &expense).await?;

    tracing::info!(expense_id = %id, approved_by = %auth.id, "Expense approved");
    Ok(Json(json!({ "detail": "Gasto aprobado y marcado como pagado" })))
}

pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<Value>> {
    auth.require_role(TREASURER)?;
    let mut expense = expense_or_404(&state, id).await?;
    match expense.status {
        ExpenseStatus::Cancelled => {
            return Err(TreasuryError::InvalidState("Expense is already cancelled"))
        }
        ExpenseStatus::Paid => {
            return Err(TreasuryError::InvalidState("Paid expenses cannot be cancelled"))
        }
        ExpenseStatus::Pending => {}
    }

    expense.status = ExpenseStatus::Cancelled;
    queries::save_expense(&state.db, &expense).await?;
    Ok(Json(json!({ "detail": "Gasto cancelado" })))
}
