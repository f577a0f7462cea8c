//! Payment handlers.
//!
//! Treasurers see every payment. Other members only see their own, and a
//! payment they cannot see answers 404.

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
use super::sees_all_accounts;
use super::types::{
    parse_optional_body, CancelPaymentRequest, CompletePaymentRequest, CreatePaymentRequest,
    Payment, PaymentQuery, PaymentResponse, PaymentStatus, UpdatePaymentRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::db;
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

async fn visible_payment(state: &AppState, auth: &AuthUser, id: Uuid) -> TreasuryResult<Payment> {
    queries::find_payment(&state.db, id)
        .await?
        .filter(|p| sees_all_accounts(auth) || p.user_id == auth.id)
        .ok_or(TreasuryError::NotFound("Payment"))
}

async fn payment_response(state: &AppState, id: Uuid) -> TreasuryResult<PaymentResponse> {
    queries::find_payment_response(&state.db, id)
        .await?
        .ok_or(TreasuryError::NotFound("Payment"))
}

async fn ensure_fee(state: &AppState, fee_id: Option<Uuid>) -> TreasuryResult<()> {
    if let Some(id) = fee_id {
        queries::find_fee(&state.db, id)
            .await?
            .ok_or(TreasuryError::NotFound("Fee"))?;
    }
    Ok(())
}

async fn list_with(
    state: &AppState,
    auth: &AuthUser,
    query: &PaymentQuery,
) -> TreasuryResult<Json<Page<PaymentResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let owner = (!sees_all_accounts(auth)).then_some(auth.id);
    let rows = queries::list_payments(&state.db, query, owner, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

#[utoipa::path(
    get,
    path = "/api/treasury/payments/",
    tag = "treasury",
    params(PaymentQuery),
    responses((status = 200, description = "Payments visible to the caller")),
    security(("bearer_auth" = []))
)]
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PaymentQuery>,
) -> TreasuryResult<Json<Page<PaymentResponse>>> {
    list_with(&state, &auth, &query).await
}

/// `GET payments/pending`
pub async fn pending(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(mut query): Query<PaymentQuery>,
) -> TreasuryResult<Json<Page<PaymentResponse>>> {
    query.status = Some(PaymentStatus::Pending);
    list_with(&state, &auth, &query).await
}

/// `GET payments/overdue`: pending payments past their due date.
pub async fn overdue(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(mut query): Query<PaymentQuery>,
) -> TreasuryResult<Json<Page<PaymentResponse>>> {
    query.overdue = true;
    list_with(&state, &auth, &query).await
}

pub async fn create_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut body): Json<CreatePaymentRequest>,
) -> TreasuryResult<(StatusCode, Json<PaymentResponse>)> {
    auth.require_permission(LodgePermissions::ADD_PAYMENT)?;
    body.validate()?;
    db::find_user_by_id(&state.db, body.user_id)
        .await?
        .ok_or(TreasuryError::NotFound("User"))?;
    ensure_fee(&state, body.fee_id).await?;
    if body.status == PaymentStatus::Completed && body.payment_date.is_none() {
        body.payment_date = Some(Utc::now().date_naive());
    }

    let payment =
        queries::insert_payment(&mut *state.db.acquire().await?, &body, Some(auth.id)).await?;
    tracing::info!(
        payment_id = %payment.id,
        user_id = %payment.user_id,
        amount = payment.amount,
        "Payment recorded"
    );
    Ok((StatusCode::CREATED, Json(payment_response(&state, payment.id).await?)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<PaymentResponse>> {
    visible_payment(&state, &auth, id).await?;
    Ok(Json(payment_response(&state, id).await?))
}

pub async fn update_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePaymentRequest>,
) -> TreasuryResult<Json<PaymentResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_PAYMENT)?;
    body.validate()?;
    if let Some(fee_id) = body.fee_id {
        ensure_fee(&state, fee_id).await?;
    }
    let mut payment = visible_payment(&state, &auth, id).await?;

    body.apply(&mut payment);
    payment.stamp_completion(Utc::now().date_naive());
    queries::save_payment(&state.db, &payment).await?;
    Ok(Json(payment_response(&state, id).await?))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<StatusCode> {
    auth.require_permission(LodgePermissions::DELETE_PAYMENT)?;
    if !queries::delete_payment(&state.db, id).await? {
        return Err(TreasuryError::NotFound("Payment"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/treasury/payments/{id}/mark_as_completed",
    tag = "treasury",
    params(("id" = Uuid, Path, description = "Payment id")),
    request_body(content = CompletePaymentRequest, description = "Optional"),
    responses(
        (status = 200, description = "Payment completed"),
        (status = 400, description = "Payment already completed"),
        (status = 403, description = "Lacks change_payment"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_as_completed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> TreasuryResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_PAYMENT)?;
    let body: CompletePaymentRequest =
        parse_optional_body(&body).map_err(TreasuryError::Validation)?;
    let mut payment = visible_payment(&state, &auth, id).await?;
    if payment.status == PaymentStatus::Completed {
        return Err(TreasuryError::InvalidState("Payment is already completed"));
    }

    payment.status = PaymentStatus::Completed;
    payment.payment_date = Some(body.payment_date.unwrap_or_else(|| Utc::now().date_naive()));
    if let Some(method) = body.payment_method {
        payment.payment_method = method;
    }
    if let Some(reference) = body.reference {
        payment.reference = reference;
    }
    if let Some(notes) = body.notes {
        payment.notes = notes;
    }
    payment.recorded_by = Some(auth.id);
    queries::save_payment(&state.db, &payment).await?;

    tracing::info!(payment_id = %id, recorded_by = %auth.id, "Payment completed");
    Ok(Json(json!({ "detail": "Pago marcado como completado" })))
}

pub async fn mark_as_cancelled(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> TreasuryResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_PAYMENT)?;
    let body: CancelPaymentRequest =
        parse_optional_body(&body).map_err(TreasuryError::Validation)?;
    let mut payment = visible_payment(&state, &auth, id).await?;
    if payment.status == PaymentStatus::Cancelled {
        return Err(TreasuryError::InvalidState("Payment is already cancelled"));
    }

    payment.status = PaymentStatus::Cancelled;
    if let Some(notes) = body.notes {
        payment.notes = notes;
    }
    payment.recorded_by = Some(auth.id);
    queries::save_payment(&state.db, &payment).await?;
    Ok(Json(json!({ "detail": "Pago cancelado" })))
}
