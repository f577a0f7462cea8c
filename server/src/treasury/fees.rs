//! Fee handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use super::error::{TreasuryError, TreasuryResult};
use super::queries;
use super::types::{
    check_period, CreateFeeRequest, Fee, FeeQuery, PaymentQuery, PaymentResponse,
    UpdateFeeRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

async fn fee_or_404(state: &AppState, id: Uuid) -> TreasuryResult<Fee> {
    queries::find_fee(&state.db, id)
        .await?
        .ok_or(TreasuryError::NotFound("Fee"))
}

pub async fn list_fees(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<FeeQuery>,
) -> TreasuryResult<Json<Page<Fee>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_fees(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

/// `GET fees/active`
pub async fn active_fees(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(mut query): Query<FeeQuery>,
) -> TreasuryResult<Json<Page<Fee>>> {
    query.is_active = Some(true);
    list_fees(State(state), auth, Query(query)).await
}

#[utoipa::path(
    post,
    path = "/api/treasury/fees/",
    tag = "treasury",
    request_body = CreateFeeRequest,
    responses(
        (status = 201, description = "Fee created", body = Fee),
        (status = 403, description = "Lacks add_fee"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_fee(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateFeeRequest>,
) -> TreasuryResult<(StatusCode, Json<Fee>)> {
    auth.require_permission(LodgePermissions::ADD_FEE)?;
    body.validate()?;
    check_period(body.start_date, body.end_date).map_err(TreasuryError::Validation)?;

    let fee = queries::insert_fee(&state.db, &body, auth.id).await?;
    tracing::info!(fee_id = %fee.id, amount = fee.amount, "Fee created");
    Ok((StatusCode::CREATED, Json(fee)))
}

pub async fn get_fee(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<Fee>> {
    Ok(Json(fee_or_404(&state, id).await?))
}

pub async fn update_fee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateFeeRequest>,
) -> TreasuryResult<Json<Fee>> {
    auth.require_permission(LodgePermissions::CHANGE_FEE)?;
    body.validate()?;
    let mut fee = fee_or_404(&state, id).await?;

    body.apply(&mut fee);
    check_period(fee.start_date, fee.end_date).map_err(TreasuryError::Validation)?;
    Ok(Json(queries::save_fee(&state.db, &fee).await?))
}

pub async fn delete_fee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<StatusCode> {
    auth.require_permission(LodgePermissions::DELETE_FEE)?;
    if !queries::delete_fee(&state.db, id).await? {
        return Err(TreasuryError::NotFound("Fee"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `GET fees/{id}/payments`. Members only see their own payments of the fee.
pub async fn fee_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(mut query): Query<PaymentQuery>,
) -> TreasuryResult<Json<Page<PaymentResponse>>> {
    fee_or_404(&state, id).await?;
    query.fee_id = Some(id);
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let owner = (!super::sees_all_accounts(&auth)).then_some(auth.id);
    let rows = queries::list_payments(&state.db, &query, owner, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}
