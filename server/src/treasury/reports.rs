//! Financial report handlers. Reading requires `view_financialreport` or
//! the treasurer role.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::error::{TreasuryError, TreasuryResult};
use super::queries;
use super::types::{
    check_period, CreateReportRequest, FinancialReport, ReportQuery, ReportStatus,
    UpdateReportRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

async fn report_or_404(state: &AppState, id: Uuid) -> TreasuryResult<FinancialReport> {
    queries::find_report(&state.db, id)
        .await?
        .ok_or(TreasuryError::NotFound("Financial report"))
}

pub async fn list_reports(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ReportQuery>,
) -> TreasuryResult<Json<Page<FinancialReport>>> {
    auth.require_treasurer_or(LodgePermissions::VIEW_FINANCIALREPORT)?;
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_reports(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

#[utoipa::path(
    post,
    path = "/api/treasury/reports/",
    tag = "treasury",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report drafted", body = FinancialReport),
        (status = 400, description = "Invalid period"),
        (status = 403, description = "Lacks add_financialreport"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateReportRequest>,
) -> TreasuryResult<(StatusCode, Json<FinancialReport>)> {
    auth.require_permission(LodgePermissions::ADD_FINANCIALREPORT)?;
    body.validate()?;
    check_period(body.start_date, Some(body.end_date)).map_err(TreasuryError::Validation)?;

    let (income, expenses) = match (body.total_income, body.total_expenses) {
        (Some(income), Some(expenses)) => (income, expenses),
        (income, expenses) => {
            let (period_income, period_expenses) =
                queries::period_totals(&state.db, body.start_date, body.end_date).await?;
            (
                income.unwrap_or(period_income),
                expenses.unwrap_or(period_expenses),
            )
        }
    };

    let report = queries::insert_report(&state.db, &body, income, expenses, auth.id).await?;
    tracing::info!(report_id = %report.id, balance = report.balance, "Financial report created");
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<FinancialReport>> {
    auth.require_treasurer_or(LodgePermissions::VIEW_FINANCIALREPORT)?;
    Ok(Json(report_or_404(&state, id).await?))
}

pub async fn update_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateReportRequest>,
) -> TreasuryResult<Json<FinancialReport>> {
    auth.require_permission(LodgePermissions::CHANGE_FINANCIALREPORT)?;
    body.validate()?;
    let mut report = report_or_404(&state, id).await?;

    body.apply(&mut report);
    check_period(report.start_date, Some(report.end_date)).map_err(TreasuryError::Validation)?;
    queries::save_report(&state.db, &report).await?;
    Ok(Json(report))
}

pub async fn delete_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_FINANCIALREPORT)?;
    if !queries::delete_report(&state.db, id).await? {
        return Err(TreasuryError::NotFound("Financial report"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn finalize(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_FINANCIALREPORT)?;
    let mut report = report_or_404(&state, id).await?;
    if report.status != ReportStatus::Draft {
        return Err(TreasuryError::InvalidState("Only draft reports can be finalized"));
    }

    report.status = ReportStatus::Finalized;
    queries::save_report(&state.db, &report).await?;
    Ok(Json(json!({ "detail": "Informe finalizado" })))
}

pub async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_FINANCIALREPORT)?;
    let mut report = report_or_404(&state, id).await?;
    if report.status != ReportStatus::Finalized {
        return Err(TreasuryError::InvalidState("Only finalized reports can be approved"));
    }

    report.status = ReportStatus::Approved;
    report.approved_by = Some(auth.id);
    queries::save_report(&state.db, &report).await?;

    tracing::info!(report_id = %id, approved_by = %auth.id, "Financial report approved");
    Ok(Json(json!({ "detail": "Informe aprobado" })))
}
