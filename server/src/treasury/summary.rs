//! Treasury summary handler.

use axum::extract::{Query, State};
use axum::Json;

use super::error::{TreasuryError, TreasuryResult};
use super::queries;
use super::types::{FinancialSummary, SummaryQuery};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::LodgePermissions;

#[utoipa::path(
    get,
    path = "/api/treasury/summary",
    tag = "treasury",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Treasury figures", body = FinancialSummary),
        (status = 403, description = "Neither treasurer nor view_financialreport"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SummaryQuery>,
) -> TreasuryResult<Json<FinancialSummary>> {
    auth.require_treasurer_or(LodgePermissions::VIEW_FINANCIALREPORT)?;
    if let (Some(from), Some(to)) = (query.date_from, query.date_to) {
        if to < from {
            return Err(TreasuryError::Validation(
                "date_to must not precede date_from".to_string(),
            ));
        }
    }
    Ok(Json(queries::summary(&state.db, query.date_from, query.date_to).await?))
}
