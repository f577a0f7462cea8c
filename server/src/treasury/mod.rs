//! Treasury Module
//!
//! Fees, payments, invoices, financial reports and expenses. Amounts are
//! integer cents.

mod error;
pub mod expenses;
pub mod fees;
pub mod invoices;
pub mod payments;
pub mod queries;
pub mod reports;
pub mod summary;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::{LodgePermissions, OfficerRoleCode};

pub use error::{TreasuryError, TreasuryResult};

/// Treasurers and holders of `view_financialreport` see every member's
/// payments and invoices.
pub(crate) fn sees_all_accounts(auth: &AuthUser) -> bool {
    auth.holds_role(&[OfficerRoleCode::Tes])
        || auth.has_permission(LodgePermissions::VIEW_FINANCIALREPORT)
}

/// Treasury routes, mounted under `/api/treasury` behind `require_auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fees/", get(fees::list_fees).post(fees::create_fee))
        .route("/fees/active", get(fees::active_fees))
        .route(
            "/fees/{id}",
            get(fees::get_fee)
                .patch(fees::update_fee)
                .delete(fees::delete_fee),
        )
        .route("/fees/{id}/payments", get(fees::fee_payments))
        .route(
            "/payments/",
            get(payments::list_payments).post(payments::create_payment),
        )
        .route("/payments/pending", get(payments::pending))
        .route("/payments/overdue", get(payments::overdue))
        .route(
            "/payments/{id}",
            get(payments::get_payment)
                .patch(payments::update_payment)
                .delete(payments::delete_payment),
        )
        .route(
            "/payments/{id}/mark_as_completed",
            post(payments::mark_as_completed),
        )
        .route(
            "/payments/{id}/mark_as_cancelled",
            post(payments::mark_as_cancelled),
        )
        .route(
            "/invoices/",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route(
            "/invoices/{id}",
            get(invoices::get_invoice)
                .patch(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route("/invoices/{id}/items", get(invoices::items))
        .route("/invoices/{id}/add_item", post(invoices::add_item))
        .route("/invoices/{id}/issue", post(invoices::issue))
        .route("/invoices/{id}/mark_as_paid", post(invoices::mark_as_paid))
        .route("/invoices/{id}/cancel", post(invoices::cancel))
        .route(
            "/reports/",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/reports/{id}",
            get(reports::get_report)
                .patch(reports::update_report)
                .delete(reports::delete_report),
        )
        .route("/reports/{id}/finalize", post(reports::finalize))
        .route("/reports/{id}/approve", post(reports::approve))
        .route(
            "/expenses/",
            get(expenses::list_expenses).post(expenses::create_expense),
        )
        .route(
            "/expenses/{id}",
            get(expenses::get_expense)
                .patch(expenses::update_expense)
                .delete(expenses::delete_expense),
        )
        .route("/expenses/{id}/approve", post(expenses::approve))
        .route("/expenses/{id}/cancel", post(expenses::cancel))
        .route("/summary", get(summary::summary))
}
