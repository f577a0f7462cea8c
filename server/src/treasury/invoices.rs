//! Invoice handlers.
//!
//! Invoices move draft -> issued -> paid, or to cancelled. Issuing one
//! creates the pending payment the member owes, once.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use super::error::{TreasuryError, TreasuryResult};
use super::queries;
use super::sees_all_accounts;
use super::types::{
    CreateInvoiceRequest, CreatePaymentRequest, Invoice, InvoiceItem, InvoiceItemRequest,
    InvoiceQuery, InvoiceResponse, InvoiceStatus, Payment, PaymentMethod, PaymentStatus,
    UpdateInvoiceRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::db;
use crate::notify::{self, Notice};
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

fn line_total(item: &InvoiceItemRequest) -> TreasuryResult<i64> {
    item.total_price()
        .ok_or_else(|| TreasuryError::Validation("item total is out of range".to_string()))
}

fn issued_payment(invoice: &Invoice) -> CreatePaymentRequest {
    CreatePaymentRequest {
        user_id: invoice.user_id,
        fee_id: None,
        amount: invoice.total,
        status: PaymentStatus::Pending,
        payment_method: PaymentMethod::Other,
        payment_date: None,
        due_date: Some(invoice.due_date),
        reference: invoice.payment_reference(),
        notes: format!(
            "Pago automático generado para la factura #{}",
            invoice.invoice_number
        ),
    }
}

/// Create the invoice's pending payment unless one already carries its
/// reference, and tell the member.
async fn on_issued(conn: &mut PgConnection, invoice: &Invoice) -> sqlx::Result<Option<Payment>> {
    let reference = invoice.payment_reference();
    if queries::payment_reference_exists(conn, invoice.user_id, &reference).await? {
        return Ok(None);
    }

    let payment = queries::insert_payment(conn, &issued_payment(invoice), invoice.created_by).await?;
    let notice = Notice::invoice_issued(&invoice.invoice_number, invoice.total, invoice.due_date)
        .by(invoice.created_by);
    notify::notify_users(conn, &notice, &[invoice.user_id]).await?;

    tracing::info!(
        invoice_id = %invoice.id,
        payment_id = %payment.id,
        amount = payment.amount,
        "Pending payment generated for issued invoice"
    );
    Ok(Some(payment))
}

async fn visible_invoice(state: &AppState, auth: &AuthUser, id: Uuid) -> TreasuryResult<Invoice> {
    queries::find_invoice(&state.db, id)
        .await?
        .filter(|i| sees_all_accounts(auth) || i.user_id == auth.id)
        .ok_or(TreasuryError::NotFound("Invoice"))
}

async fn invoice_response(state: &AppState, id: Uuid) -> TreasuryResult<InvoiceResponse> {
    queries::find_invoice_response(&state.db, id)
        .await?
        .ok_or(TreasuryError::NotFound("Invoice"))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<InvoiceQuery>,
) -> TreasuryResult<Json<Page<InvoiceResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let owner = (!sees_all_accounts(&auth)).then_some(auth.id);
    let rows = queries::list_invoices(&state.db, &query, owner, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

#[utoipa::path(
    post,
    path = "/api/treasury/invoices/",
    tag = "treasury",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created with its items", body = InvoiceResponse),
        (status = 403, description = "Lacks add_invoice"),
        (status = 409, description = "Invoice number already used"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateInvoiceRequest>,
) -> TreasuryResult<(StatusCode, Json<InvoiceResponse>)> {
    auth.require_permission(LodgePermissions::ADD_INVOICE)?;
    body.validate()?;
    if body.due_date < body.issue_date {
        return Err(TreasuryError::Validation(
            "due date must not precede issue date".to_string(),
        ));
    }
    db::find_user_by_id(&state.db, body.user_id)
        .await?
        .ok_or(TreasuryError::NotFound("User"))?;

    let mut tx = state.db.begin().await?;
    let mut invoice = queries::insert_invoice(&mut tx, &body, auth.id).await?;
    for item in &body.items {
        queries::insert_item(&mut tx, invoice.id, item, line_total(item)?).await?;
    }
    if !body.items.is_empty() {
        invoice = queries::recompute_totals(&mut tx, invoice.id).await?;
    }
    if invoice.status == InvoiceStatus::Issued {
        on_issued(&mut tx, &invoice).await?;
    }
    tx.commit().await?;

    tracing::info!(
        invoice_id = %invoice.id,
        items = body.items.len(),
        total = invoice.total,
        "Invoice created"
    );
    Ok((StatusCode::CREATED, Json(invoice_response(&state, invoice.id).await?)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<InvoiceResponse>> {
    visible_invoice(&state, &auth, id).await?;
    Ok(Json(invoice_response(&state, id).await?))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateInvoiceRequest>,
) -> TreasuryResult<Json<InvoiceResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_INVOICE)?;
    body.validate()?;
    let mut invoice = visible_invoice(&state, &auth, id).await?;

    body.apply(&mut invoice).map_err(TreasuryError::Validation)?;
    if invoice.due_date < invoice.issue_date {
        return Err(TreasuryError::Validation(
            "due date must not precede issue date".to_string(),
        ));
    }
    queries::save_invoice(&mut *state.db.acquire().await?, &invoice).await?;
    Ok(Json(invoice_response(&state, id).await?))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_INVOICE)?;
    if !queries::delete_invoice(&state.db, id).await? {
        return Err(TreasuryError::NotFound("Invoice"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `GET invoices/{id}/items`
pub async fn items(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<Vec<InvoiceItem>>> {
    visible_invoice(&state, &auth, id).await?;
    Ok(Json(queries::list_items(&state.db, id).await?))
}

/// `POST invoices/{id}/add_item`: draft invoices only.
pub async fn add_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<InvoiceItemRequest>,
) -> TreasuryResult<(StatusCode, Json<InvoiceItem>)> {
    auth.require_permission(LodgePermissions::CHANGE_INVOICE)?;
    body.validate()?;
    let invoice = visible_invoice(&state, &auth, id).await?;
    if invoice.status != InvoiceStatus::Draft {
        return Err(TreasuryError::InvalidState(
            "Items can only be added to draft invoices",
        ));
    }

    let mut tx = state.db.begin().await?;
    let item = queries::insert_item(&mut tx, id, &body, line_total(&body)?).await?;
    queries::recompute_totals(&mut tx, id).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    post,
    path = "/api/treasury/invoices/{id}/issue",
    tag = "treasury",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice issued and pending payment generated"),
        (status = 400, description = "Invoice is not a draft"),
        (status = 403, description = "Lacks change_invoice"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_INVOICE)?;
    let mut invoice = visible_invoice(&state, &auth, id).await?;
    if invoice.status != InvoiceStatus::Draft {
        return Err(TreasuryError::InvalidState("Only draft invoices can be issued"));
    }

    invoice.status = InvoiceStatus::Issued;
    let mut tx = state.db.begin().await?;
    queries::save_invoice(&mut tx, &invoice).await?;
    on_issued(&mut tx, &invoice).await?;
    tx.commit().await?;
    Ok(Json(json!({ "detail": "Factura emitida" })))
}

pub async fn mark_as_paid(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_INVOICE)?;
    let mut invoice = visible_invoice(&state, &auth, id).await?;
    match invoice.status {
        InvoiceStatus::Paid => return Err(TreasuryError::InvalidState("Invoice is already paid")),
        InvoiceStatus::Cancelled => {
            return Err(TreasuryError::InvalidState("Cancelled invoices cannot be paid"))
        }
        InvoiceStatus::Draft | InvoiceStatus::Issued => {}
    }

    invoice.status = InvoiceStatus::Paid;
    queries::save_invoice(&mut *state.db.acquire().await?, &invoice).await?;
    Ok(Json(json!({ "detail": "Factura marcada como pagada" })))
}

pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> TreasuryResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_INVOICE)?;
    let mut invoice = visible_invoice(&state, &auth, id).await?;
    match invoice.status {
        InvoiceStatus::Cancelled => {
            return Err(TreasuryError::InvalidState("Invoice is already cancelled"))
        }
        InvoiceStatus::Paid => {
            return Err(TreasuryError::InvalidState("Paid invoices cannot be cancelled"))
        }
        InvoiceStatus::Draft | InvoiceStatus::Issued => {}
    }

    invoice.status = InvoiceStatus::Cancelled;
    queries::save_invoice(&mut *state.db.acquire().await?, &invoice).await?;
    Ok(Json(json!({ "detail": "Factura cancelada" })))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;

    #[test]
    fn test_issued_payment_mirrors_invoice() {
        let creator = Uuid::new_v4();
        let due = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: "2025-014".into(),
            user_id: Uuid::new_v4(),
            issue_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            due_date: due,
            subtotal: 9_000,
            tax: 1_000,
            total: 10_000,
            status: InvoiceStatus::Issued,
            notes: String::new(),
            created_by: Some(creator),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let payment = issued_payment(&invoice);
        assert_eq!(payment.user_id, invoice.user_id);
        assert_eq!(payment.amount, 10_000);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.payment_method, PaymentMethod::Other);
        assert_eq!(payment.due_date, Some(due));
        assert_eq!(payment.reference, "Factura #2025-014");
        assert_eq!(payment.notes, "Pago automático generado para la factura #2025-014");
    }

    #[test]
    fn test_line_total_rejects_overflow() {
        let item = InvoiceItemRequest {
            description: "Cuota extraordinaria".into(),
            quantity: 2,
            unit_price: i64::MAX,
            fee_id: None,
        };
        assert!(matches!(line_total(&item), Err(TreasuryError::Validation(_))));
    }

    #[test]
    fn test_update_rejects_total_overflow() {
        let mut invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: "2025-015".into(),
            user_id: Uuid::new_v4(),
            issue_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
            subtotal: i64::MAX,
            tax: 0,
            total: i64::MAX,
            status: InvoiceStatus::Draft,
            notes: String::new(),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let update = UpdateInvoiceRequest {
            tax: Some(1),
            ..Default::default()
        };
        assert!(update.apply(&mut invoice).is_err());
    }
}
