//! Treasury types. Every amount is an integer number of cents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::util::deserialize_double_option;

/// Parse an action body that may be empty.
pub fn parse_optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| format!("invalid request body: {e}"))
}

/// Reject a period that ends before it starts.
pub fn check_period(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), String> {
    match end {
        Some(end) if end < start => Err("end date must not precede start date".to_string()),
        _ => Ok(()),
    }
}

/// Upper bound on any single amount, in cents.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;
/// Upper bound on an invoice line quantity.
pub const MAX_QUANTITY: i32 = 100_000;

// ============================================================================
// Fees
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum FeeType {
    #[default]
    Monthly,
    Quarterly,
    Annual,
    OneTime,
    Special,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Fee {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub amount: i64,
    pub fee_type: FeeType,
    pub is_active: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateFeeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub amount: i64,
    #[serde(default)]
    pub fee_type: FeeType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateFeeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub amount: Option<i64>,
    pub fee_type: Option<FeeType>,
    pub is_active: Option<bool>,
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub end_date: Option<Option<NaiveDate>>,
}

impl UpdateFeeRequest {
    pub fn apply(self, fee: &mut Fee) {
        if let Some(v) = self.name {
            fee.name = v;
        }
        if let Some(v) = self.description {
            fee.description = v;
        }
        if let Some(v) = self.amount {
            fee.amount = v;
        }
        if let Some(v) = self.fee_type {
            fee.fee_type = v;
        }
        if let Some(v) = self.is_active {
            fee.is_active = v;
        }
        if let Some(v) = self.start_date {
            fee.start_date = v;
        }
        if let Some(v) = self.end_date {
            fee.end_date = v;
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FeeQuery {
    pub is_active: Option<bool>,
    pub fee_type: Option<FeeType>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Payments
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    BankTransfer,
    Check,
    CreditCard,
    Other,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fee_id: Option<Uuid>,
    pub amount: i64,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub reference: String,
    pub notes: String,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// A completed payment without a date is dated `today`.
    pub fn stamp_completion(&mut self, today: NaiveDate) {
        if self.status == PaymentStatus::Completed && self.payment_date.is_none() {
            self.payment_date = Some(today);
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PaymentResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub payment: Payment,
    pub user_name: String,
    pub fee_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePaymentRequest {
    pub user_id: Uuid,
    pub fee_id: Option<Uuid>,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub amount: i64,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub payment_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub reference: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePaymentRequest {
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub fee_id: Option<Option<Uuid>>,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub amount: Option<i64>,
    pub status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub payment_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub due_date: Option<Option<NaiveDate>>,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl UpdatePaymentRequest {
    pub fn apply(self, payment: &mut Payment) {
        if let Some(v) = self.fee_id {
            payment.fee_id = v;
        }
        if let Some(v) = self.amount {
            payment.amount = v;
        }
        if let Some(v) = self.status {
            payment.status = v;
        }
        if let Some(v) = self.payment_method {
            payment.payment_method = v;
        }
        if let Some(v) = self.payment_date {
            payment.payment_date = v;
        }
        if let Some(v) = self.due_date {
            payment.due_date = v;
        }
        if let Some(v) = self.reference {
            payment.reference = v;
        }
        if let Some(v) = self.notes {
            payment.notes = v;
        }
    }
}

/// Body of `payments/{id}/mark_as_completed`. Every field is optional.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompletePaymentRequest {
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Body of `payments/{id}/mark_as_cancelled`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelPaymentRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PaymentQuery {
    pub user_id: Option<Uuid>,
    pub fee_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    /// Lower bound on `payment_date`.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Only pending payments whose due date has passed.
    #[serde(skip)]
    pub overdue: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Invoices
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Issued,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub user_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub status: InvoiceStatus,
    pub notes: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Reference of the payment generated when the invoice is issued.
    pub fn payment_reference(&self) -> String {
        format!("Factura #{}", self.invoice_number)
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub invoice: Invoice,
    pub user_name: String,
    pub items_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub total_price: i64,
    pub fee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct InvoiceItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub description: String,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = MAX_QUANTITY))]
    pub quantity: i32,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub unit_price: i64,
    pub fee_id: Option<Uuid>,
}

const fn default_quantity() -> i32 {
    1
}

impl InvoiceItemRequest {
    /// `quantity × unit_price`, or `None` when it does not fit in cents.
    pub fn total_price(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.unit_price)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, max = 20))]
    pub invoice_number: String,
    pub user_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub tax: i64,
    #[serde(default)]
    pub notes: String,
    /// Creating an invoice as `issued` runs the issue cascade.
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateInvoiceRequest {
    #[validate(length(min = 1, max = 20))]
    pub invoice_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub tax: Option<i64>,
    pub notes: Option<String>,
}

impl UpdateInvoiceRequest {
    pub fn apply(self, invoice: &mut Invoice) -> Result<(), String> {
        if let Some(v) = self.invoice_number {
            invoice.invoice_number = v;
        }
        if let Some(v) = self.issue_date {
            invoice.issue_date = v;
        }
        if let Some(v) = self.due_date {
            invoice.due_date = v;
        }
        if let Some(v) = self.tax {
            invoice.tax = v;
        }
        if let Some(v) = self.notes {
            invoice.notes = v;
        }
        invoice.total = invoice
            .subtotal
            .checked_add(invoice.tax)
            .ok_or_else(|| "invoice total is out of range".to_string())?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct InvoiceQuery {
    pub user_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    /// Lower bound on `issue_date`.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive substring of the invoice number.
    pub invoice_number: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Financial reports
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    Monthly,
    Quarterly,
    Annual,
    Special,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Draft,
    Finalized,
    Approved,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct FinancialReport {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub report_type: ReportType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_income: i64,
    pub total_expenses: i64,
    pub balance: i64,
    pub file: String,
    pub status: ReportStatus,
    pub created_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FinancialReport {
    /// Recompute the balance and default the approver of an approved report.
    pub fn normalize(&mut self) {
        self.balance = self.total_income - self.total_expenses;
        if self.status == ReportStatus::Approved && self.approved_by.is_none() {
            self.approved_by = self.created_by;
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReportRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub report_type: ReportType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Computed from completed payments in the period when omitted.
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub total_income: Option<i64>,
    /// Computed from paid expenses in the period when omitted.
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub total_expenses: Option<i64>,
    #[serde(default)]
    pub file: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReportRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub report_type: Option<ReportType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub total_income: Option<i64>,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub total_expenses: Option<i64>,
    pub file: Option<String>,
    pub status: Option<ReportStatus>,
}

impl UpdateReportRequest {
    pub fn apply(self, report: &mut FinancialReport) {
        if let Some(v) = self.title {
            report.title = v;
        }
        if let Some(v) = self.description {
            report.description = v;
        }
        if let Some(v) = self.report_type {
            report.report_type = v;
        }
        if let Some(v) = self.start_date {
            report.start_date = v;
        }
        if let Some(v) = self.end_date {
            report.end_date = v;
        }
        if let Some(v) = self.total_income {
            report.total_income = v;
        }
        if let Some(v) = self.total_expenses {
            report.total_expenses = v;
        }
        if let Some(v) = self.file {
            report.file = v;
        }
        if let Some(v) = self.status {
            report.status = v;
        }
        report.normalize();
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReportQuery {
    pub report_type: Option<ReportType>,
    pub status: Option<ReportStatus>,
    /// Bounds on `end_date`.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Expenses
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Supplies,
    Maintenance,
    Events,
    Charity,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Expense {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub amount: i64,
    pub category: ExpenseCategory,
    pub expense_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub status: ExpenseStatus,
    pub receipt: String,
    pub created_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    /// A paid expense without a payment date is dated `today`.
    pub fn stamp_payment(&mut self, today: NaiveDate) {
        if self.status == ExpenseStatus::Paid && self.payment_date.is_none() {
            self.payment_date = Some(today);
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub amount: i64,
    #[serde(default)]
    pub category: ExpenseCategory,
    pub expense_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ExpenseStatus,
    #[serde(default)]
    pub receipt: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = MAX_AMOUNT))]
    pub amount: Option<i64>,
    pub category: Option<ExpenseCategory>,
    pub expense_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub payment_date: Option<Option<NaiveDate>>,
    pub status: Option<ExpenseStatus>,
    pub receipt: Option<String>,
}

impl UpdateExpenseRequest {
    pub fn apply(self, expense: &mut Expense) {
        if let Some(v) = self.title {
            expense.title = v;
        }
        if let Some(v) = self.description {
            expense.description = v;
        }
        if let Some(v) = self.amount {
            expense.amount = v;
        }
        if let Some(v) = self.category {
            expense.category = v;
        }
        if let Some(v) = self.expense_date {
            expense.expense_date = v;
        }
        if let Some(v) = self.payment_date {
            expense.payment_date = v;
        }
        if let Some(v) = self.status {
            expense.status = v;
        }
        if let Some(v) = self.receipt {
            expense.receipt = v;
        }
    }
}

/// Body of `expenses/{id}/approve`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApproveExpenseRequest {
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExpenseQuery {
    pub category: Option<ExpenseCategory>,
    pub status: Option<ExpenseStatus>,
    /// Bounds on `expense_date`.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SummaryQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct FinancialSummary {
    pub completed_income: i64,
    pub pending_amount: i64,
    pub overdue_count: i64,
    pub paid_expenses: i64,
    pub balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_optional_body() {
        let empty: CompletePaymentRequest = parse_optional_body(b"").unwrap();
        assert!(empty.payment_date.is_none());
        let blank: CancelPaymentRequest = parse_optional_body(b"  \n").unwrap();
        assert!(blank.notes.is_none());
        let parsed: CompletePaymentRequest =
            parse_optional_body(br#"{"payment_method": "bank_transfer"}"#).unwrap();
        assert_eq!(parsed.payment_method, Some(PaymentMethod::BankTransfer));
        assert!(parse_optional_body::<CompletePaymentRequest>(b"{not json").is_err());
    }

    #[test]
    fn test_item_total() {
        let item = InvoiceItemRequest {
            description: "Cuota anual".into(),
            quantity: 3,
            unit_price: 2_500,
            fee_id: None,
        };
        assert_eq!(item.total_price(), Some(7_500));
    }

    #[test]
    fn test_item_amount_bounds() {
        let mut item = InvoiceItemRequest {
            description: "Donación".into(),
            quantity: 2,
            unit_price: i64::MAX,
            fee_id: None,
        };
        assert!(item.validate().is_err());
        assert_eq!(item.total_price(), None);

        item.unit_price = MAX_AMOUNT;
        item.quantity = MAX_QUANTITY;
        assert!(item.validate().is_ok());
        assert_eq!(item.total_price(), Some(MAX_AMOUNT * i64::from(MAX_QUANTITY)));

        item.quantity = MAX_QUANTITY + 1;
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_invoice_update_recomputes_total() {
        let mut invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: "2025-001".into(),
            user_id: Uuid::new_v4(),
            issue_date: date(2025, 1, 1),
            due_date: date(2025, 1, 31),
            subtotal: 10_000,
            tax: 0,
            total: 10_000,
            status: InvoiceStatus::Draft,
            notes: String::new(),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        UpdateInvoiceRequest {
            tax: Some(2_100),
            ..Default::default()
        }
        .apply(&mut invoice)
        .unwrap();
        assert_eq!(invoice.total, 12_100);
        assert_eq!(invoice.payment_reference(), "Factura #2025-001");
    }

    #[test]
    fn test_report_normalize() {
        let creator = Uuid::new_v4();
        let mut report = FinancialReport {
            id: Uuid::new_v4(),
            title: "Primer trimestre".into(),
            description: String::new(),
            report_type: ReportType::Quarterly,
            start_date: date(2025, 1, 1),
            end_date: date(2025, 3, 31),
            total_income: 50_000,
            total_expenses: 65_000,
            balance: 0,
            file: String::new(),
            status: ReportStatus::Approved,
            created_by: Some(creator),
            approved_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        report.normalize();
        assert_eq!(report.balance, -15_000);
        assert_eq!(report.approved_by, Some(creator));
    }

    #[test]
    fn test_completion_dates() {
        let today = date(2025, 6, 24);
        let mut payment = Payment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            fee_id: None,
            amount: 3_000,
            status: PaymentStatus::Completed,
            payment_method: PaymentMethod::Cash,
            payment_date: None,
            due_date: None,
            reference: String::new(),
            notes: String::new(),
            recorded_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        payment.stamp_completion(today);
        assert_eq!(payment.payment_date, Some(today));

        payment.status = PaymentStatus::Pending;
        payment.payment_date = None;
        payment.stamp_completion(today);
        assert_eq!(payment.payment_date, None);
    }

    #[test]
    fn test_period_check() {
        assert!(check_period(date(2025, 1, 1), Some(date(2025, 1, 31))).is_ok());
        assert!(check_period(date(2025, 1, 1), None).is_ok());
        assert!(check_period(date(2025, 2, 1), Some(date(2025, 1, 31))).is_err());
    }
}
