//! Treasury module queries.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::types::{
    CreateExpenseRequest, CreateFeeRequest, CreateInvoiceRequest, CreatePaymentRequest,
    CreateReportRequest, Expense, ExpenseQuery, Fee, FeeQuery, FinancialReport, FinancialSummary,
    Invoice, InvoiceItem, InvoiceItemRequest, InvoiceQuery, InvoiceResponse, Payment,
    PaymentQuery, PaymentResponse, PaymentStatus, ReportQuery,
};
use crate::db::db_error;
use crate::util::{contains_pattern, push_date_range, push_page, push_search, Counted};

// ============================================================================
// Fees
// ============================================================================

pub async fn list_fees(
    pool: &PgPool,
    query: &FeeQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<Fee>>> {
    let mut builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT f.*, COUNT(*) OVER() AS total_count FROM fees f WHERE 1=1");
    if let Some(is_active) = query.is_active {
        builder.push(" AND f.is_active = ").push_bind(is_active);
    }
    if let Some(fee_type) = query.fee_type {
        builder.push(" AND f.fee_type = ").push_bind(fee_type);
    }
    push_search(&mut builder, &["f.name", "f.description"], query.search.as_deref());
    builder.push(" ORDER BY f.name");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_fees"))
}

pub async fn find_fee(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Fee>> {
    sqlx::query_as::<_, Fee>("SELECT * FROM fees WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_fee", fee_id = %id))
}

pub async fn insert_fee(
    pool: &PgPool,
    body: &CreateFeeRequest,
    created_by: Uuid,
) -> sqlx::Result<Fee> {
    sqlx::query_as::<_, Fee>(
        r"
        INSERT INTO fees (name, description, amount, fee_type, is_active, start_date, end_date, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        ",
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(body.amount)
    .bind(body.fee_type)
    .bind(body.is_active)
    .bind(body.start_date)
    .bind(body.end_date)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_fee", name = %body.name))
}

pub async fn save_fee(pool: &PgPool, fee: &Fee) -> sqlx::Result<Fee> {
    sqlx::query_as::<_, Fee>(
        r"
        UPDATE fees SET
            name = $2, description = $3, amount = $4, fee_type = $5, is_active = $6,
            start_date = $7, end_date = $8, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(fee.id)
    .bind(&fee.name)
    .bind(&fee.description)
    .bind(fee.amount)
    .bind(fee.fee_type)
    .bind(fee.is_active)
    .bind(fee.start_date)
    .bind(fee.end_date)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_fee", fee_id = %fee.id))
}

pub async fn delete_fee(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM fees WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_fee", fee_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Payments
// ============================================================================

fn payment_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        r"
        SELECT p.*,
            COALESCE(NULLIF(u.symbolic_name, ''), u.username) AS user_name,
            f.name AS fee_name,
            COUNT(*) OVER() AS total_count
        FROM payments p
        JOIN users u ON u.id = p.user_id
        LEFT JOIN fees f ON f.id = p.fee_id
        WHERE 1=1",
    )
}

/// Payments matching `query`. `owner` restricts the list to one member.
pub async fn list_payments(
    pool: &PgPool,
    query: &PaymentQuery,
    owner: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<PaymentResponse>>> {
    let mut builder = payment_select();
    if let Some(owner) = owner {
        builder.push(" AND p.user_id = ").push_bind(owner);
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND p.user_id = ").push_bind(user_id);
    }
    if let Some(fee_id) = query.fee_id {
        builder.push(" AND p.fee_id = ").push_bind(fee_id);
    }
    if let Some(status) = query.status {
        builder.push(" AND p.status = ").push_bind(status);
    }
    if let Some(method) = query.payment_method {
        builder.push(" AND p.payment_method = ").push_bind(method);
    }
    if query.overdue {
        builder
            .push(" AND p.status = ")
            .push_bind(PaymentStatus::Pending)
            .push(" AND p.due_date < CURRENT_DATE");
    }
    push_date_range(&mut builder, "p.payment_date", query.date_from, query.date_to);
    builder.push(" ORDER BY COALESCE(p.payment_date, p.due_date) DESC NULLS LAST, p.created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_payments"))
}

pub async fn find_payment(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Payment>> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_payment", payment_id = %id))
}

pub async fn find_payment_response(
    pool: &PgPool,
    id: Uuid,
) -> sqlx::Result<Option<PaymentResponse>> {
    let mut builder = payment_select();
    builder.push(" AND p.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_payment_response", payment_id = %id))
}

pub async fn insert_payment(
    conn: &mut PgConnection,
    body: &CreatePaymentRequest,
    recorded_by: Option<Uuid>,
) -> sqlx::Result<Payment> {
    sqlx::query_as::<_, Payment>(
        r"
        INSERT INTO payments (
            user_id, fee_id, amount, status, payment_method, payment_date, due_date,
            reference, notes, recorded_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        ",
    )
    .bind(body.user_id)
    .bind(body.fee_id)
    .bind(body.amount)
    .bind(body.status)
    .bind(body.payment_method)
    .bind(body.payment_date)
    .bind(body.due_date)
    .bind(&body.reference)
    .bind(&body.notes)
    .bind(recorded_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_payment", user_id = %body.user_id))
}

pub async fn save_payment(pool: &PgPool, payment: &Payment) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE payments SET
            fee_id = $2, amount = $3, status = $4, payment_method = $5, payment_date = $6,
            due_date = $7, reference = $8, notes = $9, recorded_by = $10, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(payment.id)
    .bind(payment.fee_id)
    .bind(payment.amount)
    .bind(payment.status)
    .bind(payment.payment_method)
    .bind(payment.payment_date)
    .bind(payment.due_date)
    .bind(&payment.reference)
    .bind(&payment.notes)
    .bind(payment.recorded_by)
    .execute(pool)
    .await
    .map_err(db_error!("save_payment", payment_id = %payment.id))?;
    Ok(())
}

pub async fn delete_payment(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM payments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_payment", payment_id = %id))?;
    Ok(result.rows_affected() > 0)
}

/// Whether `user_id` already has a payment carrying `reference`.
pub async fn payment_reference_exists(
    conn: &mut PgConnection,
    user_id: Uuid,
    reference: &str,
) -> sqlx::Result<bool> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM payments WHERE user_id = $1 AND reference = $2)",
    )
    .bind(user_id)
    .bind(reference)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("payment_reference_exists", user_id = %user_id))
}

// ============================================================================
// Invoices
// ============================================================================

fn invoice_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        r"
        SELECT i.*,
            COALESCE(NULLIF(u.symbolic_name, ''), u.username) AS user_name,
            (SELECT COUNT(*) FROM invoice_items it WHERE it.invoice_id = i.id) AS items_count,
            COUNT(*) OVER() AS total_count
        FROM invoices i
        JOIN users u ON u.id = i.user_id
        WHERE 1=1",
    )
}

pub async fn list_invoices(
    pool: &PgPool,
    query: &InvoiceQuery,
    owner: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<InvoiceResponse>>> {
    let mut builder = invoice_select();
    if let Some(owner) = owner {
        builder.push(" AND i.user_id = ").push_bind(owner);
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND i.user_id = ").push_bind(user_id);
    }
    if let Some(status) = query.status {
        builder.push(" AND i.status = ").push_bind(status);
    }
    if let Some(number) = query.invoice_number.as_deref().filter(|n| !n.trim().is_empty()) {
        builder
            .push(" AND i.invoice_number ILIKE ")
            .push_bind(contains_pattern(number));
    }
    push_date_range(&mut builder, "i.issue_date", query.date_from, query.date_to);
    builder.push(" ORDER BY i.issue_date DESC, i.invoice_number DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_invoices"))
}

pub async fn find_invoice(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Invoice>> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_invoice", invoice_id = %id))
}

pub async fn find_invoice_response(
    pool: &PgPool,
    id: Uuid,
) -> sqlx::Result<Option<InvoiceResponse>> {
    let mut builder = invoice_select();
    builder.push(" AND i.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_invoice_response", invoice_id = %id))
}

pub async fn insert_invoice(
    conn: &mut PgConnection,
    body: &CreateInvoiceRequest,
    created_by: Uuid,
) -> sqlx::Result<Invoice> {
    sqlx::query_as::<_, Invoice>(
        r"
        INSERT INTO invoices (
            invoice_number, user_id, issue_date, due_date, tax, total, status, notes, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8)
        RETURNING *
        ",
    )
    .bind(&body.invoice_number)
    .bind(body.user_id)
    .bind(body.issue_date)
    .bind(body.due_date)
    .bind(body.tax)
    .bind(body.status)
    .bind(&body.notes)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_invoice", invoice_number = %body.invoice_number))
}

pub async fn save_invoice(conn: &mut PgConnection, invoice: &Invoice) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE invoices SET
            invoice_number = $2, issue_date = $3, due_date = $4, tax = $5, total = $6,
            status = $7, notes = $8, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(invoice.id)
    .bind(&invoice.invoice_number)
    .bind(invoice.issue_date)
    .bind(invoice.due_date)
    .bind(invoice.tax)
    .bind(invoice.total)
    .bind(invoice.status)
    .bind(&invoice.notes)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("save_invoice", invoice_id = %invoice.id))?;
    Ok(())
}

pub async fn delete_invoice(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_invoice", invoice_id = %id))?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_items(pool: &PgPool, invoice_id: Uuid) -> sqlx::Result<Vec<InvoiceItem>> {
    sqlx::query_as::<_, InvoiceItem>(
        "SELECT * FROM invoice_items WHERE invoice_id = $1 ORDER BY created_at",
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_items", invoice_id = %invoice_id))
}

pub async fn insert_item(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    item: &InvoiceItemRequest,
    total_price: i64,
) -> sqlx::Result<InvoiceItem> {
    sqlx::query_as::<_, InvoiceItem>(
        r"
        INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, total_price, fee_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(invoice_id)
    .bind(&item.description)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(total_price)
    .bind(item.fee_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_item", invoice_id = %invoice_id))
}

/// Recompute `subtotal` from the items and `total = subtotal + tax`.
pub async fn recompute_totals(conn: &mut PgConnection, invoice_id: Uuid) -> sqlx::Result<Invoice> {
    sqlx::query_as::<_, Invoice>(
        r"
        UPDATE invoices i SET
            subtotal = s.sum, total = s.sum + i.tax, updated_at = NOW()
        FROM (
            SELECT COALESCE(SUM(total_price), 0)::BIGINT AS sum
            FROM invoice_items WHERE invoice_id = $1
        ) s
        WHERE i.id = $1
        RETURNING i.*
        ",
    )
    .bind(invoice_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("recompute_totals", invoice_id = %invoice_id))
}

// ============================================================================
// Financial reports
// ============================================================================

pub async fn list_reports(
    pool: &PgPool,
    query: &ReportQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<FinancialReport>>> {
    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "SELECT r.*, COUNT(*) OVER() AS total_count FROM financial_reports r WHERE 1=1",
    );
    if let Some(report_type) = query.report_type {
        builder.push(" AND r.report_type = ").push_bind(report_type);
    }
    if let Some(status) = query.status {
        builder.push(" AND r.status = ").push_bind(status);
    }
    push_date_range(&mut builder, "r.end_date", query.date_from, query.date_to);
    builder.push(" ORDER BY r.end_date DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_reports"))
}

pub async fn find_report(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<FinancialReport>> {
    sqlx::query_as::<_, FinancialReport>("SELECT * FROM financial_reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_report", report_id = %id))
}

/// Completed income and paid expenses between `start` and `end` inclusive.
pub async fn period_totals(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
) -> sqlx::Result<(i64, i64)> {
    sqlx::query_as::<_, (i64, i64)>(
        r"
        SELECT
            (SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments
             WHERE status = 'completed' AND payment_date BETWEEN $1 AND $2),
            (SELECT COALESCE(SUM(amount), 0)::BIGINT FROM expenses
             WHERE status = 'paid' AND expense_date BETWEEN $1 AND $2)
        ",
    )
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await
    .map_err(db_error!("period_totals"))
}

pub async fn insert_report(
    pool: &PgPool,
    body: &CreateReportRequest,
    total_income: i64,
    total_expenses: i64,
    created_by: Uuid,
) -> sqlx::Result<FinancialReport> {
    sqlx::query_as::<_, FinancialReport>(
        r"
        INSERT INTO financial_reports (
            title, description, report_type, start_date, end_date,
            total_income, total_expenses, balance, file, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $6 - $7, $8, $9)
        RETURNING *
        ",
    )
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.report_type)
    .bind(body.start_date)
    .bind(body.end_date)
    .bind(total_income)
    .bind(total_expenses)
    .bind(&body.file)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_report", title = %body.title))
}

pub async fn save_report(pool: &PgPool, report: &FinancialReport) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE financial_reports SET
            title = $2, description = $3, report_type = $4, start_date = $5, end_date = $6,
            total_income = $7, total_expenses = $8, balance = $9, file = $10, status = $11,
            approved_by = $12, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(report.id)
    .bind(&report.title)
    .bind(&report.description)
    .bind(report.report_type)
    .bind(report.start_date)
    .bind(report.end_date)
    .bind(report.total_income)
    .bind(report.total_expenses)
    .bind(report.balance)
    .bind(&report.file)
    .bind(report.status)
    .bind(report.approved_by)
    .execute(pool)
    .await
    .map_err(db_error!("save_report", report_id = %report.id))?;
    Ok(())
}

pub async fn delete_report(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM financial_reports WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_report", report_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Expenses
// ============================================================================

pub async fn list_expenses(
    pool: &PgPool,
    query: &ExpenseQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<Expense>>> {
    let mut builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT e.*, COUNT(*) OVER() AS total_count FROM expenses e WHERE 1=1");
    if let Some(category) = query.category {
        builder.push(" AND e.category = ").push_bind(category);
    }
    if let Some(status) = query.status {
        builder.push(" AND e.status = ").push_bind(status);
    }
    push_date_range(&mut builder, "e.expense_date", query.date_from, query.date_to);
    push_search(&mut builder, &["e.title", "e.description"], query.search.as_deref());
    builder.push(" ORDER BY e.expense_date DESC, e.created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_expenses"))
}

pub async fn find_expense(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Expense>> {
    sqlx::query_as::<_, Expense>("SELECT * FROM expenses WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_expense", expense_id = %id))
}

pub async fn insert_expense(
    pool: &PgPool,
    body: &CreateExpenseRequest,
    payment_date: Option<NaiveDate>,
    created_by: Uuid,
) -> sqlx::Result<Expense> {
    sqlx::query_as::<_, Expense>(
        r"
        INSERT INTO expenses (
            title, description, amount, category, expense_date, payment_date, status, receipt, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        ",
    )
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.amount)
    .bind(body.category)
    .bind(body.expense_date)
    .bind(payment_date)
    .bind(body.status)
    .bind(&body.receipt)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_expense", title = %body.title))
}

pub async fn save_expense(pool: &PgPool, expense: &Expense) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE expenses SET
            title = $2, description = $3, amount = $4, category = $5, expense_date = $6,
            payment_date = $7, status = $8, receipt = $9, approved_by = $10, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(expense.id)
    .bind(&expense.title)
    .bind(&expense.description)
    .bind(expense.amount)
    .bind(expense.category)
    .bind(expense.expense_date)
    .bind(expense.payment_date)
    .bind(expense.status)
    .bind(&expense.receipt)
    .bind(expense.approved_by)
    .execute(pool)
    .await
    .map_err(db_error!("save_expense", expense_id = %expense.id))?;
    Ok(())
}

pub async fn delete_expense(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM expenses WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_expense", expense_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Summary
// ============================================================================

/// Income and expenses are bounded by the range. Pending and overdue
/// figures describe the current state.
pub async fn summary(
    pool: &PgPool,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> sqlx::Result<FinancialSummary> {
    sqlx::query_as::<_, FinancialSummary>(
        r"
        WITH totals AS (
            SELECT
                (SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments
                 WHERE status = 'completed'
                   AND ($1::DATE IS NULL OR payment_date >= $1)
                   AND ($2::DATE IS NULL OR payment_date <= $2)) AS completed_income,
                (SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments
                 WHERE status = 'pending') AS pending_amount,
                (SELECT COUNT(*) FROM payments
                 WHERE status = 'pending' AND due_date < CURRENT_DATE) AS overdue_count,
                (SELECT COALESCE(SUM(amount), 0)::BIGINT FROM expenses
                 WHERE status = 'paid'
                   AND ($1::DATE IS NULL OR expense_date >= $1)
                   AND ($2::DATE IS NULL OR expense_date <= $2)) AS paid_expenses
        )
        SELECT *, completed_income - paid_expenses AS balance FROM totals
        ",
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await
    .map_err(db_error!("treasury_summary"))
}
