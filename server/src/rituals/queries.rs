//! Rituals module queries.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::types::{
    AttachmentQuery, CreateAttachmentRequest, CreateMinutesRequest, CreatePlanRequest,
    CreateRoleRequest, CreateWorkRequest, MinutesQuery, MinutesStatus, PlanQuery, PlanResponse,
    PlanStatus, RitualAttachment, RitualMinutes, RitualPlan, RitualRole, RitualWork, RoleQuery,
    RoleRow, WorkQuery, WorkResponse, WorkStatus,
};
use crate::db::db_error;
use crate::util::{push_date_range, push_page, push_search, Counted};

// ============================================================================
// Plans
// ============================================================================

fn plan_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        r"
        SELECT p.*,
            COALESCE(NULLIF(c.symbolic_name, ''), c.username) AS created_by_name,
            COALESCE(NULLIF(a.symbolic_name, ''), a.username) AS approved_by_name,
            (SELECT COUNT(*) FROM ritual_roles r WHERE r.ritual_plan_id = p.id) AS roles_count,
            (SELECT COUNT(*) FROM ritual_works w WHERE w.ritual_plan_id = p.id) AS works_count,
            EXISTS(SELECT 1 FROM ritual_minutes m WHERE m.ritual_plan_id = p.id) AS has_minutes,
            COUNT(*) OVER() AS total_count
        FROM ritual_plans p
        LEFT JOIN users c ON c.id = p.created_by
        LEFT JOIN users a ON a.id = p.approved_by
        WHERE 1=1",
    )
}

/// Plans visible under `max_degree` (`None` sees everything).
pub async fn list_plans(
    pool: &PgPool,
    query: &PlanQuery,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<PlanResponse>>> {
    let mut builder = plan_select();
    if let Some(max) = max_degree {
        builder.push(" AND p.degree <= ").push_bind(max);
    }
    if let Some(ritual_type) = query.ritual_type {
        builder.push(" AND p.ritual_type = ").push_bind(ritual_type);
    }
    if let Some(degree) = query.degree {
        builder.push(" AND p.degree = ").push_bind(degree);
    }
    if let Some(status) = query.status {
        builder.push(" AND p.status = ").push_bind(status);
    }
    if query.upcoming == Some(true) {
        builder
            .push(" AND p.date >= CURRENT_DATE AND p.status <> ")
            .push_bind(PlanStatus::Cancelled);
    }
    push_date_range(&mut builder, "p.date", query.date_from, query.date_to);
    push_search(&mut builder, &["p.title", "p.description"], query.search.as_deref());
    builder.push(" ORDER BY p.date DESC, p.start_time DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_plans"))
}

pub async fn find_plan(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<RitualPlan>> {
    sqlx::query_as::<_, RitualPlan>("SELECT * FROM ritual_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_plan", plan_id = %id))
}

pub async fn find_plan_response(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<PlanResponse>> {
    let mut builder = plan_select();
    builder.push(" AND p.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_plan_response", plan_id = %id))
}

pub async fn insert_plan(
    conn: &mut PgConnection,
    body: &CreatePlanRequest,
    event_id: Option<Uuid>,
    created_by: Uuid,
) -> sqlx::Result<RitualPlan> {
    sqlx::query_as::<_, RitualPlan>(
        r"
        INSERT INTO ritual_plans (
            title, description, date, start_time, end_time, ritual_type, degree, event_id, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        ",
    )
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.date)
    .bind(body.start_time)
    .bind(body.end_time)
    .bind(body.ritual_type)
    .bind(body.degree)
    .bind(event_id)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_plan", title = %body.title))
}

pub async fn save_plan(conn: &mut PgConnection, plan: &RitualPlan) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE ritual_plans SET
            title = $2, description = $3, date = $4, start_time = $5, end_time = $6,
            ritual_type = $7, degree = $8, status = $9, approved_by = $10, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(plan.id)
    .bind(&plan.title)
    .bind(&plan.description)
    .bind(plan.date)
    .bind(plan.start_time)
    .bind(plan.end_time)
    .bind(plan.ritual_type)
    .bind(plan.degree)
    .bind(plan.status)
    .bind(plan.approved_by)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("save_plan", plan_id = %plan.id))?;
    Ok(())
}

pub async fn delete_plan(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM ritual_plans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_plan", plan_id = %id))?;
    Ok(result.rows_affected() > 0)
}

/// Distinct members holding a role in the plan.
pub async fn plan_role_holders(conn: &mut PgConnection, plan_id: Uuid) -> sqlx::Result<Vec<Uuid>> {
    sqlx::query_scalar(
        r"
        SELECT DISTINCT r.assigned_to FROM ritual_roles r
        JOIN users u ON u.id = r.assigned_to
        WHERE r.ritual_plan_id = $1 AND u.is_active
        ",
    )
    .bind(plan_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error!("plan_role_holders", plan_id = %plan_id))
}

// ============================================================================
// Roles
// ============================================================================

fn role_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        r"
        SELECT r.*,
            COALESCE(NULLIF(u.symbolic_name, ''), u.username) AS assigned_to_name,
            COUNT(*) OVER() AS total_count
        FROM ritual_roles r
        JOIN ritual_plans p ON p.id = r.ritual_plan_id
        LEFT JOIN users u ON u.id = r.assigned_to
        WHERE 1=1",
    )
}

pub async fn list_roles(
    pool: &PgPool,
    query: &RoleQuery,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<RoleRow>>> {
    let mut builder = role_select();
    if let Some(max) = max_degree {
        builder.push(" AND p.degree <= ").push_bind(max);
    }
    if let Some(plan_id) = query.ritual_plan_id {
        builder.push(" AND r.ritual_plan_id = ").push_bind(plan_id);
    }
    if let Some(role_type) = query.role_type {
        builder.push(" AND r.role_type = ").push_bind(role_type);
    }
    if let Some(user_id) = query.assigned_to_id {
        builder.push(" AND r.assigned_to = ").push_bind(user_id);
    }
    if let Some(confirmed) = query.is_confirmed {
        builder.push(" AND r.is_confirmed = ").push_bind(confirmed);
    }
    builder.push(" ORDER BY p.date DESC, r.role_type");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_roles"))
}

pub async fn find_role(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<RoleRow>> {
    let mut builder = role_select();
    builder.push(" AND r.id = ").push_bind(id);
    builder
        .build_query_as::<Counted<RoleRow>>()
        .fetch_optional(pool)
        .await
        .map(|row| row.map(|r| r.item))
        .map_err(db_error!("find_role", role_id = %id))
}

pub async fn insert_role(
    conn: &mut PgConnection,
    plan_id: Uuid,
    body: &CreateRoleRequest,
) -> sqlx::Result<RitualRole> {
    sqlx::query_as::<_, RitualRole>(
        r"
        INSERT INTO ritual_roles (ritual_plan_id, role_type, custom_role, assigned_to, notes, is_confirmed)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(plan_id)
    .bind(body.role_type)
    .bind(&body.custom_role)
    .bind(body.assigned_to)
    .bind(&body.notes)
    .bind(body.is_confirmed)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_role", plan_id = %plan_id))
}

pub async fn save_role(conn: &mut PgConnection, role: &RitualRole) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE ritual_roles SET
            role_type = $2, custom_role = $3, assigned_to = $4, notes = $5, is_confirmed = $6,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(role.id)
    .bind(role.role_type)
    .bind(&role.custom_role)
    .bind(role.assigned_to)
    .bind(&role.notes)
    .bind(role.is_confirmed)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("save_role", role_id = %role.id))?;
    Ok(())
}

pub async fn delete_role(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM ritual_roles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_role", role_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Works
// ============================================================================

fn work_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        r"
        SELECT w.*,
            COALESCE(NULLIF(u.symbolic_name, ''), u.username) AS responsible_name,
            COUNT(*) OVER() AS total_count
        FROM ritual_works w
        JOIN ritual_plans p ON p.id = w.ritual_plan_id
        LEFT JOIN users u ON u.id = w.responsible_id
        WHERE 1=1",
    )
}

pub async fn list_works(
    pool: &PgPool,
    query: &WorkQuery,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<WorkResponse>>> {
    let mut builder = work_select();
    if let Some(max) = max_degree {
        builder.push(" AND p.degree <= ").push_bind(max);
    }
    if let Some(plan_id) = query.ritual_plan_id {
        builder.push(" AND w.ritual_plan_id = ").push_bind(plan_id);
    }
    if let Some(work_type) = query.work_type {
        builder.push(" AND w.work_type = ").push_bind(work_type);
    }
    if let Some(status) = query.status {
        builder.push(" AND w.status = ").push_bind(status);
    }
    if let Some(user_id) = query.responsible_id {
        builder.push(" AND w.responsible_id = ").push_bind(user_id);
    }
    builder.push(r#" ORDER BY w.ritual_plan_id, w."order", w.created_at"#);
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_works"))
}

pub async fn find_work(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<RitualWork>> {
    sqlx::query_as::<_, RitualWork>("SELECT * FROM ritual_works WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_work", work_id = %id))
}

pub async fn find_work_response(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<WorkResponse>> {
    let mut builder = work_select();
    builder.push(" AND w.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_work_response", work_id = %id))
}

pub async fn insert_work(
    conn: &mut PgConnection,
    plan_id: Uuid,
    body: &CreateWorkRequest,
) -> sqlx::Result<RitualWork> {
    sqlx::query_as::<_, RitualWork>(
        r#"
        INSERT INTO ritual_works (
            ritual_plan_id, title, description, work_type, responsible_id,
            estimated_duration, "order", attachment, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(plan_id)
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.work_type)
    .bind(body.responsible_id)
    .bind(body.estimated_duration)
    .bind(body.order)
    .bind(&body.attachment)
    .bind(body.status)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_work", plan_id = %plan_id))
}

pub async fn save_work(conn: &mut PgConnection, work: &RitualWork) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE ritual_works SET
            title = $2, description = $3, work_type = $4, responsible_id = $5,
            estimated_duration = $6, "order" = $7, attachment = $8, status = $9, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(work.id)
    .bind(&work.title)
    .bind(&work.description)
    .bind(work.work_type)
    .bind(work.responsible_id)
    .bind(work.estimated_duration)
    .bind(work.order)
    .bind(&work.attachment)
    .bind(work.status)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("save_work", work_id = %work.id))?;
    Ok(())
}

pub async fn set_work_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: WorkStatus,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE ritual_works SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(&mut *conn)
        .await
        .map_err(db_error!("set_work_status", work_id = %id))?;
    Ok(())
}

pub async fn delete_work(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM ritual_works WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_work", work_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Minutes
// ============================================================================

pub async fn list_minutes(
    pool: &PgPool,
    query: &MinutesQuery,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<RitualMinutes>>> {
    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        r"
        SELECT m.*, COUNT(*) OVER() AS total_count
        FROM ritual_minutes m
        JOIN ritual_plans p ON p.id = m.ritual_plan_id
        WHERE 1=1",
    );
    if let Some(max) = max_degree {
        builder.push(" AND p.degree <= ").push_bind(max);
    }
    if let Some(plan_id) = query.ritual_plan_id {
        builder.push(" AND m.ritual_plan_id = ").push_bind(plan_id);
    }
    if let Some(status) = query.status {
        builder.push(" AND m.status = ").push_bind(status);
    }
    builder.push(" ORDER BY p.date DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_minutes"))
}

pub async fn find_minutes(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<RitualMinutes>> {
    sqlx::query_as::<_, RitualMinutes>("SELECT * FROM ritual_minutes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_minutes", minutes_id = %id))
}

pub async fn minutes_exist(pool: &PgPool, plan_id: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ritual_minutes WHERE ritual_plan_id = $1)")
        .bind(plan_id)
        .fetch_one(pool)
        .await
        .map_err(db_error!("minutes_exist", plan_id = %plan_id))
}

pub async fn insert_minutes(
    pool: &PgPool,
    body: &CreateMinutesRequest,
    created_by: Uuid,
) -> sqlx::Result<RitualMinutes> {
    sqlx::query_as::<_, RitualMinutes>(
        r"
        INSERT INTO ritual_minutes (ritual_plan_id, content, attendance_count, visitors_count, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(body.ritual_plan_id)
    .bind(&body.content)
    .bind(body.attendance_count)
    .bind(body.visitors_count)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_minutes", plan_id = %body.ritual_plan_id))
}

pub async fn save_minutes(conn: &mut PgConnection, minutes: &RitualMinutes) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE ritual_minutes SET
            content = $2, attendance_count = $3, visitors_count = $4, status = $5,
            approved_by = $6, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(minutes.id)
    .bind(&minutes.content)
    .bind(minutes.attendance_count)
    .bind(minutes.visitors_count)
    .bind(minutes.status)
    .bind(minutes.approved_by)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("save_minutes", minutes_id = %minutes.id))?;
    Ok(())
}

pub async fn set_minutes_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: MinutesStatus,
    approved_by: Option<Uuid>,
) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE ritual_minutes SET
            status = $2, approved_by = COALESCE($3, approved_by), updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(status)
    .bind(approved_by)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("set_minutes_status", minutes_id = %id))?;
    Ok(())
}

pub async fn delete_minutes(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM ritual_minutes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_minutes", minutes_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Attachments
// ============================================================================

pub async fn list_attachments(
    pool: &PgPool,
    query: &AttachmentQuery,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<RitualAttachment>>> {
    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        r"
        SELECT t.*, COUNT(*) OVER() AS total_count
        FROM ritual_attachments t
        JOIN ritual_plans p ON p.id = t.ritual_plan_id
        WHERE 1=1",
    );
    if let Some(max) = max_degree {
        builder.push(" AND p.degree <= ").push_bind(max);
    }
    if let Some(plan_id) = query.ritual_plan_id {
        builder.push(" AND t.ritual_plan_id = ").push_bind(plan_id);
    }
    if let Some(kind) = query.attachment_type {
        builder.push(" AND t.attachment_type = ").push_bind(kind);
    }
    builder.push(" ORDER BY t.created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_attachments"))
}

pub async fn find_attachment(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<RitualAttachment>> {
    sqlx::query_as::<_, RitualAttachment>("SELECT * FROM ritual_attachments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_attachment", attachment_id = %id))
}

pub async fn insert_attachment(
    conn: &mut PgConnection,
    plan_id: Uuid,
    body: &CreateAttachmentRequest,
    uploaded_by: Uuid,
) -> sqlx::Result<RitualAttachment> {
    sqlx::query_as::<_, RitualAttachment>(
        r"
        INSERT INTO ritual_attachments (ritual_plan_id, title, description, attachment_type, file, uploaded_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(plan_id)
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.attachment_type)
    .bind(&body.file)
    .bind(uploaded_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_attachment", plan_id = %plan_id))
}

pub async fn save_attachment(pool: &PgPool, attachment: &RitualAttachment) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE ritual_attachments SET title = $2, description = $3, attachment_type = $4, file = $5
        WHERE id = $1
        ",
    )
    .bind(attachment.id)
    .bind(&attachment.title)
    .bind(&attachment.description)
    .bind(attachment.attachment_type)
    .bind(&attachment.file)
    .execute(pool)
    .await
    .map_err(db_error!("save_attachment", attachment_id = %attachment.id))?;
    Ok(())
}

pub async fn delete_attachment(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM ritual_attachments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_attachment", attachment_id = %id))?;
    Ok(result.rows_affected() > 0)
}
