//! Members module queries.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::types::{
    Attendance, AttendanceQuery, CreateAttendanceRequest, CreateMemberDocumentRequest,
    CreateProgressRequest, MemberDocument, MemberDocumentQuery, MemberProfile, MemberProgress,
    ProgressQuery,
};
use crate::db::db_error;
use crate::util::{push_date_range, push_page, Counted};

// ============================================================================
// Profiles
// ============================================================================

/// Profile of a member, created empty if missing.
pub async fn get_or_create_profile(pool: &PgPool, user_id: Uuid) -> sqlx::Result<MemberProfile> {
    sqlx::query_as::<_, MemberProfile>(
        r"
        WITH ins AS (
            INSERT INTO member_profiles (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING *
        )
        SELECT * FROM ins
        UNION ALL
        SELECT * FROM member_profiles WHERE user_id = $1
        LIMIT 1
        ",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(db_error!("get_or_create_profile", user_id = %user_id))
}

pub async fn find_profile(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Option<MemberProfile>> {
    sqlx::query_as::<_, MemberProfile>("SELECT * FROM member_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_profile", user_id = %user_id))
}

pub async fn save_profile(pool: &PgPool, profile: &MemberProfile) -> sqlx::Result<MemberProfile> {
    sqlx::query_as::<_, MemberProfile>(
        r"
        UPDATE member_profiles SET
            birth_date = $2, profession = $3, civil_id = $4, mother_lodge = $5, masonic_id = $6,
            emergency_contact_name = $7, emergency_contact_phone = $8,
            emergency_contact_relation = $9, updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        ",
    )
    .bind(profile.user_id)
    .bind(profile.birth_date)
    .bind(&profile.profession)
    .bind(&profile.civil_id)
    .bind(&profile.mother_lodge)
    .bind(&profile.masonic_id)
    .bind(&profile.emergency_contact_name)
    .bind(&profile.emergency_contact_phone)
    .bind(&profile.emergency_contact_relation)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_profile", user_id = %profile.user_id))
}

/// Count one attendance and move `last_attendance_date` forward if newer.
pub async fn record_presence(
    conn: &mut PgConnection,
    user_id: Uuid,
    event_date: NaiveDate,
) -> sqlx::Result<()> {
    sqlx::query(
        r"
        INSERT INTO member_profiles (user_id, last_attendance_date, attendance_count)
        VALUES ($1, $2, 1)
        ON CONFLICT (user_id) DO UPDATE
        SET last_attendance_date = GREATEST(member_profiles.last_attendance_date, EXCLUDED.last_attendance_date),
            attendance_count = member_profiles.attendance_count + 1,
            updated_at = NOW()
        ",
    )
    .bind(user_id)
    .bind(event_date)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("record_presence", user_id = %user_id))?;
    Ok(())
}

// ============================================================================
// Member documents
// ============================================================================

pub async fn list_member_documents(
    pool: &PgPool,
    query: &MemberDocumentQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<MemberDocument>>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT *, COUNT(*) OVER() AS total_count FROM member_documents WHERE 1=1",
    );
    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(document_type) = query.document_type {
        builder.push(" AND document_type = ").push_bind(document_type);
    }
    builder.push(" ORDER BY created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_member_documents"))
}

pub async fn find_member_document(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<MemberDocument>> {
    sqlx::query_as::<_, MemberDocument>("SELECT * FROM member_documents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_member_document", document_id = %id))
}

pub async fn insert_member_document(
    pool: &PgPool,
    user_id: Uuid,
    body: &CreateMemberDocumentRequest,
    uploaded_by: Uuid,
) -> sqlx::Result<MemberDocument> {
    sqlx::query_as::<_, MemberDocument>(
        r"
        INSERT INTO member_documents (user_id, title, document_type, file, description,
                                      issue_date, expiry_date, uploaded_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        ",
    )
    .bind(user_id)
    .bind(&body.title)
    .bind(body.document_type)
    .bind(&body.file)
    .bind(&body.description)
    .bind(body.issue_date)
    .bind(body.expiry_date)
    .bind(uploaded_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_member_document", user_id = %user_id))
}

pub async fn save_member_document(pool: &PgPool, doc: &MemberDocument) -> sqlx::Result<MemberDocument> {
    sqlx::query_as::<_, MemberDocument>(
        r"
        UPDATE member_documents SET
            title = $2, document_type = $3, file = $4, description = $5,
            issue_date = $6, expiry_date = $7, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(doc.id)
    .bind(&doc.title)
    .bind(doc.document_type)
    .bind(&doc.file)
    .bind(&doc.description)
    .bind(doc.issue_date)
    .bind(doc.expiry_date)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_member_document", document_id = %doc.id))
}

pub async fn delete_member_document(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM member_documents WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_member_document", document_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Progress
// ============================================================================

pub async fn list_progress(
    pool: &PgPool,
    query: &ProgressQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<MemberProgress>>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT *, COUNT(*) OVER() AS total_count FROM member_progress WHERE 1=1",
    );
    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    push_date_range(&mut builder, "date", query.date_from, query.date_to);
    builder.push(" ORDER BY date DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_progress"))
}

pub async fn find_progress(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<MemberProgress>> {
    sqlx::query_as::<_, MemberProgress>("SELECT * FROM member_progress WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_progress", progress_id = %id))
}

pub async fn insert_progress(
    conn: &mut PgConnection,
    user_id: Uuid,
    body: &CreateProgressRequest,
    recorded_by: Uuid,
) -> sqlx::Result<MemberProgress> {
    sqlx::query_as::<_, MemberProgress>(
        r"
        INSERT INTO member_progress (user_id, title, description, date, ceremony_type, location, recorded_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(user_id)
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.date)
    .bind(&body.ceremony_type)
    .bind(&body.location)
    .bind(recorded_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_progress", user_id = %user_id))
}

pub async fn save_progress(pool: &PgPool, progress: &MemberProgress) -> sqlx::Result<MemberProgress> {
    sqlx::query_as::<_, MemberProgress>(
        r"
        UPDATE member_progress SET
            title = $2, description = $3, date = $4, ceremony_type = $5, location = $6,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(progress.id)
    .bind(&progress.title)
    .bind(&progress.description)
    .bind(progress.date)
    .bind(&progress.ceremony_type)
    .bind(&progress.location)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_progress", progress_id = %progress.id))
}

pub async fn delete_progress(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM member_progress WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_progress", progress_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Attendance
// ============================================================================

pub async fn list_attendance(
    pool: &PgPool,
    query: &AttendanceQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<Attendance>>> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT a.*, COUNT(*) OVER() AS total_count FROM attendance a JOIN events e ON e.id = a.event_id WHERE 1=1");
    if let Some(user_id) = query.user_id {
        builder.push(" AND a.user_id = ").push_bind(user_id);
    }
    if let Some(event_id) = query.event_id {
        builder.push(" AND a.event_id = ").push_bind(event_id);
    }
    if let Some(is_present) = query.is_present {
        builder.push(" AND a.is_present = ").push_bind(is_present);
    }
    builder.push(" ORDER BY e.date DESC, a.created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_attendance"))
}

pub async fn find_attendance(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Attendance>> {
    sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_attendance", attendance_id = %id))
}

pub async fn attendance_exists(pool: &PgPool, user_id: Uuid, event_id: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM attendance WHERE user_id = $1 AND event_id = $2)",
    )
    .bind(user_id)
    .bind(event_id)
    .fetch_one(pool)
    .await
    .map_err(db_error!("attendance_exists", user_id = %user_id, event_id = %event_id))
}

pub async fn insert_attendance(
    conn: &mut PgConnection,
    body: &CreateAttendanceRequest,
    recorded_by: Uuid,
) -> sqlx::Result<Attendance> {
    sqlx::query_as::<_, Attendance>(
        r"
        INSERT INTO attendance (user_id, event_id, is_present, excuse, recorded_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(body.user_id)
    .bind(body.event_id)
    .bind(body.is_present)
    .bind(&body.excuse)
    .bind(recorded_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_attendance", user_id = %body.user_id, event_id = %body.event_id))
}

pub async fn save_attendance(pool: &PgPool, attendance: &Attendance) -> sqlx::Result<Attendance> {
    sqlx::query_as::<_, Attendance>(
        "UPDATE attendance SET is_present = $2, excuse = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(attendance.id)
    .bind(attendance.is_present)
    .bind(&attendance.excuse)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_attendance", attendance_id = %attendance.id))
}

pub async fn delete_attendance(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM attendance WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_attendance", attendance_id = %id))?;
    Ok(result.rows_affected() > 0)
}

/// Date of an event, if it exists.
pub async fn event_date(pool: &PgPool, event_id: Uuid) -> sqlx::Result<Option<NaiveDate>> {
    sqlx::query_scalar::<_, NaiveDate>("SELECT date FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("event_date", event_id = %event_id))
}
