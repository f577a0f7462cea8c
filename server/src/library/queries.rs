//! Library module queries.

use chrono::{Duration, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::types::{
    AccessQuery, AccessType, CategoryQuery, CategoryResponse, CreateCategoryRequest,
    CreateDocumentRequest, Document, DocumentAccess, DocumentCategory, DocumentComment,
    DocumentQuery, DocumentRating, DocumentResponse, FeedbackQuery, ParentFilter,
};
use crate::db::db_error;
use crate::util::{push_date_range, push_page, push_search, ClientInfo, Counted};

// ============================================================================
// Categories
// ============================================================================

fn category_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        r"
        SELECT c.*,
            (
                WITH RECURSIVE up AS (
                    SELECT c.name, c.parent_id, 0 AS depth
                    UNION ALL
                    SELECT p.name, p.parent_id, up.depth + 1
                    FROM document_categories p JOIN up ON p.id = up.parent_id
                )
                SELECT string_agg(name, ' > ' ORDER BY depth DESC) FROM up
            ) AS full_path,
            COALESCE(NULLIF(u.symbolic_name, ''), u.username) AS created_by_name,
            (SELECT COUNT(*) FROM document_categories s WHERE s.parent_id = c.id) AS subcategories_count,
            (SELECT COUNT(*) FROM documents d WHERE d.category_id = c.id) AS documents_count,
            COUNT(*) OVER() AS total_count
        FROM document_categories c
        LEFT JOIN users u ON u.id = c.created_by
        WHERE 1=1",
    )
}

pub async fn list_categories(
    pool: &PgPool,
    query: &CategoryQuery,
    parent: Option<ParentFilter>,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<CategoryResponse>>> {
    let mut builder = category_select();
    if let Some(max) = max_degree {
        builder.push(" AND c.required_degree <= ").push_bind(max);
    }
    match parent {
        Some(ParentFilter::Roots) => {
            builder.push(" AND c.parent_id IS NULL");
        }
        Some(ParentFilter::Parent(id)) => {
            builder.push(" AND c.parent_id = ").push_bind(id);
        }
        None => {}
    }
    if let Some(degree) = query.required_degree {
        builder.push(" AND c.required_degree = ").push_bind(degree);
    }
    push_search(&mut builder, &["c.name", "c.description"], query.search.as_deref());
    builder.push(r#" ORDER BY c."order", c.name"#);
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_categories"))
}

pub async fn find_category(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<DocumentCategory>> {
    sqlx::query_as::<_, DocumentCategory>("SELECT * FROM document_categories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_category", category_id = %id))
}

pub async fn find_category_response(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<CategoryResponse>> {
    let mut builder = category_select();
    builder.push(" AND c.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_category_response", category_id = %id))
}

pub async fn subcategories(
    pool: &PgPool,
    parent_id: Uuid,
    max_degree: Option<i16>,
) -> sqlx::Result<Vec<CategoryResponse>> {
    let mut builder = category_select();
    builder.push(" AND c.parent_id = ").push_bind(parent_id);
    if let Some(max) = max_degree {
        builder.push(" AND c.required_degree <= ").push_bind(max);
    }
    builder.push(r#" ORDER BY c."order", c.name"#);
    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("subcategories", parent_id = %parent_id))
}

/// Whether `candidate` is `id` itself or one of its descendants.
pub async fn is_descendant_or_self(pool: &PgPool, id: Uuid, candidate: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r"
        WITH RECURSIVE tree AS (
            SELECT id FROM document_categories WHERE id = $1
            UNION ALL
            SELECT c.id FROM document_categories c JOIN tree t ON c.parent_id = t.id
        )
        SELECT EXISTS(SELECT 1 FROM tree WHERE id = $2)
        ",
    )
    .bind(id)
    .bind(candidate)
    .fetch_one(pool)
    .await
    .map_err(db_error!("is_descendant_or_self", category_id = %id))
}

pub async fn insert_category(
    pool: &PgPool,
    body: &CreateCategoryRequest,
    required_degree: i16,
    created_by: Uuid,
) -> sqlx::Result<DocumentCategory> {
    sqlx::query_as::<_, DocumentCategory>(
        r#"
        INSERT INTO document_categories (name, description, parent_id, required_degree, "order", created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(body.parent_id)
    .bind(required_degree)
    .bind(body.order)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_category", name = %body.name))
}

pub async fn save_category(conn: &mut PgConnection, category: &DocumentCategory) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE document_categories SET
            name = $2, description = $3, parent_id = $4, required_degree = $5, "order" = $6,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(&category.description)
    .bind(category.parent_id)
    .bind(category.required_degree)
    .bind(category.order)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("save_category", category_id = %category.id))?;
    Ok(())
}

/// Raise every descendant of `id` to at least `degree`. Returns rows changed.
pub async fn cascade_category_degree(
    conn: &mut PgConnection,
    id: Uuid,
    degree: i16,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r"
        WITH RECURSIVE tree AS (
            SELECT id FROM document_categories WHERE parent_id = $1
            UNION ALL
            SELECT c.id FROM document_categories c JOIN tree t ON c.parent_id = t.id
        )
        UPDATE document_categories SET required_degree = $2, updated_at = NOW()
        WHERE id IN (SELECT id FROM tree) AND required_degree < $2
        ",
    )
    .bind(id)
    .bind(degree)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("cascade_category_degree", category_id = %id))?;
    Ok(result.rows_affected())
}

pub async fn delete_category(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM document_categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_category", category_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Documents
// ============================================================================

fn document_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        r"
        SELECT d.*,
            c.name AS category_name,
            COALESCE(NULLIF(u.symbolic_name, ''), u.username) AS uploaded_by_name,
            COALESCE((SELECT AVG(r.rating)::float8 FROM document_ratings r WHERE r.document_id = d.id), 0) AS average_rating,
            (SELECT COUNT(*) FROM document_ratings r WHERE r.document_id = d.id) AS ratings_count,
            (SELECT COUNT(*) FROM document_comments m WHERE m.document_id = d.id) AS comments_count,
            COUNT(*) OVER() AS total_count
        FROM documents d
        LEFT JOIN document_categories c ON c.id = d.category_id
        LEFT JOIN users u ON u.id = d.uploaded_by
        WHERE 1=1",
    )
}

pub async fn list_documents(
    pool: &PgPool,
    query: &DocumentQuery,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<DocumentResponse>>> {
    let mut builder = document_select();
    if let Some(max) = max_degree {
        builder.push(" AND d.required_degree <= ").push_bind(max);
    }
    if let Some(category_id) = query.category_id {
        builder.push(" AND d.category_id = ").push_bind(category_id);
    }
    if let Some(document_type) = query.document_type {
        builder.push(" AND d.document_type = ").push_bind(document_type);
    }
    if let Some(degree) = query.required_degree {
        builder.push(" AND d.required_degree = ").push_bind(degree);
    }
    if let Some(is_public) = query.is_public {
        builder.push(" AND d.is_public = ").push_bind(is_public);
    }
    if let Some(is_featured) = query.is_featured {
        builder.push(" AND d.is_featured = ").push_bind(is_featured);
    }
    push_search(
        &mut builder,
        &["d.title", "d.description", "d.author", "d.tags"],
        query.search.as_deref(),
    );
    builder.push(" ORDER BY ").push(query.order_by.sql());
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_documents"))
}

pub async fn find_document(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Document>> {
    sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_document", document_id = %id))
}

pub async fn find_document_response(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<DocumentResponse>> {
    let mut builder = document_select();
    builder.push(" AND d.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_document_response", document_id = %id))
}

pub async fn insert_document(
    conn: &mut PgConnection,
    body: &CreateDocumentRequest,
    uploaded_by: Uuid,
) -> sqlx::Result<Document> {
    sqlx::query_as::<_, Document>(
        r"
        INSERT INTO documents (
            title, description, category_id, document_type, file, author, publication_date,
            language, pages, required_degree, tags, is_public, is_featured, uploaded_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        ",
    )
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.category_id)
    .bind(body.document_type)
    .bind(&body.file)
    .bind(&body.author)
    .bind(body.publication_date)
    .bind(&body.language)
    .bind(body.pages)
    .bind(body.required_degree)
    .bind(&body.tags)
    .bind(body.is_public)
    .bind(body.is_featured)
    .bind(uploaded_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_document", title = %body.title))
}

pub async fn save_document(pool: &PgPool, doc: &Document) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE documents SET
            title = $2, description = $3, category_id = $4, document_type = $5, file = $6,
            author = $7, publication_date = $8, language = $9, pages = $10,
            required_degree = $11, tags = $12, is_public = $13, is_featured = $14,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(doc.id)
    .bind(&doc.title)
    .bind(&doc.description)
    .bind(doc.category_id)
    .bind(doc.document_type)
    .bind(&doc.file)
    .bind(&doc.author)
    .bind(doc.publication_date)
    .bind(&doc.language)
    .bind(doc.pages)
    .bind(doc.required_degree)
    .bind(&doc.tags)
    .bind(doc.is_public)
    .bind(doc.is_featured)
    .execute(pool)
    .await
    .map_err(db_error!("save_document", document_id = %doc.id))?;
    Ok(())
}

pub async fn toggle_featured(pool: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("UPDATE documents SET is_featured = NOT is_featured, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("toggle_featured", document_id = %id))?;
    Ok(())
}

pub async fn delete_document(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_document", document_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Access log
// ============================================================================

/// Log an access and bump the matching counter on the document.
pub async fn record_access(
    conn: &mut PgConnection,
    document_id: Uuid,
    user_id: Uuid,
    access_type: AccessType,
    client: &ClientInfo,
) -> sqlx::Result<()> {
    sqlx::query(
        r"
        INSERT INTO document_access (document_id, user_id, access_type, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(document_id)
    .bind(user_id)
    .bind(access_type)
    .bind(client.ip.as_deref())
    .bind(client.user_agent.as_deref().unwrap_or_default())
    .execute(&mut *conn)
    .await
    .map_err(db_error!("record_access", document_id = %document_id, user_id = %user_id))?;

    let counter = match access_type {
        AccessType::View => "UPDATE documents SET view_count = view_count + 1 WHERE id = $1",
        AccessType::Download => "UPDATE documents SET download_count = download_count + 1 WHERE id = $1",
    };
    sqlx::query(counter)
        .bind(document_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error!("bump_access_counter", document_id = %document_id))?;
    Ok(())
}

/// Downloads by `user_id` within the last hour.
pub async fn recent_downloads(conn: &mut PgConnection, user_id: Uuid) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(
        r"
        SELECT COUNT(*) FROM document_access
        WHERE user_id = $1 AND access_type = 'download' AND access_date >= $2
        ",
    )
    .bind(user_id)
    .bind(Utc::now() - Duration::hours(1))
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("recent_downloads", user_id = %user_id))
}

pub async fn list_access(
    pool: &PgPool,
    query: &AccessQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<DocumentAccess>>> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT *, COUNT(*) OVER() AS total_count FROM document_access WHERE 1=1");
    if let Some(document_id) = query.document_id {
        builder.push(" AND document_id = ").push_bind(document_id);
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(access_type) = query.access_type {
        builder.push(" AND access_type = ").push_bind(access_type);
    }
    push_date_range(&mut builder, "access_date::date", query.date_from, query.date_to);
    builder.push(" ORDER BY access_date DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_access"))
}

pub async fn find_access(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<DocumentAccess>> {
    sqlx::query_as::<_, DocumentAccess>("SELECT * FROM document_access WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_access", access_id = %id))
}

// ============================================================================
// Comments
// ============================================================================

const COMMENT_SELECT: &str = r"
    SELECT m.id, m.document_id, m.user_id, m.content, m.created_at, m.updated_at,
        COALESCE(NULLIF(u.symbolic_name, ''), u.username) AS user_name,
        COUNT(*) OVER() AS total_count
    FROM document_comments m
    JOIN users u ON u.id = m.user_id
    JOIN documents d ON d.id = m.document_id
    WHERE 1=1";

/// Comments on documents visible under `max_degree`.
pub async fn list_comments(
    pool: &PgPool,
    query: &FeedbackQuery,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<DocumentComment>>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(COMMENT_SELECT);
    if let Some(max) = max_degree {
        builder.push(" AND d.required_degree <= ").push_bind(max);
    }
    if let Some(document_id) = query.document_id {
        builder.push(" AND m.document_id = ").push_bind(document_id);
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND m.user_id = ").push_bind(user_id);
    }
    builder.push(" ORDER BY m.created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_comments"))
}

pub async fn find_comment(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<DocumentComment>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(COMMENT_SELECT);
    builder.push(" AND m.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_comment", comment_id = %id))
}

pub async fn insert_comment(
    conn: &mut PgConnection,
    document_id: Uuid,
    user_id: Uuid,
    content: &str,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO document_comments (document_id, user_id, content) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(document_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_comment", document_id = %document_id))
}

pub async fn update_comment(pool: &PgPool, id: Uuid, content: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE document_comments SET content = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(content)
        .execute(pool)
        .await
        .map_err(db_error!("update_comment", comment_id = %id))?;
    Ok(())
}

pub async fn delete_comment(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM document_comments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_comment", comment_id = %id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Ratings
// ============================================================================

const RATING_SELECT: &str = r"
    SELECT r.id, r.document_id, r.user_id, r.rating, r.created_at, r.updated_at,
        COALESCE(NULLIF(u.symbolic_name, ''), u.username) AS user_name,
        COUNT(*) OVER() AS total_count
    FROM document_ratings r
    JOIN users u ON u.id = r.user_id
    JOIN documents d ON d.id = r.document_id
    WHERE 1=1";

pub async fn list_ratings(
    pool: &PgPool,
    query: &FeedbackQuery,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<DocumentRating>>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(RATING_SELECT);
    if let Some(max) = max_degree {
        builder.push(" AND d.required_degree <= ").push_bind(max);
    }
    if let Some(document_id) = query.document_id {
        builder.push(" AND r.document_id = ").push_bind(document_id);
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND r.user_id = ").push_bind(user_id);
    }
    builder.push(" ORDER BY r.created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_ratings"))
}

pub async fn find_rating(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<DocumentRating>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(RATING_SELECT);
    builder.push(" AND r.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_rating", rating_id = %id))
}

/// Insert or replace the caller's rating. Returns the id and whether it was new.
pub async fn upsert_rating(
    conn: &mut PgConnection,
    document_id: Uuid,
    user_id: Uuid,
    rating: i16,
) -> sqlx::Result<(Uuid, bool)> {
    sqlx::query_as::<_, (Uuid, bool)>(
        r"
        INSERT INTO document_ratings (document_id, user_id, rating)
        VALUES ($1, $2, $3)
        ON CONFLICT (document_id, user_id)
        DO UPDATE SET rating = EXCLUDED.rating, updated_at = NOW()
        RETURNING id, (xmax = 0) AS inserted
        ",
    )
    .bind(document_id)
    .bind(user_id)
    .bind(rating)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("upsert_rating", document_id = %document_id, user_id = %user_id))
}

pub async fn insert_rating(
    conn: &mut PgConnection,
    document_id: Uuid,
    user_id: Uuid,
    rating: i16,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO document_ratings (document_id, user_id, rating) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(document_id)
    .bind(user_id)
    .bind(rating)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_rating", document_id = %document_id, user_id = %user_id))
}

pub async fn update_rating(pool: &PgPool, id: Uuid, rating: i16) -> sqlx::Result<()> {
    sqlx::query("UPDATE document_ratings SET rating = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(rating)
        .execute(pool)
        .await
        .map_err(db_error!("update_rating", rating_id = %id))?;
    Ok(())
}

pub async fn delete_rating(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM document_ratings WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_rating", rating_id = %id))?;
    Ok(result.rows_affected() > 0)
}
