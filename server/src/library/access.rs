//! Document access logging and the download rate alert.

use axum::extract::{Path, Query, State};
use axum::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use super::error::{LibraryError, LibraryResult};
use super::queries;
use super::types::{AccessQuery, AccessType, Document, DocumentAccess};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::Degree;
use crate::system::{record_log, LogType, NewSystemLog};
use crate::util::{page_bounds, ClientInfo, Page};

/// Whether `recent` downloads in the last hour exceed the alert threshold.
#[must_use]
pub const fn exceeds_download_threshold(recent: i64, threshold: i64) -> bool {
    recent > threshold
}

/// Log a view or download of `document` by the caller.
///
/// Downloads are checked against the hourly threshold; crossing it emits a
/// warning and a security log entry in the same transaction.
pub async fn log_access(
    conn: &mut PgConnection,
    threshold: i64,
    document: &Document,
    auth: &AuthUser,
    access_type: AccessType,
    client: &ClientInfo,
) -> sqlx::Result<()> {
    queries::record_access(conn, document.id, auth.id, access_type, client).await?;
    if access_type != AccessType::Download {
        return Ok(());
    }

    let recent = queries::recent_downloads(conn, auth.id).await?;
    if exceeds_download_threshold(recent, threshold) {
        tracing::warn!(
            user_id = %auth.id,
            username = %auth.username,
            recent,
            threshold,
            "Download rate alert"
        );
        let log = NewSystemLog::new(
            LogType::Security,
            "library",
            format!(
                "Usuario {} ha descargado {recent} documentos en la última hora",
                auth.username
            ),
        )
        .details(format!("Último documento: {} ({})", document.title, document.id))
        .user(Some(auth.id))
        .client(client.ip.clone(), client.user_agent.clone());
        record_log(&mut *conn, &log).await?;
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/library/access-logs/",
    tag = "library",
    params(AccessQuery),
    responses(
        (status = 200, description = "Document access log", body = Page<DocumentAccess>),
        (status = 403, description = "Requires degree 3"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_access_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<AccessQuery>,
) -> LibraryResult<Json<Page<DocumentAccess>>> {
    auth.require_degree(Degree::Master)?;
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_access(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn get_access_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<DocumentAccess>> {
    auth.require_degree(Degree::Master)?;
    queries::find_access(&state.db, id)
        .await?
        .map(Json)
        .ok_or(LibraryError::NotFound("Access log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(!exceeds_download_threshold(10, 10));
        assert!(exceeds_download_threshold(11, 10));
        assert!(!exceeds_download_threshold(0, 10));
    }
}
