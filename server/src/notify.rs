//! Notification fan-out.
//!
//! Every helper writes through the caller's connection so notifications are
//! created in the same transaction as the write that triggered them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::db::db_error;
use crate::util::ellipsize;

/// Category of a notification.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum NotificationType {
    #[default]
    General,
    Important,
    Event,
    Payment,
    Ritual,
    Administrative,
}

/// A notification about to be created.
#[derive(Debug, Clone)]
pub struct Notice {
    pub title: String,
    pub content: String,
    pub kind: NotificationType,
    pub event_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

impl Notice {
    pub fn new(title: impl Into<String>, content: impl Into<String>, kind: NotificationType) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            kind,
            event_id: None,
            created_by: None,
        }
    }

    #[must_use]
    pub const fn for_event(mut self, event_id: Option<Uuid>) -> Self {
        self.event_id = event_id;
        self
    }

    #[must_use]
    pub const fn by(mut self, user_id: Option<Uuid>) -> Self {
        self.created_by = user_id;
        self
    }

    /// New event announcement.
    pub fn event_created(event_id: Uuid, title: &str, date: NaiveDate, description: &str) -> Self {
        Self::new(
            format!("Nuevo evento: {title}"),
            format!("Se ha programado un nuevo evento para el {date}.\n\n{description}"),
            NotificationType::Event,
        )
        .for_event(Some(event_id))
    }

    /// New library document announcement.
    pub fn document_created(title: &str, category: Option<&str>, description: &str) -> Self {
        let category = category.unwrap_or("Sin categoría");
        Self::new(
            format!("Nuevo documento en biblioteca: {title}"),
            format!(
                "Se ha añadido un nuevo documento a la biblioteca en la categoría '{category}'.\n\n{description}"
            ),
            NotificationType::General,
        )
    }

    /// Comment left on someone else's document.
    pub fn document_commented(title: &str, commenter: &str, comment: &str) -> Self {
        Self::new(
            format!("Nuevo comentario en: {title}"),
            format!(
                "{commenter} ha comentado en tu documento '{title}':\n\n{}",
                ellipsize(comment, 100)
            ),
            NotificationType::General,
        )
    }

    /// First rating left on someone else's document.
    pub fn document_rated(title: &str, rater: &str, rating: i16) -> Self {
        Self::new(
            format!("Nueva calificación en: {title}"),
            format!("{rater} ha calificado tu documento '{title}' con {rating} estrellas."),
            NotificationType::General,
        )
    }

    /// Ritual plan moved to a new status.
    pub fn ritual_status_changed(title: &str, date: NaiveDate, status: &str) -> Self {
        Self::new(
            format!("Plan Ritual: {title} - {status}"),
            format!(
                "El plan ritual '{title}' programado para el {date} ha cambiado su estado a '{status}'."
            ),
            NotificationType::Ritual,
        )
    }

    /// Member assigned to a ritual role.
    pub fn ritual_role_assigned(role: &str, plan_title: &str, date: NaiveDate) -> Self {
        Self::new(
            format!("Asignación de Rol: {role}"),
            format!(
                "Has sido asignado al rol de '{role}' para el trabajo ritual '{plan_title}' programado para el {date}."
            ),
            NotificationType::Ritual,
        )
    }

    /// Ritual work moved to a new status.
    pub fn ritual_work_status(work_title: &str, plan_title: &str, status: &str) -> Self {
        Self::new(
            format!("Trabajo Ritual: {work_title} - {status}"),
            format!(
                "El trabajo '{work_title}' para el ritual '{plan_title}' ha cambiado su estado a '{status}'."
            ),
            NotificationType::Ritual,
        )
    }

    /// Invoice issued to a member. `total` is in cents.
    pub fn invoice_issued(number: &str, total: i64, due_date: NaiveDate) -> Self {
        Self::new(
            format!("Nueva factura: #{number}"),
            format!(
                "Se ha emitido la factura #{number} por un total de {}.{:02}, con vencimiento el {due_date}.",
                total / 100,
                (total % 100).abs()
            ),
            NotificationType::Payment,
        )
    }

    /// File attached to a ritual plan.
    pub fn ritual_attachment(title: &str, plan_title: &str) -> Self {
        Self::new(
            format!("Nuevo Adjunto Ritual: {title}"),
            format!("Se ha subido un nuevo adjunto '{title}' para el trabajo ritual '{plan_title}'."),
            NotificationType::Ritual,
        )
    }
}

/// Insert the notification row without recipients.
pub async fn create_notification(conn: &mut PgConnection, notice: &Notice) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        r"
        INSERT INTO notifications (title, content, notification_type, event_id, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        ",
    )
    .bind(&notice.title)
    .bind(&notice.content)
    .bind(notice.kind)
    .bind(notice.event_id)
    .bind(notice.created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("create_notification", title = %notice.title))
}

/// Deliver an existing notification to `user_ids`. Unknown ids are skipped.
pub async fn deliver(
    conn: &mut PgConnection,
    notification_id: Uuid,
    user_ids: &[Uuid],
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r"
        INSERT INTO notification_recipients (notification_id, recipient_id)
        SELECT $1, u.id FROM users u WHERE u.id = ANY($2)
        ON CONFLICT (notification_id, recipient_id) DO NOTHING
        ",
    )
    .bind(notification_id)
    .bind(user_ids)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("deliver_notification", notification_id = %notification_id))?;
    Ok(result.rows_affected())
}

/// Active users whose degree is at least `min_degree`.
pub async fn eligible_users(conn: &mut PgConnection, min_degree: i16) -> sqlx::Result<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE is_active AND degree >= $1")
        .bind(min_degree)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error!("eligible_users", min_degree))
}

/// Create a notification and deliver it to every eligible active user.
#[tracing::instrument(skip(conn, notice), fields(title = %notice.title))]
pub async fn fan_out_by_degree(
    conn: &mut PgConnection,
    notice: &Notice,
    min_degree: i16,
) -> sqlx::Result<Uuid> {
    let notification_id = create_notification(conn, notice).await?;

    let delivered = sqlx::query(
        r"
        INSERT INTO notification_recipients (notification_id, recipient_id)
        SELECT $1, id FROM users WHERE is_active AND degree >= $2
        ",
    )
    .bind(notification_id)
    .bind(min_degree)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("fan_out_by_degree", notification_id = %notification_id))?
    .rows_affected();

    tracing::debug!(%notification_id, min_degree, delivered, "Notification fanned out");
    Ok(notification_id)
}

/// Create a notification for specific users.
pub async fn notify_users(
    conn: &mut PgConnection,
    notice: &Notice,
    user_ids: &[Uuid],
) -> sqlx::Result<Uuid> {
    let notification_id = create_notification(conn, notice).await?;
    deliver(conn, notification_id, user_ids).await?;
    Ok(notification_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 21).unwrap()
    }

    #[test]
    fn test_event_notice() {
        let id = Uuid::new_v4();
        let notice = Notice::event_created(id, "Tenida ordinaria", date(), "Orden del día");
        assert_eq!(notice.title, "Nuevo evento: Tenida ordinaria");
        assert_eq!(
            notice.content,
            "Se ha programado un nuevo evento para el 2025-03-21.\n\nOrden del día"
        );
        assert_eq!(notice.kind, NotificationType::Event);
        assert_eq!(notice.event_id, Some(id));
    }

    #[test]
    fn test_document_notice_without_category() {
        let notice = Notice::document_created("Constituciones", None, "Texto base");
        assert!(notice.content.contains("'Sin categoría'"));
        assert_eq!(notice.kind, NotificationType::General);
    }

    #[test]
    fn test_comment_notice_truncates_long_comments() {
        let long = "a".repeat(150);
        let notice = Notice::document_commented("Doc", "Hiram", &long);
        assert!(notice.content.ends_with(&format!("{}...", "a".repeat(100))));

        let short = Notice::document_commented("Doc", "Hiram", "Excelente");
        assert!(short.content.ends_with("Excelente"));
    }

    #[test]
    fn test_ritual_notices() {
        let status = Notice::ritual_status_changed("Iniciación", date(), "Aprobado");
        assert_eq!(status.title, "Plan Ritual: Iniciación - Aprobado");
        assert_eq!(status.kind, NotificationType::Ritual);

        let role = Notice::ritual_role_assigned("Orador", "Iniciación", date());
        assert_eq!(role.title, "Asignación de Rol: Orador");
    }

    #[test]
    fn test_invoice_notice_formats_cents() {
        let notice = Notice::invoice_issued("2025-007", 12_305, date());
        assert_eq!(notice.title, "Nueva factura: #2025-007");
        assert!(notice.content.contains("123.05"));
        assert_eq!(notice.kind, NotificationType::Payment);
    }

    #[test]
    fn test_builder_sets_creator() {
        let user = Uuid::new_v4();
        let notice = Notice::new("t", "c", NotificationType::Important).by(Some(user));
        assert_eq!(notice.created_by, Some(user));
        assert_eq!(notice.event_id, None);
    }

    #[test]
    fn test_type_serde() {
        assert_eq!(
            serde_json::to_string(&NotificationType::Administrative).unwrap(),
            "\"administrative\""
        );
    }
}
