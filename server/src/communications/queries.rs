//! Communications module queries.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::types::{
    AddCalendarEventRequest, AttendeeRow, Calendar, CalendarEntry, CalendarEvent, CalendarQuery,
    CalendarResponse, CreateCalendarRequest, CreateEventRequest, CreateMessageRequest,
    CreateNotificationRequest, Event, EventQuery, EventResponse, EventStatus, InboxType,
    MailboxFlag, Message, MessageQuery, MessageRecipient, MessageResponse, Notification,
    NotificationQuery, NotificationResponse,
};
use crate::db::db_error;
use crate::util::{push_date_range, push_page, push_search, Counted};

// ============================================================================
// Events
// ============================================================================

fn event_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        r"
        SELECT e.*,
            (SELECT COUNT(*) FROM attendance a WHERE a.event_id = e.id AND a.is_present) AS attendance_count,
            COUNT(*) OVER() AS total_count
        FROM events e
        WHERE 1=1",
    )
}

/// Events visible under `max_degree` (`None` sees everything).
pub async fn list_events(
    pool: &PgPool,
    query: &EventQuery,
    max_degree: Option<i16>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<EventResponse>>> {
    let mut builder = event_select();
    if let Some(max) = max_degree {
        builder.push(" AND e.required_degree <= ").push_bind(max);
    }
    if let Some(event_type) = query.event_type {
        builder.push(" AND e.event_type = ").push_bind(event_type);
    }
    if let Some(status) = query.status {
        builder.push(" AND e.status = ").push_bind(status);
    }
    if let Some(degree) = query.required_degree {
        builder.push(" AND e.required_degree = ").push_bind(degree);
    }
    if query.upcoming == Some(true) {
        builder
            .push(" AND e.date >= CURRENT_DATE AND e.status = ")
            .push_bind(EventStatus::Scheduled);
    }
    push_date_range(&mut builder, "e.date", query.date_from, query.date_to);
    push_search(
        &mut builder,
        &["e.title", "e.description", "e.location"],
        query.search.as_deref(),
    );
    builder.push(" ORDER BY e.date DESC, e.start_time DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_events"))
}

pub async fn find_event(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Event>> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_event", event_id = %id))
}

pub async fn find_event_response(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<EventResponse>> {
    let mut builder = event_select();
    builder.push(" AND e.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_event_response", event_id = %id))
}

pub async fn insert_event(
    conn: &mut PgConnection,
    body: &CreateEventRequest,
    created_by: Uuid,
) -> sqlx::Result<Event> {
    sqlx::query_as::<_, Event>(
        r"
        INSERT INTO events (
            title, description, date, start_time, end_time, location, is_virtual,
            virtual_link, event_type, required_degree, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        ",
    )
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.date)
    .bind(body.start_time)
    .bind(body.end_time)
    .bind(&body.location)
    .bind(body.is_virtual)
    .bind(&body.virtual_link)
    .bind(body.event_type)
    .bind(body.required_degree)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_event", title = %body.title))
}

pub async fn save_event(conn: &mut PgConnection, event: &Event) -> sqlx::Result<Event> {
    sqlx::query_as::<_, Event>(
        r"
        UPDATE events SET
            title = $2, description = $3, date = $4, start_time = $5, end_time = $6,
            location = $7, is_virtual = $8, virtual_link = $9, event_type = $10,
            required_degree = $11, status = $12, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.date)
    .bind(event.start_time)
    .bind(event.end_time)
    .bind(&event.location)
    .bind(event.is_virtual)
    .bind(&event.virtual_link)
    .bind(event.event_type)
    .bind(event.required_degree)
    .bind(event.status)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("save_event", event_id = %event.id))
}

pub async fn set_event_status(pool: &PgPool, id: Uuid, status: EventStatus) -> sqlx::Result<()> {
    sqlx::query("UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await
        .map_err(db_error!("set_event_status", event_id = %id))?;
    Ok(())
}

pub async fn delete_event(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_event", event_id = %id))?;
    Ok(result.rows_affected() > 0)
}

/// Create an absent attendance row per user. Existing rows are kept.
pub async fn create_event_attendance(
    conn: &mut PgConnection,
    event_id: Uuid,
    user_ids: &[Uuid],
    recorded_by: Option<Uuid>,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r"
        INSERT INTO attendance (user_id, event_id, is_present, recorded_by)
        SELECT u, $2, FALSE, $3 FROM UNNEST($1::uuid[]) AS u
        ON CONFLICT (user_id, event_id) DO NOTHING
        ",
    )
    .bind(user_ids)
    .bind(event_id)
    .bind(recorded_by)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("create_event_attendance", event_id = %event_id))?;
    Ok(result.rows_affected())
}

pub async fn list_attendees(pool: &PgPool, event_id: Uuid) -> sqlx::Result<Vec<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(
        r"
        SELECT u.id, u.username, u.symbolic_name, u.first_name, u.last_name, u.degree,
               a.is_present, a.excuse
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        WHERE a.event_id = $1
        ORDER BY u.symbolic_name, u.username
        ",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_attendees", event_id = %event_id))
}

// ============================================================================
// Notifications
// ============================================================================

fn notification_select(caller: Uuid) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        r"
        SELECT n.*,
            (SELECT COUNT(*) FROM notification_recipients r WHERE r.notification_id = n.id) AS recipients_count,
            (SELECT COUNT(*) FROM notification_recipients r WHERE r.notification_id = n.id AND r.read) AS read_count,
            me.read,
            COUNT(*) OVER() AS total_count
        FROM notifications n
        LEFT JOIN notification_recipients me
            ON me.notification_id = n.id AND me.recipient_id = ",
    );
    builder.push_bind(caller).push(" WHERE 1=1");
    builder
}

/// Notifications, restricted to the caller's when `received`.
pub async fn list_notifications(
    pool: &PgPool,
    query: &NotificationQuery,
    caller: Uuid,
    received: bool,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<NotificationResponse>>> {
    let mut builder = notification_select(caller);
    if received {
        builder.push(" AND me.id IS NOT NULL");
    }
    if query.unread == Some(true) {
        builder.push(" AND me.id IS NOT NULL AND NOT me.read");
    }
    if let Some(kind) = query.notification_type {
        builder.push(" AND n.notification_type = ").push_bind(kind);
    }
    if let Some(event_id) = query.event_id {
        builder.push(" AND n.event_id = ").push_bind(event_id);
    }
    push_date_range(&mut builder, "n.send_date::date", query.date_from, query.date_to);
    push_search(&mut builder, &["n.title", "n.content"], query.search.as_deref());
    builder.push(" ORDER BY n.send_date DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_notifications", caller = %caller))
}

pub async fn find_notification(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Notification>> {
    sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_notification", notification_id = %id))
}

pub async fn find_notification_response(
    pool: &PgPool,
    id: Uuid,
    caller: Uuid,
) -> sqlx::Result<Option<NotificationResponse>> {
    let mut builder = notification_select(caller);
    builder.push(" AND n.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_notification_response", notification_id = %id))
}

pub async fn insert_notification(
    conn: &mut PgConnection,
    body: &CreateNotificationRequest,
    created_by: Uuid,
) -> sqlx::Result<Notification> {
    sqlx::query_as::<_, Notification>(
        r"
        INSERT INTO notifications (title, content, notification_type, event_id, expiry_date, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(&body.title)
    .bind(&body.content)
    .bind(body.notification_type)
    .bind(body.event_id)
    .bind(body.expiry_date)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_notification", title = %body.title))
}

pub async fn save_notification(pool: &PgPool, notification: &Notification) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE notifications SET title = $2, content = $3, notification_type = $4, expiry_date = $5
        WHERE id = $1
        ",
    )
    .bind(notification.id)
    .bind(&notification.title)
    .bind(&notification.content)
    .bind(notification.notification_type)
    .bind(notification.expiry_date)
    .execute(pool)
    .await
    .map_err(db_error!("save_notification", notification_id = %notification.id))?;
    Ok(())
}

pub async fn delete_notification(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_notification", notification_id = %id))?;
    Ok(result.rows_affected() > 0)
}

/// Mark read for `user`. Returns false when `user` is not a recipient.
pub async fn mark_notification_read(pool: &PgPool, id: Uuid, user: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE notification_recipients
        SET read = TRUE, read_date = COALESCE(read_date, NOW())
        WHERE notification_id = $1 AND recipient_id = $2
        ",
    )
    .bind(id)
    .bind(user)
    .execute(pool)
    .await
    .map_err(db_error!("mark_notification_read", notification_id = %id, user_id = %user))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Messages
// ============================================================================

fn message_select(caller: Uuid) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        r"
        SELECT m.*,
            COALESCE(NULLIF(u.symbolic_name, ''), u.username) AS sender_name,
            (SELECT COUNT(*) FROM message_recipients r WHERE r.message_id = m.id) AS recipients_count,
            me.read, me.archived, me.starred,
            COUNT(*) OVER() AS total_count
        FROM messages m
        JOIN users u ON u.id = m.sender_id
        LEFT JOIN message_recipients me
            ON me.message_id = m.id AND me.recipient_id = ",
    );
    builder.push_bind(caller).push(" WHERE 1=1");
    builder
}

/// The caller's mailbox. Without `inbox_type`, everything sent or received.
pub async fn list_messages(
    pool: &PgPool,
    query: &MessageQuery,
    caller: Uuid,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<MessageResponse>>> {
    let mut builder = message_select(caller);
    match query.inbox_type {
        Some(InboxType::Sent) => {
            builder.push(" AND NOT m.is_draft AND m.sender_id = ").push_bind(caller);
        }
        Some(InboxType::Drafts) => {
            builder.push(" AND m.is_draft AND m.sender_id = ").push_bind(caller);
        }
        Some(InboxType::Received) => {
            builder.push(" AND me.id IS NOT NULL AND NOT me.archived AND NOT m.is_draft");
        }
        Some(InboxType::Archived) => {
            builder.push(" AND me.id IS NOT NULL AND me.archived");
        }
        Some(InboxType::Starred) => {
            builder.push(" AND me.id IS NOT NULL AND me.starred");
        }
        None => {
            builder
                .push(" AND (me.id IS NOT NULL OR m.sender_id = ")
                .push_bind(caller)
                .push(")");
        }
    }
    if query.unread == Some(true) {
        builder.push(" AND me.id IS NOT NULL AND NOT me.read");
    }
    push_search(&mut builder, &["m.subject", "m.content"], query.search.as_deref());
    if query.inbox_type == Some(InboxType::Drafts) {
        builder.push(" ORDER BY m.updated_at DESC");
    } else {
        builder.push(" ORDER BY m.send_date DESC");
    }
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_messages", caller = %caller))
}

pub async fn find_message(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Message>> {
    sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_message", message_id = %id))
}

pub async fn find_message_response(
    pool: &PgPool,
    id: Uuid,
    caller: Uuid,
) -> sqlx::Result<Option<MessageResponse>> {
    let mut builder = message_select(caller);
    builder.push(" AND m.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_message_response", message_id = %id))
}

pub async fn message_recipients(pool: &PgPool, id: Uuid) -> sqlx::Result<Vec<MessageRecipient>> {
    sqlx::query_as::<_, MessageRecipient>(
        r"
        SELECT r.recipient_id, u.username, r.read, r.read_date
        FROM message_recipients r
        JOIN users u ON u.id = r.recipient_id
        WHERE r.message_id = $1
        ORDER BY u.username
        ",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("message_recipients", message_id = %id))
}

pub async fn insert_message(
    conn: &mut PgConnection,
    body: &CreateMessageRequest,
    sender: Uuid,
) -> sqlx::Result<Message> {
    sqlx::query_as::<_, Message>(
        r"
        INSERT INTO messages (subject, content, sender_id, is_draft)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(&body.subject)
    .bind(&body.content)
    .bind(sender)
    .bind(body.is_draft)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_message", sender = %sender))
}

/// Replace the recipient list. Unknown user ids are skipped.
pub async fn set_message_recipients(
    conn: &mut PgConnection,
    id: Uuid,
    user_ids: &[Uuid],
) -> sqlx::Result<u64> {
    sqlx::query("DELETE FROM message_recipients WHERE message_id = $1 AND NOT (recipient_id = ANY($2))")
        .bind(id)
        .bind(user_ids)
        .execute(&mut *conn)
        .await
        .map_err(db_error!("set_message_recipients", message_id = %id))?;

    let result = sqlx::query(
        r"
        INSERT INTO message_recipients (message_id, recipient_id)
        SELECT $1, u.id FROM users u WHERE u.id = ANY($2)
        ON CONFLICT (message_id, recipient_id) DO NOTHING
        ",
    )
    .bind(id)
    .bind(user_ids)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("set_message_recipients", message_id = %id))?;
    Ok(result.rows_affected())
}

/// Persist edits. `send` stamps the send date of a draft going out.
pub async fn save_message(conn: &mut PgConnection, message: &Message, send: bool) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE messages SET
            subject = $2, content = $3, is_draft = $4,
            send_date = CASE WHEN $5 THEN NOW() ELSE send_date END,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(message.id)
    .bind(&message.subject)
    .bind(&message.content)
    .bind(message.is_draft)
    .bind(send)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("save_message", message_id = %message.id))?;
    Ok(())
}

pub async fn delete_message(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM messages WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_message", message_id = %id))?;
    Ok(result.rows_affected() > 0)
}

/// Mark read for `user`. Returns false when `user` is not a recipient.
pub async fn mark_message_read(pool: &PgPool, id: Uuid, user: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE message_recipients
        SET read = TRUE, read_date = COALESCE(read_date, NOW())
        WHERE message_id = $1 AND recipient_id = $2
        ",
    )
    .bind(id)
    .bind(user)
    .execute(pool)
    .await
    .map_err(db_error!("mark_message_read", message_id = %id, user_id = %user))?;
    Ok(result.rows_affected() > 0)
}

/// Set a recipient flag. Returns false when `user` is not a recipient.
pub async fn set_mailbox_flag(
    pool: &PgPool,
    id: Uuid,
    user: Uuid,
    flag: MailboxFlag,
    value: bool,
) -> sqlx::Result<bool> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE message_recipients SET ");
    builder
        .push(flag.column())
        .push(" = ")
        .push_bind(value)
        .push(" WHERE message_id = ")
        .push_bind(id)
        .push(" AND recipient_id = ")
        .push_bind(user);

    let result = builder
        .build()
        .execute(pool)
        .await
        .map_err(db_error!("set_mailbox_flag", message_id = %id, flag = flag.column()))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Calendars
// ============================================================================

fn calendar_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(
        r"
        SELECT c.*,
            (SELECT COUNT(*) FROM calendar_events ce WHERE ce.calendar_id = c.id) AS events_count,
            COUNT(*) OVER() AS total_count
        FROM calendars c
        WHERE 1=1",
    )
}

pub async fn list_calendars(
    pool: &PgPool,
    query: &CalendarQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<CalendarResponse>>> {
    let mut builder = calendar_select();
    if let Some(calendar_type) = query.calendar_type {
        builder.push(" AND c.calendar_type = ").push_bind(calendar_type);
    }
    if let Some(year) = query.year {
        builder.push(" AND c.year = ").push_bind(year);
    }
    push_search(&mut builder, &["c.title", "c.description"], query.search.as_deref());
    builder.push(" ORDER BY c.year DESC, c.start_date");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_calendars"))
}

pub async fn find_calendar(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Calendar>> {
    sqlx::query_as::<_, Calendar>("SELECT * FROM calendars WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_calendar", calendar_id = %id))
}

pub async fn find_calendar_response(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<CalendarResponse>> {
    let mut builder = calendar_select();
    builder.push(" AND c.id = ").push_bind(id);
    builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_calendar_response", calendar_id = %id))
}

pub async fn insert_calendar(
    pool: &PgPool,
    body: &CreateCalendarRequest,
    created_by: Uuid,
) -> sqlx::Result<Calendar> {
    sqlx::query_as::<_, Calendar>(
        r"
        INSERT INTO calendars (title, description, calendar_type, year, start_date, end_date, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.calendar_type)
    .bind(body.year)
    .bind(body.start_date)
    .bind(body.end_date)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_calendar", title = %body.title))
}

pub async fn save_calendar(pool: &PgPool, calendar: &Calendar) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE calendars SET
            title = $2, description = $3, calendar_type = $4, year = $5,
            start_date = $6, end_date = $7, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(calendar.id)
    .bind(&calendar.title)
    .bind(&calendar.description)
    .bind(calendar.calendar_type)
    .bind(calendar.year)
    .bind(calendar.start_date)
    .bind(calendar.end_date)
    .execute(pool)
    .await
    .map_err(db_error!("save_calendar", calendar_id = %calendar.id))?;
    Ok(())
}

pub async fn delete_calendar(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM calendars WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_calendar", calendar_id = %id))?;
    Ok(result.rows_affected() > 0)
}

pub async fn calendar_has_event(pool: &PgPool, calendar_id: Uuid, event_id: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM calendar_events WHERE calendar_id = $1 AND event_id = $2)",
    )
    .bind(calendar_id)
    .bind(event_id)
    .fetch_one(pool)
    .await
    .map_err(db_error!("calendar_has_event", calendar_id = %calendar_id, event_id = %event_id))
}

pub async fn insert_calendar_event(
    pool: &PgPool,
    calendar_id: Uuid,
    body: &AddCalendarEventRequest,
) -> sqlx::Result<CalendarEvent> {
    sqlx::query_as::<_, CalendarEvent>(
        r"
        INSERT INTO calendar_events (calendar_id, event_id, notes, is_highlighted)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(calendar_id)
    .bind(body.event_id)
    .bind(&body.notes)
    .bind(body.is_highlighted)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_calendar_event", calendar_id = %calendar_id, event_id = %body.event_id))
}

/// Events on a calendar visible under `max_degree`, in date order.
pub async fn list_calendar_entries(
    pool: &PgPool,
    calendar_id: Uuid,
    max_degree: Option<i16>,
) -> sqlx::Result<Vec<CalendarEntry>> {
    sqlx::query_as::<_, CalendarEntry>(
        r"
        SELECT e.*, ce.id AS entry_id, ce.notes, ce.is_highlighted
        FROM calendar_events ce
        JOIN events e ON e.id = ce.event_id
        WHERE ce.calendar_id = $1 AND ($2::smallint IS NULL OR e.required_degree <= $2)
        ORDER BY e.date, e.start_time
        ",
    )
    .bind(calendar_id)
    .bind(max_degree)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_calendar_entries", calendar_id = %calendar_id))
}
