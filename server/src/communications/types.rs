//! Communications request and response types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::notify::NotificationType;
use crate::util::deserialize_double_option;

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum EventType {
    #[default]
    Tenida,
    Instruction,
    Ceremony,
    Social,
    Administrative,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Scheduled,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "19:30:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    pub location: String,
    pub is_virtual: bool,
    pub virtual_link: String,
    pub event_type: EventType,
    pub required_degree: i16,
    pub status: EventStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Event with the number of members marked present.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct EventResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub event: Event,
    pub attendance_count: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub location: String,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub virtual_link: String,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default = "default_degree")]
    #[validate(range(min = 1, max = 3))]
    pub required_degree: i16,
}

const fn default_degree() -> i16 {
    1
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<String>)]
    pub end_time: Option<Option<NaiveTime>>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub is_virtual: Option<bool>,
    #[validate(length(max = 500))]
    pub virtual_link: Option<String>,
    pub event_type: Option<EventType>,
    #[validate(range(min = 1, max = 3))]
    pub required_degree: Option<i16>,
    pub status: Option<EventStatus>,
}

impl UpdateEventRequest {
    pub fn apply(self, event: &mut Event) {
        if let Some(v) = self.title {
            event.title = v;
        }
        if let Some(v) = self.description {
            event.description = v;
        }
        if let Some(v) = self.date {
            event.date = v;
        }
        if let Some(v) = self.start_time {
            event.start_time = v;
        }
        if let Some(v) = self.end_time {
            event.end_time = v;
        }
        if let Some(v) = self.location {
            event.location = v;
        }
        if let Some(v) = self.is_virtual {
            event.is_virtual = v;
        }
        if let Some(v) = self.virtual_link {
            event.virtual_link = v;
        }
        if let Some(v) = self.event_type {
            event.event_type = v;
        }
        if let Some(v) = self.required_degree {
            event.required_degree = v;
        }
        if let Some(v) = self.status {
            event.status = v;
        }
    }
}

/// An event must not end before it starts.
pub fn check_event_times(start: NaiveTime, end: Option<NaiveTime>) -> Result<(), String> {
    match end {
        Some(end) if end < start => Err("end_time must not be before start_time".to_string()),
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct EventQuery {
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
    pub required_degree: Option<i16>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    /// Scheduled events from today on.
    pub upcoming: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, FromRow)]
pub struct AttendeeRow {
    pub id: Uuid,
    pub username: String,
    pub symbolic_name: String,
    pub first_name: String,
    pub last_name: String,
    pub degree: i16,
    pub is_present: bool,
    pub excuse: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Attendee {
    pub id: Uuid,
    pub username: String,
    pub symbolic_name: String,
    pub full_name: String,
    pub degree: i16,
    pub is_present: bool,
    /// Null for members marked present.
    pub excuse: Option<String>,
}

impl From<AttendeeRow> for Attendee {
    fn from(row: AttendeeRow) -> Self {
        let full_name = format!("{} {}", row.first_name, row.last_name).trim().to_string();
        Self {
            id: row.id,
            username: row.username,
            symbolic_name: row.symbolic_name,
            full_name,
            degree: row.degree,
            is_present: row.is_present,
            excuse: (!row.is_present).then_some(row.excuse),
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub notification_type: NotificationType,
    pub event_id: Option<Uuid>,
    pub send_date: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Notification with delivery statistics and the caller's read flag.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct NotificationResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub notification: Notification,
    pub recipients_count: i64,
    pub read_count: i64,
    /// `None` when the caller is not a recipient.
    pub read: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub notification_type: NotificationType,
    pub event_id: Option<Uuid>,
    pub expiry_date: Option<DateTime<Utc>>,
    /// Recipient user ids. Unknown ids are skipped.
    #[serde(default)]
    pub recipients: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateNotificationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    pub notification_type: Option<NotificationType>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub expiry_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateNotificationRequest {
    pub fn apply(self, notification: &mut Notification) {
        if let Some(v) = self.title {
            notification.title = v;
        }
        if let Some(v) = self.content {
            notification.content = v;
        }
        if let Some(v) = self.notification_type {
            notification.notification_type = v;
        }
        if let Some(v) = self.expiry_date {
            notification.expiry_date = v;
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NotificationQuery {
    /// Only notifications delivered to the caller. Defaults to true for
    /// non-staff users.
    pub received: Option<bool>,
    pub notification_type: Option<NotificationType>,
    pub event_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub unread: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub subject: String,
    pub content: String,
    pub sender_id: Uuid,
    pub send_date: DateTime<Utc>,
    pub is_draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Message with the caller's mailbox flags. Flags are `None` for the sender.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct MessageResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub message: Message,
    pub sender_name: String,
    pub recipients_count: i64,
    pub read: Option<bool>,
    pub archived: Option<bool>,
    pub starred: Option<bool>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct MessageRecipient {
    pub recipient_id: Uuid,
    pub username: String,
    pub read: bool,
    pub read_date: Option<DateTime<Utc>>,
}

/// Single message with its recipient list.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageDetail {
    #[serde(flatten)]
    pub message: MessageResponse,
    pub recipients: Vec<MessageRecipient>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMessageRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub recipients: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMessageRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    /// Setting a draft to `false` sends it.
    pub is_draft: Option<bool>,
    /// Replaces the recipient list.
    pub recipients: Option<Vec<Uuid>>,
}

impl UpdateMessageRequest {
    /// Apply scalar fields. Returns whether a draft is being sent.
    pub fn apply(&mut self, message: &mut Message) -> bool {
        if let Some(v) = self.subject.take() {
            message.subject = v;
        }
        if let Some(v) = self.content.take() {
            message.content = v;
        }
        let sending = message.is_draft && self.is_draft == Some(false);
        if let Some(v) = self.is_draft {
            message.is_draft = v;
        }
        sending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InboxType {
    Sent,
    Received,
    Drafts,
    Archived,
    Starred,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MessageQuery {
    pub inbox_type: Option<InboxType>,
    pub unread: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Recipient-side mailbox flag toggled by the star/archive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxFlag {
    Starred,
    Archived,
}

impl MailboxFlag {
    pub const fn column(self) -> &'static str {
        match self {
            Self::Starred => "starred",
            Self::Archived => "archived",
        }
    }
}

// ============================================================================
// Calendars
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum CalendarType {
    #[default]
    Regular,
    Ritual,
    Administrative,
    Special,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Calendar {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub calendar_type: CalendarType,
    pub year: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CalendarResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub calendar: Calendar,
    pub events_count: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCalendarRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub calendar_type: CalendarType,
    #[validate(range(min = 1900, max = 2200))]
    pub year: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCalendarRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub calendar_type: Option<CalendarType>,
    #[validate(range(min = 1900, max = 2200))]
    pub year: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl UpdateCalendarRequest {
    pub fn apply(self, calendar: &mut Calendar) {
        if let Some(v) = self.title {
            calendar.title = v;
        }
        if let Some(v) = self.description {
            calendar.description = v;
        }
        if let Some(v) = self.calendar_type {
            calendar.calendar_type = v;
        }
        if let Some(v) = self.year {
            calendar.year = v;
        }
        if let Some(v) = self.start_date {
            calendar.start_date = v;
        }
        if let Some(v) = self.end_date {
            calendar.end_date = v;
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CalendarQuery {
    pub calendar_type: Option<CalendarType>,
    pub year: Option<i32>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub calendar_id: Uuid,
    pub event_id: Uuid,
    pub notes: String,
    pub is_highlighted: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCalendarEventRequest {
    pub event_id: Uuid,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_highlighted: bool,
}

/// An event as placed on a calendar.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CalendarEntry {
    pub entry_id: Uuid,
    pub notes: String,
    pub is_highlighted: bool,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub event: Event,
}
