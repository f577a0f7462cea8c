//! Shared utility functions

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Postgres, QueryBuilder, Row};

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 20;
/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Format file size in human-readable units
///
/// # Examples
///
/// ```
/// use lodge_server::util::format_file_size;
///
/// assert_eq!(format_file_size(512), "512 bytes");
/// assert_eq!(format_file_size(2048), "2KB");
/// assert_eq!(format_file_size(5 * 1024 * 1024), "5.0MB");
/// ```
pub fn format_file_size(bytes: i64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{}KB", bytes / 1024)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the socket.
pub fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| s.parse::<std::net::IpAddr>().is_ok());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    let real_ip = headers
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| s.parse::<std::net::IpAddr>().is_ok());
    if let Some(ip) = real_ip {
        return Some(ip.to_string());
    }

    connect_info.map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// User agent with control characters removed, truncated to 512 chars.
pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|s| {
            s.chars()
                .filter(|c| !c.is_control() || c.is_whitespace())
                .take(512)
                .collect()
        })
}

/// Caller address and user agent, for sessions and audit rows.
///
/// Never rejects: both fields are `None` when unavailable.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        Ok(Self {
            ip: client_ip(&parts.headers, connect_info),
            user_agent: user_agent(&parts.headers),
        })
    }
}

/// Clamp client pagination to `(limit, offset)`.
#[must_use]
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}

/// Escape ILIKE pattern metacharacters and wrap in `%...%`.
#[must_use]
pub fn contains_pattern(input: &str) -> String {
    let escaped = input
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Push ` AND (col1 ILIKE $n OR col2 ILIKE $n ...)` for a non-empty search.
pub fn push_search(builder: &mut QueryBuilder<'_, Postgres>, columns: &[&str], search: Option<&str>) {
    let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) else {
        return;
    };
    let pattern = contains_pattern(term);

    builder.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push(*column).push(" ILIKE ").push_bind(pattern.clone());
    }
    builder.push(")");
}

/// Append ` AND column >= from AND column <= to` for present bounds.
pub fn push_date_range(
    builder: &mut QueryBuilder<'_, Postgres>,
    column: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) {
    if let Some(from) = from {
        builder.push(" AND ").push(column).push(" >= ").push_bind(from);
    }
    if let Some(to) = to {
        builder.push(" AND ").push(column).push(" <= ").push_bind(to);
    }
}

/// Append ` LIMIT $n OFFSET $m`.
pub fn push_page(builder: &mut QueryBuilder<'_, Postgres>, limit: i64, offset: i64) {
    builder.push(" LIMIT ").push_bind(limit);
    builder.push(" OFFSET ").push_bind(offset);
}

/// A row selected together with `COUNT(*) OVER() AS total_count`.
#[derive(Debug)]
pub struct Counted<T> {
    pub item: T,
    pub total_count: i64,
}

impl<'r, T> FromRow<'r, PgRow> for Counted<T>
where
    T: FromRow<'r, PgRow>,
{
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            item: T::from_row(row)?,
            total_count: row.try_get("total_count")?,
        })
    }
}

/// Paginated list response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    /// Build a page from rows carrying a window-function total.
    #[must_use]
    pub fn from_counted(rows: Vec<Counted<T>>, limit: i64, offset: i64) -> Self {
        let total = rows.first().map_or(0, |r| r.total_count);
        Self {
            items: rows.into_iter().map(|r| r.item).collect(),
            total,
            limit,
            offset,
        }
    }

    /// Transform every item, keeping the paging fields.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use with `#[serde(default, deserialize_with = "deserialize_double_option")]`.
#[allow(clippy::option_option)]
pub fn deserialize_double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Truncate to at most `max` characters, appending "..." when cut.
#[must_use]
pub fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 bytes");
        assert_eq!(format_file_size(1023), "1023 bytes");
        assert_eq!(format_file_size(2048), "2KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.0GB");
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let socket = ConnectInfo("127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(client_ip(&headers, Some(&socket)).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_ignores_garbage_and_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("not-an-ip"));
        let socket = ConnectInfo("192.168.1.5:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(client_ip(&headers, Some(&socket)).as_deref(), Some("192.168.1.5"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_user_agent_strips_control_characters() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0\tX"));
        assert_eq!(user_agent(&headers).as_deref(), Some("Mozilla/5.0\tX"));
        assert_eq!(user_agent(&HeaderMap::new()), None);
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page_bounds(Some(0), Some(-5)), (1, 0));
        assert_eq!(page_bounds(Some(1000), Some(40)), (MAX_PAGE_SIZE, 40));
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(" 50%_off "), "%50\\%\\_off%");
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("corto", 10), "corto");
        assert_eq!(ellipsize("áéíóú", 3), "áéí...");
    }

    #[test]
    fn test_page_map_keeps_bounds() {
        let page = Page {
            items: vec![1, 2, 3],
            total: 10,
            limit: 3,
            offset: 3,
        }
        .map(|n| n * 2);
        assert_eq!(page.items, vec![2, 4, 6]);
        assert_eq!(page.total, 10);
    }
}
