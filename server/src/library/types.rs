//! Library request and response types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::util::deserialize_double_option;

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DocumentCategory {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub parent_id: Option<Uuid>,
    pub required_degree: i16,
    pub order: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CategoryResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub category: DocumentCategory,
    /// Ancestor names joined with " > ".
    pub full_path: String,
    pub created_by_name: Option<String>,
    pub subcategories_count: i64,
    pub documents_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: CategoryResponse,
    pub subcategories: Vec<CategoryResponse>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parent_id: Option<Uuid>,
    #[serde(default = "default_degree")]
    #[validate(range(min = 1, max = 3))]
    pub required_degree: i16,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub order: i32,
}

const fn default_degree() -> i16 {
    1
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub parent_id: Option<Option<Uuid>>,
    #[validate(range(min = 1, max = 3))]
    pub required_degree: Option<i16>,
    #[validate(range(min = 0))]
    pub order: Option<i32>,
}

impl UpdateCategoryRequest {
    pub fn apply(self, category: &mut DocumentCategory) {
        if let Some(v) = self.name {
            category.name = v;
        }
        if let Some(v) = self.description {
            category.description = v;
        }
        if let Some(v) = self.parent_id {
            category.parent_id = v;
        }
        if let Some(v) = self.required_degree {
            category.required_degree = v;
        }
        if let Some(v) = self.order {
            category.order = v;
        }
    }
}

/// Degree a subcategory ends up with: never below its parent's.
#[must_use]
pub fn inherited_degree(requested: i16, parent_degree: Option<i16>) -> i16 {
    parent_degree.map_or(requested, |parent| requested.max(parent))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CategoryQuery {
    /// Parent category id, or `null` for root categories.
    pub parent_id: Option<String>,
    pub required_degree: Option<i16>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Parsed `parent_id` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentFilter {
    Roots,
    Parent(Uuid),
}

impl ParentFilter {
    pub fn parse(raw: Option<&str>) -> Result<Option<Self>, String> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some("null") => Ok(Some(Self::Roots)),
            Some(id) => Uuid::parse_str(id)
                .map(|id| Some(Self::Parent(id)))
                .map_err(|_| format!("invalid parent_id: {id}")),
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum DocumentType {
    Book,
    Article,
    Lecture,
    Ritual,
    Constitution,
    Regulation,
    History,
    Symbolism,
    #[default]
    Other,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub document_type: DocumentType,
    /// Stored file reference (path or URL).
    pub file: String,
    pub author: String,
    pub publication_date: Option<NaiveDate>,
    pub language: String,
    pub pages: Option<i32>,
    pub required_degree: i16,
    /// Comma separated.
    pub tags: String,
    pub is_public: bool,
    pub is_featured: bool,
    pub view_count: i32,
    pub download_count: i32,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DocumentResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub document: Document,
    pub category_name: Option<String>,
    pub uploaded_by_name: Option<String>,
    /// 0 when unrated.
    pub average_rating: f64,
    pub ratings_count: i64,
    pub comments_count: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDocumentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub document_type: DocumentType,
    #[validate(length(min = 1))]
    pub file: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub author: String,
    pub publication_date: Option<NaiveDate>,
    #[serde(default = "default_language")]
    #[validate(length(min = 2, max = 10))]
    pub language: String,
    #[validate(range(min = 1))]
    pub pages: Option<i32>,
    #[serde(default = "default_degree")]
    #[validate(range(min = 1, max = 3))]
    pub required_degree: i16,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_featured: bool,
}

fn default_language() -> String {
    "es".to_string()
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateDocumentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub category_id: Option<Option<Uuid>>,
    pub document_type: Option<DocumentType>,
    #[validate(length(min = 1))]
    pub file: Option<String>,
    #[validate(length(max = 200))]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub publication_date: Option<Option<NaiveDate>>,
    #[validate(length(min = 2, max = 10))]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<i32>)]
    pub pages: Option<Option<i32>>,
    #[validate(range(min = 1, max = 3))]
    pub required_degree: Option<i16>,
    pub tags: Option<String>,
    pub is_public: Option<bool>,
    pub is_featured: Option<bool>,
}

impl UpdateDocumentRequest {
    pub fn apply(self, doc: &mut Document) {
        if let Some(v) = self.title {
            doc.title = v;
        }
        if let Some(v) = self.description {
            doc.description = v;
        }
        if let Some(v) = self.category_id {
            doc.category_id = v;
        }
        if let Some(v) = self.document_type {
            doc.document_type = v;
        }
        if let Some(v) = self.file {
            doc.file = v;
        }
        if let Some(v) = self.author {
            doc.author = v;
        }
        if let Some(v) = self.publication_date {
            doc.publication_date = v;
        }
        if let Some(v) = self.language {
            doc.language = v;
        }
        if let Some(v) = self.pages {
            doc.pages = v.filter(|p| *p > 0);
        }
        if let Some(v) = self.required_degree {
            doc.required_degree = v;
        }
        if let Some(v) = self.tags {
            doc.tags = v;
        }
        if let Some(v) = self.is_public {
            doc.is_public = v;
        }
        if let Some(v) = self.is_featured {
            doc.is_featured = v;
        }
    }
}

/// Sort order for document lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub enum DocumentOrder {
    #[serde(rename = "rating")]
    Rating,
    #[serde(rename = "views")]
    Views,
    #[serde(rename = "downloads")]
    Downloads,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "created_at")]
    Oldest,
    #[default]
    #[serde(rename = "-created_at")]
    Newest,
}

impl DocumentOrder {
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Rating => "average_rating DESC, d.created_at DESC",
            Self::Views => "d.view_count DESC",
            Self::Downloads => "d.download_count DESC",
            Self::Title => "d.title",
            Self::Oldest => "d.created_at",
            Self::Newest => "d.created_at DESC",
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DocumentQuery {
    pub category_id: Option<Uuid>,
    pub document_type: Option<DocumentType>,
    pub required_degree: Option<i16>,
    pub is_public: Option<bool>,
    pub is_featured: Option<bool>,
    pub search: Option<String>,
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub order_by: DocumentOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DownloadResponse {
    pub status: &'static str,
    pub download_url: String,
}

// ============================================================================
// Access log
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AccessType {
    View,
    Download,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DocumentAccess {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub access_type: AccessType,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub access_date: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AccessQuery {
    pub document_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub access_type: Option<AccessType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Comments and ratings
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DocumentComment {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommentRequest {
    /// Required on `comments/`; taken from the path on `add_comment`.
    pub document_id: Option<Uuid>,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DocumentRating {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rating body. Kept as raw JSON so non-integers are rejected with 400.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RateRequest {
    pub document_id: Option<Uuid>,
    #[schema(value_type = i16, minimum = 1, maximum = 5)]
    pub rating: serde_json::Value,
}

impl RateRequest {
    /// The rating as a whole number in 1-5.
    pub fn stars(&self) -> Option<i16> {
        parse_stars(&self.rating)
    }
}

pub fn parse_stars(value: &serde_json::Value) -> Option<i16> {
    value
        .as_i64()
        .filter(|v| (1..=5).contains(v))
        .and_then(|v| i16::try_from(v).ok())
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FeedbackQuery {
    pub document_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_subcategory_degree_follows_parent() {
        assert_eq!(inherited_degree(1, Some(3)), 3);
        assert_eq!(inherited_degree(3, Some(2)), 3);
        assert_eq!(inherited_degree(2, None), 2);
    }

    #[test]
    fn test_parent_filter() {
        assert_eq!(ParentFilter::parse(None), Ok(None));
        assert_eq!(ParentFilter::parse(Some("null")), Ok(Some(ParentFilter::Roots)));
        let id = Uuid::new_v4();
        assert_eq!(
            ParentFilter::parse(Some(&id.to_string())),
            Ok(Some(ParentFilter::Parent(id)))
        );
        assert!(ParentFilter::parse(Some("root")).is_err());
    }

    #[test]
    fn test_rating_must_be_integer_in_range() {
        assert_eq!(parse_stars(&json!(4)), Some(4));
        assert_eq!(parse_stars(&json!(0)), None);
        assert_eq!(parse_stars(&json!(6)), None);
        assert_eq!(parse_stars(&json!(3.5)), None);
        assert_eq!(parse_stars(&json!("5")), None);
        assert_eq!(parse_stars(&json!(null)), None);
    }

    #[test]
    fn test_order_by_wire_names() {
        let order: DocumentOrder = serde_json::from_str("\"-created_at\"").unwrap();
        assert_eq!(order, DocumentOrder::Newest);
        let order: DocumentOrder = serde_json::from_str("\"rating\"").unwrap();
        assert_eq!(order.sql(), "average_rating DESC, d.created_at DESC");
    }
}
