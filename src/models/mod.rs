use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

mod url_preview;

pub use url_preview::UrlPreviewDto;

// ============================================================================
// Response Envelope
// ============================================================================

/// Success envelope for task endpoints: `{ "success": true, "data": ... }`.
///
/// Error responses use the matching `{ "success": false, "error": ... }`
/// shape produced by `AppError::into_response`.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        DataEnvelope {
            success: true,
            data,
        }
    }
}

// ============================================================================
// Task Models
// ============================================================================

/// Database row, serialized as-is (snake_case) in API responses; the
/// frontend maps `start_date`/`deadline` back into its own camelCase shape.
///
/// `start_date` and `deadline` hold the client's `datetime-local` strings
/// verbatim; they carry no timezone and are never interpreted server-side.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub importance: i16,
    pub urgency: i16,
    pub start_date: Option<String>,
    pub deadline: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Importance/urgency pair as sent by the client, 1–5 each.
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct TaskScores {
    #[validate(range(min = 1, max = 5, message = "Importance must be between 1 and 5"))]
    pub importance: i16,
    #[validate(range(min = 1, max = 5, message = "Urgency must be between 1 and 5"))]
    pub urgency: i16,
}

/// Request body for POST /api/tasks. The wire format is camelCase with the
/// scores nested, matching the frontend's `createTask` payload.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub scores: TaskScores,
    pub start_date: Option<String>,
    pub deadline: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Request body for PUT /api/tasks/:id. Absent fields are left unchanged;
/// an empty string for `description`/`startDate`/`deadline` clears the field.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub scores: Option<TaskScores>,
    pub start_date: Option<String>,
    pub deadline: Option<String>,
    pub completed: Option<bool>,
}
