use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{CreateTaskRequest, DataEnvelope, Task, UpdateTaskRequest},
    state::AppState,
};

// ============================================================================
// Helpers
// ============================================================================

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::Validation(
        e.field_errors()
            .values()
            .flat_map(|v| v.iter())
            .filter_map(|e| e.message.as_ref())
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// The frontend sends "" to clear a nullable text field.
fn none_if_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Fetch a task row, returning 404 if it does not exist.
async fn fetch_task(pool: &sqlx::PgPool, task_id: Uuid) -> AppResult<Task> {
    sqlx::query_as::<_, Task>(
        "SELECT id, title, description, importance, urgency, start_date, deadline,
                completed, created_at, updated_at
         FROM tasks WHERE id = $1",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Task not found".into()))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/tasks: all tasks, newest first.
pub async fn list_tasks(
    State(state): State<AppState>,
) -> AppResult<Json<DataEnvelope<Vec<Task>>>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT id, title, description, importance, urgency, start_date, deadline,
                completed, created_at, updated_at
         FROM tasks
         ORDER BY created_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(DataEnvelope::new(tasks)))
}

/// POST /api/tasks: create a task.
pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<DataEnvelope<Task>>)> {
    req.validate().map_err(validation_error)?;
    req.scores.validate().map_err(validation_error)?;

    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (title, description, importance, urgency, start_date, deadline, completed)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id, title, description, importance, urgency, start_date, deadline,
                   completed, created_at, updated_at",
    )
    .bind(&req.title)
    .bind(req.description.and_then(none_if_empty))
    .bind(req.scores.importance)
    .bind(req.scores.urgency)
    .bind(req.start_date.and_then(none_if_empty))
    .bind(req.deadline.and_then(none_if_empty))
    .bind(req.completed)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(DataEnvelope::new(task))))
}

/// PUT /api/tasks/:id: partial update; absent fields keep their value.
pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> AppResult<Json<DataEnvelope<Task>>> {
    req.validate().map_err(validation_error)?;
    if let Some(scores) = &req.scores {
        scores.validate().map_err(validation_error)?;
    }

    let current = fetch_task(&state.pool, task_id).await?;

    // Merge in Rust rather than COALESCE in SQL: an empty string must clear
    // a nullable field, which COALESCE cannot express.
    let title = req.title.unwrap_or(current.title);
    let description = match req.description {
        Some(d) => none_if_empty(d),
        None => current.description,
    };
    let (importance, urgency) = match req.scores {
        Some(s) => (s.importance, s.urgency),
        None => (current.importance, current.urgency),
    };
    let start_date = match req.start_date {
        Some(d) => none_if_empty(d),
        None => current.start_date,
    };
    let deadline = match req.deadline {
        Some(d) => none_if_empty(d),
        None => current.deadline,
    };
    let completed = req.completed.unwrap_or(current.completed);

    let task = sqlx::query_as::<_, Task>(
        "UPDATE tasks
         SET title = $1, description = $2, importance = $3, urgency = $4,
             start_date = $5, deadline = $6, completed = $7, updated_at = NOW()
         WHERE id = $8
         RETURNING id, title, description, importance, urgency, start_date, deadline,
                   completed, created_at, updated_at",
    )
    .bind(&title)
    .bind(&description)
    .bind(importance)
    .bind(urgency)
    .bind(&start_date)
    .bind(&deadline)
    .bind(completed)
    .bind(task_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(DataEnvelope::new(task)))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".into()));
    }

    Ok(Json(json!({ "success": true })))
}

/// PATCH /api/tasks/:id/toggle: atomically flip the completed flag.
pub async fn toggle_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<DataEnvelope<Task>>> {
    let task = sqlx::query_as::<_, Task>(
        "UPDATE tasks
         SET completed = NOT completed, updated_at = NOW()
         WHERE id = $1
         RETURNING id, title, description, importance, urgency, start_date, deadline,
                   completed, created_at, updated_at",
    )
    .bind(task_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    Ok(Json(DataEnvelope::new(task)))
}
