//! Notes Service
//!
//! Small PostgreSQL-backed service exercising the transaction middleware.
//! `DELETE` handlers run inside the request transaction opened by the
//! middleware and reach it through the `PgBackend` request extension. On a
//! route the middleware does not cover, they open their own transaction.
//! The other handlers use the pool directly.
//!
//! Deleting a note first removes its tags, then the note. A locked note
//! answers `423 Locked` after its tags are already gone, so the response only
//! leaves the data intact because the middleware rolls the request back.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::backend::PgBackend;
use crate::db::Database;
use crate::error::BackendError;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("Note not found: {0}")]
    NotFound(i64),
    #[error("Note is locked: {0}")]
    RecordLocked(i64),
    #[error("Invalid note: {0}")]
    Invalid(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl NoteError {
    pub fn code(&self) -> &'static str {
        match self {
            NoteError::NotFound(_) => "NOTE_NOT_FOUND",
            NoteError::RecordLocked(_) => "RECORD_LOCKED",
            NoteError::Invalid(_) => "INVALID_NOTE",
            NoteError::Database(_) => "DATABASE_ERROR",
            NoteError::Backend(e) => e.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            NoteError::NotFound(_) => StatusCode::NOT_FOUND,
            NoteError::RecordLocked(_) => StatusCode::LOCKED,
            NoteError::Invalid(_) => StatusCode::BAD_REQUEST,
            NoteError::Database(_) | NoteError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    msg: String,
}

impl IntoResponse for NoteError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Notes request failed");
        }
        let body = ErrorBody {
            code: self.code(),
            msg: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub type NotesState = Arc<Database>;

/// Create the tables the service uses if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id BIGSERIAL PRIMARY KEY,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            locked BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS note_tags (
            note_id BIGINT NOT NULL REFERENCES notes (id),
            tag TEXT NOT NULL,
            PRIMARY KEY (note_id, tag)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Browser-facing routes.
pub fn web_routes() -> Router<NotesState> {
    Router::new()
        .route("/health", get(health))
        .route("/notes", get(list_notes))
        .route("/notes/{id}", get(get_note).delete(delete_note))
}

/// JSON API routes.
pub fn api_routes() -> Router<NotesState> {
    Router::new()
        .route("/api/v1/notes", get(list_notes).post(create_note))
        .route("/api/v1/notes/{id}", get(get_note).delete(delete_note))
        .route("/api/v1/notes/{id}/tags", get(list_tags))
}

async fn health(State(db): State<NotesState>) -> Result<StatusCode, NoteError> {
    db.health_check().await?;
    Ok(StatusCode::OK)
}

async fn list_notes(State(db): State<NotesState>) -> Result<Json<Vec<Note>>, NoteError> {
    let notes = sqlx::query_as::<_, Note>(
        "SELECT id, title, body, locked, created_at FROM notes ORDER BY id DESC LIMIT 100",
    )
    .fetch_all(db.pool())
    .await?;
    Ok(Json(notes))
}

async fn get_note(
    State(db): State<NotesState>,
    Path(id): Path<i64>,
) -> Result<Json<Note>, NoteError> {
    sqlx::query_as::<_, Note>(
        "SELECT id, title, body, locked, created_at FROM notes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db.pool())
    .await?
    .map(Json)
    .ok_or(NoteError::NotFound(id))
}

async fn list_tags(
    State(db): State<NotesState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<String>>, NoteError> {
    let tags = sqlx::query_scalar::<_, String>(
        "SELECT tag FROM note_tags WHERE note_id = $1 ORDER BY tag",
    )
    .bind(id)
    .fetch_all(db.pool())
    .await?;
    Ok(Json(tags))
}

async fn create_note(
    State(db): State<NotesState>,
    Json(new): Json<NewNote>,
) -> Result<(StatusCode, Json<Note>), NoteError> {
    if new.title.trim().is_empty() {
        return Err(NoteError::Invalid("title must not be empty".to_string()));
    }

    let mut tx = db.pool().begin().await?;

    let note = sqlx::query_as::<_, Note>(
        r#"
        INSERT INTO notes (title, body, locked)
        VALUES ($1, $2, $3)
        RETURNING id, title, body, locked, created_at
        "#,
    )
    .bind(&new.title)
    .bind(&new.body)
    .bind(new.locked)
    .fetch_one(&mut *tx)
    .await?;

    for tag in &new.tags {
        sqlx::query("INSERT INTO note_tags (note_id, tag) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(note.id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    debug!(note_id = note.id, tags = new.tags.len(), "Note created");
    Ok((StatusCode::CREATED, Json(note)))
}

async fn delete_note(
    State(db): State<NotesState>,
    request_tx: Option<Extension<PgBackend>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, NoteError> {
    let tags = match request_tx {
        Some(Extension(backend)) => {
            let mut guard = backend.lock().await;
            delete_note_in(guard.conn()?, id).await?
        }
        None => {
            // Route not covered by the middleware: own transaction.
            let mut tx = db.pool().begin().await?;
            let tags = delete_note_in(&mut tx, id).await?;
            tx.commit().await?;
            tags
        }
    };

    debug!(note_id = id, tags, "Note deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a note and its tags on `conn`. Returns the number of tags removed.
///
/// The tags go first, so a missing or locked note leaves work behind that
/// the caller's transaction must roll back.
async fn delete_note_in(conn: &mut PgConnection, id: i64) -> Result<u64, NoteError> {
    let tags = sqlx::query("DELETE FROM note_tags WHERE note_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let locked: Option<bool> =
        sqlx::query_scalar("SELECT locked FROM notes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    match locked {
        None => return Err(NoteError::NotFound(id)),
        Some(true) => return Err(NoteError::RecordLocked(id)),
        Some(false) => {}
    }

    sqlx::query("DELETE FROM notes WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(tags.rows_affected())
}
