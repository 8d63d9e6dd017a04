//! Handlers for `/notes` endpoints. Every route is scoped to the bearer's
//! own notes; another user's id looks exactly like a missing one.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/notes`      | Newest first |
//! | `POST`   | `/notes`      | Body: `{"title", "content", "imageUrl"?}`; server assigns the id |
//! | `GET`    | `/notes/{id}` | 404 if not found |
//! | `PUT`    | `/notes/{id}` | 404 if not found |
//! | `DELETE` | `/notes/{id}` | Always 204 |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use notekeep_core::{
  note::{Note, NoteDraft, SyncState},
  store::NoteCache,
  wire::{NoteDto, NoteRequest},
};

use crate::{
  AppState, ServerStore,
  auth::CurrentUser,
  error::{ApiError, store_error},
};

fn not_found() -> ApiError { ApiError::NotFound("note not found".into()) }

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /notes`
pub async fn list<S: ServerStore>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<NoteDto>>, ApiError> {
  let notes = NoteCache::list_notes(&*state.store, user.id)
    .await
    .map_err(store_error)?;
  Ok(Json(notes.iter().map(NoteDto::from).collect()))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /notes/{id}`
pub async fn get_one<S: ServerStore>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<NoteDto>, ApiError> {
  let note = NoteCache::get_note(&*state.store, &id, user.id)
    .await
    .map_err(store_error)?
    .ok_or_else(not_found)?;
  Ok(Json(NoteDto::from(&note)))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /notes`
pub async fn create<S: ServerStore>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  body: Result<Json<NoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = body?;
  let draft = NoteDraft::from(body).validated()?;
  let note = Note::create(user.id, draft, SyncState::Synced);

  state.store.put_note(note.clone()).await.map_err(store_error)?;
  tracing::info!(user_id = user.id, note_id = %note.id, "created note");
  Ok((StatusCode::CREATED, Json(NoteDto::from(&note))))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /notes/{id}`
pub async fn update<S: ServerStore>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
  body: Result<Json<NoteRequest>, JsonRejection>,
) -> Result<Json<NoteDto>, ApiError> {
  let Json(body) = body?;
  let draft = NoteDraft::from(body).validated()?;

  let note = state
    .store
    .edit_note(&id, user.id, draft)
    .await
    .map_err(store_error)?
    .ok_or_else(not_found)?;
  Ok(Json(NoteDto::from(&note)))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /notes/{id}`
pub async fn delete_one<S: ServerStore>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  let removed = NoteCache::remove_note(&*state.store, &id, user.id)
    .await
    .map_err(store_error)?;
  if removed {
    tracing::info!(user_id = user.id, note_id = %id, "deleted note");
  }
  Ok(StatusCode::NO_CONTENT)
}
