//! [`ApiClient`]: the notekeep JSON API over reqwest.
//!
//! Failures are classified into the core error taxonomy. Transport failures
//! (connect, timeout, broken connection) become [`Error::Network`] and each
//! request is retried exactly once on them; every other failure comes back
//! on the first attempt.

use std::time::Duration;

use notekeep_core::{
  Error, Result,
  note::{Note, NoteDraft},
  store::{AuthRemote, NoteRemote},
  user::{AccessToken, User},
  wire::{
    ErrorBody, LoginRequest, LoginResponse, NoteDto, NoteRequest, RegisterRequest,
    RegisterResponse,
  },
};
use reqwest::{Client, Method, Response, StatusCode, header};
use serde::{Serialize, de::DeserializeOwned};

/// Ceiling for a whole request, connect through body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ATTEMPTS: u32 = 2;

/// Connection settings for the notekeep API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  /// Scheme, host and port, e.g. `http://localhost:5000`. Paths are
  /// appended as `{base_url}/api{path}`.
  pub base_url: String,
  pub timeout:  Duration,
}

impl ApiConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self { base_url: base_url.into(), timeout: DEFAULT_TIMEOUT }
  }
}

/// Async HTTP client for the notekeep JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

/// Which status table applies when a response is not a success.
#[derive(Clone, Copy)]
enum Endpoint {
  Login,
  Register,
  Notes,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;
    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_owned(),
    })
  }

  fn url(&self, path: &str) -> String { format!("{}/api{}", self.base_url, path) }

  async fn send(
    &self,
    method: Method,
    path: &str,
    token: Option<&AccessToken>,
    body: Option<Vec<u8>>,
  ) -> Result<Response> {
    let url = self.url(path);
    let mut attempt = 1;
    loop {
      tracing::debug!(%method, path, attempt, "request");

      let mut req = self.client.request(method.clone(), &url);
      if let Some(token) = token {
        req = req.bearer_auth(token.as_str());
      }
      if let Some(body) = &body {
        req = req
          .header(header::CONTENT_TYPE, "application/json")
          .body(body.clone());
      }

      match req.send().await {
        Ok(resp) => return Ok(resp),
        Err(e) => {
          let err = transport_error(&e);
          if err.is_retryable() && attempt < ATTEMPTS {
            tracing::warn!(%method, path, error = %err, "request failed, retrying");
            attempt += 1;
            continue;
          }
          return Err(err);
        }
      }
    }
  }

  async fn session(&self, endpoint: Endpoint, path: &str, subject: &str, body: Vec<u8>) -> Result<Response> {
    let resp = self.send(Method::POST, path, None, Some(body)).await?;
    if resp.status().is_success() {
      Ok(resp)
    } else {
      Err(rejection(resp, endpoint, subject).await)
    }
  }

  async fn notes_call(
    &self,
    method: Method,
    path: &str,
    token: &AccessToken,
    body: Option<Vec<u8>>,
  ) -> Result<Response> {
    let resp = self.send(method, path, Some(token), body).await?;
    if resp.status().is_success() {
      Ok(resp)
    } else {
      Err(rejection(resp, Endpoint::Notes, path).await)
    }
  }
}

// ─── Classification ───────────────────────────────────────────────────────────

fn transport_error(e: &reqwest::Error) -> Error {
  if e.is_builder() {
    Error::Internal(e.to_string())
  } else {
    Error::Network(e.to_string())
  }
}

async fn rejection(resp: Response, endpoint: Endpoint, subject: &str) -> Error {
  let status = resp.status();
  let text = resp.text().await.unwrap_or_default();
  let reason = serde_json::from_str::<ErrorBody>(&text)
    .map(|b| b.error)
    .ok()
    .or_else(|| status.canonical_reason().map(str::to_owned))
    .unwrap_or_else(|| status.to_string());

  match (endpoint, status.as_u16()) {
    (Endpoint::Login, 400 | 401 | 404) => Error::InvalidCredentials,
    (Endpoint::Register, 409) => Error::DuplicateEmail(subject.to_owned()),
    (Endpoint::Notes, 401) => Error::Unauthorized,
    (Endpoint::Notes, 404) => Error::NotFound(subject.to_owned()),
    (_, code) => Error::RemoteRejected { status: code, reason },
  }
}

fn json_body<T: Serialize>(value: &T) -> Result<Vec<u8>> {
  serde_json::to_vec(value).map_err(|e| Error::Internal(format!("encoding request: {e}")))
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
  let bytes = resp.bytes().await.map_err(|e| transport_error(&e))?;
  serde_json::from_slice(&bytes).map_err(|e| Error::Unknown(format!("undecodable response: {e}")))
}

fn note_path(id: &str) -> String { format!("/notes/{id}") }

// ─── AuthRemote impl ──────────────────────────────────────────────────────────

impl AuthRemote for ApiClient {
  /// `POST /api/auth/login`
  async fn login(&self, email: &str, password: &str) -> Result<(AccessToken, User)> {
    let body = json_body(&LoginRequest { email: email.to_owned(), password: password.to_owned() })?;
    let resp = self.session(Endpoint::Login, "/auth/login", email, body).await?;
    let parsed: LoginResponse = read_json(resp).await?;
    Ok((AccessToken::new(parsed.token), parsed.user.into_user()?))
  }

  /// `POST /api/auth/register`
  async fn register(&self, name: &str, email: &str, password: &str) -> Result<(AccessToken, User)> {
    let body = json_body(&RegisterRequest {
      name:     name.to_owned(),
      email:    email.to_owned(),
      password: password.to_owned(),
    })?;
    let resp = self.session(Endpoint::Register, "/auth/register", email, body).await?;
    let parsed: RegisterResponse = read_json(resp).await?;
    Ok((AccessToken::new(parsed.token), parsed.user.into_user()?))
  }
}

// ─── NoteRemote impl ──────────────────────────────────────────────────────────

impl NoteRemote for ApiClient {
  /// `GET /api/notes`
  async fn list_notes(&self, token: &AccessToken) -> Result<Vec<Note>> {
    let resp = self.notes_call(Method::GET, "/notes", token, None).await?;
    let dtos: Vec<NoteDto> = read_json(resp).await?;
    dtos.into_iter().map(NoteDto::into_note).collect()
  }

  /// `GET /api/notes/{id}`
  async fn get_note(&self, token: &AccessToken, id: &str) -> Result<Option<Note>> {
    let path = note_path(id);
    let resp = self.send(Method::GET, &path, Some(token), None).await?;
    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !resp.status().is_success() {
      return Err(rejection(resp, Endpoint::Notes, &path).await);
    }
    let dto: NoteDto = read_json(resp).await?;
    Ok(Some(dto.into_note()?))
  }

  /// `POST /api/notes`
  async fn create_note(&self, token: &AccessToken, draft: &NoteDraft) -> Result<Note> {
    let body = json_body(&NoteRequest::from(draft))?;
    let resp = self.notes_call(Method::POST, "/notes", token, Some(body)).await?;
    let dto: NoteDto = read_json(resp).await?;
    dto.into_note()
  }

  /// `PUT /api/notes/{id}`
  async fn update_note(&self, token: &AccessToken, id: &str, draft: &NoteDraft) -> Result<Note> {
    let body = json_body(&NoteRequest::from(draft))?;
    let resp = self.notes_call(Method::PUT, &note_path(id), token, Some(body)).await?;
    let dto: NoteDto = read_json(resp).await?;
    dto.into_note()
  }

  /// `DELETE /api/notes/{id}`
  async fn delete_note(&self, token: &AccessToken, id: &str) -> Result<()> {
    self.notes_call(Method::DELETE, &note_path(id), token, None).await?;
    Ok(())
  }
}
