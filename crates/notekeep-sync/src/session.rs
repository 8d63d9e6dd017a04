//! [`Coordinator`]: the session state machine in front of a [`NoteStore`].
//!
//! State moves `LoggedOut -> Authenticating -> LoggedIn | LoggedOut` and is
//! published on a `watch` channel; the coordinator is its only writer. The
//! most recent failure of any operation is published on a second channel.
//! An `Unauthorized` result from anywhere tears the session down.

use std::{future::Future, sync::Arc};

use futures::Stream;
use notekeep_auth::{CredentialStore, HasherConfig, generate_token};
use notekeep_core::{
  Error, Result,
  note::{Note, NoteDraft, now_millis},
  store::{AuthRemote, NoteCache, NoteRemote, UserStore},
  user::{AccessToken, Session, User, UserId},
};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::{
  backend::Backend,
  config::{AuthMode, BackendKind},
  notes::{FlushReport, NoteList, NoteStore},
};

/// Id of the single identity used in development mode.
pub const DEV_USER_ID: UserId = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
  LoggedOut,
  Authenticating,
  LoggedIn(Session),
}

impl SessionState {
  pub fn session(&self) -> Option<&Session> {
    match self {
      Self::LoggedIn(session) => Some(session),
      _ => None,
    }
  }
}

enum Authenticator<C, R> {
  Development { token: AccessToken, user_name: String },
  Local(CredentialStore<C>),
  Remote(Arc<R>),
}

enum Attempt<'a> {
  Login { email: &'a str, password: &'a str },
  Register { name: &'a str, email: &'a str, password: &'a str },
}

impl Attempt<'_> {
  fn email(&self) -> &str {
    match self {
      Self::Login { email, .. } | Self::Register { email, .. } => email,
    }
  }
}

struct Inner<C, R> {
  notes:      NoteStore<C, R>,
  auth:       Authenticator<C, R>,
  /// Where remote and development identities are mirrored so cached notes
  /// have an owner row.
  mirror:     Option<Arc<C>>,
  kind:       BackendKind,
  state:      watch::Sender<SessionState>,
  last_error: watch::Sender<Option<Error>>,
}

/// Cheap to clone; clones drive the same session.
pub struct Coordinator<C, R> {
  inner: Arc<Inner<C, R>>,
}

impl<C, R> Clone for Coordinator<C, R> {
  fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<C, R> Coordinator<C, R>
where
  C: NoteCache + UserStore + 'static,
  R: NoteRemote + AuthRemote + 'static,
{
  pub fn new(backend: Backend<C, R>, mode: AuthMode, hasher: &HasherConfig) -> Result<Self> {
    let kind = backend.kind();
    let auth = match (&mode, &backend) {
      (AuthMode::DevelopmentFixedToken { token, user_name }, _) => Authenticator::Development {
        token:     AccessToken::new(token.clone()),
        user_name: user_name.clone(),
      },
      (AuthMode::Production, Backend::LocalOnly(cache)) => {
        Authenticator::Local(CredentialStore::new(Arc::clone(cache), hasher)?)
      }
      (AuthMode::Production, Backend::RemoteOnly(remote) | Backend::Cached { remote, .. }) => {
        Authenticator::Remote(Arc::clone(remote))
      }
    };
    let mirror = match auth {
      Authenticator::Local(_) => None,
      _ => backend.cache().cloned(),
    };

    Ok(Self {
      inner: Arc::new(Inner {
        notes: NoteStore::new(backend),
        auth,
        mirror,
        kind,
        state: watch::channel(SessionState::LoggedOut).0,
        last_error: watch::channel(None).0,
      }),
    })
  }

  // ── Observation ────────────────────────────────────────────────────────────

  pub fn state(&self) -> watch::Receiver<SessionState> { self.inner.state.subscribe() }

  pub fn state_stream(&self) -> impl Stream<Item = SessionState> + Send + 'static {
    WatchStream::new(self.state())
  }

  pub fn current_state(&self) -> SessionState { self.inner.state.borrow().clone() }

  pub fn session(&self) -> Option<Session> { self.inner.state.borrow().session().cloned() }

  pub fn errors(&self) -> watch::Receiver<Option<Error>> { self.inner.last_error.subscribe() }

  pub fn last_error(&self) -> Option<Error> { self.inner.last_error.borrow().clone() }

  pub fn notes(&self) -> &NoteStore<C, R> { &self.inner.notes }

  // ── Authentication ─────────────────────────────────────────────────────────

  /// Rejected with `AuthInProgress` while another attempt is running. From
  /// `LoggedIn` the current session is dropped first.
  pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
    let (email, password) = (email.to_owned(), password.to_owned());
    self
      .run_auth(move |inner| async move {
        inner.authenticate(Attempt::Login { email: &email, password: &password }).await
      })
      .await
  }

  pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Session> {
    let (name, email, password) = (name.to_owned(), email.to_owned(), password.to_owned());
    self
      .run_auth(move |inner| async move {
        inner
          .authenticate(Attempt::Register { name: &name, email: &email, password: &password })
          .await
      })
      .await
  }

  pub fn logout(&self) { self.inner.logout(); }

  pub async fn change_password(&self, new_password: &str) -> Result<()> {
    let result = match (&self.inner.auth, self.user()) {
      (_, Err(e)) => Err(e),
      (Authenticator::Local(credentials), Ok(user)) => {
        credentials.change_password(user.id, new_password).await
      }
      _ => Err(Error::Unsupported("password changes need a local account".into())),
    };
    self.inner.observe(result)
  }

  /// Remove the account and its notes, then log out.
  pub async fn delete_account(&self) -> Result<()> {
    let result = match (&self.inner.auth, self.user()) {
      (_, Err(e)) => Err(e),
      (Authenticator::Local(credentials), Ok(user)) => credentials.delete_account(user.id).await,
      _ => Err(Error::Unsupported("account deletion needs a local account".into())),
    };
    let result = self.inner.observe(result);
    if result.is_ok() {
      tracing::info!("account deleted");
      self.inner.logout();
    }
    result
  }

  async fn run_auth<F, Fut>(&self, attempt: F) -> Result<Session>
  where
    F: FnOnce(Arc<Inner<C, R>>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Session>> + Send + 'static,
  {
    let mut busy = false;
    self.inner.state.send_if_modified(|state| {
      if matches!(state, SessionState::Authenticating) {
        busy = true;
        false
      } else {
        *state = SessionState::Authenticating;
        true
      }
    });
    if busy {
      return Err(self.inner.publish_error(Error::AuthInProgress));
    }
    self.inner.notes.set_token(None);
    self.inner.notes.clear();

    // Spawned so a dropped caller cannot leave the state stuck mid-attempt.
    let inner = Arc::clone(&self.inner);
    tokio::spawn(async move {
      let outcome = attempt(Arc::clone(&inner)).await;
      inner.finish_auth(outcome).await
    })
    .await
    .map_err(|e| Error::Internal(format!("authentication task failed: {e}")))?
  }

  // ── Notes ──────────────────────────────────────────────────────────────────

  fn user(&self) -> Result<User> {
    self.session().map(|s| s.user).ok_or(Error::Unauthorized)
  }

  pub async fn list_notes(&self) -> Result<NoteList> {
    let result = match self.user() {
      Ok(user) => self.inner.notes.list(user.id).await,
      Err(e) => Err(e),
    };
    self.inner.observe(result)
  }

  pub async fn get_note(&self, note_id: &str) -> Result<Option<Note>> {
    let result = match self.user() {
      Ok(user) => self.inner.notes.get(note_id, user.id).await,
      Err(e) => Err(e),
    };
    self.inner.observe(result)
  }

  pub async fn create_note(&self, draft: NoteDraft) -> Result<Note> {
    let result = match self.user() {
      Ok(user) => self.inner.notes.create(user.id, draft).await,
      Err(e) => Err(e),
    };
    self.inner.observe(result)
  }

  pub async fn update_note(&self, note_id: &str, draft: NoteDraft) -> Result<Note> {
    let result = match self.user() {
      Ok(user) => self.inner.notes.update(note_id, user.id, draft).await,
      Err(e) => Err(e),
    };
    self.inner.observe(result)
  }

  pub async fn delete_note(&self, note_id: &str) -> Result<()> {
    let result = match self.user() {
      Ok(user) => self.inner.notes.delete(note_id, user.id).await,
      Err(e) => Err(e),
    };
    self.inner.observe(result)
  }

  /// Push queued writes, then pull the remote list.
  pub async fn sync(&self) -> Result<FlushReport> {
    let result = match self.user() {
      Ok(user) => self.inner.notes.sync(user.id).await,
      Err(e) => Err(e),
    };
    self.inner.observe(result)
  }
}

impl<C, R> Inner<C, R>
where
  C: NoteCache + UserStore + 'static,
  R: NoteRemote + AuthRemote + 'static,
{
  async fn authenticate(&self, attempt: Attempt<'_>) -> Result<Session> {
    let (token, user) = match (&self.auth, &attempt) {
      (Authenticator::Development { token, user_name }, _) => {
        let name = match &attempt {
          Attempt::Register { name, .. } => (*name).to_owned(),
          Attempt::Login { .. } => user_name.clone(),
        };
        let user = User {
          id: DEV_USER_ID,
          name,
          email: attempt.email().to_owned(),
          created_at: now_millis(),
        };
        (token.clone(), user)
      }
      (Authenticator::Local(credentials), Attempt::Login { email, password }) => {
        (generate_token(), credentials.login(email, password).await?)
      }
      (Authenticator::Local(credentials), Attempt::Register { name, email, password }) => {
        (generate_token(), credentials.register(name, email, password).await?)
      }
      (Authenticator::Remote(remote), Attempt::Login { email, password }) => {
        remote.login(email, password).await?
      }
      (Authenticator::Remote(remote), Attempt::Register { name, email, password }) => {
        remote.register(name, email, password).await?
      }
    };

    if let Some(cache) = &self.mirror {
      cache.mirror_user(user.clone()).await.map_err(Into::<Error>::into)?;
    }
    Ok(Session { token, user })
  }

  async fn finish_auth(&self, outcome: Result<Session>) -> Result<Session> {
    let session = match outcome {
      Ok(session) => session,
      Err(e) => {
        self.state.send_replace(SessionState::LoggedOut);
        tracing::info!(error = %e, "authentication failed");
        return Err(self.publish_error(e));
      }
    };

    self.notes.set_token(Some(session.token.clone()));
    let mut superseded = false;
    self.state.send_if_modified(|state| {
      if matches!(state, SessionState::Authenticating) {
        *state = SessionState::LoggedIn(session.clone());
        true
      } else {
        superseded = true;
        false
      }
    });
    if superseded {
      // A logout landed while the attempt was in flight.
      self.notes.set_token(None);
      return Err(self.publish_error(Error::Unauthorized));
    }

    self.last_error.send_replace(None);
    tracing::info!(user_id = session.user.id, backend = %self.kind, "logged in");

    if self.kind == BackendKind::Cached {
      let synced = self.notes.sync(session.user.id).await;
      match synced {
        Ok(report) => tracing::debug!(pushed = report.pushed, remaining = report.remaining, "initial sync"),
        // A revoked token ends the session; anything else leaves the login
        // standing with the error published.
        Err(e) if e.is_auth_failure() => return self.observe(Err(e)),
        Err(e) => {
          tracing::warn!(error = %e, "initial sync failed");
          self.publish_error(e);
        }
      }
    }
    Ok(session)
  }

  fn logout(&self) {
    self.notes.set_token(None);
    self.notes.clear();
    let was = self.state.send_replace(SessionState::LoggedOut);
    if let SessionState::LoggedIn(session) = was {
      tracing::info!(user_id = session.user.id, "logged out");
    }
  }

  fn publish_error(&self, e: Error) -> Error {
    self.last_error.send_replace(Some(e.clone()));
    e
  }

  /// Publish a failure and end the session on `Unauthorized`.
  fn observe<T>(&self, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
      if e.is_auth_failure() {
        tracing::info!("token rejected, ending session");
        self.logout();
      }
      self.publish_error(e)
    })
  }
}
