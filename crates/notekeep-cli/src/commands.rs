//! One function per subcommand, all driven through the [`Coordinator`].
//!
//! [`Coordinator`]: notekeep_sync::Coordinator

use anyhow::{Context, Result, bail};
use notekeep_core::{
  note::{Note, NoteDraft, SyncState},
  user::Session,
};

use crate::{Command, NoteCoordinator, settings::ClientSettings};

pub async fn run(c: &NoteCoordinator, settings: &ClientSettings, command: Command) -> Result<()> {
  let (email, password) = credentials(settings)?;

  let session = match &command {
    Command::Register { name } => c.register(name, email, password).await.context("registration failed")?,
    _ => c.login(email, password).await.context("login failed")?,
  };
  tracing::debug!(user_id = session.user.id, "signed in");

  match command {
    Command::Register { .. } | Command::Login => print_session(&session),
    Command::List => {
      let notes = c.list_notes().await.context("listing notes")?;
      let notes = notes.current();
      if notes.is_empty() {
        println!("no notes");
      }
      for note in notes.iter() {
        println!("{}", summary(note));
      }
    }
    Command::Show { id } => match c.get_note(&id).await.context("reading note")? {
      Some(note) => print_note(&note),
      None => bail!("no note with id {id}"),
    },
    Command::Add { title, body, image } => {
      let mut draft = NoteDraft::new(title, body);
      draft.image_ref = image;
      let note = c.create_note(draft).await.context("creating note")?;
      println!("{}", summary(&note));
    }
    Command::Edit { id, title, body, image, no_image } => {
      let current = c
        .get_note(&id)
        .await
        .context("reading note")?
        .with_context(|| format!("no note with id {id}"))?;
      let mut draft = current.to_draft();
      if let Some(title) = title {
        draft.title = title;
      }
      if let Some(body) = body {
        draft.body = body;
      }
      if no_image {
        draft.image_ref = None;
      } else if image.is_some() {
        draft.image_ref = image;
      }
      let note = c.update_note(&id, draft).await.context("updating note")?;
      println!("{}", summary(&note));
    }
    Command::Rm { id } => {
      c.delete_note(&id).await.context("deleting note")?;
      println!("deleted {id}");
    }
    Command::Sync => {
      let report = c.sync().await.context("sync failed")?;
      println!("pushed {} change(s), {} still queued", report.pushed, report.remaining);
    }
    Command::Passwd { new_password } => {
      c.change_password(&new_password).await.context("changing password")?;
      println!("password changed");
    }
    Command::DeleteAccount => {
      c.delete_account().await.context("deleting account")?;
      println!("account {} deleted", session.user.email);
    }
  }

  // Background failures (e.g. the sync after a cached login) are reported,
  // not fatal.
  if let Some(err) = c.last_error() {
    eprintln!("warning: {err}");
  }
  Ok(())
}

fn credentials(settings: &ClientSettings) -> Result<(&str, &str)> {
  let email = settings
    .email
    .as_deref()
    .context("no email configured (use --email, NOTEKEEP_EMAIL or the config file)")?;
  let password = settings
    .password
    .as_deref()
    .context("no password configured (use --password, NOTEKEEP_PASSWORD or the config file)")?;
  Ok((email, password))
}

fn print_session(session: &Session) {
  println!("signed in as {} <{}> (id {})", session.user.name, session.user.email, session.user.id);
}

fn summary(note: &Note) -> String {
  let marker = match note.sync_state {
    SyncState::Synced => "",
    SyncState::PendingCreate | SyncState::PendingUpdate => " (unsynced)",
    SyncState::PendingDelete => " (deleting)",
  };
  format!(
    "{}  {}  {}{marker}",
    note.id,
    note.created_at.format("%Y-%m-%d %H:%M"),
    note.title
  )
}

fn print_note(note: &Note) {
  println!("{}", note.title);
  println!("id:       {}", note.id);
  println!("created:  {}", note.created_at.to_rfc3339());
  println!("updated:  {}", note.updated_at.to_rfc3339());
  if let Some(image) = &note.image_ref {
    println!("image:    {image}");
  }
  if !note.body.is_empty() {
    println!();
    println!("{}", note.body);
  }
}
