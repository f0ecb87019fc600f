//! Browser-driven multi-shot capture.
//!
//! The browser itself is an external collaborator: callers supply a
//! [`BrowserLauncher`] that opens [`BrowserSession`]s (a WebDriver client,
//! a headless Chrome binding, or a test double). A job's [`DriverScript`]
//! drives the live session and hands each [`Snapshot`] it takes to an
//! emit callback; the fetch worker turns every emitted snapshot into a
//! `SnapshotCaptured` event before the script continues.

use std::sync::Arc;

use crate::error::Result;
use crate::snapshot::Snapshot;

/// A live browser session.
pub trait BrowserSession: Send {
    fn goto(&mut self, url: &str) -> Result<()>;

    /// Current DOM serialised as HTML.
    fn page_source(&mut self) -> Result<String>;

    fn execute_script(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Release the session. Called exactly once, by [`SessionGuard`].
    fn quit(&mut self) -> Result<()>;
}

pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Callback a driver script uses to hand over each snapshot.
pub type SnapshotSink<'a> = dyn FnMut(Snapshot) -> Result<()> + 'a;

/// Drives a session that has already been navigated to the job URL.
pub trait DriverScript: Send + Sync {
    fn run(&self, session: &mut dyn BrowserSession, emit: &mut SnapshotSink<'_>) -> Result<()>;
}

impl<F> DriverScript for F
where
    F: Fn(&mut dyn BrowserSession, &mut SnapshotSink<'_>) -> Result<()> + Send + Sync,
{
    fn run(&self, session: &mut dyn BrowserSession, emit: &mut SnapshotSink<'_>) -> Result<()> {
        self(session, emit)
    }
}

pub type SharedDriverScript = Arc<dyn DriverScript>;

/// Owns a session and quits it on drop, so the browser is released on
/// every exit path including script failure and panics.
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.session.quit() {
            tracing::warn!(error = %e, "Failed to release browser session");
        }
    }
}

/// Open a session, navigate to `url` and run `script`, forwarding each
/// snapshot to `emit`.
pub fn capture_snapshots(
    launcher: &dyn BrowserLauncher,
    url: &str,
    script: &dyn DriverScript,
    emit: &mut SnapshotSink<'_>,
) -> Result<()> {
    let mut guard = SessionGuard::new(launcher.launch()?);
    guard.session().goto(url)?;
    script.run(guard.session(), emit)
}
