//! Desktop shell collaborators
//!
//! The shell owns the screen: it knows how many workspaces exist, which one
//! is current, it stores the per-workspace background colors, and it is the
//! party that must re-read the record blob and redraw after a flush. All of
//! that is reached over the shell's own socket with the same
//! length-prefixed JSON framing the daemon socket uses.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use tracing::debug;

use crate::constants::{ipc, workspace};
use crate::ipc::{read_message, runtime_socket_path, write_message};
use crate::types::Color;

/// Fire-and-forget signal telling the shell to re-read the current
/// workspace's record and redraw.
pub trait RefreshNotifier {
    fn notify_refresh(&self);
}

/// Workspace and color queries answered by the shell
pub trait DesktopShell {
    fn workspace_count(&self) -> u32;
    fn current_workspace(&self) -> u32;
    fn background_color(&self, workspace: u32) -> Result<Color>;
    fn set_background_color(&self, workspace: u32, color: Color) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
enum ShellRequest {
    WorkspaceCount,
    CurrentWorkspace,
    GetColor(u32),
    SetColor(u32, Color),
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
enum ShellResponse {
    Count(u32),
    Workspace(u32),
    Color(Color),
    Ok,
    Error(String),
}

/// Client side of the shell socket.
///
/// The shell may not be running (headless session, tests, a plain file
/// manager folder): workspace queries then fall back to permissive
/// defaults and the refresh signal is dropped, both documented behaviors
/// rather than errors.
pub struct ShellClient {
    socket: PathBuf,
}

impl ShellClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            socket: runtime_socket_path(ipc::SHELL_SOCKET)?,
        })
    }

    fn request(&self, req: &ShellRequest) -> Result<ShellResponse> {
        let mut stream = UnixStream::connect(&self.socket)
            .context(format!("failed to connect to shell at {}", self.socket.display()))?;
        write_message(&mut stream, req)?;
        read_message(&mut stream)
    }
}

impl DesktopShell for ShellClient {
    fn workspace_count(&self) -> u32 {
        match self.request(&ShellRequest::WorkspaceCount) {
            Ok(ShellResponse::Count(count)) => count.min(workspace::MAX),
            _ => {
                debug!("shell unreachable, assuming {} workspaces", workspace::MAX);
                workspace::MAX
            }
        }
    }

    fn current_workspace(&self) -> u32 {
        match self.request(&ShellRequest::CurrentWorkspace) {
            Ok(ShellResponse::Workspace(ws)) if ws >= 1 => ws,
            _ => {
                debug!("shell unreachable, assuming workspace 1 is current");
                1
            }
        }
    }

    fn background_color(&self, workspace: u32) -> Result<Color> {
        match self.request(&ShellRequest::GetColor(workspace))? {
            ShellResponse::Color(color) => Ok(color),
            ShellResponse::Error(e) => Err(anyhow!("shell refused color query: {e}")),
            other => Err(anyhow!("unexpected shell response: {other:?}")),
        }
    }

    fn set_background_color(&self, workspace: u32, color: Color) -> Result<()> {
        match self.request(&ShellRequest::SetColor(workspace, color))? {
            ShellResponse::Ok => Ok(()),
            ShellResponse::Error(e) => Err(anyhow!("shell refused color update: {e}")),
            other => Err(anyhow!("unexpected shell response: {other:?}")),
        }
    }
}

impl RefreshNotifier for ShellClient {
    fn notify_refresh(&self) {
        match self.request(&ShellRequest::Refresh) {
            Ok(_) => debug!("sent refresh notification to shell"),
            Err(e) => debug!(error = ?e, "shell unreachable, refresh notification dropped"),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::Cell;

    /// Counts refresh signals so flush tests can assert on them
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        refreshes: Cell<usize>,
    }

    impl RecordingNotifier {
        pub(crate) fn refresh_count(&self) -> usize {
            self.refreshes.get()
        }
    }

    impl RefreshNotifier for RecordingNotifier {
        fn notify_refresh(&self) {
            self.refreshes.set(self.refreshes.get() + 1);
        }
    }

    /// Refresh sink for tests that do not care about notifications
    pub(crate) struct NullNotifier;

    impl RefreshNotifier for NullNotifier {
        fn notify_refresh(&self) {}
    }
}
