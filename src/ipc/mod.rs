//! Inter-process communication via unix sockets
//!
//! Length-prefixed JSON over unix domain sockets, shared by the daemon
//! control socket and the desktop shell socket. Requests are answered in
//! the daemon's single event loop; this module only frames and transports
//! them.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

mod messages;
pub use messages::{DaemonRequest, DaemonResponse, DaemonStatus, WorkspaceStatus};

use crate::constants::ipc;

/// Resolve a socket path under `XDG_RUNTIME_DIR`, falling back to the
/// user cache directory when the session has none.
pub fn runtime_socket_path(file_name: &str) -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir).join(ipc::APP_DIR).join(file_name));
    }

    let cache = dirs::cache_dir()
        .context("failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(ipc::APP_DIR).join(file_name))
}

/// Client connection to a running daemon (used by the CLI)
pub struct DaemonClient {
    pub(crate) stream: UnixStream,
}

impl DaemonClient {
    /// Connect to the daemon's control socket
    pub fn connect() -> Result<Self> {
        let path = runtime_socket_path(ipc::DAEMON_SOCKET)?;
        Self::connect_to(&path)
    }

    /// Connect to a specific socket path
    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).context(format!(
            "failed to connect to daemon at {} (is 'wallshift daemon' running?)",
            path.display()
        ))?;
        Ok(Self { stream })
    }

    /// Send a request and wait for the daemon's response
    pub fn request(&mut self, req: &DaemonRequest) -> Result<DaemonResponse> {
        write_message(&mut self.stream, req)?;
        read_message(&mut self.stream)
    }
}

/// Server listener for the daemon process
pub struct DaemonServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl DaemonServer {
    /// Create the server and bind the default control socket
    pub fn bind() -> Result<Self> {
        let socket_path = runtime_socket_path(ipc::DAEMON_SOCKET)?;
        Self::bind_to(socket_path)
    }

    /// Create the server on a specific socket path
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("failed to create socket directory: {}", parent.display()))?;
        }

        // remove a stale socket left behind by a crashed daemon
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .context(format!("failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("failed to bind socket at {}", socket_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept an incoming connection (blocking)
    pub fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .context("failed to accept IPC connection")?;
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for DaemonServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Write a length-prefixed message to the stream
pub(crate) fn write_message<T: Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("failed to serialize message to JSON")?;

    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .context("failed to write message length")?;
    stream
        .write_all(&json)
        .context("failed to write message payload")?;
    stream.flush().context("failed to flush stream")?;

    Ok(())
}

/// Read a length-prefixed message from the stream
pub(crate) fn read_message<T: for<'de> Deserialize<'de>>(stream: &mut UnixStream) -> Result<T> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // sanity check (prevent DoS via huge allocation)
    if len > ipc::MAX_MESSAGE_SIZE {
        return Err(anyhow!(
            "message too large: {} bytes (max: {})",
            len,
            ipc::MAX_MESSAGE_SIZE
        ));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .context("failed to read message payload")?;

    serde_json::from_slice(&json_buf).context("failed to deserialize message from JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;
    use std::collections::BTreeMap;

    #[test]
    fn test_message_roundtrip_over_stream_pair() {
        let (mut a, mut b) = UnixStream::pair().unwrap();

        write_message(&mut a, &DaemonRequest::SetRotateTime(60)).unwrap();
        let req: DaemonRequest = read_message(&mut b).unwrap();
        assert!(matches!(req, DaemonRequest::SetRotateTime(60)));

        let status = DaemonStatus {
            rotate_time: 3600,
            log_level: LogLevel::Info,
            workspaces: BTreeMap::from([(
                2,
                WorkspaceStatus {
                    folders: 1,
                    pool_remaining: 14,
                },
            )]),
        };
        write_message(&mut b, &DaemonResponse::Status(status.clone())).unwrap();
        let resp: DaemonResponse = read_message(&mut a).unwrap();
        match resp {
            DaemonResponse::Status(got) => assert_eq!(got, status),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_oversized_message_rejected() {
        let (mut a, mut b) = UnixStream::pair().unwrap();

        let len = (ipc::MAX_MESSAGE_SIZE as u32 + 1).to_le_bytes();
        a.write_all(&len).unwrap();

        let result: Result<DaemonRequest> = read_message(&mut b);
        assert!(result.is_err());
    }

    #[test]
    fn test_bind_rejects_then_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");

        let first = DaemonServer::bind_to(path.clone()).unwrap();
        drop(first);
        // the socket file is cleaned up on drop, and a leftover is replaced
        std::fs::write(&path, b"stale").unwrap();
        let second = DaemonServer::bind_to(path.clone()).unwrap();
        assert_eq!(second.path(), path);
    }
}
