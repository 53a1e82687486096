//! Long-running rotation daemon
//!
//! One cooperative event loop serializes everything: the rotation timer,
//! the settings-file watch, and control requests arriving over the unix
//! socket. An IPC listener thread only frames requests and forwards them
//! through a channel; all handling happens here, so no operation ever
//! preempts another. Directory scans and attribute writes block the loop
//! for their duration, which is acceptable because nothing else needs
//! serving meanwhile.

use anyhow::{Context, Result};
use rand::rngs::ThreadRng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn};
use tracing_subscriber::Registry;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::reload;

use crate::config::Settings;
use crate::constants::config as config_consts;
use crate::ipc::{
    DaemonRequest, DaemonResponse, DaemonServer, DaemonStatus, WorkspaceStatus, read_message,
    write_message,
};
use crate::rotation::RotationEngine;
use crate::store::BackgroundStore;
use crate::types::LogLevel;

/// Handle for changing the logging threshold at runtime
pub type LogHandle = reload::Handle<LevelFilter, Registry>;

/// A control request plus the channel its response travels back on
struct CommandEnvelope {
    request: DaemonRequest,
    reply: mpsc::Sender<DaemonResponse>,
}

pub struct Daemon {
    store: BackgroundStore,
    engine: RotationEngine,
    settings_path: PathBuf,
    settings_mtime: Option<SystemTime>,
    /// Rotation interval in seconds; <= 0 means the timer is disabled
    rotate_time: i64,
    log_level: LogLevel,
    log_handle: LogHandle,
    deadline: Option<Instant>,
    rng: ThreadRng,
}

impl Daemon {
    pub fn new(
        store: BackgroundStore,
        settings_path: PathBuf,
        log_handle: LogHandle,
        log_level: LogLevel,
    ) -> Self {
        Self {
            store,
            engine: RotationEngine::new(),
            settings_path,
            settings_mtime: None,
            rotate_time: 0,
            log_level,
            log_handle,
            deadline: None,
            rng: rand::rng(),
        }
    }

    /// Bind the control socket and run the event loop until a termination
    /// signal arrives.
    pub fn run(mut self) -> Result<()> {
        let term = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&term))
            .context("failed to register SIGTERM handler")?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&term))
            .context("failed to register SIGINT handler")?;

        let server = DaemonServer::bind()?;
        info!(socket = %server.path().display(), "daemon control socket bound");

        let (command_tx, command_rx) = mpsc::channel();
        std::thread::spawn(move || {
            if let Err(e) = listener_loop(&server, &command_tx) {
                error!(error = ?e, "IPC listener thread stopped");
            }
        });

        // pick up the settings file and rotate once at startup
        self.settings_mtime = file_mtime(&self.settings_path);
        self.reload_settings();
        if let Err(e) = self.rotate_now() {
            warn!(error = %e, "initial rotation failed");
        }

        loop {
            if term.load(Ordering::Relaxed) {
                info!("termination signal received, shutting down");
                break;
            }

            match command_rx.recv_timeout(self.next_wait()) {
                Ok(envelope) => {
                    let response = self.handle_request(envelope.request);
                    // a dropped reply sender just means the client went away
                    let _ = envelope.reply.send(response);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }

            self.watch_settings();
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                self.deadline = self.arm_deadline();
                if let Err(e) = self.store_rotation() {
                    warn!(error = %e, "scheduled rotation failed");
                }
            }
        }

        Ok(())
    }

    /// How long the loop may sleep before something needs attention
    fn next_wait(&self) -> Duration {
        let poll = Duration::from_secs(config_consts::WATCH_POLL_SECS);
        match self.deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(poll),
            None => poll,
        }
    }

    fn arm_deadline(&self) -> Option<Instant> {
        if self.rotate_time > 0 {
            Some(Instant::now() + Duration::from_secs(self.rotate_time as u64))
        } else {
            None
        }
    }

    /// Rotate on an external trigger: restart the interval so the next
    /// scheduled firing is a full period away, then run a cycle.
    fn rotate_now(&mut self) -> Result<()> {
        self.deadline = self.arm_deadline();
        self.store_rotation()
    }

    fn store_rotation(&mut self) -> Result<()> {
        self.engine
            .rotate_all(&mut self.rng, &mut self.store)
            .context("rotation cycle failed")
    }

    fn handle_request(&mut self, request: DaemonRequest) -> DaemonResponse {
        debug!(request = ?request, "handling control request");
        match request {
            DaemonRequest::Ping => DaemonResponse::Pong,
            DaemonRequest::Next => match self.rotate_now() {
                Ok(()) => DaemonResponse::Ok,
                Err(e) => DaemonResponse::Error(format!("{e:#}")),
            },
            DaemonRequest::Reload => {
                self.settings_mtime = file_mtime(&self.settings_path);
                self.reload_settings();
                DaemonResponse::Ok
            }
            DaemonRequest::GetRotateTime => DaemonResponse::RotateTime(self.rotate_time),
            DaemonRequest::SetRotateTime(secs) => {
                self.rotate_time = secs;
                self.deadline = self.arm_deadline();
                info!(rotate_time = secs, "rotation interval changed via IPC");
                DaemonResponse::Ok
            }
            DaemonRequest::GetLogLevel => DaemonResponse::LogLevel(self.log_level),
            DaemonRequest::SetLogLevel(level) => {
                self.apply_log_level(level);
                info!(level = %level, "log level changed via IPC");
                DaemonResponse::Ok
            }
            DaemonRequest::Status => DaemonResponse::Status(self.status()),
        }
    }

    fn status(&self) -> DaemonStatus {
        let mut workspaces = BTreeMap::new();
        for ws in self.engine.workspaces() {
            workspaces.insert(
                ws,
                WorkspaceStatus {
                    folders: self.engine.folder_count(ws),
                    pool_remaining: self.engine.pool_len(ws),
                },
            );
        }
        DaemonStatus {
            rotate_time: self.rotate_time,
            log_level: self.log_level,
            workspaces,
        }
    }

    /// Poll the settings file's mtime; reload on change. A recreated file
    /// is picked up the same way since the path is re-statted every poll.
    fn watch_settings(&mut self) {
        let current = file_mtime(&self.settings_path);
        if current != self.settings_mtime {
            info!(path = %self.settings_path.display(), "settings file changed");
            self.settings_mtime = current;
            if current.is_some() {
                self.reload_settings();
            }
        }
    }

    /// Re-derive daemon state from the settings file. On a parse failure
    /// the previous state is left untouched (last-known-good).
    fn reload_settings(&mut self) {
        let settings = match Settings::load(&self.settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "keeping previous settings");
                return;
            }
        };

        if let Some(level) = settings.log_level
            && level != self.log_level
        {
            self.apply_log_level(level);
        }

        // only restart the interval when the value actually changed, so a
        // reload does not perturb an already-running cadence
        let rotate_time = settings.rotate_time.unwrap_or(0);
        if rotate_time != self.rotate_time {
            self.rotate_time = rotate_time;
            self.deadline = self.arm_deadline();
            info!(rotate_time, "rotation interval changed");
        }

        self.engine.set_folders(settings.folder_map());
    }

    fn apply_log_level(&mut self, level: LogLevel) {
        if let Err(e) = self.log_handle.reload(level.to_filter()) {
            warn!(error = %e, "failed to update log filter");
        }
        self.log_level = level;
    }
}

/// Accept clients one at a time and shuttle their requests into the event
/// loop; responses travel back on a per-request channel.
fn listener_loop(
    server: &DaemonServer,
    command_tx: &mpsc::Sender<CommandEnvelope>,
) -> Result<()> {
    loop {
        let mut stream = server.accept()?;
        debug!("control client connected");

        loop {
            let request: DaemonRequest = match read_message(&mut stream) {
                Ok(request) => request,
                Err(_) => break, // client disconnected
            };

            let (reply_tx, reply_rx) = mpsc::channel();
            if command_tx
                .send(CommandEnvelope {
                    request,
                    reply: reply_tx,
                })
                .is_err()
            {
                // event loop is gone, stop accepting work
                return Ok(());
            }

            let Ok(response) = reply_rx.recv() else {
                return Ok(());
            };
            if write_message(&mut stream, &response).is_err() {
                break;
            }
        }

        debug!("control client disconnected");
    }
}

fn file_mtime(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
