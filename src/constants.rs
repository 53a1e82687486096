//! Application-wide constants
//!
//! Single source of truth for the limits, file names and socket names used
//! throughout the application.

/// Workspace numbering constants
pub mod workspace {
    /// Highest addressable workspace id (the record mask is a u32, bit = id - 1)
    pub const MAX: u32 = 32;

    /// Sentinel id for the global default record
    pub const GLOBAL: u32 = 0;
}

/// Persisted record blob constants
pub mod blob {
    /// Name of the attribute slot inside the target folder
    pub const FILE_NAME: &str = ".workspace-backgrounds";

    /// Current on-disk format version
    pub const FORMAT_VERSION: u32 = 1;
}

/// Settings file constants
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "wallshift";

    /// Settings file name
    pub const FILE_NAME: &str = "wallshift.toml";

    /// How often the daemon polls the settings file's mtime (seconds)
    pub const WATCH_POLL_SECS: u64 = 2;
}

/// IPC socket constants
pub mod ipc {
    /// Runtime directory component for both sockets
    pub const APP_DIR: &str = "wallshift";

    /// Daemon control socket file name
    pub const DAEMON_SOCKET: &str = "daemon.sock";

    /// Desktop shell socket file name (owned by the shell, not by us)
    pub const SHELL_SOCKET: &str = "shell.sock";

    /// Maximum message size (1 MB) to prevent DoS via memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
}
