#![forbid(unsafe_code)]

mod attributes;
mod config;
mod constants;
mod daemon;
mod desktop;
mod error;
mod ipc;
mod rotation;
mod scanner;
mod store;
mod types;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::Level as TraceLevel;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;

use attributes::FolderAttributes;
use config::Settings;
use daemon::Daemon;
use desktop::{DesktopShell, ShellClient};
use error::StoreError;
use ipc::{DaemonClient, DaemonRequest, DaemonResponse};
use store::BackgroundStore;
use types::{Color, LogLevel, Placement};

#[derive(Parser)]
#[command(
    name = "wallshift",
    version,
    about = "Get/set per-workspace backgrounds and rotate them from directory pools"
)]
struct Cli {
    /// Folder whose backgrounds are managed (default: the desktop directory)
    #[arg(short, long, global = true)]
    folder: Option<PathBuf>,

    /// Print extra output to screen
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Selection {
    /// The workspace # to modify, otherwise use the current workspace
    #[arg(short, long, conflicts_with = "all")]
    workspace: Option<u32>,

    /// Modify all workspaces at once
    #[arg(short, long)]
    all: bool,
}

#[derive(Args)]
#[group(required = true, multiple = true)]
struct SetOptions {
    /// Path to the image file; an empty string clears the background
    #[arg(short = 'F', long)]
    file: Option<PathBuf>,

    /// Placement mode
    #[arg(short, long, value_enum)]
    mode: Option<Placement>,

    /// Enable text outline
    #[arg(short, long, conflicts_with = "no_text")]
    text: bool,

    /// Disable text outline
    #[arg(short, long)]
    no_text: bool,

    /// X/Y offset in use-origin mode
    #[arg(short, long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    offset: Option<Vec<i32>>,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the folder with a fresh global default record
    Init,

    /// List background information
    List {
        #[command(flatten)]
        selection: Selection,
    },

    /// Set workspace background options
    Set {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        options: SetOptions,
    },

    /// Make the background empty (same effect as: set --file "")
    Clear {
        #[command(flatten)]
        selection: Selection,
    },

    /// Reset background to the global default
    Reset {
        #[command(flatten)]
        selection: Selection,
    },

    /// Get or set a workspace's background color
    Color {
        #[command(flatten)]
        selection: Selection,
        /// RRGGBB hex value; omit to query
        value: Option<String>,
    },

    /// Run the rotation daemon
    Daemon,

    /// Tell the daemon to rotate to the next wallpaper now
    Next,

    /// Tell the daemon to reload its settings file
    Reload,

    /// Show the daemon's rotation state
    Status,

    /// Get or set the daemon's rotation interval in seconds (<= 0 disables)
    Interval { secs: Option<i64> },

    /// Get or set the daemon's logging threshold
    LogLevel { level: Option<LogLevel> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Daemon => run_daemon(cli.folder),
        command => {
            init_cli_logging()?;
            run_command(command, cli.folder, cli.verbose)
        }
    }
}

/// One-shot commands log to stderr at the level taken from `LOG_LEVEL`
fn init_cli_logging() -> Result<()> {
    let level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "error".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "info" => TraceLevel::INFO,
        "warn" => TraceLevel::WARN,
        _ => TraceLevel::ERROR,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;
    Ok(())
}

/// The daemon needs its threshold changeable at runtime, so it logs
/// through a reloadable filter layer instead of a fixed subscriber.
fn run_daemon(folder: Option<PathBuf>) -> Result<()> {
    let initial = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|v| v.parse::<LogLevel>().ok())
        .unwrap_or(LogLevel::Info);

    let (filter, handle) = reload::Layer::new(initial.to_filter());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let shell = Rc::new(ShellClient::new()?);
    let store = open_store(folder, shell)?;
    Daemon::new(store, Settings::default_path(), handle, initial).run()
}

fn run_command(command: Command, folder: Option<PathBuf>, verbose: bool) -> Result<()> {
    match command {
        Command::Init => {
            let folder = target_folder(folder)?;
            let attrs = Rc::new(FolderAttributes::new(folder.clone())?);
            let shell = Rc::new(ShellClient::new()?);
            BackgroundStore::bootstrap(attrs, shell)?;
            println!("Initialized background store for {}", folder.display());
            Ok(())
        }
        Command::List { selection } => {
            let shell = Rc::new(ShellClient::new()?);
            let store = open_store(folder, shell.clone())?;
            cmd_list(&store, &selection, shell.as_ref(), verbose)
        }
        Command::Set { selection, options } => {
            let shell = Rc::new(ShellClient::new()?);
            let mut store = open_store(folder, shell.clone())?;
            cmd_set(&mut store, &selection, &options, shell.as_ref(), verbose)
        }
        Command::Clear { selection } => {
            let shell = Rc::new(ShellClient::new()?);
            let mut store = open_store(folder, shell.clone())?;
            for workspace in resolve_workspaces(&selection, shell.as_ref())? {
                if verbose {
                    println!("Clearing workspace {workspace}");
                }
                store.set_background(None, workspace)?;
            }
            store.flush()?;
            Ok(())
        }
        Command::Reset { selection } => {
            let shell = Rc::new(ShellClient::new()?);
            let mut store = open_store(folder, shell.clone())?;
            cmd_reset(&mut store, &selection, shell.as_ref(), verbose)
        }
        Command::Color { selection, value } => {
            let shell = ShellClient::new()?;
            cmd_color(&selection, value.as_deref(), &shell)
        }
        Command::Next => expect_ok(client_request(&DaemonRequest::Next)?),
        Command::Reload => expect_ok(client_request(&DaemonRequest::Reload)?),
        Command::Status => cmd_status(),
        Command::Interval { secs } => match secs {
            Some(secs) => expect_ok(client_request(&DaemonRequest::SetRotateTime(secs))?),
            None => match client_request(&DaemonRequest::GetRotateTime)? {
                DaemonResponse::RotateTime(secs) if secs > 0 => {
                    println!("{secs}");
                    Ok(())
                }
                DaemonResponse::RotateTime(_) => {
                    println!("disabled");
                    Ok(())
                }
                other => bail!("unexpected daemon response: {other:?}"),
            },
        },
        Command::LogLevel { level } => match level {
            Some(level) => expect_ok(client_request(&DaemonRequest::SetLogLevel(level))?),
            None => match client_request(&DaemonRequest::GetLogLevel)? {
                DaemonResponse::LogLevel(level) => {
                    println!("{level}");
                    Ok(())
                }
                other => bail!("unexpected daemon response: {other:?}"),
            },
        },
        Command::Daemon => unreachable!("handled in main"),
    }
}

/// Fall back from an explicit folder to the desktop directory, then home
fn target_folder(folder: Option<PathBuf>) -> Result<PathBuf> {
    folder
        .or_else(dirs::desktop_dir)
        .or_else(dirs::home_dir)
        .context("unable to determine target folder (pass --folder)")
}

fn open_store(folder: Option<PathBuf>, shell: Rc<ShellClient>) -> Result<BackgroundStore> {
    let folder = target_folder(folder)?;
    let attrs = Rc::new(FolderAttributes::new(folder)?);
    Ok(BackgroundStore::load(attrs, shell)?)
}

/// Expand `-w`/`-a` into concrete workspace ids, asking the shell for the
/// workspace count and the current workspace.
fn resolve_workspaces(selection: &Selection, shell: &dyn DesktopShell) -> Result<Vec<u32>> {
    let count = shell.workspace_count();
    if selection.all {
        return Ok((1..=count).collect());
    }
    if let Some(workspace) = selection.workspace {
        if workspace > count {
            bail!("invalid workspace # specified (1..={count}, or 0 for the global default)");
        }
        return Ok(vec![workspace]);
    }
    Ok(vec![shell.current_workspace()])
}

fn cmd_list(
    store: &BackgroundStore,
    selection: &Selection,
    shell: &dyn DesktopShell,
    verbose: bool,
) -> Result<()> {
    let mut workspaces = resolve_workspaces(selection, shell)?;
    // show the global defaults too when listing everything verbosely
    if verbose && selection.all {
        workspaces.insert(0, constants::workspace::GLOBAL);
    }

    for workspace in workspaces {
        let info = store.workspace_info(workspace);
        if !verbose {
            match &info.image {
                Some(path) => println!("{workspace}:{}", path.display()),
                None => println!("{workspace}:"),
            }
            continue;
        }

        if workspace == constants::workspace::GLOBAL {
            println!("Workspace: global default");
        } else {
            println!(
                "Workspace: {workspace}{}",
                if info.customized { "" } else { " (using global default)" }
            );
        }
        match &info.image {
            Some(path) => println!("File: {}", path.display()),
            None => println!("File: No background set!"),
        }
        println!("Mode: {}", info.placement);
        println!("Offset: {}", info.origin);
        println!("Text Outline: {}", info.text_outline);
    }
    Ok(())
}

fn cmd_set(
    store: &mut BackgroundStore,
    selection: &Selection,
    options: &SetOptions,
    shell: &dyn DesktopShell,
    verbose: bool,
) -> Result<()> {
    for workspace in resolve_workspaces(selection, shell)? {
        if let Some(file) = &options.file {
            let image = (!file.as_os_str().is_empty()).then_some(file.as_path());
            if verbose {
                println!(
                    "Setting workspace {workspace} background to {}",
                    image.map_or("<none>".to_string(), |p| p.display().to_string())
                );
            }
            store.set_background(image, workspace)?;
        }

        if options.text {
            if verbose {
                println!("Enabling text outline for workspace {workspace}");
            }
            store.set_outline(true, workspace)?;
        }

        if options.no_text {
            if verbose {
                println!("Disabling text outline for workspace {workspace}");
            }
            store.set_outline(false, workspace)?;
        }

        if let Some(offset) = &options.offset {
            if verbose {
                println!(
                    "Setting X/Y offset to {}/{} for workspace {workspace}",
                    offset[0], offset[1]
                );
            }
            store.set_offset(offset[0], offset[1], workspace)?;
        }

        if let Some(mode) = options.mode {
            if verbose {
                println!("Setting placement mode to <{mode}> for workspace {workspace}");
            }
            store.set_placement(mode, workspace)?;
        }
    }

    store.flush()?;
    Ok(())
}

fn cmd_reset(
    store: &mut BackgroundStore,
    selection: &Selection,
    shell: &dyn DesktopShell,
    verbose: bool,
) -> Result<()> {
    let all = selection.all;
    for workspace in resolve_workspaces(selection, shell)? {
        if verbose {
            println!("Resetting workspace {workspace} to global default");
        }
        match store.remove_index(workspace) {
            Ok(()) => {}
            // resetting everything quietly skips workspaces already on the default
            Err(StoreError::NotFound(_)) if all => {}
            Err(e) => return Err(e.into()),
        }
    }
    store.flush()?;
    Ok(())
}

fn cmd_color(selection: &Selection, value: Option<&str>, shell: &ShellClient) -> Result<()> {
    for workspace in resolve_workspaces(selection, shell)? {
        if !store::mask::WorkspaceMask::in_range(workspace) {
            bail!("invalid workspace # specified");
        }
        match value {
            Some(hex) => {
                let color = Color::parse(hex)
                    .with_context(|| format!("invalid color '{hex}', expected RRGGBB"))?;
                shell.set_background_color(workspace, color)?;
            }
            None => {
                let color = shell.background_color(workspace)?;
                println!("{workspace}: {color}");
            }
        }
    }
    Ok(())
}

fn cmd_status() -> Result<()> {
    match client_request(&DaemonRequest::Status)? {
        DaemonResponse::Status(status) => {
            if status.rotate_time > 0 {
                println!("Rotate time: {}s", status.rotate_time);
            } else {
                println!("Rotate time: disabled");
            }
            println!("Log level: {}", status.log_level);
            for (workspace, ws_status) in &status.workspaces {
                println!(
                    "Workspace {workspace}: {} folder(s), {} file(s) left this cycle",
                    ws_status.folders, ws_status.pool_remaining
                );
            }
            Ok(())
        }
        other => bail!("unexpected daemon response: {other:?}"),
    }
}

fn client_request(request: &DaemonRequest) -> Result<DaemonResponse> {
    DaemonClient::connect()?.request(request)
}

fn expect_ok(response: DaemonResponse) -> Result<()> {
    match response {
        DaemonResponse::Ok => Ok(()),
        DaemonResponse::Error(e) => bail!("daemon reported an error: {e}"),
        other => bail!("unexpected daemon response: {other:?}"),
    }
}
