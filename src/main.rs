//! comfy-nodes: bulk installer for ComfyUI custom nodes.
//!
//! One binary plays every role. Run without a subcommand it opens the
//! installer form. The form copies this binary into `custom_nodes` twice: as
//! the clone entry (`clone` subcommand) and as the preparation helper
//! (`prepare` subcommand) that the clone run drops next to each
//! `requirements.txt`.

mod app;
mod installer;
mod model;
mod msg;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::EnvFilter;

use app::App;
use installer::NodeInstaller;
use installer::deps::DependencyInstaller;
use installer::orchestrator::Orchestrator;
use installer::process::SystemRunner;
use installer::toolkit::Toolkit;
use model::config::AppConfig;
use msg::Msg;

#[derive(Parser)]
#[command(name = "comfy-nodes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Install ComfyUI custom nodes from a list of GitHub repositories", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the installer form (default)
    Ui,

    /// Clone every repository listed in comfy-repos.txt (run inside custom_nodes)
    Clone,

    /// Install the requirements.txt in the current directory
    Prepare,

    /// Check that a path is a ComfyUI custom_nodes directory
    Validate {
        /// Path to the custom_nodes directory
        path: String,
    },

    /// Save a repository list and the helper files into custom_nodes
    Save {
        /// Path to the custom_nodes directory
        path: String,

        /// File with one repository URL per line
        urls: PathBuf,
    },

    /// Run the clone entry previously saved into custom_nodes
    Install {
        /// Path to the custom_nodes directory
        path: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let command = cli.command.unwrap_or(Commands::Ui);

    let _guard = match command {
        Commands::Ui => Some(init_session_log(&config)?),
        _ => {
            init_cli_log(cli.verbose);
            None
        }
    };

    run_command(command, &config)
}

/// Per-session log file in the working directory (never stdout: the terminal
/// belongs to the form).
fn init_session_log(config: &AppConfig) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file_name = format!(
        "installer_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let file_appender = tracing_appender::rolling::never(".", file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.general.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    tracing::info!("comfy-nodes starting");
    Ok(guard)
}

/// Subcommands print their progress on stdout, so logs go to stderr and stay
/// quiet unless something is wrong.
fn init_cli_log(verbose: bool) {
    let default = if verbose {
        "comfy_nodes=debug"
    } else {
        "comfy_nodes=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

fn run_command(command: Commands, config: &AppConfig) -> Result<ExitCode> {
    let mut out = io::stdout();
    match command {
        Commands::Ui => {
            run_ui(config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Clone => {
            let mut out = out.lock();
            let root = std::env::current_dir()?;
            match Orchestrator::new(root, &SystemRunner, &config.tools).run(&mut out) {
                Ok(_) => Ok(ExitCode::SUCCESS),
                Err(err) => {
                    tracing::error!("clone run aborted: {err}");
                    writeln!(out, "Error: {err}")?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Prepare => {
            let mut out = out.lock();
            let cwd = std::env::current_dir()?;
            let outcome = DependencyInstaller::new(&SystemRunner, &config.tools)
                .install(&cwd, &mut out)?;
            if outcome.is_failure() {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Commands::Validate { path } => {
            writeln!(out, "{}", front_end()?.validate_path(&path))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Save { path, urls } => {
            let text = std::fs::read_to_string(&urls)
                .with_context(|| format!("reading {}", urls.display()))?;
            writeln!(out, "{}", front_end()?.save_repos(&text, &path))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Install { path } => {
            writeln!(out, "{}", front_end()?.install_nodes(&path))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn front_end() -> Result<NodeInstaller> {
    let toolkit = Toolkit::from_current_exe().context("locating the comfy-nodes executable")?;
    Ok(NodeInstaller::new(Arc::new(SystemRunner), toolkit))
}

fn run_ui(config: &AppConfig) -> Result<()> {
    let installer = front_end()?;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, config, installer);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        tracing::error!("ui error: {e:?}");
        eprintln!("comfy-nodes error: {e:?}");
    }

    Ok(())
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &AppConfig,
    installer: NodeInstaller,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();
    let mut app = App::new(config, installer, tx.clone());

    // Input thread forwards terminal events as Msg
    let tx_input = tx.clone();
    thread::spawn(move || {
        loop {
            if let Ok(event) = event::read() {
                let msg = match event {
                    Event::Key(k) if k.kind == KeyEventKind::Press => Msg::Key(k),
                    Event::Resize(_, _) => Msg::Resize,
                    _ => continue,
                };
                if tx_input.send(msg).is_err() {
                    break;
                }
            }
        }
    });

    // Tick thread drives the progress spinner
    let tick = Duration::from_millis(config.ui.tick_ms);
    let tx_tick = tx.clone();
    thread::spawn(move || {
        loop {
            thread::sleep(tick);
            if tx_tick.send(Msg::Tick).is_err() {
                break;
            }
        }
    });

    terminal.draw(|f| app.view(f))?;

    // ── Main event loop ──
    loop {
        // Batch-drain all pending messages
        let first = rx.recv()?;
        app.update(first)?;

        while let Ok(msg) = rx.try_recv() {
            app.update(msg)?;
        }

        if app.should_quit {
            break;
        }

        terminal.draw(|f| app.view(f))?;
    }

    Ok(())
}
