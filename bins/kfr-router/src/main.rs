use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

use kfr_common::{CommandLine, InvocationError};
use kfr_invocation::{InvocationManager, InvocationReport, LifecycleConfig};
use kfr_process_runner::InvocationOutcome;
use kfr_progress::{CancelAction, HeadlessSurface, ModalResult, ProgressSurface, TerminalSurface};
use kfr_roundtrip::config::{parse_duration, validation::validate_environment};
use kfr_roundtrip::{
    FileBoardHost, FreeroutingPlugin, PluginRegistry, RoundTripOutcome, RoundTripPaths,
    RouterCommand, RouterConfig,
};

const EXIT_CANCELLED: u8 = 130;
const EXIT_LAUNCH_FAILED: u8 = 127;

/// KFR Router - run Freerouting and other external programs under a
/// cancelable wait
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program and wait for it, Enter or Ctrl+C cancels
    Run {
        /// Time the program gets to exit after a cancel
        #[arg(long, value_name = "DURATION", default_value = "3s", value_parser = parse_duration)]
        grace: Duration,

        /// Upper bound on the final wait for the runner
        #[arg(long, value_name = "DURATION", default_value = "10s", value_parser = parse_duration)]
        join_timeout: Duration,

        /// Do not read stdin for a cancel
        #[arg(long)]
        headless: bool,

        /// Program and arguments, after `--`
        #[arg(last = true, required = true, value_name = "PROGRAM")]
        command: Vec<String>,
    },

    /// Route a Specctra DSN board through Freerouting
    Route {
        /// Configuration file path (YAML)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Board in Specctra DSN format
        #[arg(short, long, value_name = "FILE")]
        board: PathBuf,

        /// Where to write the routed session (default: next to the board)
        #[arg(long, value_name = "FILE")]
        session_out: Option<PathBuf>,

        /// Do not read stdin for a cancel
        #[arg(long)]
        headless: bool,
    },

    /// Validate a configuration and print the router command it produces
    Check {
        /// Configuration file path (YAML)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            grace,
            join_timeout,
            headless,
            command,
        } => {
            initialize_logging(level(args.debug, None));
            run(grace, join_timeout, headless, command)
        }
        Commands::Route {
            config,
            board,
            session_out,
            headless,
        } => route(args.debug, &config, board, session_out, headless),
        Commands::Check { config } => check(args.debug, &config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn level(debug: bool, configured: Option<&str>) -> &str {
    if debug {
        "debug"
    } else {
        configured.unwrap_or("info")
    }
}

fn initialize_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run(
    grace: Duration,
    join_timeout: Duration,
    headless: bool,
    argv: Vec<String>,
) -> Result<ExitCode> {
    let command = CommandLine::new(argv).ok_or_else(|| anyhow!("No program given"))?;
    let manager = InvocationManager::new(run_lifecycle(grace, join_timeout)?);

    let message = format!("Running {}", command.program());
    let mut surface = SignalCancel::new(select_surface(headless));
    let report = manager.invoke(command, &message, &mut surface)?;

    let invocation = report.invocation();
    std::io::stdout().write_all(invocation.stdout())?;
    std::io::stderr().write_all(invocation.stderr())?;

    Ok(exit_code(&report))
}

fn run_lifecycle(grace: Duration, join_timeout: Duration) -> Result<LifecycleConfig> {
    let lifecycle = LifecycleConfig {
        grace_window: grace,
        join_timeout,
    };
    lifecycle.validate().context("Invalid --grace/--join-timeout")?;
    Ok(lifecycle)
}

fn exit_code(report: &InvocationReport) -> ExitCode {
    match report.outcome() {
        InvocationOutcome::Completed(Some(0)) => ExitCode::SUCCESS,
        InvocationOutcome::Completed(code) => {
            warn!(exit_code = ?code, "Program failed");
            ExitCode::from(clamp_exit_code(*code))
        }
        InvocationOutcome::Cancelled => {
            info!("Cancelled");
            ExitCode::from(EXIT_CANCELLED)
        }
        InvocationOutcome::LaunchFailed(_) => {
            if let Some(message) = report.failure_message() {
                eprintln!("{}", message);
            }
            ExitCode::from(EXIT_LAUNCH_FAILED)
        }
    }
}

fn clamp_exit_code(code: Option<i32>) -> u8 {
    code.and_then(|c| u8::try_from(c).ok())
        .filter(|c| *c != 0)
        .unwrap_or(1)
}

fn route(
    debug: bool,
    config_path: &Path,
    board: PathBuf,
    session_out: Option<PathBuf>,
    headless: bool,
) -> Result<ExitCode> {
    let config = RouterConfig::load_from_file(config_path)?;
    initialize_logging(level(debug, Some(config.log_level.as_str())));
    info!("Config file: {}", config_path.display());

    let java = validate_environment(&config)?;
    info!(java = %java.display(), artifact = %config.artifact_path().display(), "Router environment OK");

    let mut host = match session_out {
        Some(out) => FileBoardHost::new(board, out),
        None => FileBoardHost::with_default_session(board),
    };

    let mut registry = PluginRegistry::new();
    registry.register(Box::new(FreeroutingPlugin::new(config)))?;

    let mut surface = SignalCancel::new(select_surface(headless));
    match registry.run(FreeroutingPlugin::NAME, &mut host, &mut surface) {
        Ok(RoundTripOutcome::Routed(_)) => {
            println!("Session written to {}", host.session_out().display());
            Ok(ExitCode::SUCCESS)
        }
        Ok(RoundTripOutcome::Cancelled) => {
            eprintln!("Routing cancelled, nothing imported");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(kfr_common::Error::Invocation(e)) => Ok(report_router_failure(&e)),
        Err(e) => Err(e.into()),
    }
}

fn report_router_failure(err: &InvocationError) -> ExitCode {
    error!("{}", err);
    match err {
        InvocationError::NonZeroExit {
            exit_code,
            stdout,
            stderr,
            ..
        } => {
            eprintln!("Freerouting failed with exit code {:?}", exit_code);
            eprintln!("--- stdout ---\n{}", stdout.trim_end());
            eprintln!("--- stderr ---\n{}", stderr.trim_end());
            ExitCode::from(clamp_exit_code(*exit_code))
        }
        InvocationError::LaunchFailed { .. } => {
            eprintln!("{}", err);
            ExitCode::from(EXIT_LAUNCH_FAILED)
        }
        _ => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn check(debug: bool, config_path: &Path) -> Result<ExitCode> {
    let config = RouterConfig::load_from_file(config_path)?;
    initialize_logging(level(debug, Some(config.log_level.as_str())));

    println!("Configuration OK: {}", config_path.display());
    let paths = RoundTripPaths::in_dir(Path::new("<board dir>"));
    let command = RouterCommand::from_config(&config, &paths).to_command_line();
    println!("Router command: {}", command);
    println!(
        "Lifecycle: grace window {:?}, join timeout {:?}",
        config.lifecycle.grace_window, config.lifecycle.join_timeout
    );

    let java = validate_environment(&config)?;
    println!("Java runtime: {}", java.display());
    Ok(ExitCode::SUCCESS)
}

fn select_surface(headless: bool) -> Box<dyn ProgressSurface> {
    if headless || !std::io::stdin().is_terminal() {
        Box::new(HeadlessSurface::new())
    } else {
        Box::new(TerminalSurface::new())
    }
}

/// Wraps a surface so SIGINT/SIGTERM (Ctrl+C on Windows) also cancel.
struct SignalCancel {
    inner: Box<dyn ProgressSurface>,
}

impl SignalCancel {
    fn new(inner: Box<dyn ProgressSurface>) -> Self {
        Self { inner }
    }
}

impl ProgressSurface for SignalCancel {
    fn open(&mut self, message: &str, cancel: CancelAction) {
        let on_signal = cancel.clone();
        let spawned = std::thread::Builder::new()
            .name("kfr-signal-cancel".to_string())
            .spawn(move || watch_signals(on_signal));
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start signal watcher");
        }
        self.inner.open(message, cancel);
    }

    fn close(&mut self, result: ModalResult) {
        self.inner.close(result);
    }
}

fn watch_signals(cancel: CancelAction) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!(error = %e, "Signal watcher runtime unavailable");
            return;
        }
    };

    if runtime.block_on(shutdown_signal()) {
        cancel.trigger();
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to install signal handlers");
                return false;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM signal");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT signal");
        }
    }
    true
}

#[cfg(windows)]
async fn shutdown_signal() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C signal");
            true
        }
        Err(e) => {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_requires_separator() {
        let args = Args::try_parse_from(["kfr-router", "run", "--", "echo", "-n", "hi"]).unwrap();
        match args.command {
            Commands::Run {
                command,
                grace,
                join_timeout,
                headless,
            } => {
                assert_eq!(command, vec!["echo", "-n", "hi"]);
                assert_eq!(grace, Duration::from_secs(3));
                assert_eq!(join_timeout, Duration::from_secs(10));
                assert!(!headless);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Args::try_parse_from(["kfr-router", "run"]).is_err());
    }

    #[test]
    fn test_run_join_must_cover_grace() {
        let err = run_lifecycle(Duration::from_secs(30), Duration::from_secs(1)).unwrap_err();
        assert!(format!("{:#}", err).contains("grace window"));

        let ok = run_lifecycle(Duration::from_secs(3), Duration::from_secs(10)).unwrap();
        assert_eq!(ok.join_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_run_durations() {
        let args = Args::try_parse_from([
            "kfr-router",
            "--debug",
            "run",
            "--grace",
            "250ms",
            "--join-timeout",
            "1m",
            "--headless",
            "--",
            "sleep",
            "1",
        ])
        .unwrap();
        assert!(args.debug);
        assert!(matches!(
            args.command,
            Commands::Run { grace, join_timeout, headless: true, .. }
                if grace == Duration::from_millis(250) && join_timeout == Duration::from_secs(60)
        ));
        assert!(Args::try_parse_from(["kfr-router", "run", "--grace", "soon", "--", "true"]).is_err());
    }

    #[test]
    fn test_route_args() {
        let args = Args::try_parse_from([
            "kfr-router",
            "route",
            "--config",
            "router.yaml",
            "--board",
            "board.dsn",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Commands::Route { session_out: None, headless: false, .. }
        ));
    }

    #[test]
    fn test_exit_code_clamping() {
        assert_eq!(clamp_exit_code(Some(3)), 3);
        assert_eq!(clamp_exit_code(Some(300)), 1);
        assert_eq!(clamp_exit_code(Some(-1)), 1);
        assert_eq!(clamp_exit_code(None), 1);
    }

    #[test]
    fn test_level_selection() {
        assert_eq!(level(true, Some("warn")), "debug");
        assert_eq!(level(false, Some("warn")), "warn");
        assert_eq!(level(false, None), "info");
    }
}
