use std::io;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use dd_core::models::{LaunchEvent, LauncherConfig, RunReport};
use dd_core::services::host::HostResolver;
use dd_core::services::launcher::{self, ServiceLauncher};
use dd_core::services::listeners::HostProbe;
use dd_core::services::log_tailer::{self, LogLine};
use dd_core::services::orchestrator::Orchestrator;
use dd_core::services::prober::{PortProber, RetryPolicy};
use dd_core::services::state::ReportStore;
use dd_core::services::{config_loader, system};

use dd_cli::cli::{Cli, Command, StartArgs};
use dd_cli::console::{self, EventPrinter, Tag};
use dd_cli::summary;

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let _guard = setup_logging(cli.debug);

    let config = config_loader::load_or_default(cli.config.as_deref())?;
    let store = ReportStore::new(&cli.state_dir);

    match cli.subcommand() {
        Command::Start(args) => run_start(config, &store, args).await,
        Command::Stop => run_stop(&config, &store).await,
        Command::Status => run_status(&store).await,
        Command::Check => Ok(run_check(&config)),
        Command::Logs { service, lines } => run_logs(&config, &service, lines),
    }
}

/// `--debug` writes `debug`-level logs to `.ddistro-debug.log` in CWD;
/// otherwise logs go to stderr filtered by `RUST_LOG` (default `warn`).
/// Returns the guard that must be held alive for the duration of the program.
fn setup_logging(debug: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if debug {
        let file_appender = tracing_appender::rolling::never(".", ".ddistro-debug.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_ansi(false)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();

        None
    }
}

/// Full run: system services, service batch, report, wait, shutdown.
async fn run_start(
    config: LauncherConfig,
    store: &ReportStore,
    args: StartArgs,
) -> color_eyre::Result<ExitCode> {
    let color = console::use_color();
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<LaunchEvent>();
    let printer_task = tokio::spawn(async move {
        let mut printer = EventPrinter::new(io::stdout(), color);
        while let Some(event) = event_rx.recv().await {
            let _ = printer.handle(&event);
        }
    });

    system::start_services(&config.system_services, &event_tx).await;

    let prober = PortProber::new(
        HostProbe::for_method(config.probe.method),
        RetryPolicy::from(&config.probe),
    );
    let run_as = launcher::effective_run_as(&config);
    let launcher = ServiceLauncher::new(prober, run_as.clone(), event_tx);
    let orchestrator = Orchestrator::new(launcher);
    let resolver = HostResolver::from_override(config.host_address.clone());

    let report = orchestrator.run(&config.services, &resolver, &cancel).await;

    // The launcher owns the last event sender; dropping it lets the printer
    // drain and finish before the summary is written.
    drop(orchestrator);
    let _ = printer_task.await;

    let mut stdout = io::stdout();
    println!();
    summary::write(&mut stdout, &report, color)?;
    persist_report(store, &report, args.json.as_deref()).await;

    let required_failures = report.required_failures();
    if !required_failures.is_empty() {
        let names: Vec<&str> = required_failures
            .iter()
            .map(|s| s.spec.name.as_str())
            .collect();
        console::print(
            Tag::Error,
            &format!("Required services not available: {}", names.join(", ")),
        );
    }
    let strict_failure = args.strict && !required_failures.is_empty();
    let exit_code = if strict_failure {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    };

    if args.no_wait {
        signal_task.abort();
        return Ok(exit_code);
    }

    if !strict_failure && !cancel.is_cancelled() {
        console::print(Tag::Info, "Services are up. Press Ctrl-C to stop.");
        follow_logs(&report, &cancel, color).await;
    }
    signal_task.abort();

    console::print(Tag::Info, "Shutting down");
    let errors = system::shutdown(
        &config.system_services,
        run_as.as_deref(),
        &report.process_groups(),
    )
    .await;
    for error in errors {
        console::print(Tag::Warn, &error.to_string());
    }
    Ok(exit_code)
}

async fn persist_report(store: &ReportStore, report: &RunReport, json_path: Option<&Path>) {
    if let Err(e) = store.save(report).await {
        tracing::warn!(error = %e, path = %store.path().display(), "could not save run report");
    }
    if let Some(path) = json_path {
        let written = serde_json::to_string_pretty(report)
            .map_err(io::Error::from)
            .and_then(|json| std::fs::write(path, json));
        if let Err(e) = written {
            console::print(
                Tag::Warn,
                &format!("Could not write report to {}: {e}", path.display()),
            );
        }
    }
}

/// Echo the log files of reachable services until cancelled.
async fn follow_logs(report: &RunReport, cancel: &CancellationToken, color: bool) {
    let (log_tx, mut log_rx) = mpsc::unbounded_channel::<LogLine>();
    let handles: Vec<_> = report
        .statuses
        .iter()
        .filter(|s| s.reachable)
        .filter_map(|s| {
            let path = s.spec.log_file.clone()?;
            Some(log_tailer::start_tailing(
                path,
                s.spec.name.clone(),
                log_tx.clone(),
            ))
        })
        .collect();
    drop(log_tx);

    let mut printer = EventPrinter::new(io::stdout(), color);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = log_rx.recv() => match line {
                Some(line) => {
                    let _ = printer.log_line(&line);
                }
                // nothing to follow, just wait for the signal
                None => {
                    cancel.cancelled().await;
                    break;
                }
            },
        }
    }

    for handle in handles {
        handle.abort();
    }
}

async fn run_stop(config: &LauncherConfig, store: &ReportStore) -> color_eyre::Result<ExitCode> {
    let process_groups = match store.load().await {
        Ok(report) => report.map(|r| r.process_groups()).unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "could not read last run report");
            Vec::new()
        }
    };
    let run_as = launcher::effective_run_as(config);
    let errors =
        system::shutdown(&config.system_services, run_as.as_deref(), &process_groups).await;
    if errors.is_empty() {
        console::print(Tag::Success, "Services stopped");
        return Ok(ExitCode::SUCCESS);
    }
    for error in &errors {
        console::print(Tag::Warn, &error.to_string());
    }
    Ok(ExitCode::FAILURE)
}

async fn run_status(store: &ReportStore) -> color_eyre::Result<ExitCode> {
    match store.load().await? {
        Some(report) => {
            summary::write(&mut io::stdout(), &report, console::use_color())?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            console::print(
                Tag::Warn,
                &format!("No run recorded at {}", store.path().display()),
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_check(config: &LauncherConfig) -> ExitCode {
    console::print(
        Tag::Success,
        &format!("Configuration is valid ({} services)", config.services.len()),
    );
    match (&config.run_as, launcher::effective_run_as(config)) {
        (_, Some(user)) => console::print(Tag::Info, &format!("Services run as {user}")),
        (Some(user), None) => console::print(
            Tag::Warn,
            &format!("Not root: services run as the current user instead of {user}"),
        ),
        (None, None) => {}
    }
    for spec in &config.services {
        let installed = spec.locate_start_artifact().is_some();
        let tag = if installed { Tag::Info } else { Tag::Warn };
        let state = if installed { "installed" } else { "not installed" };
        let required = if spec.required { ", required" } else { "" };
        console::print(
            tag,
            &format!("{} port {} ({state}{required})", spec.name, spec.check_port),
        );
    }
    ExitCode::SUCCESS
}

fn run_logs(config: &LauncherConfig, service: &str, lines: usize) -> color_eyre::Result<ExitCode> {
    let spec = config
        .service(service)
        .ok_or_else(|| dd_core::OrchestratorError::ServiceNotFound(service.to_string()))?;
    let Some(log_file) = &spec.log_file else {
        console::print(Tag::Warn, &format!("{service} has no log_file configured"));
        return Ok(ExitCode::FAILURE);
    };
    println!("{}", log_tailer::read_tail(log_file, lines));
    Ok(ExitCode::SUCCESS)
}

/// Wait for SIGINT or SIGTERM.
///
/// SIGTERM is what `docker stop` sends to the container's main process.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT");
        }
        () = terminate => {
            tracing::info!("received SIGTERM");
        }
    }
}
