//! Process startup: configuration, logging, wiring and the analysis run

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;

use super::cli::{render_json, render_text, Args, OutputFormat, ProjectReport, Settings, TOKEN_ENV_VAR};
use super::spinner::{run_status_reporter, should_show_spinner};
use super::workspace::LocalWorkspace;
use crate::bundle::{AnalysisApi, BundleSyncEngine, HttpAnalysisApi, SyncOutcome};
use crate::content::{ContentSource, ContentStore, Workspace};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::{init_logging, reconfigure_logging};
use crate::core::model::ProjectId;
use crate::ignore::IgnoreEngine;
use crate::notifications::{EventBus, EventFilter};
use crate::scan::{FileCollector, LogPresenter, OrchestratorConfig, ScanOrchestrator, SupportedFiles};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INCOMPLETE: i32 = 2;

/// Per-request HTTP timeout; polling has its own overall deadline
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const WAIT_INTERVAL: Duration = Duration::from_millis(200);
/// Follow-up rescans after a failed analysis before giving up
const MAX_FOLLOWUP_RESCANS: usize = 2;

/// Run the command line application and return the process exit code
pub fn startup() -> i32 {
    let cli = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    EXIT_SUCCESS
                }
                _ => EXIT_FAILURE,
            };
        }
    };

    // Stage 1: logging from the command line alone
    let use_color = cli
        .color_override()
        .unwrap_or_else(|| std::io::stdout().is_terminal());
    colored::control::set_override(use_color);
    let log_file = cli.log_file.as_ref().map(|p| p.to_string_lossy().into_owned());
    if let Err(e) = init_logging(
        Some(cli.log_level.as_deref().unwrap_or("warn")),
        cli.log_format.as_deref(),
        log_file.as_deref().filter(|f| !f.eq_ignore_ascii_case("none") && *f != "-"),
        use_color,
    ) {
        eprintln!("Error: failed to initialise logging: {}", e);
    }
    log::debug!(
        "bundlesync {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        crate::GIT_HASH,
        crate::BUILD_TIME
    );

    // Stage 2: configuration file, command line on top
    let settings = match resolve_settings(cli) {
        Ok(settings) => settings,
        Err(e) => {
            log_error_with_context(&e, "Loading configuration");
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
    };
    if let Some(level) = &settings.log_level {
        if let Err(e) = reconfigure_logging(level) {
            log::warn!("Could not apply log level '{}': {}", level, e);
        }
    }
    let use_color = settings.color.unwrap_or(use_color);
    colored::control::set_override(use_color);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return EXIT_FAILURE;
        }
    };
    runtime.block_on(run(settings, use_color))
}

fn resolve_settings(cli: Args) -> super::cli::ConfigResult<Settings> {
    let mut args = Args::new();
    if let Some(config) = Args::load_config_file(cli.config_file.as_deref())? {
        Args::apply_toml_values(&mut args, &config)?;
    }
    args.merge_command_line(cli);
    log::debug!("Effective arguments: {:?}", args.project_dir);
    args.into_settings(std::env::var(TOKEN_ENV_VAR).ok())
}

async fn run(settings: Settings, use_color: bool) -> i32 {
    let workspace = Arc::new(LocalWorkspace::new());
    let project = match workspace.add_root(&settings.project_dir) {
        Ok(project) => project,
        Err(e) => {
            eprintln!(
                "Error: cannot open project directory {}: {}",
                settings.project_dir.display(),
                e
            );
            return EXIT_FAILURE;
        }
    };

    let api: Arc<dyn AnalysisApi> =
        match HttpAnalysisApi::new(&settings.api_url, settings.token.clone(), HTTP_TIMEOUT) {
            Ok(api) => Arc::new(api),
            Err(e) => {
                log_error_with_context(&e, "Creating analysis service client");
                eprintln!("Error: {}", e);
                return EXIT_FAILURE;
            }
        };

    let source: Arc<dyn ContentSource> = workspace.clone();
    let tracked: Arc<dyn Workspace> = workspace.clone();
    let events = Arc::new(EventBus::new());
    let content = Arc::new(ContentStore::new(Arc::clone(&source)));
    let engine = Arc::new(BundleSyncEngine::new(
        settings.sync.clone(),
        Arc::clone(&api),
        Arc::clone(&tracked),
        content,
        Arc::clone(&events),
    ));

    let supported = SupportedFiles::from_filters(api.as_ref(), &settings.token).await;
    let ignore = Arc::new(IgnoreEngine::new(source));
    let files = Arc::new(FileCollector::new(
        tracked,
        ignore,
        supported,
        settings.sync.max_file_size,
    ));
    let orchestrator = ScanOrchestrator::new(
        OrchestratorConfig::default(),
        Arc::clone(&engine),
        files,
        Arc::new(LogPresenter),
    );
    let listener = orchestrator.spawn_event_listener();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let warnings = events.subscribe("cli-status", EventFilter::WarningsOnly, "startup");
    let reporter = tokio::spawn(run_status_reporter(
        warnings,
        shutdown_rx,
        should_show_spinner(),
        use_color,
    ));
    let interrupted = spawn_interrupt_handler(Arc::clone(&orchestrator), project.clone());

    let completed = analyse(&orchestrator, &events, &project, &interrupted).await;

    let _ = shutdown_tx.send(true);
    let _ = reporter.await;
    listener.abort();

    if !completed {
        eprintln!("Analysis of {} was interrupted", project);
        return EXIT_INCOMPLETE;
    }

    let exit_code = match orchestrator.last_outcome(&project) {
        Some(SyncOutcome::NothingToDo) | Some(SyncOutcome::Updated { .. }) => EXIT_SUCCESS,
        Some(SyncOutcome::Aborted(reason)) => {
            eprintln!("Analysis of {} incomplete: {}", project, reason);
            EXIT_INCOMPLETE
        }
        None => {
            eprintln!("Analysis of {} did not produce results", project);
            EXIT_INCOMPLETE
        }
    };

    let report = ProjectReport::collect(&engine, &project);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let written = match settings.output {
        OutputFormat::Text => render_text(&report, &mut out, use_color),
        OutputFormat::Json => render_json(&report, &mut out),
    };
    if let Err(e) = written {
        log::error!("Failed to write results: {}", e);
        return EXIT_FAILURE;
    }
    exit_code
}

/// Run one bulk rescan and wait for any follow-up rescans it triggers
///
/// Returns false when interrupted or when follow-ups did not settle.
async fn analyse(
    orchestrator: &Arc<ScanOrchestrator>,
    events: &EventBus,
    project: &ProjectId,
    interrupted: &AtomicBool,
) -> bool {
    let mut rescans = events.subscribe("cli-rescans", EventFilter::RescanOnly, "startup");
    orchestrator.engine().add_project(project);

    if let Some(handle) = orchestrator.rescan_delayed(project, Duration::ZERO, true, false) {
        if let Err(e) = handle.await {
            log::error!("Analysis task failed: {}", e);
        }
    }

    let mut followups = 0;
    loop {
        tokio::time::sleep(WAIT_INTERVAL).await;
        while rescans.try_recv().is_ok() {
            followups += 1;
        }
        if interrupted.load(Ordering::Acquire) {
            return false;
        }
        if followups > MAX_FOLLOWUP_RESCANS {
            log::warn!("Giving up on {} after {} follow-up rescans", project, followups);
            orchestrator.cancel_all(project);
            return false;
        }
        if !orchestrator.is_full_rescan_requested(project) && orchestrator.running_count(project) == 0
        {
            return true;
        }
    }
}

/// First Ctrl-C cancels the analysis, a second one exits immediately
fn spawn_interrupt_handler(orchestrator: Arc<ScanOrchestrator>, project: ProjectId) -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    let signal_count = AtomicUsize::new(0);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if signal_count.fetch_add(1, Ordering::AcqRel) >= 1 {
                log::warn!("Ctrl-C received; exiting");
                std::process::exit(130);
            }
            log::info!("Interrupt received, cancelling analysis of {}", project);
            flag.store(true, Ordering::Release);
            orchestrator.cancel_all(&project);
        }
    });
    interrupted
}
