mod api;
mod cli;
mod config;
mod dashboard;
mod download;
mod error;
mod notify;
mod poller;
mod realtime;
mod ui;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::Term;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use api::{PageQuery, ReportsClient};
use cli::{Cli, Command, PageArgs, WatchInput};
use config::ReportsConfig;
use dashboard::DashboardMonitor;
use error::AppError;
use notify::{ConsoleNotifier, Notice, Notifier};
use poller::{JobPoller, PollerSettings, PollerState};
use realtime::RealtimeChannel;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => ReportsConfig::load_from(path)?,
        None => ReportsConfig::load()?,
    };
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }

    let client = Arc::new(ReportsClient::new(
        config.base_url.clone(),
        config.token(),
        config.request_timeout(),
    )?);
    tracing::debug!(base_url = client.base_url(), "reports client ready");
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::default());

    match cli.command {
        Command::Jobs { page } => {
            let query = page_query(page, &config);
            match client.list_jobs(query).await {
                Ok(page) => print!("{}", ui::render_jobs(&page.data, Some(&page.meta(query)))),
                Err(err) => {
                    notifier.notify(Notice::from_api_error(&err));
                    return Err(AppError::from(err).into());
                }
            }
        }
        Command::Watch { page, until_done } => {
            watch(client, notifier, &config, page_query(page, &config), until_done).await?;
        }
        Command::Download { id, output } => {
            let job = client
                .get_job(id)
                .await
                .map_err(|err| AppError::from_lookup(id, err))?;
            let dir = output.unwrap_or_else(|| config.download_dir.clone());
            download::download_report(&client, &job, &dir, notifier.as_ref()).await?;
        }
        Command::Delete { id, yes } => {
            let job = client
                .get_job(id)
                .await
                .map_err(|err| AppError::from_lookup(id, err))?;
            if !yes && !confirm_delete(&job)? {
                println!("Cancelled.");
                return Ok(());
            }
            // The poller deletes, notifies and re-fetches the first page.
            let settings = PollerSettings {
                period: config.poll_interval(),
                query: PageQuery::new(1, config.per_page),
            };
            let handle = JobPoller::new(client, notifier, settings).spawn();
            let result = handle.delete(id).await;
            let snapshot = handle.snapshot();
            handle.shutdown().await;
            result?;
            print!("{}", ui::render_jobs(&snapshot.jobs, snapshot.pagination.as_ref()));
        }
        Command::Dashboard { events } => {
            dashboard(client, &config, events.as_deref()).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,iflab_reports=debug"
    } else {
        "warn,iflab_reports=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn page_query(args: PageArgs, config: &ReportsConfig) -> PageQuery {
    PageQuery::new(args.page, args.per_page.unwrap_or(config.per_page))
}

fn confirm_delete(job: &api::ReportJob) -> Result<bool> {
    let file_note = if job.status == api::JobStatus::Completed && job.file_path.is_some() {
        " and its generated file will be removed"
    } else {
        ""
    };
    let term = Term::stderr();
    term.write_line(&format!(
        "Delete report #{} ({})? The job will be removed from the list{file_note}. [y/N]",
        job.id,
        job.file_name()
    ))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

async fn watch(
    client: Arc<ReportsClient>,
    notifier: Arc<dyn Notifier>,
    config: &ReportsConfig,
    query: PageQuery,
    until_done: bool,
) -> Result<()> {
    let settings = PollerSettings {
        period: config.poll_interval(),
        query,
    };
    let handle = JobPoller::new(client, notifier, settings).spawn();
    let mut updates = handle.subscribe();
    let mut input = spawn_watch_input();
    let mut input_open = true;
    let progress = ui::WatchProgress::start(settings.period);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                progress.update(&snapshot);
                if until_done && snapshot.fetches > 0 && snapshot.state == PollerState::Idle {
                    break;
                }
            }
            line = input.recv(), if input_open => {
                let Some(command) = line else {
                    input_open = false;
                    continue;
                };
                let snapshot = handle.snapshot();
                let last_page = snapshot.pagination.map_or(1, |meta| meta.last_page);
                // Failures were already notified by the poller.
                let result = match command {
                    WatchInput::Refresh => handle.refresh().await,
                    WatchInput::NextPage => match snapshot.query.next(last_page) {
                        Some(query) => handle.set_page(query).await,
                        None => Ok(()),
                    },
                    WatchInput::PreviousPage => match snapshot.query.previous() {
                        Some(query) => handle.set_page(query).await,
                        None => Ok(()),
                    },
                    WatchInput::Quit => break,
                };
                if let Err(err) = result {
                    tracing::debug!(error = %err, ?command, "watch command failed");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    let snapshot = handle.snapshot();
    tracing::debug!(timers = handle.active_timers(), "stopping watch");
    progress.finish(&ui::status_line(&snapshot, settings.period));
    handle.shutdown().await;
    Ok(())
}

/// Reads watch commands from stdin on a plain thread, so a pending read
/// never holds up runtime shutdown.
fn spawn_watch_input() -> mpsc::UnboundedReceiver<WatchInput> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            match WatchInput::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => tracing::debug!(input = line.trim(), "unknown watch command"),
            }
        }
    });
    rx
}

async fn dashboard(
    client: Arc<ReportsClient>,
    config: &ReportsConfig,
    events: Option<&Path>,
) -> Result<()> {
    let channel = RealtimeChannel::default();
    let monitor = DashboardMonitor::new(
        client,
        config.dashboard_interval(),
        events.map(|_| channel.subscribe()),
    );
    let handle = monitor.spawn();

    let feeder = events.map(|path| {
        let channel = channel.clone();
        let path = path.to_path_buf();
        tokio::spawn(async move {
            let result = if path == Path::new("-") {
                realtime::feed_frames(tokio::io::BufReader::new(tokio::io::stdin()), &channel)
                    .await
            } else {
                match tokio::fs::File::open(&path).await {
                    Ok(file) => {
                        realtime::feed_frames(tokio::io::BufReader::new(file), &channel).await
                    }
                    Err(err) => Err(err),
                }
            };
            match result {
                Ok(n) => tracing::info!(published = n, "realtime frame source finished"),
                Err(err) => tracing::error!(error = %err, "realtime frame source failed"),
            }
        })
    });

    let mut updates = handle.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                match (&snapshot.stats, &snapshot.last_error) {
                    (Some(stats), _) => print!("{}", ui::render_dashboard(stats)),
                    (None, Some(err)) => eprintln!("Failed to load dashboard: {err}"),
                    (None, None) => println!("Loading dashboard..."),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    if let Some(feeder) = feeder {
        feeder.abort();
    }
    let snapshot = handle.snapshot();
    handle.shutdown().await;
    tracing::info!(
        refreshes = snapshot.refreshes,
        push_refreshes = snapshot.push_refreshes,
        subscribers = channel.subscriber_count(),
        "dashboard stopped"
    );
    Ok(())
}
