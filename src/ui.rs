//! Saída de terminal: tabela de jobs, resumo do dashboard e spinner.
//!
//! Usa `console` para cores e `indicatif` para o spinner exibido enquanto
//! o poller acompanha jobs ativos.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use console::{Style, pad_str, Alignment};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{DashboardStats, JobStatus, PaginationMeta, ReportJob};
use crate::poller::{PollerSnapshot, PollerState};

// Larguras das colunas da tabela de jobs.
const COLUMNS: [(&str, usize); 7] = [
    ("ID", 6),
    ("Type", 12),
    ("Format", 7),
    ("Status", 11),
    ("Created", 17),
    ("Finished", 17),
    ("Actions", 0),
];

/// Rótulo e estilo de cada status.
fn status_cell(status: JobStatus) -> (String, Style) {
    match status {
        JobStatus::Pending => ("Pending".into(), Style::new().yellow()),
        JobStatus::Processing => ("Processing".into(), Style::new().cyan()),
        JobStatus::Completed => ("Completed".into(), Style::new().green()),
        JobStatus::Failed => ("Failed".into(), Style::new().red()),
    }
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn action_cell(job: &ReportJob) -> String {
    match job.status {
        JobStatus::Completed if job.download_url.is_some() => {
            format!("download: iflab-reports download {}", job.id)
        }
        JobStatus::Failed => job
            .error_message
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string()),
        _ => "Waiting...".to_string(),
    }
}

fn cell(text: &str, width: usize) -> String {
    if width == 0 {
        text.to_string()
    } else {
        pad_str(text, width, Alignment::Left, Some("…")).into_owned()
    }
}

/// Monta a tabela de jobs como texto, pronta para imprimir.
pub fn render_jobs(jobs: &[ReportJob], pagination: Option<&PaginationMeta>) -> String {
    if jobs.is_empty() {
        return "No reports found\n".to_string();
    }

    let bold = Style::new().bold();
    let mut out = String::new();
    let header: Vec<String> = COLUMNS.iter().map(|(name, w)| cell(name, *w)).collect();
    let _ = writeln!(out, "{}", bold.apply_to(header.join(" ").trim_end()));

    for job in jobs {
        let (label, style) = status_cell(job.status);
        let row = [
            cell(&format!("#{}", job.id), COLUMNS[0].1),
            cell(job.report_type.label(), COLUMNS[1].1),
            cell(&job.format.extension().to_uppercase(), COLUMNS[2].1),
            style.apply_to(cell(&label, COLUMNS[3].1)).to_string(),
            cell(&format_time(Some(job.created_at)), COLUMNS[4].1),
            cell(&format_time(job.finished_at()), COLUMNS[5].1),
            action_cell(job),
        ];
        let _ = writeln!(out, "{}", row.join(" "));
    }

    if let Some(meta) = pagination
        && meta.last_page > 1
    {
        let _ = writeln!(
            out,
            "\nShowing {} to {} of {} records, page {} of {}",
            meta.from, meta.to, meta.total, meta.current_page, meta.last_page
        );
    }
    out
}

/// Resumo do dashboard em poucas linhas.
pub fn render_dashboard(stats: &DashboardStats) -> String {
    let mut out = String::new();
    let bold = Style::new().bold();
    let _ = writeln!(out, "{}", bold.apply_to("Dashboard overview"));
    let _ = writeln!(out, "  Labs:      {}", stats.total_labs);
    let _ = writeln!(
        out,
        "  Computers: {} ({} online, {} offline)",
        stats.total_computers,
        Style::new().green().apply_to(stats.online_computers),
        Style::new().red().apply_to(stats.offline_computers)
    );
    if let Some(total) = stats.total_softwares {
        let _ = writeln!(out, "  Software:  {total}");
    }
    if let Some(disk) = stats.hardware_averages.as_ref().and_then(|h| h.disk.as_ref())
        && let Some(usage) = disk.avg_usage_percent
    {
        let _ = writeln!(out, "  Disk use:  {usage:.1}% average");
    }
    for os in &stats.os_distribution {
        let _ = writeln!(out, "  {} {}: {}", os.system, os.release, os.count);
    }
    out
}

/// Ajuda mostrada no início de `watch`.
pub const WATCH_HELP: &str = "Type r + Enter to refresh, n/p for next/previous page, q to quit.";

/// Spinner exibido durante `watch`.
pub struct WatchProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    period: Duration,
}

impl WatchProgress {
    pub fn start(period: Duration) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.println(WATCH_HELP);
        pb.set_message("Loading report jobs...");
        Self { pb, period }
    }

    /// Redesenha a tabela acima do spinner e atualiza a mensagem.
    pub fn update(&self, snapshot: &PollerSnapshot) {
        self.pb
            .println(render_jobs(&snapshot.jobs, snapshot.pagination.as_ref()));
        self.pb.set_message(status_line(snapshot, self.period));
    }

    pub fn finish(&self, message: &str) {
        self.pb.finish_with_message(message.to_string());
    }
}

/// Linha de status do spinner para um snapshot.
pub fn status_line(snapshot: &PollerSnapshot, period: Duration) -> String {
    let active = snapshot.jobs.iter().filter(|j| j.status.is_active()).count();
    match (snapshot.state, &snapshot.last_error) {
        (PollerState::Polling, _) => format!(
            "{active} active report job(s), refreshing every {}s",
            period.as_secs()
        ),
        (PollerState::Idle, Some(err)) => format!("Polling paused: {err}"),
        (PollerState::Idle, None) => "All report jobs finished".to_string(),
    }
}
