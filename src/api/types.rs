//! Tipos de dados para as respostas da API de relatórios e do dashboard.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato devolvido pelo backend (paginador do Laravel incluso).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status de um job de relatório no servidor.
///
/// O ciclo de vida é monotônico: `pending → processing → {completed|failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `true` para `completed` e `failed`, dos quais não há mais transição.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// `true` enquanto o servidor ainda pode mudar o status.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Posição no ciclo de vida; os dois estados terminais empatam.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Tipo de relatório solicitado. Valores desconhecidos caem em [`ReportType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Labs,
    Computers,
    Softwares,
    LabDetails,
    #[serde(other)]
    Other,
}

impl ReportType {
    /// Prefixo usado no nome do arquivo baixado.
    pub fn file_stem(self) -> &'static str {
        match self {
            ReportType::Labs => "laboratorios",
            ReportType::Computers => "computadores",
            ReportType::Softwares => "softwares",
            ReportType::LabDetails => "lab-detalhes",
            ReportType::Other => "relatorio",
        }
    }

    /// Rótulo legível para tabelas.
    pub fn label(self) -> &'static str {
        match self {
            ReportType::Labs => "Labs",
            ReportType::Computers => "Computers",
            ReportType::Softwares => "Software",
            ReportType::LabDetails => "Lab details",
            ReportType::Other => "Report",
        }
    }
}

/// Formato do arquivo gerado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Csv,
    Xlsx,
    /// Formato que este cliente não conhece; salvo como `.bin`.
    #[serde(other)]
    Other,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Csv => "csv",
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Other => "bin",
        }
    }
}

/// Um job de relatório assíncrono, como devolvido por `GET /reports/jobs`.
///
/// O cliente nunca altera estes campos; eles só mudam via nova busca.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportJob {
    /// Identificador numérico atribuído pelo servidor.
    pub id: u64,
    /// Tipo do relatório. Serializado como "type" no JSON.
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub status: JobStatus,
    #[serde(default)]
    pub file_path: Option<String>,
    /// Localizador para download; presente apenas quando `status = completed`.
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Filtros usados na geração (objeto JSON livre).
    #[serde(default)]
    pub filters: serde_json::Value,
}

impl ReportJob {
    /// `true` se o arquivo pode ser baixado agora.
    pub fn is_downloadable(&self) -> bool {
        self.status == JobStatus::Completed && self.download_url.is_some()
    }

    /// Nome do arquivo local: `{tipo}-{id}.{formato}`.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.{}",
            self.report_type.file_stem(),
            self.id,
            self.format.extension()
        )
    }

    /// Momento em que o job terminou, com sucesso ou falha.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.failed_at)
    }
}

/// `true` se algum job da lista ainda não chegou a um estado terminal.
pub fn has_active(jobs: &[ReportJob]) -> bool {
    jobs.iter().any(|job| job.status.is_active())
}

/// Parâmetros de paginação enviados em `GET /reports/jobs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
}

impl PageQuery {
    pub const MIN_PER_PAGE: u32 = 5;
    pub const MAX_PER_PAGE: u32 = 100;
    pub const DEFAULT_PER_PAGE: u32 = 20;

    /// Normaliza os valores da mesma forma que o servidor: página ≥ 1 e
    /// itens por página entre 5 e 100.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(Self::MIN_PER_PAGE, Self::MAX_PER_PAGE),
        }
    }

    /// Próxima página, ou `None` se já estiver na última.
    pub fn next(self, last_page: u32) -> Option<Self> {
        (self.page < last_page).then(|| Self::new(self.page + 1, self.per_page))
    }

    /// Página anterior, ou `None` na primeira.
    pub fn previous(self) -> Option<Self> {
        (self.page > 1).then(|| Self::new(self.page - 1, self.per_page))
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PER_PAGE)
    }
}

/// Envelope do paginador do Laravel para a lista de jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPage {
    #[serde(default)]
    pub data: Vec<ReportJob>,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub last_page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub to: Option<u64>,
}

impl JobPage {
    /// Extrai os metadados de paginação, preenchendo lacunas com os
    /// valores da consulta.
    pub fn meta(&self, query: PageQuery) -> PaginationMeta {
        PaginationMeta {
            current_page: self.current_page.unwrap_or(1),
            last_page: self.last_page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(query.per_page),
            total: self.total.unwrap_or(0),
            from: self.from.unwrap_or(0),
            to: self.to.unwrap_or(0),
        }
    }
}

/// Metadados de paginação já normalizados.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub from: u64,
    pub to: u64,
}

/// Médias de hardware agregadas pelo backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareAverages {
    #[serde(default)]
    pub cpu: Option<CpuAverages>,
    #[serde(default)]
    pub memory: Option<MemoryAverages>,
    #[serde(default)]
    pub disk: Option<DiskAverages>,
    #[serde(default)]
    pub computers_with_hardware_info: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuAverages {
    #[serde(default)]
    pub avg_physical_cores: Option<f64>,
    #[serde(default)]
    pub avg_logical_cores: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryAverages {
    #[serde(default)]
    pub avg_total_gb: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskAverages {
    #[serde(default)]
    pub avg_total_gb: Option<f64>,
    #[serde(default)]
    pub avg_used_gb: Option<f64>,
    #[serde(default)]
    pub avg_free_gb: Option<f64>,
    #[serde(default)]
    pub avg_usage_percent: Option<f64>,
}

/// Uma linha da distribuição de sistemas operacionais.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsDistribution {
    pub system: String,
    pub release: String,
    pub count: u64,
}

/// Resposta de `GET /dashboard/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_labs: u64,
    pub total_computers: u64,
    pub online_computers: u64,
    pub offline_computers: u64,
    #[serde(default)]
    pub total_softwares: Option<u64>,
    #[serde(default)]
    pub hardware_averages: Option<HardwareAverages>,
    #[serde(default)]
    pub os_distribution: Vec<OsDistribution>,
}
