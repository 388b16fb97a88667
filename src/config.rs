//! Configuração do cliente carregada a partir de `iflab.toml`.
//!
//! A struct [`ReportsConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `IFLAB_API_TOKEN` e `IFLAB_BASE_URL` têm
//! precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

use crate::api::{DEFAULT_BASE_URL, PageQuery};
use crate::dashboard::DEFAULT_DASHBOARD_PERIOD;
use crate::poller::DEFAULT_POLL_PERIOD;

pub const CONFIG_FILE: &str = "iflab.toml";

/// Configuração de nível superior carregada de `iflab.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    /// URL base da API (inclui o prefixo `/api/v1`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token Bearer do Sanctum.
    #[serde(default)]
    pub api_token: String,

    /// Intervalo entre buscas silenciosas de jobs ativos, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Intervalo de atualização do dashboard, em segundos.
    #[serde(default = "default_dashboard_interval_secs")]
    pub dashboard_interval_secs: u64,

    /// Itens por página na listagem de jobs.
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Timeout de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Diretório onde os relatórios baixados são gravados.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

// Valor padrão para a URL base: servidor local de desenvolvimento.
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// Valor padrão para o polling: 10s, abaixo do limite de 60 req/min do servidor.
fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_PERIOD.as_secs()
}

// Valor padrão para o dashboard: 30s.
fn default_dashboard_interval_secs() -> u64 {
    DEFAULT_DASHBOARD_PERIOD.as_secs()
}

// Valor padrão para itens por página: 20.
fn default_per_page() -> u32 {
    PageQuery::DEFAULT_PER_PAGE
}

// Valor padrão para o timeout: 30s.
fn default_request_timeout_secs() -> u64 {
    30
}

// Valor padrão para downloads: diretório atual.
fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            dashboard_interval_secs: default_dashboard_interval_secs(),
            per_page: default_per_page(),
            request_timeout_secs: default_request_timeout_secs(),
            download_dir: default_download_dir(),
        }
    }
}

impl ReportsConfig {
    /// Carrega a configuração de `iflab.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega de um caminho explícito; arquivo ausente equivale a defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<ReportsConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variáveis de ambiente têm precedência sobre o arquivo de configuração.
        if let Ok(token) = std::env::var("IFLAB_API_TOKEN")
            && !token.is_empty()
        {
            config.api_token = token;
        }
        if let Ok(url) = std::env::var("IFLAB_BASE_URL")
            && !url.is_empty()
        {
            config.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejeita intervalos zerados, que fariam o poller girar sem pausa.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        if self.dashboard_interval_secs == 0 {
            bail!("dashboard_interval_secs must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn dashboard_interval(&self) -> Duration {
        Duration::from_secs(self.dashboard_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Token como `Option`, vazio vira `None`.
    pub fn token(&self) -> Option<String> {
        (!self.api_token.is_empty()).then(|| self.api_token.clone())
    }
}
