//! Interface de linha de comando baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (jobs, watch,
//! download, delete, dashboard) e flags globais (--config, --base-url,
//! --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Acompanha jobs de relatório e o dashboard da API IFLab.
#[derive(Debug, Parser)]
#[command(name = "iflab-reports", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./iflab.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Sobrescreve a URL base da API.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Paginação comum a `jobs` e `watch`.
#[derive(Debug, Clone, Copy, clap::Args)]
pub struct PageArgs {
    /// Página a exibir.
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Itens por página (5 a 100).
    #[arg(long)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lista os jobs de relatório uma vez.
    Jobs {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Acompanha os jobs, buscando de novo enquanto houver jobs ativos.
    Watch {
        #[command(flatten)]
        page: PageArgs,

        /// Sai assim que nenhum job estiver pendente ou em processamento.
        #[arg(long, default_value_t = false)]
        until_done: bool,
    },

    /// Baixa o arquivo de um job concluído.
    Download {
        /// Identificador do job.
        id: u64,

        /// Diretório de destino (padrão: `download_dir` da configuração).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Exclui um job e o arquivo gerado.
    Delete {
        /// Identificador do job.
        id: u64,

        /// Não pede confirmação.
        #[arg(long, short, default_value_t = false)]
        yes: bool,
    },

    /// Mostra as estatísticas do dashboard ao vivo.
    Dashboard {
        /// Arquivo com frames de eventos em tempo real, um por linha (`-` para stdin).
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

/// Comandos digitados durante `watch`, um por linha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchInput {
    /// `r`: busca manual; retoma o polling após um rate limit.
    Refresh,
    /// `n`: próxima página.
    NextPage,
    /// `p`: página anterior.
    PreviousPage,
    /// `q`: encerra.
    Quit,
}

impl WatchInput {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "r" | "refresh" => Some(Self::Refresh),
            "n" | "next" => Some(Self::NextPage),
            "p" | "prev" | "previous" => Some(Self::PreviousPage),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}
