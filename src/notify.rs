//! Notificações visíveis ao usuário.
//!
//! Falhas em ações manuais (atualizar, baixar, excluir) viram um [`Notice`]
//! entregue a um [`Notifier`]. Buscas silenciosas do poller nunca passam por
//! aqui; elas só vão para o log.

use std::sync::Arc;

use console::Style;

use crate::api::ApiError;

/// Severidade de uma notificação.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Uma notificação com título e descrição, no estilo de um toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub level: Level,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level: Level::Info,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level: Level::Error,
        }
    }

    /// Converte um erro da API em notificação.
    ///
    /// Prioridade: rate limit, erro de servidor (5xx), falha de conexão e,
    /// por fim, qualquer outro erro. A mensagem do servidor é usada quando
    /// existe; caso contrário, um texto genérico.
    pub fn from_api_error(err: &ApiError) -> Self {
        let server = err.server_message();
        match err {
            ApiError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Self::error("Too many requests", format!("Try again in {secs} seconds.")),
            ApiError::RateLimited { .. } => Self::error(
                "Too many requests",
                server.unwrap_or("Too many requests. Please wait a moment."),
            ),
            ApiError::Status { status, .. } if *status >= 500 => Self::error(
                "Server error",
                server.unwrap_or("Something went wrong on the server. Try again later."),
            ),
            ApiError::Network(_) => {
                Self::error("No connection", "Check your connection and try again.")
            }
            ApiError::NotAvailable(_) => {
                Self::error("Error", "File not available for download")
            }
            _ => Self::error("Error", server.unwrap_or("An error occurred. Try again.")),
        }
    }
}

/// Destino das notificações.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, notice: Notice) {
        (**self).notify(notice);
    }
}

/// Imprime notificações coloridas em stderr.
pub struct ConsoleNotifier {
    // Estilo verde para mensagens informativas.
    green: Style,
    // Estilo vermelho para erros.
    red: Style,
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            Level::Info => eprintln!(
                "  {} {}: {}",
                self.green.apply_to("✓"),
                notice.title,
                notice.description
            ),
            Level::Error => eprintln!(
                "  {} {}: {}",
                self.red.apply_to("✗"),
                notice.title,
                notice.description
            ),
        }
    }
}

/// Guarda as notificações em memória; usado nos testes.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    notices: std::sync::Mutex<Vec<Notice>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
