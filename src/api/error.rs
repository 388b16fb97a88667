//! Tipos de erro para o cliente da API de relatórios.
//!
//! Define [`ApiError`] com variantes para rate limiting, erros HTTP,
//! falhas de rede e de decodificação. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a API.
///
/// A classificação guia o poller:
/// - [`RateLimited`](ApiError::RateLimited) desliga o timer (auto-throttle)
/// - [`Network`](ApiError::Network) e 5xx são transitórios e só vão para o log
/// - o resto é mostrado ao usuário quando a ação foi manual
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// O servidor retornou HTTP 429.
    /// `retry_after_secs` vem do cabeçalho `Retry-After`, quando presente.
    #[error("rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited {
        retry_after_secs: Option<u64>,
        message: Option<String>,
    },

    /// HTTP 401: token ausente ou expirado.
    /// `message` é o campo `message` do corpo JSON, se houver.
    #[error("unauthorized")]
    Unauthorized { message: Option<String> },

    /// Qualquer outra resposta fora de 2xx.
    /// `message` é o campo `message` do corpo JSON, se houver.
    #[error("API error (status {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Status {
        status: u16,
        message: Option<String>,
    },

    /// Falha na camada de rede (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// O corpo da resposta não corresponde ao formato esperado.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// O job ainda não tem arquivo para baixar.
    #[error("report job {0} has no file available for download")]
    NotAvailable(u64),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    }
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    /// Falhas que a próxima busca agendada pode resolver sozinha.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Mensagem enviada pelo servidor, quando existe.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::RateLimited { message, .. }
            | ApiError::Unauthorized { message }
            | ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = ApiError::RateLimited {
            retry_after_secs: Some(30),
            message: None,
        };
        assert_eq!(err.to_string(), "rate limited, retry after 30s");

        let err = ApiError::RateLimited {
            retry_after_secs: None,
            message: Some("Too Many Attempts.".into()),
        };
        assert_eq!(err.to_string(), "rate limited");
        assert_eq!(err.server_message(), Some("Too Many Attempts."));
    }

    #[test]
    fn status_error_display() {
        let err = ApiError::Status {
            status: 403,
            message: Some("Não autorizado".into()),
        };
        assert_eq!(err.to_string(), "API error (status 403): Não autorizado");

        let err = ApiError::Status {
            status: 500,
            message: None,
        };
        assert_eq!(err.to_string(), "API error (status 500): no message");
    }

    #[test]
    fn transient_classification() {
        assert!(ApiError::Network("connection refused".into()).is_transient());
        assert!(ApiError::Status { status: 502, message: None }.is_transient());
        assert!(!ApiError::Status { status: 404, message: None }.is_transient());
        assert!(!ApiError::RateLimited { retry_after_secs: None, message: None }.is_transient());
        assert!(ApiError::RateLimited { retry_after_secs: None, message: None }.is_rate_limited());
    }

    #[test]
    fn unauthorized_keeps_server_message() {
        let err = ApiError::Unauthorized {
            message: Some("Unauthenticated.".into()),
        };
        assert_eq!(err.to_string(), "unauthorized");
        assert_eq!(err.server_message(), Some("Unauthenticated."));
        assert!(!err.is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
