//! Subscriber de `tracing` para el motor.
//!
//! `RUST_LOG` manda si está definida; si no, la directiva de
//! `EngineConfig::log_filter`. Formato según `EngineConfig::log_format`.
//! Siempre a stderr: stdout es del proceso que embebe el motor.

use tracing_subscriber::EnvFilter;

use crate::config::{EngineConfig, LogFormat, DEFAULT_LOG_FILTER};

fn env_filter(config: &EngineConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Instala el subscriber global; si ya hay uno, no hace nada.
pub fn init(config: &EngineConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(true);

    let instalado = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Texto => builder.compact().try_init(),
    };
    if instalado.is_ok() {
        tracing::debug!(filtro = %config.log_filter, formato = ?config.log_format, "logging listo");
    }
}
