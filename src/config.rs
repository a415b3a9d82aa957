use std::env;
use std::path::PathBuf;

use crate::error::{EmbudoError, Result};

const DEFAULT_DATA_DIR:          &str = "data";
const DEFAULT_LEADS_FILE:        &str = "leads.parquet";
const DEFAULT_INVESTMENT_FILE:   &str = "inversion.parquet";
const DEFAULT_DEVELOPMENTS_FILE: &str = "desarrollos.parquet";
pub const DEFAULT_LOG_FILTER:    &str = "embudo_rust=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Texto,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub data_dir:          PathBuf,
    pub leads_file:        String,
    pub investment_file:   String,
    pub developments_file: String,
    /// Con `false` el cache queda vacío y toda consulta se calcula en vivo.
    pub precompute:        bool,
    /// Directiva `EnvFilter` usada si `RUST_LOG` no está definida.
    pub log_filter:        String,
    pub log_format:        LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir:          PathBuf::from(DEFAULT_DATA_DIR),
            leads_file:        DEFAULT_LEADS_FILE.to_string(),
            investment_file:   DEFAULT_INVESTMENT_FILE.to_string(),
            developments_file: DEFAULT_DEVELOPMENTS_FILE.to_string(),
            precompute:        true,
            log_filter:        DEFAULT_LOG_FILTER.to_string(),
            log_format:        LogFormat::Texto,
        }
    }
}

/// Carga `.env` (si existe) y luego lee las variables `EMBUDO_*`.
pub fn load() -> Result<EngineConfig> {
    let _ = dotenvy::dotenv();
    EngineConfig::from_env()
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|k| env::var(k).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();

        let precompute = match var("EMBUDO_PRECOMPUTE") {
            None => base.precompute,
            Some(v) => parse_bool(&v).ok_or_else(|| {
                EmbudoError::config(format!("EMBUDO_PRECOMPUTE no es booleano: `{v}`"))
            })?,
        };

        let log_format = match var("EMBUDO_LOG_FORMAT") {
            None => base.log_format,
            Some(v) => match v.trim().to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" | "texto" => LogFormat::Texto,
                _ => return Err(EmbudoError::config(format!("EMBUDO_LOG_FORMAT desconocido: `{v}`"))),
            },
        };

        let file = |key: &str, default: String| -> Result<String> {
            match var(key) {
                None => Ok(default),
                Some(v) if v.trim().is_empty() => {
                    Err(EmbudoError::config(format!("{key} está vacío")))
                }
                Some(v) => Ok(v.trim().to_string()),
            }
        };

        Ok(Self {
            data_dir: var("EMBUDO_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(base.data_dir),
            leads_file:        file("EMBUDO_LEADS_FILE", base.leads_file)?,
            investment_file:   file("EMBUDO_INVESTMENT_FILE", base.investment_file)?,
            developments_file: file("EMBUDO_DEVELOPMENTS_FILE", base.developments_file)?,
            precompute,
            log_filter: var("EMBUDO_LOG")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(base.log_filter),
            log_format,
        })
    }

    pub fn leads_path(&self) -> PathBuf {
        self.data_dir.join(&self.leads_file)
    }

    pub fn investment_path(&self) -> PathBuf {
        self.data_dir.join(&self.investment_file)
    }

    pub fn developments_path(&self) -> PathBuf {
        self.data_dir.join(&self.developments_file)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "si" | "sí" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
