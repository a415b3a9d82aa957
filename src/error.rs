use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbudoError>;

#[derive(Debug, Error)]
pub enum EmbudoError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("descompresión {formato}: {detalle}")]
    Decompress { formato: &'static str, detalle: String },

    #[error("no se pudo cargar la tabla `{tabla}`: {detalle}")]
    MissingTable { tabla: String, detalle: String },

    #[error("la tabla `{0}` no tiene columnas")]
    EmptyTable(String),

    #[error("etapa desconocida: `{0}`")]
    UnknownStage(String),

    #[error("filtro inválido: {0}")]
    InvalidFilter(String),

    #[error("configuración: {0}")]
    Config(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl EmbudoError {
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    pub fn missing_table<E: std::fmt::Display>(tabla: &str, e: E) -> Self {
        Self::MissingTable { tabla: tabla.to_string(), detalle: e.to_string() }
    }

    /// Errores de arranque: sin dataset no hay motor.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EmbudoError::Io(_)
                | EmbudoError::Parquet(_)
                | EmbudoError::Arrow(_)
                | EmbudoError::Decompress { .. }
                | EmbudoError::MissingTable { .. }
                | EmbudoError::EmptyTable(_)
                | EmbudoError::Config(_)
        )
    }
}
