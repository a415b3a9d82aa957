// ==============================================================================
// embudo_rust/src/lib.rs  v0.3
//
// Motor de embudo y cohorts para leads inmobiliarios.
//
//   load     →  Parquet (plano / gzip / zstd)  →  Table
//   ingest   →  Table x3  →  Dataset  (registros tipados, inmutable)
//   filter   →  Dataset + FilterSpec  →  vistas Vec<&T>
//   cohort / funnel / metrics  →  resultados serializables
//   cache    →  Engine: precómputo sin filtro + recálculo con filtro
//
// Con la feature `python` se exporta el módulo PyO3 `embudo_rust`.
// ==============================================================================

pub mod cache;
pub mod catalog;
pub mod cohort;
pub mod config;
pub mod error;
pub mod filter;
pub mod funnel;
pub mod geo;
pub mod ingest;
pub mod load;
pub mod logging;
pub mod metrics;
pub mod schema;
pub mod stages;
pub mod table;

#[cfg(feature = "python")]
mod python;

pub use cache::{Engine, EngineSlot, EngineStats, PrecomputeCache};
pub use catalog::FilterOptions;
pub use cohort::{CohortBucket, Heatmap};
pub use config::{EngineConfig, LogFormat};
pub use error::{EmbudoError, Result};
pub use filter::{FilterPipeline, FilterSpec};
pub use funnel::{FunnelResult, FunnelStageResult, TrendPoint, TrendResult};
pub use ingest::{ColumnReport, Dataset, DevelopmentRecord, InvestmentRecord, IsoWeek, LeadRecord};
pub use metrics::MetricsResult;
pub use stages::{Etapa, StageDefinition, STAGES};
