// ===========================================================================
// CARGA: bytes (parquet, opcionalmente gzip/zstd) → Table
//
//   read_table(bytes)      → una tabla, todas sus columnas
//   load_dataset(config)   → las tres tablas del disco → Dataset
//
// Un archivo que no se pueda leer aborta el arranque. Celdas nulas o de
// tipos no soportados nunca son error: quedan en `None` o se omite la columna.
// ===========================================================================

use std::io::{Cursor, Read};
use std::path::Path;

use arrow_array::{
    Array, ArrayRef,
    BooleanArray, Date32Array, Date64Array,
    Float32Array, Float64Array,
    Int8Array, Int16Array, Int32Array, Int64Array,
    LargeStringArray, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray,
    UInt8Array, UInt16Array, UInt32Array, UInt64Array,
};
use arrow_schema::{DataType, TimeUnit};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EmbudoError, Result};
use crate::geo::CiudadesMexico;
use crate::ingest::Dataset;
use crate::table::{Column, ColumnData, Table};

// ---------------------------------------------------------------------------
// DESCOMPRESIÓN
// ---------------------------------------------------------------------------
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
        let mut dec = flate2::read::GzDecoder::new(Cursor::new(data));
        let mut out = Vec::new();
        dec.read_to_end(&mut out).map_err(|e| EmbudoError::Decompress {
            formato: "gzip",
            detalle: e.to_string(),
        })?;
        Ok(out)
    } else if data.len() >= 4 && &data[0..4] == b"\xfd\x2f\xb5\x28" {
        zstd::decode_all(Cursor::new(data)).map_err(|e| EmbudoError::Decompress {
            formato: "zstd",
            detalle: e.to_string(),
        })
    } else {
        Ok(data.to_vec())
    }
}

// ---------------------------------------------------------------------------
// PARQUET → Table
// ---------------------------------------------------------------------------
pub fn read_table(name: &str, raw: &[u8]) -> Result<Table> {
    let plain = decompress_bytes(raw)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(plain))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    // una entrada por columna del esquema; None = tipo no soportado
    let mut acumulado: Vec<Option<ColumnData>> = schema
        .fields()
        .iter()
        .map(|f| empty_for(f.data_type()))
        .collect();

    for (field, slot) in schema.fields().iter().zip(&acumulado) {
        if slot.is_none() {
            warn!(tabla = name, columna = %field.name(), tipo = ?field.data_type(),
                  "tipo de columna no soportado, se omite");
        }
    }

    for batch in reader {
        let batch = batch?;
        for (idx, slot) in acumulado.iter_mut().enumerate() {
            if let Some(data) = slot.as_mut() {
                append_array(data, batch.column(idx));
            }
        }
    }

    let mut table = Table::new(name);
    for (field, slot) in schema.fields().iter().zip(acumulado) {
        if let Some(data) = slot {
            table.push_column(Column { name: field.name().clone(), data })?;
        }
    }
    if table.columns().is_empty() {
        return Err(EmbudoError::EmptyTable(name.to_string()));
    }
    Ok(table)
}

fn empty_for(dt: &DataType) -> Option<ColumnData> {
    match dt {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Boolean => {
            Some(ColumnData::Text(Vec::new()))
        }
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        | DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
        | DataType::Float32 | DataType::Float64 => Some(ColumnData::Number(Vec::new())),
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            Some(ColumnData::DateTime(Vec::new()))
        }
        _ => None,
    }
}

fn append_array(data: &mut ColumnData, col: &ArrayRef) {
    match data {
        ColumnData::Text(out) => {
            if let Some(a) = col.as_any().downcast_ref::<StringArray>() {
                out.extend((0..a.len()).map(|j| a.is_valid(j).then(|| a.value(j).to_string())));
            } else if let Some(a) = col.as_any().downcast_ref::<LargeStringArray>() {
                out.extend((0..a.len()).map(|j| a.is_valid(j).then(|| a.value(j).to_string())));
            } else if let Some(a) = col.as_any().downcast_ref::<BooleanArray>() {
                out.extend((0..a.len()).map(|j| a.is_valid(j).then(|| a.value(j).to_string())));
            }
        }
        ColumnData::Number(out) => {
            macro_rules! try_num {
                ($ArrayType:ty) => {
                    if let Some(a) = col.as_any().downcast_ref::<$ArrayType>() {
                        out.extend((0..a.len()).map(|j| a.is_valid(j).then(|| a.value(j) as f64)));
                        return;
                    }
                };
            }
            try_num!(Float64Array);
            try_num!(Float32Array);
            try_num!(Int64Array);
            try_num!(Int32Array);
            try_num!(Int16Array);
            try_num!(Int8Array);
            try_num!(UInt64Array);
            try_num!(UInt32Array);
            try_num!(UInt16Array);
            try_num!(UInt8Array);
        }
        ColumnData::DateTime(out) => {
            match col.data_type() {
                DataType::Date32 => {
                    if let Some(a) = col.as_any().downcast_ref::<Date32Array>() {
                        out.extend((0..a.len()).map(|j| {
                            a.is_valid(j).then(|| days_to_datetime(a.value(j))).flatten()
                        }));
                    }
                }
                DataType::Date64 => {
                    if let Some(a) = col.as_any().downcast_ref::<Date64Array>() {
                        out.extend((0..a.len()).map(|j| {
                            a.is_valid(j).then(|| epoch_to_datetime(a.value(j), 1_000)).flatten()
                        }));
                    }
                }
                DataType::Timestamp(unit, _) => {
                    macro_rules! try_ts {
                        ($ArrayType:ty, $per_sec:expr) => {
                            if let Some(a) = col.as_any().downcast_ref::<$ArrayType>() {
                                out.extend((0..a.len()).map(|j| {
                                    a.is_valid(j)
                                        .then(|| epoch_to_datetime(a.value(j), $per_sec))
                                        .flatten()
                                }));
                            }
                        };
                    }
                    match unit {
                        TimeUnit::Second      => try_ts!(TimestampSecondArray, 1),
                        TimeUnit::Millisecond => try_ts!(TimestampMillisecondArray, 1_000),
                        TimeUnit::Microsecond => try_ts!(TimestampMicrosecondArray, 1_000_000),
                        TimeUnit::Nanosecond  => try_ts!(TimestampNanosecondArray, 1_000_000_000),
                    }
                }
                _ => {}
            }
        }
    }
}

fn days_to_datetime(days: i32) -> Option<NaiveDateTime> {
    // 1970-01-01 es el día 719_163 desde la era común
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(719_163)?)?.and_hms_opt(0, 0, 0)
}

fn epoch_to_datetime(value: i64, per_sec: i64) -> Option<NaiveDateTime> {
    let secs = value.div_euclid(per_sec);
    let nanos = (value.rem_euclid(per_sec) * (1_000_000_000 / per_sec)) as u32;
    DateTime::from_timestamp(secs, nanos).map(|d| d.naive_utc())
}

// ---------------------------------------------------------------------------
// DATASET DESDE DISCO
// ---------------------------------------------------------------------------
fn read_file(name: &str, path: &Path) -> Result<Table> {
    let raw = std::fs::read(path)
        .map_err(|e| EmbudoError::missing_table(name, format!("{}: {e}", path.display())))?;
    read_table(name, &raw)
}

pub fn load_dataset(config: &EngineConfig) -> Result<Dataset> {
    let leads        = read_file("leads", &config.leads_path())?;
    let inversion    = read_file("inversion", &config.investment_path())?;
    let desarrollos  = read_file("desarrollos", &config.developments_path())?;
    info!(
        leads = leads.n_rows(),
        inversion = inversion.n_rows(),
        desarrollos = desarrollos.n_rows(),
        dir = %config.data_dir.display(),
        "tablas cargadas"
    );
    Dataset::build(leads, inversion, desarrollos, &CiudadesMexico)
}
