// ===========================================================================
// Tabla cruda orientada a columnas
//
// Es lo que entrega la carga (parquet o construida a mano) antes de la
// normalización. Cada columna guarda un vector por tipo; `None` = celda nula.
// ===========================================================================

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{EmbudoError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Number(Vec<Option<f64>>),
    DateTime(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v)     => v.len(),
            ColumnData::Number(v)   => v.len(),
            ColumnData::DateTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn is_datetime(&self) -> bool {
        matches!(self.data, ColumnData::DateTime(_))
    }

    pub fn text_at(&self, i: usize) -> Option<String> {
        match &self.data {
            ColumnData::Text(v) => v
                .get(i)?
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ColumnData::Number(v) => v.get(i).copied().flatten().map(render_number),
            ColumnData::DateTime(v) => v.get(i).copied().flatten().map(|d| d.to_string()),
        }
    }

    pub fn number_at(&self, i: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Number(v) => v.get(i).copied().flatten().filter(|x| x.is_finite()),
            ColumnData::Text(v) => v
                .get(i)?
                .as_deref()
                .and_then(parse_number),
            ColumnData::DateTime(_) => None,
        }
    }

    pub fn datetime_at(&self, i: usize) -> Option<NaiveDateTime> {
        match &self.data {
            ColumnData::DateTime(v) => v.get(i).copied().flatten(),
            ColumnData::Text(v) => v.get(i)?.as_deref().and_then(parse_datetime),
            ColumnData::Number(_) => None,
        }
    }

    /// Convierte la columna a fechas; lo que no se pueda leer queda nulo.
    pub fn coerce_datetime(&mut self) {
        let n = self.data.len();
        let parsed = (0..n).map(|i| self.datetime_at(i)).collect();
        self.data = ColumnData::DateTime(parsed);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    columns:  Vec<Column>,
    n:        usize,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), columns: Vec::new(), n: 0 }
    }

    pub fn push_column(&mut self, column: Column) -> Result<()> {
        let len = column.data.len();
        if !self.columns.is_empty() && len != self.n {
            return Err(EmbudoError::missing_table(
                &self.name,
                format!(
                    "columnas de distinta longitud: `{}` tiene {len}, se esperaban {}",
                    column.name, self.n
                ),
            ));
        }
        self.n = len;
        self.columns.push(column);
        Ok(())
    }

    pub fn with_text(mut self, name: &str, values: Vec<Option<&str>>) -> Result<Self> {
        let data = ColumnData::Text(values.into_iter().map(|v| v.map(str::to_string)).collect());
        self.push_column(Column { name: name.to_string(), data })?;
        Ok(self)
    }

    pub fn with_numbers(mut self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        self.push_column(Column { name: name.to_string(), data: ColumnData::Number(values) })?;
        Ok(self)
    }

    pub fn with_datetimes(mut self, name: &str, values: Vec<Option<NaiveDateTime>>) -> Result<Self> {
        self.push_column(Column { name: name.to_string(), data: ColumnData::DateTime(values) })?;
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.n
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// trim + minúsculas + espacios → `_`
    pub fn normalize_column_names(&mut self) {
        for c in &mut self.columns {
            c.name = normalize_column_name(&c.name);
        }
    }

    /// Columnas cuyo nombre sugiere fecha (`fecha`, `date`) pasan a fechas.
    pub fn parse_date_columns(&mut self) {
        for c in &mut self.columns {
            if looks_like_date(&c.name) && !c.is_datetime() {
                c.coerce_datetime();
            }
        }
    }

    pub fn first_datetime_column(&self) -> Option<&str> {
        self.columns.iter().find(|c| c.is_datetime()).map(|c| c.name.as_str())
    }
}

pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn looks_like_date(name: &str) -> bool {
    let n = name.to_lowercase();
    n.contains("fecha") || n.contains("date")
}

fn render_number(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        x.to_string()
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim().replace(['$', ','], "");
    t.parse::<f64>().ok().filter(|x| x.is_finite())
}

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Lee una fecha en los formatos habituales del origen; si no, `None`.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for f in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(dt);
        }
    }
    for f in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_normalized() {
        assert_eq!(normalize_column_name("  Fecha de Registro "), "fecha_de_registro");
        assert_eq!(normalize_column_name("Región"), "región");
    }

    #[test]
    fn date_columns_are_coerced_and_bad_cells_become_null() {
        let mut t = Table::new("leads")
            .with_text("Fecha Contacto", vec![Some("2024-01-03"), Some("mañana"), None])
            .unwrap()
            .with_text("Desarrollo", vec![Some("A"), Some("B"), Some("C")])
            .unwrap();
        t.normalize_column_names();
        t.parse_date_columns();

        let c = t.column("fecha_contacto").unwrap();
        assert!(c.is_datetime());
        assert_eq!(
            c.datetime_at(0),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(c.datetime_at(1), None);
        assert_eq!(c.datetime_at(2), None);
        assert!(!t.column("desarrollo").unwrap().is_datetime());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let r = Table::new("x")
            .with_numbers("a", vec![Some(1.0)])
            .unwrap()
            .with_numbers("b", vec![Some(1.0), Some(2.0)]);
        assert!(r.is_err());
    }

    #[test]
    fn numbers_from_text_and_text_from_numbers() {
        let t = Table::new("inv")
            .with_text("monto", vec![Some("$1,250.50"), Some("n/a")])
            .unwrap()
            .with_numbers("clave", vec![Some(7.0), Some(2.5)])
            .unwrap();
        assert_eq!(t.column("monto").unwrap().number_at(0), Some(1250.5));
        assert_eq!(t.column("monto").unwrap().number_at(1), None);
        assert_eq!(t.column("clave").unwrap().text_at(0).as_deref(), Some("7"));
        assert_eq!(t.column("clave").unwrap().text_at(1).as_deref(), Some("2.5"));
    }

    #[test]
    fn parses_datetime_variants() {
        let want = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap().and_hms_opt(14, 30, 0);
        assert_eq!(parse_datetime("2024-02-05 14:30:00"), want);
        assert_eq!(parse_datetime("2024-02-05T14:30:00"), want);
        assert_eq!(parse_datetime("05/02/2024 14:30"), want);
        assert_eq!(parse_datetime(""), None);
    }
}
