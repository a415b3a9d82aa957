// ===========================================================================
// INGESTA Y NORMALIZACIÓN
//
// Tres tablas crudas → tres conjuntos de registros inmutables:
//
//   leads        → LeadRecord        (fechas por etapa, semana ISO, cohort)
//   inversión    → InvestmentRecord  (fecha, desarrollo, monto)
//   desarrollos  → DevelopmentRecord (ciudad, región, coordenadas, totales)
//
// Las columnas se resuelven una sola vez aquí; los motores trabajan sobre
// los registros ya tipados. Una celda ilegible es `None`, nunca un error.
// ===========================================================================

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::error::{EmbudoError, Result};
use crate::geo::CityLookup;
use crate::schema::SchemaResolver;
use crate::stages::{Etapa, TRACKED};
use crate::table::Table;

const COLS_DESARROLLO: &[&str] = &["desarrollo", "project", "proyecto"];
const COLS_FECHA_INV:  &[&str] = &["fecha", "date"];
const COLS_MONTO:      &[&str] = &["inversion", "monto", "amount"];
const COLS_NOMBRE_DEV: &[&str] = &["desarrollo", "nombre", "project", "proyecto"];
const COLS_CIUDAD:     &[&str] = &["ciudad", "city"];
const COLS_REGION:     &[&str] = &["region", "zona"];
const COLS_LATITUD:    &[&str] = &["latitud", "latitude"];
const COLS_LONGITUD:   &[&str] = &["longitud", "longitude", "lng"];

// ---------------------------------------------------------------------------
// Registros
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    pub fn of(dt: NaiveDateTime) -> Self {
        let w = dt.date().iso_week();
        Self { year: w.year(), week: w.week() }
    }

    /// `"{año}-W{semana:02}"`
    pub fn label(&self) -> String {
        format!("{}-W{:02}", self.year, self.week)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub registro:    Option<NaiveDateTime>,
    /// fechas de Contacto, Cita, Venta Bruta y Escrituración (orden `TRACKED`)
    pub etapas:      [Option<NaiveDateTime>; 4],
    pub desarrollo:  Option<String>,
    pub iso:         Option<IsoWeek>,
    pub cohort_week: Option<String>,
}

impl LeadRecord {
    pub fn new(
        registro: Option<NaiveDateTime>,
        etapas: [Option<NaiveDateTime>; 4],
        desarrollo: Option<String>,
    ) -> Self {
        let iso = registro.map(IsoWeek::of);
        Self {
            registro,
            etapas,
            desarrollo,
            iso,
            cohort_week: iso.map(|w| w.label()),
        }
    }

    pub fn stage_date(&self, etapa: Etapa) -> Option<NaiveDateTime> {
        match etapa.tracked_index() {
            None    => self.registro,
            Some(i) => self.etapas[i],
        }
    }

    /// Presencia cruda de la etapa, sin compuerta. Todo lead cuenta como `Lead`.
    pub fn has_stage(&self, etapa: Etapa) -> bool {
        match etapa.tracked_index() {
            None    => true,
            Some(i) => self.etapas[i].is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentRecord {
    pub fecha:      Option<NaiveDateTime>,
    pub desarrollo: Option<String>,
    pub monto:      Option<f64>,
    pub iso:        Option<IsoWeek>,
}

impl InvestmentRecord {
    pub fn new(fecha: Option<NaiveDateTime>, desarrollo: Option<String>, monto: Option<f64>) -> Self {
        Self { fecha, desarrollo, monto, iso: fecha.map(IsoWeek::of) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevelopmentRecord {
    pub name:             String,
    pub city:             String,
    pub region:           String,
    pub latitude:         f64,
    pub longitude:        f64,
    pub total_leads:      usize,
    pub total_sales:      usize,
    pub total_closings:   usize,
    pub conversion_rate:  f64,
    pub total_investment: f64,
}

impl DevelopmentRecord {
    /// Desarrollo sin totales; `Dataset` los calcula al construirse.
    pub fn new(name: &str, city: &str, region: &str, (latitude, longitude): (f64, f64)) -> Self {
        Self {
            name: name.to_string(),
            city: city.to_string(),
            region: region.to_string(),
            latitude,
            longitude,
            total_leads: 0,
            total_sales: 0,
            total_closings: 0,
            conversion_rate: 0.0,
            total_investment: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Columnas resueltas (diagnóstico)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableColumns {
    pub columns:  Vec<String>,
    pub resolved: BTreeMap<&'static str, Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnReport {
    pub leads:        TableColumns,
    pub investment:   TableColumns,
    pub developments: TableColumns,
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    leads:        Vec<LeadRecord>,
    investment:   Vec<InvestmentRecord>,
    developments: Vec<DevelopmentRecord>,
    columns:      ColumnReport,
}

impl Dataset {
    pub fn build(
        mut leads: Table,
        mut inversion: Table,
        mut desarrollos: Table,
        geo: &dyn CityLookup,
    ) -> Result<Self> {
        for t in [&leads, &inversion, &desarrollos] {
            if t.columns().is_empty() {
                return Err(EmbudoError::EmptyTable(t.name.clone()));
            }
        }
        for t in [&mut leads, &mut inversion, &mut desarrollos] {
            t.normalize_column_names();
        }
        leads.parse_date_columns();
        inversion.parse_date_columns();

        let mut report = ColumnReport::default();
        let lead_records = build_leads(&mut leads, &mut report.leads);
        let inv_records = build_investment(&mut inversion, &mut report.investment);
        let dev_records = build_developments(&desarrollos, geo, &mut report.developments);

        let cohortes = lead_records.iter().filter(|l| l.cohort_week.is_some()).count();
        info!(
            leads = lead_records.len(),
            leads_con_cohort = cohortes,
            inversion = inv_records.len(),
            desarrollos = dev_records.len(),
            "dataset normalizado"
        );

        let mut ds = Self::from_records(lead_records, inv_records, dev_records);
        ds.columns = report;
        Ok(ds)
    }

    /// Construye el dataset desde registros ya tipados y deriva los totales
    /// de cada desarrollo.
    pub fn from_records(
        leads: Vec<LeadRecord>,
        investment: Vec<InvestmentRecord>,
        mut developments: Vec<DevelopmentRecord>,
    ) -> Self {
        catalog::attach_totals(&mut developments, &leads, &investment);
        Self { leads, investment, developments, columns: ColumnReport::default() }
    }

    pub fn leads(&self) -> &[LeadRecord] {
        &self.leads
    }

    pub fn investment(&self) -> &[InvestmentRecord] {
        &self.investment
    }

    pub fn developments(&self) -> &[DevelopmentRecord] {
        &self.developments
    }

    pub fn columns(&self) -> &ColumnReport {
        &self.columns
    }
}

fn note(report: &mut TableColumns, tabla: &str, campo: &'static str, col: Option<&str>) {
    match col {
        Some(c) => debug!(tabla, campo, columna = c, "columna resuelta"),
        None    => debug!(tabla, campo, "columna no encontrada"),
    }
    report.resolved.insert(campo, col.map(str::to_string));
}

fn build_leads(table: &mut Table, report: &mut TableColumns) -> Vec<LeadRecord> {
    let names = table.column_names();
    let resolver = SchemaResolver::new(&names);
    report.columns = names.clone();

    // registro: por nombre, y si no, la primera columna de fecha
    let registro_col = resolver
        .resolve_owned(Etapa::Lead.definition().columns)
        .or_else(|| table.first_datetime_column().map(str::to_string));
    note(report, "leads", "registro", registro_col.as_deref());
    if registro_col.is_none() {
        warn!("sin columna de registro: ningún lead tendrá cohort");
    }

    let etapa_cols: Vec<Option<String>> = TRACKED
        .iter()
        .map(|e| {
            let col = resolver.resolve_owned(e.definition().columns);
            note(report, "leads", e.as_str(), col.as_deref());
            if col.is_none() {
                warn!(etapa = %e, "etapa sin columna: se reporta en cero");
            }
            col
        })
        .collect();

    let desarrollo_col = resolver.resolve_owned(COLS_DESARROLLO);
    note(report, "leads", "desarrollo", desarrollo_col.as_deref());

    for col in registro_col.iter().chain(etapa_cols.iter().flatten()) {
        if let Some(c) = table.column_mut(col) {
            if !c.is_datetime() {
                c.coerce_datetime();
            }
        }
    }

    let table = &*table;
    let registro = registro_col.as_deref().and_then(|c| table.column(c));
    let etapas: Vec<_> = etapa_cols.iter().map(|c| c.as_deref().and_then(|c| table.column(c))).collect();
    let desarrollo = desarrollo_col.as_deref().and_then(|c| table.column(c));

    (0..table.n_rows())
        .into_par_iter()
        .map(|i| {
            let mut fechas = [None; 4];
            for (slot, col) in fechas.iter_mut().zip(&etapas) {
                *slot = col.and_then(|c| c.datetime_at(i));
            }
            LeadRecord::new(
                registro.and_then(|c| c.datetime_at(i)),
                fechas,
                desarrollo.and_then(|c| c.text_at(i)),
            )
        })
        .collect()
}

fn build_investment(table: &mut Table, report: &mut TableColumns) -> Vec<InvestmentRecord> {
    let names = table.column_names();
    let resolver = SchemaResolver::new(&names);
    report.columns = names.clone();

    let fecha_col = resolver.resolve_owned(COLS_FECHA_INV);
    let desarrollo_col = resolver.resolve_owned(COLS_DESARROLLO);
    let monto_col = resolver.resolve_owned(COLS_MONTO);
    note(report, "inversion", "fecha", fecha_col.as_deref());
    note(report, "inversion", "desarrollo", desarrollo_col.as_deref());
    note(report, "inversion", "monto", monto_col.as_deref());
    if monto_col.is_none() {
        warn!("sin columna de monto: la inversión total será 0");
    }

    let table = &*table;
    let fecha = fecha_col.as_deref().and_then(|c| table.column(c));
    let desarrollo = desarrollo_col.as_deref().and_then(|c| table.column(c));
    let monto = monto_col.as_deref().and_then(|c| table.column(c));

    (0..table.n_rows())
        .into_par_iter()
        .map(|i| {
            InvestmentRecord::new(
                fecha.and_then(|c| c.datetime_at(i)),
                desarrollo.and_then(|c| c.text_at(i)),
                monto.and_then(|c| c.number_at(i)),
            )
        })
        .collect()
}

fn build_developments(
    table: &Table,
    geo: &dyn CityLookup,
    report: &mut TableColumns,
) -> Vec<DevelopmentRecord> {
    let names = table.column_names();
    let resolver = SchemaResolver::new(&names);
    report.columns = names.clone();

    let nombre_col = resolver
        .resolve_owned(COLS_NOMBRE_DEV)
        .or_else(|| resolver.first_column().map(str::to_string));
    let ciudad_col = resolver.resolve_owned(COLS_CIUDAD);
    let region_col = resolver.resolve_owned(COLS_REGION);
    let lat_col = resolver.resolve_owned(COLS_LATITUD);
    let lng_col = resolver.resolve_owned(COLS_LONGITUD);
    note(report, "desarrollos", "nombre", nombre_col.as_deref());
    note(report, "desarrollos", "ciudad", ciudad_col.as_deref());
    note(report, "desarrollos", "region", region_col.as_deref());
    note(report, "desarrollos", "latitud", lat_col.as_deref());
    note(report, "desarrollos", "longitud", lng_col.as_deref());

    let col = |c: &Option<String>| c.as_deref().and_then(|c| table.column(c));
    let (nombre, ciudad, region) = (col(&nombre_col), col(&ciudad_col), col(&region_col));
    let (lat, lng) = (col(&lat_col), col(&lng_col));

    (0..table.n_rows())
        .map(|i| {
            let city = ciudad.and_then(|c| c.text_at(i)).unwrap_or_default();
            let explicit = match (lat.and_then(|c| c.number_at(i)), lng.and_then(|c| c.number_at(i))) {
                (Some(la), Some(lo)) if !(la == 0.0 && lo == 0.0) => Some((la, lo)),
                _ => None,
            };
            let coords = explicit.unwrap_or_else(|| {
                let c = geo.coordinates_or_centroid(Some(city.as_str()));
                if geo.coordinates(&city).is_none() {
                    debug!(ciudad = %city, "ciudad sin coordenadas, se usa el centroide");
                }
                c
            });
            DevelopmentRecord::new(
                &nombre.and_then(|c| c.text_at(i)).unwrap_or_default(),
                &city,
                &region.and_then(|c| c.text_at(i)).unwrap_or_default(),
                coords,
            )
        })
        .collect()
}
