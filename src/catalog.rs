// ===========================================================================
// Desarrollos y opciones de filtro
//
// Ambos se derivan una sola vez y no dependen de ningún filtro.
// ===========================================================================

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::ingest::{Dataset, DevelopmentRecord, InvestmentRecord, LeadRecord};
use crate::stages::Etapa;

/// Regiones por defecto cuando la tabla de desarrollos no trae región.
const REGIONES_DEFAULT: [&str; 3] = ["Norte", "Centro", "Sur"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub projects: Vec<String>,
    pub regions:  Vec<String>,
    pub years:    Vec<i32>,
    pub months:   Vec<u32>,
    pub weeks:    Vec<String>,
}

/// Mitades al par: 0.125 → 0.12, 0.375 → 0.38.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

pub(crate) fn pct(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 * 100.0 }
}

/// Totales por desarrollo: leads, ventas y escrituras sin compuerta
/// secuencial, inversión sumada por nombre.
pub fn attach_totals(
    developments: &mut [DevelopmentRecord],
    leads: &[LeadRecord],
    investment: &[InvestmentRecord],
) {
    // [leads, ventas, escrituras]
    let mut por_dev: HashMap<&str, [usize; 3]> = HashMap::new();
    for l in leads {
        if let Some(d) = l.desarrollo.as_deref() {
            let e = por_dev.entry(d).or_insert([0; 3]);
            e[0] += 1;
            e[1] += l.has_stage(Etapa::VentaBruta) as usize;
            e[2] += l.has_stage(Etapa::Escrituracion) as usize;
        }
    }
    let mut inv_dev: HashMap<&str, f64> = HashMap::new();
    for r in investment {
        if let (Some(d), Some(m)) = (r.desarrollo.as_deref(), r.monto) {
            *inv_dev.entry(d).or_insert(0.0) += m;
        }
    }

    for dev in developments.iter_mut() {
        let [total, ventas, escrituras] = por_dev.get(dev.name.as_str()).copied().unwrap_or([0; 3]);
        dev.total_leads = total;
        dev.total_sales = ventas;
        dev.total_closings = escrituras;
        dev.conversion_rate = round2(pct(escrituras, total));
        dev.total_investment = round2(inv_dev.get(dev.name.as_str()).copied().unwrap_or(0.0));
    }
}

pub fn filter_options(ds: &Dataset) -> FilterOptions {
    let mut projects: BTreeSet<String> = ds
        .leads()
        .iter()
        .filter_map(|l| l.desarrollo.clone())
        .collect();
    if projects.is_empty() {
        projects = ds
            .developments()
            .iter()
            .filter(|d| !d.name.is_empty())
            .map(|d| d.name.clone())
            .collect();
    }

    let tiene_region = ds.columns().developments.resolved.get("region").map_or(
        // datasets armados a mano no traen reporte: se mira el contenido
        ds.developments().iter().any(|d| !d.region.is_empty()),
        |c| c.is_some(),
    );
    let regions: Vec<String> = if tiene_region {
        ds.developments()
            .iter()
            .filter(|d| !d.region.is_empty())
            .map(|d| d.region.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        REGIONES_DEFAULT.iter().map(|s| s.to_string()).collect()
    };

    let years: BTreeSet<i32> = ds.leads().iter().filter_map(|l| l.iso.map(|w| w.year)).collect();
    let weeks: BTreeSet<String> = ds.leads().iter().filter_map(|l| l.cohort_week.clone()).collect();

    FilterOptions {
        projects: projects.into_iter().collect(),
        regions,
        years: years.into_iter().collect(),
        months: (1..=12).collect(),
        weeks: weeks.into_iter().collect(),
    }
}
