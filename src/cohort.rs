// ===========================================================================
// COHORTS SEMANALES
//
// Cohort = leads registrados en la misma semana ISO. Para cada etapa:
//
//   semanas = floor((fecha_etapa - lunes_del_cohort) / 7 días), mínimo 0
//   % acumulado(s) = Σ leads con semanas ≤ s / tamaño_inicial × 100
//
// Representación dispersa: sólo aparecen semanas con llegadas; una etapa sin
// ninguna llegada no aparece en el cohort. En el heatmap lo ausente es `null`.
// ===========================================================================

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use rayon::prelude::*;
use serde::Serialize;

use crate::catalog::round2;
use crate::ingest::LeadRecord;
use crate::stages::{Etapa, TRACKED};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortBucket {
    pub cohort_week:   String,
    pub initial_leads: usize,
    /// etapa → semanas desde el cohort → % acumulado
    pub conversions:   BTreeMap<Etapa, BTreeMap<u32, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub cohort_labels: Vec<String>,
    pub week_labels:   Vec<u32>,
    pub matrix:        Vec<Vec<Option<f64>>>,
    pub stage:         Etapa,
}

/// Lunes 00:00 de la semana ISO `"AAAA-Wss"`.
pub fn cohort_start(label: &str) -> Option<NaiveDateTime> {
    let (year, week) = label.split_once("-W")?;
    let date = NaiveDate::from_isoywd_opt(year.parse().ok()?, week.parse().ok()?, Weekday::Mon)?;
    date.and_hms_opt(0, 0, 0)
}

pub fn weeks_since(start: NaiveDateTime, reached: NaiveDateTime) -> u32 {
    (reached - start).num_days().div_euclid(7).max(0) as u32
}

pub fn compute(leads: &[&LeadRecord]) -> Vec<CohortBucket> {
    let mut grupos: BTreeMap<&str, Vec<&LeadRecord>> = BTreeMap::new();
    for &l in leads {
        if let Some(cw) = l.cohort_week.as_deref() {
            grupos.entry(cw).or_default().push(l);
        }
    }
    let grupos: Vec<(&str, Vec<&LeadRecord>)> = grupos.into_iter().collect();

    grupos
        .par_iter()
        .map(|(label, miembros)| bucket(label, miembros))
        .collect()
}

fn bucket(label: &str, miembros: &[&LeadRecord]) -> CohortBucket {
    let initial = miembros.len();
    let mut conversions = BTreeMap::new();

    if let Some(start) = cohort_start(label) {
        for etapa in TRACKED {
            let mut por_semana: BTreeMap<u32, usize> = BTreeMap::new();
            for l in miembros {
                if let Some(t) = l.stage_date(etapa) {
                    *por_semana.entry(weeks_since(start, t)).or_insert(0) += 1;
                }
            }
            if por_semana.is_empty() {
                continue;
            }
            let mut acumulado = 0usize;
            let curva: BTreeMap<u32, f64> = por_semana
                .into_iter()
                .map(|(semana, n)| {
                    acumulado += n;
                    (semana, round2(acumulado as f64 / initial as f64 * 100.0))
                })
                .collect();
            conversions.insert(etapa, curva);
        }
    }

    CohortBucket { cohort_week: label.to_string(), initial_leads: initial, conversions }
}

pub fn heatmap(cohorts: &[CohortBucket], stage: Etapa) -> Heatmap {
    if cohorts.is_empty() {
        return Heatmap { cohort_labels: vec![], week_labels: vec![], matrix: vec![], stage };
    }

    let max_semana = cohorts
        .iter()
        .filter_map(|c| c.conversions.get(&stage))
        .filter_map(|curva| curva.keys().next_back().copied())
        .max()
        .unwrap_or(0);
    let week_labels: Vec<u32> = (0..=max_semana).collect();

    let matrix = cohorts
        .iter()
        .map(|c| {
            let curva = c.conversions.get(&stage);
            week_labels
                .iter()
                .map(|s| curva.and_then(|m| m.get(s)).copied())
                .collect()
        })
        .collect();

    Heatmap {
        cohort_labels: cohorts.iter().map(|c| c.cohort_week.clone()).collect(),
        week_labels,
        matrix,
        stage,
    }
}
