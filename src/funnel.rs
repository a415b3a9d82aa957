// ===========================================================================
// EMBUDO SECUENCIAL + TENDENCIA MENSUAL
//
// Embudo: máscara acumulada. Un lead cuenta en la etapa k sólo si tiene
// fecha en k y en todas las etapas anteriores, diga lo que diga la columna.
//
// Tendencia: por mes de registro, cada etapa se compara sólo contra la
// inmediatamente anterior (cita↔contacto, venta↔cita, escritura↔venta);
// no se encadena como en el embudo.
// ===========================================================================

use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use rayon::prelude::*;
use serde::Serialize;

use crate::catalog::{pct, round2};
use crate::ingest::LeadRecord;
use crate::stages::{Etapa, STAGES, TRACKED};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStageResult {
    pub stage:                    Etapa,
    pub stage_label:              String,
    pub count:                    usize,
    pub percentage_of_total:      f64,
    pub conversion_from_previous: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelResult {
    pub stages:      Vec<FunnelStageResult>,
    pub total_leads: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// `"AAAA-MM"`
    pub period:        String,
    pub leads:         usize,
    pub contacto:      f64,
    pub cita:          f64,
    pub venta_bruta:   f64,
    pub escrituracion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub data:        Vec<TrendPoint>,
    pub period_type: String,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round_ties_even() / 10.0
}

/// Alcance con compuerta secuencial, en orden `TRACKED`.
pub fn gated_reach(l: &LeadRecord) -> [bool; 4] {
    let mut mask = true;
    let mut out = [false; 4];
    for (slot, etapa) in out.iter_mut().zip(TRACKED) {
        let tiene = l.has_stage(etapa);
        *slot = tiene && mask;
        mask = mask && tiene;
    }
    out
}

pub fn compute(leads: &[&LeadRecord]) -> FunnelResult {
    let total = leads.len();
    if total == 0 {
        return FunnelResult { stages: vec![], total_leads: 0 };
    }

    let counts: [usize; 4] = leads
        .par_iter()
        .fold(
            || [0usize; 4],
            |mut acc, l| {
                for (a, r) in acc.iter_mut().zip(gated_reach(l)) {
                    *a += r as usize;
                }
                acc
            },
        )
        .reduce(
            || [0usize; 4],
            |mut a, b| {
                for i in 0..4 {
                    a[i] += b[i];
                }
                a
            },
        );

    let mut stages = Vec::with_capacity(STAGES.len());
    // denominador: último conteo distinto de cero
    let mut previo = total;
    for def in STAGES.iter() {
        let count = match def.etapa.tracked_index() {
            None    => total,
            Some(i) => counts[i],
        };
        stages.push(FunnelStageResult {
            stage:                    def.etapa,
            stage_label:              def.label.to_string(),
            count,
            percentage_of_total:      round2(pct(count, total)),
            conversion_from_previous: round2(pct(count, previo)),
        });
        if count > 0 {
            previo = count;
        }
    }

    FunnelResult { stages, total_leads: total }
}

/// `[leads, contacto, cita, venta, escritura]` con compuerta por pares.
fn pairwise_counts(l: &LeadRecord) -> [usize; 5] {
    let has = |e| l.has_stage(e);
    [
        1,
        has(Etapa::Contacto) as usize,
        (has(Etapa::Cita) && has(Etapa::Contacto)) as usize,
        (has(Etapa::VentaBruta) && has(Etapa::Cita)) as usize,
        (has(Etapa::Escrituracion) && has(Etapa::VentaBruta)) as usize,
    ]
}

pub fn trends(leads: &[&LeadRecord]) -> TrendResult {
    type Local = HashMap<(i32, u32), [usize; 5]>;

    let por_mes: Local = leads
        .par_iter()
        .fold(Local::new, |mut acc, l| {
            let Some(reg) = l.registro else {
                return acc;
            };
            let e = acc.entry((reg.year(), reg.month())).or_insert([0; 5]);
            for (a, c) in e.iter_mut().zip(pairwise_counts(l)) {
                *a += c;
            }
            acc
        })
        .reduce(Local::new, |mut a, b| {
            for (k, v) in b {
                let e = a.entry(k).or_insert([0; 5]);
                for i in 0..5 { e[i] += v[i]; }
            }
            a
        });

    let ordenado: BTreeMap<(i32, u32), [usize; 5]> = por_mes.into_iter().collect();
    let data = ordenado
        .into_iter()
        .map(|((y, m), c)| {
            let total = c[0];
            TrendPoint {
                period:        format!("{y:04}-{m:02}"),
                leads:         total,
                contacto:      round1(pct(c[1], total)),
                cita:          round1(pct(c[2], total)),
                venta_bruta:   round1(pct(c[3], total)),
                escrituracion: round1(pct(c[4], total)),
            }
        })
        .collect();

    TrendResult { data, period_type: "monthly".to_string() }
}
