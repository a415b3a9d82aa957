// ===========================================================================
// MÉTRICAS AGREGADAS
//
// Conteos por etapa SIN compuerta secuencial: cuántos leads tienen fecha en
// cada columna, sin mirar las anteriores. El embudo sí encadena; aquí no.
// ===========================================================================

use rayon::prelude::*;
use serde::Serialize;

use crate::catalog::{pct, round2};
use crate::ingest::{InvestmentRecord, LeadRecord};
use crate::stages::TRACKED;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsResult {
    pub total_investment:   f64,
    pub total_leads:        usize,
    pub total_contacts:     usize,
    pub total_appointments: usize,
    pub total_gross_sales:  usize,
    pub total_closings:     usize,

    pub cost_per_lead:        f64,
    pub cost_per_contact:     f64,
    pub cost_per_appointment: f64,
    pub cost_per_sale:        f64,
    pub cost_per_closing:     f64,

    pub conversion_lead_to_contact:        f64,
    pub conversion_contact_to_appointment: f64,
    pub conversion_appointment_to_sale:    f64,
    pub conversion_sale_to_closing:        f64,
    pub overall_conversion:                f64,
}

fn cost_per(inversion: f64, n: usize) -> f64 {
    if n == 0 { 0.0 } else { round2(inversion / n as f64) }
}

/// Suma secuencial: el orden de la suma en flotante queda fijo.
pub fn total_investment(investment: &[&InvestmentRecord]) -> f64 {
    investment.iter().filter_map(|r| r.monto).fold(0.0, |acc, m| acc + m)
}

pub fn compute(leads: &[&LeadRecord], investment: &[&InvestmentRecord]) -> MetricsResult {
    let total = leads.len();
    let [contactos, citas, ventas, escrituras]: [usize; 4] = leads
        .par_iter()
        .fold(
            || [0usize; 4],
            |mut acc, l| {
                for (a, etapa) in acc.iter_mut().zip(TRACKED) {
                    *a += l.has_stage(etapa) as usize;
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

    let inversion = total_investment(investment);

    MetricsResult {
        total_investment:   round2(inversion),
        total_leads:        total,
        total_contacts:     contactos,
        total_appointments: citas,
        total_gross_sales:  ventas,
        total_closings:     escrituras,

        cost_per_lead:        cost_per(inversion, total),
        cost_per_contact:     cost_per(inversion, contactos),
        cost_per_appointment: cost_per(inversion, citas),
        cost_per_sale:        cost_per(inversion, ventas),
        cost_per_closing:     cost_per(inversion, escrituras),

        conversion_lead_to_contact:        round2(pct(contactos, total)),
        conversion_contact_to_appointment: round2(pct(citas, contactos)),
        conversion_appointment_to_sale:    round2(pct(ventas, citas)),
        conversion_sale_to_closing:        round2(pct(escrituras, ventas)),
        overall_conversion:                round2(pct(escrituras, total)),
    }
}
