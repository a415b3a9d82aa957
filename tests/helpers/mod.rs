//! Fixtures compartidas por los tests de integración.
//!
//! `Fixture` arma las tres tablas crudas con nombres de columna "de verdad"
//! (mayúsculas, acentos, espacios) para pasar por ingesta completa.
//! Las estrategias de proptest generan registros ya tipados.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use embudo_rust::geo::CiudadesMexico;
use embudo_rust::table::Table;
use embudo_rust::{Dataset, DevelopmentRecord, Engine, InvestmentRecord, LeadRecord};

pub const PROYECTOS: [&str; 3] = ["Altavista", "Bosques", "Cumbres"];

pub fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(10, 0, 0).unwrap()
}

struct FilaLead {
    desarrollo: String,
    registro:   Option<String>,
    etapas:     [Option<String>; 4],
}

#[derive(Default)]
pub struct Fixture {
    leads:       Vec<FilaLead>,
    inversion:   Vec<(String, String, f64)>,
    desarrollos: Vec<(String, String, String)>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// `etapas` en orden contacto, cita, venta bruta, escrituración.
    pub fn lead(mut self, desarrollo: &str, registro: Option<&str>, etapas: [Option<&str>; 4]) -> Self {
        self.leads.push(FilaLead {
            desarrollo: desarrollo.to_string(),
            registro:   registro.map(str::to_string),
            etapas:     etapas.map(|e| e.map(str::to_string)),
        });
        self
    }

    pub fn investment(mut self, desarrollo: &str, fecha: &str, monto: f64) -> Self {
        self.inversion.push((desarrollo.to_string(), fecha.to_string(), monto));
        self
    }

    pub fn development(mut self, nombre: &str, ciudad: &str, region: &str) -> Self {
        self.desarrollos.push((nombre.to_string(), ciudad.to_string(), region.to_string()));
        self
    }

    fn lead_col(&self, f: impl Fn(&FilaLead) -> Option<&str>) -> Vec<Option<&str>> {
        self.leads.iter().map(f).collect()
    }

    pub fn tables(&self) -> (Table, Table, Table) {
        let leads = Table::new("leads")
            .with_text("Fecha de Registro", self.lead_col(|l| l.registro.as_deref()))
            .and_then(|t| t.with_text("Fecha Contacto", self.lead_col(|l| l.etapas[0].as_deref())))
            .and_then(|t| t.with_text("Fecha Cita", self.lead_col(|l| l.etapas[1].as_deref())))
            .and_then(|t| t.with_text("Fecha Venta Bruta", self.lead_col(|l| l.etapas[2].as_deref())))
            .and_then(|t| t.with_text("Fecha de Escrituración", self.lead_col(|l| l.etapas[3].as_deref())))
            .and_then(|t| t.with_text("Desarrollo", self.lead_col(|l| Some(l.desarrollo.as_str()))))
            .unwrap();

        let inversion = Table::new("inversion")
            .with_text("Desarrollo", self.inversion.iter().map(|r| Some(r.0.as_str())).collect())
            .and_then(|t| t.with_text("Fecha", self.inversion.iter().map(|r| Some(r.1.as_str())).collect()))
            .and_then(|t| t.with_numbers("Inversión", self.inversion.iter().map(|r| Some(r.2)).collect()))
            .unwrap();

        let desarrollos = Table::new("desarrollos")
            .with_text("Desarrollo", self.desarrollos.iter().map(|r| Some(r.0.as_str())).collect())
            .and_then(|t| t.with_text("Ciudad", self.desarrollos.iter().map(|r| Some(r.1.as_str())).collect()))
            .and_then(|t| t.with_text("Región", self.desarrollos.iter().map(|r| Some(r.2.as_str())).collect()))
            .unwrap();

        (leads, inversion, desarrollos)
    }

    pub fn dataset(&self) -> Dataset {
        let (l, i, d) = self.tables();
        Dataset::build(l, i, d, &CiudadesMexico).unwrap()
    }

    pub fn engine(&self, precompute: bool) -> Engine {
        Engine::new(self.dataset(), precompute)
    }
}

pub fn developments() -> Vec<DevelopmentRecord> {
    vec![
        DevelopmentRecord::new("Altavista", "Monterrey", "Norte", (0.0, 0.0)),
        DevelopmentRecord::new("Bosques", "Puebla", "Centro", (0.0, 0.0)),
        DevelopmentRecord::new("Cumbres", "Monterrey", "Norte", (0.0, 0.0)),
    ]
}

// ---------------------------------------------------------------------------
// Estrategias proptest
// ---------------------------------------------------------------------------

/// Lead con registro opcional en ~1 año y etapas opcionales, algunas
/// anteriores al registro.
pub fn arb_lead() -> impl Strategy<Value = LeadRecord> {
    (
        prop::option::weighted(0.9, 0i64..365),
        prop::array::uniform4(prop::option::of(-10i64..120)),
        prop::sample::select(PROYECTOS.to_vec()),
    )
        .prop_map(|(reg, etapas, dev)| {
            let base = dt(2023, 10, 2);
            let registro = reg.map(|d| base + Duration::days(d));
            let ancla = registro.unwrap_or(base);
            LeadRecord::new(
                registro,
                etapas.map(|o| o.map(|d| ancla + Duration::days(d))),
                Some(dev.to_string()),
            )
        })
}

pub fn arb_investment() -> impl Strategy<Value = InvestmentRecord> {
    (0i64..365, prop::sample::select(PROYECTOS.to_vec()), prop::option::of(0u32..50_000))
        .prop_map(|(d, dev, monto)| {
            InvestmentRecord::new(
                Some(dt(2023, 10, 2) + Duration::days(d)),
                Some(dev.to_string()),
                monto.map(|m| m as f64 / 4.0),
            )
        })
}

pub fn arb_dataset() -> impl Strategy<Value = Dataset> {
    (
        prop::collection::vec(arb_lead(), 0..80),
        prop::collection::vec(arb_investment(), 0..20),
    )
        .prop_map(|(leads, inv)| Dataset::from_records(leads, inv, developments()))
}
