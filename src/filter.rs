// ===========================================================================
// FilterSpec + FilterPipeline
//
// Predicados independientes, combinados con AND; un campo vacío no filtra.
// La región se traduce a un conjunto de desarrollos vía la tabla de
// desarrollos y se filtra por pertenencia a ese conjunto.
// Cada aplicación devuelve una vista nueva (`Vec<&T>`); nada se muta.
// ===========================================================================

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EmbudoError, Result};
use crate::ingest::{DevelopmentRecord, InvestmentRecord, IsoWeek, LeadRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    #[serde(alias = "desarrollos")]
    pub projects:  Option<Vec<String>>,
    #[serde(alias = "regiones")]
    pub regions:   Option<Vec<String>>,
    pub year:      Option<i32>,
    pub month:     Option<u32>,
    pub week_iso:  Option<u32>,
    pub date_from: Option<NaiveDate>,
    pub date_to:   Option<NaiveDate>,
}

impl FilterSpec {
    /// Sin ningún campo activo: equivale a no filtrar (camino rápido).
    pub fn is_empty(&self) -> bool {
        let vacia = |v: &Option<Vec<String>>| v.as_ref().map_or(true, Vec::is_empty);
        vacia(&self.projects)
            && vacia(&self.regions)
            && self.year.is_none()
            && self.month.is_none()
            && self.week_iso.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(m) = self.month {
            if !(1..=12).contains(&m) {
                return Err(EmbudoError::InvalidFilter(format!("mes fuera de rango: {m}")));
            }
        }
        if let Some(w) = self.week_iso {
            if !(1..=53).contains(&w) {
                return Err(EmbudoError::InvalidFilter(format!("semana ISO fuera de rango: {w}")));
            }
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(EmbudoError::InvalidFilter(format!("date_from {from} > date_to {to}")));
            }
        }
        Ok(())
    }
}

/// `None` o un filtro sin campos: ambos significan "sin filtro".
pub fn is_active(spec: Option<&FilterSpec>) -> bool {
    spec.map_or(false, |s| !s.is_empty())
}

/// Lo que un registro expone para poder filtrarse.
pub trait Filterable {
    fn project(&self) -> Option<&str>;
    fn date(&self) -> Option<NaiveDateTime>;
    fn iso(&self) -> Option<IsoWeek>;
}

impl Filterable for LeadRecord {
    fn project(&self) -> Option<&str> {
        self.desarrollo.as_deref()
    }

    fn date(&self) -> Option<NaiveDateTime> {
        self.registro
    }

    fn iso(&self) -> Option<IsoWeek> {
        self.iso
    }
}

impl Filterable for InvestmentRecord {
    fn project(&self) -> Option<&str> {
        self.desarrollo.as_deref()
    }

    fn date(&self) -> Option<NaiveDateTime> {
        self.fecha
    }

    fn iso(&self) -> Option<IsoWeek> {
        self.iso
    }
}

pub struct FilterPipeline<'a> {
    spec:            &'a FilterSpec,
    projects:        Option<HashSet<&'a str>>,
    region_projects: Option<HashSet<&'a str>>,
}

impl<'a> FilterPipeline<'a> {
    pub fn new(spec: &'a FilterSpec, developments: &'a [DevelopmentRecord]) -> Self {
        let projects = spec
            .projects
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|p| p.iter().map(String::as_str).collect());

        let region_projects = spec.regions.as_ref().filter(|r| !r.is_empty()).map(|regions| {
            developments
                .iter()
                .filter(|d| regions.iter().any(|r| *r == d.region))
                .map(|d| d.name.as_str())
                .collect()
        });

        Self { spec, projects, region_projects }
    }

    /// Ninguna región pedida tiene desarrollos: nada puede pasar.
    fn excludes_everything(&self) -> bool {
        self.region_projects.as_ref().map_or(false, HashSet::is_empty)
            || self.projects.as_ref().map_or(false, HashSet::is_empty)
    }

    pub fn matches<T: Filterable>(&self, r: &T) -> bool {
        let en = |set: &Option<HashSet<&str>>| match set {
            None => true,
            Some(s) => r.project().map_or(false, |p| s.contains(p)),
        };
        if !en(&self.projects) || !en(&self.region_projects) {
            return false;
        }
        let s = self.spec;
        if let Some(y) = s.year {
            if r.iso().map(|w| w.year) != Some(y) {
                return false;
            }
        }
        if let Some(m) = s.month {
            if r.date().map(|d| d.month()) != Some(m) {
                return false;
            }
        }
        if let Some(w) = s.week_iso {
            if r.iso().map(|w| w.week) != Some(w) {
                return false;
            }
        }
        if s.date_from.is_some() || s.date_to.is_some() {
            let Some(d) = r.date().map(|d| d.date()) else {
                return false;
            };
            if s.date_from.map_or(false, |from| d < from) || s.date_to.map_or(false, |to| d > to) {
                return false;
            }
        }
        true
    }

    pub fn apply<'r, T: Filterable + Sync>(&self, records: &'r [T]) -> Vec<&'r T> {
        if self.excludes_everything() {
            return Vec::new();
        }
        records.par_iter().filter(|r| self.matches(*r)).collect()
    }
}

/// Vista filtrada de `records`; `None` o vacío devuelve todo.
pub fn apply<'r, T: Filterable + Sync>(
    records: &'r [T],
    spec: Option<&FilterSpec>,
    developments: &[DevelopmentRecord],
) -> Vec<&'r T> {
    match spec {
        Some(s) if !s.is_empty() => FilterPipeline::new(s, developments).apply(records),
        _ => records.iter().collect(),
    }
}
