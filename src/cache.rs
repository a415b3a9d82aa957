// ===========================================================================
// PRECÓMPUTO + FACHADA DE CONSULTAS
//
//   Engine::new(dataset)  →  calcula todo sin filtro una sola vez
//   consulta(None | {})   →  devuelve lo precalculado (Cow::Borrowed)
//   consulta(filtro)      →  filtra + recalcula en vivo, no se guarda
//
// El dataset es inmutable tras la ingesta; el cache se escribe una vez en
// `new` y después sólo se lee. No hay invalidación: datos nuevos = Engine nuevo.
// ===========================================================================

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{self, FilterOptions};
use crate::cohort::{self, CohortBucket, Heatmap};
use crate::config::EngineConfig;
use crate::error::{EmbudoError, Result};
use crate::filter::{self, FilterSpec};
use crate::funnel::{self, FunnelResult, TrendResult};
use crate::ingest::{ColumnReport, Dataset, DevelopmentRecord, InvestmentRecord, LeadRecord};
use crate::load;
use crate::metrics::{self, MetricsResult};
use crate::stages::{Etapa, TRACKED};

#[derive(Debug, Clone, PartialEq)]
pub struct PrecomputeCache {
    cohorts:  Vec<CohortBucket>,
    heatmaps: BTreeMap<Etapa, Heatmap>,
    funnel:   FunnelResult,
    trends:   TrendResult,
    metrics:  MetricsResult,
}

impl PrecomputeCache {
    pub fn build(ds: &Dataset) -> Self {
        let t0 = Instant::now();
        let leads: Vec<&LeadRecord> = ds.leads().iter().collect();
        let inversion: Vec<&InvestmentRecord> = ds.investment().iter().collect();

        let cohorts = cohort::compute(&leads);
        let heatmaps = TRACKED.iter().map(|&e| (e, cohort::heatmap(&cohorts, e))).collect();
        let t_cohorts = t0.elapsed();

        let (funnel, trends) = rayon::join(|| funnel::compute(&leads), || funnel::trends(&leads));
        let metrics = metrics::compute(&leads, &inversion);

        info!(
            cohorts = cohorts.len(),
            cohorts_ms = t_cohorts.as_millis() as u64,
            total_ms = t0.elapsed().as_millis() as u64,
            "precómputo listo"
        );
        Self { cohorts, heatmaps, funnel, trends, metrics }
    }
}

/// Contadores para diagnóstico.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub leads:        usize,
    pub investment:   usize,
    pub developments: usize,
    pub cohorts:      usize,
    pub precomputed:  bool,
}

#[derive(Debug, Clone)]
pub struct Engine {
    dataset: Arc<Dataset>,
    cache:   Option<PrecomputeCache>,
    options: FilterOptions,
}

impl Engine {
    /// Con `precompute = false` toda consulta se calcula en vivo.
    pub fn new(dataset: Dataset, precompute: bool) -> Self {
        let cache = precompute.then(|| PrecomputeCache::build(&dataset));
        let options = catalog::filter_options(&dataset);
        Self { dataset: Arc::new(dataset), cache, options }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let ds = load::load_dataset(config)?;
        Ok(Self::new(ds, config.precompute))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn is_precomputed(&self) -> bool {
        self.cache.is_some()
    }

    /// Cache sólo si el filtro está vacío; un filtro inválido es error
    /// aunque el camino rápido no lo necesite.
    fn cached(&self, filtro: Option<&FilterSpec>) -> Result<Option<&PrecomputeCache>> {
        if let Some(f) = filtro {
            f.validate()?;
        }
        if filter::is_active(filtro) {
            debug!(?filtro, "recalculo con filtro");
            return Ok(None);
        }
        Ok(self.cache.as_ref())
    }

    fn leads_view(&self, filtro: Option<&FilterSpec>) -> Vec<&LeadRecord> {
        filter::apply(self.dataset.leads(), filtro, self.dataset.developments())
    }

    fn investment_view(&self, filtro: Option<&FilterSpec>) -> Vec<&InvestmentRecord> {
        filter::apply(self.dataset.investment(), filtro, self.dataset.developments())
    }

    pub fn cohorts(&self, filtro: Option<&FilterSpec>) -> Result<Cow<'_, [CohortBucket]>> {
        if let Some(c) = self.cached(filtro)? {
            return Ok(Cow::Borrowed(&c.cohorts));
        }
        Ok(Cow::Owned(cohort::compute(&self.leads_view(filtro))))
    }

    /// `stage` acepta los sinónimos de etapa; `lead` no tiene fecha propia
    /// y no se puede graficar.
    pub fn heatmap(&self, filtro: Option<&FilterSpec>, stage: &str) -> Result<Cow<'_, Heatmap>> {
        let etapa: Etapa = stage.parse()?;
        if etapa.tracked_index().is_none() {
            return Err(EmbudoError::UnknownStage(format!("{stage}: la etapa lead no tiene heatmap")));
        }
        if let Some(h) = self.cached(filtro)?.and_then(|c| c.heatmaps.get(&etapa)) {
            return Ok(Cow::Borrowed(h));
        }
        let cohorts = self.cohorts(filtro)?;
        Ok(Cow::Owned(cohort::heatmap(&cohorts, etapa)))
    }

    pub fn funnel(&self, filtro: Option<&FilterSpec>) -> Result<Cow<'_, FunnelResult>> {
        if let Some(c) = self.cached(filtro)? {
            return Ok(Cow::Borrowed(&c.funnel));
        }
        Ok(Cow::Owned(funnel::compute(&self.leads_view(filtro))))
    }

    pub fn trends(&self, filtro: Option<&FilterSpec>) -> Result<Cow<'_, TrendResult>> {
        if let Some(c) = self.cached(filtro)? {
            return Ok(Cow::Borrowed(&c.trends));
        }
        Ok(Cow::Owned(funnel::trends(&self.leads_view(filtro))))
    }

    pub fn metrics(&self, filtro: Option<&FilterSpec>) -> Result<Cow<'_, MetricsResult>> {
        if let Some(c) = self.cached(filtro)? {
            return Ok(Cow::Borrowed(&c.metrics));
        }
        let (leads, inversion) = rayon::join(|| self.leads_view(filtro), || self.investment_view(filtro));
        Ok(Cow::Owned(metrics::compute(&leads, &inversion)))
    }

    pub fn developments(&self) -> &[DevelopmentRecord] {
        self.dataset.developments()
    }

    pub fn filter_options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn columns(&self) -> &ColumnReport {
        self.dataset.columns()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            leads:        self.dataset.leads().len(),
            investment:   self.dataset.investment().len(),
            developments: self.dataset.developments().len(),
            cohorts:      self.cache.as_ref().map_or(0, |c| c.cohorts.len()),
            precomputed:  self.cache.is_some(),
        }
    }
}

/// Motor vigente del proceso.
///
/// `current` clona el `Arc` y suelta el lock al instante, así una consulta
/// larga nunca retiene el lock y `replace` no espera a nadie. Quien tenga
/// un `Arc` viejo termina su consulta sobre el dataset anterior.
#[derive(Debug, Default)]
pub struct EngineSlot {
    inner: RwLock<Option<Arc<Engine>>>,
}

impl EngineSlot {
    pub const fn new() -> Self {
        Self { inner: RwLock::new(None) }
    }

    pub fn current(&self) -> Option<Arc<Engine>> {
        // el valor es un puntero: un panic ajeno no lo deja a medias
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Instala `engine` y devuelve el anterior, si había.
    pub fn replace(&self, engine: Engine) -> Option<Arc<Engine>> {
        let nuevo = Arc::new(engine);
        self.inner.write().unwrap_or_else(PoisonError::into_inner).replace(nuevo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn t(m: u32, d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap().and_hms_opt(9, 0, 0)
    }

    fn dataset() -> Dataset {
        let lead = |reg, c, dev: &str| LeadRecord::new(reg, [c, None, None, None], Some(dev.to_string()));
        Dataset::from_records(
            vec![
                lead(t(1, 2), t(1, 3), "Altavista"),
                lead(t(1, 9), None, "Bosques"),
                lead(t(2, 6), t(2, 20), "Altavista"),
            ],
            vec![
                InvestmentRecord::new(t(1, 1), Some("Altavista".into()), Some(300.0)),
                InvestmentRecord::new(t(1, 1), Some("Bosques".into()), Some(100.0)),
            ],
            vec![
                DevelopmentRecord::new("Altavista", "Monterrey", "Norte", (0.0, 0.0)),
                DevelopmentRecord::new("Bosques", "Puebla", "Centro", (0.0, 0.0)),
            ],
        )
    }

    #[test]
    fn cached_and_live_agree() {
        let cached = Engine::new(dataset(), true);
        let live = Engine::new(dataset(), false);
        let vacio = FilterSpec::default();
        assert!(matches!(cached.funnel(None).unwrap(), Cow::Borrowed(_)));
        assert!(matches!(live.funnel(None).unwrap(), Cow::Owned(_)));
        assert_eq!(cached.funnel(None).unwrap(), live.funnel(Some(&vacio)).unwrap());
        assert_eq!(cached.cohorts(None).unwrap(), live.cohorts(None).unwrap());
        assert_eq!(cached.trends(Some(&vacio)).unwrap(), live.trends(None).unwrap());
        assert_eq!(cached.metrics(None).unwrap(), live.metrics(None).unwrap());
        assert_eq!(cached.heatmap(None, "contacto").unwrap(), live.heatmap(None, "Contacto").unwrap());
    }

    #[test]
    fn filtered_query_recomputes() {
        let e = Engine::new(dataset(), true);
        let spec = FilterSpec { projects: Some(vec!["Altavista".into()]), ..Default::default() };
        let f = e.funnel(Some(&spec)).unwrap();
        assert!(matches!(f, Cow::Owned(_)));
        assert_eq!(f.total_leads, 2);
        let m = e.metrics(Some(&spec)).unwrap();
        assert_eq!(m.total_investment, 300.0);
        assert_eq!(m.cost_per_lead, 150.0);
        // el cache no cambió
        assert_eq!(e.funnel(None).unwrap().total_leads, 3);
    }

    #[test]
    fn invalid_filter_is_rejected_even_on_fast_path() {
        let e = Engine::new(dataset(), true);
        let spec = FilterSpec { month: Some(0), ..Default::default() };
        assert!(matches!(e.funnel(Some(&spec)), Err(EmbudoError::InvalidFilter(_))));
    }

    #[test]
    fn heatmap_stage_selector() {
        let e = Engine::new(dataset(), true);
        assert!(matches!(e.heatmap(None, "visita"), Err(EmbudoError::UnknownStage(_))));
        assert!(matches!(e.heatmap(None, "lead"), Err(EmbudoError::UnknownStage(_))));
        let h = e.heatmap(None, "venta_bruta").unwrap();
        assert_eq!(h.stage, Etapa::VentaBruta);
        assert_eq!(h.cohort_labels.len(), 3);
    }

    #[test]
    fn slot_reload_while_query_holds_engine() {
        let slot = EngineSlot::new();
        assert!(slot.current().is_none());
        assert!(slot.replace(Engine::new(dataset(), false)).is_none());

        let en_uso = slot.current().unwrap();
        // recarga desde otro hilo con la consulta todavía viva
        let previo = std::thread::scope(|s| {
            s.spawn(|| slot.replace(Engine::new(Dataset::from_records(vec![], vec![], vec![]), false)))
                .join()
                .unwrap()
        });

        assert!(Arc::ptr_eq(&previo.unwrap(), &en_uso));
        assert_eq!(en_uso.funnel(None).unwrap().total_leads, 3);
        assert_eq!(slot.current().unwrap().stats().leads, 0);
    }

    #[test]
    fn static_views_and_stats() {
        let e = Engine::new(dataset(), false);
        assert_eq!(e.developments()[0].total_leads, 2);
        assert_eq!(e.filter_options().projects, vec!["Altavista", "Bosques"]);
        let s = e.stats();
        assert_eq!((s.leads, s.investment, s.developments, s.precomputed), (3, 2, 2, false));
        assert!(!e.is_precomputed());
    }
}
