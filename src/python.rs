// ===========================================================================
// MÓDULO PyO3  (feature `python`)
//
// Un solo Engine por proceso:
//
//   cargar_dataset(leads, inversion, desarrollos)  → construye + precalcula
//   cohortes / heatmap / funnel / tendencias / metricas (filtro_json)
//   desarrollos / opciones_filtro / columnas / engine_stats
//
// Filtros y resultados cruzan la frontera como JSON. Todo cálculo corre con
// el GIL liberado y sin lock tomado: cada consulta clona el Arc del motor.
// Errores de carga → RuntimeError; filtro/etapa inválidos → ValueError.
// ===========================================================================

use std::collections::HashMap;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;
use serde::Serialize;

use crate::cache::{Engine, EngineSlot};
use crate::config;
use crate::error::{EmbudoError, Result};
use crate::filter::FilterSpec;
use crate::geo::CiudadesMexico;
use crate::ingest::Dataset;
use crate::load::read_table;

static ENGINE: EngineSlot = EngineSlot::new();

fn to_py_err(e: EmbudoError) -> PyErr {
    if e.is_fatal() {
        PyRuntimeError::new_err(e.to_string())
    } else {
        PyValueError::new_err(e.to_string())
    }
}

fn parse_filtro(json: Option<&str>) -> PyResult<Option<FilterSpec>> {
    match json.map(str::trim) {
        None | Some("") | Some("null") => Ok(None),
        Some(s) => serde_json::from_str(s)
            .map(Some)
            .map_err(|e| to_py_err(e.into())),
    }
}

fn json<T: Serialize>(v: T) -> Result<String> {
    Ok(serde_json::to_string(&v)?)
}

/// Toma el Engine vigente y ejecuta `f` sin GIL.
fn consultar<F>(py: Python<'_>, f: F) -> PyResult<String>
where
    F: FnOnce(&Engine) -> Result<String> + Send,
{
    let eng = ENGINE
        .current()
        .ok_or_else(|| PyRuntimeError::new_err("Motor no init: falta cargar_dataset"))?;
    py.allow_threads(move || f(&eng)).map_err(to_py_err)
}

// ===========================================================================
// CARGA
// ===========================================================================

#[pyfunction]
#[pyo3(signature = (leads, inversion, desarrollos, precompute = true))]
fn cargar_dataset(
    py:          Python<'_>,
    leads:       &Bound<'_, PyBytes>,
    inversion:   &Bound<'_, PyBytes>,
    desarrollos: &Bound<'_, PyBytes>,
    precompute:  bool,
) -> PyResult<usize> {
    let raw_leads = leads.as_bytes().to_vec();
    let raw_inv = inversion.as_bytes().to_vec();
    let raw_dev = desarrollos.as_bytes().to_vec();

    // el swap también va sin GIL: nunca se espera un lock reteniéndolo
    py.allow_threads(|| -> Result<usize> {
        let ds = Dataset::build(
            read_table("leads", &raw_leads)?,
            read_table("inversion", &raw_inv)?,
            read_table("desarrollos", &raw_dev)?,
            &CiudadesMexico,
        )?;
        let n = ds.leads().len();
        ENGINE.replace(Engine::new(ds, precompute));
        Ok(n)
    })
    .map_err(to_py_err)
}

// ===========================================================================
// CONSULTAS
// ===========================================================================

#[pyfunction]
#[pyo3(signature = (filtro_json = None))]
fn cohortes(py: Python<'_>, filtro_json: Option<&str>) -> PyResult<String> {
    let filtro = parse_filtro(filtro_json)?;
    consultar(py, |e| json(e.cohorts(filtro.as_ref())?))
}

#[pyfunction]
#[pyo3(signature = (filtro_json = None, etapa = "contacto"))]
fn heatmap(py: Python<'_>, filtro_json: Option<&str>, etapa: &str) -> PyResult<String> {
    let filtro = parse_filtro(filtro_json)?;
    consultar(py, |e| json(e.heatmap(filtro.as_ref(), etapa)?))
}

#[pyfunction]
#[pyo3(signature = (filtro_json = None))]
fn funnel(py: Python<'_>, filtro_json: Option<&str>) -> PyResult<String> {
    let filtro = parse_filtro(filtro_json)?;
    consultar(py, |e| json(e.funnel(filtro.as_ref())?))
}

#[pyfunction]
#[pyo3(signature = (filtro_json = None))]
fn tendencias(py: Python<'_>, filtro_json: Option<&str>) -> PyResult<String> {
    let filtro = parse_filtro(filtro_json)?;
    consultar(py, |e| json(e.trends(filtro.as_ref())?))
}

#[pyfunction]
#[pyo3(signature = (filtro_json = None))]
fn metricas(py: Python<'_>, filtro_json: Option<&str>) -> PyResult<String> {
    let filtro = parse_filtro(filtro_json)?;
    consultar(py, |e| json(e.metrics(filtro.as_ref())?))
}

#[pyfunction]
fn desarrollos(py: Python<'_>) -> PyResult<String> {
    consultar(py, |e| json(e.developments()))
}

#[pyfunction]
fn opciones_filtro(py: Python<'_>) -> PyResult<String> {
    consultar(py, |e| json(e.filter_options()))
}

#[pyfunction]
fn columnas(py: Python<'_>) -> PyResult<String> {
    consultar(py, |e| json(e.columns()))
}

#[pyfunction]
fn engine_stats() -> PyResult<HashMap<String, usize>> {
    let mut s = HashMap::new();
    match ENGINE.current().map(|e| e.stats()) {
        Some(st) => {
            s.insert("inicializado".into(), 1);
            s.insert("leads".into(),        st.leads);
            s.insert("inversion".into(),    st.investment);
            s.insert("desarrollos".into(),  st.developments);
            s.insert("cohorts".into(),      st.cohorts);
            s.insert("precalculado".into(), st.precomputed as usize);
        }
        None => {
            s.insert("inicializado".into(), 0);
        }
    }
    Ok(s)
}

#[pymodule]
fn embudo_rust(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    crate::logging::init(&config::load().unwrap_or_default());
    m.add_function(wrap_pyfunction!(cargar_dataset,  m)?)?;
    m.add_function(wrap_pyfunction!(cohortes,        m)?)?;
    m.add_function(wrap_pyfunction!(heatmap,         m)?)?;
    m.add_function(wrap_pyfunction!(funnel,          m)?)?;
    m.add_function(wrap_pyfunction!(tendencias,      m)?)?;
    m.add_function(wrap_pyfunction!(metricas,        m)?)?;
    m.add_function(wrap_pyfunction!(desarrollos,     m)?)?;
    m.add_function(wrap_pyfunction!(opciones_filtro, m)?)?;
    m.add_function(wrap_pyfunction!(columnas,        m)?)?;
    m.add_function(wrap_pyfunction!(engine_stats,    m)?)?;
    Ok(())
}
