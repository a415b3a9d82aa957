//! Escenarios de punta a punta: tablas crudas → ingesta → Engine.

mod helpers;

use std::collections::BTreeMap;

use helpers::Fixture;

use embudo_rust::{EmbudoError, Etapa, FilterSpec, FunnelResult, MetricsResult};

fn base() -> Fixture {
    Fixture::new()
        .development("Altavista", "Monterrey", "Norte")
        .development("Bosques", "Puebla", "Centro")
        .development("Cumbres", "Guadalajara", "Occidente")
}

#[test]
fn weekly_cohort_from_raw_tables() {
    // tres registros en 2024-W01; dos contactos en W01, uno en W02
    let engine = base()
        .lead("Altavista", Some("2024-01-01 09:00:00"), [Some("2024-01-02"), None, None, None])
        .lead("Altavista", Some("2024-01-03"), [Some("05/01/2024"), None, None, None])
        .lead("Bosques", Some("2024-01-04"), [Some("2024-01-09 11:30:00"), None, None, None])
        .engine(true);

    let cohorts = engine.cohorts(None).unwrap();
    assert_eq!(cohorts.len(), 1);
    assert_eq!(cohorts[0].cohort_week, "2024-W01");
    assert_eq!(cohorts[0].initial_leads, 3);
    assert_eq!(
        cohorts[0].conversions[&Etapa::Contacto],
        BTreeMap::from([(0, 66.67), (1, 100.0)])
    );
    assert_eq!(cohorts[0].conversions.len(), 1);

    let h = engine.heatmap(None, "Contacto").unwrap();
    assert_eq!(h.week_labels, vec![0, 1]);
    assert_eq!(h.matrix, vec![vec![Some(66.67), Some(100.0)]]);
}

#[test]
fn sale_without_appointment_gated_in_funnel_not_in_metrics() {
    let engine = base()
        .lead("Altavista", Some("2024-02-05"), [Some("2024-02-06"), None, Some("2024-03-01"), None])
        .lead("Bosques", Some("2024-02-07"), [Some("2024-02-08"), Some("2024-02-10"), None, None])
        .engine(true);

    let f = engine.funnel(None).unwrap();
    let counts: Vec<usize> = f.stages.iter().map(|s| s.count).collect();
    assert_eq!(counts, vec![2, 2, 1, 0, 0]);

    let m = engine.metrics(None).unwrap();
    assert_eq!(m.total_gross_sales, 1);
    assert_eq!(m.total_appointments, 1);
    assert_eq!(m.conversion_appointment_to_sale, 100.0);
}

#[test]
fn region_without_projects_yields_empty_results() {
    let engine = base()
        .lead("Altavista", Some("2024-01-02"), [Some("2024-01-03"), None, None, None])
        .investment("Altavista", "2024-01-01", 1000.0)
        .engine(true);
    let spec = FilterSpec { regions: Some(vec!["Sur".into()]), ..Default::default() };

    assert_eq!(*engine.funnel(Some(&spec)).unwrap(), FunnelResult { stages: vec![], total_leads: 0 });
    assert_eq!(*engine.metrics(Some(&spec)).unwrap(), MetricsResult::default());
    assert!(engine.cohorts(Some(&spec)).unwrap().is_empty());
    assert!(engine.trends(Some(&spec)).unwrap().data.is_empty());
    let h = engine.heatmap(Some(&spec), "cita").unwrap();
    assert!(h.matrix.is_empty());
}

#[test]
fn region_filter_reaches_investment() {
    let engine = base()
        .lead("Altavista", Some("2024-01-02"), [None; 4])
        .lead("Bosques", Some("2024-01-02"), [None; 4])
        .lead("Bosques", Some("2024-01-09"), [None; 4])
        .investment("Altavista", "2024-01-01", 900.0)
        .investment("Bosques", "2024-01-01", 300.0)
        .engine(true);

    let todo = engine.metrics(None).unwrap();
    assert_eq!(todo.total_investment, 1200.0);
    assert_eq!(todo.cost_per_lead, 400.0);

    let spec = FilterSpec { regions: Some(vec!["Centro".into()]), ..Default::default() };
    let centro = engine.metrics(Some(&spec)).unwrap();
    assert_eq!(centro.total_leads, 2);
    assert_eq!(centro.total_investment, 300.0);
    assert_eq!(centro.cost_per_lead, 150.0);
}

#[test]
fn developments_carry_totals_and_coordinates() {
    let engine = base()
        .lead("Altavista", Some("2024-01-02"), [Some("2024-01-03"), Some("2024-01-04"), Some("2024-01-05"), Some("2024-02-01")])
        .lead("Altavista", Some("2024-01-02"), [None, None, Some("2024-01-05"), None])
        .investment("Altavista", "2024-01-01", 10.5)
        .engine(false);

    let devs = engine.developments();
    assert_eq!(devs.len(), 3);
    let alta = &devs[0];
    assert_eq!(alta.name, "Altavista");
    assert_eq!((alta.total_leads, alta.total_sales, alta.total_closings), (2, 2, 1));
    assert_eq!(alta.conversion_rate, 50.0);
    assert_eq!(alta.total_investment, 10.5);
    assert!((alta.latitude - 25.6866).abs() < 0.5);
    assert_eq!(devs[1].total_leads, 0);
}

#[test]
fn filter_options_and_columns() {
    let engine = base()
        .lead("Bosques", Some("2023-12-31"), [None; 4])
        .lead("Altavista", Some("2024-01-02"), [None; 4])
        .engine(true);

    let o = engine.filter_options();
    assert_eq!(o.projects, vec!["Altavista", "Bosques"]);
    assert_eq!(o.regions, vec!["Centro", "Norte", "Occidente"]);
    assert_eq!(o.years, vec![2023, 2024]);
    assert_eq!(o.weeks, vec!["2023-W52", "2024-W01"]);

    let cols = engine.columns();
    assert_eq!(cols.leads.resolved["registro"].as_deref(), Some("fecha_de_registro"));
    assert_eq!(cols.leads.resolved["venta_bruta"].as_deref(), Some("fecha_venta_bruta"));
    assert_eq!(cols.investment.resolved["monto"].as_deref(), Some("inversión"));
    assert_eq!(cols.developments.resolved["region"].as_deref(), Some("región"));
}

#[test]
fn filtered_trends_by_month() {
    let engine = base()
        .lead("Altavista", Some("2024-01-10"), [Some("2024-01-11"), None, None, None])
        .lead("Altavista", Some("2024-02-10"), [None; 4])
        .lead("Bosques", Some("2024-02-12"), [Some("2024-02-13"), None, None, None])
        .engine(true);

    let spec = FilterSpec { month: Some(2), ..Default::default() };
    let t = engine.trends(Some(&spec)).unwrap();
    assert_eq!(t.data.len(), 1);
    assert_eq!(t.data[0].period, "2024-02");
    assert_eq!(t.data[0].leads, 2);
    assert_eq!(t.data[0].contacto, 50.0);
}

#[test]
fn query_errors_are_not_fatal() {
    let engine = base().lead("Altavista", Some("2024-01-02"), [None; 4]).engine(true);
    let err = engine.heatmap(None, "visita").unwrap_err();
    assert!(matches!(err, EmbudoError::UnknownStage(_)));
    assert!(!err.is_fatal());

    let spec: FilterSpec = serde_json::from_str(r#"{"week_iso": 60}"#).unwrap();
    let err = engine.cohorts(Some(&spec)).unwrap_err();
    assert!(matches!(err, EmbudoError::InvalidFilter(_)));
    assert!(!err.is_fatal());
}

#[test]
fn missing_stage_column_reports_zero() {
    use embudo_rust::geo::CiudadesMexico;
    use embudo_rust::table::Table;
    use embudo_rust::{Dataset, Engine};

    // sin columna de cita: cita y todo lo posterior en cero
    let leads = Table::new("leads")
        .with_text("fecha_registro", vec![Some("2024-01-02"), Some("2024-01-03")])
        .and_then(|t| t.with_text("fecha_contacto", vec![Some("2024-01-04"), None]))
        .and_then(|t| t.with_text("fecha_venta", vec![Some("2024-01-20"), None]))
        .unwrap();
    let inversion = Table::new("inversion").with_numbers("monto", vec![]).unwrap();
    let desarrollos = Table::new("desarrollos").with_text("nombre", vec![]).unwrap();
    let ds = Dataset::build(leads, inversion, desarrollos, &CiudadesMexico).unwrap();
    let engine = Engine::new(ds, true);

    let counts: Vec<usize> = engine.funnel(None).unwrap().stages.iter().map(|s| s.count).collect();
    assert_eq!(counts, vec![2, 1, 0, 0, 0]);
    assert_eq!(engine.metrics(None).unwrap().total_gross_sales, 1);
    assert_eq!(engine.columns().leads.resolved["cita"], None);
}
