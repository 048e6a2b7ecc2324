use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use softwalker_core::config::SimConfig;
use softwalker_core::metrics::RunSummary;
use softwalker_core::orchestrator::Orchestrator;
use softwalker_core::topology::Topology;
use std::sync::Arc;

/// Minimal PyO3 module exposing softwalker-core to Python.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pyfunction]
fn default_config_json() -> PyResult<String> {
    serde_json::to_string(&SimConfig::default())
        .map_err(|e| PyValueError::new_err(format!("failed to serialize default config: {e}")))
}

#[pyfunction]
fn default_topology_json() -> PyResult<String> {
    serde_json::to_string(&Topology::biped())
        .map_err(|e| PyValueError::new_err(format!("failed to serialize default topology: {e}")))
}

#[pyfunction]
fn validate_config_json(config_json: &str) -> PyResult<bool> {
    parse_config(config_json)
        .map(|_| true)
        .map_err(PyValueError::new_err)
}

#[pyfunction]
fn validate_topology_json(topology_json: &str) -> PyResult<bool> {
    parse_topology(topology_json)
        .map(|_| true)
        .map_err(PyValueError::new_err)
}

/// Evolve for `generations` and return the run summary as JSON. Either input
/// may be omitted to use the defaults.
#[pyfunction]
#[pyo3(signature = (generations, config_json=None, topology_json=None))]
fn run_evolution_json(
    py: Python<'_>,
    generations: usize,
    config_json: Option<&str>,
    topology_json: Option<&str>,
) -> PyResult<String> {
    let config = match config_json {
        Some(json) => parse_config(json).map_err(PyValueError::new_err)?,
        None => SimConfig::default(),
    };
    let topology = match topology_json {
        Some(json) => parse_topology(json).map_err(PyValueError::new_err)?,
        None => Topology::biped(),
    };
    let summary = py
        .allow_threads(|| run_evolution(config, topology, generations))
        .map_err(PyValueError::new_err)?;
    serde_json::to_string(&summary)
        .map_err(|e| PyValueError::new_err(format!("failed to serialize summary: {e}")))
}

fn parse_config(config_json: &str) -> Result<SimConfig, String> {
    let config: SimConfig =
        serde_json::from_str(config_json).map_err(|e| format!("invalid config json: {e}"))?;
    config
        .validate()
        .map_err(|e| format!("invalid configuration: {e}"))?;
    Ok(config)
}

fn parse_topology(topology_json: &str) -> Result<Topology, String> {
    Topology::from_json(topology_json).map_err(|e| format!("invalid topology: {e}"))
}

fn run_evolution(
    config: SimConfig,
    topology: Topology,
    generations: usize,
) -> Result<RunSummary, String> {
    let mut orchestrator = Orchestrator::new(config, Arc::new(topology))
        .map_err(|e| format!("invalid run configuration: {e}"))?;
    orchestrator
        .run(generations)
        .map_err(|e| format!("run failed: {e}"))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(default_config_json, m)?)?;
    m.add_function(wrap_pyfunction!(default_topology_json, m)?)?;
    m.add_function(wrap_pyfunction!(validate_config_json, m)?)?;
    m.add_function(wrap_pyfunction!(validate_topology_json, m)?)?;
    m.add_function(wrap_pyfunction!(run_evolution_json, m)?)?;
    Ok(())
}
