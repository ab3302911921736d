use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Refine an initial partition of Boolean rows and return one label per row.
#[pyfunction]
#[pyo3(signature = (rows, assignments, multiplier = popc::DEFAULT_MULTIPLIER, power = popc::DEFAULT_POWER))]
fn refine(
    rows: Vec<Vec<bool>>,
    assignments: Vec<usize>,
    multiplier: f64,
    power: f64,
) -> PyResult<Vec<usize>> {
    let ds = popc::Dataset::from_rows(&rows).map_err(|e| PyValueError::new_err(e.to_string()))?;
    popc::labels_extra(&ds, &assignments, multiplier, power)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Initial k-means partition with `len(rows) // 2` clusters.
#[pyfunction]
fn initial_assignments(rows: Vec<Vec<bool>>) -> PyResult<Vec<usize>> {
    let ds = popc::Dataset::from_rows(&rows).map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(popc::initial_assignments(&ds))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(refine, m)?)?;
    m.add_function(wrap_pyfunction!(initial_assignments, m)?)?;
    Ok(())
}
