//! Reads `row<sep>col<sep>value` triples into a dense interaction matrix.
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::algorithms::preprocessing::MISSING;
use crate::error::{AlsError, Result};

/// Largest dense matrix the loader will allocate.
pub const MAX_CELLS: usize = 100_000_000;

struct Triple {
    row: usize,
    col: usize,
    value: f64,
}

pub fn load_triples<P: AsRef<Path>>(path: P, delimiter: char) -> Result<DMatrix<f64>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let matrix = parse_triples(BufReader::new(file), delimiter)?;

    info!(
        "Loaded {}x{} interaction matrix from {}",
        matrix.nrows(),
        matrix.ncols(),
        path.display()
    );
    Ok(matrix)
}

/// Ids are 1-based when the smallest column id is `1`, 0-based otherwise.
/// Cells without a triple hold [`MISSING`]. Blank lines and lines starting
/// with `#` are skipped.
pub fn parse_triples<R: BufRead>(reader: R, delimiter: char) -> Result<DMatrix<f64>> {
    let mut triples = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        triples.push(parse_line(trimmed, delimiter, number + 1)?);
    }

    let min_col = triples
        .iter()
        .map(|t| t.col)
        .min()
        .ok_or_else(|| AlsError::InvalidInput("no rating triples found".to_string()))?;
    let base = if min_col == 1 { 1 } else { 0 };
    debug!("Detected {}-based ids over {} triples", base, triples.len());

    if base == 1 && triples.iter().any(|t| t.row == 0) {
        return Err(AlsError::InvalidInput(
            "row id 0 found in 1-based data".to_string(),
        ));
    }

    let rows = dimension(triples.iter().map(|t| t.row).max(), base, "row")?;
    let cols = dimension(triples.iter().map(|t| t.col).max(), base, "column")?;
    match rows.checked_mul(cols) {
        Some(cells) if cells <= MAX_CELLS => {}
        _ => {
            return Err(AlsError::InvalidInput(format!(
                "{}x{} interaction matrix exceeds the limit of {} cells",
                rows, cols, MAX_CELLS
            )))
        }
    }

    let mut matrix = DMatrix::from_element(rows, cols, MISSING);
    for triple in &triples {
        matrix[(triple.row - base, triple.col - base)] = triple.value;
    }

    Ok(matrix)
}

fn dimension(max_id: Option<usize>, base: usize, axis: &str) -> Result<usize> {
    max_id
        .unwrap_or(0)
        .checked_add(1)
        .map(|n| n - base)
        .ok_or_else(|| AlsError::InvalidInput(format!("{} id too large", axis)))
}

fn parse_line(line: &str, delimiter: char, number: usize) -> Result<Triple> {
    let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    if fields.len() < 3 {
        return Err(AlsError::Parse {
            line: number,
            message: format!("expected 3 fields, found {}", fields.len()),
        });
    }

    let parse_id = |field: &str, name: &str| {
        field.parse::<usize>().map_err(|e| AlsError::Parse {
            line: number,
            message: format!("invalid {} id {:?}: {}", name, field, e),
        })
    };

    let row = parse_id(fields[0], "row")?;
    let col = parse_id(fields[1], "column")?;
    let value = fields[2].parse::<f64>().map_err(|e| AlsError::Parse {
        line: number,
        message: format!("invalid value {:?}: {}", fields[2], e),
    })?;

    Ok(Triple { row, col, value })
}
