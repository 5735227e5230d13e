use crate::error::EngineError;
use crate::utils::round2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One matrix cell. `None` marks a missing observation.
pub type Cell = Option<f64>;

/// Dense [stocks, dates] matrix keyed by stock row and date column.
/// Columns are held newest-first: position 0 is the most recent trading day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMatrix {
    pub data: Vec<Cell>,
    pub shape: (usize, usize), // [stocks, dates]
    pub codes: Vec<String>,
    pub names: Vec<String>,
    pub dates: Vec<String>,
    #[serde(skip)]
    pub date_index: HashMap<String, usize>,
}

/// Price matrix: one price per stock and trading day.
pub type PriceMatrix = StockMatrix;

/// Pre-computed day-over-day differences, row-aligned with a [`PriceMatrix`].
pub type DiffMatrix = StockMatrix;

impl StockMatrix {
    /// Build a matrix from rows whose columns follow `dates` (newest-first).
    pub fn new(
        codes: Vec<String>,
        names: Vec<String>,
        dates: Vec<String>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, EngineError> {
        if codes.len() != rows.len() || names.len() != rows.len() {
            return Err(EngineError::invalid(
                "matrix",
                format!(
                    "{} codes, {} names but {} rows",
                    codes.len(),
                    names.len(),
                    rows.len()
                ),
            ));
        }

        let num_dates = dates.len();
        let mut data = Vec::with_capacity(rows.len() * num_dates);
        for (r, row) in rows.into_iter().enumerate() {
            if row.len() != num_dates {
                return Err(EngineError::RaggedRow {
                    row: r,
                    found: row.len(),
                    expected: num_dates,
                });
            }
            data.extend(row.into_iter().map(|cell| cell.filter(|v| v.is_finite())));
        }

        let date_index = build_date_index(&dates);

        Ok(Self {
            data,
            shape: (codes.len(), num_dates),
            codes,
            names,
            dates,
            date_index,
        })
    }

    /// Build a matrix from rows stored oldest-first; columns are reversed.
    pub fn from_ascending(
        codes: Vec<String>,
        names: Vec<String>,
        mut dates: Vec<String>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, EngineError> {
        dates.reverse();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.reverse();
                row
            })
            .collect();
        Self::new(codes, names, dates, rows)
    }

    pub fn num_stocks(&self) -> usize {
        self.shape.0
    }

    pub fn num_dates(&self) -> usize {
        self.shape.1
    }

    /// Full row for one stock, newest-first.
    pub fn row(&self, stock: usize) -> &[Cell] {
        let num_dates = self.shape.1;
        &self.data[stock * num_dates..(stock + 1) * num_dates]
    }

    /// Column position of a date label.
    pub fn position(&self, date: &str) -> Option<usize> {
        if self.date_index.is_empty() && !self.dates.is_empty() {
            return self.dates.iter().position(|d| d == date);
        }
        self.date_index.get(date).copied()
    }

    pub fn identity(&self, stock: usize) -> StockIdentity {
        StockIdentity {
            stock_idx: stock,
            code: self.codes[stock].clone(),
            name: self.names[stock].clone(),
        }
    }
}

fn build_date_index(dates: &[String]) -> HashMap<String, usize> {
    dates
        .iter()
        .enumerate()
        .map(|(i, date)| (date.clone(), i))
        .collect()
}

/// Stock identity carried by every output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockIdentity {
    pub stock_idx: usize,
    pub code: String,
    pub name: String,
}

/// Row-aligned price and diff matrices as consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixPair {
    pub price: PriceMatrix,
    pub diff: DiffMatrix,
}

impl MatrixPair {
    /// Pair two matrices after checking they share row count and column count.
    /// Diff columns are matched to price columns by position, not by label.
    /// Diff cells are rounded to 2 decimals.
    pub fn new(price: PriceMatrix, mut diff: DiffMatrix) -> Result<Self, EngineError> {
        if price.shape != diff.shape {
            return Err(EngineError::MatrixMisaligned {
                price_rows: price.shape.0,
                price_cols: price.shape.1,
                diff_rows: diff.shape.0,
                diff_cols: diff.shape.1,
            });
        }
        for cell in diff.data.iter_mut() {
            *cell = cell.map(round2);
        }
        Ok(Self { price, diff })
    }
}
