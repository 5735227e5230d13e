use crate::{
    error::LoadError,
    models::{Cell, MatrixPair, StockMatrix},
    utils::{detect_order, format_date_range_info, log_load, parse_date_label, round2, DateOrder, Logger, Timer},
};
use std::{fs::File, io::Read, path::Path};

/// Loads price and diff matrices from CSV files.
///
/// The combined layout is `code,name,<price dates...>,,<diff dates...>`: a
/// blank header column separates the two date blocks. Either date order is
/// accepted; matrices come back newest-first.
#[derive(Debug, Clone)]
pub struct CsvMatrixService {
    logger: Logger,
}

/// One `code,name,<dates...>` block as read from a file.
struct Block {
    codes: Vec<String>,
    names: Vec<String>,
    labels: Vec<String>,
    order: DateOrder,
    rows: Vec<Vec<Cell>>,
}

impl Block {
    fn into_matrix(self) -> Result<StockMatrix, LoadError> {
        let matrix = match self.order {
            DateOrder::Ascending => StockMatrix::from_ascending(self.codes, self.names, self.labels, self.rows)?,
            DateOrder::Descending => StockMatrix::new(self.codes, self.names, self.labels, self.rows)?,
        };
        Ok(matrix)
    }
}

impl CsvMatrixService {
    pub fn new() -> Self {
        Self {
            logger: Logger::new("CSV_SERVICE"),
        }
    }

    /// Load a combined file holding both blocks.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<MatrixPair, LoadError> {
        let path = path.as_ref();
        self.logger.info(&format!("Loading matrices from {}", path.display()));
        let timer = Timer::start("csv load");

        let pair = self.parse_combined(File::open(path)?)?;

        self.log_loaded(&pair);
        timer.log_elapsed("CSV_SERVICE");
        Ok(pair)
    }

    /// Load price and diff blocks from two files with the same stock rows.
    pub fn load_pair(&self, price_path: impl AsRef<Path>, diff_path: impl AsRef<Path>) -> Result<MatrixPair, LoadError> {
        let timer = Timer::start("csv pair load");
        let price = read_block(File::open(price_path.as_ref())?, false)?;
        let diff = read_block(File::open(diff_path.as_ref())?, true)?;

        if price.codes != diff.codes {
            return Err(LoadError::BadHeader(
                "price and diff files list different stock codes".to_string(),
            ));
        }
        if price.labels.len() != diff.labels.len() || price.order != diff.order {
            return Err(LoadError::BadHeader(format!(
                "price has {} {:?} dates, diff has {} {:?} dates",
                price.labels.len(),
                price.order,
                diff.labels.len(),
                diff.order
            )));
        }

        let pair = MatrixPair::new(price.into_matrix()?, diff.into_matrix()?)?;
        self.log_loaded(&pair);
        timer.log_elapsed("CSV_SERVICE");
        Ok(pair)
    }

    /// Parse the combined layout from any reader.
    pub fn parse_combined<R: Read>(&self, reader: R) -> Result<MatrixPair, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(LoadError::BadHeader("expected code,name columns".to_string()));
        }

        let sentinel = headers
            .iter()
            .enumerate()
            .skip(2)
            .find(|(_, h)| h.trim().is_empty())
            .map(|(i, _)| i)
            .ok_or(LoadError::MissingSentinel)?;

        let price_labels = header_labels(headers.iter().take(sentinel).skip(2))?;
        let diff_labels = header_labels(headers.iter().skip(sentinel + 1))?;
        if price_labels.len() != diff_labels.len() {
            return Err(LoadError::BadHeader(format!(
                "{} price dates but {} diff dates",
                price_labels.len(),
                diff_labels.len()
            )));
        }
        let order = date_order(&price_labels)?;
        if date_order(&diff_labels)? != order {
            return Err(LoadError::BadHeader(
                "price and diff dates run in opposite orders".to_string(),
            ));
        }

        let mut price = Block::empty(price_labels, order);
        let mut diff = Block::empty(diff_labels, order);

        for (i, record) in csv_reader.records().enumerate() {
            let record = record?;
            let (code, name) = identity(&record, i + 1)?;
            price.codes.push(code.clone());
            price.names.push(name.clone());
            diff.codes.push(code);
            diff.names.push(name);

            price
                .rows
                .push(parse_cells(&record, 2, &price.labels, i + 1, false)?);
            diff.rows
                .push(parse_cells(&record, sentinel + 1, &diff.labels, i + 1, true)?);
        }

        Ok(MatrixPair::new(price.into_matrix()?, diff.into_matrix()?)?)
    }

    fn log_loaded(&self, pair: &MatrixPair) {
        let dates = &pair.price.dates;
        let (newest, oldest) = match (dates.first(), dates.last()) {
            (Some(n), Some(o)) => (n.as_str(), o.as_str()),
            _ => ("-", "-"),
        };
        log_load(&format!(
            "{} stocks, {}",
            pair.price.num_stocks(),
            format_date_range_info(oldest, newest, dates.len())
        ));
    }
}

impl Default for CsvMatrixService {
    fn default() -> Self {
        Self::new()
    }
}

impl Block {
    fn empty(labels: Vec<String>, order: DateOrder) -> Self {
        Self {
            codes: Vec::new(),
            names: Vec::new(),
            labels,
            order,
            rows: Vec::new(),
        }
    }
}

fn read_block<R: Read>(reader: R, is_diff: bool) -> Result<Block, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    if headers.len() < 3 {
        return Err(LoadError::BadHeader("expected code,name and at least one date".to_string()));
    }
    let labels = header_labels(headers.iter().skip(2))?;
    let mut block = Block::empty(labels.clone(), date_order(&labels)?);

    for (i, record) in csv_reader.records().enumerate() {
        let record = record?;
        let (code, name) = identity(&record, i + 1)?;
        block.codes.push(code);
        block.names.push(name);
        block.rows.push(parse_cells(&record, 2, &labels, i + 1, is_diff)?);
    }
    Ok(block)
}

fn header_labels<'a>(headers: impl Iterator<Item = &'a str>) -> Result<Vec<String>, LoadError> {
    let labels: Vec<String> = headers.map(|h| h.trim().to_string()).collect();
    if labels.is_empty() {
        return Err(LoadError::BadHeader("no date columns".to_string()));
    }
    for label in &labels {
        parse_date_label(label).map_err(|e| LoadError::BadHeader(e.to_string()))?;
    }
    Ok(labels)
}

fn date_order(labels: &[String]) -> Result<DateOrder, LoadError> {
    detect_order(labels).ok_or_else(|| LoadError::BadHeader("date columns are not strictly ordered".to_string()))
}

fn identity(record: &csv::StringRecord, row: usize) -> Result<(String, String), LoadError> {
    match (record.get(0), record.get(1)) {
        (Some(code), Some(name)) if !code.trim().is_empty() => {
            Ok((code.trim().to_string(), name.trim().to_string()))
        }
        (code, _) => Err(LoadError::BadCell {
            row,
            column: "code".to_string(),
            value: code.unwrap_or_default().to_string(),
        }),
    }
}

/// Cells `first..first + labels.len()` of one record. Blank and NaN cells
/// are missing; diff cells are rounded to 2 decimals.
fn parse_cells(
    record: &csv::StringRecord,
    first: usize,
    labels: &[String],
    row: usize,
    round: bool,
) -> Result<Vec<Cell>, LoadError> {
    labels
        .iter()
        .enumerate()
        .map(|(offset, label)| {
            let raw = record.get(first + offset).unwrap_or("").trim();
            if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
                return Ok(None);
            }
            let value: f64 = raw.parse().map_err(|_| LoadError::BadCell {
                row,
                column: label.clone(),
                value: raw.to_string(),
            })?;
            let value = if round { round2(value) } else { value };
            Ok(value.is_finite().then_some(value))
        })
        .collect()
}
