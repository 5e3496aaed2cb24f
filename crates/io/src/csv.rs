// CSV record source

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::Path;

use confdiff_compare::config::{CsvConfig, Descriptor, FileRole};
use confdiff_compare::source::{RecordHandle, RecordSource};
use confdiff_compare::{Record, SourceError, Value};

#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field delimiter. `None` sniffs it from the first lines of the file.
    pub delimiter: Option<u8>,
    /// Columns always parsed as floats.
    pub numeric_columns: Vec<String>,
    /// Columns never inferred as numeric.
    pub text_columns: Vec<String>,
    /// Parse a column as floats when every non-blank cell is a number.
    pub infer_types: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self::from_config(&CsvConfig::default())
    }
}

impl CsvOptions {
    pub fn from_config(config: &CsvConfig) -> Self {
        Self {
            delimiter: config.delimiter.and_then(|c| u8::try_from(c).ok()),
            numeric_columns: config.numeric_columns.clone(),
            text_columns: config.text_columns.clone(),
            infer_types: config.infer_types,
        }
    }

    /// Listed numeric columns plus, when inferring, every column of `content`
    /// that holds only numbers and is not listed as text.
    fn numeric_set(&self, content: &str, delimiter: u8) -> HashSet<String> {
        let mut numeric: HashSet<String> = self.numeric_columns.iter().cloned().collect();
        if self.infer_types {
            numeric.extend(
                infer_numeric_columns(content, delimiter)
                    .into_iter()
                    .filter(|column| !self.text_columns.contains(column)),
            );
        }
        numeric
    }
}

/// Reads the file the descriptor names for one role, one record per data row
/// keyed by the header line.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    role: FileRole,
    options: CsvOptions,
}

impl CsvFileSource {
    pub fn new(role: FileRole, options: CsvOptions) -> Self {
        Self { role, options }
    }
}

impl RecordSource for CsvFileSource {
    fn describe(&self, descriptor: &Descriptor) -> String {
        match descriptor.files.get(self.role) {
            Some(path) => path.display().to_string(),
            None => format!("{} file", self.role),
        }
    }

    fn open(&self, descriptor: &Descriptor) -> Result<Box<dyn RecordHandle>, SourceError> {
        let resource = self.describe(descriptor);
        let path = descriptor
            .files
            .get(self.role)
            .ok_or_else(|| SourceError::open(&resource, format!("no {} file configured", self.role)))?;

        let content = read_file_as_utf8(path).map_err(|e| SourceError::open(&resource, e))?;
        let content = match content.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => content,
        };
        let delimiter = self.options.delimiter.unwrap_or_else(|| sniff_delimiter(&content));
        let numeric = self.options.numeric_set(&content, delimiter);
        tracing::debug!(
            "reading {resource} with delimiter {:?}, {} numeric columns",
            delimiter as char,
            numeric.len()
        );

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(Cursor::new(content.into_bytes()));
        let headers = reader
            .headers()
            .map_err(|e| SourceError::open(&resource, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        Ok(Box::new(CsvHandle {
            resource,
            reader: Some(reader),
            headers,
            numeric,
            row: csv::StringRecord::new(),
        }))
    }
}

struct CsvHandle {
    resource: String,
    reader: Option<csv::Reader<Cursor<Vec<u8>>>>,
    headers: Vec<String>,
    numeric: HashSet<String>,
    row: csv::StringRecord,
}

impl RecordHandle for CsvHandle {
    fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        let reader = self.reader.as_mut()?;
        match reader.read_record(&mut self.row) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => return Some(Err(SourceError::read(&self.resource, e))),
        }

        let record = self
            .headers
            .iter()
            .zip(self.row.iter())
            .map(|(header, field)| {
                let value = if self.numeric.contains(header) {
                    parse_numeric(field)
                } else {
                    Value::Text(field.to_string())
                };
                (header.clone(), value)
            })
            .collect();
        Some(Ok(record))
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// Blank becomes `Null`, a number becomes `Float`, anything else stays text.
fn parse_numeric(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match parse_number(trimmed) {
        Some(n) => Value::Float(n),
        None => Value::Text(field.to_string()),
    }
}

/// Finite numbers only; `nan` and `inf` are words in these files.
fn parse_number(trimmed: &str) -> Option<f64> {
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Headers of the columns that have at least one non-blank cell and no cell
/// that fails to parse as a number.
fn infer_numeric_columns(content: &str, delimiter: u8) -> HashSet<String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(|h| h.trim().to_string()).collect(),
        Err(_) => return HashSet::new(),
    };

    let mut seen = vec![false; headers.len()];
    let mut numeric = vec![true; headers.len()];
    for row in reader.records() {
        // Read errors surface from the handle; infer from the rows before them
        let Ok(row) = row else { break };
        for (i, field) in row.iter().enumerate().take(headers.len()) {
            let trimmed = field.trim();
            if trimmed.is_empty() {
                continue;
            }
            seen[i] = true;
            if parse_number(trimmed).is_none() {
                numeric[i] = false;
            }
        }
    }

    headers
        .into_iter()
        .enumerate()
        .filter(|(i, _)| seen[*i] && numeric[*i])
        .map(|(_, h)| h)
        .collect()
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Header line must split into more than one field
        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        // Lines agreeing with the header, weighted by field count
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (Windows-1252 exports from older tooling)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}
