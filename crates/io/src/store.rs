// SQLite configuration store sources
//
// Both sources run one query bound to the descriptor's data set, buffer the
// result set at open and hold the connection until the handle is closed.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use rust_decimal::Decimal;

use confdiff_compare::config::{is_sql_identifier, ConfigType, Descriptor, StoreConfig};
use confdiff_compare::source::{RecordHandle, RecordSource};
use confdiff_compare::{Record, SourceError, Value};

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub path: Option<PathBuf>,
    /// Column holding the data-set name each row belongs to.
    pub data_set_column: String,
    /// TEXT columns read as fixed-point decimals.
    pub decimal_columns: Vec<String>,
}

impl StoreOptions {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            path: config.path.clone(),
            data_set_column: config.data_set_column.clone(),
            decimal_columns: config.decimal_columns.clone(),
        }
    }

    fn location(&self) -> String {
        match &self.path {
            Some(p) => p.display().to_string(),
            None => "store".to_string(),
        }
    }

    fn connect(&self, resource: &str) -> Result<Connection, SourceError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| SourceError::open(resource, "no store database configured"))?;
        Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| SourceError::open(resource, e))
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Table scan
// ---------------------------------------------------------------------------

/// Rows of the table named after the descriptor's ESF configuration type.
#[derive(Debug, Clone)]
pub struct SqliteTableSource {
    options: StoreOptions,
}

impl SqliteTableSource {
    pub fn new(options: StoreOptions) -> Self {
        Self { options }
    }

    fn table<'a>(&self, descriptor: &'a Descriptor) -> Option<&'a str> {
        match &descriptor.config_type {
            ConfigType::Esf(name) => Some(name.as_str()),
            ConfigType::Waterbalance => None,
        }
    }
}

impl RecordSource for SqliteTableSource {
    fn describe(&self, descriptor: &Descriptor) -> String {
        format!("{}:{}", self.options.location(), descriptor.config_type)
    }

    fn open(&self, descriptor: &Descriptor) -> Result<Box<dyn RecordHandle>, SourceError> {
        let resource = self.describe(descriptor);
        let table = self.table(descriptor).ok_or_else(|| {
            SourceError::open(&resource, "water balance configurations have no single store table")
        })?;
        if !is_sql_identifier(table) {
            return Err(SourceError::open(&resource, format!("invalid table name '{table}'")));
        }
        let column = &self.options.data_set_column;
        if !is_sql_identifier(column) {
            return Err(SourceError::open(&resource, format!("invalid column name '{column}'")));
        }

        let sql = format!("SELECT * FROM \"{table}\" WHERE \"{column}\" = ?1");
        let conn = self.options.connect(&resource)?;
        let items = query_records(&conn, &sql, &descriptor.data_set, &self.options, &resource)?;
        tracing::debug!("{resource}: {} rows for data set '{}'", items.len(), descriptor.data_set);
        Ok(Box::new(StoreHandle { items, conn: Some(conn) }))
    }
}

// ---------------------------------------------------------------------------
// Named export
// ---------------------------------------------------------------------------

/// Rows of a named export query; `?1` is bound to the descriptor's data set.
#[derive(Debug, Clone)]
pub struct SqliteExportSource {
    options: StoreOptions,
    name: String,
    query: Result<String, String>,
}

impl SqliteExportSource {
    pub fn new(options: StoreOptions, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self { options, name: name.into(), query: Ok(sql.into()) }
    }

    /// An export whose query could not be resolved; opening it always fails.
    pub fn unresolved(options: StoreOptions, name: impl Into<String>, reason: impl ToString) -> Self {
        Self { options, name: name.into(), query: Err(reason.to_string()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RecordSource for SqliteExportSource {
    fn describe(&self, _descriptor: &Descriptor) -> String {
        format!("{}#{}", self.options.location(), self.name)
    }

    fn open(&self, descriptor: &Descriptor) -> Result<Box<dyn RecordHandle>, SourceError> {
        let resource = self.describe(descriptor);
        let sql = self.query.as_ref().map_err(|reason| SourceError::open(&resource, reason))?;
        let conn = self.options.connect(&resource)?;
        let items = query_records(&conn, sql, &descriptor.data_set, &self.options, &resource)?;
        tracing::debug!("{resource}: {} rows for data set '{}'", items.len(), descriptor.data_set);
        Ok(Box::new(StoreHandle { items, conn: Some(conn) }))
    }
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

struct StoreHandle {
    items: VecDeque<Result<Record, SourceError>>,
    conn: Option<Connection>,
}

impl RecordHandle for StoreHandle {
    fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        self.conn.as_ref()?;
        self.items.pop_front()
    }

    fn close(&mut self) {
        self.items.clear();
        self.conn = None;
    }
}

/// Statement failures are open errors. A failure while stepping through rows
/// ends the buffer with a read error item. The data-set column is dropped from
/// every record: it holds the same value on every row and is not configuration.
fn query_records(
    conn: &Connection,
    sql: &str,
    data_set: &str,
    options: &StoreOptions,
    resource: &str,
) -> Result<VecDeque<Result<Record, SourceError>>, SourceError> {
    let mut stmt = conn.prepare(sql).map_err(|e| SourceError::open(resource, e))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let decimal: HashSet<&str> = options.decimal_columns.iter().map(String::as_str).collect();

    let mut rows = stmt.query([data_set]).map_err(|e| SourceError::open(resource, e))?;
    let mut items = VecDeque::new();
    loop {
        let row = match rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => {
                items.push_back(Err(SourceError::read(resource, e)));
                break;
            }
        };

        let mut record = Record::new();
        let mut failed = None;
        for (i, column) in columns.iter().enumerate() {
            if *column == options.data_set_column {
                continue;
            }
            match row.get_ref(i) {
                Ok(value) => {
                    record.insert(column.clone(), convert(value, decimal.contains(column.as_str())));
                }
                Err(e) => {
                    failed = Some(SourceError::read(resource, e));
                    break;
                }
            }
        }
        match failed {
            Some(err) => {
                items.push_back(Err(err));
                break;
            }
            None => items.push_back(Ok(record)),
        }
    }
    Ok(items)
}

fn convert(value: ValueRef<'_>, as_decimal: bool) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Decimal(Decimal::from(i)),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if as_decimal {
                if let Ok(d) = text.trim().parse::<Decimal>() {
                    return Value::Decimal(d);
                }
            }
            Value::Text(text.into_owned())
        }
        ValueRef::Blob(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn create_store(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE esf1 (GAFIDENT TEXT, OPP REAL, AANTAL INTEGER, PEIL TEXT, OPM TEXT, data_set TEXT);
             INSERT INTO esf1 VALUES ('3201', 12.5, 3, '-0.40', NULL, 'v1');
             INSERT INTO esf1 VALUES ('3202', 7.0, 1, '0.10', 'x', 'v1');
             INSERT INTO esf1 VALUES ('3201', 99.0, 9, '9', NULL, 'v2');
             CREATE TABLE areas (GAFIDENT TEXT, NAAM TEXT, data_set TEXT);
             INSERT INTO areas VALUES ('3201', 'Polder', 'v1');",
        )
        .unwrap();
    }

    fn descriptor(config_type: &str, data_set: &str) -> Descriptor {
        let mut d = Descriptor::for_area("3201", config_type);
        d.data_set = data_set.into();
        d
    }

    fn options(path: &Path) -> StoreOptions {
        StoreOptions { path: Some(path.to_path_buf()), ..StoreOptions::default() }
    }

    fn drain(mut handle: Box<dyn RecordHandle>) -> Vec<Record> {
        let mut out = Vec::new();
        while let Some(item) = handle.next_record() {
            out.push(item.unwrap());
        }
        handle.close();
        out
    }

    #[test]
    fn test_table_source_filters_on_data_set() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("store.db");
        create_store(&db);

        let source = SqliteTableSource::new(options(&db));
        let records = drain(source.open(&descriptor("esf1", "v1")).unwrap());
        let opp: Vec<_> = records.iter().map(|r| r.get("OPP").cloned()).collect();
        assert_eq!(opp, vec![Some(Value::Float(12.5)), Some(Value::Float(7.0))]);
        assert!(records.iter().all(|r| !r.contains_key("data_set")));
    }

    #[test]
    fn test_column_affinity_mapping() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("store.db");
        create_store(&db);

        let mut opts = options(&db);
        opts.decimal_columns = vec!["PEIL".into()];
        let source = SqliteTableSource::new(opts);
        let records = drain(source.open(&descriptor("esf1", "v1")).unwrap());
        let first = &records[0];

        assert_eq!(first.get("GAFIDENT"), Some(&Value::from("3201")));
        assert_eq!(first.get("OPP"), Some(&Value::Float(12.5)));
        assert_eq!(first.get("AANTAL"), Some(&Value::Decimal(Decimal::from(3))));
        assert_eq!(first.get("PEIL"), Some(&Value::Decimal("-0.40".parse().unwrap())));
        assert_eq!(first.get("OPM"), Some(&Value::Null));
    }

    #[test]
    fn test_waterbalance_has_no_table() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("store.db");
        create_store(&db);

        let source = SqliteTableSource::new(options(&db));
        let err = source.open(&descriptor("waterbalans", "v1")).err().unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
    }

    #[test]
    fn test_invalid_table_identifier_rejected() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("store.db");
        create_store(&db);

        let source = SqliteTableSource::new(options(&db));
        let err = source.open(&descriptor("esf1\"; DROP TABLE esf1; --", "v1")).err().unwrap();
        assert!(err.reason().contains("invalid table name"));
    }

    #[test]
    fn test_missing_table_is_open_error() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("store.db");
        create_store(&db);

        let source = SqliteTableSource::new(options(&db));
        let err = source.open(&descriptor("esf9", "v1")).err().unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
        assert_eq!(err.resource(), format!("{}:esf9", db.display()));
    }

    #[test]
    fn test_missing_database_is_open_error() {
        let dir = tempdir().unwrap();
        let source = SqliteTableSource::new(options(&dir.path().join("absent.db")));
        assert!(source.open(&descriptor("esf1", "v1")).is_err());
        // Read-only open must not create the file
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn test_no_store_configured() {
        let source = SqliteTableSource::new(StoreOptions::default());
        let err = source.open(&descriptor("esf1", "v1")).err().unwrap();
        assert!(err.reason().contains("no store database configured"));
    }

    #[test]
    fn test_export_source_binds_data_set() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("store.db");
        create_store(&db);

        let source = SqliteExportSource::new(
            options(&db),
            "areaconfiguration",
            "SELECT GAFIDENT, NAAM FROM areas WHERE data_set = ?1",
        );
        assert_eq!(source.name(), "areaconfiguration");
        let records = drain(source.open(&descriptor("waterbalans", "v1")).unwrap());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("NAAM"), Some(&Value::from("Polder")));

        let none = drain(source.open(&descriptor("waterbalans", "v3")).unwrap());
        assert!(none.is_empty());
    }

    #[test]
    fn test_export_with_bad_sql_is_open_error() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("store.db");
        create_store(&db);

        let source = SqliteExportSource::new(options(&db), "broken", "SELEC nonsense ?1");
        let err = source.open(&descriptor("waterbalans", "v1")).err().unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
    }

    #[test]
    fn test_unresolved_export_never_opens() {
        let source = SqliteExportSource::unresolved(StoreOptions::default(), "bad name", "not configured");
        let err = source.open(&descriptor("waterbalans", "v1")).err().unwrap();
        assert_eq!(err.reason(), "not configured");
        assert_eq!(err.resource(), "store#bad name");
    }

    #[test]
    fn test_closed_store_handle_yields_nothing() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("store.db");
        create_store(&db);

        let source = SqliteTableSource::new(options(&db));
        let mut handle = source.open(&descriptor("esf1", "v1")).unwrap();
        assert!(handle.next_record().is_some());
        handle.close();
        handle.close();
        assert!(handle.next_record().is_none());
    }
}
