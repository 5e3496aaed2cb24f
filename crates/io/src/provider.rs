// Sources wired from a loaded descriptor

use confdiff_compare::comparer::SourceProvider;
use confdiff_compare::config::{CompareConfig, FileRole};
use confdiff_compare::source::RecordSource;

use crate::csv::{CsvFileSource, CsvOptions};
use crate::store::{SqliteExportSource, SqliteTableSource, StoreOptions};

/// Candidate files are CSV, the current configuration lives in the SQLite store.
pub struct ConfigSources<'a> {
    config: &'a CompareConfig,
}

impl<'a> ConfigSources<'a> {
    pub fn new(config: &'a CompareConfig) -> Self {
        Self { config }
    }

    fn store_options(&self) -> StoreOptions {
        StoreOptions::from_config(&self.config.store)
    }
}

impl SourceProvider for ConfigSources<'_> {
    fn candidate_file(&self, role: FileRole) -> Box<dyn RecordSource> {
        Box::new(CsvFileSource::new(role, CsvOptions::from_config(&self.config.csv)))
    }

    fn store_table(&self) -> Box<dyn RecordSource> {
        Box::new(SqliteTableSource::new(self.store_options()))
    }

    fn store_export(&self, name: &str) -> Box<dyn RecordSource> {
        match self.config.export_query(name) {
            Ok(sql) => Box::new(SqliteExportSource::new(self.store_options(), name, sql)),
            Err(e) => Box::new(SqliteExportSource::unresolved(self.store_options(), name, e)),
        }
    }
}
