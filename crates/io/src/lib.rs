// Record sources over files and the configuration store

pub mod csv;
pub mod provider;
pub mod store;

pub use crate::csv::{CsvFileSource, CsvOptions};
pub use provider::ConfigSources;
pub use store::{SqliteExportSource, SqliteTableSource, StoreOptions};
