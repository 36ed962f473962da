//! Processing session for lakewrite jobs
//!
//! Provides the small engine surface a job needs:
//!
//! - [`SessionBuilder`] / [`Session`]: acquire storage and a catalog, release once
//! - [`DataFrame`]: literal rows checked against an Arrow schema
//! - [`DataFrameWriter`]: Parquet files plus catalog registration with Spark-style save modes
//! - [`Catalog`]: in-memory, object-storage and REST metastores

pub mod catalog;
mod dataframe;
mod encoding;
pub mod error;
mod session;
mod storage;
mod write;

pub use catalog::{
    columns_from_schema, initialize_catalog, Catalog, ColumnEntry, DataFileEntry, MemoryCatalog,
    RestCatalog, StorageCatalog, TableEntry, TableIdent, DEFAULT_SCHEMA,
};
pub use dataframe::{DataFrame, Row, Value};
pub use encoding::set_parquet_row_group_size;
pub use error::{ErrorCode, Result, WriterError};
pub use session::{
    ReleaseHandle, RuntimeConf, Session, SessionBuilder, CONF_APP_NAME,
    CONF_CATALOG_IMPLEMENTATION, CONF_METASTORE_URIS, CONF_PARQUET_COMPRESSION,
    CONF_WAREHOUSE_DIR,
};
pub use storage::{Storage, TableLocation};
pub use write::{
    managed_location, DataFrameWriter, WriteSummary, OPTION_COMPRESSION, OPTION_PATH,
};

// Re-export for convenience
pub use lakewrite_config::{Compression, SaveMode};
