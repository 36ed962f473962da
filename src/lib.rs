//! lakewrite - write a sample dataset to object storage as Parquet and
//! register it as a catalog table.
//!
//! The binary resolves a [`JobConfig`](lakewrite_config::JobConfig) once at
//! startup and hands it to [`run`].

mod dataset;
mod init;
mod job;

pub use dataset::{sample_rows, sample_schema};
pub use init::init_tracing;
pub use job::{run, run_with_config, JobError, JobReport, WriteOutcome};
