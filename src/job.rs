// The write job: acquire a session, build the sample dataset, write and
// register it, release the session.
//
// The session is released on every path out of `run`: explicitly after the
// write, and through `Drop` if anything in between panics.

use crate::dataset::{sample_rows, sample_schema};
use lakewrite_config::JobConfig;
use lakewrite_writer::{
    ErrorCode, SessionBuilder, WriteSummary, WriterError, CONF_METASTORE_URIS,
    CONF_WAREHOUSE_DIR,
};
use tracing::{error, info, instrument, warn};

/// Fatal job failures
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Failed to create session: {0}")]
    SessionInit(#[source] WriterError),

    #[error("Failed to build sample dataset: {0}")]
    Dataset(#[source] WriterError),

    #[error("Failed to write table '{table}': {source}")]
    Write {
        table: String,
        #[source]
        source: WriterError,
    },
}

/// Result of the write step
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written(WriteSummary),
    /// The write failed and the failure was logged but not propagated
    Failed { code: ErrorCode, message: String },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written(_))
    }
}

/// What the job did
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub qualified_name: String,
    pub location: String,
    pub write: WriteOutcome,
    pub session_released: bool,
}

/// Run the job with a session built from `config`
pub async fn run_with_config(config: &JobConfig) -> Result<JobReport, JobError> {
    run(config, SessionBuilder::from_config(config)).await
}

/// Run the job, acquiring the session from `builder`
#[instrument(skip_all, fields(table = %config.qualified_table_name()))]
pub async fn run(config: &JobConfig, builder: SessionBuilder) -> Result<JobReport, JobError> {
    let location = config.table_location();
    let qualified_name = config.qualified_table_name();

    info!("Creating session '{}'", config.session.app_name);
    let mut builder = builder.app_name(config.session.app_name.clone());
    if config.session.catalog_support {
        builder = builder.enable_catalog_support();
    }

    let session = match builder.get_or_create().await {
        Ok(session) => session,
        Err(e) => {
            error!("Error creating session: {}", e);
            return Err(JobError::SessionInit(e));
        }
    };
    let release = session.release_handle();

    info!("Session created successfully");
    info!(
        "Metastore URIs: {}",
        session.conf().get(CONF_METASTORE_URIS).unwrap_or("(not set)")
    );
    info!(
        "Warehouse dir: {}",
        session.conf().get(CONF_WAREHOUSE_DIR).unwrap_or("(not set)")
    );
    info!("Using bucket: {}", config.table.bucket);
    info!("Target table: {}", qualified_name);
    info!("Target path: {}", location);

    let df = match session.create_dataframe(sample_rows(), sample_schema()) {
        Ok(df) => df,
        Err(e) => {
            error!("Error creating dataset: {}", e);
            session.stop();
            return Err(JobError::Dataset(e));
        }
    };

    info!("Dataset created: {:?}", df);
    if let Err(e) = df.show() {
        warn!("Could not display dataset: {}", e);
    }

    info!(
        "Writing table {} to {} (mode={})",
        qualified_name, location, config.write.mode
    );
    let result = df
        .write()
        .format("parquet")
        .mode(config.write.mode)
        .option("path", location.as_str())
        .save_as_table(&qualified_name)
        .await;

    let (write, fatal) = match result {
        Ok(summary) => {
            info!(
                "Successfully wrote {} rows to table {} at {}",
                summary.rows_written, qualified_name, location
            );
            (WriteOutcome::Written(summary), None)
        }
        Err(e) => {
            error!("Error writing table {}: {}", qualified_name, e);
            let outcome = WriteOutcome::Failed {
                code: e.code(),
                message: e.to_string(),
            };
            let fatal = config.write.fail_on_error.then_some(e);
            (outcome, fatal)
        }
    };

    drop(df);
    session.stop();
    info!("Session stopped");

    if let Some(source) = fatal {
        return Err(JobError::Write {
            table: qualified_name,
            source,
        });
    }

    info!("Job finished");
    Ok(JobReport {
        qualified_name,
        location,
        write,
        session_released: release.is_released(),
    })
}
