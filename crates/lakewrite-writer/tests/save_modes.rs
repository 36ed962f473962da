//! Save-mode behaviour of `save_as_table` and `save` against in-memory and
//! filesystem storage.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use lakewrite_config::{FsConfig, JobConfig, StorageBackend};
use lakewrite_writer::{
    DataFrame, ErrorCode, SaveMode, Session, SessionBuilder, TableIdent, TableLocation, Value,
};
use opendal::Operator;
use std::sync::Arc;

fn people_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, true),
        Field::new("id", DataType::Int32, true),
    ]))
}

async fn session() -> Session {
    let op = Operator::new(opendal::services::Memory::default())
        .unwrap()
        .finish();
    SessionBuilder::default()
        .app_name("save-modes")
        .enable_catalog_support()
        .with_operator(op)
        .get_or_create()
        .await
        .unwrap()
}

fn people(session: &Session, names: &[&str]) -> DataFrame {
    let rows = names
        .iter()
        .enumerate()
        .map(|(i, name)| vec![Value::from(*name), Value::from(i as i32)])
        .collect();
    session.create_dataframe(rows, people_schema()).unwrap()
}

const TABLE: &str = "hive.default.people";
const PATH: &str = "s3a://bucket/default/people";

#[tokio::test]
async fn error_if_exists_is_the_default() {
    let session = session().await;
    let df = people(&session, &["a"]);

    df.write().option("path", PATH).save_as_table(TABLE).await.unwrap();
    let err = df
        .write()
        .option("path", PATH)
        .save_as_table(TABLE)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::E002TableExists);
    session.stop();
}

#[tokio::test]
async fn ignore_skips_existing_table() {
    let session = session().await;
    people(&session, &["a"])
        .write()
        .option("path", PATH)
        .save_as_table(TABLE)
        .await
        .unwrap();

    let summary = people(&session, &["b", "c"])
        .write()
        .mode(SaveMode::Ignore)
        .option("path", PATH)
        .save_as_table(TABLE)
        .await
        .unwrap();
    assert!(summary.skipped);
    assert_eq!(session.read_table(TABLE).await.unwrap().count().unwrap(), 1);
}

#[tokio::test]
async fn append_adds_files_and_checks_columns() {
    let session = session().await;
    for names in [&["a"][..], &["b", "c"][..]] {
        people(&session, names)
            .write()
            .mode(SaveMode::Append)
            .option("path", PATH)
            .save_as_table(TABLE)
            .await
            .unwrap();
    }

    let ident = TableIdent::new("hive", "default", "people");
    let entry = session.catalog().load_table(&ident).await.unwrap().unwrap();
    assert_eq!(entry.files.len(), 2);
    assert_eq!(entry.row_count(), 3);
    assert_eq!(session.read_table(TABLE).await.unwrap().count().unwrap(), 3);

    let other = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]));
    let err = session
        .create_dataframe(vec![vec![1i64.into()]], other)
        .unwrap()
        .write()
        .mode(SaveMode::Append)
        .option("path", PATH)
        .save_as_table(TABLE)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::E003SchemaIncompatible);
}

#[tokio::test]
async fn overwrite_replaces_data_and_entry() {
    let session = session().await;
    let location = TableLocation::parse(PATH).unwrap();

    for names in [&["a", "b", "c", "d"][..], &["x", "y"][..]] {
        let summary = people(&session, names)
            .write()
            .format("parquet")
            .mode(SaveMode::Overwrite)
            .option("path", PATH)
            .save_as_table(TABLE)
            .await
            .unwrap();
        assert_eq!(summary.rows_written, names.len());
        assert!(summary.files[0].path.starts_with(PATH));
        assert!(summary.files[0].path.ends_with(".snappy.parquet"));
    }

    let objects = session.storage().list(&location).await.unwrap();
    assert_eq!(objects.len(), 2, "{objects:?}");
    assert!(objects.contains(&"_SUCCESS".to_string()));

    let rows = session.read_table(TABLE).await.unwrap().collect_rows().unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from("x"), Value::Int32(0)],
            vec![Value::from("y"), Value::Int32(1)],
        ]
    );
    assert_eq!(
        session.catalog().list_tables("default").await.unwrap(),
        vec![TableIdent::new("hive", "default", "people")]
    );
}

#[tokio::test]
async fn managed_table_lands_in_warehouse() {
    let session = session().await;
    let summary = people(&session, &["a"])
        .write()
        .option("compression", "zstd")
        .save_as_table("sales.people")
        .await
        .unwrap();

    assert_eq!(
        summary.location,
        "s3a://spark-data/warehouse/sales.db/people"
    );
    assert!(summary.files[0].path.ends_with(".zstd.parquet"));

    let entry = session
        .catalog()
        .load_table(&TableIdent::new("hive", "sales", "people"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.properties.get("table_type").map(String::as_str), Some("MANAGED"));
    assert_eq!(entry.properties.get("compression").map(String::as_str), Some("zstd"));
}

#[tokio::test]
async fn overwrite_to_new_path_removes_managed_files_only() {
    let session = session().await;
    let managed = TableLocation::parse("s3a://spark-data/warehouse/people").unwrap();
    let external = TableLocation::parse(PATH).unwrap();

    people(&session, &["a"]).write().save_as_table(TABLE).await.unwrap();
    assert!(session.storage().has_objects(&managed).await.unwrap());

    people(&session, &["b"])
        .write()
        .mode(SaveMode::Overwrite)
        .option("path", PATH)
        .save_as_table(TABLE)
        .await
        .unwrap();
    assert!(!session.storage().has_objects(&managed).await.unwrap());
    assert!(session.storage().has_objects(&external).await.unwrap());

    // External data stays where it was
    people(&session, &["c"])
        .write()
        .mode(SaveMode::Overwrite)
        .save_as_table(TABLE)
        .await
        .unwrap();
    assert!(session.storage().has_objects(&external).await.unwrap());
    assert!(session.storage().has_objects(&managed).await.unwrap());
    assert_eq!(
        session.read_table(TABLE).await.unwrap().collect_rows().unwrap(),
        vec![vec![Value::from("c"), Value::Int32(0)]]
    );
}

#[tokio::test]
async fn rejects_other_formats_and_catalogs() {
    let session = session().await;
    let df = people(&session, &["a"]);

    let err = df.write().format("csv").save_as_table(TABLE).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::E006UnsupportedFormat);

    let err = df
        .write()
        .save_as_table("other.default.people")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::E004InvalidConfig);
}

#[tokio::test]
async fn save_without_catalog() {
    let session = session().await;
    let df = people(&session, &["a", "b"]);

    df.write().save("s3a://bucket/raw/people").await.unwrap();
    let err = df.write().save("s3a://bucket/raw/people").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::E005WriteFailure);

    let skipped = df
        .write()
        .mode(SaveMode::Ignore)
        .save("s3a://bucket/raw/people")
        .await
        .unwrap();
    assert!(skipped.skipped);

    df.write()
        .mode(SaveMode::Append)
        .save("s3a://bucket/raw/people")
        .await
        .unwrap();
    let read = session.read_parquet("s3a://bucket/raw/people").await.unwrap();
    assert_eq!(read.count().unwrap(), 4);
    assert!(session.catalog().list_tables("raw").await.unwrap().is_empty());
}

#[tokio::test]
async fn filesystem_backend_writes_under_bucket_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = JobConfig::default();
    config.storage.backend = StorageBackend::Fs;
    config.storage.fs = Some(FsConfig {
        path: dir.path().to_string_lossy().to_string(),
    });

    let session = SessionBuilder::from_config(&config)
        .app_name("fs-test")
        .enable_catalog_support()
        .get_or_create()
        .await
        .unwrap();

    people(&session, &["a"])
        .write()
        .mode(SaveMode::Overwrite)
        .option("path", config.table_location())
        .save_as_table(&config.qualified_table_name())
        .await
        .unwrap();
    session.stop();

    let table_dir = dir.path().join("spark-data/default/test_spark_table");
    let files: Vec<String> = std::fs::read_dir(&table_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert!(files.iter().any(|f| f.starts_with("part-00000-")));
    assert!(dir
        .path()
        .join("spark-data/warehouse/_metastore/default/test_spark_table.json")
        .exists());
}
