//! HTTP metastore client
//!
//! Routes follow the Iceberg REST catalog layout:
//!
//! - `GET    /v1/config`                                  reachability check
//! - `POST   /v1/namespaces`                              create schema (409 = exists)
//! - `GET    /v1/namespaces/{schema}/tables`              list tables
//! - `POST   /v1/namespaces/{schema}/tables`              create table (409 = exists)
//! - `GET    /v1/namespaces/{schema}/tables/{table}`      load table
//! - `PUT    /v1/namespaces/{schema}/tables/{table}`      replace table
//! - `DELETE /v1/namespaces/{schema}/tables/{table}`      drop table
//!
//! Table bodies are [`TableEntry`] documents.

use super::{Catalog, TableEntry, TableIdent};
use crate::error::{redact_secret, Result, WriterError};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Serialize)]
struct CreateNamespaceRequest<'a> {
    namespace: Vec<&'a str>,
    properties: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ListTablesResponse {
    #[serde(default)]
    identifiers: Vec<TableIdentifier>,
}

#[derive(Debug, Deserialize)]
struct TableIdentifier {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorModel,
}

#[derive(Debug, Deserialize)]
struct ErrorModel {
    message: String,
}

/// Catalog client for an HTTP metastore
pub struct RestCatalog {
    name: String,
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl RestCatalog {
    /// Build the client and check reachability with `GET /v1/config`
    pub async fn connect(
        name: impl Into<String>,
        uri: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = uri.trim_end_matches('/').to_string();
        let credentials = token
            .as_deref()
            .map(redact_secret)
            .unwrap_or_else(|| "(anonymous)".to_string());

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WriterError::catalog_init("REST".to_string(), base_url.clone(), e.to_string())
            })?;

        let catalog = Self {
            name: name.into(),
            base_url,
            client,
            token,
        };

        let response = catalog
            .request(Method::GET, "/v1/config")
            .send()
            .await
            .map_err(|e| {
                WriterError::catalog_init(
                    "REST".to_string(),
                    catalog.base_url.clone(),
                    format!("{} (bearer_token: {})", e, credentials),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            return Err(WriterError::catalog_init(
                "REST".to_string(),
                catalog.base_url.clone(),
                format!(
                    "HTTP {}: {} (bearer_token: {})",
                    status, message, credentials
                ),
            ));
        }

        info!("✓ Connected to REST catalog: {}", catalog.base_url);
        Ok(catalog)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");

        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn tables_path(schema: &str) -> String {
        format!("/v1/namespaces/{}/tables", schema)
    }

    fn table_path(ident: &TableIdent) -> String {
        format!("/v1/namespaces/{}/tables/{}", ident.schema, ident.name)
    }

    async fn send(&self, builder: RequestBuilder, target: &str) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| WriterError::table_operation(target.to_string(), e.to_string()))
    }
}

/// Extract a readable message from an error response body
async fn error_message(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.is_empty() => "(empty body)".to_string(),
        Err(_) => body,
    }
}

async fn unexpected(response: Response, target: &str) -> WriterError {
    let status = response.status();
    let message = error_message(response).await;
    WriterError::table_operation(target.to_string(), format!("HTTP {}: {}", status, message))
}

#[async_trait]
impl Catalog for RestCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    #[instrument(skip(self))]
    async fn ensure_schema(&self, schema: &str) -> Result<()> {
        let body = CreateNamespaceRequest {
            namespace: vec![schema],
            properties: BTreeMap::new(),
        };
        let response = self
            .send(
                self.request(Method::POST, "/v1/namespaces").json(&body),
                schema,
            )
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!("Created schema: {}", schema);
                Ok(())
            }
            StatusCode::CONFLICT => {
                debug!("Schema '{}' already exists", schema);
                Ok(())
            }
            _ => Err(unexpected(response, schema).await),
        }
    }

    #[instrument(skip(self), fields(table = %ident))]
    async fn load_table(&self, ident: &TableIdent) -> Result<Option<TableEntry>> {
        let target = ident.to_string();
        let response = self
            .send(self.request(Method::GET, &Self::table_path(ident)), &target)
            .await?;

        match response.status() {
            status if status.is_success() => {
                let mut entry: TableEntry = response.json().await.map_err(|e| {
                    WriterError::table_operation(target, format!("invalid table document: {}", e))
                })?;
                entry.ident.catalog = self.name.clone();
                Ok(Some(entry))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected(response, &target).await),
        }
    }

    #[instrument(skip(self, entry), fields(table = %entry.ident))]
    async fn create_table(&self, entry: TableEntry) -> Result<()> {
        let target = entry.ident.to_string();
        let response = self
            .send(
                self.request(Method::POST, &Self::tables_path(&entry.ident.schema))
                    .json(&entry),
                &target,
            )
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(WriterError::table_exists(target)),
            _ => Err(unexpected(response, &target).await),
        }
    }

    #[instrument(skip(self, entry), fields(table = %entry.ident))]
    async fn replace_table(&self, entry: TableEntry) -> Result<()> {
        let target = entry.ident.to_string();
        let response = self
            .send(
                self.request(Method::PUT, &Self::table_path(&entry.ident))
                    .json(&entry),
                &target,
            )
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected(response, &target).await)
        }
    }

    #[instrument(skip(self), fields(table = %ident))]
    async fn drop_table(&self, ident: &TableIdent) -> Result<bool> {
        let target = ident.to_string();
        let response = self
            .send(
                self.request(Method::DELETE, &Self::table_path(ident)),
                &target,
            )
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected(response, &target).await),
        }
    }

    #[instrument(skip(self))]
    async fn list_tables(&self, schema: &str) -> Result<Vec<TableIdent>> {
        let response = self
            .send(
                self.request(Method::GET, &Self::tables_path(schema)),
                schema,
            )
            .await?;

        match response.status() {
            status if status.is_success() => {
                let listed: ListTablesResponse = response.json().await.map_err(|e| {
                    WriterError::table_operation(
                        schema.to_string(),
                        format!("invalid table listing: {}", e),
                    )
                })?;
                Ok(listed
                    .identifiers
                    .into_iter()
                    .map(|id| TableIdent::new(self.name.clone(), schema, id.name))
                    .collect())
            }
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            _ => Err(unexpected(response, schema).await),
        }
    }
}
