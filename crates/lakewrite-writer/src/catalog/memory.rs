use super::{Catalog, TableEntry, TableIdent};
use crate::error::{Result, WriterError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Default)]
struct State {
    schemas: BTreeSet<String>,
    tables: BTreeMap<(String, String), TableEntry>,
}

/// Process-local catalog. Registrations disappear with the process.
pub struct MemoryCatalog {
    name: String,
    state: Mutex<State>,
}

impl MemoryCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn key(ident: &TableIdent) -> (String, String) {
        (ident.schema.clone(), ident.name.clone())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> String {
        format!("memory://{}", self.name)
    }

    async fn ensure_schema(&self, schema: &str) -> Result<()> {
        if self.state.lock().schemas.insert(schema.to_string()) {
            tracing::info!("Created schema: {}", schema);
        }
        Ok(())
    }

    async fn load_table(&self, ident: &TableIdent) -> Result<Option<TableEntry>> {
        Ok(self.state.lock().tables.get(&Self::key(ident)).cloned())
    }

    async fn create_table(&self, entry: TableEntry) -> Result<()> {
        let mut state = self.state.lock();
        if !state.schemas.contains(&entry.ident.schema) {
            return Err(WriterError::table_operation(
                entry.ident.to_string(),
                format!("schema '{}' does not exist", entry.ident.schema),
            ));
        }

        let key = Self::key(&entry.ident);
        if state.tables.contains_key(&key) {
            return Err(WriterError::table_exists(entry.ident.to_string()));
        }
        state.tables.insert(key, entry);
        Ok(())
    }

    async fn replace_table(&self, entry: TableEntry) -> Result<()> {
        let mut state = self.state.lock();
        if !state.schemas.contains(&entry.ident.schema) {
            return Err(WriterError::table_operation(
                entry.ident.to_string(),
                format!("schema '{}' does not exist", entry.ident.schema),
            ));
        }
        state.tables.insert(Self::key(&entry.ident), entry);
        Ok(())
    }

    async fn drop_table(&self, ident: &TableIdent) -> Result<bool> {
        Ok(self.state.lock().tables.remove(&Self::key(ident)).is_some())
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<TableIdent>> {
        Ok(self
            .state
            .lock()
            .tables
            .values()
            .filter(|entry| entry.ident.schema == schema)
            .map(|entry| entry.ident.clone())
            .collect())
    }
}
