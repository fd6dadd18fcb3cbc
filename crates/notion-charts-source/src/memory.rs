//! Fixed in-process records, keyed by database id

use crate::{RecordSource, Result, SourceError};
use async_trait::async_trait;
use notion_charts_core::{DatabaseSchema, Record};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    databases: HashMap<String, (DatabaseSchema, Vec<Record>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(
        mut self,
        database_id: impl Into<String>,
        schema: DatabaseSchema,
        records: Vec<Record>,
    ) -> Self {
        self.databases.insert(database_id.into(), (schema, records));
        self
    }

    fn lookup(&self, database_id: &str) -> Result<&(DatabaseSchema, Vec<Record>)> {
        self.databases
            .get(database_id)
            .ok_or_else(|| SourceError::NotFound(database_id.to_string()))
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch_all_records(&self, database_id: &str) -> Result<Vec<Record>> {
        Ok(self.lookup(database_id)?.1.clone())
    }

    async fn fetch_schema(&self, database_id: &str) -> Result<DatabaseSchema> {
        Ok(self.lookup(database_id)?.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notion_charts_core::PropertyValue;

    #[tokio::test]
    async fn test_memory_source() {
        let schema = DatabaseSchema {
            title: "Tasks".into(),
            properties: vec![],
        };
        let source = MemorySource::new().with_database(
            "db",
            schema.clone(),
            vec![Record::new("1").with_property("Status", PropertyValue::status("Done"))],
        );

        assert_eq!(source.fetch_all_records("db").await.unwrap().len(), 1);
        assert_eq!(source.fetch_schema("db").await.unwrap(), schema);
        assert!(matches!(
            source.fetch_all_records("other").await,
            Err(SourceError::NotFound(_))
        ));
    }
}
