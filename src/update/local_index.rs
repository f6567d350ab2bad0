use super::command::{AddCommand, DeleteCommand};
use super::processor::{UpdateProcessor, UpdateResponse};
use crate::core::{IndexDocument, IndexError, IndexSchema, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory document store for one collection on one node.
#[derive(Debug, Clone)]
pub struct LocalIndex {
    schema: Arc<IndexSchema>,
    documents: BTreeMap<String, IndexDocument>,
}

impl LocalIndex {
    pub fn new(schema: Arc<IndexSchema>) -> Self {
        Self {
            schema,
            documents: BTreeMap::new(),
        }
    }

    pub fn shared(schema: Arc<IndexSchema>) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(schema)))
    }

    pub fn schema(&self) -> &Arc<IndexSchema> {
        &self.schema
    }

    pub fn add(&mut self, cmd: &AddCommand) -> Result<()> {
        self.schema.check_document(&cmd.document)?;
        let id = cmd.document.printable_id(&self.schema)?;
        if !cmd.overwrite && self.documents.contains_key(&id) {
            return Err(IndexError::BadRequest(format!(
                "ERROR: [doc={}] document already exists and overwrite=false",
                id
            )));
        }
        self.documents.insert(id, cmd.document.clone());
        Ok(())
    }

    pub fn delete(&mut self, cmd: &DeleteCommand) -> Result<usize> {
        match cmd {
            DeleteCommand::ById { id } => {
                if id.trim().is_empty() {
                    return Err(IndexError::BadRequest(
                        "delete-by-id requires a non-empty id".to_string(),
                    ));
                }
                Ok(usize::from(self.documents.remove(id).is_some()))
            }
            DeleteCommand::ByQuery { query } => self.delete_by_query(query),
        }
    }

    fn delete_by_query(&mut self, query: &str) -> Result<usize> {
        let matcher = QueryMatcher::parse(query, &self.schema)?;
        let before = self.documents.len();
        self.documents.retain(|_, doc| !matcher.matches(doc));
        Ok(before - self.documents.len())
    }

    pub fn get(&self, id: &str) -> Option<&IndexDocument> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Sorted ids of every stored document.
    pub fn ids(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }
}

/// `*:*` or `field:value`.
enum QueryMatcher {
    All,
    FieldEquals { field: String, value: String },
}

impl QueryMatcher {
    fn parse(query: &str, schema: &IndexSchema) -> Result<Self> {
        let query = query.trim();
        if query == "*:*" {
            return Ok(Self::All);
        }
        let Some((field, value)) = query.split_once(':') else {
            return Err(IndexError::BadRequest(format!(
                "Cannot parse query '{}': expected field:value",
                query
            )));
        };
        if schema.field(field).is_none() {
            return Err(IndexError::BadRequest(format!(
                "Cannot parse query '{}': undefined field {}",
                query, field
            )));
        }
        Ok(Self::FieldEquals {
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    fn matches(&self, doc: &IndexDocument) -> bool {
        match self {
            Self::All => true,
            Self::FieldEquals { field, value } => match doc.get(field) {
                Some(Value::Array(items)) => items.iter().any(|item| value_equals(item, value)),
                Some(item) => value_equals(item, value),
                None => false,
            },
        }
    }
}

fn value_equals(item: &Value, expected: &str) -> bool {
    match item {
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}

/// Terminal link of a standalone chain: applies commands to the local index.
pub struct LocalIndexProcessor {
    index: Arc<Mutex<LocalIndex>>,
}

impl LocalIndexProcessor {
    pub fn new(index: Arc<Mutex<LocalIndex>>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl UpdateProcessor for LocalIndexProcessor {
    async fn process_add(&mut self, cmd: &AddCommand) -> Result<()> {
        self.index.lock().await.add(cmd)
    }

    async fn process_delete(&mut self, cmd: &DeleteCommand) -> Result<()> {
        self.index.lock().await.delete(cmd).map(|_| ())
    }

    async fn finish(&mut self, _rsp: &mut UpdateResponse) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldType, SchemaField};
    use serde_json::json;

    fn index() -> LocalIndex {
        let schema = IndexSchema::new(
            "id",
            vec![
                SchemaField::new("id", FieldType::String),
                SchemaField::new("text", FieldType::Text),
                SchemaField::new("tag", FieldType::String),
            ],
        )
        .unwrap();
        LocalIndex::new(Arc::new(schema))
    }

    fn add(id: &str, tag: &str) -> AddCommand {
        AddCommand::new(IndexDocument::from_json(json!({"id": id, "tag": tag})).unwrap())
    }

    #[test]
    fn delete_by_query_removes_matching_documents() {
        let mut index = index();
        index.add(&add("1", "red")).unwrap();
        index.add(&add("2", "blue")).unwrap();
        index.add(&add("3", "red")).unwrap();

        let removed = index.delete(&DeleteCommand::by_query("tag:red")).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.ids(), vec!["2".to_string()]);
    }

    #[test]
    fn unparseable_query_is_a_bad_request() {
        let mut index = index();
        assert!(matches!(
            index.delete(&DeleteCommand::by_query("no-colon")),
            Err(IndexError::BadRequest(_))
        ));
        assert!(matches!(
            index.delete(&DeleteCommand::by_query("missing:x")),
            Err(IndexError::BadRequest(_))
        ));
    }

    #[test]
    fn overwrite_false_rejects_existing_document() {
        let mut index = index();
        index.add(&add("1", "red")).unwrap();
        let mut again = add("1", "blue");
        again.overwrite = false;
        assert!(index.add(&again).is_err());
        assert_eq!(index.get("1").unwrap().get("tag"), Some(&json!("red")));
    }
}
