use super::{IndexError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field value types understood by the index schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
}

impl FieldType {
    /// Checks that a JSON value can be indexed as this type.
    ///
    /// Strings holding a number are accepted for numeric types, the way most
    /// document formats ship numbers.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String | Self::Text, Value::String(_)) => true,
            (Self::String, Value::Number(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().is_ok(),
            (Self::Float, Value::Number(_)) => true,
            (Self::Float, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Boolean, Value::String(s)) => matches!(s.as_str(), "true" | "false"),
            (_, Value::Array(items)) => items.iter().all(|item| self.accepts(item)),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Schema of a collection: typed fields plus the unique key field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSchema {
    pub unique_key: String,
    pub fields: Vec<SchemaField>,
}

impl IndexSchema {
    pub fn new(unique_key: impl Into<String>, fields: Vec<SchemaField>) -> Result<Self> {
        let schema = Self {
            unique_key: unique_key.into(),
            fields,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<()> {
        if self.unique_key.trim().is_empty() {
            return Err(IndexError::Schema(
                "unique key field must not be empty".to_string(),
            ));
        }
        if self.field(&self.unique_key).is_none() {
            return Err(IndexError::Schema(format!(
                "unique key field '{}' is not declared",
                self.unique_key
            )));
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Validates every field of a document against the schema.
    pub fn check_document(&self, doc: &IndexDocument) -> Result<()> {
        let id = doc.printable_id(self)?;
        for (name, value) in doc.fields() {
            let Some(field) = self.field(name) else {
                return Err(IndexError::BadRequest(format!(
                    "ERROR: [doc={}] unknown field '{}'",
                    id, name
                )));
            };
            if !field.field_type.accepts(value) {
                return Err(IndexError::BadRequest(format!(
                    "ERROR: [doc={}] Error adding field '{}'='{}': expected {}",
                    id,
                    name,
                    display_value(value),
                    field.field_type
                )));
            }
        }
        for field in self.fields.iter().filter(|field| field.required) {
            if doc.get(&field.name).is_none() {
                return Err(IndexError::BadRequest(format!(
                    "ERROR: [doc={}] missing required field: {}",
                    id, field.name
                )));
            }
        }
        Ok(())
    }
}

/// A document submitted for indexing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct IndexDocument {
    fields: Map<String, Value>,
}

impl IndexDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(IndexError::BadRequest(format!(
                "document must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Resolves the readable unique key of this document.
    pub fn printable_id(&self, schema: &IndexSchema) -> Result<String> {
        match self.fields.get(&schema.unique_key) {
            Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            Some(other) => Err(IndexError::BadRequest(format!(
                "Document contains an unusable value for uniqueKey field '{}': {}",
                schema.unique_key, other
            ))),
            None => Err(IndexError::BadRequest(format!(
                "Document is missing mandatory uniqueKey field: {}",
                schema.unique_key
            ))),
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> IndexSchema {
        IndexSchema::new(
            "id",
            vec![
                SchemaField::new("id", FieldType::String).required(),
                SchemaField::new("text", FieldType::Text),
                SchemaField::new("iind", FieldType::Integer),
            ],
        )
        .unwrap()
    }

    #[test]
    fn numeric_ids_resolve_to_their_readable_form() {
        let doc = IndexDocument::from_json(json!({"id": 4, "text": "the brown fox"})).unwrap();
        assert_eq!(doc.printable_id(&schema()).unwrap(), "4");
    }

    #[test]
    fn missing_unique_key_fails_resolution() {
        let doc = IndexDocument::new().with_field("text", "no id");
        assert!(matches!(
            doc.printable_id(&schema()),
            Err(IndexError::BadRequest(_))
        ));
    }

    #[test]
    fn mistyped_field_is_rejected_with_document_id() {
        let doc = IndexDocument::from_json(json!({"id": 1, "iind": "b"})).unwrap();
        let err = schema().check_document(&doc).unwrap_err();
        assert!(err.to_string().contains("[doc=1]"));
        assert!(err.to_string().contains("iind"));
    }

    #[test]
    fn schema_requires_declared_unique_key() {
        let err = IndexSchema::new("uid", vec![SchemaField::new("id", FieldType::String)]);
        assert!(err.is_err());
    }
}
