/// One entry of the `errors` list in a response header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub message: String,
}

impl From<&ErrorRecord> for ErrorEntry {
    fn from(record: &ErrorRecord) -> Self {
        Self {
            kind: record.kind().to_string(),
            id: record.id().to_string(),
            message: record.message().to_string(),
        }
    }
}

/// Client-visible summary of a batch.
///
/// A tolerant batch always reports `numErrors`; `errors` is present only
/// when at least one command failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_errors: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_adds: Option<usize>,
}

impl ResponseHeader {
    pub fn render(errors: &[ErrorRecord], num_adds: usize) -> Self {
        Self {
            num_errors: Some(errors.len()),
            errors: errors.iter().map(ErrorEntry::from).collect(),
            num_adds: Some(num_adds),
        }
    }

    pub fn num_errors(&self) -> usize {
        self.num_errors.unwrap_or_default()
    }

    pub fn num_adds(&self) -> usize {
        self.num_adds.unwrap_or_default()
    }

    pub fn error_for_id(&self, id: &str) -> Option<&ErrorEntry> {
        self.errors.iter().find(|entry| entry.id == id)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
