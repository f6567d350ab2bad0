/// Id reported for a failed command whose document id could not be resolved.
pub const UNKNOWN_ID: &str = "(unknown)";

/// Namespace of the failure-metadata keys written by tolerant sessions.
pub const ERROR_METADATA_PREFIX: &str = "shardindex.tolerant--";

/// The kind of command a tolerated failure belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Add,
    DeleteById,
    DeleteByQuery,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::DeleteById => "DELETE_BY_ID",
            Self::DeleteByQuery => "DELETE_BY_QUERY",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ADD" => Some(Self::Add),
            "DELETE_BY_ID" => Some(Self::DeleteById),
            "DELETE_BY_QUERY" => Some(Self::DeleteByQuery),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed command of a batch.
///
/// For delete-by-query the `id` holds the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ErrorRecord {
    kind: ErrorKind,
    id: String,
    message: String,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `<prefix><KIND>:<id>`
    pub fn metadata_key(&self) -> String {
        format!("{}{}:{}", ERROR_METADATA_PREFIX, self.kind, self.id)
    }

    pub fn metadata_value(&self) -> &str {
        &self.message
    }

    /// Decodes a metadata entry written by `metadata_key`/`metadata_value`.
    ///
    /// Keys outside the namespace yield `Ok(None)`; a namespaced key that does
    /// not parse is an error.
    pub fn parse_metadata(key: &str, value: &str) -> Result<Option<Self>> {
        let Some(rest) = key.strip_prefix(ERROR_METADATA_PREFIX) else {
            return Ok(None);
        };
        let Some((kind, id)) = rest.split_once(':') else {
            return Err(IndexError::MalformedMetadata(format!(
                "missing ':' separator in error metadata key '{}'",
                key
            )));
        };
        let kind = ErrorKind::parse(kind).ok_or_else(|| {
            IndexError::MalformedMetadata(format!(
                "unknown command kind '{}' in error metadata key '{}'",
                kind, key
            ))
        })?;
        Ok(Some(Self::new(kind, id, value)))
    }

    pub fn is_metadata_key(key: &str) -> bool {
        key.starts_with(ERROR_METADATA_PREFIX)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=>{}", self.metadata_key(), self.metadata_value())
    }
}
