use crate::core::{IndexDocument, IndexError, IndexSchema, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role this node plays for the batch it is processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionPhase {
    /// Batch submitted by a client; this node is the origin.
    #[default]
    None,
    /// Batch routed by a peer toward this node as the shard leader.
    ToLeader,
    /// Batch replicated by a shard leader to this replica.
    FromLeader,
}

fn default_overwrite() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddCommand {
    #[serde(rename = "doc")]
    pub document: IndexDocument,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

impl AddCommand {
    pub fn new(document: IndexDocument) -> Self {
        Self {
            document,
            overwrite: true,
        }
    }
}

/// Delete commands carry only the field their variant needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DeleteCommand {
    ById { id: String },
    ByQuery { query: String },
}

impl DeleteCommand {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::ById { id: id.into() }
    }

    pub fn by_query(query: impl Into<String>) -> Self {
        Self::ByQuery {
            query: query.into(),
        }
    }

    pub fn route_target(&self) -> RouteTarget<'_> {
        match self {
            Self::ById { id } => RouteTarget::Id(id),
            Self::ByQuery { query } => RouteTarget::Query(query),
        }
    }
}

/// What a command needs routed: a document, a bare id, or a query that
/// spans every shard.
#[derive(Debug, Clone, Copy)]
pub enum RouteTarget<'a> {
    Document(&'a IndexDocument),
    Id(&'a str),
    Query(&'a str),
}

impl RouteTarget<'_> {
    /// Key used to pick the owning shard: the route override when given,
    /// otherwise the document id. Delete-by-query has no single owner.
    pub fn routing_key(&self, schema: &IndexSchema, route: Option<&str>) -> Result<String> {
        if let Some(route) = route.filter(|route| !route.trim().is_empty()) {
            return Ok(route.to_string());
        }
        match self {
            Self::Document(document) => document.printable_id(schema),
            Self::Id(id) => Ok((*id).to_string()),
            Self::Query(query) => Err(IndexError::Routing(format!(
                "delete-by-query '{}' is not owned by a single shard",
                query
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateCommand {
    Add(AddCommand),
    Delete(DeleteCommand),
}

impl UpdateCommand {
    pub fn add(document: IndexDocument) -> Self {
        Self::Add(AddCommand::new(document))
    }

    pub fn route_target(&self) -> RouteTarget<'_> {
        match self {
            Self::Add(cmd) => RouteTarget::Document(&cmd.document),
            Self::Delete(cmd) => cmd.route_target(),
        }
    }
}

fn default_tolerant() -> bool {
    true
}

/// Per-request parameters supplied by the request layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateParams {
    /// Failures to tolerate; `-1` means unlimited, absent means the configured default.
    #[serde(default, rename = "maxErrors")]
    pub max_errors: Option<i64>,
    /// Explicit routing key overriding the document id.
    #[serde(default, rename = "_route_")]
    pub route: Option<String>,
    #[serde(default)]
    pub phase: DistributionPhase,
    #[serde(default = "default_tolerant")]
    pub tolerant: bool,
}

impl Default for UpdateParams {
    fn default() -> Self {
        Self {
            max_errors: None,
            route: None,
            phase: DistributionPhase::None,
            tolerant: true,
        }
    }
}

impl UpdateParams {
    pub fn max_errors(mut self, max_errors: i64) -> Self {
        self.max_errors = Some(max_errors);
        self
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn phase(mut self, phase: DistributionPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn not_tolerant(mut self) -> Self {
        self.tolerant = false;
        self
    }
}

/// A batch of commands addressed to one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateRequest {
    pub batch_id: Uuid,
    pub commands: Vec<UpdateCommand>,
    #[serde(default)]
    pub params: UpdateParams,
}

impl UpdateRequest {
    pub fn new(commands: Vec<UpdateCommand>, params: UpdateParams) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            commands,
            params,
        }
    }
}
