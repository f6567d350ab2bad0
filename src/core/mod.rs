pub mod error;
pub mod types;

pub use error::{
    DistributedUpdatesError, ErrorCode, FailureMetadata, IndexError, RemoteUpdateError, Result,
    UpdateFailure,
};
pub use types::{FieldType, IndexDocument, IndexSchema, SchemaField};
