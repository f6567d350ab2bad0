//! Update commands and the processor chain they flow through.

pub mod command;
pub mod local_index;
pub mod processor;

pub use command::{
    AddCommand, DeleteCommand, DistributionPhase, RouteTarget, UpdateCommand, UpdateParams,
    UpdateRequest,
};
pub use local_index::{LocalIndex, LocalIndexProcessor};
pub use processor::{UpdateProcessor, UpdateResponse, run_batch};
