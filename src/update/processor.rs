use super::command::{AddCommand, DeleteCommand, UpdateCommand};
use crate::core::{IndexError, Result, UpdateFailure};
use crate::tolerant::ResponseHeader;
use async_trait::async_trait;

/// One link of the update chain.
///
/// Commands flow through `process_*` in submission order; `finish` is called
/// exactly once at the end of the batch, even when a command already failed.
#[async_trait]
pub trait UpdateProcessor: Send {
    async fn process_add(&mut self, cmd: &AddCommand) -> Result<()>;

    async fn process_delete(&mut self, cmd: &DeleteCommand) -> Result<()>;

    async fn finish(&mut self, rsp: &mut UpdateResponse) -> Result<()>;

    async fn process(&mut self, command: &UpdateCommand) -> Result<()> {
        match command {
            UpdateCommand::Add(cmd) => self.process_add(cmd).await,
            UpdateCommand::Delete(cmd) => self.process_delete(cmd).await,
        }
    }
}

/// Outcome of a batch as seen by the client.
#[derive(Debug, Clone, Default)]
pub struct UpdateResponse {
    pub header: ResponseHeader,
    pub error: Option<IndexError>,
    annotated_failure: Option<UpdateFailure>,
}

impl UpdateResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the failure carrying the complete error picture for this batch.
    pub fn set_annotated_failure(&mut self, failure: UpdateFailure) {
        self.annotated_failure = Some(failure);
    }

    pub fn annotated_failure(&self) -> Option<&UpdateFailure> {
        self.annotated_failure.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<ResponseHeader> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.header),
        }
    }
}

/// Drives a batch through a chain.
///
/// Stops at the first command error, always finishes the chain, and prefers
/// the annotated failure recorded during `finish` over the one raised earlier.
pub async fn run_batch(chain: &mut dyn UpdateProcessor, commands: &[UpdateCommand]) -> UpdateResponse {
    let mut rsp = UpdateResponse::new();
    let mut raised = None;

    for command in commands {
        if let Err(err) = chain.process(command).await {
            raised = Some(err);
            break;
        }
    }

    if let Err(err) = chain.finish(&mut rsp).await {
        raised.get_or_insert(err);
    }

    if let Some(err) = raised {
        let annotated = rsp.annotated_failure.take();
        rsp.error = Some(match annotated {
            Some(failure) if matches!(err, IndexError::Update(_)) => IndexError::Update(failure),
            _ => err,
        });
    }
    rsp
}
