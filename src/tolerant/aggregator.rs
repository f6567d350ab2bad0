/// Tracks the first failure seen during a batch.
///
/// The first captured failure is the one eventually raised to the client,
/// annotated with every error record of the batch. Not thread safe; owned by
/// a single session.
#[derive(Debug, Default)]
pub struct FailureAggregator {
    first: Option<UpdateFailure>,
    thrown: bool,
}

impl FailureAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call for every failure caught from downstream, even when it will be
    /// tolerated. Only the first call has an effect.
    pub fn capture(&mut self, err: &IndexError) {
        if self.first.is_none() {
            self.first = Some(UpdateFailure::wrap(err.clone()));
        }
    }

    /// Raises the captured failure the first time it is called; later calls
    /// are no-ops so cascading paths cannot raise it twice.
    pub fn throw_first(&mut self) -> Result<()> {
        let Some(first) = self.first.as_ref() else {
            return Err(IndexError::InternalContract(
                "asked to raise the first failure but none was captured".to_string(),
            ));
        };
        if self.thrown {
            return Ok(());
        }
        self.thrown = true;
        Err(IndexError::Update(first.clone()))
    }

    /// Rebuilds the captured failure so that its metadata lists exactly
    /// `errors`, keeping metadata that belongs to other namespaces.
    pub fn annotate(&mut self, errors: &[ErrorRecord]) {
        let Some(first) = self.first.take() else {
            return;
        };
        let mut metadata: FailureMetadata = first.metadata.clone();
        metadata.retain(|key, _| !ErrorRecord::is_metadata_key(key));
        for record in errors {
            metadata.push(record.metadata_key(), record.metadata_value());
        }
        self.first = Some(first.with_metadata(metadata));
    }

    pub fn first(&self) -> Option<&UpdateFailure> {
        self.first.as_ref()
    }

    pub fn is_thrown(&self) -> bool {
        self.thrown
    }
}
