/// Configuration of the tolerant update chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TolerantUpdateConfig {
    /// Failures tolerated when a request does not say otherwise.
    pub default_max_errors: usize,
}

impl Default for TolerantUpdateConfig {
    fn default() -> Self {
        Self {
            default_max_errors: usize::MAX,
        }
    }
}

impl TolerantUpdateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default number of tolerated failures
    pub fn default_max_errors(mut self, max_errors: usize) -> Self {
        self.default_max_errors = max_errors;
        self
    }

    /// Resolves `maxErrors` for a request; `-1` means unlimited.
    pub fn effective_max_errors(&self, params: &UpdateParams) -> Result<usize> {
        match params.max_errors {
            None => Ok(self.default_max_errors),
            Some(-1) => Ok(usize::MAX),
            Some(value) if value < 0 => Err(IndexError::BadRequest(format!(
                "maxErrors must be >= -1, got {}",
                value
            ))),
            Some(value) => usize::try_from(value).map_err(|_| {
                IndexError::BadRequest(format!("maxErrors out of range: {}", value))
            }),
        }
    }
}

/// Puts a `TolerantBatchSession` in front of a chain when a request asks
/// for tolerant processing.
pub struct TolerantUpdateFactory {
    config: TolerantUpdateConfig,
    schema: Arc<IndexSchema>,
    resolver: Arc<dyn LeaderResolver>,
}

impl TolerantUpdateFactory {
    pub fn new(
        config: TolerantUpdateConfig,
        schema: Arc<IndexSchema>,
        resolver: Arc<dyn LeaderResolver>,
    ) -> Self {
        Self {
            config,
            schema,
            resolver,
        }
    }

    pub fn config(&self) -> &TolerantUpdateConfig {
        &self.config
    }

    /// Returns `next` untouched for non-tolerant requests and for batches
    /// replicated from a leader.
    pub fn create(
        &self,
        params: &UpdateParams,
        next: Box<dyn UpdateProcessor>,
    ) -> Result<Box<dyn UpdateProcessor>> {
        if !params.tolerant || params.phase == DistributionPhase::FromLeader {
            return Ok(next);
        }
        let max_errors = self.config.effective_max_errors(params)?;
        let session = TolerantBatchSession::new(next, self.schema.clone(), self.resolver.clone())
            .max_errors(max_errors)
            .phase(params.phase)
            .route(params.route.clone());
        Ok(Box::new(session))
    }
}
