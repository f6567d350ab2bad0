/// Tolerant processing of one batch.
///
/// Failed commands are recorded and the batch continues until more than
/// `max_errors` commands have failed; then the first failure is raised,
/// annotated with every record so far. A node that does not lead the shard
/// of a failed command never tolerates it.
///
/// One session per request. It must not be created for batches replicated
/// from a leader (`DistributionPhase::FromLeader`): what the leader already
/// applied stays applied, whatever a replica reports.
pub struct TolerantBatchSession {
    next: Box<dyn UpdateProcessor>,
    schema: Arc<IndexSchema>,
    resolver: Arc<dyn LeaderResolver>,
    max_errors: usize,
    phase: DistributionPhase,
    route: Option<String>,
    errors: Vec<ErrorRecord>,
    aggregator: FailureAggregator,
    adds_handled: usize,
}

impl TolerantBatchSession {
    /// Wraps `next` with no error limit, as a batch from a client.
    pub fn new(
        next: Box<dyn UpdateProcessor>,
        schema: Arc<IndexSchema>,
        resolver: Arc<dyn LeaderResolver>,
    ) -> Self {
        Self {
            next,
            schema,
            resolver,
            max_errors: usize::MAX,
            phase: DistributionPhase::None,
            route: None,
            errors: Vec::new(),
            aggregator: FailureAggregator::new(),
            adds_handled: 0,
        }
    }

    /// Number of failed commands tolerated before the batch aborts.
    pub fn max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    /// Where the batch sits in the distribution flow. Under `ToLeader` any
    /// failure is reported back at `finish`.
    pub fn phase(mut self, phase: DistributionPhase) -> Self {
        debug_assert_ne!(phase, DistributionPhase::FromLeader);
        self.phase = phase;
        self
    }

    /// Route override used to resolve the owning shard.
    pub fn route(mut self, route: Option<String>) -> Self {
        self.route = route;
        self
    }

    /// Records in order of discovery: local failures first, remote ones as
    /// they were folded in at `finish`.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// The failure that will be raised if the batch aborts.
    pub fn first_failure(&self) -> Option<&UpdateFailure> {
        self.aggregator.first()
    }

    /// Threshold applied at the end of the batch. A leader reached through
    /// a forwarding peer reports any failure back so that the origin can
    /// apply its own threshold to the whole batch.
    fn effective_threshold(&self) -> usize {
        match self.phase {
            DistributionPhase::ToLeader => 0,
            _ => self.max_errors,
        }
    }

    fn is_authoritative(&self, target: RouteTarget<'_>) -> bool {
        if self.phase == DistributionPhase::None {
            return true;
        }
        match self.resolver.is_authoritative(target, self.route.as_deref()) {
            Ok(authoritative) => authoritative,
            Err(err) => {
                event!(
                    Level::WARN,
                    error = %err,
                    "leader resolution failed; treating node as non-authoritative"
                );
                false
            }
        }
    }

    fn tolerate(
        &mut self,
        kind: ErrorKind,
        id: String,
        target: RouteTarget<'_>,
        err: IndexError,
    ) -> Result<()> {
        self.aggregator.capture(&err);

        if !self.is_authoritative(target) {
            event!(
                Level::DEBUG,
                kind = %kind,
                id = %id,
                "failure on a non-authoritative node is not tolerated"
            );
            return self.abort();
        }

        event!(Level::DEBUG, kind = %kind, id = %id, error = %err, "tolerating failed command");
        self.errors.push(ErrorRecord::new(kind, id, err.to_string()));
        if self.errors.len() > self.max_errors {
            event!(
                Level::WARN,
                errors = self.errors.len(),
                max_errors = self.max_errors,
                "maxErrors exceeded, aborting batch"
            );
            return self.abort();
        }
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        self.aggregator.annotate(&self.errors);
        self.aggregator.throw_first()
    }

    fn num_adds(&self) -> usize {
        let failed_adds = self
            .errors
            .iter()
            .filter(|record| record.kind() == ErrorKind::Add)
            .count();
        self.adds_handled.saturating_sub(failed_adds)
    }
}

#[async_trait]
impl UpdateProcessor for TolerantBatchSession {
    async fn process_add(&mut self, cmd: &AddCommand) -> Result<()> {
        self.adds_handled += 1;
        let id = cmd
            .document
            .printable_id(&self.schema)
            .unwrap_or_else(|_| UNKNOWN_ID.to_string());

        match self.next.process_add(cmd).await {
            Ok(()) => Ok(()),
            Err(err) => self.tolerate(ErrorKind::Add, id, RouteTarget::Document(&cmd.document), err),
        }
    }

    async fn process_delete(&mut self, cmd: &DeleteCommand) -> Result<()> {
        match self.next.process_delete(cmd).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let (kind, id) = match cmd {
                    DeleteCommand::ById { id } => (ErrorKind::DeleteById, id.clone()),
                    DeleteCommand::ByQuery { query } => (ErrorKind::DeleteByQuery, query.clone()),
                };
                self.tolerate(kind, id, cmd.route_target(), err)
            }
        }
    }

    async fn finish(&mut self, rsp: &mut UpdateResponse) -> Result<()> {
        // Runs even after a command aborted the batch: remote leaders may
        // still report failures through the downstream finish.
        let mut unhandled = None;
        if let Err(err) = self.next.finish(rsp).await {
            self.aggregator.capture(&err);
            match err {
                IndexError::DistributedUpdates(distributed) => {
                    let folded = fold_distributed_errors(&distributed, &mut self.errors)?;
                    event!(
                        Level::DEBUG,
                        remote_failures = distributed.errors.len(),
                        folded,
                        "folded remote error records"
                    );
                }
                other => unhandled = Some(other),
            }
        }

        rsp.header = ResponseHeader::render(&self.errors, self.num_adds());
        self.aggregator.annotate(&self.errors);

        let exceeded = self.errors.len() > self.effective_threshold();
        if exceeded || self.aggregator.is_thrown() {
            if let Some(first) = self.aggregator.first() {
                rsp.set_annotated_failure(first.clone());
            }
        }

        if let Some(err) = unhandled {
            return Err(err);
        }
        if exceeded {
            self.aggregator.throw_first()?;
        }
        Ok(())
    }
}
