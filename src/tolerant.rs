//! Tolerant batch writes.
//!
//! A batch keeps going past individual command failures, up to a threshold,
//! and reports every failed command back to the client. Failures found on
//! other nodes travel back as failure metadata and are merged when the batch
//! finishes.

use crate::cluster::TopologyProvider;
use crate::core::{
    DistributedUpdatesError, FailureMetadata, IndexError, IndexSchema, Result, UpdateFailure,
};
use crate::update::{
    AddCommand, DeleteCommand, DistributionPhase, RouteTarget, UpdateParams, UpdateProcessor,
    UpdateResponse,
};
use async_trait::async_trait;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event};

// Split by responsibility; everything shares this module's scope.
include!("tolerant/error_record.rs");
include!("tolerant/aggregator.rs");
include!("tolerant/leader.rs");
include!("tolerant/header.rs");
include!("tolerant/remote.rs");
include!("tolerant/session.rs");
include!("tolerant/factory.rs");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorCode, FieldType, IndexDocument, RemoteUpdateError, SchemaField};
    use crate::update::{UpdateCommand, run_batch};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn schema() -> Arc<IndexSchema> {
        Arc::new(
            IndexSchema::new(
                "id",
                vec![
                    SchemaField::new("id", FieldType::String),
                    SchemaField::new("text", FieldType::Text),
                ],
            )
            .unwrap(),
        )
    }

    fn doc(id: &str) -> UpdateCommand {
        UpdateCommand::add(IndexDocument::from_json(json!({"id": id, "text": "fox"})).unwrap())
    }

    /// Downstream stand-in: fails the listed ids, records what it applied,
    /// and can report remote failures from `finish`.
    struct ScriptedDownstream {
        failing: Vec<String>,
        applied: Arc<StdMutex<Vec<String>>>,
        remote: Option<IndexError>,
    }

    impl ScriptedDownstream {
        fn new(failing: &[&str]) -> (Self, Arc<StdMutex<Vec<String>>>) {
            let applied = Arc::new(StdMutex::new(Vec::new()));
            (
                Self {
                    failing: failing.iter().map(|id| id.to_string()).collect(),
                    applied: applied.clone(),
                    remote: None,
                },
                applied,
            )
        }

        fn with_remote(mut self, err: IndexError) -> Self {
            self.remote = Some(err);
            self
        }

        fn apply(&self, key: &str) -> Result<()> {
            if self.failing.iter().any(|id| id == key) {
                return Err(IndexError::BadRequest(format!("ERROR: [doc={}] rejected", key)));
            }
            self.applied.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl UpdateProcessor for ScriptedDownstream {
        async fn process_add(&mut self, cmd: &AddCommand) -> Result<()> {
            let id = cmd
                .document
                .get("id")
                .and_then(|id| id.as_str())
                .unwrap_or(UNKNOWN_ID)
                .to_string();
            self.apply(&id)
        }

        async fn process_delete(&mut self, cmd: &DeleteCommand) -> Result<()> {
            match cmd {
                DeleteCommand::ById { id } => self.apply(id),
                DeleteCommand::ByQuery { query } => self.apply(query),
            }
        }

        async fn finish(&mut self, _rsp: &mut UpdateResponse) -> Result<()> {
            match self.remote.take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    struct FixedResolver(bool);

    impl LeaderResolver for FixedResolver {
        fn is_authoritative(&self, _target: RouteTarget<'_>, _route: Option<&str>) -> Result<bool> {
            Ok(self.0)
        }
    }

    struct FailingResolver;

    impl LeaderResolver for FailingResolver {
        fn is_authoritative(&self, _target: RouteTarget<'_>, _route: Option<&str>) -> Result<bool> {
            Err(IndexError::Routing("collection 'products' is not known".to_string()))
        }
    }

    fn session(downstream: ScriptedDownstream, max_errors: usize) -> TolerantBatchSession {
        TolerantBatchSession::new(
            Box::new(downstream),
            schema(),
            Arc::new(TopologyLeaderResolver::standalone(schema())),
        )
        .max_errors(max_errors)
    }

    fn remote_failure(records: &[ErrorRecord]) -> IndexError {
        let mut metadata = FailureMetadata::new();
        metadata.push("unrelated.key", "ignored");
        for record in records {
            metadata.push(record.metadata_key(), record.metadata_value());
        }
        IndexError::Update(
            UpdateFailure::new(ErrorCode::BadRequest, "remote batch failed").with_metadata(metadata),
        )
    }

    fn recorded(failure: &UpdateFailure) -> Vec<ErrorRecord> {
        failure
            .metadata
            .iter()
            .filter_map(|(key, value)| ErrorRecord::parse_metadata(key, value).unwrap())
            .collect()
    }

    #[test]
    fn metadata_encoding_round_trips() {
        let records = [
            ErrorRecord::new(ErrorKind::Add, "1", "bad field"),
            ErrorRecord::new(ErrorKind::DeleteById, "tenant!doc:7", "id with separators"),
            ErrorRecord::new(ErrorKind::DeleteByQuery, "text:fox", ""),
            ErrorRecord::new(ErrorKind::Add, UNKNOWN_ID, "no id"),
        ];
        for record in records {
            let decoded =
                ErrorRecord::parse_metadata(&record.metadata_key(), record.metadata_value())
                    .unwrap();
            assert_eq!(decoded, Some(record));
        }
    }

    #[test]
    fn foreign_metadata_is_ignored_and_malformed_metadata_fails_fast() {
        assert_eq!(ErrorRecord::parse_metadata("other--ADD:1", "x").unwrap(), None);

        let missing_separator = format!("{}ADD", ERROR_METADATA_PREFIX);
        assert!(matches!(
            ErrorRecord::parse_metadata(&missing_separator, "x"),
            Err(IndexError::MalformedMetadata(_))
        ));

        let unknown_kind = format!("{}COMMIT:1", ERROR_METADATA_PREFIX);
        assert!(matches!(
            ErrorRecord::parse_metadata(&unknown_kind, "x"),
            Err(IndexError::MalformedMetadata(_))
        ));
    }

    #[test]
    fn aggregator_keeps_first_failure_and_raises_it_once() {
        let mut aggregator = FailureAggregator::new();
        assert!(matches!(
            aggregator.throw_first(),
            Err(IndexError::InternalContract(_))
        ));

        aggregator.capture(&IndexError::Schema("first".to_string()));
        aggregator.capture(&IndexError::Schema("second".to_string()));
        assert!(aggregator.first().unwrap().message.contains("first"));

        assert!(matches!(aggregator.throw_first(), Err(IndexError::Update(_))));
        assert!(aggregator.throw_first().is_ok());
        assert!(aggregator.is_thrown());
    }

    #[test]
    fn annotation_replaces_records_and_keeps_foreign_metadata() {
        let mut aggregator = FailureAggregator::new();
        aggregator.capture(&remote_failure(&[ErrorRecord::new(ErrorKind::Add, "9", "old")]));

        let records = vec![
            ErrorRecord::new(ErrorKind::Add, "1", "a"),
            ErrorRecord::new(ErrorKind::DeleteById, "2", "b"),
        ];
        aggregator.annotate(&records);
        aggregator.annotate(&records);

        let first = aggregator.first().unwrap();
        assert_eq!(recorded(first), records);
        assert_eq!(first.metadata.get("unrelated.key"), Some("ignored"));
    }

    #[tokio::test]
    async fn tolerated_failure_leaves_valid_documents_indexed() {
        let (downstream, applied) = ScriptedDownstream::new(&["1"]);
        let mut session = session(downstream, 10);

        let rsp = run_batch(&mut session, &[doc("1"), doc("4")]).await;

        assert!(rsp.is_success());
        assert_eq!(rsp.header.num_errors(), 1);
        assert_eq!(rsp.header.num_adds(), 1);
        let entry = rsp.header.error_for_id("1").unwrap();
        assert_eq!(entry.kind, "ADD");
        assert!(entry.message.contains("rejected"));
        assert_eq!(*applied.lock().unwrap(), vec!["4".to_string()]);
    }

    #[tokio::test]
    async fn zero_threshold_aborts_on_first_failure() {
        let (downstream, applied) = ScriptedDownstream::new(&["1"]);
        let mut session = session(downstream, 0);

        let rsp = run_batch(&mut session, &[doc("1"), doc("2")]).await;

        let Some(IndexError::Update(failure)) = rsp.error else {
            panic!("expected a structured failure, got {:?}", rsp.error);
        };
        assert_eq!(recorded(&failure), vec![ErrorRecord::new(
            ErrorKind::Add,
            "1",
            "Bad request: ERROR: [doc=1] rejected"
        )]);
        assert!(applied.lock().unwrap().is_empty());
        assert_eq!(rsp.header.num_errors(), 1);
    }

    #[tokio::test]
    async fn threshold_counts_failures_across_command_kinds() {
        let (downstream, applied) = ScriptedDownstream::new(&["1", "2", "text:bad"]);
        let mut session = session(downstream, 2);
        let commands = vec![
            doc("1"),
            UpdateCommand::Delete(DeleteCommand::by_id("2")),
            doc("3"),
            UpdateCommand::Delete(DeleteCommand::by_query("text:bad")),
            doc("5"),
        ];

        let rsp = run_batch(&mut session, &commands).await;

        assert!(matches!(rsp.error, Some(IndexError::Update(_))));
        assert_eq!(*applied.lock().unwrap(), vec!["3".to_string()]);
        let kinds = session
            .errors()
            .iter()
            .map(|record| record.kind())
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![ErrorKind::Add, ErrorKind::DeleteById, ErrorKind::DeleteByQuery]
        );
    }

    #[tokio::test]
    async fn unresolvable_id_is_reported_as_unknown() {
        let (downstream, _) = ScriptedDownstream::new(&[UNKNOWN_ID]);
        let mut session = session(downstream, 5);
        let no_id = UpdateCommand::add(IndexDocument::new().with_field("text", "orphan"));

        let rsp = run_batch(&mut session, &[no_id]).await;

        assert!(rsp.is_success());
        assert!(rsp.header.error_for_id(UNKNOWN_ID).is_some());
    }

    #[tokio::test]
    async fn non_authoritative_node_never_tolerates() {
        let (downstream, applied) = ScriptedDownstream::new(&["1"]);
        let mut session =
            TolerantBatchSession::new(Box::new(downstream), schema(), Arc::new(FixedResolver(false)))
                .max_errors(100)
                .phase(DistributionPhase::ToLeader);

        let rsp = run_batch(&mut session, &[doc("1"), doc("2")]).await;

        assert!(matches!(rsp.error, Some(IndexError::Update(_))));
        assert!(session.errors().is_empty());
        assert!(applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unresolved_leadership_never_tolerates() {
        let (downstream, applied) = ScriptedDownstream::new(&["1"]);
        let mut session =
            TolerantBatchSession::new(Box::new(downstream), schema(), Arc::new(FailingResolver))
                .max_errors(100)
                .phase(DistributionPhase::ToLeader);

        let rsp = run_batch(&mut session, &[doc("1"), doc("2")]).await;

        // The command's own failure is raised, not the resolver's.
        let Some(IndexError::Update(failure)) = rsp.error else {
            panic!("expected a structured failure");
        };
        assert!(failure.message.contains("[doc=1]"));
        assert!(recorded(&failure).is_empty());
        assert!(session.errors().is_empty());
        assert!(applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn leader_reached_through_a_peer_reports_any_failure() {
        let (downstream, applied) = ScriptedDownstream::new(&["1"]);
        let mut session =
            TolerantBatchSession::new(Box::new(downstream), schema(), Arc::new(FixedResolver(true)))
                .max_errors(10)
                .phase(DistributionPhase::ToLeader);

        let rsp = run_batch(&mut session, &[doc("1"), doc("2")]).await;

        // Both commands ran; the failure is raised only at finish.
        assert_eq!(*applied.lock().unwrap(), vec!["2".to_string()]);
        let Some(IndexError::Update(failure)) = rsp.error else {
            panic!("expected a structured failure");
        };
        assert_eq!(recorded(&failure).len(), 1);
    }

    #[tokio::test]
    async fn remote_records_are_folded_like_local_ones() {
        let remote = DistributedUpdatesError::new(vec![
            RemoteUpdateError {
                node_id: "node-b".to_string(),
                error: remote_failure(&[
                    ErrorRecord::new(ErrorKind::Add, "7", "remote bad"),
                    ErrorRecord::new(ErrorKind::DeleteById, "8", "remote delete bad"),
                ]),
            },
            RemoteUpdateError {
                node_id: "node-c".to_string(),
                error: IndexError::Transport("connection reset".to_string()),
            },
        ]);
        let (downstream, _) = ScriptedDownstream::new(&["1"]);
        let mut session = session(downstream.with_remote(remote.into()), 10);

        let rsp = run_batch(&mut session, &[doc("1"), doc("7"), doc("9")]).await;

        assert!(rsp.is_success());
        assert_eq!(rsp.header.num_errors(), 3);
        assert_eq!(rsp.header.num_adds(), 1);
        let ids = session
            .errors()
            .iter()
            .map(|record| record.id())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "7", "8"]);
    }

    #[tokio::test]
    async fn remote_records_can_push_the_batch_over_its_threshold() {
        let remote = DistributedUpdatesError::new(vec![RemoteUpdateError {
            node_id: "node-b".to_string(),
            error: remote_failure(&[
                ErrorRecord::new(ErrorKind::Add, "7", "x"),
                ErrorRecord::new(ErrorKind::Add, "8", "y"),
            ]),
        }]);
        let (downstream, _) = ScriptedDownstream::new(&["1"]);
        let mut session = session(downstream.with_remote(remote.into()), 2);

        let rsp = run_batch(&mut session, &[doc("1"), doc("7"), doc("8")]).await;

        let Some(IndexError::Update(failure)) = rsp.error else {
            panic!("expected a structured failure");
        };
        // The first failure is the local one, annotated with the whole picture.
        assert!(failure.message.contains("doc=1"));
        let ids = recorded(&failure)
            .iter()
            .map(|record| record.id().to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "7", "8"]);
    }

    #[tokio::test]
    async fn aborted_batch_still_collects_remote_records() {
        let remote = DistributedUpdatesError::new(vec![RemoteUpdateError {
            node_id: "node-b".to_string(),
            error: remote_failure(&[ErrorRecord::new(ErrorKind::Add, "5", "remote")]),
        }]);
        let (downstream, _) = ScriptedDownstream::new(&["1"]);
        let mut session = session(downstream.with_remote(remote.into()), 0);

        let rsp = run_batch(&mut session, &[doc("1"), doc("5")]).await;

        let Some(IndexError::Update(failure)) = rsp.error else {
            panic!("expected a structured failure");
        };
        assert_eq!(recorded(&failure).len(), 2);
        assert_eq!(rsp.header.num_errors(), 2);
    }

    #[tokio::test]
    async fn malformed_remote_metadata_fails_the_batch() {
        let mut metadata = FailureMetadata::new();
        metadata.push(format!("{}ADD", ERROR_METADATA_PREFIX), "no separator");
        let remote = DistributedUpdatesError::new(vec![RemoteUpdateError {
            node_id: "node-b".to_string(),
            error: IndexError::Update(
                UpdateFailure::new(ErrorCode::ServerError, "broken").with_metadata(metadata),
            ),
        }]);
        let (downstream, _) = ScriptedDownstream::new(&[]);
        let mut session = session(downstream.with_remote(remote.into()), 10);

        let rsp = run_batch(&mut session, &[doc("1")]).await;

        assert!(matches!(rsp.error, Some(IndexError::MalformedMetadata(_))));
    }

    #[test]
    fn broadcast_delete_by_query_failures_are_counted_once() {
        let dbq = ErrorRecord::new(ErrorKind::DeleteByQuery, "text:fox", "undefined field");
        let distributed = DistributedUpdatesError::new(vec![
            RemoteUpdateError {
                node_id: "node-b".to_string(),
                error: remote_failure(&[dbq.clone()]),
            },
            RemoteUpdateError {
                node_id: "node-c".to_string(),
                error: remote_failure(&[dbq.clone()]),
            },
        ]);
        let mut errors = vec![dbq.clone()];

        let folded = fold_distributed_errors(&distributed, &mut errors).unwrap();

        assert_eq!(folded, 0);
        assert_eq!(errors, vec![dbq]);
    }

    #[test]
    fn repeated_delete_by_query_commands_keep_their_own_records() {
        let dbq = ErrorRecord::new(ErrorKind::DeleteByQuery, "text:fox", "undefined field");
        let distributed = DistributedUpdatesError::new(vec![
            RemoteUpdateError {
                node_id: "node-b".to_string(),
                error: remote_failure(&[dbq.clone(), dbq.clone()]),
            },
            RemoteUpdateError {
                node_id: "node-c".to_string(),
                error: remote_failure(&[dbq.clone()]),
            },
        ]);

        // Both commands failed here too: nothing new to add.
        let mut errors = vec![dbq.clone(), dbq.clone()];
        assert_eq!(fold_distributed_errors(&distributed, &mut errors).unwrap(), 0);
        assert_eq!(errors.len(), 2);

        // Only one failed here; node-b saw both fail.
        let mut errors = vec![dbq.clone()];
        assert_eq!(fold_distributed_errors(&distributed, &mut errors).unwrap(), 1);
        assert_eq!(errors, vec![dbq.clone(), dbq]);
    }

    #[test]
    fn factory_skips_replicated_and_plain_batches() {
        let factory = TolerantUpdateFactory::new(
            TolerantUpdateConfig::new().default_max_errors(3),
            schema(),
            Arc::new(TopologyLeaderResolver::standalone(schema())),
        );
        let (downstream, _) = ScriptedDownstream::new(&["1"]);
        let mut chain = factory
            .create(
                &UpdateParams::default().phase(DistributionPhase::FromLeader),
                Box::new(downstream),
            )
            .unwrap();

        let rsp = tokio_test::block_on(run_batch(chain.as_mut(), &[doc("1")]));
        assert!(matches!(rsp.error, Some(IndexError::BadRequest(_))));
        assert_eq!(rsp.header.num_errors, None);

        let (downstream, _) = ScriptedDownstream::new(&["1"]);
        let mut chain = factory
            .create(&UpdateParams::default().not_tolerant(), Box::new(downstream))
            .unwrap();
        let rsp = tokio_test::block_on(run_batch(chain.as_mut(), &[doc("1")]));
        assert!(matches!(rsp.error, Some(IndexError::BadRequest(_))));
    }

    #[test]
    fn max_errors_param_overrides_configured_default() {
        let config = TolerantUpdateConfig::new().default_max_errors(3);
        assert_eq!(config.effective_max_errors(&UpdateParams::default()).unwrap(), 3);
        assert_eq!(
            config
                .effective_max_errors(&UpdateParams::default().max_errors(0))
                .unwrap(),
            0
        );
        assert_eq!(
            config
                .effective_max_errors(&UpdateParams::default().max_errors(-1))
                .unwrap(),
            usize::MAX
        );
        assert!(matches!(
            config.effective_max_errors(&UpdateParams::default().max_errors(-5)),
            Err(IndexError::BadRequest(_))
        ));
    }

    #[test]
    fn header_lists_errors_only_when_there_are_some() {
        let clean = ResponseHeader::render(&[], 2).to_json();
        assert_eq!(clean, json!({"numErrors": 0, "numAdds": 2}));

        let failed =
            ResponseHeader::render(&[ErrorRecord::new(ErrorKind::Add, "1", "bad")], 1).to_json();
        assert_eq!(
            failed,
            json!({
                "numErrors": 1,
                "errors": [{"type": "ADD", "id": "1", "message": "bad"}],
                "numAdds": 1
            })
        );
    }

    #[test]
    fn standalone_resolver_is_authoritative_for_everything() {
        let resolver = TopologyLeaderResolver::standalone(schema());
        assert!(resolver.is_standalone());
        assert!(resolver
            .is_authoritative(RouteTarget::Query("*:*"), None)
            .unwrap());
        assert!(resolver.is_authoritative(RouteTarget::Id("1"), None).unwrap());
    }
}
