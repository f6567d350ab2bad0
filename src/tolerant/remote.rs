/// Folds the error records reported by remote nodes into `errors`.
///
/// Only structured failures carry records; anything else (transport errors,
/// replica failures) is logged and skipped.
///
/// A delete-by-query fans out to every shard leader, so each leader may
/// report the same record. Identical delete-by-query records are kept as
/// many times as the largest count seen from any single node, local records
/// included: two failed commands with the same query still count twice.
/// Returns the number of records appended.
pub fn fold_distributed_errors(
    distributed: &DistributedUpdatesError,
    errors: &mut Vec<ErrorRecord>,
) -> Result<usize> {
    let mut folded = 0;
    for remote in &distributed.errors {
        let failure = match &remote.error {
            IndexError::Update(failure) => failure,
            other => {
                error!(
                    "async update error from '{}' is not a structured failure, no metadata to process: {}",
                    remote.node_id, other
                );
                continue;
            }
        };
        if failure.metadata.is_empty() {
            warn!(
                "remote error from '{}' has no metadata to aggregate: {}",
                remote.node_id, failure.message
            );
            continue;
        }

        let mut copies_from_node = HashMap::<ErrorRecord, usize>::new();
        for (key, value) in failure.metadata.iter() {
            let record = match ErrorRecord::parse_metadata(key, value) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) => {
                    error!("remote error from '{}' carries {}", remote.node_id, err);
                    return Err(err);
                }
            };
            if record.kind() == ErrorKind::DeleteByQuery {
                let copies = copies_from_node.entry(record.clone()).or_default();
                *copies += 1;
                let known = errors.iter().filter(|known| **known == record).count();
                if known >= *copies {
                    continue;
                }
            }
            errors.push(record);
            folded += 1;
        }
    }
    Ok(folded)
}
