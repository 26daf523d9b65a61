//! Run index
//!
//! Maps identity keys to the records currently in the store. The index is
//! rebuilt from scratch on every pass and never persisted.

use runsync_core::domain::pipeline_run::PipelineRunRecord;
use runsync_core::domain::run::ExternalRun;
use std::collections::HashMap;

use super::identity::{IdentityKey, MatchStrategy};

/// Lookup from CI runs to the records mirroring them
///
/// Records are indexed under both match strategies so a lookup can ignore
/// branches on both sides. Records sharing a key collapse: the later record in
/// iteration order wins and the earlier one becomes unreachable.
#[derive(Debug, Default)]
pub struct RunIndex<'a> {
    by_run_id: HashMap<IdentityKey, &'a PipelineRunRecord>,
    by_branch: HashMap<IdentityKey, &'a PipelineRunRecord>,
}

impl<'a> RunIndex<'a> {
    /// Indexes every record, including ones without a run ID annotation
    pub fn build(records: &'a [PipelineRunRecord]) -> Self {
        let mut index = RunIndex::default();

        for record in records {
            index
                .by_run_id
                .insert(MatchStrategy::RunId.key_for_record(record), record);
            index
                .by_branch
                .insert(MatchStrategy::RunIdAndBranch.key_for_record(record), record);
        }

        index
    }

    /// Finds the record mirroring `run`
    pub fn find(&self, run: &ExternalRun, multi_branch: bool) -> Option<&'a PipelineRunRecord> {
        let strategy = MatchStrategy::for_pipeline(multi_branch);
        let key = strategy.key_for_run(run);
        match strategy {
            MatchStrategy::RunId => self.by_run_id.get(&key).copied(),
            MatchStrategy::RunIdAndBranch => self.by_branch.get(&key).copied(),
        }
    }

    /// Number of distinct run IDs indexed
    pub fn len(&self) -> usize {
        self.by_run_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_run_id.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use runsync_core::domain::meta::ObjectMeta;
    use runsync_core::domain::pipeline::PipelineSpec;
    use runsync_core::domain::pipeline_run::{PipelineReference, PipelineRunSpec};
    use runsync_core::keys::{RUN_ID_ANNOTATION, SCM_REF_NAME_LABEL};

    pub(crate) fn record(name: &str, run_id: Option<&str>, branch: Option<&str>) -> PipelineRunRecord {
        let mut metadata = ObjectMeta::new("devops", name);
        if let Some(id) = run_id {
            metadata
                .annotations
                .insert(RUN_ID_ANNOTATION.to_string(), id.to_string());
        }
        if let Some(branch) = branch {
            metadata
                .labels
                .insert(SCM_REF_NAME_LABEL.to_string(), branch.to_string());
        }
        PipelineRunRecord {
            metadata,
            spec: PipelineRunSpec {
                pipeline_ref: PipelineReference {
                    namespace: "devops".to_string(),
                    name: "build-app".to_string(),
                },
                pipeline_spec: PipelineSpec::default(),
                scm: None,
            },
        }
    }

    #[test]
    fn test_find_by_run_id() {
        let records = vec![
            record("pr-a", Some("1"), None),
            record("pr-b", Some("2"), None),
        ];
        let index = RunIndex::build(&records);

        assert_eq!(index.find(&ExternalRun::new("2"), false).unwrap().name(), "pr-b");
        assert!(index.find(&ExternalRun::new("3"), false).is_none());
    }

    #[test]
    fn test_find_multi_branch() {
        let records = vec![
            record("pr-main", Some("1"), Some("main")),
            record("pr-dev", Some("1"), Some("dev")),
        ];
        let index = RunIndex::build(&records);

        let main = ExternalRun::on_branch("1", "main");
        let dev = ExternalRun::on_branch("1", "dev");
        assert_eq!(index.find(&main, true).unwrap().name(), "pr-main");
        assert_eq!(index.find(&dev, true).unwrap().name(), "pr-dev");
        assert!(index.find(&ExternalRun::on_branch("1", "release"), true).is_none());
    }

    #[test]
    fn test_branch_ignored_without_multi_branch() {
        let records = vec![record("pr-a", Some("123"), Some("main1"))];
        let index = RunIndex::build(&records);

        let first = index.find(&ExternalRun::on_branch("123", "main1"), false);
        let second = index.find(&ExternalRun::on_branch("123", "other"), false);
        assert_eq!(first.unwrap().name(), "pr-a");
        assert_eq!(second.unwrap().name(), "pr-a");
    }

    #[test]
    fn test_record_without_run_id_is_unreachable() {
        let records = vec![record("pr-pending", None, None)];
        let index = RunIndex::build(&records);

        // Indexed under the empty run ID, which no listed run carries
        assert_eq!(index.len(), 1);
        assert!(index.find(&ExternalRun::new("1"), false).is_none());
        assert!(index.find(&ExternalRun::on_branch("1", "main"), true).is_none());
    }

    #[test]
    fn test_duplicate_identity_last_write_wins() {
        let records = vec![
            record("pr-a", Some("123"), None),
            record("pr-b", Some("123"), None),
        ];
        let index = RunIndex::build(&records);

        assert_eq!(index.len(), 1);
        assert_eq!(index.find(&ExternalRun::new("123"), false).unwrap().name(), "pr-b");
    }

    #[test]
    fn test_distinct_keys_never_mismatch() {
        let records: Vec<_> = (0..50)
            .map(|i| record(&format!("pr-{}", i), Some(&i.to_string()), None))
            .collect();
        let index = RunIndex::build(&records);

        for i in 0..50 {
            let found = index.find(&ExternalRun::new(i.to_string()), false).unwrap();
            assert_eq!(found.name(), format!("pr-{}", i));
        }
    }
}
