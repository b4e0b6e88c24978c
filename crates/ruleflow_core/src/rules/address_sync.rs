//! Parent address fan-out.
//!
//! # Responsibility
//! - Copy a parent's changed `address` to every dependent referencing it.
//!
//! # Invariants
//! - The dependent set is fully materialized before the first write.
//! - One write failure never stops the remaining writes.
//! - A null address is propagated as null.

use crate::config::RuleConfig;
use crate::model::entity::{EntityKind, Field};
use crate::model::event::{MutationEvent, Operation};
use crate::model::record::{ParentRecord, Record, RecordId, RecordPatch};
use crate::rules::{fatal, match_target, skipped, FanOutTally, Rule, RuleOutcome, RuleResult, SkipReason};
use crate::store::{retrieve_all, RecordQuery, RecordStore, StoreResult};
use log::{debug, info, warn};

pub const ADDRESS_SYNC_RULE: &str = "AddressSyncRule";

/// Fans a parent's address out to its dependents.
#[derive(Debug, Clone)]
pub struct AddressSyncRule {
    page_size: u32,
}

impl AddressSyncRule {
    pub fn new(config: &RuleConfig) -> Self {
        Self {
            page_size: config.page_size,
        }
    }

    fn trigger<'e>(&self, event: &'e MutationEvent) -> Result<&'e ParentRecord, SkipReason> {
        match_target(event, |op| *op == Operation::Update, EntityKind::Parent)?;
        let Some(Record::Parent(parent)) = event.target.as_ref() else {
            return Err(SkipReason::MissingTarget);
        };
        if !event.changed_fields.contains(&Field::Address) {
            return Err(SkipReason::FieldNotChanged(Field::Address));
        }
        Ok(parent)
    }

    fn dependents_of(&self, store: &dyn RecordStore, parent_id: RecordId) -> StoreResult<Vec<RecordId>> {
        let query = RecordQuery::new(EntityKind::Dependent).filter_eq(Field::ParentId, parent_id);
        let records = retrieve_all(store, &query, self.page_size)?;
        Ok(records.iter().map(Record::id).collect())
    }
}

impl Rule for AddressSyncRule {
    fn name(&self) -> &'static str {
        ADDRESS_SYNC_RULE
    }

    fn execute(&self, store: &dyn RecordStore, event: &MutationEvent) -> RuleResult<RuleOutcome> {
        let parent = match self.trigger(event) {
            Ok(parent) => parent,
            Err(reason) => return Ok(skipped(ADDRESS_SYNC_RULE, reason)),
        };

        info!(
            "event=rule_start module=rules status=start rule={ADDRESS_SYNC_RULE} parent={}",
            parent.id
        );
        debug!(
            "event=address_changed module=rules rule={ADDRESS_SYNC_RULE} address={}",
            parent.address.as_deref().unwrap_or("NULL")
        );

        let dependents = self
            .dependents_of(store, parent.id)
            .map_err(|err| fatal(ADDRESS_SYNC_RULE, err))?;
        debug!(
            "event=dependents_loaded module=rules rule={ADDRESS_SYNC_RULE} count={}",
            dependents.len()
        );

        let patch = RecordPatch::DependentAddress {
            address: parent.address.clone(),
        };
        let mut tally = FanOutTally::default();
        for dependent_id in dependents {
            tally.attempted += 1;
            match store.update(dependent_id, &patch) {
                Ok(()) => tally.updated += 1,
                Err(err) => {
                    tally.failed += 1;
                    warn!(
                        "event=dependent_update module=rules status=error rule={ADDRESS_SYNC_RULE} dependent={dependent_id} error={err}"
                    );
                }
            }
        }

        info!(
            "event=rule_done module=rules status=ok rule={ADDRESS_SYNC_RULE} parent={} updated={} failed={}",
            parent.id, tally.updated, tally.failed
        );
        Ok(RuleOutcome::AddressSynced(tally))
    }
}
