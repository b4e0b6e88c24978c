//! Materials summary for newly created enrollments.
//!
//! # Invariants
//! - Names are listed in ascending name order, ties by id.
//! - Empty names are skipped; a course without materials gets the
//!   placeholder text.

use crate::config::RuleConfig;
use crate::model::entity::{EntityKind, Field};
use crate::model::event::{MutationEvent, Operation};
use crate::model::record::{EnrollmentRecord, Record, RecordId, RecordPatch};
use crate::rules::{fatal, match_target, skipped, Rule, RuleOutcome, RuleResult, SkipReason};
use crate::store::{retrieve_all, RecordQuery, RecordStore, SortDirection, StoreResult};
use log::{debug, info};

pub const MATERIALS_LIST_RULE: &str = "MaterialsListRule";

/// Writes the list of course materials onto a new enrollment.
#[derive(Debug, Clone)]
pub struct MaterialsListRule {
    page_size: u32,
    placeholder: String,
    separator: String,
}

impl MaterialsListRule {
    pub fn new(config: &RuleConfig) -> Self {
        Self {
            page_size: config.page_size,
            placeholder: config.no_materials_placeholder.clone(),
            separator: config.materials_separator.clone(),
        }
    }

    fn trigger<'e>(
        &self,
        event: &'e MutationEvent,
    ) -> Result<(&'e EnrollmentRecord, RecordId), SkipReason> {
        match_target(event, |op| *op == Operation::Create, EntityKind::Enrollment)?;
        let Some(Record::Enrollment(enrollment)) = event.target.as_ref() else {
            return Err(SkipReason::MissingTarget);
        };
        if !event.changed_fields.contains(&Field::CourseId) {
            return Err(SkipReason::FieldNotChanged(Field::CourseId));
        }
        let course_id = enrollment
            .course_id
            .ok_or(SkipReason::MissingReference(Field::CourseId))?;
        Ok((enrollment, course_id))
    }

    fn summarize(&self, store: &dyn RecordStore, course_id: RecordId) -> StoreResult<String> {
        let query = RecordQuery::new(EntityKind::Material)
            .columns([Field::Name])
            .filter_eq(Field::CourseId, course_id)
            .order_by(Field::Name, SortDirection::Ascending);
        let materials = retrieve_all(store, &query, self.page_size)?;

        if materials.is_empty() {
            debug!("event=materials_empty module=rules rule={MATERIALS_LIST_RULE} course={course_id}");
            return Ok(self.placeholder.clone());
        }
        debug!(
            "event=materials_loaded module=rules rule={MATERIALS_LIST_RULE} course={course_id} count={}",
            materials.len()
        );

        let mut names = Vec::with_capacity(materials.len());
        for record in materials {
            if let Some(name) = record.into_material()?.name.filter(|name| !name.is_empty()) {
                names.push(name);
            }
        }
        Ok(names.join(self.separator.as_str()))
    }
}

impl Rule for MaterialsListRule {
    fn name(&self) -> &'static str {
        MATERIALS_LIST_RULE
    }

    fn execute(&self, store: &dyn RecordStore, event: &MutationEvent) -> RuleResult<RuleOutcome> {
        let (enrollment, course_id) = match self.trigger(event) {
            Ok(found) => found,
            Err(reason) => return Ok(skipped(MATERIALS_LIST_RULE, reason)),
        };

        info!(
            "event=rule_start module=rules status=start rule={MATERIALS_LIST_RULE} enrollment={} course={course_id}",
            enrollment.id
        );

        let summary = self
            .summarize(store, course_id)
            .and_then(|summary| {
                store.update(
                    enrollment.id,
                    &RecordPatch::EnrollmentMaterials {
                        materials_needed: summary.clone(),
                    },
                )?;
                Ok(summary)
            })
            .map_err(|err| fatal(MATERIALS_LIST_RULE, err))?;

        info!(
            "event=rule_done module=rules status=ok rule={MATERIALS_LIST_RULE} enrollment={}",
            enrollment.id
        );
        Ok(RuleOutcome::MaterialsListed {
            enrollment_id: enrollment.id,
            summary,
        })
    }
}
