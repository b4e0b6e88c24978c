//! Rule registry and event dispatch.
//!
//! # Responsibility
//! - Hold the registered rules in registration order.
//! - Run every rule against one dispatched event.
//!
//! # Invariants
//! - Rule names are unique within one engine.
//! - Dispatch stops at the first fatal rule error; earlier writes stay
//!   committed.

use crate::config::{ConfigError, RuleConfig};
use crate::model::event::MutationEvent;
use crate::rules::address_sync::AddressSyncRule;
use crate::rules::grade_credits::GradeCreditsRule;
use crate::rules::materials::MaterialsListRule;
use crate::rules::{Rule, RuleError, RuleOutcome};
use crate::store::RecordStore;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rule registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    DuplicateRule(String),
    InvalidConfig(ConfigError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateRule(name) => write!(f, "rule already registered: {name}"),
            Self::InvalidConfig(err) => write!(f, "invalid rule config: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DuplicateRule(_) => None,
            Self::InvalidConfig(err) => Some(err),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

/// Outcome of one rule for one dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRun {
    pub rule: &'static str,
    pub outcome: RuleOutcome,
}

/// Outcomes of every rule for one dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub runs: Vec<RuleRun>,
}

impl DispatchReport {
    /// Returns the outcome recorded for `rule`, if it ran.
    pub fn outcome(&self, rule: &str) -> Option<&RuleOutcome> {
        self.runs
            .iter()
            .find(|run| run.rule == rule)
            .map(|run| &run.outcome)
    }

    /// Number of rules that did work for this event.
    pub fn applied_count(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| !run.outcome.is_skipped())
            .count()
    }
}

/// Ordered collection of rules.
#[derive(Default)]
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an engine with the address-sync, grade-credits and
    /// materials-list rules, in that order.
    pub fn with_default_rules(config: &RuleConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let mut engine = Self::new();
        engine.register(Box::new(AddressSyncRule::new(config)))?;
        engine.register(Box::new(GradeCreditsRule::new(config)))?;
        engine.register(Box::new(MaterialsListRule::new(config)))?;
        Ok(engine)
    }

    /// Registers one rule after the existing ones.
    pub fn register(&mut self, rule: Box<dyn Rule>) -> Result<(), EngineError> {
        if self.rules.iter().any(|existing| existing.name() == rule.name()) {
            return Err(EngineError::DuplicateRule(rule.name().to_string()));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns rule names in registration order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Runs every rule against `event`.
    ///
    /// # Errors
    /// Returns the first fatal `RuleError`; later rules do not run.
    pub fn dispatch(
        &self,
        store: &dyn RecordStore,
        event: &MutationEvent,
    ) -> Result<DispatchReport, RuleError> {
        info!(
            "event=dispatch module=engine status=start operation={} entity={} rules={}",
            event.operation,
            event.entity_kind,
            self.rules.len()
        );

        let mut report = DispatchReport::default();
        for rule in &self.rules {
            let outcome = rule.execute(store, event)?;
            report.runs.push(RuleRun {
                rule: rule.name(),
                outcome,
            });
        }

        info!(
            "event=dispatch module=engine status=ok operation={} entity={} applied={}",
            event.operation,
            event.entity_kind,
            report.applied_count()
        );
        Ok(report)
    }
}
