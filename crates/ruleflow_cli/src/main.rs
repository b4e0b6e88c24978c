//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `ruleflow_core` linkage and the default rule set without a host.
//! - Keep output deterministic for quick local sanity checks.

use ruleflow_core::{RuleConfig, RuleEngine};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("ruleflow_core ping={}", ruleflow_core::ping());
    println!("ruleflow_core version={}", ruleflow_core::core_version());

    match RuleEngine::with_default_rules(&RuleConfig::default()) {
        Ok(engine) => {
            for name in engine.rule_names() {
                println!("rule={name}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to build default rules: {err}");
            ExitCode::FAILURE
        }
    }
}
