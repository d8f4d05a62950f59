//! `chartforge-planner`: chart-type selection with an LLM advisor and a
//! deterministic rule-table fallback.

pub mod advisor;
pub mod mock;
pub mod providers;
pub mod rules;
pub mod selector;

pub use advisor::{LlmAdvisor, LlmAdvisorConfig};
pub use mock::MockAdvisor;
pub use rules::{companion, Rule, RuleMatch, RuleTable};
pub use selector::{ChartSelector, SelectorConfig, RULE_CONFIDENCE};
