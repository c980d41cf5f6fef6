//! Per-table rules selecting how changes are materialized downstream.
//!
//! Rules are compiled once from configuration into a [`RuleTable`] and then only read. The
//! [`RuleResolver`] picks the first rule whose pattern matches a table name, and the
//! [`TableFilter`] decides which tables are processed at all.

mod action;
mod filter;
mod resolver;
mod rule;

pub use action::{Action, ActionKind};
pub use filter::TableFilter;
pub use resolver::RuleResolver;
pub use rule::{Rule, RuleTable, TablePattern};
