use crate::error::{ErrorKind, SyncResult};
use crate::rules::{Rule, RuleTable};
use crate::sync_error;
use crate::types::TableName;

/// Selects the rule governing a table.
///
/// Built once at startup and passed to the dispatcher; it holds no mutable state.
#[derive(Debug, Clone)]
pub struct RuleResolver {
    table: RuleTable,
}

impl RuleResolver {
    pub fn new(table: RuleTable) -> Self {
        Self { table }
    }

    /// Returns the first rule, in configuration order, whose pattern matches `table`.
    ///
    /// A table without a rule is a configuration error: changes are never dropped silently.
    pub fn resolve(&self, table: &TableName) -> SyncResult<&Rule> {
        self.table
            .rules()
            .iter()
            .find(|rule| rule.pattern.matches(table))
            .ok_or_else(|| {
                sync_error!(
                    ErrorKind::RuleNotFound,
                    "No rule matches the table",
                    format!("no configured pattern matches table `{table}`")
                )
            })
    }

    pub fn rule_table(&self) -> &RuleTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Action, ActionKind};

    fn resolver() -> RuleResolver {
        RuleResolver::new(RuleTable::new(vec![
            Rule::new(
                "orders_archive",
                Action::new(ActionKind::None),
                Action::new(ActionKind::None),
            )
            .unwrap(),
            Rule::new("orders.*", Action::default(), Action::default()).unwrap(),
            Rule::new(
                ".*",
                Action::new(ActionKind::Mirror).with_table("catch_all"),
                Action::default(),
            )
            .unwrap(),
        ]))
    }

    #[test]
    fn first_matching_rule_wins() {
        let resolver = resolver();

        let rule = resolver
            .resolve(&TableName::new("shop", "orders_archive"))
            .unwrap();
        assert_eq!(rule.pattern.as_str(), "orders_archive");

        let rule = resolver
            .resolve(&TableName::new("shop", "orders_2024"))
            .unwrap();
        assert_eq!(rule.pattern.as_str(), "orders.*");

        let rule = resolver.resolve(&TableName::new("shop", "users")).unwrap();
        assert_eq!(rule.update.table.as_deref(), Some("catch_all"));
    }

    #[test]
    fn unmatched_table_is_rule_not_found() {
        let resolver = RuleResolver::new(RuleTable::new(vec![
            Rule::new("orders", Action::default(), Action::default()).unwrap(),
        ]));

        let err = resolver
            .resolve(&TableName::new("shop", "users"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuleNotFound);
    }
}
