use regex::Regex;

use bqsync_config::shared::RuleConfig;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::rules::{Action, ActionKind};
use crate::types::TableName;

/// A table name pattern that must match the whole name.
#[derive(Debug, Clone)]
pub struct TablePattern {
    source: String,
    regex: Regex,
}

impl TablePattern {
    /// Compiles `pattern` anchored at both ends.
    pub fn compile(pattern: &str) -> SyncResult<Self> {
        if pattern.trim().is_empty() {
            bail!(
                ErrorKind::InvalidTablePattern,
                "Table pattern is empty"
            );
        }

        let regex = Regex::new(&format!("^(?:{pattern})$"))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` when the pattern matches the bare or the qualified table name.
    pub fn matches(&self, table: &TableName) -> bool {
        self.regex.is_match(&table.name)
            || (!table.schema.is_empty() && self.regex.is_match(&table.qualified()))
    }
}

impl PartialEq for TablePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A compiled table rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub pattern: TablePattern,
    /// Action for inserts and updates.
    pub update: Action,
    /// Action for deletes.
    pub delete: Action,
}

impl Rule {
    pub fn new(pattern: &str, update: Action, delete: Action) -> SyncResult<Self> {
        Ok(Self {
            pattern: TablePattern::compile(pattern)?,
            update,
            delete,
        })
    }

    pub fn compile(config: &RuleConfig) -> SyncResult<Self> {
        Rule::new(
            &config.table,
            Action::from(&config.update),
            Action::from(&config.delete),
        )
    }

    /// Returns `true` if either side runs lookup queries.
    pub fn requires_lookup(&self) -> bool {
        self.update.kind == ActionKind::RewriteViaQuery
            || self.delete.kind == ActionKind::RewriteViaQuery
    }
}

/// Rules in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Compiles every configured rule, failing on the first invalid pattern.
    pub fn compile(configs: &[RuleConfig]) -> SyncResult<Self> {
        let rules = configs
            .iter()
            .map(Rule::compile)
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn requires_lookup(&self) -> bool {
        self.rules.iter().any(Rule::requires_lookup)
    }

    /// Returns the patterns of every rule, in order.
    pub fn patterns(&self) -> impl Iterator<Item = &TablePattern> {
        self.rules.iter().map(|rule| &rule.pattern)
    }
}

#[cfg(test)]
mod tests {
    use bqsync_config::shared::{ActionConfig, ActionKindConfig};

    use super::*;

    #[test]
    fn patterns_match_whole_names_only() {
        let pattern = TablePattern::compile("orders").unwrap();

        assert!(pattern.matches(&TableName::new("shop", "orders")));
        assert!(!pattern.matches(&TableName::new("shop", "orders_2024")));
        assert!(!pattern.matches(&TableName::new("shop", "old_orders")));
    }

    #[test]
    fn patterns_can_match_qualified_names() {
        let pattern = TablePattern::compile(r"shop\.orders_\d+").unwrap();

        assert!(pattern.matches(&TableName::new("shop", "orders_2024")));
        assert!(!pattern.matches(&TableName::new("archive", "orders_2024")));
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let pattern = TablePattern::compile("users|orders").unwrap();

        assert!(pattern.matches(&TableName::new("", "users")));
        assert!(!pattern.matches(&TableName::new("", "orders_x")));
    }

    #[test]
    fn invalid_patterns_are_configuration_errors() {
        let config = RuleConfig {
            table: "orders(".to_string(),
            update: ActionConfig::default(),
            delete: ActionConfig::default(),
        };

        let err = RuleTable::compile(&[config]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTablePattern);
        assert!(err.kind().is_configuration_error());
    }

    #[test]
    fn compiles_actions_from_configuration() {
        let config = RuleConfig {
            table: "orders.*".to_string(),
            update: ActionConfig {
                action: None,
                query: Some("SELECT 1".to_string()),
                table: Some("orders_view".to_string()),
            },
            delete: ActionConfig {
                action: Some(ActionKindConfig::None),
                query: None,
                table: None,
            },
        };

        let table = RuleTable::compile(&[config]).unwrap();
        let rule = &table.rules()[0];

        assert_eq!(rule.update.kind, ActionKind::RewriteViaQuery);
        assert_eq!(rule.update.table.as_deref(), Some("orders_view"));
        assert_eq!(rule.delete.kind, ActionKind::None);
        assert!(table.requires_lookup());
    }
}
