use crate::error::SyncResult;
use crate::rules::{RuleTable, TablePattern};
use crate::types::TableName;

/// Decides which tables' row events are processed.
///
/// Events of tables outside the filter are skipped before rule resolution, so they never trigger
/// a missing-rule error.
#[derive(Debug, Clone)]
pub struct TableFilter {
    patterns: Vec<TablePattern>,
}

impl TableFilter {
    /// Builds a filter from explicit patterns.
    pub fn new<I, S>(patterns: I) -> SyncResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| TablePattern::compile(pattern.as_ref()))
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Uses the rule patterns as the filter, so exactly the tables with a rule are processed.
    pub fn from_rules(rules: &RuleTable) -> Self {
        Self {
            patterns: rules.patterns().cloned().collect(),
        }
    }

    /// Builds the filter from the configured inclusion list, falling back to the rule patterns.
    pub fn from_config(include_tables: Option<&[String]>, rules: &RuleTable) -> SyncResult<Self> {
        match include_tables {
            Some(patterns) => Self::new(patterns),
            None => Ok(Self::from_rules(rules)),
        }
    }

    /// Returns `true` if events of `table` must be processed.
    pub fn includes(&self, table: &TableName) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::rules::{Action, Rule};

    #[test]
    fn defaults_to_rule_patterns() {
        let rules = RuleTable::new(vec![
            Rule::new("orders.*", Action::default(), Action::default()).unwrap(),
        ]);
        let filter = TableFilter::from_config(None, &rules).unwrap();

        assert!(filter.includes(&TableName::new("shop", "orders_2024")));
        assert!(!filter.includes(&TableName::new("shop", "users")));
    }

    #[test]
    fn explicit_list_overrides_rules() {
        let rules = RuleTable::new(vec![
            Rule::new(".*", Action::default(), Action::default()).unwrap(),
        ]);
        let include = vec!["shop.users".to_string()];
        let filter = TableFilter::from_config(Some(&include), &rules).unwrap();

        assert!(filter.includes(&TableName::new("shop", "users")));
        assert!(!filter.includes(&TableName::new("shop", "orders")));
    }

    #[test]
    fn rejects_invalid_patterns() {
        let err = TableFilter::new(["["]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTablePattern);
    }
}
