use std::fmt;

use bqsync_config::shared::{ActionConfig, ActionKindConfig};

/// What to do with a change on one side (update or delete) of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Drop the change without any side effect.
    None,
    /// Copy the row image to the warehouse.
    Mirror,
    /// Apply inserts and updates as deletes.
    RemapToDelete,
    /// Apply deletes as upserts of the deleted row image.
    RemapToUpdate,
    /// Replace each row image with the rows returned by a lookup query.
    RewriteViaQuery,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::None => "none",
            ActionKind::Mirror => "mirror",
            ActionKind::RemapToDelete => "remap-to-delete",
            ActionKind::RemapToUpdate => "remap-to-update",
            ActionKind::RewriteViaQuery => "rewrite-via-query",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ActionKindConfig> for ActionKind {
    fn from(value: ActionKindConfig) -> Self {
        match value {
            ActionKindConfig::None => ActionKind::None,
            ActionKindConfig::Mirror => ActionKind::Mirror,
            ActionKindConfig::RemapToDelete => ActionKind::RemapToDelete,
            ActionKindConfig::RemapToUpdate => ActionKind::RemapToUpdate,
            ActionKindConfig::RewriteViaQuery => ActionKind::RewriteViaQuery,
        }
    }
}

/// One side of a compiled rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    /// Lookup query run by [`ActionKind::RewriteViaQuery`].
    pub query: Option<String>,
    /// Warehouse table override; the source table name is used when absent.
    pub table: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            query: None,
            table: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Returns the lookup query when this action rewrites rows through one.
    pub fn rewrite_query(&self) -> Option<&str> {
        match self.kind {
            ActionKind::RewriteViaQuery => self.query.as_deref(),
            _ => None,
        }
    }

    /// Returns the warehouse table for changes of `source_table`.
    pub fn target_table<'a>(&'a self, source_table: &'a str) -> &'a str {
        match self.table.as_deref() {
            Some(table) if !table.is_empty() => table,
            _ => source_table,
        }
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::new(ActionKind::Mirror)
    }
}

impl From<&ActionConfig> for Action {
    fn from(config: &ActionConfig) -> Self {
        Self {
            kind: config.effective_kind().into(),
            query: config.query.clone().filter(|query| !query.trim().is_empty()),
            table: config.table.clone().filter(|table| !table.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_without_explicit_action_rewrites() {
        let config = ActionConfig {
            action: None,
            query: Some("SELECT * FROM orders WHERE id = @id".to_string()),
            table: Some(String::new()),
        };
        let action = Action::from(&config);

        assert_eq!(action.kind, ActionKind::RewriteViaQuery);
        assert_eq!(
            action.rewrite_query(),
            Some("SELECT * FROM orders WHERE id = @id")
        );
        assert_eq!(action.table, None);
        assert_eq!(action.target_table("orders"), "orders");
    }

    #[test]
    fn table_override_replaces_source_name() {
        let action = Action::new(ActionKind::Mirror).with_table("orders_history");
        assert_eq!(action.target_table("orders"), "orders_history");
        assert_eq!(action.rewrite_query(), None);
    }
}
