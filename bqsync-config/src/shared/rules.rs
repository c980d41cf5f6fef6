use serde::{Deserialize, Serialize};

/// How a change is materialized downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKindConfig {
    /// Suppress the change.
    None,
    /// Copy the row image to the warehouse as is.
    Mirror,
    /// Turn inserts and updates into deletes. Only valid on the delete side.
    RemapToDelete,
    /// Turn a delete into an upsert of the deleted row image. Only valid on the update side.
    RemapToUpdate,
    /// Replace the row image with the result of a lookup query.
    RewriteViaQuery,
}

/// One side (update or delete) of a table rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Action to take. When omitted, the action is `rewrite-via-query` if a query is set and
    /// `mirror` otherwise.
    #[serde(default)]
    pub action: Option<ActionKindConfig>,
    /// Lookup query for `rewrite-via-query`. Source columns are available as `@column` parameters.
    #[serde(default)]
    pub query: Option<String>,
    /// Target table in the warehouse. Defaults to the source table name.
    #[serde(default)]
    pub table: Option<String>,
}

impl ActionConfig {
    /// Returns the action kind after applying the defaults described on [`ActionConfig::action`].
    pub fn effective_kind(&self) -> ActionKindConfig {
        match (self.action, &self.query) {
            (Some(kind), _) => kind,
            (None, Some(_)) => ActionKindConfig::RewriteViaQuery,
            (None, None) => ActionKindConfig::Mirror,
        }
    }
}

/// Rule selecting how changes of the tables matching `table` are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Regular expression that must match the whole source table name.
    pub table: String,
    /// Action used for inserts and updates.
    #[serde(default)]
    pub update: ActionConfig,
    /// Action used for deletes.
    #[serde(default)]
    pub delete: ActionConfig,
}

impl RuleConfig {
    /// Returns `true` if either side of the rule runs lookup queries.
    pub fn requires_lookup(&self) -> bool {
        self.update.effective_kind() == ActionKindConfig::RewriteViaQuery
            || self.delete.effective_kind() == ActionKindConfig::RewriteViaQuery
    }
}
