use serde::Deserialize;
use thiserror::Error;

use crate::load::Config;
use crate::shared::{
    ActionConfig, ActionKindConfig, DestinationConfig, LookupConfig, PipelineConfig, RuleConfig,
};

/// Errors found while validating a [`ReplicatorConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one rule must be configured")]
    NoRules,

    #[error("rule {index} has an empty table pattern")]
    EmptyTablePattern { index: usize },

    #[error("the {side} action of rule `{table}` is `rewrite-via-query` but has no query")]
    MissingQuery { table: String, side: &'static str },

    #[error("the {side} action of rule `{table}` sets a query but its action does not run queries")]
    UnexpectedQuery { table: String, side: &'static str },

    #[error(
        "the {side} action of rule `{table}` cannot be `{action}`; `remap-to-delete` belongs on the delete side and `remap-to-update` on the update side"
    )]
    MisplacedRemap {
        table: String,
        side: &'static str,
        action: &'static str,
    },

    #[error("rule `{table}` runs lookup queries but no `lookup` connection is configured")]
    MissingLookup { table: String },

    #[error("the BigQuery {field} must not be empty")]
    EmptyBigQueryField { field: &'static str },
}

/// Complete configuration of the replicator service.
///
/// This intentionally does not implement [`serde::Serialize`] because it holds secrets.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatorConfig {
    /// Warehouse receiving the changes.
    pub destination: DestinationConfig,
    /// Connection used by `rewrite-via-query` actions.
    #[serde(default)]
    pub lookup: Option<LookupConfig>,
    /// Pipeline behaviour.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Table rules, evaluated in order; the first matching rule wins.
    pub rules: Vec<RuleConfig>,
}

impl ReplicatorConfig {
    /// Checks the invariants that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.rules.is_empty() {
            return Err(ValidationError::NoRules);
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.table.trim().is_empty() {
                return Err(ValidationError::EmptyTablePattern { index });
            }

            validate_action(&rule.table, "update", &rule.update)?;
            validate_action(&rule.table, "delete", &rule.delete)?;

            if rule.requires_lookup() && self.lookup.is_none() {
                return Err(ValidationError::MissingLookup {
                    table: rule.table.clone(),
                });
            }
        }

        if let DestinationConfig::BigQuery {
            project_id,
            dataset_id,
            ..
        } = &self.destination
        {
            if project_id.trim().is_empty() {
                return Err(ValidationError::EmptyBigQueryField {
                    field: "project id",
                });
            }
            if dataset_id.trim().is_empty() {
                return Err(ValidationError::EmptyBigQueryField {
                    field: "dataset id",
                });
            }
        }

        Ok(())
    }
}

fn validate_action(
    table: &str,
    side: &'static str,
    action: &ActionConfig,
) -> Result<(), ValidationError> {
    let has_query = action
        .query
        .as_deref()
        .is_some_and(|query| !query.trim().is_empty());

    match (side, action.effective_kind()) {
        ("update", ActionKindConfig::RemapToDelete) => Err(ValidationError::MisplacedRemap {
            table: table.to_string(),
            side,
            action: "remap-to-delete",
        }),
        ("delete", ActionKindConfig::RemapToUpdate) => Err(ValidationError::MisplacedRemap {
            table: table.to_string(),
            side,
            action: "remap-to-update",
        }),
        (_, ActionKindConfig::RewriteViaQuery) if !has_query => Err(ValidationError::MissingQuery {
            table: table.to_string(),
            side,
        }),
        (_, ActionKindConfig::RewriteViaQuery) => Ok(()),
        _ if action.query.is_some() => Err(ValidationError::UnexpectedQuery {
            table: table.to_string(),
            side,
        }),
        _ => Ok(()),
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["pipeline.include_tables"];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(table: &str, update: ActionConfig, delete: ActionConfig) -> RuleConfig {
        RuleConfig {
            table: table.to_string(),
            update,
            delete,
        }
    }

    fn config(rules: Vec<RuleConfig>) -> ReplicatorConfig {
        ReplicatorConfig {
            destination: DestinationConfig::Memory,
            lookup: None,
            pipeline: PipelineConfig::default(),
            rules,
        }
    }

    fn kind_action(kind: ActionKindConfig) -> ActionConfig {
        ActionConfig {
            action: Some(kind),
            query: None,
            table: None,
        }
    }

    fn query_action(query: &str) -> ActionConfig {
        ActionConfig {
            action: None,
            query: Some(query.to_string()),
            table: None,
        }
    }

    #[test]
    fn accepts_mirroring_rules() {
        let config = config(vec![rule(
            "orders.*",
            ActionConfig::default(),
            ActionConfig::default(),
        )]);

        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_empty_rule_list() {
        assert_eq!(config(vec![]).validate(), Err(ValidationError::NoRules));
    }

    #[test]
    fn query_without_action_defaults_to_rewrite_and_needs_lookup() {
        let config = config(vec![rule(
            "orders",
            query_action("select 1"),
            ActionConfig::default(),
        )]);

        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingLookup {
                table: "orders".to_string()
            })
        );
    }

    #[test]
    fn rejects_query_on_non_rewrite_action() {
        let mut update = query_action("select 1");
        update.action = Some(ActionKindConfig::Mirror);
        let config = config(vec![rule("orders", update, ActionConfig::default())]);

        assert_eq!(
            config.validate(),
            Err(ValidationError::UnexpectedQuery {
                table: "orders".to_string(),
                side: "update"
            })
        );
    }

    #[test]
    fn rejects_rewrite_without_query() {
        let delete = ActionConfig {
            action: Some(ActionKindConfig::RewriteViaQuery),
            query: None,
            table: None,
        };
        let config = config(vec![rule("orders", ActionConfig::default(), delete)]);

        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingQuery {
                table: "orders".to_string(),
                side: "delete"
            })
        );
    }

    #[test]
    fn accepts_remaps_on_the_side_the_router_reads() {
        let config = config(vec![
            rule(
                "orders",
                kind_action(ActionKindConfig::RemapToUpdate),
                ActionConfig::default(),
            ),
            rule(
                "customers",
                ActionConfig::default(),
                kind_action(ActionKindConfig::RemapToDelete),
            ),
        ]);

        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_remap_to_delete_on_the_update_side() {
        let config = config(vec![rule(
            "orders.*",
            kind_action(ActionKindConfig::RemapToDelete),
            ActionConfig::default(),
        )]);

        assert_eq!(
            config.validate(),
            Err(ValidationError::MisplacedRemap {
                table: "orders.*".to_string(),
                side: "update",
                action: "remap-to-delete",
            })
        );
    }

    #[test]
    fn rejects_remap_to_update_on_the_delete_side() {
        let config = config(vec![rule(
            "orders.*",
            ActionConfig::default(),
            kind_action(ActionKindConfig::RemapToUpdate),
        )]);

        assert_eq!(
            config.validate(),
            Err(ValidationError::MisplacedRemap {
                table: "orders.*".to_string(),
                side: "delete",
                action: "remap-to-update",
            })
        );
    }

    #[test]
    fn bare_delete_and_update_action_names_are_not_accepted() {
        let parsed = serde_json::from_str::<RuleConfig>(
            r#"{"table": "orders.*", "update": {"action": "delete"}}"#,
        );
        assert!(parsed.is_err());

        let parsed = serde_json::from_str::<RuleConfig>(
            r#"{"table": "orders.*", "delete": {"action": "update"}}"#,
        );
        assert!(parsed.is_err());
    }
}
