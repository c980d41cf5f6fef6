use tracing::debug;

use crate::bail;
use crate::conversions::ColumnCodec;
use crate::destination::Warehouse;
use crate::error::{ErrorKind, SyncResult};
use crate::lookup::LookupClient;
use crate::replication::{Deleter, Materializer, RowSelection};
use crate::rules::{Action, ActionKind, Rule, RuleResolver};
use crate::types::{ChangeEvent, ChangeKind};

/// Component an event is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Materializer,
    Deleter,
}

/// Side of a rule whose action kind decides the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsultedSide {
    Update,
    Delete,
}

/// Condition on the consulted action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    Is(ActionKind),
    IsNot(ActionKind),
}

impl Condition {
    fn holds(&self, kind: ActionKind) -> bool {
        match self {
            Condition::Is(expected) => kind == *expected,
            Condition::IsNot(excluded) => kind != *excluded,
        }
    }
}

/// One row of the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingEntry {
    detected: ChangeKind,
    consulted: ConsultedSide,
    condition: Condition,
    target: RouteTarget,
    selection: RowSelection,
}

/// Where and how a change event is applied.
///
/// Every detected action has exactly one matching pair of rows in the table, whose conditions
/// are complementary, so routing is total.
pub static ROUTING_TABLE: [RoutingEntry; 6] = [
    RoutingEntry {
        detected: ChangeKind::Insert,
        consulted: ConsultedSide::Delete,
        condition: Condition::Is(ActionKind::RemapToDelete),
        target: RouteTarget::Deleter,
        selection: RowSelection::ALL,
    },
    RoutingEntry {
        detected: ChangeKind::Insert,
        consulted: ConsultedSide::Delete,
        condition: Condition::IsNot(ActionKind::RemapToDelete),
        target: RouteTarget::Materializer,
        selection: RowSelection::ALL,
    },
    RoutingEntry {
        detected: ChangeKind::Delete,
        consulted: ConsultedSide::Update,
        condition: Condition::Is(ActionKind::RemapToUpdate),
        target: RouteTarget::Materializer,
        selection: RowSelection::ALL,
    },
    RoutingEntry {
        detected: ChangeKind::Delete,
        consulted: ConsultedSide::Update,
        condition: Condition::IsNot(ActionKind::RemapToUpdate),
        target: RouteTarget::Deleter,
        selection: RowSelection::ALL,
    },
    RoutingEntry {
        detected: ChangeKind::Update,
        consulted: ConsultedSide::Delete,
        condition: Condition::Is(ActionKind::RemapToDelete),
        target: RouteTarget::Deleter,
        selection: RowSelection::NEW_IMAGES,
    },
    RoutingEntry {
        detected: ChangeKind::Update,
        consulted: ConsultedSide::Delete,
        condition: Condition::IsNot(ActionKind::RemapToDelete),
        target: RouteTarget::Materializer,
        selection: RowSelection::NEW_IMAGES,
    },
];

/// Result of routing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub target: RouteTarget,
    pub selection: RowSelection,
}

impl Route {
    /// Returns the action applied on this route: the update side for the materializer and the
    /// delete side for the deleter.
    pub fn action<'a>(&self, rule: &'a Rule) -> &'a Action {
        match self.target {
            RouteTarget::Materializer => &rule.update,
            RouteTarget::Deleter => &rule.delete,
        }
    }
}

/// Looks up the route of a `kind` event under `rule`.
pub fn route(kind: ChangeKind, rule: &Rule) -> Route {
    ROUTING_TABLE
        .iter()
        .find(|entry| {
            let consulted = match entry.consulted {
                ConsultedSide::Update => rule.update.kind,
                ConsultedSide::Delete => rule.delete.kind,
            };

            entry.detected == kind && entry.condition.holds(consulted)
        })
        .map(|entry| Route {
            target: entry.target,
            selection: entry.selection,
        })
        // Unreachable: each detected kind has a complementary pair of entries.
        .unwrap_or(Route {
            target: RouteTarget::Materializer,
            selection: RowSelection::ALL,
        })
}

/// What happened to a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The effective action was `none`; nothing was sent.
    Skipped,
    /// `rows` rows were uploaded to `table`.
    Materialized { table: String, rows: usize },
    /// `rows` delete statements were run against `table`.
    Deleted { table: String, rows: usize },
}

/// Classifies change events and applies them downstream.
#[derive(Debug)]
pub struct Dispatcher<W, L> {
    resolver: RuleResolver,
    materializer: Materializer<W, L>,
    deleter: Deleter<W>,
}

impl<W, L> Dispatcher<W, L>
where
    W: Warehouse + Clone + Send + Sync,
    L: LookupClient + Send + Sync,
{
    /// Creates a dispatcher.
    ///
    /// Fails when a rule rewrites rows through a query but has no query, when a remap sits on a
    /// side no route reads, or when the lookup client cannot run queries.
    pub fn new(
        resolver: RuleResolver,
        warehouse: W,
        lookup: L,
        codec: ColumnCodec,
    ) -> SyncResult<Self> {
        for rule in resolver.rule_table().rules() {
            for action in [&rule.update, &rule.delete] {
                if action.kind == ActionKind::RewriteViaQuery && action.query.is_none() {
                    bail!(
                        ErrorKind::ConfigError,
                        "Rewrite action without a query",
                        format!("a rule for `{}` rewrites rows but has no query", rule.pattern.as_str())
                    );
                }
            }

            let misplaced = match (rule.update.kind, rule.delete.kind) {
                (ActionKind::RemapToDelete, _) => Some(("update", ActionKind::RemapToDelete)),
                (_, ActionKind::RemapToUpdate) => Some(("delete", ActionKind::RemapToUpdate)),
                _ => None,
            };
            if let Some((side, kind)) = misplaced {
                bail!(
                    ErrorKind::ConfigError,
                    "Remap action on a side that is never routed",
                    format!(
                        "the {side} action of the rule for `{}` is {kind}, which only the other side supports",
                        rule.pattern.as_str()
                    )
                );
            }

            if rule.requires_lookup() && !lookup.is_enabled() {
                bail!(
                    ErrorKind::ConfigError,
                    "Rule requires a lookup connection",
                    format!(
                        "the rule for `{}` runs lookup queries but no lookup connection is configured",
                        rule.pattern.as_str()
                    )
                );
            }
        }

        Ok(Self {
            resolver,
            materializer: Materializer::new(warehouse.clone(), lookup, codec.clone()),
            deleter: Deleter::new(warehouse, codec),
        })
    }

    /// Applies one change event.
    ///
    /// The rule is resolved before anything else, so an event of a table without a rule fails
    /// without reaching the warehouse.
    pub async fn dispatch(&self, event: ChangeEvent) -> SyncResult<DispatchOutcome> {
        let rule = self.resolver.resolve(&event.table.name)?;
        validate_rows(&event)?;

        let route = route(event.kind, rule);
        let action = route.action(rule);

        if action.kind == ActionKind::None {
            debug!(
                table = %event.table.name,
                kind = %event.kind,
                position = %event.position,
                "dropping change, action is none"
            );

            return Ok(DispatchOutcome::Skipped);
        }

        let table = action.target_table(&event.table.name.name).to_string();
        match route.target {
            RouteTarget::Materializer => {
                let rows = self
                    .materializer
                    .materialize(action, &event, route.selection)
                    .await?;

                Ok(DispatchOutcome::Materialized { table, rows })
            }
            RouteTarget::Deleter => {
                let rows = self.deleter.delete(action, &event, route.selection).await?;

                Ok(DispatchOutcome::Deleted { table, rows })
            }
        }
    }
}

/// Checks that every image has one value per column and that update images come in pairs.
fn validate_rows(event: &ChangeEvent) -> SyncResult<()> {
    let columns = event.table.column_schemas.len();

    if let Some((index, row)) = event
        .rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != columns)
    {
        bail!(
            ErrorKind::InvalidData,
            "Row image does not match the table columns",
            format!(
                "row {index} of the {} event on `{}` at {} has {} values but the table has {columns} columns",
                event.kind,
                event.table.name,
                event.position,
                row.len()
            )
        );
    }

    if event.kind == ChangeKind::Update && event.rows.len() % 2 != 0 {
        bail!(
            ErrorKind::InvalidData,
            "Update event without paired row images",
            format!(
                "the update event on `{}` at {} carries {} images",
                event.table.name,
                event.position,
                event.rows.len()
            )
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(update: ActionKind, delete: ActionKind) -> Rule {
        Rule::new(".*", Action::new(update), Action::new(delete)).unwrap()
    }

    const ALL_KINDS: [ActionKind; 5] = [
        ActionKind::None,
        ActionKind::Mirror,
        ActionKind::RemapToDelete,
        ActionKind::RemapToUpdate,
        ActionKind::RewriteViaQuery,
    ];

    #[test]
    fn inserts_follow_the_delete_side() {
        for update in ALL_KINDS {
            for delete in ALL_KINDS {
                let route = route(ChangeKind::Insert, &rule(update, delete));
                let expected = if delete == ActionKind::RemapToDelete {
                    RouteTarget::Deleter
                } else {
                    RouteTarget::Materializer
                };

                assert_eq!(route.target, expected, "update={update} delete={delete}");
                assert_eq!(route.selection, RowSelection::ALL);
            }
        }
    }

    #[test]
    fn deletes_follow_the_update_side() {
        for update in ALL_KINDS {
            for delete in ALL_KINDS {
                let route = route(ChangeKind::Delete, &rule(update, delete));
                let expected = if update == ActionKind::RemapToUpdate {
                    RouteTarget::Materializer
                } else {
                    RouteTarget::Deleter
                };

                assert_eq!(route.target, expected, "update={update} delete={delete}");
                assert_eq!(route.selection, RowSelection::ALL);
            }
        }
    }

    #[test]
    fn updates_only_use_new_images() {
        for update in ALL_KINDS {
            for delete in ALL_KINDS {
                let route = route(ChangeKind::Update, &rule(update, delete));
                let expected = if delete == ActionKind::RemapToDelete {
                    RouteTarget::Deleter
                } else {
                    RouteTarget::Materializer
                };

                assert_eq!(route.target, expected, "update={update} delete={delete}");
                assert_eq!(route.selection, RowSelection::NEW_IMAGES);
            }
        }
    }

    #[test]
    fn every_detected_kind_matches_exactly_one_entry() {
        for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
            for update in ALL_KINDS {
                for delete in ALL_KINDS {
                    let rule = rule(update, delete);
                    let matches = ROUTING_TABLE
                        .iter()
                        .filter(|entry| {
                            let consulted = match entry.consulted {
                                ConsultedSide::Update => rule.update.kind,
                                ConsultedSide::Delete => rule.delete.kind,
                            };
                            entry.detected == kind && entry.condition.holds(consulted)
                        })
                        .count();

                    assert_eq!(matches, 1);
                }
            }
        }
    }

    #[test]
    fn routes_pick_the_side_they_apply() {
        let rule = Rule::new(
            ".*",
            Action::new(ActionKind::Mirror).with_table("upserts"),
            Action::new(ActionKind::RemapToDelete).with_table("tombstones"),
        )
        .unwrap();

        let route = route(ChangeKind::Insert, &rule);
        assert_eq!(route.action(&rule).target_table("orders"), "tombstones");
    }
}
