use crate::rules::{Action, Rule, RuleResolver, RuleTable};
use crate::types::{ColumnSchema, ColumnType, TableName, TableSchema};

/// Schema of the database used by test tables.
pub const TEST_SCHEMA: &str = "shop";

/// Builds a table of [`ColumnType::Other`] columns whose primary key is the first column.
pub fn simple_table(name: &str, columns: &[&str]) -> TableSchema {
    table(
        name,
        columns
            .iter()
            .map(|column| ColumnSchema::new(*column, ColumnType::Other))
            .collect(),
        vec![0],
    )
}

/// Builds a table in [`TEST_SCHEMA`].
pub fn table(name: &str, columns: Vec<ColumnSchema>, primary_key: Vec<usize>) -> TableSchema {
    TableSchema::new(TableName::new(TEST_SCHEMA, name), columns, primary_key)
        .expect("test primary key indices must refer to columns")
}

/// Builds a resolver from `(pattern, update, delete)` triples.
pub fn resolver(rules: Vec<(&str, Action, Action)>) -> RuleResolver {
    let rules = rules
        .into_iter()
        .map(|(pattern, update, delete)| Rule::new(pattern, update, delete))
        .collect::<Result<Vec<_>, _>>()
        .expect("test rule patterns must compile");

    RuleResolver::new(RuleTable::new(rules))
}
