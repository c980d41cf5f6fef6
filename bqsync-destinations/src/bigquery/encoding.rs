use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use bqsync::bail;
use bqsync::error::{ErrorKind, SyncResult};
use bqsync::types::{Cell, DeletePredicate, TargetRow};
use gcp_bigquery_client::model::query_parameter::QueryParameter;
use gcp_bigquery_client::model::query_parameter_type::QueryParameterType;
use gcp_bigquery_client::model::query_parameter_value::QueryParameterValue;
use serde_json::{Map, Number, Value};

use crate::bigquery::client::sanitize_identifier;

/// Prefix of the named parameters bound to primary key values in delete statements.
const PK_PARAMETER_PREFIX: &str = "pk_";

/// Converts a [`Cell`] into the JSON value expected by `tabledata.insertAll`.
///
/// Bytes are base64 encoded and numerics are sent as strings, which is how BigQuery reads
/// `BYTES` and `NUMERIC` columns from JSON. Non finite floats use the textual forms BigQuery
/// accepts for `FLOAT64`.
pub fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::I64(value) => Value::Number((*value).into()),
        Cell::U64(value) => Value::Number((*value).into()),
        Cell::F64(value) => match Number::from_f64(*value) {
            Some(number) => Value::Number(number),
            None if value.is_nan() => Value::String("NaN".to_string()),
            None if value.is_sign_negative() => Value::String("-Infinity".to_string()),
            None => Value::String("Infinity".to_string()),
        },
        Cell::Numeric(value) => Value::String(value.clone()),
        Cell::String(value) => Value::String(value.clone()),
        Cell::Bytes(value) => Value::String(BASE64_STANDARD.encode(value)),
    }
}

/// Converts a [`TargetRow`] into a JSON object keyed by column name.
pub fn target_row_to_json(row: &TargetRow) -> Value {
    let object = row
        .values
        .iter()
        .map(|(column, cell)| (column.clone(), cell_to_json(cell)))
        .collect::<Map<String, Value>>();

    Value::Object(object)
}

/// Builds a named query parameter carrying `cell`.
///
/// Unsigned values above [`i64::MAX`] do not fit `INT64` and are sent as `NUMERIC`. A null cell is
/// bound as an untyped `STRING` without value, which BigQuery reads as `NULL`.
pub fn cell_to_query_parameter(name: &str, cell: &Cell) -> QueryParameter {
    let (parameter_type, value) = match cell {
        Cell::Null => ("STRING", None),
        Cell::I64(value) => ("INT64", Some(value.to_string())),
        Cell::U64(value) if i64::try_from(*value).is_ok() => ("INT64", Some(value.to_string())),
        Cell::U64(value) => ("NUMERIC", Some(value.to_string())),
        Cell::F64(value) => ("FLOAT64", Some(value.to_string())),
        Cell::Numeric(value) => ("NUMERIC", Some(value.clone())),
        Cell::String(value) => ("STRING", Some(value.clone())),
        Cell::Bytes(value) => ("BYTES", Some(BASE64_STANDARD.encode(value))),
    };

    QueryParameter {
        name: Some(name.to_string()),
        parameter_type: Some(QueryParameterType {
            array_type: None,
            struct_types: None,
            r#type: parameter_type.to_string(),
        }),
        parameter_value: Some(QueryParameterValue {
            array_values: None,
            struct_values: None,
            value,
        }),
    }
}

/// Builds the parameterised `DELETE` statement for `predicate` against `full_table_name`.
///
/// `full_table_name` must already be quoted. Every primary key column becomes an equality on a
/// named parameter (`@pk_0`, `@pk_1`, ...), so values never end up in the statement text.
pub fn build_delete_statement(
    full_table_name: &str,
    predicate: &DeletePredicate,
) -> SyncResult<(String, Vec<QueryParameter>)> {
    if predicate.columns.is_empty() {
        bail!(
            ErrorKind::InvalidData,
            "Delete predicate without columns",
            format!(
                "refusing to delete every row of `{}` without a primary key condition",
                predicate.table
            )
        );
    }

    let mut conditions = Vec::with_capacity(predicate.columns.len());
    let mut parameters = Vec::with_capacity(predicate.columns.len());

    for (index, (column, cell)) in predicate.columns.iter().enumerate() {
        let column = sanitize_identifier(column, "BigQuery column name")?;
        let parameter_name = format!("{PK_PARAMETER_PREFIX}{index}");

        conditions.push(format!("`{column}` = @{parameter_name}"));
        parameters.push(cell_to_query_parameter(&parameter_name, cell));
    }

    let statement = format!(
        "DELETE FROM {full_table_name} WHERE {}",
        conditions.join(" AND ")
    );

    Ok((statement, parameters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bqsync::types::{DedupKey, LogPosition};
    use serde_json::json;

    fn parameter_type(parameter: &QueryParameter) -> &str {
        &parameter.parameter_type.as_ref().unwrap().r#type
    }

    fn parameter_value(parameter: &QueryParameter) -> Option<&str> {
        parameter.parameter_value.as_ref().unwrap().value.as_deref()
    }

    #[test]
    fn encodes_cells_as_insert_all_json() {
        assert_eq!(cell_to_json(&Cell::Null), Value::Null);
        assert_eq!(cell_to_json(&Cell::I64(-4)), json!(-4));
        assert_eq!(cell_to_json(&Cell::U64(u64::MAX)), json!(u64::MAX));
        assert_eq!(cell_to_json(&Cell::F64(1.5)), json!(1.5));
        assert_eq!(cell_to_json(&Cell::F64(f64::NAN)), json!("NaN"));
        assert_eq!(
            cell_to_json(&Cell::F64(f64::NEG_INFINITY)),
            json!("-Infinity")
        );
        assert_eq!(
            cell_to_json(&Cell::Numeric("12.50".to_string())),
            json!("12.50")
        );
        assert_eq!(cell_to_json(&Cell::Bytes(b"hi".to_vec())), json!("aGk="));
    }

    #[test]
    fn encodes_target_rows_as_objects() {
        let row = TargetRow {
            values: vec![
                ("id".to_string(), Cell::I64(7)),
                ("status".to_string(), Cell::String("paid".to_string())),
            ],
            dedup_key: DedupKey::from(&LogPosition::new("mysql-bin.000001", 4)),
            ordinal: 0,
        };

        assert_eq!(target_row_to_json(&row), json!({"id": 7, "status": "paid"}));
    }

    #[test]
    fn large_unsigned_parameters_are_numeric() {
        let small = cell_to_query_parameter("pk_0", &Cell::U64(42));
        let large = cell_to_query_parameter("pk_0", &Cell::U64(u64::MAX));

        assert_eq!(parameter_type(&small), "INT64");
        assert_eq!(parameter_type(&large), "NUMERIC");
        assert_eq!(parameter_value(&large), Some("18446744073709551615"));
    }

    #[test]
    fn null_parameters_have_no_value() {
        let parameter = cell_to_query_parameter("pk_0", &Cell::Null);

        assert_eq!(parameter.name.as_deref(), Some("pk_0"));
        assert_eq!(parameter_value(&parameter), None);
    }

    #[test]
    fn builds_parameterised_delete_statements() {
        let predicate = DeletePredicate {
            table: "order_items".to_string(),
            columns: vec![
                ("order_id".to_string(), Cell::I64(7)),
                ("sku".to_string(), Cell::String("A-1".to_string())),
            ],
        };

        let (statement, parameters) =
            build_delete_statement("`proj.shop.order_items`", &predicate).unwrap();

        assert_eq!(
            statement,
            "DELETE FROM `proj.shop.order_items` WHERE `order_id` = @pk_0 AND `sku` = @pk_1"
        );
        assert_eq!(parameters.len(), 2);
        assert_eq!(parameter_type(&parameters[0]), "INT64");
        assert_eq!(parameter_value(&parameters[1]), Some("A-1"));
    }

    #[test]
    fn escapes_backticks_in_column_names() {
        let predicate = DeletePredicate {
            table: "orders".to_string(),
            columns: vec![("we`ird".to_string(), Cell::I64(1))],
        };

        let (statement, _) = build_delete_statement("`p.d.orders`", &predicate).unwrap();
        assert_eq!(statement, "DELETE FROM `p.d.orders` WHERE `we\\`ird` = @pk_0");
    }

    #[test]
    fn rejects_empty_predicates() {
        let predicate = DeletePredicate {
            table: "orders".to_string(),
            columns: vec![],
        };

        let err = build_delete_statement("`p.d.orders`", &predicate).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
