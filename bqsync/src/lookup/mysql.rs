use bqsync_config::shared::LookupConfig;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use secrecy::ExposeSecret;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, MySqlPool, Row, ValueRef};
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::lookup::{LookupClient, LookupResult, QueryParameter};
use crate::types::{Cell, RawValue};

/// Lookup client backed by a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlLookupClient {
    pool: MySqlPool,
}

impl MySqlLookupClient {
    /// Connects to the server described by `config`.
    pub async fn connect(config: &LookupConfig) -> SyncResult<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username);

        if let Some(password) = &config.password {
            options = options.password(password.expose_secret());
        }
        if let Some(database) = &config.database {
            options = options.database(database);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!(
            host = %config.host,
            port = config.port,
            "connected to the lookup database"
        );

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl LookupClient for MySqlLookupClient {
    async fn query(&self, sql: &str, parameters: &[QueryParameter]) -> SyncResult<LookupResult> {
        let statement = bind_named_parameters(sql, parameters)?;
        debug!(sql = %statement.sql, parameters = statement.values.len(), "running lookup query");

        let mut query = sqlx::query(&statement.sql);
        for value in &statement.values {
            query = bind_cell(query, value);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let columns = match rows.first() {
            Some(row) => row
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect(),
            None => Vec::new(),
        };

        let rows = rows
            .iter()
            .map(decode_row)
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(LookupResult { columns, rows })
    }
}

/// A lookup query rewritten to positional placeholders.
#[derive(Debug, Clone, PartialEq)]
struct PositionalStatement {
    sql: String,
    values: Vec<Cell>,
}

/// Rewrites `@name` placeholders to `?` and orders the parameter values accordingly.
///
/// Text inside quotes, backticks and comments is copied untouched, as are `@@` system variables.
/// A placeholder without a matching parameter is a configuration error. Names are matched
/// exactly first and then case-insensitively, like MySQL column names.
fn bind_named_parameters(sql: &str, parameters: &[QueryParameter]) -> SyncResult<PositionalStatement> {
    let chars = sql.char_indices().collect::<Vec<_>>();
    let mut output = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];

        match c {
            '\'' | '"' | '`' => {
                let end = skip_quoted(&chars, i, c);
                output.push_str(slice(sql, &chars, i, end));
                i = end;
            }
            '#' => {
                let end = skip_line(&chars, i);
                output.push_str(slice(sql, &chars, i, end));
                i = end;
            }
            '-' if next_is(&chars, i, '-') => {
                let end = skip_line(&chars, i);
                output.push_str(slice(sql, &chars, i, end));
                i = end;
            }
            '/' if next_is(&chars, i, '*') => {
                let end = skip_block_comment(&chars, i);
                output.push_str(slice(sql, &chars, i, end));
                i = end;
            }
            '@' if next_is(&chars, i, '@') => {
                let end = skip_identifier(&chars, i + 2);
                output.push_str(slice(sql, &chars, i, end));
                i = end;
            }
            '@' => {
                let end = skip_identifier(&chars, i + 1);
                if end == i + 1 {
                    output.push(c);
                    i += 1;
                    continue;
                }

                let name = slice(sql, &chars, i + 1, end);
                let Some(parameter) = find_parameter(parameters, name) else {
                    bail!(
                        ErrorKind::ConfigError,
                        "Lookup query references an unknown parameter",
                        format!("`@{name}` does not name a column of the source table")
                    );
                };

                output.push('?');
                values.push(parameter.value.clone());
                i = end;
            }
            _ => {
                output.push_str(&sql[start..start + c.len_utf8()]);
                i += 1;
            }
        }
    }

    Ok(PositionalStatement {
        sql: output,
        values,
    })
}

fn find_parameter<'a>(parameters: &'a [QueryParameter], name: &str) -> Option<&'a QueryParameter> {
    parameters
        .iter()
        .find(|parameter| parameter.name == name)
        .or_else(|| {
            parameters
                .iter()
                .find(|parameter| parameter.name.eq_ignore_ascii_case(name))
        })
}

/// Returns the source text between two char positions.
fn slice<'a>(sql: &'a str, chars: &[(usize, char)], from: usize, to: usize) -> &'a str {
    let start = chars.get(from).map_or(sql.len(), |(offset, _)| *offset);
    let end = chars.get(to).map_or(sql.len(), |(offset, _)| *offset);
    &sql[start..end]
}

fn next_is(chars: &[(usize, char)], i: usize, expected: char) -> bool {
    chars.get(i + 1).is_some_and(|(_, c)| *c == expected)
}

fn skip_quoted(chars: &[(usize, char)], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i].1;
        if c == '\\' && quote != '`' {
            i += 2;
            continue;
        }
        if c == quote {
            // A doubled quote is an escaped quote.
            if next_is(chars, i, quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn skip_line(chars: &[(usize, char)], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|(_, c)| *c == '\n')
        .map_or(chars.len(), |offset| start + offset)
}

fn skip_block_comment(chars: &[(usize, char)], start: usize) -> usize {
    let mut i = start + 2;
    while i < chars.len() {
        if chars[i].1 == '*' && next_is(chars, i, '/') {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

fn skip_identifier(chars: &[(usize, char)], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
        i += 1;
    }
    i
}

fn bind_cell<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Cell,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Cell::Null => query.bind(Option::<String>::None),
        Cell::I64(value) => query.bind(*value),
        Cell::U64(value) => query.bind(*value),
        Cell::F64(value) => query.bind(*value),
        Cell::Numeric(value) | Cell::String(value) => query.bind(value.clone()),
        Cell::Bytes(value) => query.bind(value.clone()),
    }
}

fn decode_row(row: &MySqlRow) -> SyncResult<Vec<RawValue>> {
    (0..row.columns().len())
        .map(|index| decode_value(row, index))
        .collect()
}

/// Decodes one result value, trying the Rust types the driver can produce for it.
fn decode_value(row: &MySqlRow, index: usize) -> SyncResult<RawValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(RawValue::Null);
    }

    if let Ok(value) = row.try_get::<i64, _>(index) {
        return Ok(RawValue::Int(value));
    }
    if let Ok(value) = row.try_get::<u64, _>(index) {
        return Ok(RawValue::UInt(value));
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return Ok(RawValue::Float(value));
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return Ok(RawValue::String(value));
    }
    if let Ok(value) = row.try_get::<DateTime<Utc>, _>(index) {
        return Ok(RawValue::String(
            value.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ));
    }
    if let Ok(value) = row.try_get::<NaiveDateTime, _>(index) {
        return Ok(RawValue::String(
            value.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        ));
    }
    if let Ok(value) = row.try_get::<NaiveDate, _>(index) {
        return Ok(RawValue::String(value.format("%Y-%m-%d").to_string()));
    }
    if let Ok(value) = row.try_get::<NaiveTime, _>(index) {
        return Ok(RawValue::String(value.format("%H:%M:%S%.f").to_string()));
    }

    // Decimals, bit strings and blobs arrive as raw bytes.
    Ok(RawValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> Vec<QueryParameter> {
        vec![
            QueryParameter::new("id", Cell::I64(7)),
            QueryParameter::new("Name", Cell::from("x")),
        ]
    }

    #[test]
    fn rewrites_placeholders_in_order_of_appearance() {
        let statement = bind_named_parameters(
            "SELECT * FROM orders WHERE id = @id AND name = @name OR parent = @id",
            &parameters(),
        )
        .unwrap();

        assert_eq!(
            statement.sql,
            "SELECT * FROM orders WHERE id = ? AND name = ? OR parent = ?"
        );
        assert_eq!(
            statement.values,
            vec![Cell::I64(7), Cell::from("x"), Cell::I64(7)]
        );
    }

    #[test]
    fn leaves_quoted_text_comments_and_system_variables_alone() {
        let sql = "SELECT '@id', \"it''s @id\", `@id`, @@session.time_zone /* @id */ FROM t -- @id\nWHERE id = @id";
        let statement = bind_named_parameters(sql, &parameters()).unwrap();

        assert_eq!(
            statement.sql,
            "SELECT '@id', \"it''s @id\", `@id`, @@session.time_zone /* @id */ FROM t -- @id\nWHERE id = ?"
        );
        assert_eq!(statement.values, vec![Cell::I64(7)]);
    }

    #[test]
    fn unknown_placeholder_is_a_configuration_error() {
        let err = bind_named_parameters("SELECT @missing", &parameters()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn lone_at_sign_is_kept() {
        let statement = bind_named_parameters("SELECT 'a' @ 1", &parameters()).unwrap();
        assert_eq!(statement.sql, "SELECT 'a' @ 1");
        assert!(statement.values.is_empty());
    }
}
