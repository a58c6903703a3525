use crate::db::error::{DbError, DbResult};

/// Encode a handle list as a JSON array for use with `json_each(?)`.
///
/// Binding one JSON value keeps the statement shape fixed no matter how many
/// handles a worker reports.
pub fn handles_json(handles: &[String]) -> DbResult<String> {
    Ok(serde_json::to_string(handles)?)
}

/// Encode a list of integer IDs as a JSON array for use with `json_each(?)`.
pub fn ids_json(ids: &[i64]) -> DbResult<String> {
    Ok(serde_json::to_string(ids)?)
}

/// Parse a text column into one of the model enums.
pub fn parse_column<T>(value: &str) -> DbResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(DbError::Internal)
}
