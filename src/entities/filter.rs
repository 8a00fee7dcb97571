//! Filter, sort and search semantics for JSON documents.
//!
//! Matching follows PostgreSQL `jsonb @>` containment so the in-memory store
//! and the SQL store agree on which records a `where` object selects.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::{
    error::EntityError,
    store::{Record, Search, Sort, SortOrder, CREATED_ON_FIELD, ID_FIELD, SAVED_ON_FIELD},
};

/// `true` when `actual` contains `expected` (jsonb containment).
pub fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|found| contains(found, value))),
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|value| actual.iter().any(|found| contains(found, value))),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

/// Apply a `where` object to a record; `id` compares against the record id.
pub fn matches(record: &Record, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| {
        if key == ID_FIELD {
            return expected
                .as_str()
                .is_some_and(|id| id.eq_ignore_ascii_case(&record.id.to_string()));
        }
        record
            .data
            .get(key)
            .is_some_and(|actual| contains(actual, expected))
    })
}

/// Case-insensitive substring search across the configured fields.
pub fn matches_search(record: &Record, search: &Search) -> bool {
    let needle = search.query.trim().to_lowercase();
    if needle.is_empty() || search.fields.is_empty() {
        return true;
    }
    let mut hits = search.fields.iter().map(|field| {
        record
            .data
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|value| value.to_lowercase().contains(&needle))
    });
    match search.operator {
        super::store::SearchOperator::Or => hits.any(|hit| hit),
        super::store::SearchOperator::And => hits.all(|hit| hit),
    }
}

/// Order two records by one sort key. Missing values sort last ascending.
pub fn compare(a: &Record, b: &Record, sort: &[Sort]) -> Ordering {
    for Sort { field, order } in sort {
        let ordering = match field.as_str() {
            ID_FIELD => a.id.cmp(&b.id),
            CREATED_ON_FIELD => a.created_on.cmp(&b.created_on),
            SAVED_ON_FIELD => a.saved_on.cmp(&b.saved_on),
            _ => compare_optional(a.data.get(field), b.data.get(field)),
        };
        let ordering = match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id.cmp(&b.id)
}

fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// jsonb ordering: Object > Array > Boolean > Number > String > Null
const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Parse a `{field: 1 | -1}` sort object.
///
/// # Errors
/// Returns `INVALID_ATTRIBUTES` for non-object input or unknown directions.
pub fn parse_sort(value: &Value) -> Result<Vec<Sort>, EntityError> {
    let Some(object) = value.as_object() else {
        return Err(EntityError::invalid(
            "sort",
            "Sort must be an object of field directions.",
        ));
    };
    object
        .iter()
        .map(|(field, direction)| {
            let order = match direction {
                Value::Number(n) if n.as_i64() == Some(1) => SortOrder::Asc,
                Value::Number(n) if n.as_i64() == Some(-1) => SortOrder::Desc,
                Value::String(s) if s.eq_ignore_ascii_case("asc") => SortOrder::Asc,
                Value::String(s) if s.eq_ignore_ascii_case("desc") => SortOrder::Desc,
                _ => {
                    return Err(EntityError::invalid(
                        "sort",
                        format!("Invalid sort direction for \"{field}\"."),
                    ))
                }
            };
            Ok(Sort {
                field: field.clone(),
                order,
            })
        })
        .collect()
}

/// Parse the string form of a sort: a JSON object, or a field name with an
/// optional `-` prefix for descending order.
///
/// # Errors
/// Returns `INVALID_ATTRIBUTES` when the string is neither form.
pub fn parse_sort_str(sort: &str) -> Result<Vec<Sort>, EntityError> {
    let sort = sort.trim();
    if sort.is_empty() {
        return Ok(Vec::new());
    }
    if sort.starts_with('{') {
        let value: Value = serde_json::from_str(sort)
            .map_err(|_| EntityError::invalid("sort", "Sort is not valid JSON."))?;
        return parse_sort(&value);
    }
    match sort.strip_prefix('-') {
        Some(field) if !field.is_empty() => Ok(vec![Sort::desc(field)]),
        Some(_) => Err(EntityError::invalid("sort", "Sort field is required.")),
        None => Ok(vec![Sort::asc(sort)]),
    }
}

/// Accept a `where` argument, which must be a JSON object.
///
/// # Errors
/// Returns `INVALID_ATTRIBUTES` when the value is not an object.
pub fn parse_where(value: Value) -> Result<Map<String, Value>, EntityError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(EntityError::invalid("where", "Where must be an object.")),
    }
}
