//! Sort-preserving insertion for collection stores.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordering key extracted from an entity for a configured sort field.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(String),
    Number(f64),
    Time(DateTime<Utc>),
}

impl SortValue {
    fn cmp_same_kind(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
            // Mismatched kinds keep their relative positions.
            _ => Ordering::Equal,
        }
    }
}

/// Insert `item` into `items` preserving whole-sequence order for the given
/// field and direction. Mirrors the original behavior: append, then stable
/// sort of the full sequence, so equal keys keep arrival order.
pub(crate) fn insert_sorted<T: Entity>(
    items: &mut Vec<T>,
    item: T,
    field: &str,
    direction: SortDirection,
) {
    items.push(item);
    items.sort_by(|a, b| {
        let ordering = match (a.sort_value(field), b.sort_value(field)) {
            (Some(a), Some(b)) => a.cmp_same_kind(&b),
            // Entities without the field keep their positions.
            _ => Ordering::Equal,
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}
