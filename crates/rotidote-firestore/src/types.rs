//! Firestore REST API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ReferenceValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Document ID (last segment of the resource name).
    pub fn id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }

    /// Read and convert a single field.
    pub fn field<T: FromFirestoreValue>(&self, key: &str) -> Option<T> {
        self.fields
            .as_ref()
            .and_then(|f| f.get(key))
            .and_then(T::from_firestore_value)
    }
}

// Structured queries (documents:runQuery)

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

/// One line of the runQuery response stream. Lines without a document only
/// report progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub document: Option<Document>,
    pub read_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

impl StructuredQuery {
    /// Query over a single collection directly under the query parent.
    pub fn collection(collection_id: impl Into<String>) -> Self {
        Self {
            from: vec![CollectionSelector {
                collection_id: collection_id.into(),
            }],
            ..Default::default()
        }
    }

    /// Add an equality filter. Successive calls are AND-ed together.
    pub fn where_eq(mut self, field: &str, value: Value) -> Self {
        let next = Filter::eq(field, value);
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(next),
            None => next,
        });
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order_by.push(Order {
            field: FieldReference::new(field),
            direction: Direction::Descending,
        });
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
}

/// A query filter; serializes as either `fieldFilter` or `compositeFilter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    FieldFilter {
        field: FieldReference,
        op: FieldOp,
        value: Value,
    },
    CompositeFilter {
        op: CompositeOp,
        filters: Vec<Filter>,
    },
}

impl Filter {
    pub fn eq(path: &str, value: Value) -> Self {
        Filter::FieldFilter {
            field: FieldReference::new(path),
            op: FieldOp::Equal,
            value,
        }
    }

    /// Combine with another filter, keeping a single flat AND.
    pub fn and(self, other: Filter) -> Self {
        let mut filters = match self {
            Filter::CompositeFilter {
                op: CompositeOp::And,
                filters,
            } => filters,
            single => vec![single],
        };
        filters.push(other);
        Filter::CompositeFilter {
            op: CompositeOp::And,
            filters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldOp {
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompositeOp {
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

impl FieldReference {
    fn new(path: &str) -> Self {
        Self {
            field_path: path.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub field: FieldReference,
    pub direction: Direction,
}

// Value conversions

/// Encode a field for a document write.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

/// Decode a document field; `None` when the wire type doesn't fit.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl ToFirestoreValue for str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_owned())
    }
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        self.as_str().to_firestore_value()
    }
}

impl<T: ToFirestoreValue + ?Sized> ToFirestoreValue for &T {
    fn to_firestore_value(&self) -> Value {
        (**self).to_firestore_value()
    }
}

impl ToFirestoreValue for f64 {
    fn to_firestore_value(&self) -> Value {
        Value::DoubleValue(*self)
    }
}

impl ToFirestoreValue for bool {
    fn to_firestore_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        self.as_ref()
            .map_or(Value::NullValue(()), ToFirestoreValue::to_firestore_value)
    }
}

// Integers travel as decimal strings. Doubles are accepted on read since
// other writers may store counters as plain numbers.
macro_rules! integer_value {
    ($($ty:ty),*) => {$(
        impl ToFirestoreValue for $ty {
            fn to_firestore_value(&self) -> Value {
                Value::IntegerValue(self.to_string())
            }
        }

        impl FromFirestoreValue for $ty {
            fn from_firestore_value(value: &Value) -> Option<Self> {
                match value {
                    Value::IntegerValue(s) => s.parse().ok(),
                    Value::DoubleValue(f) if f.fract() == 0.0 => <$ty>::try_from(*f as i64).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

integer_value!(i64, u32);

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for f64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::DoubleValue(f) => Some(*f),
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc)),
            // Documents written by the mobile client carry epoch millis.
            Value::IntegerValue(s) => s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis),
            _ => None,
        }
    }
}
