//! Per-record field trees: what a compiled filter is evaluated against.
//!
//! The evaluator only consumes the [`FieldTree`] lookup contract; the
//! concrete [`Record`] here is the form hosts and tests typically build.
//! A field may occur any number of times in one record (one entry per
//! protocol layer repetition).

use crate::schema::{FieldId, Schema};
use crate::types::FieldValue;
use crate::{FilterError, Location, Result};
use std::sync::Arc;

/// Lookup contract supplied by the dissection engine: occurrences of a
/// resolved field within one decoded record.
pub trait FieldTree {
    /// Number of occurrences of the field in this record.
    fn count(&self, field: FieldId) -> usize;
    /// The nth occurrence, 0-based.
    fn value(&self, field: FieldId, occurrence: usize) -> Option<&FieldValue>;
}

/// A concrete field tree backed by the schema's field ids.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Vec<FieldValue>>,
}

impl Record {
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = vec![Vec::new(); schema.num_fields()];
        Self { schema, values }
    }

    fn slot(&self, name: &str, value: &FieldValue) -> Result<FieldId> {
        let field = self
            .schema
            .field_id(name)
            .ok_or_else(|| FilterError::UnknownIdentifier {
                loc: Location::EMPTY,
                name: name.to_string(),
            })?;
        let expected = self.schema.field_kind(field).expect("id from this schema");
        if value.kind() != expected {
            return Err(FilterError::TypeMismatch {
                loc: Location::EMPTY,
                message: format!(
                    "field '{}' expects {}, got {}",
                    name,
                    expected,
                    value.kind()
                ),
            });
        }
        Ok(field)
    }

    /// Replace all occurrences of a field with one value.
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let field = self.slot(name, &value)?;
        self.values[field] = vec![value];
        Ok(())
    }

    /// Append one occurrence of a repeated field.
    pub fn push(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let field = self.slot(name, &value)?;
        self.values[field].push(value);
        Ok(())
    }

    /// Drop all values, keeping the schema; for reuse across records.
    pub fn clear(&mut self) {
        for v in &mut self.values {
            v.clear();
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn occurrences(&self, name: &str) -> &[FieldValue] {
        self.schema
            .field_id(name)
            .map(|id| self.values[id].as_slice())
            .unwrap_or(&[])
    }
}

impl FieldTree for Record {
    fn count(&self, field: FieldId) -> usize {
        self.values.get(field).map_or(0, |v| v.len())
    }

    fn value(&self, field: FieldId, occurrence: usize) -> Option<&FieldValue> {
        self.values.get(field)?.get(occurrence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueKind;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .field("tcp.port", ValueKind::UInt)
                .field("ip.addr", ValueKind::Ipv4)
                .field("http.host", ValueKind::Str)
                .build(),
        )
    }

    #[test]
    fn test_set_and_lookup() {
        let schema = schema();
        let mut rec = Record::new(schema.clone());
        rec.set("tcp.port", FieldValue::UInt(80)).unwrap();
        let id = schema.field_id("tcp.port").unwrap();
        assert_eq!(rec.count(id), 1);
        assert_eq!(rec.value(id, 0), Some(&FieldValue::UInt(80)));
        assert_eq!(rec.value(id, 1), None);
    }

    #[test]
    fn test_repeated_field_occurrences() {
        let schema = schema();
        let mut rec = Record::new(schema.clone());
        rec.push("ip.addr", FieldValue::Ipv4("10.0.0.1".parse().unwrap()))
            .unwrap();
        rec.push("ip.addr", FieldValue::Ipv4("10.0.0.2".parse().unwrap()))
            .unwrap();
        let id = schema.field_id("ip.addr").unwrap();
        assert_eq!(rec.count(id), 2);
    }

    #[test]
    fn test_kind_checked_on_set() {
        let mut rec = Record::new(schema());
        let err = rec
            .set("tcp.port", FieldValue::Str("eighty".into()))
            .unwrap_err();
        assert!(matches!(err, FilterError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut rec = Record::new(schema());
        let err = rec.set("nope", FieldValue::UInt(1)).unwrap_err();
        assert!(matches!(err, FilterError::UnknownIdentifier { .. }));
    }

    #[test]
    fn test_absent_field_counts_zero() {
        let schema = schema();
        let rec = Record::new(schema.clone());
        assert_eq!(rec.count(schema.field_id("tcp.port").unwrap()), 0);
    }

    #[test]
    fn test_clear_keeps_schema() {
        let mut rec = Record::new(schema());
        rec.set("http.host", FieldValue::Str("example.com".into()))
            .unwrap();
        rec.clear();
        assert!(rec.occurrences("http.host").is_empty());
        rec.set("http.host", FieldValue::Str("other.net".into()))
            .unwrap();
        assert_eq!(rec.occurrences("http.host").len(), 1);
    }
}
