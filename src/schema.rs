//! Field registry: the set of protocol field names the dissection engine
//! exposes, with their value kinds.
//!
//! The engine only ever consumes the [`FieldResolver`] abstraction; the
//! concrete [`Schema`] here is what hosts and tests typically hand it.

use crate::types::ValueKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable index of a field within its schema.
pub type FieldId = usize;

/// What the registry knows about one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub kind: ValueKind,
}

/// Name resolution contract supplied by the protocol-dissection subsystem.
pub trait FieldResolver {
    fn field(&self, name: &str) -> Option<FieldDescriptor>;
}

/// A concrete field registry with stable, sorted field ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    kinds: Vec<ValueKind>,    // index = FieldId
    names: Vec<String>,       // index = FieldId
    ids: HashMap<String, FieldId>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.ids.get(name).copied()
    }

    pub fn field_name(&self, id: FieldId) -> Option<&str> {
        self.names.get(id).map(|s| s.as_str())
    }

    pub fn field_kind(&self, id: FieldId) -> Option<ValueKind> {
        self.kinds.get(id).copied()
    }

    pub fn num_fields(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldDescriptor)> + '_ {
        self.names.iter().enumerate().map(|(id, name)| {
            (
                name.as_str(),
                FieldDescriptor {
                    id,
                    kind: self.kinds[id],
                },
            )
        })
    }
}

impl FieldResolver for Schema {
    fn field(&self, name: &str) -> Option<FieldDescriptor> {
        let id = self.field_id(name)?;
        Some(FieldDescriptor {
            id,
            kind: self.kinds[id],
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct SchemaBuilder {
    fields: HashMap<String, ValueKind>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    /// Field ids are assigned in sorted-name order so they are stable
    /// across rebuilds of the same field set.
    pub fn build(self) -> Schema {
        let mut sorted: Vec<_> = self.fields.into_iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let mut names = Vec::with_capacity(sorted.len());
        let mut kinds = Vec::with_capacity(sorted.len());
        let mut ids = HashMap::with_capacity(sorted.len());
        for (name, kind) in sorted {
            ids.insert(name.clone(), names.len());
            names.push(name);
            kinds.push(kind);
        }
        Schema { kinds, names, ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_registration_and_lookup() {
        let schema = Schema::builder()
            .field("tcp.port", ValueKind::UInt)
            .field("http.request.method", ValueKind::Str)
            .build();
        let port = schema.field("tcp.port").unwrap();
        assert_eq!(port.kind, ValueKind::UInt);
        assert_eq!(schema.field_name(port.id), Some("tcp.port"));
        assert!(schema.field("bogus.field").is_none());
    }

    #[test]
    fn test_ids_are_stable_across_rebuilds() {
        let a = Schema::builder()
            .field("b", ValueKind::Int)
            .field("a", ValueKind::Int)
            .build();
        let b = Schema::builder()
            .field("a", ValueKind::Int)
            .field("b", ValueKind::Int)
            .build();
        assert_eq!(a.field_id("a"), b.field_id("a"));
        assert_eq!(a.field_id("b"), b.field_id("b"));
    }

    #[test]
    fn test_last_registration_wins() {
        let schema = Schema::builder()
            .field("f", ValueKind::Int)
            .field("f", ValueKind::Str)
            .build();
        assert_eq!(schema.field("f").unwrap().kind, ValueKind::Str);
        assert_eq!(schema.num_fields(), 1);
    }

    #[test]
    fn test_serialization_round_trip() {
        let schema = Schema::builder()
            .field("ip.addr", ValueKind::Ipv4)
            .field("eth.src", ValueKind::Ether)
            .build();
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back.field("ip.addr"), schema.field("ip.addr"));
        assert_eq!(back.num_fields(), 2);
    }
}
