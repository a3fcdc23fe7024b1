//! Filter functions: the callable namespace available inside filter
//! expressions, populated by builtins and by plugins at startup.
//!
//! Functions receive the full occurrence list each argument expression
//! produced, so `count(ip.addr)` sees every occurrence and `upper(x)` maps
//! over all of them.

use crate::types::{FieldValue, ValueKind};
use crate::{FilterError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Stable index of a function within its registry, used by compiled
/// filters for dispatch.
pub type FuncId = usize;

/// Declared shape of a filter function, checked during semantic analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSignature {
    pub min_args: usize,
    /// `None` means variadic.
    pub max_args: Option<usize>,
    pub return_kind: ValueKind,
}

impl FunctionSignature {
    pub fn fixed(args: usize, return_kind: ValueKind) -> Self {
        Self {
            min_args: args,
            max_args: Some(args),
            return_kind,
        }
    }

    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min_args && self.max_args.map_or(true, |max| argc <= max)
    }
}

/// A callable filter function. Implementations are pure: read the
/// arguments, return values, touch nothing else. Each argument slice holds
/// one entry per occurrence of the argument expression; the returned list
/// is the result's occurrence list (empty = no value, the comparison
/// consuming it will not match).
pub trait FilterFunction: Send + Sync {
    fn call(&self, args: &[&[FieldValue]]) -> Vec<FieldValue>;
}

struct Registered {
    name: String,
    signature: FunctionSignature,
    imp: Arc<dyn FilterFunction>,
}

/// The function namespace. Frozen before the first compilation; late
/// registration is rejected.
#[derive(Default)]
pub struct FunctionRegistry {
    funcs: Vec<Registered>,
    ids: HashMap<String, FuncId>,
    frozen: bool,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Re-registering a name replaces the
    /// implementation but keeps its id.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        signature: FunctionSignature,
        func: F,
    ) -> Result<()>
    where
        F: FilterFunction + 'static,
    {
        let name = name.into();
        if self.frozen {
            return Err(FilterError::Plugin {
                name: name.clone(),
                message: "function registration after the registry was frozen".into(),
            });
        }
        let entry = Registered {
            name: name.clone(),
            signature,
            imp: Arc::new(func),
        };
        match self.ids.get(&name) {
            Some(&id) => self.funcs[id] = entry,
            None => {
                self.ids.insert(name, self.funcs.len());
                self.funcs.push(entry);
            }
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<(FuncId, FunctionSignature)> {
        let id = *self.ids.get(name)?;
        Some((id, self.funcs[id].signature))
    }

    pub fn implementation(&self, id: FuncId) -> Option<&Arc<dyn FilterFunction>> {
        self.funcs.get(id).map(|r| &r.imp)
    }

    pub fn name(&self, id: FuncId) -> Option<&str> {
        self.funcs.get(id).map(|r| r.name.as_str())
    }

    /// Transition to read-only. Called once when the first filter is
    /// compiled; irreversible.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

macro_rules! builtin_functions {
    ($( $name:ident: $func_name:expr, $sig:expr, $args:ident => $body:block ),* $(,)?) => {
        $(
            pub struct $name;
            impl FilterFunction for $name {
                fn call(&self, $args: &[&[FieldValue]]) -> Vec<FieldValue> $body
            }
        )*
        /// Register the stock function set.
        pub fn register_builtins(reg: &mut FunctionRegistry) -> Result<()> {
            $(reg.register($func_name, $sig, $name)?;)*
            Ok(())
        }
    };
}

builtin_functions! {
    LenFunction: "len", FunctionSignature::fixed(1, ValueKind::UInt), args => {
        args.first().map_or_else(Vec::new, |vals| {
            vals.iter()
                .filter_map(|v| v.as_bytes().map(|b| FieldValue::UInt(b.len() as u64)))
                .collect()
        })
    },
    CountFunction: "count", FunctionSignature::fixed(1, ValueKind::UInt), args => {
        args.first()
            .map_or_else(Vec::new, |vals| vec![FieldValue::UInt(vals.len() as u64)])
    },
    UpperFunction: "upper", FunctionSignature::fixed(1, ValueKind::Str), args => {
        args.first().map_or_else(Vec::new, |vals| {
            vals.iter()
                .filter_map(|v| match v {
                    FieldValue::Str(s) => Some(FieldValue::Str(s.to_uppercase())),
                    FieldValue::Bytes(b) => Some(FieldValue::Bytes(b.to_ascii_uppercase())),
                    _ => None,
                })
                .collect()
        })
    },
    LowerFunction: "lower", FunctionSignature::fixed(1, ValueKind::Str), args => {
        args.first().map_or_else(Vec::new, |vals| {
            vals.iter()
                .filter_map(|v| match v {
                    FieldValue::Str(s) => Some(FieldValue::Str(s.to_lowercase())),
                    FieldValue::Bytes(b) => Some(FieldValue::Bytes(b.to_ascii_lowercase())),
                    _ => None,
                })
                .collect()
        })
    },
    AbsFunction: "abs", FunctionSignature::fixed(1, ValueKind::Int), args => {
        args.first().map_or_else(Vec::new, |vals| {
            vals.iter()
                .filter_map(|v| match v {
                    FieldValue::Int(i) => Some(FieldValue::Int(i.wrapping_abs())),
                    FieldValue::Float(f) => Some(FieldValue::Float(f.abs())),
                    FieldValue::UInt(u) => Some(FieldValue::UInt(*u)),
                    _ => None,
                })
                .collect()
        })
    },
    MinFunction: "min", FunctionSignature { min_args: 1, max_args: None, return_kind: ValueKind::Int }, args => {
        fold_ordered(args, std::cmp::Ordering::Less)
    },
    MaxFunction: "max", FunctionSignature { min_args: 1, max_args: None, return_kind: ValueKind::Int }, args => {
        fold_ordered(args, std::cmp::Ordering::Greater)
    },
}

fn fold_ordered(args: &[&[FieldValue]], keep: std::cmp::Ordering) -> Vec<FieldValue> {
    let mut best: Option<FieldValue> = None;
    for vals in args {
        for v in *vals {
            best = match best.take() {
                None => Some(v.clone()),
                Some(b) => {
                    if v.ord_value(&b) == Some(keep) {
                        Some(v.clone())
                    } else {
                        Some(b)
                    }
                }
            };
        }
    }
    best.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let mut reg = FunctionRegistry::new();
        register_builtins(&mut reg).unwrap();
        let (id, sig) = reg.resolve("len").unwrap();
        assert_eq!(sig, FunctionSignature::fixed(1, ValueKind::UInt));
        assert_eq!(reg.name(id), Some("len"));
        assert!(reg.resolve("nope").is_none());
    }

    #[test]
    fn test_frozen_registry_rejects_registration() {
        let mut reg = FunctionRegistry::new();
        reg.freeze();
        let err = reg
            .register("late", FunctionSignature::fixed(1, ValueKind::Bool), LenFunction)
            .unwrap_err();
        assert!(matches!(err, FilterError::Plugin { .. }));
    }

    #[test]
    fn test_len_over_occurrences() {
        let vals = vec![
            FieldValue::Str("ab".into()),
            FieldValue::Bytes(vec![1, 2, 3]),
        ];
        let out = LenFunction.call(&[&vals]);
        assert_eq!(out, vec![FieldValue::UInt(2), FieldValue::UInt(3)]);
    }

    #[test]
    fn test_count() {
        let vals = vec![FieldValue::Int(1), FieldValue::Int(2)];
        assert_eq!(CountFunction.call(&[&vals]), vec![FieldValue::UInt(2)]);
        assert_eq!(CountFunction.call(&[&[][..]]), vec![FieldValue::UInt(0)]);
    }

    #[test]
    fn test_upper_lower() {
        let vals = vec![FieldValue::Str("Get".into())];
        assert_eq!(
            UpperFunction.call(&[&vals]),
            vec![FieldValue::Str("GET".into())]
        );
        assert_eq!(
            LowerFunction.call(&[&vals]),
            vec![FieldValue::Str("get".into())]
        );
    }

    #[test]
    fn test_min_max_across_args() {
        let a = vec![FieldValue::UInt(80)];
        let b = vec![FieldValue::UInt(443)];
        assert_eq!(
            MaxFunction.call(&[&a, &b]),
            vec![FieldValue::UInt(443)]
        );
        assert_eq!(MinFunction.call(&[&a, &b]), vec![FieldValue::UInt(80)]);
    }

    #[test]
    fn test_signature_arity() {
        let sig = FunctionSignature::fixed(1, ValueKind::Bool);
        assert!(sig.accepts(1));
        assert!(!sig.accepts(2));
        let variadic = FunctionSignature {
            min_args: 1,
            max_args: None,
            return_kind: ValueKind::Int,
        };
        assert!(variadic.accepts(5));
        assert!(!variadic.accepts(0));
    }
}
