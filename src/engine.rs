//! The engine facade: one object tying the field registry and the
//! function namespace to the parse → check → compile → evaluate pipeline.
//!
//! Constructing an engine freezes its function registry, so the "no
//! registration after the first compilation" invariant holds by
//! construction: plugins run during startup, the engine is built, and
//! from then on the namespace is read-only.

use crate::compiler::Compiler;
use crate::filter::CompiledFilter;
use crate::functions::{register_builtins, FunctionRegistry};
use crate::parser::Parser;
use crate::plugin::PluginRegistry;
use crate::record::{FieldTree, Record};
use crate::schema::Schema;
use crate::semantic::{CheckedExpr, SemanticAnalyzer};
use crate::{ast::Expr, Result};
use std::sync::Arc;

pub struct FilterEngine {
    schema: Arc<Schema>,
    functions: Arc<FunctionRegistry>,
}

impl FilterEngine {
    /// Engine over a schema with the stock function set.
    pub fn new(schema: Schema) -> Self {
        let mut functions = FunctionRegistry::new();
        register_builtins(&mut functions).expect("fresh registry accepts builtins");
        Self::with_functions(schema, functions)
    }

    /// Engine over a schema and a caller-assembled function namespace.
    /// The registry is frozen here; register everything first.
    pub fn with_functions(schema: Schema, mut functions: FunctionRegistry) -> Self {
        functions.freeze();
        Self {
            schema: Arc::new(schema),
            functions: Arc::new(functions),
        }
    }

    /// Engine with the stock functions plus everything the given plugins
    /// register during their init phase.
    pub fn with_plugins(schema: Schema, plugins: &mut PluginRegistry) -> Self {
        let mut functions = FunctionRegistry::new();
        register_builtins(&mut functions).expect("fresh registry accepts builtins");
        plugins.init_all(&mut functions);
        Self::with_functions(schema, functions)
    }

    /// Parse filter text into an AST. No name resolution happens here.
    pub fn parse_filter(&self, input: &str) -> Result<Expr> {
        Parser::parse(input)
    }

    /// Resolve and type-check a parsed expression.
    pub fn check(&self, expr: &Expr) -> Result<CheckedExpr> {
        SemanticAnalyzer::new(self.schema.as_ref(), self.functions.as_ref()).check(expr)
    }

    /// Full pipeline: text to an immutable, shareable filter object.
    pub fn parse_and_compile(&self, input: &str) -> Result<CompiledFilter> {
        let expr = self.parse_filter(input)?;
        let checked = self.check(&expr)?;
        Compiler::compile(&checked, self.functions.clone(), input)
    }

    /// Evaluate a compiled filter against one record's field tree.
    pub fn execute<T: FieldTree + ?Sized>(&self, filter: &CompiledFilter, record: &T) -> bool {
        filter.matches(record)
    }

    /// A fresh, empty record bound to this engine's schema.
    pub fn new_record(&self) -> Record {
        Record::new(self.schema.clone())
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldValue, ValueKind};

    fn engine() -> FilterEngine {
        FilterEngine::new(
            Schema::builder()
                .field("tcp.port", ValueKind::UInt)
                .field("http.request.method", ValueKind::Str)
                .build(),
        )
    }

    #[test]
    fn test_parse_compile_execute() {
        let engine = engine();
        let filter = engine.parse_and_compile("tcp.port == 80").unwrap();
        let mut rec = engine.new_record();
        rec.set("tcp.port", FieldValue::UInt(80)).unwrap();
        assert!(engine.execute(&filter, &rec));
    }

    #[test]
    fn test_functions_frozen_after_construction() {
        let engine = engine();
        assert!(engine.functions().is_frozen());
    }

    #[test]
    fn test_compiled_filter_shared_across_threads() {
        let engine = engine();
        let filter = engine
            .parse_and_compile("tcp.port == 80")
            .unwrap()
            .shared();
        let schema = engine.schema().clone();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let filter = filter.clone();
                let schema = schema.clone();
                std::thread::spawn(move || {
                    let mut rec = Record::new(schema);
                    rec.set("tcp.port", FieldValue::UInt(if i % 2 == 0 { 80 } else { 443 }))
                        .unwrap();
                    filter.matches(&rec)
                })
            })
            .collect();
        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, vec![true, false, true, false]);
    }

    #[test]
    fn test_errors_carry_locations_through_the_facade() {
        let engine = engine();
        let err = engine.parse_and_compile("tcp.port == ").unwrap_err();
        assert!(matches!(err, crate::FilterError::Syntax { .. }));
        let err = engine.parse_and_compile("nope == 1").unwrap_err();
        assert_eq!(err.location().start, 0);
        assert_eq!(err.location().len, 4);
    }
}
