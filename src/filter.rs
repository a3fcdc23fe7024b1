//! The compiled filter object: a flat instruction sequence plus its
//! constant pool and field table.
//!
//! Immutable after compilation and safe to share across worker threads;
//! every evaluation call keeps its own stack, so one `CompiledFilter`
//! behind an `Arc` serves any number of concurrent evaluations.

use crate::functions::FunctionRegistry;
use crate::ir::{Const, FieldSlot, Instruction};
use crate::record::FieldTree;
use crate::vm;
use std::fmt;
use std::sync::Arc;

pub struct CompiledFilter {
    pub(crate) program: Vec<Instruction>,
    pub(crate) consts: Vec<Const>,
    pub(crate) fields: Vec<FieldSlot>,
    /// Function namespace the program's call indices resolve into.
    pub(crate) functions: Arc<FunctionRegistry>,
    /// The filter text this object was compiled from.
    source: String,
}

impl CompiledFilter {
    pub(crate) fn new(
        program: Vec<Instruction>,
        consts: Vec<Const>,
        fields: Vec<FieldSlot>,
        functions: Arc<FunctionRegistry>,
        source: String,
    ) -> Self {
        Self {
            program,
            consts,
            fields,
            functions,
            source,
        }
    }

    /// Evaluate against one record's field tree. Never fails: absent
    /// fields simply do not match.
    pub fn matches<T: FieldTree + ?Sized>(&self, record: &T) -> bool {
        vm::eval(self, record)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.program
    }

    /// Names of the fields this filter reads, in slot order. Exactly the
    /// references used by the source expression, no extras.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn constants(&self) -> &[Const] {
        &self.consts
    }

    /// Human-readable program listing, one instruction per line.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        use fmt::Write;
        writeln!(out, "; filter: {}", self.source).unwrap();
        for (i, slot) in self.fields.iter().enumerate() {
            write!(out, "; field #{}: {} ({})", i, slot.name, slot.kind).unwrap();
            if let Some(n) = slot.occurrence {
                write!(out, " occurrence {}", n).unwrap();
            }
            if let Some(s) = slot.slice {
                write!(out, " slice {}", s).unwrap();
            }
            out.push('\n');
        }
        for (i, c) in self.consts.iter().enumerate() {
            writeln!(out, "; const ${}: {}", i, c).unwrap();
        }
        for (pc, instr) in self.program.iter().enumerate() {
            writeln!(out, "{:04}  {}", pc, instr).unwrap();
        }
        out
    }

    /// Wrap in an `Arc` for sharing across evaluation threads.
    pub fn shared(self) -> Arc<CompiledFilter> {
        Arc::new(self)
    }
}

impl fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("source", &self.source)
            .field("instructions", &self.program.len())
            .field("fields", &self.fields.len())
            .field("consts", &self.consts.len())
            .finish()
    }
}
