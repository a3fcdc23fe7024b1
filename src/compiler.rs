//! Compiler: lowers a checked expression tree into the flat instruction
//! sequence of a [`CompiledFilter`].
//!
//! Lowering is post-order. Constant sub-expressions with no field
//! references fold at compile time. Operands of `&&`/`||` chains are
//! ordered cheapest-first by static field-lookup count, but only when
//! every operand's cost is statically known (a function call makes it
//! unknown and keeps source order). Comparisons against repeated fields
//! quantify as match-if-any-occurrence; an occurrence pin in the field
//! slot selects exactly one instance instead.
//!
//! Failure here means the checked tree is inconsistent, which a correct
//! semantic pass cannot produce. Those paths are guarded and reported as
//! [`FilterError::Internal`], never as user-facing diagnostics.

use crate::ast::LogicalOp;
use crate::filter::CompiledFilter;
use crate::ir::{Const, FieldSlot, Instruction, SetEntry};
use crate::loc::Location;
use crate::semantic::{CheckedExpr, CheckedSetMember};
use crate::functions::FunctionRegistry;
use crate::types::{arith_value, compare_value, FieldValue};
use crate::{FilterError, Result};
use log::debug;
use std::sync::Arc;

pub struct Compiler;

impl Compiler {
    /// Lower one checked tree. `source` is kept on the filter object for
    /// diagnostics and disassembly; `functions` is the frozen namespace
    /// the program's call indices resolve into.
    pub fn compile(
        checked: &CheckedExpr,
        functions: Arc<FunctionRegistry>,
        source: impl Into<String>,
    ) -> Result<CompiledFilter> {
        let folded = fold(checked.clone());
        let mut builder = Builder::default();
        builder.lower(&folded, true)?;
        Ok(CompiledFilter::new(
            builder.program,
            builder.consts,
            builder.fields,
            functions,
            source.into(),
        ))
    }
}

#[derive(Default)]
struct Builder {
    program: Vec<Instruction>,
    consts: Vec<Const>,
    fields: Vec<FieldSlot>,
}

impl Builder {
    fn const_id(&mut self, c: Const) -> usize {
        match self.consts.iter().position(|e| *e == c) {
            Some(idx) => idx,
            None => {
                self.consts.push(c);
                self.consts.len() - 1
            }
        }
    }

    fn slot_id(&mut self, slot: FieldSlot) -> usize {
        match self.fields.iter().position(|e| *e == slot) {
            Some(idx) => idx,
            None => {
                self.fields.push(slot);
                self.fields.len() - 1
            }
        }
    }

    /// Emit instructions for one node. In predicate position the node
    /// must leave a truth verdict; a bare field reference becomes an
    /// existence test there, a value load everywhere else.
    fn lower(&mut self, expr: &CheckedExpr, predicate: bool) -> Result<()> {
        match expr {
            CheckedExpr::Const { value, .. } => {
                let id = self.const_id(Const::Value(value.clone()));
                self.program.push(Instruction::LoadConst(id));
                Ok(())
            }
            CheckedExpr::FieldRef {
                field,
                name,
                occurrence,
                slice,
                ..
            } => {
                let slot = self.slot_id(FieldSlot {
                    field: field.id,
                    name: name.clone(),
                    kind: field.kind,
                    occurrence: *occurrence,
                    slice: *slice,
                });
                self.program.push(if predicate {
                    Instruction::Exists(slot)
                } else {
                    Instruction::LoadField(slot)
                });
                Ok(())
            }
            CheckedExpr::Arith { op, lhs, rhs, .. } => {
                self.lower(lhs, false)?;
                self.lower(rhs, false)?;
                self.program.push(Instruction::Arith(*op));
                Ok(())
            }
            CheckedExpr::Compare { op, lhs, rhs, .. } => {
                self.lower(lhs, false)?;
                self.lower(rhs, false)?;
                self.program.push(Instruction::Compare(*op));
                Ok(())
            }
            CheckedExpr::Match { lhs, pattern, .. } => {
                self.lower(lhs, false)?;
                let id = self.const_id(Const::Pattern(pattern.clone()));
                self.program.push(Instruction::Matches(id));
                Ok(())
            }
            CheckedExpr::In {
                subject, members, ..
            } => {
                self.lower(subject, false)?;
                let entries = members
                    .iter()
                    .map(|m| match m {
                        CheckedSetMember::Single(v) => SetEntry::Single(v.clone()),
                        CheckedSetMember::Range(lo, hi) => SetEntry::Range(lo.clone(), hi.clone()),
                    })
                    .collect();
                let id = self.const_id(Const::Set(entries));
                self.program.push(Instruction::MemberOf(id));
                Ok(())
            }
            CheckedExpr::Logical { op, .. } => {
                let mut operands = Vec::new();
                flatten_chain(expr, *op, &mut operands);
                order_by_cost(&mut operands);
                let instr = match op {
                    LogicalOp::And => Instruction::And,
                    LogicalOp::Or => Instruction::Or,
                };
                self.lower(operands[0], true)?;
                for operand in &operands[1..] {
                    self.lower(operand, true)?;
                    self.program.push(instr);
                }
                Ok(())
            }
            CheckedExpr::Not { inner, .. } => {
                self.lower(inner, true)?;
                self.program.push(Instruction::Not);
                Ok(())
            }
            CheckedExpr::Call {
                func, name, args, ..
            } => {
                let argc = u8::try_from(args.len()).map_err(|_| FilterError::Internal {
                    message: format!("function '{}' lowered with {} arguments", name, args.len()),
                })?;
                for arg in args {
                    self.lower(arg, false)?;
                }
                self.program.push(Instruction::Call { func: *func, argc });
                Ok(())
            }
        }
    }
}

/// Collect the operands of a same-operator logical chain, left to right.
fn flatten_chain<'a>(expr: &'a CheckedExpr, chain_op: LogicalOp, out: &mut Vec<&'a CheckedExpr>) {
    match expr {
        CheckedExpr::Logical { op, lhs, rhs, .. } if *op == chain_op => {
            flatten_chain(lhs, chain_op, out);
            flatten_chain(rhs, chain_op, out);
        }
        other => out.push(other),
    }
}

/// Stable-sort chain operands cheapest-first by field-lookup count.
/// Skipped when any operand contains a function call, whose cost is not
/// statically known.
fn order_by_cost(operands: &mut [&CheckedExpr]) {
    if operands.iter().any(|e| e.has_call()) {
        return;
    }
    let before: Vec<usize> = operands.iter().map(|e| e.field_lookups()).collect();
    if before.windows(2).all(|w| w[0] <= w[1]) {
        return;
    }
    operands.sort_by_key(|e| e.field_lookups());
    debug!(
        "reordered logical chain by field-lookup cost: {:?}",
        operands.iter().map(|e| e.field_lookups()).collect::<Vec<_>>()
    );
}

/// Bottom-up constant folding. A subtree with no field references and no
/// function calls collapses to a constant; a logical node with one
/// constant side simplifies away.
fn fold(expr: CheckedExpr) -> CheckedExpr {
    match expr {
        CheckedExpr::Arith {
            op,
            lhs,
            rhs,
            kind,
            loc,
        } => {
            let lhs = fold(*lhs);
            let rhs = fold(*rhs);
            if let (Some(a), Some(b)) = (const_value(&lhs), const_value(&rhs)) {
                if let Some(value) = arith_value(op, a, b) {
                    debug!("folded constant arithmetic at {}", loc);
                    return constant(value, loc);
                }
            }
            CheckedExpr::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                kind,
                loc,
            }
        }
        CheckedExpr::Compare { op, lhs, rhs, loc } => {
            let lhs = fold(*lhs);
            let rhs = fold(*rhs);
            if let (Some(a), Some(b)) = (const_value(&lhs), const_value(&rhs)) {
                debug!("folded constant comparison at {}", loc);
                return constant(FieldValue::Bool(compare_value(op, a, b)), loc);
            }
            CheckedExpr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                loc,
            }
        }
        CheckedExpr::Match { lhs, pattern, loc } => {
            let lhs = fold(*lhs);
            if let Some(v) = const_value(&lhs) {
                return constant(FieldValue::Bool(v.matches_pattern(&pattern)), loc);
            }
            CheckedExpr::Match {
                lhs: Box::new(lhs),
                pattern,
                loc,
            }
        }
        CheckedExpr::In {
            subject,
            members,
            loc,
        } => {
            let subject = fold(*subject);
            if let Some(v) = const_value(&subject) {
                let hit = members.iter().any(|m| match m {
                    CheckedSetMember::Single(s) => SetEntry::Single(s.clone()).contains(v),
                    CheckedSetMember::Range(lo, hi) => {
                        SetEntry::Range(lo.clone(), hi.clone()).contains(v)
                    }
                });
                return constant(FieldValue::Bool(hit), loc);
            }
            CheckedExpr::In {
                subject: Box::new(subject),
                members,
                loc,
            }
        }
        CheckedExpr::Logical { op, lhs, rhs, loc } => {
            let lhs = fold(*lhs);
            let rhs = fold(*rhs);
            let truth = |e: &CheckedExpr| const_value(e).map(FieldValue::is_truthy);
            match (op, truth(&lhs), truth(&rhs)) {
                (LogicalOp::And, Some(false), _) | (LogicalOp::And, _, Some(false)) => {
                    constant(FieldValue::Bool(false), loc)
                }
                (LogicalOp::Or, Some(true), _) | (LogicalOp::Or, _, Some(true)) => {
                    constant(FieldValue::Bool(true), loc)
                }
                (LogicalOp::And, Some(true), None) | (LogicalOp::Or, Some(false), None) => rhs,
                (LogicalOp::And, None, Some(true)) | (LogicalOp::Or, None, Some(false)) => lhs,
                (_, Some(a), Some(b)) => constant(
                    FieldValue::Bool(match op {
                        LogicalOp::And => a && b,
                        LogicalOp::Or => a || b,
                    }),
                    loc,
                ),
                _ => CheckedExpr::Logical {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    loc,
                },
            }
        }
        CheckedExpr::Not { inner, loc } => {
            let inner = fold(*inner);
            if let Some(v) = const_value(&inner) {
                return constant(FieldValue::Bool(!v.is_truthy()), loc);
            }
            CheckedExpr::Not {
                inner: Box::new(inner),
                loc,
            }
        }
        CheckedExpr::Call { func, name, args, kind, loc } => CheckedExpr::Call {
            func,
            name,
            args: args.into_iter().map(fold).collect(),
            kind,
            loc,
        },
        leaf => leaf,
    }
}

fn const_value(expr: &CheckedExpr) -> Option<&FieldValue> {
    match expr {
        CheckedExpr::Const { value, .. } => Some(value),
        _ => None,
    }
}

fn constant(value: FieldValue, loc: Location) -> CheckedExpr {
    CheckedExpr::Const {
        value,
        coercion: None,
        loc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CmpOp;
    use crate::functions::{register_builtins, FunctionRegistry};
    use crate::parser::Parser;
    use crate::schema::Schema;
    use crate::semantic::SemanticAnalyzer;
    use crate::types::ValueKind;

    fn schema() -> Schema {
        Schema::builder()
            .field("tcp.port", ValueKind::UInt)
            .field("tcp.srcport", ValueKind::UInt)
            .field("ip.addr", ValueKind::Ipv4)
            .field("http.host", ValueKind::Str)
            .field("frame.data", ValueKind::Bytes)
            .build()
    }

    fn compile(input: &str) -> CompiledFilter {
        let schema = schema();
        let mut functions = FunctionRegistry::new();
        register_builtins(&mut functions).unwrap();
        let functions = Arc::new(functions);
        let expr = Parser::parse(input).unwrap();
        let checked = SemanticAnalyzer::new(&schema, &functions)
            .check(&expr)
            .unwrap();
        Compiler::compile(&checked, functions.clone(), input).unwrap()
    }

    #[test]
    fn test_simple_comparison_lowering() {
        let filter = compile("tcp.port == 80");
        assert_eq!(
            filter.instructions(),
            &[
                Instruction::LoadField(0),
                Instruction::LoadConst(0),
                Instruction::Compare(CmpOp::Eq),
            ]
        );
        assert_eq!(filter.field_names(), vec!["tcp.port"]);
        assert_eq!(
            filter.constants(),
            &[Const::Value(FieldValue::UInt(80))]
        );
    }

    #[test]
    fn test_existence_test_lowers_to_exists() {
        let filter = compile("tcp.port");
        assert_eq!(filter.instructions(), &[Instruction::Exists(0)]);
    }

    #[test]
    fn test_field_in_value_position_loads() {
        let filter = compile("len(frame.data) == 4");
        assert!(filter
            .instructions()
            .iter()
            .any(|i| matches!(i, Instruction::LoadField(_))));
    }

    #[test]
    fn test_constant_expression_folds() {
        let filter = compile("1 == 1");
        assert_eq!(filter.instructions(), &[Instruction::LoadConst(0)]);
        assert_eq!(
            filter.constants(),
            &[Const::Value(FieldValue::Bool(true))]
        );
    }

    #[test]
    fn test_constant_and_operand_simplifies_away() {
        let filter = compile("tcp.port == 80 && 1 == 1");
        // the constant-true side vanishes; only the field comparison runs
        assert_eq!(
            filter.instructions(),
            &[
                Instruction::LoadField(0),
                Instruction::LoadConst(0),
                Instruction::Compare(CmpOp::Eq),
            ]
        );
    }

    #[test]
    fn test_constant_false_collapses_whole_and() {
        let filter = compile("tcp.port == 80 && 1 == 2");
        assert_eq!(filter.instructions(), &[Instruction::LoadConst(0)]);
        assert_eq!(
            filter.constants(),
            &[Const::Value(FieldValue::Bool(false))]
        );
    }

    #[test]
    fn test_cheaper_operand_evaluated_first() {
        // lhs costs two lookups, rhs one; rhs should be hoisted
        let filter = compile("tcp.port == tcp.srcport && http.host == \"x\"");
        // slots are allocated in lowering order, so the hoisted
        // single-lookup comparison owns slot 0
        assert_eq!(filter.field_names()[0], "http.host");
    }

    #[test]
    fn test_call_in_chain_keeps_source_order() {
        let filter = compile("len(frame.data) == 4 && tcp.port == 80");
        // source order preserved: call lowered first
        assert!(matches!(
            filter.instructions()[0],
            Instruction::LoadField(_)
        ));
        assert!(matches!(filter.instructions()[1], Instruction::Call { .. }));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let schema = schema();
        let mut functions = FunctionRegistry::new();
        register_builtins(&mut functions).unwrap();
        let functions = Arc::new(functions);
        let input = "tcp.port in {80, 443} || http.host matches /example/";
        let expr = Parser::parse(input).unwrap();
        let checked = SemanticAnalyzer::new(&schema, &functions)
            .check(&expr)
            .unwrap();
        let a = Compiler::compile(&checked, functions.clone(), input).unwrap();
        let b = Compiler::compile(&checked, functions.clone(), input).unwrap();
        assert_eq!(a.instructions(), b.instructions());
        assert_eq!(a.constants(), b.constants());
    }

    #[test]
    fn test_duplicate_constants_share_pool_entry() {
        let filter = compile("tcp.port == 80 || tcp.srcport == 80");
        assert_eq!(filter.constants().len(), 1);
    }

    #[test]
    fn test_duplicate_field_refs_share_slot() {
        let filter = compile("tcp.port == 80 || tcp.port == 443");
        assert_eq!(filter.field_names(), vec!["tcp.port"]);
    }

    #[test]
    fn test_disassembly_lists_fields_and_consts() {
        let filter = compile("tcp.port == 80 && ip.addr == 10.0.0.0/8");
        let dis = filter.disassemble();
        assert!(dis.contains("tcp.port"));
        assert!(dis.contains("ip.addr"));
        assert!(dis.contains("80"));
        assert!(dis.contains("10.0.0.0/8"));
        assert!(dis.contains("compare"));
    }

    #[test]
    fn test_empty_set_compiles() {
        let filter = compile("tcp.port in {}");
        assert!(matches!(
            filter.instructions()[1],
            Instruction::MemberOf(_)
        ));
    }
}
