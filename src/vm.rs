//! Evaluator: a stack interpreter over compiled filter programs.
//!
//! All state lives in the call frame (an operand stack and the record
//! reference), so any number of evaluations can share one filter object
//! concurrently. Evaluation of a well-formed program never fails: an
//! absent field produces an empty occurrence list, comparisons over empty
//! lists do not match, and malformed stack states are guarded to a
//! non-match rather than an error.

use crate::filter::CompiledFilter;
use crate::ir::{Const, FieldSlot, Instruction};
use crate::record::FieldTree;
use crate::types::{arith_value, compare_value, FieldValue};
use log::debug;

/// One stack entry: the occurrence list an expression produced. Empty
/// means absent.
type Operand = Vec<FieldValue>;

/// Truth of an operand when used as a predicate: any occurrence truthy.
fn truth(operand: &Operand) -> bool {
    operand.iter().any(FieldValue::is_truthy)
}

/// Run a compiled filter against one record.
pub(crate) fn eval<T: FieldTree + ?Sized>(filter: &CompiledFilter, record: &T) -> bool {
    let mut stack: Vec<Operand> = Vec::with_capacity(8);

    macro_rules! pop {
        () => {
            match stack.pop() {
                Some(v) => v,
                None => {
                    debug_assert!(false, "operand stack underflow");
                    debug!("operand stack underflow, treating filter as non-match");
                    return false;
                }
            }
        };
    }

    for instr in &filter.program {
        match *instr {
            Instruction::LoadField(slot) => {
                let operand = filter
                    .fields
                    .get(slot)
                    .map_or_else(Vec::new, |s| load_field(s, record));
                stack.push(operand);
            }
            Instruction::Exists(slot) => {
                let present = filter.fields.get(slot).is_some_and(|s| {
                    match s.occurrence {
                        Some(pin) => resolve_occurrence(record.count(s.field), pin).is_some(),
                        None => record.count(s.field) > 0,
                    }
                });
                stack.push(vec![FieldValue::Bool(present)]);
            }
            Instruction::LoadConst(idx) => {
                let operand = match filter.consts.get(idx) {
                    Some(Const::Value(v)) => vec![v.clone()],
                    _ => {
                        debug_assert!(false, "load_const on a non-value constant");
                        Vec::new()
                    }
                };
                stack.push(operand);
            }
            Instruction::Compare(op) => {
                let rhs = pop!();
                let lhs = pop!();
                // match-if-any across both occurrence lists
                let hit = lhs
                    .iter()
                    .any(|a| rhs.iter().any(|b| compare_value(op, a, b)));
                stack.push(vec![FieldValue::Bool(hit)]);
            }
            Instruction::MemberOf(idx) => {
                let subject = pop!();
                let hit = match filter.consts.get(idx) {
                    Some(Const::Set(entries)) => subject
                        .iter()
                        .any(|v| entries.iter().any(|e| e.contains(v))),
                    _ => {
                        debug_assert!(false, "member_of on a non-set constant");
                        false
                    }
                };
                stack.push(vec![FieldValue::Bool(hit)]);
            }
            Instruction::Matches(idx) => {
                let subject = pop!();
                let hit = match filter.consts.get(idx) {
                    Some(Const::Pattern(re)) => subject.iter().any(|v| v.matches_pattern(re)),
                    _ => {
                        debug_assert!(false, "matches on a non-pattern constant");
                        false
                    }
                };
                stack.push(vec![FieldValue::Bool(hit)]);
            }
            Instruction::Arith(op) => {
                let rhs = pop!();
                let lhs = pop!();
                let mut out = Vec::with_capacity(lhs.len().max(rhs.len()));
                for a in &lhs {
                    for b in &rhs {
                        if let Some(v) = arith_value(op, a, b) {
                            out.push(v);
                        }
                    }
                }
                stack.push(out);
            }
            Instruction::Call { func, argc } => {
                let argc = argc as usize;
                if stack.len() < argc {
                    debug_assert!(false, "operand stack underflow in call");
                    debug!("operand stack underflow, treating filter as non-match");
                    return false;
                }
                let args: Vec<Operand> = stack.split_off(stack.len() - argc);
                let arg_refs: Vec<&[FieldValue]> = args.iter().map(|a| a.as_slice()).collect();
                let result = match filter.functions.implementation(func) {
                    Some(imp) => imp.call(&arg_refs),
                    None => {
                        debug_assert!(false, "call to unregistered function index");
                        Vec::new()
                    }
                };
                stack.push(result);
            }
            Instruction::And => {
                let rhs = pop!();
                let lhs = pop!();
                stack.push(vec![FieldValue::Bool(truth(&lhs) && truth(&rhs))]);
            }
            Instruction::Or => {
                let rhs = pop!();
                let lhs = pop!();
                stack.push(vec![FieldValue::Bool(truth(&lhs) || truth(&rhs))]);
            }
            Instruction::Not => {
                let inner = pop!();
                stack.push(vec![FieldValue::Bool(!truth(&inner))]);
            }
        }
    }

    let verdict = pop!();
    debug_assert!(stack.is_empty(), "operands left on stack after program end");
    truth(&verdict)
}

/// Gather the occurrence list for one field slot: all occurrences, or the
/// pinned one; sliced when the slot carries a slice spec. Occurrences a
/// slice cannot narrow (wrong kind, out of range) contribute nothing.
fn load_field<T: FieldTree + ?Sized>(slot: &FieldSlot, record: &T) -> Vec<FieldValue> {
    let count = record.count(slot.field);
    let indices: Vec<usize> = match slot.occurrence {
        Some(pin) => resolve_occurrence(count, pin).into_iter().collect(),
        None => (0..count).collect(),
    };
    let mut out = Vec::with_capacity(indices.len());
    for i in indices {
        let Some(value) = record.value(slot.field, i) else {
            continue;
        };
        match slot.slice {
            None => out.push(value.clone()),
            Some(spec) => {
                if let Some(sliced) = value.as_bytes().and_then(|b| spec.apply(b)) {
                    out.push(FieldValue::Bytes(sliced.to_vec()));
                }
            }
        }
    }
    out
}

/// Map a pin to a concrete index: non-negative pins count from the
/// front, negative from the back (`#-1` is the last occurrence).
fn resolve_occurrence(count: usize, pin: i32) -> Option<usize> {
    if pin >= 0 {
        let idx = pin as usize;
        (idx < count).then_some(idx)
    } else {
        count.checked_sub(pin.unsigned_abs() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_occurrence() {
        assert_eq!(resolve_occurrence(3, 0), Some(0));
        assert_eq!(resolve_occurrence(3, 2), Some(2));
        assert_eq!(resolve_occurrence(3, 3), None);
        assert_eq!(resolve_occurrence(3, -1), Some(2));
        assert_eq!(resolve_occurrence(3, -3), Some(0));
        assert_eq!(resolve_occurrence(3, -4), None);
        assert_eq!(resolve_occurrence(0, 0), None);
        assert_eq!(resolve_occurrence(0, -1), None);
    }

    #[test]
    fn test_truth_of_operands() {
        assert!(!truth(&vec![]));
        assert!(!truth(&vec![FieldValue::Bool(false)]));
        assert!(truth(&vec![FieldValue::Bool(false), FieldValue::Bool(true)]));
        assert!(truth(&vec![FieldValue::UInt(7)]));
    }

    #[test]
    fn test_slice_spec_out_of_range_drops_occurrence() {
        use crate::ast::SliceSpec as S;
        let spec = S::Length { start: 10, len: 2 };
        assert_eq!(spec.apply(b"short"), None);
    }
}
