//! Bytecode for compiled filters: the instruction set, the constant pool
//! entries, and the field table the instructions index into.
//!
//! A compiled program is a flat, post-order instruction sequence for a
//! small stack machine. It is fully self-contained: nothing in it refers
//! back to the AST it was compiled from.

use crate::ast::{ArithOp, CmpOp, SliceSpec};
use crate::schema::FieldId;
use crate::types::{FieldValue, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Index into a program's constant pool.
pub type ConstId = usize;
/// Index into a program's field table.
pub type SlotId = usize;
/// Index into the function registry, fixed at compile time.
pub use crate::functions::FuncId;

/// One field-table entry: which field to read and how to narrow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSlot {
    pub field: FieldId,
    /// Name as written, kept for disassembly and diagnostics.
    pub name: String,
    pub kind: ValueKind,
    /// Pin to one occurrence (negative counts from the back); `None`
    /// loads all occurrences.
    pub occurrence: Option<i32>,
    pub slice: Option<SliceSpec>,
}

/// One member of a compiled set constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetEntry {
    Single(FieldValue),
    /// Inclusive on both ends.
    Range(FieldValue, FieldValue),
}

impl SetEntry {
    /// Whether a value is this entry. Ranges are inclusive and ordered
    /// per the value kind's comparison semantics.
    pub fn contains(&self, v: &FieldValue) -> bool {
        use std::cmp::Ordering;
        match self {
            SetEntry::Single(m) => v.eq_value(m),
            SetEntry::Range(lo, hi) => {
                matches!(v.ord_value(lo), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(v.ord_value(hi), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }
}

/// Constant-pool entry.
#[derive(Debug, Clone)]
pub enum Const {
    Value(FieldValue),
    Set(Vec<SetEntry>),
    Pattern(Arc<regex::bytes::Regex>),
}

impl PartialEq for Const {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Const::Value(a), Const::Value(b)) => a == b,
            (Const::Set(a), Const::Set(b)) => a == b,
            (Const::Pattern(a), Const::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Value(v) => write!(f, "{}", v),
            Const::Set(entries) => {
                f.write_str("{")?;
                for (i, e) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match e {
                        SetEntry::Single(v) => write!(f, "{}", v)?,
                        SetEntry::Range(lo, hi) => write!(f, "{}..{}", lo, hi)?,
                    }
                }
                f.write_str("}")
            }
            Const::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// A single instruction. Comparison instructions consume the occurrence
/// lists of both operands and match if any pairing matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Push every occurrence of a field (possibly none).
    LoadField(SlotId),
    /// Push whether the field has at least one occurrence.
    Exists(SlotId),
    /// Push a constant.
    LoadConst(ConstId),
    /// Pop two operands, push the comparison verdict.
    Compare(CmpOp),
    /// Pop one operand, test against a set constant.
    MemberOf(ConstId),
    /// Pop one operand, test against a pattern constant.
    Matches(ConstId),
    /// Pop two operands, push the arithmetic result element-wise.
    Arith(ArithOp),
    /// Pop `argc` operands (last argument on top), call a function, push
    /// its result.
    Call { func: FuncId, argc: u8 },
    And,
    Or,
    Not,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::LoadField(slot) => write!(f, "load_field   #{}", slot),
            Instruction::Exists(slot) => write!(f, "exists       #{}", slot),
            Instruction::LoadConst(idx) => write!(f, "load_const   ${}", idx),
            Instruction::Compare(op) => write!(f, "compare      {}", op),
            Instruction::MemberOf(idx) => write!(f, "member_of    ${}", idx),
            Instruction::Matches(idx) => write!(f, "matches      ${}", idx),
            Instruction::Arith(op) => write!(f, "arith        {}", op),
            Instruction::Call { func, argc } => write!(f, "call         fn{} argc={}", func, argc),
            Instruction::And => f.write_str("and"),
            Instruction::Or => f.write_str("or"),
            Instruction::Not => f.write_str("not"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_equality_includes_patterns() {
        let a = Const::Pattern(Arc::new(regex::bytes::Regex::new("a+").unwrap()));
        let b = Const::Pattern(Arc::new(regex::bytes::Regex::new("a+").unwrap()));
        let c = Const::Pattern(Arc::new(regex::bytes::Regex::new("b+").unwrap()));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Const::Value(FieldValue::Int(1)));
    }

    #[test]
    fn test_instruction_display() {
        assert_eq!(Instruction::LoadField(2).to_string(), "load_field   #2");
        assert_eq!(
            Instruction::Compare(CmpOp::Eq).to_string(),
            "compare      =="
        );
        assert_eq!(
            Instruction::Call { func: 1, argc: 2 }.to_string(),
            "call         fn1 argc=2"
        );
    }

    #[test]
    fn test_set_display() {
        let set = Const::Set(vec![
            SetEntry::Single(FieldValue::UInt(80)),
            SetEntry::Range(FieldValue::UInt(8000), FieldValue::UInt(8080)),
        ]);
        assert_eq!(set.to_string(), "{80, 8000..8080}");
    }
}
