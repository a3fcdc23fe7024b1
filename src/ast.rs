//! Abstract syntax tree for parsed filter expressions.
//!
//! Nodes exclusively own their children; every node carries the source
//! span it was parsed from.

use crate::loc::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An unresolved literal, as written. Classification against a field's
/// kind happens during semantic analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(u64),
    /// An integer written with a leading minus.
    NegInt(u64),
    Float(f64),
    Str(String),
    /// Colon/dash-separated hex pairs; may become bytes or an Ethernet
    /// address.
    Bytes(Vec<u8>),
    /// Address-shaped text, optionally with a `/prefix`; validated and
    /// classified during semantic analysis.
    Addr(String),
    /// Regular-expression pattern text; compiled during semantic analysis.
    Pattern(String),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{}", v),
            Literal::NegInt(v) => write!(f, "-{}", v),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::Bytes(b) => {
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        f.write_str(":")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Literal::Addr(s) => f.write_str(s),
            Literal::Pattern(p) => write!(f, "/{}/", p),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Byte-slice applied to a field reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceSpec {
    /// `field[start:len]`
    Length { start: usize, len: usize },
    /// `field[start-end]`, end inclusive
    Bounds { start: usize, end: usize },
}

impl SliceSpec {
    /// Apply to a byte string; out-of-range slices yield `None`, which the
    /// evaluator treats as no match.
    pub fn apply<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        match *self {
            SliceSpec::Length { start, len } => bytes.get(start..start + len),
            SliceSpec::Bounds { start, end } => bytes.get(start..=end),
        }
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SliceSpec::Length { start, len } => write!(f, "[{}:{}]", start, len),
            SliceSpec::Bounds { start, end } => write!(f, "[{}-{}]", start, end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    Matches,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Contains => "contains",
            CmpOp::Matches => "matches",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    BitAnd,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::BitAnd => "&",
        })
    }
}

/// One member of a set literal: a single value or an inclusive range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetMember {
    Single(Literal, Location),
    Range(Literal, Literal, Location),
}

impl SetMember {
    pub fn loc(&self) -> Location {
        match self {
            SetMember::Single(_, loc) => *loc,
            SetMember::Range(_, _, loc) => *loc,
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal {
        value: Literal,
        loc: Location,
    },
    FieldRef {
        name: String,
        /// `#N` pin; negative counts from the last occurrence.
        occurrence: Option<i32>,
        slice: Option<SliceSpec>,
        loc: Location,
    },
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        loc: Location,
    },
    In {
        subject: Box<Expr>,
        set: Vec<SetMember>,
        loc: Location,
    },
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        loc: Location,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        loc: Location,
    },
    Not {
        inner: Box<Expr>,
        loc: Location,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        loc: Location,
    },
}

impl Expr {
    pub fn loc(&self) -> Location {
        match self {
            Expr::Literal { loc, .. }
            | Expr::FieldRef { loc, .. }
            | Expr::Compare { loc, .. }
            | Expr::In { loc, .. }
            | Expr::Arith { loc, .. }
            | Expr::Logical { loc, .. }
            | Expr::Not { loc, .. }
            | Expr::Call { loc, .. } => *loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_apply() {
        let data = b"abcdef";
        assert_eq!(
            SliceSpec::Length { start: 1, len: 3 }.apply(data),
            Some(&b"bcd"[..])
        );
        assert_eq!(
            SliceSpec::Bounds { start: 0, end: 2 }.apply(data),
            Some(&b"abc"[..])
        );
        assert_eq!(SliceSpec::Length { start: 4, len: 10 }.apply(data), None);
    }

    #[test]
    fn test_expr_loc_accessor() {
        let e = Expr::Literal {
            value: Literal::Int(1),
            loc: Location::new(3, 1),
        };
        assert_eq!(e.loc(), Location::new(3, 1));
    }

    #[test]
    fn test_literal_display() {
        assert_eq!(Literal::Bytes(vec![0xde, 0xad]).to_string(), "de:ad");
        assert_eq!(Literal::Pattern("a+".into()).to_string(), "/a+/");
        assert_eq!(Literal::NegInt(5).to_string(), "-5");
    }
}
