//! Semantic analysis: resolves names against the registries, assigns
//! static kinds, inserts coercions, and validates literals.
//!
//! The output is a [`CheckedExpr`] tree. A checked tree never mixes
//! incompatible kinds across a comparison without a recorded coercion;
//! everything the evaluator will do has been validated here, so
//! compilation and evaluation cannot fail on user input.
//!
//! Analysis stops at the first error. Multi-error recovery is deliberately
//! not attempted, so diagnostics stay unambiguous.

use crate::ast::{ArithOp, CmpOp, Expr, Literal, LogicalOp, SetMember, SliceSpec};
use crate::functions::{FuncId, FunctionRegistry};
use crate::loc::Location;
use crate::schema::{FieldDescriptor, FieldResolver};
use crate::types::{FieldValue, ValueKind};
use crate::{FilterError, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// A conversion the analyzer inserted to reconcile two kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coercion {
    /// i64/u64 representation change.
    IntWiden,
    IntToFloat,
    IntToBool,
    /// Integer literal against an IPv4 field.
    IntToAddr,
    /// Numeric seconds against a duration field.
    SecondsToDuration,
    /// Numeric seconds against an absolute-time field.
    SecondsToTime,
    StrToBytes,
    /// Six-pair byte chain against an Ethernet field.
    BytesToEther,
    /// Address-shaped text classified against the field's kind.
    AddrClassified,
}

/// One member of a checked set literal.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckedSetMember {
    Single(FieldValue),
    Range(FieldValue, FieldValue),
}

/// AST node annotated with resolved identities, static kinds, and the
/// coercions applied to reach them.
#[derive(Debug, Clone)]
pub enum CheckedExpr {
    Const {
        value: FieldValue,
        coercion: Option<Coercion>,
        loc: Location,
    },
    FieldRef {
        field: FieldDescriptor,
        name: String,
        occurrence: Option<i32>,
        slice: Option<SliceSpec>,
        /// Kind after slicing (a sliced field reads as bytes).
        kind: ValueKind,
        loc: Location,
    },
    Arith {
        op: ArithOp,
        lhs: Box<CheckedExpr>,
        rhs: Box<CheckedExpr>,
        kind: ValueKind,
        loc: Location,
    },
    Compare {
        op: CmpOp,
        lhs: Box<CheckedExpr>,
        rhs: Box<CheckedExpr>,
        loc: Location,
    },
    /// `matches` with its pattern compiled once, here.
    Match {
        lhs: Box<CheckedExpr>,
        pattern: Arc<regex::bytes::Regex>,
        loc: Location,
    },
    In {
        subject: Box<CheckedExpr>,
        members: Vec<CheckedSetMember>,
        loc: Location,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<CheckedExpr>,
        rhs: Box<CheckedExpr>,
        loc: Location,
    },
    Not {
        inner: Box<CheckedExpr>,
        loc: Location,
    },
    Call {
        func: FuncId,
        name: String,
        args: Vec<CheckedExpr>,
        kind: ValueKind,
        loc: Location,
    },
}

impl CheckedExpr {
    /// Static kind of the value this node produces. Predicates are Bool.
    pub fn kind(&self) -> ValueKind {
        match self {
            CheckedExpr::Const { value, .. } => value.kind(),
            CheckedExpr::FieldRef { kind, .. } => *kind,
            CheckedExpr::Arith { kind, .. } => *kind,
            CheckedExpr::Call { kind, .. } => *kind,
            CheckedExpr::Compare { .. }
            | CheckedExpr::Match { .. }
            | CheckedExpr::In { .. }
            | CheckedExpr::Logical { .. }
            | CheckedExpr::Not { .. } => ValueKind::Bool,
        }
    }

    pub fn loc(&self) -> Location {
        match self {
            CheckedExpr::Const { loc, .. }
            | CheckedExpr::FieldRef { loc, .. }
            | CheckedExpr::Arith { loc, .. }
            | CheckedExpr::Compare { loc, .. }
            | CheckedExpr::Match { loc, .. }
            | CheckedExpr::In { loc, .. }
            | CheckedExpr::Logical { loc, .. }
            | CheckedExpr::Not { loc, .. }
            | CheckedExpr::Call { loc, .. } => *loc,
        }
    }

    /// Number of field lookups under this node; the compiler's static
    /// cost proxy.
    pub fn field_lookups(&self) -> usize {
        match self {
            CheckedExpr::Const { .. } => 0,
            CheckedExpr::FieldRef { .. } => 1,
            CheckedExpr::Arith { lhs, rhs, .. }
            | CheckedExpr::Compare { lhs, rhs, .. }
            | CheckedExpr::Logical { lhs, rhs, .. } => lhs.field_lookups() + rhs.field_lookups(),
            CheckedExpr::Match { lhs, .. } => lhs.field_lookups(),
            CheckedExpr::In { subject, .. } => subject.field_lookups(),
            CheckedExpr::Not { inner, .. } => inner.field_lookups(),
            CheckedExpr::Call { args, .. } => args.iter().map(|a| a.field_lookups()).sum(),
        }
    }

    /// Whether any function call occurs under this node. Calls have
    /// unknown cost, which disables operand reordering.
    pub fn has_call(&self) -> bool {
        match self {
            CheckedExpr::Call { .. } => true,
            CheckedExpr::Const { .. } | CheckedExpr::FieldRef { .. } => false,
            CheckedExpr::Arith { lhs, rhs, .. }
            | CheckedExpr::Compare { lhs, rhs, .. }
            | CheckedExpr::Logical { lhs, rhs, .. } => lhs.has_call() || rhs.has_call(),
            CheckedExpr::Match { lhs, .. } => lhs.has_call(),
            CheckedExpr::In { subject, .. } => subject.has_call(),
            CheckedExpr::Not { inner, .. } => inner.has_call(),
        }
    }
}

fn is_numeric(kind: ValueKind) -> bool {
    matches!(kind, ValueKind::Int | ValueKind::UInt | ValueKind::Float)
}

fn is_stringish(kind: ValueKind) -> bool {
    matches!(kind, ValueKind::Str | ValueKind::Bytes)
}

/// Resolves and type-checks parsed expressions against a field registry
/// and a function namespace.
pub struct SemanticAnalyzer<'a, R: FieldResolver> {
    fields: &'a R,
    functions: &'a FunctionRegistry,
}

impl<'a, R: FieldResolver> SemanticAnalyzer<'a, R> {
    pub fn new(fields: &'a R, functions: &'a FunctionRegistry) -> Self {
        Self { fields, functions }
    }

    /// Check one parsed expression bottom-up, producing a checked tree or
    /// the first error encountered.
    pub fn check(&self, expr: &Expr) -> Result<CheckedExpr> {
        self.check_expr(expr, None)
    }

    fn check_expr(&self, expr: &Expr, expected: Option<ValueKind>) -> Result<CheckedExpr> {
        match expr {
            Expr::Literal { value, loc } => {
                let (value, coercion) = classify_literal(value, expected, *loc)?;
                Ok(CheckedExpr::Const {
                    value,
                    coercion,
                    loc: *loc,
                })
            }
            Expr::FieldRef {
                name,
                occurrence,
                slice,
                loc,
            } => self.check_field_ref(name, *occurrence, *slice, *loc),
            Expr::Compare { op, lhs, rhs, loc } => self.check_compare(*op, lhs, rhs, *loc),
            Expr::In { subject, set, loc } => self.check_in(subject, set, *loc),
            Expr::Arith { op, lhs, rhs, loc } => self.check_arith(*op, lhs, rhs, *loc),
            Expr::Logical { op, lhs, rhs, loc } => Ok(CheckedExpr::Logical {
                op: *op,
                lhs: Box::new(self.check_expr(lhs, None)?),
                rhs: Box::new(self.check_expr(rhs, None)?),
                loc: *loc,
            }),
            Expr::Not { inner, loc } => Ok(CheckedExpr::Not {
                inner: Box::new(self.check_expr(inner, None)?),
                loc: *loc,
            }),
            Expr::Call { name, args, loc } => self.check_call(name, args, *loc),
        }
    }

    fn check_field_ref(
        &self,
        name: &str,
        occurrence: Option<i32>,
        slice: Option<SliceSpec>,
        loc: Location,
    ) -> Result<CheckedExpr> {
        let field = self
            .fields
            .field(name)
            .ok_or_else(|| FilterError::UnknownIdentifier {
                loc,
                name: name.to_string(),
            })?;
        let kind = match slice {
            None => field.kind,
            Some(_) => {
                if !is_stringish(field.kind) && field.kind != ValueKind::Ether {
                    return Err(FilterError::TypeMismatch {
                        loc,
                        message: format!("field '{}' of kind {} cannot be sliced", name, field.kind),
                    });
                }
                ValueKind::Bytes
            }
        };
        Ok(CheckedExpr::FieldRef {
            field,
            name: name.to_string(),
            occurrence,
            slice,
            kind,
            loc,
        })
    }

    fn check_compare(&self, op: CmpOp, lhs: &Expr, rhs: &Expr, loc: Location) -> Result<CheckedExpr> {
        if op == CmpOp::Matches {
            return self.check_matches(lhs, rhs, loc);
        }

        // anchor on the non-literal side so the literal is classified
        // against the field's kind
        let (lhs, rhs) = match (literal_of(lhs), literal_of(rhs)) {
            (None, Some(_)) => {
                let l = self.check_expr(lhs, None)?;
                let r = self.check_expr(rhs, Some(l.kind()))?;
                (l, r)
            }
            (Some(_), None) => {
                let r = self.check_expr(rhs, None)?;
                let l = self.check_expr(lhs, Some(r.kind()))?;
                (l, r)
            }
            _ => {
                let l = self.check_expr(lhs, None)?;
                let r = self.check_expr(rhs, Some(l.kind()))?;
                (l, r)
            }
        };

        let (lk, rk) = (lhs.kind(), rhs.kind());
        let compatible = match op {
            CmpOp::Contains => {
                is_stringish(lk) && is_stringish(rk)
                    || matches!(lk, ValueKind::Ipv4 | ValueKind::Ipv6) && lk == rk
            }
            CmpOp::Eq | CmpOp::Ne => kinds_comparable(lk, rk),
            CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => {
                kinds_comparable(lk, rk) && kinds_ordered(lk, rk)
            }
            CmpOp::Matches => unreachable!("handled above"),
        };
        if !compatible {
            return Err(FilterError::TypeMismatch {
                loc,
                message: format!("cannot apply '{}' to {} and {}", op, lk, rk),
            });
        }
        Ok(CheckedExpr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            loc,
        })
    }

    fn check_matches(&self, lhs: &Expr, rhs: &Expr, loc: Location) -> Result<CheckedExpr> {
        let lhs = self.check_expr(lhs, None)?;
        if !is_stringish(lhs.kind()) {
            return Err(FilterError::TypeMismatch {
                loc: lhs.loc(),
                message: format!("'matches' needs a string or bytes value, not {}", lhs.kind()),
            });
        }
        // pattern may be written /re/ or as a quoted string
        let (text, ploc) = match rhs {
            Expr::Literal {
                value: Literal::Pattern(p),
                loc,
            } => (p.clone(), *loc),
            Expr::Literal {
                value: Literal::Str(s),
                loc,
            } => (s.clone(), *loc),
            other => {
                return Err(FilterError::TypeMismatch {
                    loc: other.loc(),
                    message: "'matches' needs a literal pattern on the right".into(),
                })
            }
        };
        let pattern =
            regex::bytes::Regex::new(&text).map_err(|e| FilterError::Pattern {
                loc: ploc,
                message: e.to_string(),
            })?;
        Ok(CheckedExpr::Match {
            lhs: Box::new(lhs),
            pattern: Arc::new(pattern),
            loc,
        })
    }

    fn check_in(&self, subject: &Expr, set: &[SetMember], loc: Location) -> Result<CheckedExpr> {
        let subject = self.check_expr(subject, None)?;
        let kind = subject.kind();
        let mut members = Vec::with_capacity(set.len());
        for member in set {
            match member {
                SetMember::Single(lit, mloc) => {
                    let (value, _) = classify_literal(lit, Some(kind), *mloc)?;
                    members.push(CheckedSetMember::Single(value));
                }
                SetMember::Range(lo, hi, mloc) => {
                    let (lo, _) = classify_literal(lo, Some(kind), *mloc)?;
                    let (hi, _) = classify_literal(hi, Some(kind), *mloc)?;
                    if lo.ord_value(&hi).is_none() {
                        return Err(FilterError::TypeMismatch {
                            loc: *mloc,
                            message: format!("range endpoints of kind {} have no order", kind),
                        });
                    }
                    members.push(CheckedSetMember::Range(lo, hi));
                }
            }
        }
        Ok(CheckedExpr::In {
            subject: Box::new(subject),
            members,
            loc,
        })
    }

    fn check_arith(&self, op: ArithOp, lhs: &Expr, rhs: &Expr, loc: Location) -> Result<CheckedExpr> {
        let lhs = self.check_expr(lhs, None)?;
        let rhs = self.check_expr(rhs, Some(lhs.kind()))?;
        let (lk, rk) = (lhs.kind(), rhs.kind());
        let kind = match op {
            ArithOp::BitAnd => {
                if matches!(lk, ValueKind::Int | ValueKind::UInt)
                    && matches!(rk, ValueKind::Int | ValueKind::UInt)
                {
                    lk
                } else {
                    return Err(FilterError::TypeMismatch {
                        loc,
                        message: format!("cannot apply '&' to {} and {}", lk, rk),
                    });
                }
            }
            ArithOp::Add | ArithOp::Sub => {
                if is_numeric(lk) && is_numeric(rk) {
                    if lk == ValueKind::Float || rk == ValueKind::Float {
                        ValueKind::Float
                    } else {
                        lk
                    }
                } else if lk == ValueKind::Duration && rk == ValueKind::Duration {
                    ValueKind::Duration
                } else {
                    return Err(FilterError::TypeMismatch {
                        loc,
                        message: format!("cannot apply '{}' to {} and {}", op, lk, rk),
                    });
                }
            }
        };
        Ok(CheckedExpr::Arith {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            kind,
            loc,
        })
    }

    fn check_call(&self, name: &str, args: &[Expr], loc: Location) -> Result<CheckedExpr> {
        let (func, signature) =
            self.functions
                .resolve(name)
                .ok_or_else(|| FilterError::UnknownIdentifier {
                    loc,
                    name: name.to_string(),
                })?;
        if !signature.accepts(args.len()) {
            let expected = match signature.max_args {
                Some(max) if max == signature.min_args => format!("{}", max),
                Some(max) => format!("{}..{}", signature.min_args, max),
                None => format!("at least {}", signature.min_args),
            };
            return Err(FilterError::Arity {
                loc,
                name: name.to_string(),
                expected,
                got: args.len(),
            });
        }
        let args = args
            .iter()
            .map(|a| self.check_expr(a, None))
            .collect::<Result<Vec<_>>>()?;
        Ok(CheckedExpr::Call {
            func,
            name: name.to_string(),
            args,
            kind: signature.return_kind,
            loc,
        })
    }
}

fn literal_of(expr: &Expr) -> Option<&Literal> {
    match expr {
        Expr::Literal { value, .. } => Some(value),
        _ => None,
    }
}

/// True when values of the two kinds can meet across an equality
/// comparison.
fn kinds_comparable(a: ValueKind, b: ValueKind) -> bool {
    a == b
        || is_numeric(a) && is_numeric(b)
        || is_stringish(a) && is_stringish(b)
}

fn kinds_ordered(a: ValueKind, _b: ValueKind) -> bool {
    !matches!(a, ValueKind::Bool)
}

/// Turn a written literal into a runtime value, guided by the kind of the
/// field it meets. Returns the value plus the coercion applied, if any.
pub fn classify_literal(
    lit: &Literal,
    expected: Option<ValueKind>,
    loc: Location,
) -> Result<(FieldValue, Option<Coercion>)> {
    match lit {
        Literal::Bool(b) => Ok((FieldValue::Bool(*b), None)),
        Literal::Int(v) => classify_int(*v, false, expected, loc),
        Literal::NegInt(v) => classify_int(*v, true, expected, loc),
        Literal::Float(f) => match expected {
            Some(ValueKind::Duration) => Ok((
                FieldValue::Duration(seconds_to_nanos_f(*f)),
                Some(Coercion::SecondsToDuration),
            )),
            Some(ValueKind::Time) => Ok((
                FieldValue::Time(seconds_to_nanos_f(*f)),
                Some(Coercion::SecondsToTime),
            )),
            _ => Ok((FieldValue::Float(*f), None)),
        },
        Literal::Str(s) => match expected {
            Some(ValueKind::Bytes) => Ok((
                FieldValue::Bytes(s.clone().into_bytes()),
                Some(Coercion::StrToBytes),
            )),
            _ => Ok((FieldValue::Str(s.clone()), None)),
        },
        Literal::Bytes(b) => match expected {
            Some(ValueKind::Ether) => {
                let ether: [u8; 6] = b.as_slice().try_into().map_err(|_| FilterError::Pattern {
                    loc,
                    message: format!("Ethernet address needs 6 bytes, got {}", b.len()),
                })?;
                Ok((FieldValue::Ether(ether), Some(Coercion::BytesToEther)))
            }
            _ => Ok((FieldValue::Bytes(b.clone()), None)),
        },
        Literal::Addr(raw) => classify_addr(raw, expected, loc),
        Literal::Pattern(_) => Err(FilterError::TypeMismatch {
            loc,
            message: "pattern literal is only valid after 'matches'".into(),
        }),
    }
}

fn classify_int(
    v: u64,
    negative: bool,
    expected: Option<ValueKind>,
    loc: Location,
) -> Result<(FieldValue, Option<Coercion>)> {
    let signed = || -> Result<i64> {
        let bound = if negative {
            i64::MIN.unsigned_abs()
        } else {
            i64::MAX as u64
        };
        if v > bound {
            return Err(FilterError::TypeMismatch {
                loc,
                message: "integer literal out of signed range".into(),
            });
        }
        Ok(if negative { (v as i64).wrapping_neg() } else { v as i64 })
    };
    match expected {
        Some(ValueKind::UInt) => {
            if negative {
                return Err(FilterError::TypeMismatch {
                    loc,
                    message: "negative literal against an unsigned field".into(),
                });
            }
            Ok((FieldValue::UInt(v), None))
        }
        Some(ValueKind::Int) => Ok((FieldValue::Int(signed()?), Some(Coercion::IntWiden))),
        Some(ValueKind::Float) => {
            let f = v as f64;
            Ok((
                FieldValue::Float(if negative { -f } else { f }),
                Some(Coercion::IntToFloat),
            ))
        }
        Some(ValueKind::Bool) => Ok((FieldValue::Bool(v != 0), Some(Coercion::IntToBool))),
        Some(ValueKind::Duration) => Ok((
            FieldValue::Duration(seconds_to_nanos(signed()?)),
            Some(Coercion::SecondsToDuration),
        )),
        Some(ValueKind::Time) => Ok((
            FieldValue::Time(seconds_to_nanos(signed()?)),
            Some(Coercion::SecondsToTime),
        )),
        Some(ValueKind::Ipv4) => {
            if negative || v > u32::MAX as u64 {
                return Err(FilterError::TypeMismatch {
                    loc,
                    message: "integer literal does not fit an IPv4 address".into(),
                });
            }
            Ok((
                FieldValue::Ipv4(Ipv4Addr::from(v as u32)),
                Some(Coercion::IntToAddr),
            ))
        }
        _ => {
            if negative {
                Ok((FieldValue::Int(signed()?), None))
            } else {
                Ok((FieldValue::UInt(v), None))
            }
        }
    }
}

fn seconds_to_nanos(secs: i64) -> i64 {
    secs.saturating_mul(1_000_000_000)
}

fn seconds_to_nanos_f(secs: f64) -> i64 {
    (secs * 1e9) as i64
}

/// Validate and classify an address-shaped literal. The lexer only
/// checked the shape; octet ranges and prefix widths are enforced here.
fn classify_addr(
    raw: &str,
    expected: Option<ValueKind>,
    loc: Location,
) -> Result<(FieldValue, Option<Coercion>)> {
    let (addr_part, prefix) = match raw.split_once('/') {
        Some((a, p)) => {
            let bits = p.parse::<u8>().map_err(|_| FilterError::Pattern {
                loc,
                message: format!("invalid prefix length '{}'", p),
            })?;
            (a, Some(bits))
        }
        None => (raw, None),
    };

    let value = if let Ok(v4) = addr_part.parse::<Ipv4Addr>() {
        match prefix {
            None => FieldValue::Ipv4(v4),
            Some(bits) if bits <= 32 => FieldValue::Ipv4Net(v4, bits),
            Some(bits) => {
                return Err(FilterError::Pattern {
                    loc,
                    message: format!("IPv4 prefix length {} exceeds 32", bits),
                })
            }
        }
    } else if let Ok(v6) = addr_part.parse::<Ipv6Addr>() {
        match prefix {
            None => FieldValue::Ipv6(v6),
            Some(bits) if bits <= 128 => FieldValue::Ipv6Net(v6, bits),
            Some(bits) => {
                return Err(FilterError::Pattern {
                    loc,
                    message: format!("IPv6 prefix length {} exceeds 128", bits),
                })
            }
        }
    } else {
        return Err(FilterError::Pattern {
            loc,
            message: format!("malformed address literal '{}'", raw),
        });
    };

    match (expected, value.kind()) {
        (None, _) => Ok((value, Some(Coercion::AddrClassified))),
        (Some(want), got) if want == got => Ok((value, Some(Coercion::AddrClassified))),
        (Some(want), got) => Err(FilterError::TypeMismatch {
            loc,
            message: format!("address literal of kind {} against a {} field", got, want),
        }),
    }
}
