//! Recursive-descent parser: token stream in, AST out.
//!
//! Precedence, low to high: `||`, `&&`, `!` (prefix), comparison and
//! membership (non-associative), additive/bitwise, unary minus, postfix
//! occurrence/slice, primary. Parsing halts at the first error; the whole
//! input must form one expression, trailing tokens are a syntax error at
//! the first unexpected token.

use crate::ast::{ArithOp, CmpOp, Expr, Literal, LogicalOp, SetMember, SliceSpec};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::loc::Location;
use crate::{FilterError, Result};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            peeked: None,
        }
    }

    /// Parse one complete filter expression from `input`.
    pub fn parse(input: &'a str) -> Result<Expr> {
        let mut parser = Parser::new(input);
        let expr = parser.parse_or()?;
        let trailing = parser.peek()?.clone();
        if !trailing.is_eof() {
            return Err(FilterError::Syntax {
                loc: trailing.loc,
                message: format!("unexpected '{}' after expression", trailing.text),
            });
        }
        Ok(expr)
    }

    fn peek(&mut self) -> Result<&Token> {
        if self.peeked.is_none() {
            self.peeked = Some(self.advance()?);
        }
        Ok(self.peeked.as_ref().unwrap())
    }

    fn next(&mut self) -> Result<Token> {
        match self.peeked.take() {
            Some(tok) => Ok(tok),
            None => self.advance(),
        }
    }

    fn advance(&mut self) -> Result<Token> {
        // the lexer yields Eof exactly once; treat exhaustion beyond it
        // as a stuck Eof so error paths cannot loop
        let tok = self.lexer.next().unwrap_or(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            loc: Location::EMPTY,
        });
        if let TokenKind::Error(msg) = &tok.kind {
            return Err(FilterError::Lex {
                loc: tok.loc,
                message: msg.clone(),
            });
        }
        Ok(tok)
    }

    /// True when the upcoming token is the given word operator.
    fn peek_word(&mut self, word: &str) -> Result<bool> {
        Ok(matches!(&self.peek()?.kind, TokenKind::Ident(w) if w == word))
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        loop {
            let is_or = matches!(self.peek()?.kind, TokenKind::OrOr) || self.peek_word("or")?;
            if !is_or {
                return Ok(lhs);
            }
            self.next()?;
            let rhs = self.parse_and()?;
            let loc = lhs.loc().to(rhs.loc());
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                loc,
            };
        }
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        loop {
            let is_and = matches!(self.peek()?.kind, TokenKind::AndAnd) || self.peek_word("and")?;
            if !is_and {
                return Ok(lhs);
            }
            self.next()?;
            let rhs = self.parse_not()?;
            let loc = lhs.loc().to(rhs.loc());
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                loc,
            };
        }
    }

    fn parse_not(&mut self) -> Result<Expr> {
        let is_not = matches!(self.peek()?.kind, TokenKind::Bang) || self.peek_word("not")?;
        if is_not {
            let tok = self.next()?;
            let inner = self.parse_not()?;
            let loc = tok.loc.to(inner.loc());
            return Ok(Expr::Not {
                inner: Box::new(inner),
                loc,
            });
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Result<Option<CmpOp>> {
        let op = match &self.peek()?.kind {
            TokenKind::EqEq => Some(CmpOp::Eq),
            TokenKind::Neq => Some(CmpOp::Ne),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::Ge => Some(CmpOp::Ge),
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::Le => Some(CmpOp::Le),
            TokenKind::Ident(w) if w == "contains" => Some(CmpOp::Contains),
            TokenKind::Ident(w) if w == "matches" => Some(CmpOp::Matches),
            _ => None,
        };
        Ok(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let lhs = self.parse_additive()?;

        if self.peek_word("in")? {
            self.next()?;
            return self.parse_set_test(lhs);
        }

        let Some(op) = self.comparison_op()? else {
            return Ok(lhs);
        };
        self.next()?;
        let rhs = self.parse_additive()?;

        // comparisons and membership are non-associative
        if self.comparison_op()?.is_some() || self.peek_word("in")? {
            let tok = self.peek()?;
            return Err(FilterError::Syntax {
                loc: tok.loc,
                message: "comparisons cannot be chained".into(),
            });
        }

        let loc = lhs.loc().to(rhs.loc());
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            loc,
        })
    }

    fn parse_set_test(&mut self, subject: Expr) -> Result<Expr> {
        let open = self.next()?;
        if open.kind != TokenKind::LBrace {
            return Err(FilterError::Syntax {
                loc: open.loc,
                message: "expected '{' after 'in'".into(),
            });
        }
        let mut set = Vec::new();
        loop {
            if self.peek()?.kind == TokenKind::RBrace {
                break;
            }
            let (lo, lo_loc) = self.parse_set_literal()?;
            if self.peek()?.kind == TokenKind::DotDot {
                self.next()?;
                let (hi, hi_loc) = self.parse_set_literal()?;
                set.push(SetMember::Range(lo, hi, lo_loc.to(hi_loc)));
            } else {
                set.push(SetMember::Single(lo, lo_loc));
            }
            // comma separators are optional; whitespace alone also works
            if self.peek()?.kind == TokenKind::Comma {
                self.next()?;
            }
        }
        let close = self.next()?;
        let loc = subject.loc().to(close.loc);
        Ok(Expr::In {
            subject: Box::new(subject),
            set,
            loc,
        })
    }

    fn parse_set_literal(&mut self) -> Result<(Literal, Location)> {
        let tok = self.next()?;
        let lit = match tok.kind {
            TokenKind::Int(v) => Literal::Int(v),
            TokenKind::Float(v) => Literal::Float(v),
            TokenKind::Str(s) => Literal::Str(s),
            TokenKind::ByteChain(b) => Literal::Bytes(b),
            TokenKind::Addr(a) => Literal::Addr(a),
            TokenKind::Minus => {
                let num = self.next()?;
                return match num.kind {
                    TokenKind::Int(v) => Ok((Literal::NegInt(v), tok.loc.to(num.loc))),
                    TokenKind::Float(v) => Ok((Literal::Float(-v), tok.loc.to(num.loc))),
                    _ => Err(FilterError::Syntax {
                        loc: num.loc,
                        message: "expected number after '-'".into(),
                    }),
                };
            }
            _ => {
                return Err(FilterError::Syntax {
                    loc: tok.loc,
                    message: format!("expected a literal in set, found '{}'", tok.text),
                })
            }
        };
        Ok((lit, tok.loc))
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::Plus => ArithOp::Add,
                TokenKind::Minus => ArithOp::Sub,
                TokenKind::Amp => ArithOp::BitAnd,
                _ => return Ok(lhs),
            };
            self.next()?;
            let rhs = self.parse_unary()?;
            let loc = lhs.loc().to(rhs.loc());
            lhs = Expr::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                loc,
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.peek()?.kind == TokenKind::Minus {
            let minus = self.next()?;
            let tok = self.next()?;
            let (value, loc) = match tok.kind {
                TokenKind::Int(v) => (Literal::NegInt(v), minus.loc.to(tok.loc)),
                TokenKind::Float(v) => (Literal::Float(-v), minus.loc.to(tok.loc)),
                _ => {
                    return Err(FilterError::Syntax {
                        loc: tok.loc,
                        message: "expected number after unary '-'".into(),
                    })
                }
            };
            return Ok(Expr::Literal { value, loc });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek()?.kind {
                TokenKind::Occurrence(n) => {
                    let tok = self.next()?;
                    match &mut expr {
                        Expr::FieldRef {
                            occurrence, loc, ..
                        } if occurrence.is_none() => {
                            *occurrence = Some(n);
                            *loc = loc.to(tok.loc);
                        }
                        _ => {
                            return Err(FilterError::Syntax {
                                loc: tok.loc,
                                message: "occurrence index is only valid on a field".into(),
                            })
                        }
                    }
                }
                TokenKind::LBracket => {
                    let open = self.next()?;
                    let spec = self.parse_slice_spec(&open)?;
                    let close = self.next()?;
                    if close.kind != TokenKind::RBracket {
                        return Err(FilterError::Syntax {
                            loc: close.loc,
                            message: "expected ']' to close slice".into(),
                        });
                    }
                    match &mut expr {
                        Expr::FieldRef { slice, loc, .. } if slice.is_none() => {
                            *slice = Some(spec);
                            *loc = loc.to(close.loc);
                        }
                        _ => {
                            return Err(FilterError::Syntax {
                                loc: open.loc.to(close.loc),
                                message: "slice is only valid on a field".into(),
                            })
                        }
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_slice_spec(&mut self, open: &Token) -> Result<SliceSpec> {
        let start_tok = self.next()?;
        let TokenKind::Int(start) = start_tok.kind else {
            return Err(FilterError::Syntax {
                loc: start_tok.loc,
                message: "expected slice start offset".into(),
            });
        };
        let start = start as usize;
        match self.peek()?.kind {
            TokenKind::Colon => {
                self.next()?;
                let len_tok = self.next()?;
                let TokenKind::Int(len) = len_tok.kind else {
                    return Err(FilterError::Syntax {
                        loc: len_tok.loc,
                        message: "expected slice length after ':'".into(),
                    });
                };
                Ok(SliceSpec::Length {
                    start,
                    len: len as usize,
                })
            }
            TokenKind::Minus => {
                self.next()?;
                let end_tok = self.next()?;
                let TokenKind::Int(end) = end_tok.kind else {
                    return Err(FilterError::Syntax {
                        loc: end_tok.loc,
                        message: "expected slice end after '-'".into(),
                    });
                };
                let end = end as usize;
                if end < start {
                    return Err(FilterError::Syntax {
                        loc: open.loc.to(end_tok.loc),
                        message: "slice end precedes start".into(),
                    });
                }
                Ok(SliceSpec::Bounds { start, end })
            }
            // single index selects one byte
            _ => Ok(SliceSpec::Length { start, len: 1 }),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                let close = self.next()?;
                if close.kind != TokenKind::RParen {
                    return Err(FilterError::Syntax {
                        loc: close.loc,
                        message: "expected ')'".into(),
                    });
                }
                Ok(inner)
            }
            TokenKind::Int(v) => Ok(Expr::Literal {
                value: Literal::Int(v),
                loc: tok.loc,
            }),
            TokenKind::Float(v) => Ok(Expr::Literal {
                value: Literal::Float(v),
                loc: tok.loc,
            }),
            TokenKind::Str(s) => Ok(Expr::Literal {
                value: Literal::Str(s),
                loc: tok.loc,
            }),
            TokenKind::ByteChain(b) => Ok(Expr::Literal {
                value: Literal::Bytes(b),
                loc: tok.loc,
            }),
            TokenKind::Addr(a) => Ok(Expr::Literal {
                value: Literal::Addr(a),
                loc: tok.loc,
            }),
            TokenKind::Regex(p) => Ok(Expr::Literal {
                value: Literal::Pattern(p),
                loc: tok.loc,
            }),
            TokenKind::Ident(name) => {
                match name.as_str() {
                    "true" => {
                        return Ok(Expr::Literal {
                            value: Literal::Bool(true),
                            loc: tok.loc,
                        })
                    }
                    "false" => {
                        return Ok(Expr::Literal {
                            value: Literal::Bool(false),
                            loc: tok.loc,
                        })
                    }
                    // word operators can never start an expression
                    "and" | "or" | "not" | "in" | "contains" | "matches" => {
                        return Err(FilterError::Syntax {
                            loc: tok.loc,
                            message: format!("unexpected '{}'", name),
                        });
                    }
                    _ => {}
                }
                if self.peek()?.kind == TokenKind::LParen {
                    return self.parse_call(name, tok.loc);
                }
                Ok(Expr::FieldRef {
                    name,
                    occurrence: None,
                    slice: None,
                    loc: tok.loc,
                })
            }
            TokenKind::Eof => Err(FilterError::Syntax {
                loc: tok.loc,
                message: "unexpected end of filter".into(),
            }),
            _ => Err(FilterError::Syntax {
                loc: tok.loc,
                message: format!("unexpected '{}'", tok.text),
            }),
        }
    }

    fn parse_call(&mut self, name: String, name_loc: Location) -> Result<Expr> {
        self.next()?; // '('
        let mut args = Vec::new();
        if self.peek()?.kind != TokenKind::RParen {
            loop {
                args.push(self.parse_or()?);
                if self.peek()?.kind == TokenKind::Comma {
                    self.next()?;
                } else {
                    break;
                }
            }
        }
        let close = self.next()?;
        if close.kind != TokenKind::RParen {
            return Err(FilterError::Syntax {
                loc: close.loc,
                message: "expected ')' after function arguments".into(),
            });
        }
        Ok(Expr::Call {
            name,
            args,
            loc: name_loc.to(close.loc),
        })
    }
}
