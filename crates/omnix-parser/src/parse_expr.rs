//! Expression parsing: precedence ladder and primaries.
//!
//! Lowest to highest: consensus suffix → `||` → `&&` → equality →
//! relational → additive → multiplicative → unary → postfix → primary.
//! The consensus suffix binds over the entire lower-precedence expression
//! already parsed, not just its rightmost operand.

use omnix_lexer::token::TokenKind;
use omnix_types::ast::*;

use crate::parser::{PResult, Parser};

impl Parser {
    /// Parse a full expression, including any consensus suffix.
    pub(crate) fn parse_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_or()?;

        while self.peek_kind().is_consensus_op() {
            let op = match self.advance().kind {
                TokenKind::Propose => ConsensusOp::Propose,
                TokenKind::Vote => ConsensusOp::Vote,
                TokenKind::Merge => ConsensusOp::Merge,
                TokenKind::Query => ConsensusOp::Query,
                _ => unreachable!("is_consensus_op checked"),
            };

            let mut options = Vec::new();
            let mut operand = None;
            if self.check(&TokenKind::LBrace) {
                options = self.parse_property_block()?;
            } else if self.at_expression_start() {
                operand = Some(Box::new(self.parse_or()?));
            }

            let span = expr.span.merge(self.previous_span());
            expr = Expr::new(
                ExprKind::Consensus(ConsensusExpr {
                    op,
                    target: Box::new(expr),
                    operand,
                    options,
                }),
                span,
            );
        }

        Ok(expr)
    }

    /// `true` if the current token can begin an expression.
    fn at_expression_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::Duration { .. }
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Identifier(_)
                | TokenKind::Algorithm(_)
                | TokenKind::Network(_)
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::Minus
                | TokenKind::Bang
        )
    }

    // ── Binary ladder ─────────────────────────────────────────────────────────

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEq => BinaryOp::GreaterEq,
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEq => BinaryOp::LessEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        let start = self.advance().span;
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    // ── Postfix ───────────────────────────────────────────────────────────────

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_call_args()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_name()?;
                    let span = expr.span.merge(property.span);
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Arguments after `(` (already consumed) up to and including `)`.
    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    // ── Primary ───────────────────────────────────────────────────────────────

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.current_span();
        match self.peek_kind().clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(n), span))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Float(n), span))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(s), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(true), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(false), span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::new(ExprKind::Null, span))
            }
            TokenKind::Duration { value, unit } => {
                self.advance();
                Ok(Expr::new(ExprKind::Duration { value, unit }, span))
            }
            TokenKind::Algorithm(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Algorithm(name), span))
            }
            // Network names appearing as expressions evaluate to their
            // own name; structurally they only matter in @cross_chain.
            TokenKind::Network(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(name), span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::ColonColon) {
                    self.advance();
                    let member = self.expect_identifier()?;
                    let full = span.merge(member.span);
                    Ok(Expr::new(
                        ExprKind::StaticAccess {
                            target: Ident::new(name, span),
                            member,
                        },
                        full,
                    ))
                } else {
                    Ok(Expr::new(ExprKind::Identifier(name), span))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                let full = span.merge(self.previous_span());
                Ok(Expr::new(ExprKind::Array(elements), full))
            }
            TokenKind::LBrace => {
                let entries = self.parse_property_block()?;
                let full = span.merge(self.previous_span());
                Ok(Expr::new(ExprKind::Object(entries), full))
            }
            _ => Err(self.error("expression")),
        }
    }

    /// `{ key: expr, ... }`: object literals and consensus options blocks.
    /// Trailing commas are allowed.
    pub(crate) fn parse_property_block(&mut self) -> PResult<Vec<Property>> {
        self.expect(&TokenKind::LBrace)?;
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            let key = self.expect_name()?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expr()?;
            entries.push(Property { key, value });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(entries)
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.merge(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}
