//! Statement and block parsing.

use omnix_lexer::token::TokenKind;
use omnix_types::ast::*;

use crate::parser::{PResult, Parser};

impl Parser {
    /// `{ statements... }`
    pub(crate) fn parse_block(&mut self) -> PResult<Block> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Ok(Block { stmts, span })
    }

    /// Parse one statement.
    pub(crate) fn parse_stmt(&mut self) -> PResult<Stmt> {
        match self.peek_kind() {
            TokenKind::Let => self.parse_let(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => Ok(Stmt::If(self.parse_if()?)),
            TokenKind::When => self.parse_when(),
            TokenKind::Phase => self.parse_phase(),
            TokenKind::Broadcast => self.parse_broadcast(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            _ => self.parse_expr_or_assignment(),
        }
    }

    /// `let name (: type)? = expr;`
    fn parse_let(&mut self) -> PResult<Stmt> {
        let start = self.expect(&TokenKind::Let)?.span;
        let name = self.expect_identifier()?;
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(&TokenKind::Assign)?;
        let value = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon)?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::Let(LetStmt {
            name,
            ty,
            value,
            span,
        }))
    }

    /// `return expr?;`
    fn parse_return(&mut self) -> PResult<Stmt> {
        let start = self.expect(&TokenKind::Return)?.span;
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::Return(ReturnStmt { value, span }))
    }

    /// `if cond { } else (if ... | { })`
    fn parse_if(&mut self) -> PResult<IfStmt> {
        let start = self.expect(&TokenKind::If)?.span;
        let condition = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(ElseBranch::ElseIf(Box::new(self.parse_if()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        Ok(IfStmt {
            condition,
            then_block,
            else_branch,
            span,
        })
    }

    /// `when cond { }`: no else branch.
    fn parse_when(&mut self) -> PResult<Stmt> {
        let start = self.expect(&TokenKind::When)?.span;
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::When(WhenStmt {
            condition,
            body,
            span,
        }))
    }

    /// `phase name { }`
    fn parse_phase(&mut self) -> PResult<Stmt> {
        let start = self.expect(&TokenKind::Phase)?.span;
        let name = self.expect_identifier()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::Phase(PhaseStmt { name, body, span }))
    }

    /// `broadcast(expr);`
    fn parse_broadcast(&mut self) -> PResult<Stmt> {
        let start = self.expect(&TokenKind::Broadcast)?.span;
        self.expect(&TokenKind::LParen)?;
        let message = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Semicolon)?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::Broadcast(BroadcastStmt { message, span }))
    }

    /// `for item in iterable { }`
    fn parse_for(&mut self) -> PResult<Stmt> {
        let start = self.expect(&TokenKind::For)?.span;
        let item = self.expect_identifier()?;
        self.expect(&TokenKind::In)?;
        let iterable = self.parse_expr()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::For(ForStmt {
            item,
            iterable,
            body,
            span,
        }))
    }

    /// `while cond { }`
    fn parse_while(&mut self) -> PResult<Stmt> {
        let start = self.expect(&TokenKind::While)?.span;
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::While(WhileStmt {
            condition,
            body,
            span,
        }))
    }

    /// Assignment (`place = expr;`) or a bare expression statement.
    fn parse_expr_or_assignment(&mut self) -> PResult<Stmt> {
        let expr = self.parse_expr()?;

        if self.check(&TokenKind::Assign) {
            if !is_place(&expr) {
                return Err(self.error("assignable target"));
            }
            self.advance();
            let value = self.parse_expr()?;
            self.expect(&TokenKind::Semicolon)?;
            let span = expr.span.merge(self.previous_span());
            return Ok(Stmt::Assign(AssignStmt {
                target: expr,
                value,
                span,
            }));
        }

        self.expect(&TokenKind::Semicolon)?;
        let span = expr.span.merge(self.previous_span());
        Ok(Stmt::Expr(ExprStmt { expr, span }))
    }
}

/// An expression that can appear on the left of `=`.
fn is_place(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
    )
}
