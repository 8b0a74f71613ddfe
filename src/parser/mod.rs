pub mod ast;

use crate::diagnostics::CompileError;
use crate::lexer::token::Token;
use crate::span::{Span, Spanned};
use crate::typeck::kind::{Family, Kind};
use ast::*;

pub struct Parser<'a> {
    tokens: &'a [Spanned<Token>],
    source: &'a str,
    pos: usize,
    file_id: u32,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Spanned<Token>], source: &'a str, file_id: u32) -> Self {
        Self { tokens, source, pos: 0, file_id }
    }

    fn peek(&self) -> Option<&Spanned<Token>> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, expected: &Token) -> bool {
        self.peek()
            .is_some_and(|t| std::mem::discriminant(&t.node) == std::mem::discriminant(expected))
    }

    fn peek_nth_is(&self, n: usize, expected: &Token) -> bool {
        self.tokens
            .get(self.pos + n)
            .is_some_and(|t| std::mem::discriminant(&t.node) == std::mem::discriminant(expected))
    }

    fn advance(&mut self) -> Option<&Spanned<Token>> {
        if self.pos < self.tokens.len() {
            let tok = &self.tokens[self.pos];
            self.pos += 1;
            Some(tok)
        } else {
            None
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek_is(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span, CompileError> {
        match self.tokens.get(self.pos) {
            Some(tok) if std::mem::discriminant(&tok.node) == std::mem::discriminant(expected) => {
                self.pos += 1;
                Ok(tok.span)
            }
            Some(tok) => Err(CompileError::syntax(
                format!("expected {expected}, found {}", tok.node),
                tok.span,
            )),
            None => Err(CompileError::syntax(
                format!("expected {expected}, found end of file"),
                self.eof_span(),
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, CompileError> {
        match self.tokens.get(self.pos) {
            Some(tok) if matches!(tok.node, Token::Ident) => {
                let name = self.source[tok.span.start..tok.span.end].to_string();
                self.pos += 1;
                Ok(Spanned::new(name, tok.span))
            }
            Some(tok) => Err(CompileError::syntax(
                format!("expected identifier, found {}", tok.node),
                tok.span,
            )),
            None => Err(CompileError::syntax(
                "expected identifier, found end of file",
                self.eof_span(),
            )),
        }
    }

    fn eof_span(&self) -> Span {
        match self.tokens.last() {
            Some(last) => Span::with_file(last.span.end, last.span.end, self.file_id),
            None => Span::with_file(0, 0, self.file_id),
        }
    }

    fn current_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or_else(|| self.eof_span())
    }

    pub fn parse_module(&mut self) -> Result<Module, CompileError> {
        let mut imports = Vec::new();
        let mut functions = Vec::new();

        while self.peek_is(&Token::Import) {
            self.advance();
            imports.push(self.expect_ident()?);
        }

        while let Some(tok) = self.peek() {
            match tok.node {
                Token::Sync | Token::Native | Token::Func => functions.push(self.parse_function()?),
                Token::Import => {
                    return Err(CompileError::syntax(
                        "imports must come before function declarations",
                        tok.span,
                    ));
                }
                ref other => {
                    return Err(CompileError::syntax(
                        format!("expected function declaration, found {other}"),
                        tok.span,
                    ));
                }
            }
        }

        Ok(Module { imports, functions })
    }

    fn parse_function(&mut self) -> Result<Spanned<FunctionDecl>, CompileError> {
        let start = self.current_span();
        let is_sync = self.eat(&Token::Sync);
        let is_native = self.eat(&Token::Native);
        self.expect(&Token::Func)?;
        let name = self.expect_ident()?;

        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.peek_is(&Token::RParen) {
            loop {
                let param_name = self.expect_ident()?;
                self.expect(&Token::Colon)?;
                let kind = self.parse_kind()?;
                params.push(Param { name: param_name, kind });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        self.expect(&Token::Colon)?;
        let returns = self.parse_returns()?;

        let body = if self.peek_is(&Token::LBrace) {
            if is_native {
                return Err(CompileError::syntax(
                    format!("native function `{}` cannot have a body", name.node),
                    self.current_span(),
                ));
            }
            Some(self.parse_block()?)
        } else {
            if !is_native {
                return Err(CompileError::syntax(
                    format!("function `{}` is missing a body", name.node),
                    self.current_span(),
                ));
            }
            None
        };

        let end = body.as_ref().map(|b| b.span).unwrap_or(name.span);
        Ok(Spanned::new(
            FunctionDecl { name, is_sync, is_native, params, returns, body },
            start.to(end),
        ))
    }

    fn parse_returns(&mut self) -> Result<Vec<Spanned<Kind>>, CompileError> {
        if !self.eat(&Token::LParen) {
            return Ok(vec![self.parse_kind()?]);
        }
        let mut kinds = Vec::new();
        if !self.peek_is(&Token::RParen) {
            loop {
                kinds.push(self.parse_kind()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(kinds)
    }

    fn parse_kind(&mut self) -> Result<Spanned<Kind>, CompileError> {
        let start = self.current_span();
        let borrowed = self.eat(&Token::Amp);
        let name = self.expect_ident()?;
        let family = Family::from_name(&name.node).ok_or_else(|| {
            CompileError::syntax(format!("unknown type `{}`", name.node), name.span)
        })?;
        let mut end = name.span;
        let mut args = Vec::new();
        if self.eat(&Token::Lt) {
            if family != Family::Tuple {
                return Err(CompileError::syntax(
                    format!("type `{}` does not take arguments", name.node),
                    name.span,
                ));
            }
            loop {
                args.push(self.parse_kind()?.node);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            end = self.expect(&Token::Gt)?;
        }
        Ok(Spanned::new(Kind { borrowed, family, args }, start.to(end)))
    }

    fn parse_block(&mut self) -> Result<Spanned<Block>, CompileError> {
        let open = self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.peek_is(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(CompileError::syntax("unclosed block, expected }", self.eof_span()));
            }
            stmts.push(self.parse_stmt()?);
        }
        let close = self.expect(&Token::RBrace)?;
        Ok(Spanned::new(Block { stmts }, open.to(close)))
    }

    fn parse_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.current_span();
        let (stmt, end) = match self.peek().map(|t| &t.node) {
            Some(Token::Let) => {
                self.advance();
                let mut names = vec![self.expect_ident()?];
                while self.eat(&Token::Comma) {
                    names.push(self.expect_ident()?);
                }
                self.expect(&Token::Eq)?;
                let value = self.parse_expr()?;
                let end = value.span;
                (Stmt::Let { names, value }, end)
            }
            Some(Token::Return) => {
                let kw = self.expect(&Token::Return)?;
                if self.peek_is(&Token::RBrace) {
                    (Stmt::Return { value: None }, kw)
                } else {
                    let value = self.parse_expr()?;
                    let end = value.span;
                    (Stmt::Return { value: Some(value) }, end)
                }
            }
            Some(Token::If) => {
                self.advance();
                let cond = self.parse_expr()?;
                let then_block = self.parse_block()?;
                let else_block = if self.eat(&Token::Else) {
                    self.parse_block()?
                } else {
                    Spanned::new(Block::default(), Span::with_file(then_block.span.end, then_block.span.end, self.file_id))
                };
                let end = else_block.span.to(then_block.span);
                (Stmt::If { cond, then_block, else_block }, end)
            }
            Some(Token::While) => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                let end = body.span;
                (Stmt::While { cond, body }, end)
            }
            _ => {
                let expr = self.parse_expr()?;
                let end = expr.span;
                (Stmt::Expr(expr), end)
            }
        };
        Ok(Spanned::new(stmt, start.to(end)))
    }

    pub fn parse_expr(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let lhs = self.parse_operand()?;
        let op = match self.peek().map(|t| &t.node) {
            Some(Token::EqEq) => CompareOp::Eq,
            Some(Token::BangEq) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::LtEq) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::GtEq) => CompareOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_operand()?;
        let span = lhs.span.to(rhs.span);
        Ok(Spanned::new(Expr::Compare { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span))
    }

    fn parse_operand(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let Some(tok) = self.advance().cloned() else {
            return Err(CompileError::syntax("expected expression, found end of file", self.eof_span()));
        };
        let span = tok.span;
        match &tok.node {
            Token::IntLit(n) => Ok(Spanned::new(Expr::IntLit(*n), span)),
            Token::StringLit(s) => Ok(Spanned::new(Expr::StringLit(s.clone()), span)),
            Token::True => Ok(Spanned::new(Expr::BoolLit(true), span)),
            Token::False => Ok(Spanned::new(Expr::BoolLit(false), span)),
            Token::Ident => {
                let name = self.source[span.start..span.end].to_string();
                if self.peek_is(&Token::LParen) {
                    self.parse_call(Spanned::new(name, span))
                } else {
                    Ok(Spanned::new(Expr::Ident(name), span))
                }
            }
            Token::LParen => {
                let mut items = Vec::new();
                if !self.peek_is(&Token::RParen) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                let close = self.expect(&Token::RParen)?;
                let span = span.to(close);
                if items.len() == 1 {
                    let mut inner = items.remove(0);
                    inner.span = span;
                    Ok(inner)
                } else {
                    Ok(Spanned::new(Expr::Tuple(items), span))
                }
            }
            other => Err(CompileError::syntax(format!("expected expression, found {other}"), span)),
        }
    }

    fn parse_call(&mut self, callee: Spanned<String>) -> Result<Spanned<Expr>, CompileError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.peek_is(&Token::RParen) {
            loop {
                if self.peek_is(&Token::Amp) && self.peek_nth_is(1, &Token::Ident) {
                    self.advance();
                    args.push(CallArg::Borrow(self.expect_ident()?));
                } else {
                    args.push(CallArg::Value(self.parse_expr()?));
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(&Token::RParen)?;
        let span = callee.span.to(close);
        Ok(Spanned::new(Expr::Call { callee, args }, span))
    }
}

/// Lex and parse one module's text.
pub fn parse_module(source: &str, file_id: u32) -> Result<Module, CompileError> {
    let tokens = crate::lexer::lex(source, file_id)?;
    Parser::new(&tokens, source, file_id).parse_module()
}
