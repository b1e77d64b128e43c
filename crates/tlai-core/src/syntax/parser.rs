//! TLA+ parser: recursive descent with Pratt expression parsing
//!
//! Parses the supported subset straight into the spanned AST. Bullet
//! conjunction/disjunction lists are layout-aware: the column of the
//! `/\` or `\/` bullet decides list membership, so
//!
//! ```text
//! Next == \/ /\ x' = x + 1
//!            /\ UNCHANGED y
//!         \/ y' = y + 1
//! ```
//!
//! parses as a two-item disjunction whose first item is a two-item
//! conjunction. Junction tracking is suspended inside brackets.
//!
//! The parser is fail-fast: the first error aborts the parse, which is
//! what the syntax rewriter's fixpoint loop needs.

use crate::ast::{
    BoundPattern, BoundVar, CaseArm, ExceptPathElem, ExceptSpec, Expr, Module, OperatorDef, Unit,
};
use crate::span::{Span, Spanned};
use crate::syntax::lexer::Token;
use logos::Logos;
use num_bigint::BigInt;

/// A parse error with location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

type PResult<T> = Result<T, ParseError>;

/// A lexed token with its span and column (for layout-aware parsing)
#[derive(Debug, Clone, Copy)]
struct ParsedToken {
    kind: Token,
    start: u32,
    end: u32,
    /// Column number (0-indexed) of the token start
    column: u32,
}

/// Junction list type (bullet-style conjunction or disjunction)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JunctionType {
    Conjunction,
    Disjunction,
}

impl JunctionType {
    fn token(self) -> Token {
        match self {
            JunctionType::Conjunction => Token::And,
            JunctionType::Disjunction => Token::Or,
        }
    }
}

/// The parser state
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<ParsedToken>,
    pos: usize,
    /// Stack of active junction list columns, innermost last
    junction: Vec<(JunctionType, u32)>,
}

/// Parse a full module from source text
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let mut parser = Parser::new(source)?;
    let module = parser.module()?;
    parser.expect_eof()?;
    Ok(module)
}

/// Parse a standalone expression (used for constant bindings)
pub fn parse_expression(source: &str) -> Result<Spanned<Expr>, ParseError> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> PResult<Self> {
        let mut tokens = Vec::new();
        let mut line_start = 0u32;
        let mut scan = 0usize;
        for (result, range) in Token::lexer(source).spanned() {
            // Track line starts up to this token for column computation
            while scan < range.start {
                if source.as_bytes()[scan] == b'\n' {
                    line_start = scan as u32 + 1;
                }
                scan += 1;
            }
            let start = range.start as u32;
            let end = range.end as u32;
            match result {
                Ok(token) if token.is_trivia() => {}
                Ok(token) => tokens.push(ParsedToken {
                    kind: token,
                    start,
                    end,
                    column: start - line_start,
                }),
                Err(()) => {
                    return Err(ParseError::new(
                        format!("unrecognized token `{}`", &source[range]),
                        Span::new(start, end),
                    ))
                }
            }
        }
        Ok(Parser {
            source,
            tokens,
            pos: 0,
            junction: Vec::new(),
        })
    }

    // === Token access ===

    fn peek(&self) -> Option<&ParsedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<Token> {
        self.peek().map(|t| t.kind)
    }

    fn nth_kind(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).map(|t| t.kind)
    }

    fn at(&self, kind: Token) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn bump(&mut self) -> ParsedToken {
        let tok = self.tokens[self.pos];
        self.pos += 1;
        tok
    }

    fn eat(&mut self, kind: Token) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: Token, what: &str) -> PResult<ParsedToken> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error_here(format!("expected {}", what)))
        }
    }

    fn error_here(&self, message: String) -> ParseError {
        let span = self
            .peek()
            .map(|t| Span::new(t.start, t.end))
            .unwrap_or_else(|| {
                let end = self.source.len() as u32;
                Span::new(end, end)
            });
        ParseError::new(message, span)
    }

    fn token_text(&self, tok: &ParsedToken) -> &'a str {
        &self.source[tok.start as usize..tok.end as usize]
    }

    fn prev_end(&self) -> u32 {
        self.tokens[self.pos.saturating_sub(1)].end
    }

    fn expect_eof(&mut self) -> PResult<()> {
        if self.pos < self.tokens.len() {
            Err(self.error_here("unexpected trailing input".to_string()))
        } else {
            Ok(())
        }
    }

    /// Run `f` with junction tracking suspended (inside brackets)
    fn with_junction_barrier<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<T> {
        let saved = std::mem::take(&mut self.junction);
        let result = f(self);
        self.junction = saved;
        result
    }

    /// Try `f`; on failure restore the token position and report None
    fn try_parse<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> Option<T> {
        let saved_pos = self.pos;
        match f(self) {
            Ok(v) => Some(v),
            Err(_) => {
                self.pos = saved_pos;
                None
            }
        }
    }

    // === Module structure ===

    fn module(&mut self) -> PResult<Module> {
        let start = self.expect(Token::ModuleStart, "module header `----`")?.start;
        self.expect(Token::Module, "`MODULE`")?;
        let name = self.ident("module name")?;
        self.expect(Token::ModuleStart, "closing `----` of module header")?;

        let mut extends = Vec::new();
        if self.eat(Token::Extends) {
            loop {
                extends.push(self.ident("module name after EXTENDS")?);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }

        let mut units = Vec::new();
        loop {
            match self.peek_kind() {
                None => return Err(self.error_here("expected `====` to end module".to_string())),
                Some(Token::ModuleEnd) => break,
                Some(Token::ModuleStart) => {
                    let tok = self.bump();
                    units.push(Spanned::new(Unit::Separator, Span::new(tok.start, tok.end)));
                }
                Some(Token::Variable) => {
                    let tok = self.bump();
                    let names = self.ident_list("variable name")?;
                    let span = Span::new(tok.start, self.prev_end());
                    units.push(Spanned::new(Unit::Variables(names), span));
                }
                Some(Token::Constant) => {
                    let tok = self.bump();
                    let names = self.ident_list("constant name")?;
                    let span = Span::new(tok.start, self.prev_end());
                    units.push(Spanned::new(Unit::Constants(names), span));
                }
                Some(Token::Ident) => units.push(self.definition()?),
                _ => return Err(self.error_here("expected a definition or declaration".to_string())),
            }
        }
        let end = self.expect(Token::ModuleEnd, "`====`")?.end;

        Ok(Module {
            name,
            extends,
            units,
            span: Span::new(start, end),
        })
    }

    fn definition(&mut self) -> PResult<Spanned<Unit>> {
        let name = self.ident("definition name")?;
        let start = name.span.start;

        // f[x \in S] == body
        if self.at(Token::LBracket) {
            self.bump();
            let bounds = self.with_junction_barrier(|p| p.bound_groups())?;
            self.expect(Token::RBracket, "`]` after function bounds")?;
            self.expect(Token::DefEq, "`==`")?;
            let body = self.expr()?;
            let span = Span::new(start, body.span.end);
            return Ok(Spanned::new(
                Unit::Function(crate::ast::FunctionDef { name, bounds, body }),
                span,
            ));
        }

        // Op(p1, p2) == body
        let mut params = Vec::new();
        if self.at(Token::LParen) {
            self.bump();
            loop {
                params.push(self.ident("parameter name")?);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RParen, "`)` after parameters")?;
        }
        self.expect(Token::DefEq, "`==`")?;
        let body = self.expr()?;
        let span = Span::new(start, body.span.end);
        Ok(Spanned::new(
            Unit::Operator(OperatorDef { name, params, body }),
            span,
        ))
    }

    fn ident(&mut self, what: &str) -> PResult<Spanned<String>> {
        let tok = self.expect(Token::Ident, what)?;
        Ok(Spanned::new(
            self.token_text(&tok).to_string(),
            Span::new(tok.start, tok.end),
        ))
    }

    fn ident_list(&mut self, what: &str) -> PResult<Vec<Spanned<String>>> {
        let mut names = vec![self.ident(what)?];
        while self.eat(Token::Comma) {
            names.push(self.ident(what)?);
        }
        Ok(names)
    }

    // === Expressions ===

    pub(crate) fn expr(&mut self) -> PResult<Spanned<Expr>> {
        self.expr_bp(0)
    }

    /// Pratt loop: parse an expression with operators binding at least
    /// as tightly as `min_bp`
    fn expr_bp(&mut self, min_bp: u8) -> PResult<Spanned<Expr>> {
        let mut lhs = self.prefix()?;

        loop {
            let Some(tok) = self.peek().copied() else { break };

            // Bullets of an active junction list end the current item
            if matches!(tok.kind, Token::And | Token::Or) {
                if let Some(&(_, col)) = self.junction.last() {
                    if tok.column <= col {
                        break;
                    }
                }
            }

            // Postfix operators
            match tok.kind {
                Token::Prime if 31 >= min_bp => {
                    self.bump();
                    let span = Span::new(lhs.span.start, tok.end);
                    lhs = Spanned::new(Expr::Prime(Box::new(lhs)), span);
                    continue;
                }
                Token::LBracket if 33 >= min_bp => {
                    self.bump();
                    let args = self.with_junction_barrier(|p| {
                        let mut args = vec![p.expr()?];
                        while p.eat(Token::Comma) {
                            args.push(p.expr()?);
                        }
                        Ok(args)
                    })?;
                    let close = self.expect(Token::RBracket, "`]` after function arguments")?;
                    let span = Span::new(lhs.span.start, close.end);
                    lhs = Spanned::new(Expr::FcnApply(Box::new(lhs), args), span);
                    continue;
                }
                Token::Dot if 33 >= min_bp => {
                    self.bump();
                    let field = self.ident("field name after `.`")?;
                    let span = Span::new(lhs.span.start, field.span.end);
                    lhs = Spanned::new(Expr::RecordAccess(Box::new(lhs), field), span);
                    continue;
                }
                _ => {}
            }

            // Infix operators
            let Some((l_bp, r_bp)) = infix_binding_power(tok.kind) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }

            // \X chains collect into one n-ary product
            if tok.kind == Token::Times {
                let mut factors = vec![lhs];
                while self.at(Token::Times) {
                    self.bump();
                    factors.push(self.expr_bp(r_bp)?);
                }
                let span = Span::new(
                    factors[0].span.start,
                    factors.last().unwrap().span.end,
                );
                lhs = Spanned::new(Expr::Times(factors), span);
                continue;
            }

            self.bump();
            let rhs = self.expr_bp(r_bp)?;
            let span = Span::new(lhs.span.start, rhs.span.end);
            lhs = Spanned::new(make_binary(tok.kind, lhs, rhs), span);
        }

        Ok(lhs)
    }

    /// Parse a prefix operator, a junction list, or a primary expression
    fn prefix(&mut self) -> PResult<Spanned<Expr>> {
        let Some(tok) = self.peek().copied() else {
            return Err(self.error_here("expected an expression".to_string()));
        };
        match tok.kind {
            Token::And => self.junction_list(JunctionType::Conjunction),
            Token::Or => self.junction_list(JunctionType::Disjunction),
            Token::Not => {
                self.bump();
                let operand = self.expr_bp(7)?;
                let span = Span::new(tok.start, operand.span.end);
                Ok(Spanned::new(Expr::Not(Box::new(operand)), span))
            }
            Token::Minus => {
                self.bump();
                let operand = self.expr_bp(22)?;
                let span = Span::new(tok.start, operand.span.end);
                Ok(Spanned::new(Expr::Neg(Box::new(operand)), span))
            }
            Token::Enabled => {
                self.bump();
                let operand = self.expr_bp(8)?;
                let span = Span::new(tok.start, operand.span.end);
                Ok(Spanned::new(Expr::Enabled(Box::new(operand)), span))
            }
            Token::Unchanged => {
                self.bump();
                let operand = self.expr_bp(8)?;
                let span = Span::new(tok.start, operand.span.end);
                Ok(Spanned::new(Expr::Unchanged(Box::new(operand)), span))
            }
            Token::Powerset => {
                self.bump();
                let operand = self.expr_bp(28)?;
                let span = Span::new(tok.start, operand.span.end);
                Ok(Spanned::new(Expr::Powerset(Box::new(operand)), span))
            }
            Token::Domain => {
                self.bump();
                let operand = self.expr_bp(28)?;
                let span = Span::new(tok.start, operand.span.end);
                Ok(Spanned::new(Expr::Domain(Box::new(operand)), span))
            }
            Token::Forall | Token::Exists => self.quantifier(),
            Token::Choose => self.choose(),
            Token::If => self.if_expr(),
            Token::Case => self.case_expr(),
            Token::Let => self.let_expr(),
            Token::True | Token::False => {
                self.bump();
                Ok(Spanned::new(
                    Expr::Bool(tok.kind == Token::True),
                    Span::new(tok.start, tok.end),
                ))
            }
            Token::Boolean => {
                self.bump();
                Ok(Spanned::new(Expr::BooleanSet, Span::new(tok.start, tok.end)))
            }
            Token::Number => {
                self.bump();
                let text = self.token_text(&tok);
                let value: BigInt = text
                    .parse()
                    .map_err(|_| ParseError::new("invalid integer literal", Span::new(tok.start, tok.end)))?;
                Ok(Spanned::new(Expr::Int(value), Span::new(tok.start, tok.end)))
            }
            Token::String => {
                self.bump();
                let text = self.token_text(&tok);
                Ok(Spanned::new(
                    Expr::Str(unescape_string(&text[1..text.len() - 1])),
                    Span::new(tok.start, tok.end),
                ))
            }
            Token::At => {
                self.bump();
                Ok(Spanned::new(Expr::At, Span::new(tok.start, tok.end)))
            }
            Token::Ident => {
                let name = self.ident("identifier")?;
                if self.at(Token::LParen) {
                    self.bump();
                    let args = self.with_junction_barrier(|p| {
                        let mut args = vec![p.expr()?];
                        while p.eat(Token::Comma) {
                            args.push(p.expr()?);
                        }
                        Ok(args)
                    })?;
                    let close = self.expect(Token::RParen, "`)` after operator arguments")?;
                    let span = Span::new(name.span.start, close.end);
                    Ok(Spanned::new(Expr::Apply(name, args), span))
                } else {
                    let span = name.span;
                    Ok(Spanned::new(Expr::Ident(name.node), span))
                }
            }
            Token::LParen => {
                self.bump();
                let inner = self.with_junction_barrier(|p| p.expr())?;
                let close = self.expect(Token::RParen, "`)`")?;
                // Keep the inner node, widen the span to cover the parens
                Ok(Spanned::new(inner.node, Span::new(tok.start, close.end)))
            }
            Token::LAngle => self.tuple_literal(),
            Token::LBrace => self.set_form(),
            Token::LBracket => self.bracket_form(),
            _ => Err(self.error_here("expected an expression".to_string())),
        }
    }

    /// Parse a bullet list: consume aligned bullets at this column
    fn junction_list(&mut self, jt: JunctionType) -> PResult<Spanned<Expr>> {
        let first = self.peek().copied().unwrap();
        let col = first.column;
        self.junction.push((jt, col));
        let mut items = Vec::new();
        let result = loop {
            self.bump(); // bullet
            match self.expr() {
                Ok(item) => items.push(item),
                Err(e) => break Err(e),
            }
            let continues = self
                .peek()
                .map(|t| t.kind == jt.token() && t.column == col)
                .unwrap_or(false);
            if !continues {
                break Ok(());
            }
        };
        self.junction.pop();
        result?;

        let span = Span::new(first.start, items.last().unwrap().span.end);
        let expr = match jt {
            JunctionType::Conjunction => Expr::AndList(items),
            JunctionType::Disjunction => Expr::OrList(items),
        };
        Ok(Spanned::new(expr, span))
    }

    fn quantifier(&mut self) -> PResult<Spanned<Expr>> {
        let tok = self.bump();
        let bounds = self.bound_groups()?;
        self.expect(Token::Colon, "`:` after quantifier bounds")?;
        let body = self.expr()?;
        let span = Span::new(tok.start, body.span.end);
        let expr = if tok.kind == Token::Forall {
            Expr::Forall(bounds, Box::new(body))
        } else {
            Expr::Exists(bounds, Box::new(body))
        };
        Ok(Spanned::new(expr, span))
    }

    fn choose(&mut self) -> PResult<Spanned<Expr>> {
        let tok = self.bump();
        let pattern = self.bound_pattern()?;
        self.expect(Token::In_, "`\\in` after CHOOSE pattern")?;
        let domain = self.expr_bp(9)?;
        self.expect(Token::Colon, "`:` after CHOOSE domain")?;
        let body = self.expr()?;
        let span = Span::new(tok.start, body.span.end);
        let bound = BoundVar {
            patterns: vec![pattern],
            domain: Box::new(domain),
        };
        Ok(Spanned::new(Expr::Choose(bound, Box::new(body)), span))
    }

    fn if_expr(&mut self) -> PResult<Spanned<Expr>> {
        let tok = self.bump();
        let cond = self.expr()?;
        self.expect(Token::Then, "`THEN`")?;
        let then_arm = self.expr()?;
        self.expect(Token::Else, "`ELSE`")?;
        let else_arm = self.expr()?;
        let span = Span::new(tok.start, else_arm.span.end);
        Ok(Spanned::new(
            Expr::If(Box::new(cond), Box::new(then_arm), Box::new(else_arm)),
            span,
        ))
    }

    fn case_expr(&mut self) -> PResult<Spanned<Expr>> {
        let tok = self.bump();
        let mut arms = Vec::new();
        let mut other = None;
        loop {
            if self.at(Token::Other) {
                self.bump();
                self.expect(Token::Arrow, "`->` after OTHER")?;
                other = Some(Box::new(self.expr()?));
                break;
            }
            let guard = self.expr()?;
            self.expect(Token::Arrow, "`->` after CASE guard")?;
            let body = self.expr()?;
            arms.push(CaseArm { guard, body });
            if !self.eat(Token::CaseSep) {
                break;
            }
        }
        if arms.is_empty() {
            return Err(self.error_here("CASE needs at least one arm".to_string()));
        }
        let end = other
            .as_ref()
            .map(|e| e.span.end)
            .unwrap_or_else(|| arms.last().unwrap().body.span.end);
        Ok(Spanned::new(
            Expr::Case(arms, other),
            Span::new(tok.start, end),
        ))
    }

    fn let_expr(&mut self) -> PResult<Spanned<Expr>> {
        let tok = self.bump();
        let mut defs = Vec::new();
        loop {
            let name = self.ident("LET definition name")?;
            let mut params = Vec::new();
            if self.at(Token::LParen) {
                self.bump();
                loop {
                    params.push(self.ident("parameter name")?);
                    if !self.eat(Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RParen, "`)` after parameters")?;
            }
            self.expect(Token::DefEq, "`==` in LET definition")?;
            let body = self.expr()?;
            defs.push(OperatorDef { name, params, body });
            if self.eat(Token::In) {
                break;
            }
            if !self.at(Token::Ident) {
                return Err(self.error_here("expected `IN` or another LET definition".to_string()));
            }
        }
        let body = self.expr()?;
        let span = Span::new(tok.start, body.span.end);
        Ok(Spanned::new(Expr::Let(defs, Box::new(body)), span))
    }

    fn tuple_literal(&mut self) -> PResult<Spanned<Expr>> {
        let open = self.bump();
        if self.at(Token::RAngle) {
            let close = self.bump();
            return Ok(Spanned::new(
                Expr::Tuple(Vec::new()),
                Span::new(open.start, close.end),
            ));
        }
        let elems = self.with_junction_barrier(|p| {
            let mut elems = vec![p.expr()?];
            while p.eat(Token::Comma) {
                elems.push(p.expr()?);
            }
            Ok(elems)
        })?;
        let close = self.expect(Token::RAngle, "`>>` to close tuple")?;
        Ok(Spanned::new(
            Expr::Tuple(elems),
            Span::new(open.start, close.end),
        ))
    }

    /// Set forms: `{}`, `{a, b}`, `{x \in S : P}`, `{e : x \in S}`
    fn set_form(&mut self) -> PResult<Spanned<Expr>> {
        let open = self.bump();
        self.with_junction_barrier(|p| {
            if p.at(Token::RBrace) {
                let close = p.bump();
                return Ok(Spanned::new(
                    Expr::SetEnum(Vec::new()),
                    Span::new(open.start, close.end),
                ));
            }

            // Filter: {pattern \in S : P} — commit only once the colon shows up
            if let Some(filter) = p.try_parse(|p| {
                let pattern = p.bound_pattern()?;
                if !p.eat(Token::In_) {
                    return Err(p.error_here("not a filter".to_string()));
                }
                let domain = p.expr()?;
                if !p.eat(Token::Colon) {
                    return Err(p.error_here("not a filter".to_string()));
                }
                let pred = p.expr()?;
                let close = p.expect(Token::RBrace, "`}` to close set filter")?;
                let bound = BoundVar {
                    patterns: vec![pattern],
                    domain: Box::new(domain),
                };
                Ok(Spanned::new(
                    Expr::SetFilter(bound, Box::new(pred)),
                    Span::new(open.start, close.end),
                ))
            }) {
                return Ok(filter);
            }

            let first = p.expr()?;
            if p.eat(Token::Colon) {
                // Map comprehension: {e : bounds}
                let bounds = p.bound_groups()?;
                let close = p.expect(Token::RBrace, "`}` to close set comprehension")?;
                return Ok(Spanned::new(
                    Expr::SetBuilder(Box::new(first), bounds),
                    Span::new(open.start, close.end),
                ));
            }
            // Enumeration
            let mut elems = vec![first];
            while p.eat(Token::Comma) {
                elems.push(p.expr()?);
            }
            let close = p.expect(Token::RBrace, "`}` to close set")?;
            Ok(Spanned::new(
                Expr::SetEnum(elems),
                Span::new(open.start, close.end),
            ))
        })
    }

    /// Bracket forms: function literal, record literal, record set,
    /// EXCEPT, function set
    fn bracket_form(&mut self) -> PResult<Spanned<Expr>> {
        let open = self.bump();
        self.with_junction_barrier(|p| {
            // Function literal: [bounds |-> e]
            if let Some(lit) = p.try_parse(|p| {
                let bounds = p.bound_groups()?;
                if !p.eat(Token::MapsTo) {
                    return Err(p.error_here("not a function literal".to_string()));
                }
                let body = p.expr()?;
                let close = p.expect(Token::RBracket, "`]` to close function literal")?;
                Ok(Spanned::new(
                    Expr::FcnLit(bounds, Box::new(body)),
                    Span::new(open.start, close.end),
                ))
            }) {
                return Ok(lit);
            }

            // Record literal: [name |-> e, ...]
            if p.at(Token::Ident) && p.nth_kind(1) == Some(Token::MapsTo) {
                let mut fields = Vec::new();
                loop {
                    let name = p.ident("record field name")?;
                    p.expect(Token::MapsTo, "`|->` after field name")?;
                    let value = p.expr()?;
                    fields.push((name, value));
                    if !p.eat(Token::Comma) {
                        break;
                    }
                }
                let close = p.expect(Token::RBracket, "`]` to close record")?;
                return Ok(Spanned::new(
                    Expr::RecordLit(fields),
                    Span::new(open.start, close.end),
                ));
            }

            // Record set: [name : S, ...]
            if p.at(Token::Ident) && p.nth_kind(1) == Some(Token::Colon) {
                let mut fields = Vec::new();
                loop {
                    let name = p.ident("record field name")?;
                    p.expect(Token::Colon, "`:` after field name")?;
                    let value = p.expr()?;
                    fields.push((name, value));
                    if !p.eat(Token::Comma) {
                        break;
                    }
                }
                let close = p.expect(Token::RBracket, "`]` to close record set")?;
                return Ok(Spanned::new(
                    Expr::RecordSet(fields),
                    Span::new(open.start, close.end),
                ));
            }

            let first = p.expr()?;

            // EXCEPT: [f EXCEPT !path = e, ...]
            if p.eat(Token::Except) {
                let mut specs = Vec::new();
                loop {
                    p.expect(Token::Bang, "`!` to start EXCEPT path")?;
                    let mut path = Vec::new();
                    loop {
                        if p.eat(Token::Dot) {
                            path.push(ExceptPathElem::Field(p.ident("field name after `.`")?));
                        } else if p.eat(Token::LBracket) {
                            let mut args = vec![p.expr()?];
                            while p.eat(Token::Comma) {
                                args.push(p.expr()?);
                            }
                            p.expect(Token::RBracket, "`]` after EXCEPT index")?;
                            path.push(ExceptPathElem::Index(args));
                        } else {
                            break;
                        }
                    }
                    if path.is_empty() {
                        return Err(p.error_here("EXCEPT path needs `[..]` or `.field`".to_string()));
                    }
                    p.expect(Token::Eq, "`=` in EXCEPT specification")?;
                    let value = p.expr()?;
                    specs.push(ExceptSpec { path, value });
                    if !p.eat(Token::Comma) {
                        break;
                    }
                }
                let close = p.expect(Token::RBracket, "`]` to close EXCEPT")?;
                return Ok(Spanned::new(
                    Expr::Except(Box::new(first), specs),
                    Span::new(open.start, close.end),
                ));
            }

            // Function set: [S -> T]
            p.expect(Token::Arrow, "`->`, `|->`, `:`, or `EXCEPT` inside `[...]`")?;
            let codomain = p.expr()?;
            let close = p.expect(Token::RBracket, "`]` to close function set")?;
            Ok(Spanned::new(
                Expr::FcnSet(Box::new(first), Box::new(codomain)),
                Span::new(open.start, close.end),
            ))
        })
    }

    // === Binders ===

    fn bound_pattern(&mut self) -> PResult<Spanned<BoundPattern>> {
        if self.at(Token::LAngle) {
            let open = self.bump();
            let names = self.ident_list("tuple pattern name")?;
            let close = self.expect(Token::RAngle, "`>>` to close tuple pattern")?;
            Ok(Spanned::new(
                BoundPattern::Tuple(names),
                Span::new(open.start, close.end),
            ))
        } else {
            let name = self.ident("binder name")?;
            let span = name.span;
            Ok(Spanned::new(BoundPattern::Name(name.node), span))
        }
    }

    /// Parse binder groups: `x, y \in S, <<a, b>> \in T`
    fn bound_groups(&mut self) -> PResult<Vec<BoundVar>> {
        let mut groups = Vec::new();
        loop {
            let mut patterns = vec![self.bound_pattern()?];
            while !self.at(Token::In_) && self.eat(Token::Comma) {
                patterns.push(self.bound_pattern()?);
            }
            self.expect(Token::In_, "`\\in` after binder pattern")?;
            // The domain stops at relational level so `,` and `:` end it
            let domain = self.expr_bp(9)?;
            groups.push(BoundVar {
                patterns,
                domain: Box::new(domain),
            });
            if !self.eat(Token::Comma) {
                break;
            }
        }
        Ok(groups)
    }
}

/// Infix binding powers: returns (left, right); higher binds tighter
fn infix_binding_power(token: Token) -> Option<(u8, u8)> {
    Some(match token {
        Token::Implies => (2, 1),
        Token::Or => (4, 5),
        Token::And => (6, 7),
        Token::Eq
        | Token::Neq
        | Token::Lt
        | Token::Leq
        | Token::Gt
        | Token::Geq
        | Token::In_
        | Token::NotIn => (9, 10),
        Token::AtAt => (11, 12),
        Token::ColonGt => (13, 14),
        Token::Union | Token::Intersect | Token::SetMinus => (15, 16),
        Token::DotDot => (17, 18),
        Token::Plus | Token::Minus => (19, 20),
        Token::Times => (21, 22),
        Token::Star | Token::Percent => (23, 24),
        Token::Concat => (25, 26),
        _ => return None,
    })
}

fn make_binary(token: Token, lhs: Spanned<Expr>, rhs: Spanned<Expr>) -> Expr {
    let l = Box::new(lhs);
    let r = Box::new(rhs);
    match token {
        Token::Implies => Expr::Implies(l, r),
        Token::Or => Expr::Or(l, r),
        Token::And => Expr::And(l, r),
        Token::Eq => Expr::Eq(l, r),
        Token::Neq => Expr::Neq(l, r),
        Token::Lt => Expr::Lt(l, r),
        Token::Leq => Expr::Leq(l, r),
        Token::Gt => Expr::Gt(l, r),
        Token::Geq => Expr::Geq(l, r),
        Token::In_ => Expr::In(l, r),
        Token::NotIn => Expr::NotIn(l, r),
        Token::AtAt => Expr::FcnMerge(l, r),
        Token::ColonGt => Expr::SingletonFcn(l, r),
        Token::Union => Expr::Union(l, r),
        Token::Intersect => Expr::Intersect(l, r),
        Token::SetMinus => Expr::SetMinus(l, r),
        Token::DotDot => Expr::Range(l, r),
        Token::Plus => Expr::Add(l, r),
        Token::Minus => Expr::Sub(l, r),
        Token::Star => Expr::Mul(l, r),
        Token::Percent => Expr::Mod(l, r),
        Token::Concat => Expr::Concat(l, r),
        _ => unreachable!("not an infix token: {:?}", token),
    }
}

fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
