//! Recursive-descent parser
//!
//! Builds the syntax tree for one script. Variable and function
//! declarations are hoisted into the enclosing `FunctionNode` while parsing,
//! so the interpreter can bind them all on entry.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::ast::*;
use super::lexer::{Lexer, SourcePos, Token};
use crate::util::dtoa;

/// A syntax error with the line it was found on
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {} (line {})", self.message, self.line)
    }
}

impl std::error::Error for ParseError {}

type ParseResult<T> = Result<T, ParseError>;

/// Deepest nesting of statements and expressions the parser accepts; also
/// bounds `JSON.parse` and `JSON.stringify`
pub const MAX_NESTING_DEPTH: usize = 256;

/// Declarations collected for the function being parsed
#[derive(Default)]
struct FunctionScope {
    vars: Vec<Rc<str>>,
    seen: HashSet<Rc<str>>,
    functions: Vec<Rc<FunctionNode>>,
    uses_arguments: bool,
    loops: usize,
    breakable: usize,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    pos: SourcePos,
    newline_before: bool,
    source: Rc<Source>,
    scopes: Vec<FunctionScope>,
    depth: usize,
}

/// Parse a whole script
pub fn parse_program(source: &Rc<Source>) -> ParseResult<Rc<FunctionNode>> {
    let text = Rc::clone(&source.text);
    let mut parser = Parser::new(&text, Rc::clone(source));
    let program = parser.parse_program()?;
    #[cfg(feature = "dump")]
    log::trace!("{}: {:#?}", source.name, program.body);
    Ok(program)
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, source: Rc<Source>) -> Self {
        let mut lexer = Lexer::new(text);
        let current = lexer.next_token();
        Parser {
            pos: lexer.token_start(),
            newline_before: lexer.newline_before(),
            lexer,
            current,
            source,
            scopes: Vec::new(),
            depth: 0,
        }
    }

    fn parse_program(&mut self) -> ParseResult<Rc<FunctionNode>> {
        self.scopes.push(FunctionScope::default());
        let mut body = Vec::new();
        while self.current != Token::Eof {
            body.push(self.parse_statement()?);
        }
        let scope = self.scopes.pop().unwrap_or_default();
        Ok(Rc::new(FunctionNode {
            name: None,
            params: Vec::new(),
            body,
            vars: scope.vars,
            functions: scope.functions,
            uses_arguments: false,
            source: Rc::clone(&self.source),
            line: 1,
            span: (0, self.source.text.len()),
            is_program: true,
        }))
    }

    // ----- token plumbing -----

    /// Advance to the next token
    fn advance(&mut self) {
        self.current = self.lexer.next_token();
        self.pos = self.lexer.token_start();
        self.newline_before = self.lexer.newline_before();
    }

    fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(&self.current) == std::mem::discriminant(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect a specific token, advance if matched
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.pos.line,
        }
    }

    fn unexpected(&self) -> ParseError {
        match &self.current {
            Token::Eof => self.error("Unexpected end of input"),
            Token::Error(message) => self.error(message.clone()),
            Token::Number(_) => self.error("Unexpected number"),
            Token::String(_) => self.error("Unexpected string"),
            Token::Ident(name) => self.error(format!("Unexpected identifier '{}'", name)),
            _ => {
                let end = self.lexer.position().offset;
                let text = self.source.text.get(self.pos.offset..end).unwrap_or("");
                self.error(format!("Unexpected token '{}'", text))
            }
        }
    }

    /// Automatic semicolon insertion
    fn consume_semicolon(&mut self) -> ParseResult<()> {
        if self.eat(&Token::Semicolon) {
            return Ok(());
        }
        if matches!(self.current, Token::RBrace | Token::Eof) || self.newline_before {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn identifier(&mut self) -> ParseResult<Rc<str>> {
        match &self.current {
            Token::Ident(name) => {
                let name = Rc::from(name.as_str());
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Identifier or reserved word, as allowed after `.` and in object keys
    fn property_name(&mut self) -> ParseResult<Rc<str>> {
        let name = match &self.current {
            Token::Ident(name) => Rc::from(name.as_str()),
            token if keyword_text(token).is_some() => Rc::from(keyword_text(token).unwrap_or("")),
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(name)
    }

    fn scope(&mut self) -> &mut FunctionScope {
        if self.scopes.is_empty() {
            self.scopes.push(FunctionScope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("too much recursion"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn declare_var(&mut self, name: &Rc<str>) {
        let scope = self.scope();
        if scope.seen.insert(Rc::clone(name)) {
            scope.vars.push(Rc::clone(name));
        }
    }

    // ----- statements -----

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        let line = self.pos.line as u32;
        let kind = match self.current {
            Token::LBrace => StmtKind::Block(self.parse_block()?),
            Token::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            Token::Var | Token::Let | Token::Const => {
                self.advance();
                let decls = self.parse_var_declarations(false)?;
                self.consume_semicolon()?;
                StmtKind::Var(decls)
            }
            Token::Function => {
                let function = self.parse_function(true)?;
                self.scope().functions.push(function);
                StmtKind::FunctionDecl
            }
            Token::If => self.parse_if()?,
            Token::While => {
                self.advance();
                self.expect(Token::LParen)?;
                let test = self.parse_expression(false)?;
                self.expect(Token::RParen)?;
                let body = Box::new(self.parse_loop_body()?);
                StmtKind::While { test, body }
            }
            Token::Do => {
                self.advance();
                let body = Box::new(self.parse_loop_body()?);
                self.expect(Token::While)?;
                self.expect(Token::LParen)?;
                let test = self.parse_expression(false)?;
                self.expect(Token::RParen)?;
                self.eat(&Token::Semicolon);
                StmtKind::DoWhile { body, test }
            }
            Token::For => self.parse_for()?,
            Token::Return => {
                if self.scopes.len() < 2 {
                    return Err(self.error("Illegal return statement"));
                }
                self.advance();
                let value = if matches!(self.current, Token::Semicolon | Token::RBrace | Token::Eof)
                    || self.newline_before
                {
                    None
                } else {
                    Some(self.parse_expression(false)?)
                };
                self.consume_semicolon()?;
                StmtKind::Return(value)
            }
            Token::Break => {
                if self.scope().breakable == 0 {
                    return Err(self.error("Illegal break statement"));
                }
                self.advance();
                self.consume_semicolon()?;
                StmtKind::Break
            }
            Token::Continue => {
                if self.scope().loops == 0 {
                    return Err(self.error(
                        "Illegal continue statement: no surrounding iteration statement",
                    ));
                }
                self.advance();
                self.consume_semicolon()?;
                StmtKind::Continue
            }
            Token::Throw => {
                self.advance();
                if self.newline_before {
                    return Err(self.error("Illegal newline after throw"));
                }
                let value = self.parse_expression(false)?;
                self.consume_semicolon()?;
                StmtKind::Throw(value)
            }
            Token::Try => self.parse_try()?,
            Token::Switch => self.parse_switch()?,
            Token::Debugger => {
                self.advance();
                self.consume_semicolon()?;
                StmtKind::Debugger
            }
            _ => {
                let expr = self.parse_expression(false)?;
                self.consume_semicolon()?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { line, kind })
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.current == Token::Eof {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_loop_body(&mut self) -> ParseResult<Stmt> {
        let scope = self.scope();
        scope.loops += 1;
        scope.breakable += 1;
        let body = self.parse_statement();
        let scope = self.scope();
        scope.loops -= 1;
        scope.breakable -= 1;
        body
    }

    fn parse_var_declarations(&mut self, no_in: bool) -> ParseResult<Vec<(Rc<str>, Option<Expr>)>> {
        let mut decls = Vec::new();
        loop {
            let name = self.identifier()?;
            self.declare_var(&name);
            let init = if self.eat(&Token::Eq) {
                Some(self.parse_assignment(no_in)?)
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(decls)
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        self.expect(Token::LParen)?;
        let test = self.parse_expression(false)?;
        self.expect(Token::RParen)?;
        let then = Box::new(self.parse_statement()?);
        let otherwise = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            test,
            then,
            otherwise,
        })
    }

    fn is_of(&self) -> bool {
        matches!(&self.current, Token::Ident(name) if name == "of")
    }

    fn parse_for(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        self.expect(Token::LParen)?;

        let line = self.pos.line as u32;
        let mut init = None;
        if matches!(self.current, Token::Var | Token::Let | Token::Const) {
            self.advance();
            let mut decls = self.parse_var_declarations(true)?;
            if decls.len() == 1
                && decls[0].1.is_none()
                && (self.check(&Token::In) || self.is_of())
            {
                let (name, _) = decls.remove(0);
                return self.parse_for_each(Expr::Ident(name, line));
            }
            init = Some(Box::new(Stmt {
                line,
                kind: StmtKind::Var(decls),
            }));
        } else if !self.check(&Token::Semicolon) {
            let expr = self.parse_expression(true)?;
            if self.check(&Token::In) || self.is_of() {
                if !is_assignable(&expr) {
                    return Err(self.error("Invalid left-hand side in for-loop"));
                }
                return self.parse_for_each(expr);
            }
            init = Some(Box::new(Stmt {
                line,
                kind: StmtKind::Expr(expr),
            }));
        }

        self.expect(Token::Semicolon)?;
        let test = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.expect(Token::Semicolon)?;
        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    /// The rest of `for (target in object)` or `for (target of iterable)`
    fn parse_for_each(&mut self, target: Expr) -> ParseResult<StmtKind> {
        let is_in = self.check(&Token::In);
        self.advance();
        let object = if is_in {
            self.parse_expression(false)?
        } else {
            self.parse_assignment(false)?
        };
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(if is_in {
            StmtKind::ForIn {
                target,
                object,
                body,
            }
        } else {
            StmtKind::ForOf {
                target,
                iterable: object,
                body,
            }
        })
    }

    fn parse_try(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let block = self.parse_block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat(&Token::Catch) {
            if self.eat(&Token::LParen) {
                param = Some(self.identifier()?);
                self.expect(Token::RParen)?;
            }
            handler = Some(self.parse_block()?);
        }
        let finalizer = if self.eat(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }
        Ok(StmtKind::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    fn parse_switch(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        self.expect(Token::LParen)?;
        let discriminant = self.parse_expression(false)?;
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;

        self.scope().breakable += 1;
        let mut cases = Vec::new();
        let mut has_default = false;
        while !self.eat(&Token::RBrace) {
            let test = match self.current {
                Token::Case => {
                    self.advance();
                    Some(self.parse_expression(false)?)
                }
                Token::Default => {
                    if has_default {
                        return Err(self.error("More than one default clause in switch statement"));
                    }
                    has_default = true;
                    self.advance();
                    None
                }
                _ => return Err(self.unexpected()),
            };
            self.expect(Token::Colon)?;
            let mut body = Vec::new();
            while !matches!(self.current, Token::Case | Token::Default | Token::RBrace) {
                if self.current == Token::Eof {
                    return Err(self.unexpected());
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.scope().breakable -= 1;

        Ok(StmtKind::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_function(&mut self, declaration: bool) -> ParseResult<Rc<FunctionNode>> {
        let start = self.pos;
        self.expect(Token::Function)?;
        let name = match self.current {
            Token::Ident(_) => Some(self.identifier()?),
            _ if declaration => {
                return Err(self.error("Function statements require a function name"));
            }
            _ => None,
        };

        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        while !self.eat(&Token::RParen) {
            params.push(self.identifier()?);
            if !self.check(&Token::RParen) {
                self.expect(Token::Comma)?;
            }
        }

        self.scopes.push(FunctionScope::default());
        self.expect(Token::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.current == Token::Eof {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        let end = self.lexer.position().offset;
        let scope = self.scopes.pop().unwrap_or_default();
        self.advance();

        Ok(Rc::new(FunctionNode {
            name,
            params,
            body,
            vars: scope.vars,
            functions: scope.functions,
            uses_arguments: scope.uses_arguments,
            source: Rc::clone(&self.source),
            line: start.line as u32,
            span: (start.offset, end),
            is_program: false,
        }))
    }

    // ----- expressions -----

    fn parse_expression(&mut self, no_in: bool) -> ParseResult<Expr> {
        let first = self.parse_assignment(no_in)?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            items.push(self.parse_assignment(no_in)?);
        }
        Ok(Expr::Sequence(items))
    }

    fn parse_assignment(&mut self, no_in: bool) -> ParseResult<Expr> {
        self.nested(|parser| parser.assignment(no_in))
    }

    fn assignment(&mut self, no_in: bool) -> ParseResult<Expr> {
        let target = self.parse_conditional(no_in)?;
        let op = match self.current {
            Token::Eq => None,
            Token::PlusEq => Some(BinaryOp::Add),
            Token::MinusEq => Some(BinaryOp::Sub),
            Token::StarEq => Some(BinaryOp::Mul),
            Token::SlashEq => Some(BinaryOp::Div),
            Token::PercentEq => Some(BinaryOp::Mod),
            Token::StarStarEq => Some(BinaryOp::Exp),
            Token::LtLtEq => Some(BinaryOp::Shl),
            Token::GtGtEq => Some(BinaryOp::Shr),
            Token::GtGtGtEq => Some(BinaryOp::UShr),
            Token::AmpEq => Some(BinaryOp::BitAnd),
            Token::PipeEq => Some(BinaryOp::BitOr),
            Token::CaretEq => Some(BinaryOp::BitXor),
            _ => return Ok(target),
        };
        if !is_assignable(&target) {
            return Err(self.error("Invalid left-hand side in assignment"));
        }
        self.advance();
        let value = self.parse_assignment(no_in)?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self, no_in: bool) -> ParseResult<Expr> {
        let test = self.parse_binary(0, no_in)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let then = self.parse_assignment(false)?;
        self.expect(Token::Colon)?;
        let otherwise = self.parse_assignment(no_in)?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// Precedence climbing over binary and logical operators
    fn parse_binary(&mut self, min_prec: u8, no_in: bool) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let Some((prec, op)) = binary_operator(&self.current) else {
                break;
            };
            if prec < min_prec || (no_in && self.current == Token::In) {
                break;
            }
            self.advance();
            // `**` is right-associative
            let next = if prec == 11 { prec } else { prec + 1 };
            let right = self.parse_binary(next, no_in)?;
            left = match op {
                Operator::Binary(op) => Expr::Binary(op, Box::new(left), Box::new(right)),
                Operator::Logical(op) => Expr::Logical(op, Box::new(left), Box::new(right)),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.current {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Tilde => UnaryOp::BitNot,
            Token::TypeOf => UnaryOp::TypeOf,
            Token::Void => UnaryOp::Void,
            Token::Delete => UnaryOp::Delete,
            Token::PlusPlus | Token::MinusMinus => {
                let increment = self.current == Token::PlusPlus;
                self.advance();
                let target = self.nested(Self::parse_unary)?;
                if !is_assignable(&target) {
                    return Err(self.error("Invalid left-hand side expression in prefix operation"));
                }
                return Ok(Expr::Update {
                    increment,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_call_member()?;
        if matches!(self.current, Token::PlusPlus | Token::MinusMinus) && !self.newline_before {
            if !is_assignable(&expr) {
                return Err(self.error("Invalid left-hand side expression in postfix operation"));
            }
            let increment = self.current == Token::PlusPlus;
            self.advance();
            return Ok(Expr::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
            });
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        while !self.eat(&Token::RParen) {
            args.push(self.parse_assignment(false)?);
            if !self.check(&Token::RParen) {
                self.expect(Token::Comma)?;
            }
        }
        Ok(args)
    }

    fn parse_call_member(&mut self) -> ParseResult<Expr> {
        let mut expr = if self.check(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            let line = self.pos.line as u32;
            expr = match self.current {
                Token::Dot => {
                    self.advance();
                    Expr::Member(Box::new(expr), self.property_name()?, line)
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression(false)?;
                    self.expect(Token::RBracket)?;
                    Expr::Index(Box::new(expr), Box::new(index), line)
                }
                Token::LParen => Expr::Call {
                    callee: Box::new(expr),
                    args: self.parse_arguments()?,
                    line,
                },
                _ => return Ok(expr),
            };
        }
    }

    fn parse_new(&mut self) -> ParseResult<Expr> {
        let line = self.pos.line as u32;
        self.expect(Token::New)?;
        let mut callee = if self.check(&Token::New) {
            self.nested(Self::parse_new)?
        } else {
            self.parse_primary()?
        };
        loop {
            let at = self.pos.line as u32;
            callee = match self.current {
                Token::Dot => {
                    self.advance();
                    Expr::Member(Box::new(callee), self.property_name()?, at)
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression(false)?;
                    self.expect(Token::RBracket)?;
                    Expr::Index(Box::new(callee), Box::new(index), at)
                }
                _ => break,
            };
        }
        let args = if self.check(&Token::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
            line,
        })
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let expr = match &self.current {
            Token::Number(n) => Expr::Number(*n),
            Token::String(s) => Expr::String(Rc::from(s.as_str())),
            Token::Ident(name) => Expr::Ident(Rc::from(name.as_str()), self.pos.line as u32),
            Token::This => Expr::This,
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Null => Expr::Null,
            Token::Function => return Ok(Expr::Function(self.parse_function(false)?)),
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression(false)?;
                self.expect(Token::RParen)?;
                return Ok(expr);
            }
            Token::LBracket => return self.parse_array_literal(),
            Token::LBrace => return self.parse_object_literal(),
            Token::Slash | Token::SlashEq => {
                self.current = self.lexer.rescan_regexp();
                match &self.current {
                    Token::RegExp { pattern, flags } => Expr::RegExp {
                        pattern: Rc::from(pattern.as_str()),
                        flags: Rc::from(flags.as_str()),
                    },
                    _ => return Err(self.unexpected()),
                }
            }
            _ => return Err(self.unexpected()),
        };
        if matches!(&expr, Expr::Ident(name, _) if &**name == "arguments") {
            self.scope().uses_arguments = true;
        }
        self.advance();
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expr> {
        self.expect(Token::LBracket)?;
        let mut items = Vec::new();
        loop {
            match self.current {
                Token::RBracket => break,
                Token::Comma => {
                    self.advance();
                    items.push(None);
                }
                _ => {
                    items.push(Some(self.parse_assignment(false)?));
                    if !self.check(&Token::RBracket) {
                        self.expect(Token::Comma)?;
                    }
                }
            }
        }
        self.advance();
        Ok(Expr::Array(items))
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expr> {
        self.expect(Token::LBrace)?;
        let mut props = Vec::new();
        while !self.eat(&Token::RBrace) {
            let key: Rc<str> = match &self.current {
                Token::String(s) => {
                    let key = Rc::from(s.as_str());
                    self.advance();
                    key
                }
                Token::Number(n) => {
                    let key = Rc::from(dtoa::number_to_string(*n));
                    self.advance();
                    key
                }
                _ => self.property_name()?,
            };
            self.expect(Token::Colon)?;
            let value = self.parse_assignment(false)?;
            props.push((key, value));
            if !self.check(&Token::RBrace) {
                self.expect(Token::Comma)?;
            }
        }
        Ok(Expr::Object(props))
    }
}

enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn binary_operator(token: &Token) -> Option<(u8, Operator)> {
    use Operator::{Binary, Logical};
    Some(match token {
        Token::PipePipe => (1, Logical(LogicalOp::Or)),
        Token::AmpAmp => (2, Logical(LogicalOp::And)),
        Token::Pipe => (3, Binary(BinaryOp::BitOr)),
        Token::Caret => (4, Binary(BinaryOp::BitXor)),
        Token::Amp => (5, Binary(BinaryOp::BitAnd)),
        Token::EqEq => (6, Binary(BinaryOp::Eq)),
        Token::BangEq => (6, Binary(BinaryOp::NotEq)),
        Token::EqEqEq => (6, Binary(BinaryOp::StrictEq)),
        Token::BangEqEq => (6, Binary(BinaryOp::StrictNotEq)),
        Token::Lt => (7, Binary(BinaryOp::Lt)),
        Token::LtEq => (7, Binary(BinaryOp::LtEq)),
        Token::Gt => (7, Binary(BinaryOp::Gt)),
        Token::GtEq => (7, Binary(BinaryOp::GtEq)),
        Token::In => (7, Binary(BinaryOp::In)),
        Token::InstanceOf => (7, Binary(BinaryOp::InstanceOf)),
        Token::LtLt => (8, Binary(BinaryOp::Shl)),
        Token::GtGt => (8, Binary(BinaryOp::Shr)),
        Token::GtGtGt => (8, Binary(BinaryOp::UShr)),
        Token::Plus => (9, Binary(BinaryOp::Add)),
        Token::Minus => (9, Binary(BinaryOp::Sub)),
        Token::Star => (10, Binary(BinaryOp::Mul)),
        Token::Slash => (10, Binary(BinaryOp::Div)),
        Token::Percent => (10, Binary(BinaryOp::Mod)),
        Token::StarStar => (11, Binary(BinaryOp::Exp)),
        _ => return None,
    })
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(expr, Expr::Ident(..) | Expr::Member(..) | Expr::Index(..))
}

/// Source text of a reserved word token
fn keyword_text(token: &Token) -> Option<&'static str> {
    Some(match token {
        Token::Break => "break",
        Token::Case => "case",
        Token::Catch => "catch",
        Token::Const => "const",
        Token::Continue => "continue",
        Token::Debugger => "debugger",
        Token::Default => "default",
        Token::Delete => "delete",
        Token::Do => "do",
        Token::Else => "else",
        Token::False => "false",
        Token::Finally => "finally",
        Token::For => "for",
        Token::Function => "function",
        Token::If => "if",
        Token::In => "in",
        Token::InstanceOf => "instanceof",
        Token::Let => "let",
        Token::New => "new",
        Token::Null => "null",
        Token::Return => "return",
        Token::Switch => "switch",
        Token::This => "this",
        Token::Throw => "throw",
        Token::True => "true",
        Token::Try => "try",
        Token::TypeOf => "typeof",
        Token::Var => "var",
        Token::Void => "void",
        Token::While => "while",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParseResult<Rc<FunctionNode>> {
        parse_program(&Source::new("test.js", text))
    }

    #[test]
    fn test_hoisting() {
        let program =
            parse("var a = 1; function f(x) { var b; return x + b; } for (var i in o) {}").unwrap();

        let vars: Vec<_> = program.vars.iter().map(|v| v.to_string()).collect();
        assert_eq!(vars, ["a", "i"]);
        assert_eq!(program.functions.len(), 1);
        let f = &program.functions[0];
        assert_eq!(f.name.as_deref(), Some("f"));
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.vars.len(), 1);
        assert_eq!(f.text(), "function f(x) { var b; return x + b; }");
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3").unwrap();
        let StmtKind::Expr(Expr::Binary(BinaryOp::Add, _, right)) = &program.body[0].kind else {
            panic!("expected addition at the root");
        };
        assert!(matches!(**right, Expr::Binary(BinaryOp::Mul, _, _)));

        let program = parse("2 ** 3 ** 2").unwrap();
        let StmtKind::Expr(Expr::Binary(BinaryOp::Exp, left, _)) = &program.body[0].kind else {
            panic!("expected exponent at the root");
        };
        assert!(matches!(**left, Expr::Number(n) if n == 2.0));
    }

    #[test]
    fn test_statement_lines() {
        let program = parse("var a;\n\nthrow new Error('x');").unwrap();
        assert_eq!(program.body[0].line, 1);
        assert_eq!(program.body[1].line, 3);
    }

    #[test]
    fn test_expression_lines() {
        let program = parse("f(a,\n  b)\n  .c").unwrap();
        let StmtKind::Expr(Expr::Member(call, _, member_line)) = &program.body[0].kind else {
            panic!("expected member access at the root");
        };
        assert_eq!(*member_line, 3);
        let Expr::Call { args, line, .. } = &**call else {
            panic!("expected a call");
        };
        assert_eq!(*line, 1);
        assert!(matches!(args[1], Expr::Ident(_, 2)));
    }

    #[test]
    fn test_automatic_semicolons() {
        assert!(parse("var a = 1\nvar b = 2\na\n++b").is_ok());
        assert!(parse("var a = 1 var b = 2").is_err());

        let program = parse("function f() { return\n42 }").unwrap();
        let StmtKind::Return(value) = &program.functions[0].body[0].kind else {
            panic!("expected return");
        };
        assert!(value.is_none());
    }

    #[test]
    fn test_regexp_and_division() {
        let program = parse("var r = /ab+c/gi; var d = 4 / 2 / 1;").unwrap();
        let StmtKind::Var(decls) = &program.body[0].kind else {
            panic!("expected var");
        };
        assert!(matches!(&decls[0].1, Some(Expr::RegExp { flags, .. }) if &**flags == "gi"));
        let StmtKind::Var(decls) = &program.body[1].kind else {
            panic!("expected var");
        };
        assert!(matches!(&decls[0].1, Some(Expr::Binary(BinaryOp::Div, _, _))));
    }

    #[test]
    fn test_for_variants() {
        let program =
            parse("for (var k in o) {} for (x of xs) {} for (i = 0; i < 3; i++) {}").unwrap();
        assert!(matches!(program.body[0].kind, StmtKind::ForIn { .. }));
        assert!(matches!(program.body[1].kind, StmtKind::ForOf { .. }));
        assert!(matches!(program.body[2].kind, StmtKind::For { .. }));
    }

    #[test]
    fn test_keywords_as_property_names() {
        assert!(parse("var o = { default: 1, 'a b': 2, 3: 4 }; o.default; o.new").is_ok());
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse("var x = ;").unwrap_err();
        assert_eq!(err.message, "Unexpected token ';'");
        assert_eq!(err.line, 1);

        let err = parse("\n\nfunction (").unwrap_err();
        assert_eq!(err.line, 3);

        assert_eq!(parse("return 1").unwrap_err().message, "Illegal return statement");
        assert_eq!(parse("break;").unwrap_err().message, "Illegal break statement");
        assert!(parse("1 = 2").is_err());
        assert_eq!(parse("(1 + ").unwrap_err().message, "Unexpected end of input");
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "[".repeat(100_000), "]".repeat(100_000));
        assert_eq!(parse(&deep).unwrap_err().message, "too much recursion");

        let blocks = format!("{}{}", "{".repeat(100_000), "}".repeat(100_000));
        assert_eq!(parse(&blocks).unwrap_err().message, "too much recursion");

        let unary = format!("{}x", "!".repeat(100_000));
        assert_eq!(parse(&unary).unwrap_err().message, "too much recursion");

        let news = format!("{}F", "new ".repeat(100_000));
        assert_eq!(parse(&news).unwrap_err().message, "too much recursion");

        let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(parse(&shallow).is_ok());
    }

    #[test]
    fn test_arguments_detection() {
        let program =
            parse("function f() { return arguments.length } function g(a) { return a }").unwrap();
        assert!(program.functions[0].uses_arguments);
        assert!(!program.functions[1].uses_arguments);
    }
}
