//! Tokenizer and recursive-descent parser for formula text.
//!
//! Accepted shapes:
//!
//! ```text
//! result = <arith>
//! if <cond>: result = <arith> [elif <cond>: result = <arith>]* [else: result = <arith>]
//! ```
//!
//! Newlines and indentation are plain whitespace.

use crate::error::FormulaError;

/// Expression AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Bool(bool),
    /// Namespace variable
    Variable(String),
    /// `name.attr`
    Attribute { name: String, attr: String },
    Binary {
        left: Box<Expr>,
        op: ArithOperator,
        right: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        op: CompareOperator,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOperator {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One `cond: result = value` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Expr,
    pub value: Expr,
}

/// Parsed formula: conditional arms tried in order, then the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub branches: Vec<Branch>,
    pub otherwise: Option<Expr>,
}

impl Program {
    /// Every expression the program can evaluate.
    pub fn expressions(&self) -> impl Iterator<Item = &Expr> {
        self.branches
            .iter()
            .flat_map(|b| [&b.condition, &b.value])
            .chain(self.otherwise.iter())
    }

    /// Value expressions only (the right-hand sides of `result =`).
    pub fn results(&self) -> impl Iterator<Item = &Expr> {
        self.branches
            .iter()
            .map(|b| &b.value)
            .chain(self.otherwise.iter())
    }
}

impl Expr {
    /// Collect `(variable, attribute)` references.
    pub fn visit_variables<'a>(&'a self, out: &mut Vec<(&'a str, Option<&'a str>)>) {
        match self {
            Expr::Number(_) | Expr::Bool(_) => {}
            Expr::Variable(name) => out.push((name.as_str(), None)),
            Expr::Attribute { name, attr } => out.push((name.as_str(), Some(attr.as_str()))),
            Expr::Binary { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::And(left, right)
            | Expr::Or(left, right) => {
                left.visit_variables(out);
                right.visit_variables(out);
            }
            Expr::Not(inner) | Expr::Neg(inner) => inner.visit_variables(out),
        }
    }
}

/// Token types for lexing.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    Bool(bool),
    // Keywords
    If,
    Elif,
    Else,
    Result,
    And,
    Or,
    Not,
    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Delimiters
    LParen,
    RParen,
    Colon,
    Dot,
    Eof,
}

/// Token with its character offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

/// Tokenize formula text.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, FormulaError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Comments run to end of line
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit()) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // exponent part
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let num_str: String = chars[start..i].iter().collect();
            let num: f64 = num_str
                .parse()
                .map_err(|_| FormulaError::syntax(start, format!("invalid number {:?}", num_str)))?;
            tokens.push(Spanned {
                token: Token::Number(num),
                pos: start,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            let token = match ident.as_str() {
                "if" => Token::If,
                "elif" => Token::Elif,
                "else" => Token::Else,
                "result" => Token::Result,
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "True" | "true" => Token::Bool(true),
                "False" | "false" => Token::Bool(false),
                _ => Token::Ident(ident),
            };
            tokens.push(Spanned { token, pos: start });
            continue;
        }

        if i + 1 < chars.len() {
            let two: String = chars[i..i + 2].iter().collect();
            let token = match two.as_str() {
                "==" => Some(Token::Eq),
                "!=" => Some(Token::Ne),
                "<=" => Some(Token::Le),
                ">=" => Some(Token::Ge),
                "&&" => Some(Token::And),
                "||" => Some(Token::Or),
                _ => None,
            };
            if let Some(token) = token {
                tokens.push(Spanned { token, pos: i });
                i += 2;
                continue;
            }
        }

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '=' => Token::Assign,
            '<' => Token::Lt,
            '>' => Token::Gt,
            '!' => Token::Not,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ':' => Token::Colon,
            '.' => Token::Dot,
            _ => return Err(FormulaError::syntax(i, format!("unexpected character {:?}", c))),
        };
        tokens.push(Spanned { token, pos: i });
        i += 1;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        pos: chars.len(),
    });
    Ok(tokens)
}

/// Parse formula text into a [`Program`].
pub fn parse_program(input: &str) -> Result<Program, FormulaError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let program = parser.parse_statement()?;
    parser.expect_eof()?;
    Ok(program)
}

/// Parse a standalone boolean/arithmetic expression.
pub fn parse_expression(input: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_bool()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> FormulaError {
        FormulaError::syntax(self.offset(), message)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), FormulaError> {
        if *self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {:?}", what, self.current())))
        }
    }

    fn expect_eof(&self) -> Result<(), FormulaError> {
        match self.current() {
            Token::Eof => Ok(()),
            other => Err(self.error(format!("unexpected trailing {:?}", other))),
        }
    }

    fn parse_statement(&mut self) -> Result<Program, FormulaError> {
        match self.current() {
            Token::If => {
                self.advance();
                let mut branches = vec![self.parse_branch()?];
                let mut otherwise = None;
                loop {
                    match self.current() {
                        Token::Elif => {
                            self.advance();
                            branches.push(self.parse_branch()?);
                        }
                        Token::Else => {
                            self.advance();
                            self.expect(Token::Colon, "':' after else")?;
                            otherwise = Some(self.parse_assign()?);
                            break;
                        }
                        _ => break,
                    }
                }
                Ok(Program {
                    branches,
                    otherwise,
                })
            }
            Token::Result => Ok(Program {
                branches: Vec::new(),
                otherwise: Some(self.parse_assign()?),
            }),
            Token::Eof => Err(self.error("empty formula")),
            other => Err(self.error(format!("expected 'if' or 'result', found {:?}", other))),
        }
    }

    fn parse_branch(&mut self) -> Result<Branch, FormulaError> {
        let condition = self.parse_bool()?;
        self.expect(Token::Colon, "':' after condition")?;
        let value = self.parse_assign()?;
        Ok(Branch { condition, value })
    }

    fn parse_assign(&mut self) -> Result<Expr, FormulaError> {
        self.expect(Token::Result, "'result'")?;
        self.expect(Token::Assign, "'='")?;
        self.parse_arith()
    }

    fn parse_bool(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_conj()?;
        while matches!(self.current(), Token::Or) {
            self.advance();
            let right = self.parse_conj()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_conj(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_unary()?;
        while matches!(self.current(), Token::And) {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        if matches!(self.current(), Token::Not) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, FormulaError> {
        let left = self.parse_arith()?;
        let op = match self.current() {
            Token::Eq => CompareOperator::Eq,
            Token::Ne => CompareOperator::Ne,
            Token::Lt => CompareOperator::Lt,
            Token::Le => CompareOperator::Le,
            Token::Gt => CompareOperator::Gt,
            Token::Ge => CompareOperator::Ge,
            Token::Assign => return Err(self.error("'=' in condition, use '=='")),
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_arith()?;
        Ok(Expr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_arith(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current() {
                Token::Plus => ArithOperator::Add,
                Token::Minus => ArithOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.current() {
                Token::Star => ArithOperator::Mul,
                Token::Slash => ArithOperator::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, FormulaError> {
        let expr = match self.current().clone() {
            Token::Number(n) => {
                self.advance();
                Expr::Number(n)
            }
            Token::Bool(b) => {
                self.advance();
                Expr::Bool(b)
            }
            Token::Ident(name) => {
                self.advance();
                if matches!(self.current(), Token::Dot) {
                    self.advance();
                    match self.current().clone() {
                        Token::Ident(attr) => {
                            self.advance();
                            Expr::Attribute { name, attr }
                        }
                        other => {
                            return Err(self.error(format!("expected attribute name, found {:?}", other)))
                        }
                    }
                } else {
                    Expr::Variable(name)
                }
            }
            Token::Minus => {
                self.advance();
                let inner = self.parse_factor()?;
                Expr::Neg(Box::new(inner))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_bool()?;
                self.expect(Token::RParen, "')'")?;
                inner
            }
            Token::Eof => return Err(self.error("unexpected end of formula")),
            other => return Err(self.error(format!("unexpected {:?}", other))),
        };
        Ok(expr)
    }
}
