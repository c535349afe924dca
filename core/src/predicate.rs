//! Reward/penalty predicate language.
//!
//! A closed grammar over two numeric variables; nothing in a policy file can
//! reach beyond comparing `coh` and `mir` against literals.
//!
//! ```text
//! expr       := or
//! or         := and (("or" | "||") and)*
//! and        := not (("and" | "&&") not)*
//! not        := ("not" | "!") not | primary
//! primary    := "(" expr ")" | "true" | "false" | comparison
//! comparison := operand (cmp operand)+        chained: a < b < c == a < b and b < c
//! operand    := ["-"] number | "coh" | "mir" | "coherence" | "mirror_residual"
//! cmp        := "<" | "<=" | ">" | ">=" | "==" | "!="
//! ```

use std::fmt;

use thiserror::Error;

/// Nesting limit for parentheses and `not` chains.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character {ch:?} at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("invalid number {text:?} at offset {pos}")]
    InvalidNumber { text: String, pos: usize },
    #[error("unknown variable {name:?}; expected coh or mir")]
    UnknownVariable { name: String },
    #[error("expected {expected} at offset {pos}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
        pos: usize,
    },
    #[error("expression nests deeper than {} levels", MAX_DEPTH)]
    TooDeep,
    #[error("variable {name} is not a finite number ({value})")]
    NonFinite { name: &'static str, value: f64 },
}

/// Values bound to the predicate variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bindings {
    pub coh: f64,
    pub mir: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    Coh,
    Mir,
}

impl Var {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "coh" | "coherence" => Some(Var::Coh),
            "mir" | "mirror_residual" => Some(Var::Mir),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Var::Coh => "coh",
            Var::Mir => "mir",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Cmp {
    fn holds(self, a: f64, b: f64) -> bool {
        match self {
            Cmp::Lt => a < b,
            Cmp::Le => a <= b,
            Cmp::Gt => a > b,
            Cmp::Ge => a >= b,
            Cmp::Eq => a == b,
            Cmp::Ne => a != b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operand {
    Literal(f64),
    Var(Var),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Bool(bool),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        first: Operand,
        rest: Vec<(Cmp, Operand)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Cmp(Cmp),
    And,
    Or,
    Not,
    Minus,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::Ident(name) => write!(f, "{name:?}"),
            Token::Cmp(_) => f.write_str("comparison operator"),
            Token::And => f.write_str("`and`"),
            Token::Or => f.write_str("`or`"),
            Token::Not => f.write_str("`not`"),
            Token::Minus => f.write_str("`-`"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, PredicateError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let pos = i;
        let two = bytes.get(i + 1).copied();
        let token = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => {
                i += 1;
                Token::LParen
            }
            b')' => {
                i += 1;
                Token::RParen
            }
            b'-' => {
                i += 1;
                Token::Minus
            }
            b'<' | b'>' | b'=' | b'!' => {
                let eq = two == Some(b'=');
                i += if eq { 2 } else { 1 };
                match (c, eq) {
                    (b'<', false) => Token::Cmp(Cmp::Lt),
                    (b'<', true) => Token::Cmp(Cmp::Le),
                    (b'>', false) => Token::Cmp(Cmp::Gt),
                    (b'>', true) => Token::Cmp(Cmp::Ge),
                    (b'=', true) => Token::Cmp(Cmp::Eq),
                    (b'!', true) => Token::Cmp(Cmp::Ne),
                    (b'!', false) => Token::Not,
                    _ => return Err(PredicateError::UnexpectedChar { ch: '=', pos }),
                }
            }
            b'&' if two == Some(b'&') => {
                i += 2;
                Token::And
            }
            b'|' if two == Some(b'|') => {
                i += 2;
                Token::Or
            }
            b'0'..=b'9' | b'.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
                    i += 1;
                    if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
                        i += 1;
                    }
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = &src[pos..i];
                let Ok(value) = text.parse::<f64>() else {
                    let text = text.to_string();
                    return Err(PredicateError::InvalidNumber { text, pos });
                };
                Token::Number(value)
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                match &src[pos..i] {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    word => Token::Ident(word.to_string()),
                }
            }
            _ => {
                let ch = src[pos..].chars().next().unwrap_or('?');
                return Err(PredicateError::UnexpectedChar { ch, pos });
            }
        };
        tokens.push((pos, token));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn unexpected(&self, expected: &'static str) -> PredicateError {
        let found = match self.peek() {
            Some(token) => token.to_string(),
            None => "end of input".to_string(),
        };
        PredicateError::Unexpected {
            expected,
            found,
            pos: self.offset(),
        }
    }

    fn descend(&mut self) -> Result<(), PredicateError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(PredicateError::TooDeep);
        }
        Ok(())
    }

    fn or(&mut self) -> Result<Expr, PredicateError> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, PredicateError> {
        let mut lhs = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, PredicateError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.descend()?;
            let inner = self.not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, PredicateError> {
        match self.peek() {
            Some(Token::LParen) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.or()?;
                self.depth -= 1;
                if self.peek() != Some(&Token::RParen) {
                    return Err(self.unexpected("`)`"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Ident(word)) if word == "true" || word == "false" => {
                let value = word == "true";
                self.pos += 1;
                Ok(Expr::Bool(value))
            }
            _ => self.comparison(),
        }
    }

    fn comparison(&mut self) -> Result<Expr, PredicateError> {
        let first = self.operand()?;
        let mut rest = Vec::new();
        while let Some(Token::Cmp(cmp)) = self.peek() {
            let cmp = *cmp;
            self.pos += 1;
            rest.push((cmp, self.operand()?));
        }
        if rest.is_empty() {
            return Err(self.unexpected("comparison operator"));
        }
        Ok(Expr::Compare { first, rest })
    }

    fn operand(&mut self) -> Result<Operand, PredicateError> {
        let negate = if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            true
        } else {
            false
        };
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Operand::Literal(if negate { -n } else { n }))
            }
            Some(Token::Ident(name)) if !negate => {
                let Some(var) = Var::parse(&name) else {
                    return Err(PredicateError::UnknownVariable { name });
                };
                self.pos += 1;
                Ok(Operand::Var(var))
            }
            _ if negate => Err(self.unexpected("number")),
            _ => Err(self.unexpected("number or variable")),
        }
    }
}

/// A compiled predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: Expr,
}

impl Predicate {
    pub fn compile(source: &str) -> Result<Self, PredicateError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(PredicateError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let expr = parser.or()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.unexpected("end of input"));
        }
        Ok(Self { expr })
    }

    pub fn evaluate(&self, bindings: Bindings) -> Result<bool, PredicateError> {
        for (var, value) in [(Var::Coh, bindings.coh), (Var::Mir, bindings.mir)] {
            if !value.is_finite() {
                return Err(PredicateError::NonFinite {
                    name: var.name(),
                    value,
                });
            }
        }
        Ok(eval(&self.expr, bindings))
    }
}

fn eval(expr: &Expr, b: Bindings) -> bool {
    let value = |operand: Operand| match operand {
        Operand::Literal(n) => n,
        Operand::Var(Var::Coh) => b.coh,
        Operand::Var(Var::Mir) => b.mir,
    };
    match expr {
        Expr::Bool(v) => *v,
        Expr::Not(inner) => !eval(inner, b),
        Expr::And(lhs, rhs) => eval(lhs, b) && eval(rhs, b),
        Expr::Or(lhs, rhs) => eval(lhs, b) || eval(rhs, b),
        Expr::Compare { first, rest } => {
            let mut left = value(*first);
            for (cmp, operand) in rest {
                let right = value(*operand);
                if !cmp.holds(left, right) {
                    return false;
                }
                left = right;
            }
            true
        }
    }
}
