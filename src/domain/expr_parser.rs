//! Factor expression parser.
//!
//! Recursive descent parser for the expression grammar. Converts text to AST with
//! meaningful error messages including character offset, expected/found tokens.
//!
//! Precedence, loosest first: `+ -`, `* /`, unary `-`, `**` (right associative).
//! Function names and arities are resolved here, so a successfully parsed
//! expression never fails on an unknown name during evaluation.

use crate::domain::error::{ParseError, ParseErrorKind};
use crate::domain::expr::{BinaryOp, Expr};
use crate::domain::function::Function;
use crate::domain::panel::Field;

/// Deepest accepted nesting, both of the source text and of the built tree.
pub const MAX_DEPTH: usize = 256;

/// A parsed subtree and its depth.
type Parsed = (Expr, usize);

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            nesting: 0,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            Some(ch) => format!("'{ch}'"),
            None => "end of input".to_string(),
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(ParseError::syntax(
                format!("expected '{}', found {}", expected, self.describe_next()),
                self.pos,
            )),
        }
    }

    fn parse_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn consume_digits(&mut self) -> usize {
        let mut digits = 0;
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
            digits += 1;
        }
        digits
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        let mut digits = self.consume_digits();
        if self.peek() == Some('.') {
            self.advance();
            digits += self.consume_digits();
        }
        if digits == 0 {
            return Err(ParseError::syntax("expected number", start));
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let mark = self.pos;
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            if self.consume_digits() == 0 {
                self.pos = mark;
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| {
            ParseError::syntax(format!("invalid number: {}", num_str), start)
        })
    }

    /// Depth of a node whose deepest child has depth `child`.
    fn deepen(&self, child: usize, position: usize) -> Result<usize, ParseError> {
        let depth = child + 1;
        if depth > MAX_DEPTH {
            return Err(ParseError::syntax("expression nested too deeply", position));
        }
        Ok(depth)
    }

    fn parse_additive(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut depth) = self.parse_multiplicative()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => return Ok((left, depth)),
            };
            let at = self.pos;
            self.advance();
            let (right, right_depth) = self.parse_multiplicative()?;
            depth = self.deepen(depth.max(right_depth), at)?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut depth) = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let op = if self.remaining().starts_with("**") {
                return Ok((left, depth));
            } else {
                match self.peek() {
                    Some('*') => BinaryOp::Mul,
                    Some('/') => BinaryOp::Div,
                    _ => return Ok((left, depth)),
                }
            };
            let at = self.pos;
            self.advance();
            let (right, right_depth) = self.parse_unary()?;
            depth = self.deepen(depth.max(right_depth), at)?;
            left = Expr::binary(op, left, right);
        }
    }

    /// Every nested construct passes through here, so this is where
    /// recursion is bounded.
    fn parse_unary(&mut self) -> Result<Parsed, ParseError> {
        self.skip_whitespace();
        self.nesting += 1;
        let result = if self.nesting > MAX_DEPTH {
            Err(ParseError::syntax("expression nested too deeply", self.pos))
        } else {
            self.parse_signed()
        };
        self.nesting -= 1;
        result
    }

    fn parse_signed(&mut self) -> Result<Parsed, ParseError> {
        if self.peek() == Some('-') {
            let at = self.pos;
            self.advance();
            let (operand, depth) = self.parse_unary()?;
            return Ok(match operand {
                Expr::Literal(v) => (Expr::Literal(-v), depth),
                other => (Expr::Neg(Box::new(other)), self.deepen(depth, at)?),
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Parsed, ParseError> {
        let (base, base_depth) = self.parse_primary()?;
        self.skip_whitespace();
        if self.remaining().starts_with("**") {
            let at = self.pos;
            self.pos += 2;
            let (exponent, exponent_depth) = self.parse_unary()?;
            let depth = self.deepen(base_depth.max(exponent_depth), at)?;
            return Ok((Expr::binary(BinaryOp::Pow, base, exponent), depth));
        }
        Ok((base, base_depth))
    }

    fn parse_primary(&mut self) -> Result<Parsed, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' => {
                Ok((Expr::Literal(self.parse_number()?), 1))
            }
            Some('(') => {
                self.advance();
                let inner = self.parse_additive()?;
                self.expect_char(')')?;
                Ok(inner)
            }
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => self.parse_name(),
            _ => Err(ParseError::syntax(
                format!("expected expression, found {}", self.describe_next()),
                self.pos,
            )),
        }
    }

    fn parse_name(&mut self) -> Result<Parsed, ParseError> {
        let start = self.pos;
        let name = self.parse_identifier();
        self.skip_whitespace();

        if self.peek() == Some('(') {
            let function = Function::resolve(name).ok_or_else(|| ParseError {
                kind: ParseErrorKind::UnknownFunction(name.to_string()),
                position: start,
            })?;
            self.advance();
            return self.parse_call(function, start);
        }

        Field::from_name(name)
            .map(|field| (Expr::Field(field), 1))
            .ok_or_else(|| ParseError {
                kind: ParseErrorKind::UnknownField(name.to_string()),
                position: start,
            })
    }

    /// Parses the argument list after the opening parenthesis.
    fn parse_call(&mut self, function: Function, start: usize) -> Result<Parsed, ParseError> {
        let mut args = Vec::new();
        let mut positions = Vec::new();
        let mut depth = 0;

        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
        } else {
            loop {
                self.skip_whitespace();
                positions.push(self.pos);
                let (arg, arg_depth) = self.parse_additive()?;
                depth = depth.max(arg_depth);
                args.push(arg);
                self.skip_whitespace();
                match self.peek() {
                    Some(',') => {
                        self.advance();
                    }
                    Some(')') => {
                        self.advance();
                        break;
                    }
                    _ => {
                        return Err(ParseError::syntax(
                            format!("expected ',' or ')', found {}", self.describe_next()),
                            self.pos,
                        ));
                    }
                }
            }
        }

        let signature = function.signature();
        if args.len() != signature.arity() {
            return Err(ParseError {
                kind: ParseErrorKind::Arity {
                    function: function.name().to_string(),
                    expected: signature.arity(),
                    actual: args.len(),
                },
                position: start,
            });
        }

        if signature.window {
            let slot = args.len() - 1;
            let is_window_literal = matches!(args[slot], Expr::Literal(v) if v.fract() == 0.0);
            if !is_window_literal {
                return Err(ParseError {
                    kind: ParseErrorKind::WindowLiteral {
                        function: function.name().to_string(),
                        argument: slot + 1,
                    },
                    position: positions[slot],
                });
            }
        }

        let depth = self.deepen(depth, start)?;
        Ok((Expr::Call { function, args }, depth))
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let (expr, _) = self.parse_additive()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError::syntax(
                format!("unexpected input after expression: '{}'", self.remaining()),
                self.pos,
            ));
        }
        Ok(expr)
    }
}

pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
