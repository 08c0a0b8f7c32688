//! Expression AST.
//!
//! - `Literal`: numeric constant
//! - `Field`: panel column reference
//! - `Neg`: unary minus
//! - `Binary`: arithmetic operator
//! - `Call`: built-in function with positional arguments; window parameters are
//!   stored as `Literal` arguments in their declared slot

use crate::domain::function::Function;
use crate::domain::panel::Field;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
        }
    }

    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
            BinaryOp::Pow => left.powf(right),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    Field(Field),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Window literal of a windowed call, if this node is one. Negative
    /// literals are kept so they can be reported as parameter errors.
    pub fn window(&self) -> Option<i64> {
        match self {
            Expr::Call { function, args } if function.signature().window => {
                match args.last() {
                    Some(Expr::Literal(v)) => Some(*v as i64),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Every `(function, window)` pair in the tree, outermost first.
    pub fn windows(&self) -> Vec<(Function, i64)> {
        let mut out = Vec::new();
        self.collect_windows(&mut out);
        out
    }

    fn collect_windows(&self, out: &mut Vec<(Function, i64)>) {
        match self {
            Expr::Literal(_) | Expr::Field(_) => {}
            Expr::Neg(inner) => inner.collect_windows(out),
            Expr::Binary { left, right, .. } => {
                left.collect_windows(out);
                right.collect_windows(out);
            }
            Expr::Call { function, args } => {
                if let Some(n) = self.window() {
                    out.push((*function, n));
                }
                for arg in args {
                    arg.collect_windows(out);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) if v.is_sign_negative() => write!(f, "({v})"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Field(field) => write!(f, "{field}"),
            Expr::Neg(inner) => write!(f, "(-{inner})"),
            Expr::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expr::Call { function, args } => {
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
