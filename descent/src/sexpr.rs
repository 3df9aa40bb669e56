//! The s-expression output data type.
//!
//! The sole output of an emitted parser: an atom or an ordered sequence
//! of s-expressions. By convention the first element of a non-empty
//! sequence is a head naming the construct; the generator imposes no
//! structural contract beyond that.

use std::fmt::Display;

/// An atom payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A string atom
    Str(String),
    /// A numeric atom
    Num(f64),
    /// A boolean atom
    Bool(bool),
    /// The null atom, also used for list holes
    Null,
    /// An opaque token payload with side metadata (quote style, regex
    /// flavor, sigils). Flows through the generator unexamined.
    Carrier {
        /// The token's underlying value
        value: Box<Value>,
        /// Lexer-attached metadata, preserved verbatim
        meta: Vec<(String, String)>,
    },
}

impl Value {
    /// Unwrap one carrier layer, as `.value` does in an action
    pub fn unwrap_carrier(&self) -> &Value {
        match self {
            Value::Carrier { value, .. } => value,
            other => other,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Num(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            // metadata is a side channel; display the payload only
            Value::Carrier { value, .. } => value.fmt(f),
        }
    }
}

/// An s-expression: an atom or an ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    /// A leaf value
    Atom(Value),
    /// An ordered sequence of s-expressions
    Seq(Vec<SExpr>),
}

impl SExpr {
    /// A string atom
    pub fn str(s: impl Into<String>) -> Self {
        SExpr::Atom(Value::Str(s.into()))
    }

    /// The null atom
    pub fn null() -> Self {
        SExpr::Atom(Value::Null)
    }
}

impl Display for SExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Atom(v) => v.fmt(f),
            SExpr::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt(f)?;
                }
                write!(f, "]")
            }
        }
    }
}
