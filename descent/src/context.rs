//! Contextual errors for grammar sources.
//!
//! [Context] attaches the offending line, its position and the file name
//! to any error kind; [MaybeContext] allows mixing located errors with
//! ones that have no source position (I/O, late emission failures).

use std::fmt::Display;

use colored::Colorize;

/// Gives locational context to the inner error kind
#[derive(Debug)]
pub struct Context<T: Display> {
    /// The kind of error that occurred
    kind: T,
    /// The contents of the grammar line on which the error occurred
    line: String,
    /// The line number on which the error occurred (zero-based)
    line_num: usize,
    /// The place along the line at which the error occurred
    line_index: usize,
    /// The name of the file in which the error occurred
    file_name: String,
}

impl<T: Display> Context<T> {
    /// Construct a located error
    pub fn new(kind: T, line: String, line_num: usize, line_index: usize, file_name: String) -> Self {
        Self {
            kind,
            line,
            line_num,
            line_index,
            file_name,
        }
    }

    /// Convert the kind while keeping the location
    pub fn map_kind<F: FnOnce(T) -> U, U: Display>(self, f: F) -> Context<U> {
        let Self {
            kind,
            line,
            line_num,
            line_index,
            file_name,
        } = self;

        Context {
            kind: f(kind),
            line,
            line_num,
            line_index,
            file_name,
        }
    }

    /// The inner error kind
    pub fn kind(&self) -> &T {
        &self.kind
    }
}

impl<T: Display> Display for Context<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // [ERROR] unknown directive '%begin' at expr.grammar:3:1
        // %begin Root
        // ^~~ here

        writeln!(
            f,
            "{} at {}:{}:{}",
            self.kind,
            self.file_name.purple(),
            (self.line_num + 1).to_string().purple(),
            (self.line_index + 1).to_string().purple()
        )?;
        writeln!(f, "{}", self.line)?;
        write!(f, "{}{}", " ".repeat(self.line_index), "^~~ here".blue())
    }
}

/// An error that may or may not carry a source location.
///
/// Loader errors point at a grammar line; planning and I/O failures do
/// not. The driver funnels both kinds through this type.
#[derive(Debug)]
pub enum MaybeContext<T: Display> {
    /// The error points at a grammar-source location
    Context(Context<T>),
    /// The error has no location
    NoContext(T),
}

impl<T: Display> From<Context<T>> for MaybeContext<T> {
    fn from(value: Context<T>) -> Self {
        Self::Context(value)
    }
}

impl<T: Display> From<T> for MaybeContext<T> {
    fn from(value: T) -> Self {
        Self::NoContext(value)
    }
}

impl<T: Display> Display for MaybeContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaybeContext::Context(c) => c.fmt(f),
            MaybeContext::NoContext(n) => n.fmt(f),
        }
    }
}
