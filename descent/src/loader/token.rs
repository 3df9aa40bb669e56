//! Lexical pieces of the grammar DSL: directives and symbol tokens.

use std::fmt::Display;
use std::str::FromStr;

use super::error::Error;

/// The `%`-directives the DSL understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `%start Name` — designate the start symbol
    Start,
    /// `%token A B …` — declare terminal kinds
    Token,
    /// `%left 'op' …` — append a left-associative operator row
    Left,
    /// `%right 'op' …` — append a right-associative operator row
    Right,
    /// `%nonassoc 'op' …` — append a non-associative operator row
    Nonassoc,
    /// `%special Name handler` — bind a nonterminal to a special emitter
    Special,
}

impl Directive {
    /// Array of all directives (used for lookups)
    pub const VALUES: [Self; 6] = [
        Self::Start,
        Self::Token,
        Self::Left,
        Self::Right,
        Self::Nonassoc,
        Self::Special,
    ];

    /// The directive's spelling, without the `%`
    pub const fn to_str(&self) -> &'static str {
        match self {
            Directive::Start => "start",
            Directive::Token => "token",
            Directive::Left => "left",
            Directive::Right => "right",
            Directive::Nonassoc => "nonassoc",
            Directive::Special => "special",
        }
    }
}

impl FromStr for Directive {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix('%').unwrap_or(s);
        Self::VALUES
            .iter()
            .find(|d| d.to_str() == name)
            .copied()
            .ok_or(())
    }
}

impl Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.to_str())
    }
}

/// One symbol token of an alternative or directive argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolToken {
    /// The symbol name, quotes stripped
    pub name: String,
    /// Whether the symbol was quoted (an implicit terminal)
    pub quoted: bool,
}

/// Decode one whitespace-delimited symbol token.
///
/// `'+'` is an implicit terminal named `+`; a bare token must look like
/// an identifier (a leading letter or underscore, then letters, digits,
/// `_`, `$` or primes).
pub fn parse_symbol(token: &str) -> Result<SymbolToken, Error> {
    if let Some(rest) = token.strip_prefix('\'') {
        let inner = rest
            .strip_suffix('\'')
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::BadSymbol(token.to_string()))?;
        return Ok(SymbolToken {
            name: inner.to_string(),
            quoted: true,
        });
    }

    let mut chars = token.chars();
    let head_ok = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_');
    let tail_ok = chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '\'');
    if head_ok && tail_ok {
        Ok(SymbolToken {
            name: token.to_string(),
            quoted: false,
        })
    } else {
        Err(Error::BadSymbol(token.to_string()))
    }
}
