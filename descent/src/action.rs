//! The semantic-action transformer.
//!
//! Actions address rhs positions either with bare integers (`1`,
//! `2.value`) or with dollar-prefixed references (`$1`). The transformer
//! rewrites both forms to the emitter locals `$$1, $$2, …` and is
//! character-identical everywhere else. It also parses the transformed
//! text into a small expression tree for the reference runtime; the
//! JavaScript emitter always uses the text itself, so the tree's subset
//! never constrains what an action may contain.

/// A transformed action, ready for emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    /// The action text with every positional reference rewritten to `$$k`
    pub text: String,
    /// Every referenced position, deduplicated and sorted
    pub positions: Vec<usize>,
    /// Set when the whole action is a single positional reference
    pub pass_through: Option<usize>,
}

/// Whether the action uses dollar-prefixed positional references.
///
/// The presence of any `$k` outside a string literal switches the
/// transform to dollar mode, in which bare integers are numeric
/// literals and stay untouched.
fn uses_dollar_refs(chars: &[char]) -> bool {
    let mut in_str: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match in_str {
            Some(quote) => {
                if c == '\\' {
                    i += 1;
                } else if c == quote {
                    in_str = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    in_str = Some(c);
                } else if c == '$' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
                    return true;
                }
            }
        }
        i += 1;
    }
    false
}

/// Number of consecutive dots immediately before position `i`
fn dots_before(chars: &[char], i: usize) -> usize {
    let mut count = 0;
    while count < i && chars[i - 1 - count] == '.' {
        count += 1;
    }
    count
}

/// Whether a bare digit run starting at `i` sits in a reference context.
///
/// Disqualified when glued to an identifier (`x1`), to a member access
/// or float fraction (`.5`), or followed by an alphabetic character
/// (`1e3`). A run preceded by a spread (`...1`) qualifies.
fn bare_run_qualifies(chars: &[char], i: usize, run_end: usize) -> bool {
    if i > 0 {
        let prev = chars[i - 1];
        if prev.is_alphanumeric() || prev == '_' || prev == '$' {
            return false;
        }
        if prev == '.' && dots_before(chars, i) != 3 {
            return false;
        }
    }
    match chars.get(run_end) {
        // 1e3, 3px: a letter glues the run into a longer literal
        Some(c) if c.is_alphabetic() => false,
        // integer part of a float literal
        Some('.') if chars.get(run_end + 1).is_some_and(|c| c.is_ascii_digit()) => false,
        _ => true,
    }
}

/// Rewrite every positional reference in an action to `$$k`.
pub fn transform(action: &str) -> Transformed {
    let chars: Vec<char> = action.chars().collect();
    let dollar_mode = uses_dollar_refs(&chars);

    let mut out = String::with_capacity(action.len() + 8);
    let mut positions: Vec<usize> = Vec::new();
    let mut in_str: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(quote) = in_str {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            } else if c == quote {
                in_str = None;
            }
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' {
            in_str = Some(c);
            out.push(c);
            i += 1;
            continue;
        }

        if dollar_mode {
            if c == '$' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                let digits: String = chars[i + 1..j].iter().collect();
                positions.push(digits.parse().unwrap());
                out.push_str("$$");
                out.push_str(&digits);
                i = j;
                continue;
            }
        } else if c.is_ascii_digit() {
            let mut j = i;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            if bare_run_qualifies(&chars, i, j) {
                let digits: String = chars[i..j].iter().collect();
                positions.push(digits.parse().unwrap());
                out.push_str("$$");
                out.push_str(&digits);
                i = j;
                continue;
            }
            // not a reference: copy the whole run untouched
            for &d in &chars[i..j] {
                out.push(d);
            }
            i = j;
            continue;
        }

        out.push(c);
        i += 1;
    }

    positions.sort_unstable();
    positions.dedup();

    let pass_through = pass_through_of(action.trim());

    Transformed {
        text: out,
        positions,
        pass_through,
    }
}

/// Detect a whole-action pass-through reference (`1` or `$1`)
fn pass_through_of(trimmed: &str) -> Option<usize> {
    let digits = trimmed.strip_prefix('$').unwrap_or(trimmed);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// An action expression the reference runtime can evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionExpr {
    /// `$$k`: the value captured at position k
    Ref(usize),
    /// `$$k.value`: one carrier layer unwrapped
    RefValue(usize),
    /// A string literal
    Str(String),
    /// A numeric literal
    Num(f64),
    /// A boolean literal
    Bool(bool),
    /// The null literal
    Null,
    /// An array literal
    Array(Vec<ActionItem>),
}

/// One element of an array literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionItem {
    /// A plain element
    Expr(ActionExpr),
    /// A spread operand: the element's sequence is spliced in place
    Spread(ActionExpr),
}

/// Parse a transformed action into an expression tree.
///
/// Returns [None] for any action outside the array/literal/reference
/// subset; emission still works for such actions, only the reference
/// runtime refuses them.
pub fn parse_expr(text: &str) -> Option<ActionExpr> {
    let mut cursor = Cursor::new(text);
    let expr = cursor.value()?;
    cursor.skip_ws();
    if cursor.at_end() {
        Some(expr)
    } else {
        None
    }
}

/// Character cursor over action text
struct Cursor {
    /// The characters of the action
    chars: Vec<char>,
    /// Current position
    pos: usize,
}

impl Cursor {
    /// Construct a cursor at the start of the text
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    /// The current character, if any
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Advance one character
    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Skip whitespace
    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Whether the cursor consumed everything
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Consume the literal string if it is next
    fn eat(&mut self, literal: &str) -> bool {
        let lit: Vec<char> = literal.chars().collect();
        if self.chars[self.pos..].starts_with(&lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    /// Parse one value
    fn value(&mut self) -> Option<ActionExpr> {
        self.skip_ws();
        match self.peek()? {
            '[' => self.array(),
            '"' | '\'' => self.string(),
            '$' => self.reference(),
            c if c.is_ascii_digit() || c == '-' => self.number(),
            c if c.is_alphabetic() => self.word(),
            _ => None,
        }
    }

    /// Parse an array literal
    fn array(&mut self) -> Option<ActionExpr> {
        self.bump(); // '['
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek()? {
                ']' => {
                    self.bump();
                    return Some(ActionExpr::Array(items));
                }
                ',' => {
                    self.bump();
                }
                _ => {
                    if self.eat("...") {
                        items.push(ActionItem::Spread(self.value()?));
                    } else {
                        items.push(ActionItem::Expr(self.value()?));
                    }
                }
            }
        }
    }

    /// Parse a string literal
    fn string(&mut self) -> Option<ActionExpr> {
        let quote = self.bump()?;
        let mut s = String::new();
        loop {
            match self.bump()? {
                '\\' => {
                    let escaped = self.bump()?;
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c == quote => return Some(ActionExpr::Str(s)),
                c => s.push(c),
            }
        }
    }

    /// Parse a `$$k` or `$$k.value` reference
    fn reference(&mut self) -> Option<ActionExpr> {
        if !self.eat("$$") {
            return None;
        }
        let mut digits = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            digits.push(self.bump().unwrap());
        }
        let k: usize = digits.parse().ok()?;
        if self.eat(".value") {
            Some(ActionExpr::RefValue(k))
        } else {
            Some(ActionExpr::Ref(k))
        }
    }

    /// Parse a numeric literal
    fn number(&mut self) -> Option<ActionExpr> {
        let mut s = String::new();
        if self.peek() == Some('-') {
            s.push(self.bump().unwrap());
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            s.push(self.bump().unwrap());
        }
        if self.peek() == Some('.') && self.chars.get(self.pos + 1).is_some_and(|c| c.is_ascii_digit()) {
            s.push(self.bump().unwrap());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                s.push(self.bump().unwrap());
            }
        }
        s.parse().ok().map(ActionExpr::Num)
    }

    /// Parse `true`, `false` or `null`
    fn word(&mut self) -> Option<ActionExpr> {
        let mut s = String::new();
        while self.peek().is_some_and(|c| c.is_alphabetic()) {
            s.push(self.bump().unwrap());
        }
        match s.as_str() {
            "true" => Some(ActionExpr::Bool(true)),
            "false" => Some(ActionExpr::Bool(false)),
            "null" => Some(ActionExpr::Null),
            _ => None,
        }
    }
}
