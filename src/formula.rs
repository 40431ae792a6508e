//! Formula sublanguage of the "multi" rule tier.
//!
//! A formula is compiled once, when its edition loads, into an [`Expr`] tree
//! and then interpreted for every matching macro call. The language has no
//! variables, loops or I/O: only argument references, string literals,
//! concatenation with `+` and calls into a fixed library of text functions.
//!
//! ```text
//! formula ::= concat
//! concat  ::= primary ("+" primary)*
//! primary ::= string | ref | call | "(" concat ")"
//! ref     ::= "$" "-"? digits ("?" | "..")? | "$" ident | "@name" | "@word"
//! call    ::= ident "(" (concat ("," concat)*)? ")"
//! ```

use thiserror::Error;

use crate::call::MacroCall;
use crate::error::ConfigError;
use crate::functions;

/// Library functions a formula may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Italic,
    Strong,
    Superscript,
    Subscript,
    SmallCaps,
    Small,
    Underline,
    Strike,
    Parenthesis,
    Join,
    Capitalize,
    Lower,
    Color,
    Ruby,
    Roman,
    Expr,
    If,
    Term,
    Concat,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "italic" => Function::Italic,
            "strong" => Function::Strong,
            "superscript" => Function::Superscript,
            "subscript" => Function::Subscript,
            "small_caps" => Function::SmallCaps,
            "small" => Function::Small,
            "underline" => Function::Underline,
            "strike" => Function::Strike,
            "parenthesis" => Function::Parenthesis,
            "join" => Function::Join,
            "capitalize" => Function::Capitalize,
            "lower" => Function::Lower,
            "color" => Function::Color,
            "ruby" => Function::Ruby,
            "roman" => Function::Roman,
            "expr" => Function::Expr,
            "if" => Function::If,
            "term" => Function::Term,
            "concat" => Function::Concat,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Italic => "italic",
            Function::Strong => "strong",
            Function::Superscript => "superscript",
            Function::Subscript => "subscript",
            Function::SmallCaps => "small_caps",
            Function::Small => "small",
            Function::Underline => "underline",
            Function::Strike => "strike",
            Function::Parenthesis => "parenthesis",
            Function::Join => "join",
            Function::Capitalize => "capitalize",
            Function::Lower => "lower",
            Function::Color => "color",
            Function::Ruby => "ruby",
            Function::Roman => "roman",
            Function::Expr => "expr",
            Function::If => "if",
            Function::Term => "term",
            Function::Concat => "concat",
        }
    }

    /// Accepted argument counts, inclusive.
    fn arity(self) -> (usize, usize) {
        match self {
            Function::Parenthesis => (1, 3),
            Function::Join | Function::Ruby => (2, 2),
            Function::Color | Function::Concat => (1, 2),
            Function::If => (2, 3),
            _ => (1, 1),
        }
    }
}

/// Compiled formula tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(String),
    /// `$n`; negative indices count from the end.
    Positional(isize),
    /// `$n?`: empty when absent.
    OptionalPositional(isize),
    /// `$n..`: every positional argument from `n` on.
    Rest(usize),
    Keyword(String),
    Name,
    Headword,
    Call(Function, Vec<Expr>),
    Concat(Vec<Expr>),
}

/// Runtime failure of a formula. The resolver renders these as the
/// unresolved-macro marker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("positional argument {0} is out of range")]
    OutOfRange(isize),
    #[error("{0} expects text, got a list")]
    ExpectedText(&'static str),
    #[error("concatenation of a list")]
    ConcatList,
    #[error("{0}: invalid number {1:?}")]
    InvalidNumber(&'static str, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Text(String),
    List(Vec<String>),
}

impl Value {
    fn into_text(self, context: &'static str) -> Result<String, EvalError> {
        match self {
            Value::Text(text) => Ok(text),
            Value::List(_) => Err(EvalError::ExpectedText(context)),
        }
    }

    fn into_list(self) -> Vec<String> {
        match self {
            Value::Text(text) => vec![text],
            Value::List(items) => items,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lexer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Str(String),
    Ref(Expr),
    Ident(String),
    Plus,
    Comma,
    Open,
    Close,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn lex(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => text.push(ch),
                    }
                }
                if !closed {
                    return Err(format!("unterminated string at offset {offset}"));
                }
                tokens.push(Token::Str(text));
            }
            '$' => {
                chars.next();
                let mut raw = String::new();
                if let Some(&(_, '-')) = chars.peek() {
                    raw.push('-');
                    chars.next();
                }
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_ident_char(ch) {
                        break;
                    }
                    raw.push(ch);
                    chars.next();
                }
                let index = raw.parse::<isize>();
                let expr = match (index, chars.peek().map(|&(_, ch)| ch)) {
                    (Ok(i), Some('?')) => {
                        chars.next();
                        Expr::OptionalPositional(i)
                    }
                    (Ok(i), Some('.')) => {
                        chars.next();
                        if chars.next().map(|(_, ch)| ch) != Some('.') || i < 0 {
                            return Err(format!("invalid rest reference at offset {offset}"));
                        }
                        Expr::Rest(i as usize)
                    }
                    (Ok(i), _) => Expr::Positional(i),
                    (Err(_), _) if !raw.is_empty() && !raw.starts_with('-') => Expr::Keyword(raw),
                    (Err(_), _) => return Err(format!("invalid reference at offset {offset}")),
                };
                tokens.push(Token::Ref(expr));
            }
            '@' => {
                chars.next();
                let mut raw = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_ident_char(ch) {
                        break;
                    }
                    raw.push(ch);
                    chars.next();
                }
                let expr = match raw.as_str() {
                    "name" => Expr::Name,
                    "word" => Expr::Headword,
                    other => return Err(format!("unknown variable @{other}")),
                };
                tokens.push(Token::Ref(expr));
            }
            c if is_ident_char(c) => {
                let mut raw = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_ident_char(ch) {
                        break;
                    }
                    raw.push(ch);
                    chars.next();
                }
                tokens.push(Token::Ident(raw));
            }
            other => return Err(format!("unexpected character {other:?} at offset {offset}")),
        }
    }
    Ok(tokens)
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

struct Parser<'a> {
    name: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn syntax(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Formula {
            name: self.name.to_string(),
            message: message.into(),
        }
    }

    fn concat(&mut self) -> Result<Expr, ConfigError> {
        let mut parts = vec![self.primary()?];
        while self.peek() == Some(&Token::Plus) {
            self.pos += 1;
            parts.push(self.primary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::Concat(parts)
        })
    }

    fn primary(&mut self) -> Result<Expr, ConfigError> {
        match self.next() {
            Some(Token::Str(text)) => Ok(Expr::Literal(text)),
            Some(Token::Ref(expr)) => Ok(expr),
            Some(Token::Open) => {
                let inner = self.concat()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(self.syntax("expected ')'")),
                }
            }
            Some(Token::Ident(ident)) => {
                let function = Function::from_name(&ident).ok_or_else(|| ConfigError::UnknownFunction {
                    name: self.name.to_string(),
                    function: ident.clone(),
                })?;
                if self.next() != Some(Token::Open) {
                    return Err(self.syntax(format!("expected '(' after {ident}")));
                }
                let mut args = Vec::new();
                if self.peek() == Some(&Token::Close) {
                    self.pos += 1;
                } else {
                    loop {
                        args.push(self.concat()?);
                        match self.next() {
                            Some(Token::Comma) => continue,
                            Some(Token::Close) => break,
                            _ => return Err(self.syntax(format!("expected ',' or ')' in {ident}()"))),
                        }
                    }
                }
                let (min, max) = function.arity();
                if args.len() < min || args.len() > max {
                    return Err(ConfigError::Arity {
                        name: self.name.to_string(),
                        function: function.name(),
                        expected: if min == max {
                            min.to_string()
                        } else {
                            format!("{min} to {max}")
                        },
                        got: args.len(),
                    });
                }
                Ok(Expr::Call(function, args))
            }
            Some(other) => Err(self.syntax(format!("unexpected token {other:?}"))),
            None => Err(self.syntax("unexpected end of formula")),
        }
    }
}

/// Compile the formula registered for macro `name`.
pub fn compile(name: &str, source: &str) -> Result<Expr, ConfigError> {
    let tokens = lex(source).map_err(|message| ConfigError::Formula {
        name: name.to_string(),
        message,
    })?;
    let mut parser = Parser { name, tokens, pos: 0 };
    let expr = parser.concat()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.syntax("trailing input"));
    }
    Ok(expr)
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

/// What a formula can see while it runs.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub call: &'a MacroCall,
    pub headword: &'a str,
}

impl<'a> Scope<'a> {
    fn positional(&self, index: isize) -> Option<&'a str> {
        let len = self.call.positional.len() as isize;
        if index >= 0 {
            // An explicit numeric keyword names the same slot.
            if let Some(value) = self.call.keywords.get(&(index + 1).to_string()) {
                return Some(value);
            }
        }
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 {
            return None;
        }
        self.call.positional(resolved as usize)
    }
}

impl Expr {
    /// Evaluate to text.
    pub fn eval(&self, scope: &Scope<'_>) -> Result<String, EvalError> {
        self.value(scope)?.into_text("formula")
    }

    fn value(&self, scope: &Scope<'_>) -> Result<Value, EvalError> {
        Ok(match self {
            Expr::Literal(text) => Value::Text(text.clone()),
            Expr::Positional(i) => Value::Text(
                scope
                    .positional(*i)
                    .ok_or(EvalError::OutOfRange(*i))?
                    .to_string(),
            ),
            Expr::OptionalPositional(i) => {
                Value::Text(scope.positional(*i).unwrap_or_default().to_string())
            }
            Expr::Rest(from) => Value::List(
                scope
                    .call
                    .positional
                    .iter()
                    .skip(*from)
                    .cloned()
                    .collect(),
            ),
            Expr::Keyword(key) => Value::Text(scope.call.keyword(key).to_string()),
            Expr::Name => Value::Text(scope.call.name.clone()),
            Expr::Headword => Value::Text(scope.headword.to_string()),
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part.value(scope)? {
                        Value::Text(text) => out.push_str(&text),
                        Value::List(_) => return Err(EvalError::ConcatList),
                    }
                }
                Value::Text(out)
            }
            Expr::Call(function, args) => Value::Text(apply(*function, args, scope)?),
        })
    }
}

fn apply(function: Function, args: &[Expr], scope: &Scope<'_>) -> Result<String, EvalError> {
    let name = function.name();
    let text = |i: usize| -> Result<String, EvalError> {
        match args.get(i) {
            Some(arg) => arg.value(scope)?.into_text(name),
            None => Ok(String::new()),
        }
    };
    let list = |i: usize| -> Result<Vec<String>, EvalError> {
        match args.get(i) {
            Some(arg) => Ok(arg.value(scope)?.into_list()),
            None => Ok(Vec::new()),
        }
    };

    Ok(match function {
        Function::Italic => functions::italic(&text(0)?),
        Function::Strong => functions::strong(&text(0)?),
        Function::Superscript => functions::superscript(&text(0)?),
        Function::Subscript => functions::subscript(&text(0)?),
        Function::SmallCaps => functions::small_caps(&text(0)?),
        Function::Small => functions::small(&text(0)?),
        Function::Underline => functions::underline(&text(0)?),
        Function::Strike => functions::strike(&text(0)?),
        Function::Term => functions::term(&text(0)?),
        Function::Capitalize => functions::capitalize(&text(0)?),
        Function::Lower => functions::lower(&text(0)?),
        Function::Parenthesis => match args.len() {
            1 => functions::parenthesis(&text(0)?, "(", ")"),
            2 => functions::parenthesis(&text(0)?, &text(1)?, ")"),
            _ => functions::parenthesis(&text(0)?, &text(1)?, &text(2)?),
        },
        Function::Join => functions::join(&list(0)?, &text(1)?),
        Function::Concat => list(0)?.join(&text(1)?),
        Function::Color => {
            let label = if args.len() > 1 { Some(text(1)?) } else { None };
            functions::color(&text(0)?, label.as_deref())
        }
        Function::Ruby => functions::ruby(&text(0)?, &text(1)?),
        Function::Roman => {
            let raw = text(0)?;
            raw.trim()
                .parse::<u32>()
                .ok()
                .and_then(functions::roman)
                .ok_or(EvalError::InvalidNumber(name, raw))?
        }
        Function::Expr => {
            let raw = text(0)?;
            functions::arithmetic(&raw)
                .map(functions::format_number)
                .ok_or(EvalError::InvalidNumber(name, raw))?
        }
        Function::If => {
            if !text(0)?.trim().is_empty() {
                text(1)?
            } else {
                text(2)?
            }
        }
    })
}
