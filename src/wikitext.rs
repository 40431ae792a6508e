// ─────────────────────────────────────────────────────────────────────────────
// Wikitext tokenizer
// ─────────────────────────────────────────────────────────────────────────────
//
// Splits a buffer into plain text runs, balanced `{{…}}` macro spans and
// balanced `[[…]]` link spans. Nesting of both constructs is tracked so that a
// separator inside a nested construct never terminates an enclosing one.
// Unbalanced openers are returned as plain text.

/// Parsed wikilink: [[target#anchor|display]]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wikilink<'a> {
    pub target: &'a str,
    pub anchor: Option<&'a str>,
    pub display: Option<&'a str>,
}

impl<'a> Wikilink<'a> {
    /// Namespace prefix of the target (`Category` in `[[Category:Nouns]]`).
    pub fn namespace(&self) -> Option<&'a str> {
        let target = self.target.trim().trim_start_matches(':');
        target.split_once(':').map(|(ns, _)| ns.trim())
    }

    /// Target with a leading interwiki prefix removed (`[[:en:word]]` -> `word`).
    pub fn bare_target(&self) -> &'a str {
        let target = self.target.trim();
        match target.strip_prefix(':') {
            Some(rest) => rest.rsplit(':').next().unwrap_or(rest).trim(),
            None => target,
        }
    }
}

/// A balanced macro span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroSpan<'a> {
    /// Full source text including the braces.
    pub source: &'a str,
    /// Text between the outer braces.
    pub body: &'a str,
    /// A link opened inside the macro was never closed before the macro ended.
    pub malformed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<'a> {
    Text(&'a str),
    Macro(MacroSpan<'a>),
    Link(Wikilink<'a>),
}

/// Byte-offset scanner. Every delimiter we look for is ASCII, so stepping one
/// UTF-8 character at a time keeps every offset on a char boundary.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Scanner { text, pos: 0 }
    }

    fn at(&self, pattern: &str) -> bool {
        self.text[self.pos..].starts_with(pattern)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn bump(&mut self, n: usize) {
        self.pos += n;
    }

    fn bump_char(&mut self) {
        if let Some(c) = self.text[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // macro ::= "{{" (macro | link | char)* "}}"
    // Returns the end offset (exclusive) and whether a link was left open.
    // ─────────────────────────────────────────────────────────────
    fn find_macro_end(&mut self, start: usize) -> Option<(usize, bool)> {
        self.pos = start + 2;
        let mut braces = 1usize;
        let mut links = 0usize;
        while !self.at_end() {
            if self.at("{{") {
                braces += 1;
                self.bump(2);
            } else if self.at("}}") {
                braces -= 1;
                self.bump(2);
                if braces == 0 {
                    return Some((self.pos, links > 0));
                }
            } else if self.at("[[") {
                links += 1;
                self.bump(2);
            } else if self.at("]]") {
                links = links.saturating_sub(1);
                self.bump(2);
            } else {
                self.bump_char();
            }
        }
        None
    }

    // ─────────────────────────────────────────────────────────────
    // link ::= "[[" (macro | link | char)* "]]"
    // ─────────────────────────────────────────────────────────────
    fn find_link_end(&mut self, start: usize) -> Option<usize> {
        self.pos = start + 2;
        let mut links = 1usize;
        let mut braces = 0usize;
        while !self.at_end() {
            if self.at("[[") {
                links += 1;
                self.bump(2);
            } else if self.at("]]") {
                self.bump(2);
                if braces == 0 {
                    links -= 1;
                    if links == 0 {
                        return Some(self.pos);
                    }
                }
            } else if self.at("{{") {
                braces += 1;
                self.bump(2);
            } else if self.at("}}") {
                braces = braces.saturating_sub(1);
                self.bump(2);
            } else {
                self.bump_char();
            }
        }
        None
    }
}

/// Split `text` into top-level nodes.
pub fn tokenize(text: &str) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    let mut scanner = Scanner::new(text);
    let mut text_start = 0;
    let mut cursor = 0;

    while cursor < text.len() {
        let rest = &text[cursor..];
        let span_end = if rest.starts_with("{{") {
            scanner.find_macro_end(cursor).map(|(end, malformed)| {
                let source = &text[cursor..end];
                (
                    end,
                    Node::Macro(MacroSpan {
                        source,
                        body: &source[2..source.len() - 2],
                        malformed,
                    }),
                )
            })
        } else if rest.starts_with("[[") {
            scanner
                .find_link_end(cursor)
                .map(|end| (end, Node::Link(parse_link_body(&text[cursor + 2..end - 2]))))
        } else {
            None
        };

        match span_end {
            Some((end, node)) => {
                if text_start < cursor {
                    nodes.push(Node::Text(&text[text_start..cursor]));
                }
                nodes.push(node);
                cursor = end;
                text_start = end;
            }
            None => {
                // Plain character, or an opener without its closer: keep it as text.
                let step = if rest.starts_with("{{") || rest.starts_with("[[") {
                    2
                } else {
                    rest.chars().next().map(char::len_utf8).unwrap_or(1)
                };
                cursor += step;
            }
        }
    }

    if text_start < text.len() {
        nodes.push(Node::Text(&text[text_start..]));
    }
    nodes
}

fn parse_link_body(body: &str) -> Wikilink<'_> {
    let (head, display) = match find_top_level(body, b'|') {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };
    let (target, anchor) = match head.split_once('#') {
        Some((target, anchor)) => (target, Some(anchor)),
        None => (head, None),
    };
    Wikilink { target, anchor, display }
}

/// True when `text` contains something the tokenizer would turn into a node.
pub fn has_markup(text: &str) -> bool {
    text.contains("{{") || text.contains("[[")
}

/// Offset of the first ASCII `sep` outside any nested macro or link.
pub fn find_top_level(text: &str, sep: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut braces = 0usize;
    let mut links = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let pair = &bytes[i..bytes.len().min(i + 2)];
        match pair {
            b"{{" => {
                braces += 1;
                i += 2;
                continue;
            }
            b"}}" if braces > 0 => {
                braces -= 1;
                i += 2;
                continue;
            }
            b"[[" => {
                links += 1;
                i += 2;
                continue;
            }
            b"]]" if links > 0 => {
                links -= 1;
                i += 2;
                continue;
            }
            _ => {}
        }
        if braces == 0 && links == 0 && bytes[i] == sep {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Split on every top-level ASCII `sep`.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(idx) = find_top_level(rest, sep) {
        parts.push(&rest[..idx]);
        rest = &rest[idx + 1..];
    }
    parts.push(rest);
    parts
}
