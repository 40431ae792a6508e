//! Pure text helpers shared by formulas, fallback tables and defaults.

pub fn italic(text: &str) -> String {
    format!("<i>{text}</i>")
}

pub fn strong(text: &str) -> String {
    format!("<b>{text}</b>")
}

pub fn superscript(text: &str) -> String {
    format!("<sup>{text}</sup>")
}

pub fn subscript(text: &str) -> String {
    format!("<sub>{text}</sub>")
}

pub fn small(text: &str) -> String {
    format!("<small>{text}</small>")
}

pub fn small_caps(text: &str) -> String {
    format!("<span style=\"font-variant:small-caps\">{text}</span>")
}

pub fn underline(text: &str) -> String {
    format!("<u>{text}</u>")
}

pub fn strike(text: &str) -> String {
    format!("<s>{text}</s>")
}

/// Italic text between parentheses, the usual rendering of a usage label.
pub fn term(text: &str) -> String {
    italic(&format!("({text})"))
}

pub fn parenthesis(text: &str, open: &str, close: &str) -> String {
    format!("{open}{text}{close}")
}

pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn lower(text: &str) -> String {
    text.to_lowercase()
}

/// A colour swatch, or `text` drawn in that colour.
pub fn color(code: &str, text: Option<&str>) -> String {
    let code = if code.starts_with('#') || !code.chars().all(|c| c.is_ascii_hexdigit()) {
        code.to_string()
    } else {
        format!("#{code}")
    };
    format!(
        "<span style=\"color:{code}\">{}</span>",
        text.filter(|t| !t.is_empty()).unwrap_or("■")
    )
}

pub fn ruby(base: &str, gloss: &str) -> String {
    format!("<ruby>{base}<rp>(</rp><rt>{gloss}</rt><rp>)</rp></ruby>")
}

/// Join the non-empty items of `items` with `sep`.
pub fn join<S: AsRef<str>>(items: &[S], sep: &str) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

const ROMAN: [(u32, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

/// Roman numeral for 1..=3999.
pub fn roman(number: u32) -> Option<String> {
    if number == 0 || number > 3999 {
        return None;
    }
    let mut n = number;
    let mut out = String::new();
    for (value, digits) in ROMAN {
        while n >= value {
            out.push_str(digits);
            n -= value;
        }
    }
    Some(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Arithmetic
// ─────────────────────────────────────────────────────────────────────────────
//
// expr   ::= term (("+" | "-") term)*
// term   ::= power (("*" | "/" | "mod") power)*
// power  ::= unary ("^" power)?
// unary  ::= "-" unary | "+" unary | atom
// atom   ::= number | "(" expr ")"
//
// Nesting (parentheses, sign runs, exponent chains) past `MAX_NESTING` is a
// syntax error.

const MAX_NESTING: usize = 100;

struct Arith<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Arith<'a> {
    fn nested(&mut self, rule: impl FnOnce(&mut Self) -> Option<f64>) -> Option<f64> {
        if self.depth >= MAX_NESTING {
            return None;
        }
        self.depth += 1;
        let value = rule(self);
        self.depth -= 1;
        value
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(token.as_bytes()) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        loop {
            if self.eat("+") {
                value += self.term()?;
            } else if self.eat("-") {
                value -= self.term()?;
            } else {
                return Some(value);
            }
        }
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.power()?;
        loop {
            if self.eat("*") {
                value *= self.power()?;
            } else if self.eat("/") {
                let rhs = self.power()?;
                if rhs == 0.0 {
                    return None;
                }
                value /= rhs;
            } else if self.eat("mod") {
                let rhs = self.power()?.trunc();
                if rhs == 0.0 {
                    return None;
                }
                value = value.trunc() % rhs;
            } else {
                return Some(value);
            }
        }
    }

    fn power(&mut self) -> Option<f64> {
        let base = self.unary()?;
        if self.eat("^") {
            let exponent = self.nested(Self::power)?;
            return Some(base.powf(exponent));
        }
        Some(base)
    }

    fn unary(&mut self) -> Option<f64> {
        if self.eat("-") {
            return self.nested(Self::unary).map(|v| -v);
        }
        if self.eat("+") {
            return self.nested(Self::unary);
        }
        self.atom()
    }

    fn atom(&mut self) -> Option<f64> {
        if self.eat("(") {
            let value = self.nested(Self::expr)?;
            return self.eat(")").then_some(value);
        }
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_digit() || self.src[self.pos] == b'.')
        {
            self.pos += 1;
        }
        std::str::from_utf8(&self.src[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }
}

/// Evaluate an arithmetic expression; `None` on syntax errors or division by zero.
pub fn arithmetic(source: &str) -> Option<f64> {
    let mut parser = Arith {
        src: source.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    (parser.pos == parser.src.len() && value.is_finite()).then_some(value)
}

/// Whole numbers print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn wrappers() {
        assert_eq!(italic("x"), "<i>x</i>");
        assert_eq!(strong("x"), "<b>x</b>");
        assert_eq!(term("historia"), "<i>(historia)</i>");
        assert_eq!(parenthesis("X", "（", "）"), "（X）");
    }

    #[test]
    fn capitalize_handles_multibyte() {
        assert_eq!(capitalize("émile"), "Émile");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn color_adds_hash_to_hex_codes() {
        assert_eq!(color("80FF80", None), "<span style=\"color:#80FF80\">■</span>");
        assert_eq!(color("red", Some("un texte")), "<span style=\"color:red\">un texte</span>");
    }

    #[test]
    fn join_skips_empty() {
        assert_eq!(join(&["a", "", "b"], "、"), "a、b");
    }

    #[rstest]
    #[case(1, "I")]
    #[case(4, "IV")]
    #[case(15, "XV")]
    #[case(1990, "MCMXC")]
    #[case(3999, "MMMCMXCIX")]
    fn roman_numerals(#[case] n: u32, #[case] expected: &str) {
        assert_eq!(roman(n).as_deref(), Some(expected));
    }

    #[test]
    fn roman_out_of_range() {
        assert_eq!(roman(0), None);
        assert_eq!(roman(4000), None);
    }

    #[rstest]
    #[case("2 ^ 30", "1073741824")]
    #[case("1 + 2 * 3", "7")]
    #[case("(1 + 2) * 3", "9")]
    #[case("-3 + 5", "2")]
    #[case("7 / 2", "3.5")]
    #[case("7 mod 3", "1")]
    #[case("2 ^ 3 ^ 2", "512")]
    fn arithmetic_cases(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(arithmetic(source).map(format_number).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("1 / 0")]
    #[case("1 +")]
    #[case("(1")]
    #[case("abc")]
    fn arithmetic_errors(#[case] source: &str) {
        assert_eq!(arithmetic(source), None);
    }

    #[test]
    fn arithmetic_nesting_is_bounded() {
        assert_eq!(arithmetic(&format!("{}1{}", "(".repeat(50), ")".repeat(50))), Some(1.0));
        assert_eq!(arithmetic(&format!("{}1", "-".repeat(50))), Some(1.0));
        assert_eq!(arithmetic(&format!("{}1", "-".repeat(200_000))), None);
        assert_eq!(arithmetic(&format!("{}1", "+".repeat(200_000))), None);
        assert_eq!(arithmetic(&format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000))), None);
        assert_eq!(arithmetic(&"1^".repeat(200_000)), None);
    }
}
