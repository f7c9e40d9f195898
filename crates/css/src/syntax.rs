// A single CSS property: "color: red !important"
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

impl Declaration {
    pub fn new(name: impl Into<String>, value: impl Into<String>, important: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            important,
        }
    }

    /// The priority keyword, as exposed by a style declaration object.
    pub fn priority(&self) -> Option<&'static str> {
        self.important.then_some("important")
    }
}

/// Splits `input` on `separator` bytes that sit outside quotes and brackets,
/// so `url(data:a;b)` or `"a;b"` stay whole.
fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, c) if c == separator && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

// input: "color: red; font-size: 12px !important;"
// output: [Declaration { color, red, false }, Declaration { font-size, 12px, true }]
pub fn parse_declarations(input: &str) -> Vec<Declaration> {
    let mut out: Vec<Declaration> = Vec::new();
    for pair in split_top_level(input, ';') {
        let Some((n, v)) = pair.split_once(':') else {
            continue;
        };
        let name = n.trim();
        if name.is_empty() {
            continue;
        }
        // Custom properties keep their case.
        let name = if name.starts_with("--") {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        };
        let mut value = v.trim();
        let mut important = false;
        if let Some(bang) = value.rfind('!') {
            if value[bang + 1..].trim().eq_ignore_ascii_case("important") {
                important = true;
                value = value[..bang].trim_end();
            }
        }
        let declaration = Declaration::new(name, value, important);
        // Later declarations of the same property win.
        match out.iter_mut().find(|d| d.name == declaration.name) {
            Some(existing) => *existing = declaration,
            None => out.push(declaration),
        }
    }
    out
}

// input: [Declaration { color, red, false }]
// output: "color: red;"
pub fn serialize_declarations(declarations: &[Declaration]) -> String {
    let mut out = String::new();
    for (i, d) in declarations.iter().enumerate() {
        if i != 0 {
            out.push(' ');
        }
        out.push_str(&d.name);
        out.push_str(": ");
        out.push_str(&d.value);
        if d.important {
            out.push_str(" !important");
        }
        out.push(';');
    }
    out
}

// input: "div.a { color: red; }"
// output: Some(("div.a", "color: red;"))
pub fn split_rule(rule: &str) -> Option<(&str, &str)> {
    let (selector, rest) = rule.split_once('{')?;
    let body = rest.trim_end().strip_suffix('}')?;
    Some((selector.trim(), body.trim()))
}
