//! Forgiving markup tokenizer for loading fixtures and recorded pages.
//!
//! Tag and attribute names are ASCII `[A-Za-z0-9:_-]` and are lowercased.
//! `script` and `style` bodies are kept verbatim. This is not an HTML5 state
//! machine: there is no error recovery beyond skipping bytes it cannot use.
use super::entities::decode_entities;
use memchr::memchr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Doctype(String),
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag(String),
    Comment(String),
    CData(String),
    Text(String),
}

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";
const CDATA_START: &str = "<![CDATA[";
const CDATA_END: &str = "]]>";

fn starts_with_ignore_ascii_case_at(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

pub(crate) fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

// `<` never appears inside a UTF-8 continuation byte, so scanning bytes for
// it keeps every slice boundary on a char boundary.
fn find_rawtext_close_tag(haystack: &str, close_tag: &[u8]) -> Option<(usize, usize)> {
    let bytes = haystack.as_bytes();
    let n = close_tag.len();
    let mut i = 0;
    while i + n <= bytes.len() {
        i += memchr(b'<', &bytes[i..])?;
        if i + n > bytes.len() {
            return None;
        }
        if starts_with_ignore_ascii_case_at(bytes, i, close_tag) {
            let mut k = i + n;
            while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < bytes.len() && bytes[k] == b'>' {
                return Some((i, k + 1));
            }
        }
        i += 1;
    }
    None
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        if bytes[i] != b'<' {
            let start = i;
            i = memchr(b'<', &bytes[i..]).map_or(len, |rel| i + rel);
            let decoded = decode_entities(&input[start..i]);
            if !decoded.is_empty() {
                out.push(Token::Text(decoded));
            }
            continue;
        }

        let rest = &input[i..];
        if rest.starts_with(COMMENT_START) {
            let body = &rest[COMMENT_START.len()..];
            match body.find(COMMENT_END) {
                Some(end) => {
                    out.push(Token::Comment(body[..end].to_string()));
                    i += COMMENT_START.len() + end + COMMENT_END.len();
                    continue;
                }
                None => {
                    out.push(Token::Comment(body.to_string()));
                    break;
                }
            }
        }
        if rest.starts_with(CDATA_START) {
            let body = &rest[CDATA_START.len()..];
            let end = body.find(CDATA_END).unwrap_or(body.len());
            out.push(Token::CData(body[..end].to_string()));
            i += CDATA_START.len() + (end + CDATA_END.len()).min(body.len());
            continue;
        }
        if starts_with_ignore_ascii_case_at(bytes, i, b"<!doctype") {
            let Some(end) = rest.find('>') else {
                break;
            };
            out.push(Token::Doctype(rest[2..end].trim().to_string()));
            i += end + 1;
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            // Bogus comment: skip to the next '>'.
            i = memchr(b'>', &bytes[i..]).map_or(len, |rel| i + rel + 1);
            continue;
        }

        if i + 1 < len && bytes[i + 1] == b'/' {
            let start = i + 2;
            let mut j = start;
            while j < len && is_name_char(bytes[j]) {
                j += 1;
            }
            let name = input[start..j].to_ascii_lowercase();
            j = memchr(b'>', &bytes[j..]).map_or(len, |rel| j + rel + 1);
            if !name.is_empty() {
                out.push(Token::EndTag(name));
            }
            i = j;
            continue;
        }

        let start = i + 1;
        let mut j = start;
        while j < len && is_name_char(bytes[j]) {
            j += 1;
        }
        if j == start {
            // A lone '<' is text.
            out.push(Token::Text("<".to_string()));
            i += 1;
            continue;
        }
        let name = input[start..j].to_ascii_lowercase();
        let (attributes, mut self_closing, after) = scan_attributes(input, j);
        if is_void_element(&name) {
            self_closing = true;
        }
        out.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });
        i = after;

        if (name == "script" || name == "style") && !self_closing {
            let close_tag: &[u8] = if name == "script" {
                b"</script"
            } else {
                b"</style"
            };
            let body = &input[i..];
            match find_rawtext_close_tag(body, close_tag) {
                Some((rel_start, rel_end)) => {
                    if rel_start > 0 {
                        out.push(Token::Text(body[..rel_start].to_string()));
                    }
                    out.push(Token::EndTag(name));
                    i += rel_end;
                }
                None => {
                    if !body.is_empty() {
                        out.push(Token::Text(body.to_string()));
                    }
                    out.push(Token::EndTag(name));
                    break;
                }
            }
        }
    }
    out
}

/// Scans attributes starting right after a tag name. Returns the attributes,
/// whether the tag was written self-closing, and the offset past its `>`.
fn scan_attributes(input: &str, mut k: usize) -> (Vec<(String, String)>, bool, usize) {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    let skip_whitespace = |k: &mut usize| {
        while *k < len && bytes[*k].is_ascii_whitespace() {
            *k += 1;
        }
    };

    loop {
        skip_whitespace(&mut k);
        if k >= len {
            break;
        }
        if bytes[k] == b'>' {
            k += 1;
            break;
        }
        if bytes[k] == b'/' {
            if k + 1 < len && bytes[k + 1] == b'>' {
                self_closing = true;
                k += 2;
                break;
            }
            k += 1;
            continue;
        }
        let name_start = k;
        while k < len && is_name_char(bytes[k]) {
            k += 1;
        }
        if name_start == k {
            k += 1;
            continue;
        }
        let name = input[name_start..k].to_ascii_lowercase();

        skip_whitespace(&mut k);
        let mut value = String::new();
        if k < len && bytes[k] == b'=' {
            k += 1;
            skip_whitespace(&mut k);
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                k += 1;
                let vstart = k;
                k = memchr(quote, &bytes[k..]).map_or(len, |rel| k + rel);
                value = decode_entities(&input[vstart..k]);
                if k < len {
                    k += 1;
                }
            } else {
                let vstart = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    if bytes[k] == b'/' && k + 1 < len && bytes[k + 1] == b'>' {
                        break;
                    }
                    k += 1;
                }
                value = decode_entities(&input[vstart..k]);
            }
        }
        // First occurrence wins for duplicated attributes.
        if !attributes.iter().any(|(existing, _)| *existing == name) {
            attributes.push((name, value));
        }
    }
    (attributes, self_closing, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_mixed_attribute_syntax() {
        let tokens = tokenize(r#"<input type=checkbox checked value='a &amp; b' data-x="1">"#);
        assert_eq!(
            tokens,
            vec![Token::StartTag {
                name: "input".to_string(),
                attributes: vec![
                    ("type".to_string(), "checkbox".to_string()),
                    ("checked".to_string(), String::new()),
                    ("value".to_string(), "a & b".to_string()),
                    ("data-x".to_string(), "1".to_string()),
                ],
                self_closing: true,
            }]
        );
    }

    #[test]
    fn tokenize_keeps_script_body_verbatim() {
        let tokens = tokenize("<script>if (a < b) { x = '&amp;'; }</ScRiPt>");
        assert_eq!(
            tokens[1],
            Token::Text("if (a < b) { x = '&amp;'; }".to_string())
        );
        assert_eq!(tokens[2], Token::EndTag("script".to_string()));
    }

    #[test]
    fn tokenize_doctype_comment_and_cdata() {
        let tokens = tokenize("<!DOCTYPE html><!-- note --><![CDATA[x<y]]>");
        assert_eq!(
            tokens,
            vec![
                Token::Doctype("DOCTYPE html".to_string()),
                Token::Comment(" note ".to_string()),
                Token::CData("x<y".to_string()),
            ]
        );
    }

    #[test]
    fn tokenize_preserves_utf8_text() {
        let tokens = tokenize("<p>120×32 café</p>");
        assert!(tokens.contains(&Token::Text("120×32 café".to_string())));
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let tokens = tokenize("a < b");
        let text: String = tokens
            .iter()
            .map(|t| match t {
                Token::Text(s) => s.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(text, "a < b");
    }
}
