/// Decode a small, fixed subset of HTML entities.
///
/// Contract:
/// - Named entities decoded: `&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`, `&nbsp;`.
/// - Numeric entities decoded only when semicolon-terminated: `&#123;` and `&#x1F4A9;`.
/// - Invalid scalar values, unknown names and unterminated references pass through unchanged.
pub(crate) fn decode_entities(s: &str) -> String {
    if memchr::memchr(b'&', s.as_bytes()).is_none() {
        return s.to_string();
    }

    const MAX_REFERENCE_LEN: usize = 10;

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let terminator = candidate
            .char_indices()
            .take(MAX_REFERENCE_LEN)
            .find(|&(_, c)| c == ';')
            .map(|(i, _)| i);
        let decoded = terminator.and_then(|end| decode_reference(&candidate[1..end]));
        match (decoded, terminator) {
            (Some(ch), Some(end)) => {
                out.push(ch);
                rest = &candidate[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(body: &str) -> Option<char> {
    match body {
        "amp" => return Some('&'),
        "lt" => return Some('<'),
        "gt" => return Some('>'),
        "quot" => return Some('"'),
        "apos" => return Some('\''),
        "nbsp" => return Some('\u{a0}'),
        _ => {}
    }
    let numeric = body.strip_prefix('#')?;
    let value = match numeric.strip_prefix(['x', 'X']) {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            u32::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None if !numeric.is_empty() && numeric.bytes().all(|b| b.is_ascii_digit()) => {
            numeric.parse().ok()?
        }
        None => return None,
    };
    char::from_u32(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_and_numeric() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
    }

    #[test]
    fn leaves_malformed_references() {
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
        assert_eq!(decode_entities("&#xZZ;"), "&#xZZ;");
        assert_eq!(decode_entities("&#1114112;"), "&#1114112;");
        assert_eq!(decode_entities("&amp"), "&amp");
    }
}
