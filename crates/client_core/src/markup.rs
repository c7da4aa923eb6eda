//! Text helpers for rendered lines.

const COMBINING_LONG_STROKE: char = '\u{0336}';

/// Overlays every character with a combining stroke.
pub fn strikethrough(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 3);
    for c in text.chars() {
        out.push(c);
        out.push(COMBINING_LONG_STROKE);
    }
    out
}

/// Reduces an HTML message body to display text: tags dropped, line breaks
/// kept, common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find(|c: char| c == '<' || c == '&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        if rest.starts_with('<') {
            let Some(end) = rest.find('>') else {
                out.push_str(rest);
                return out;
            };
            let tag = rest[1..end]
                .trim_start_matches('/')
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            if matches!(tag.as_str(), "br" | "p" | "li") && !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            rest = &rest[end + 1..];
        } else {
            let (decoded, consumed) = decode_entity(rest);
            out.push_str(decoded);
            rest = &rest[consumed..];
        }
    }
    out.push_str(rest);
    out.trim_end_matches('\n').to_string()
}

fn decode_entity(input: &str) -> (&str, usize) {
    const ENTITIES: [(&str, &str); 6] = [
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&nbsp;", " "),
    ];
    ENTITIES
        .iter()
        .find(|(entity, _)| input.starts_with(entity))
        .map(|(entity, text)| (*text, entity.len()))
        .unwrap_or(("&", 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strikethrough_marks_each_char() {
        assert_eq!(strikethrough("ab"), "a\u{0336}b\u{0336}");
        assert_eq!(strikethrough(""), "");
    }

    #[test]
    fn html_tags_are_stripped() {
        assert_eq!(
            html_to_text("<strong>bold</strong> and <em>soft</em>"),
            "bold and soft"
        );
    }

    #[test]
    fn line_breaks_survive() {
        assert_eq!(html_to_text("one<br/>two<br>"), "one\ntwo");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(html_to_text("a &lt;b&gt; &amp; c"), "a <b> & c");
        assert_eq!(html_to_text("fish & chips"), "fish & chips");
    }

    #[test]
    fn unterminated_tag_is_kept_verbatim() {
        assert_eq!(html_to_text("x <y"), "x <y");
    }
}
