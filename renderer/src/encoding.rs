/// HTML-encode a rendered value so that markup in untrusted input cannot
/// pass for template-authored text.
pub fn html_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_markup() {
        assert_eq!(html_encode("<script>"), "&lt;script&gt;");
        assert_eq!(html_encode(r#"a & "b" 'c'"#), "a &amp; &quot;b&quot; &#39;c&#39;");
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(html_encode("plain text 123"), "plain text 123");
        assert_eq!(html_encode(""), "");
    }
}
