//! Chain-of-thought extraction for providers that inline reasoning into the
//! text body (`<think>…</think>` spans from DeepSeek-style models served via
//! Groq or NVIDIA).

/// Split inline reasoning out of `raw`. Returns `(thinking, content)`;
/// `thinking` is the concatenation of all tagged spans, `content` is the
/// remainder with the spans removed. An unterminated `<think>` swallows the
/// rest of the text into `thinking`.
pub fn split_thinking(raw: &str) -> (String, String) {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    if !raw.contains(OPEN) {
        return (String::new(), raw.trim().to_string());
    }

    let mut thinking = String::new();
    let mut content = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find(OPEN) {
        content.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(end) => {
                thinking.push_str(after_open[..end].trim());
                thinking.push('\n');
                rest = &after_open[end + CLOSE.len()..];
            }
            None => {
                thinking.push_str(after_open.trim());
                rest = "";
                break;
            }
        }
    }
    content.push_str(rest);

    (
        thinking.trim().to_string(),
        content.trim().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let (thinking, content) = split_thinking("hello world");
        assert_eq!(thinking, "");
        assert_eq!(content, "hello world");
    }

    #[test]
    fn single_span_is_extracted() {
        let (thinking, content) = split_thinking("<think>step one</think>the answer");
        assert_eq!(thinking, "step one");
        assert_eq!(content, "the answer");
    }

    #[test]
    fn multiple_spans_aggregate() {
        let (thinking, content) =
            split_thinking("<think>a</think>x<think>b</think>y");
        assert_eq!(thinking, "a\nb");
        assert_eq!(content, "xy");
    }

    #[test]
    fn unterminated_span_goes_to_thinking() {
        let (thinking, content) = split_thinking("before<think>never closed");
        assert_eq!(thinking, "never closed");
        assert_eq!(content, "before");
    }
}
