/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip a markdown code fence (```cypher, ```json or bare) from a model reply.
pub fn strip_code_blocks(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (language tag) on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) if !rest[..idx].contains(' ') => &rest[idx + 1..],
        _ => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_char_boundary() {
        let text = "Hello 世界";
        let truncated = truncate_to_char_boundary(text, 8);
        assert!(truncated.len() <= 8);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn test_truncate_within_bounds() {
        let text = "Hello";
        assert_eq!(truncate_to_char_boundary(text, 100), "Hello");
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn test_strip_cypher_fence() {
        let reply = "```cypher\nMATCH (c:Company) RETURN c.name\n```";
        assert_eq!(strip_code_blocks(reply), "MATCH (c:Company) RETURN c.name");
    }
}
