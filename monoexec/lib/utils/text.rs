use crate::config::MAX_OUTPUT_CHARS;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Truncates `output` to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(mut output: String, max: usize) -> String {
    if let Some((index, _)) = output.char_indices().nth(max) {
        output.truncate(index);
    }

    output
}

/// Truncates runtime stdout or stderr to [`MAX_OUTPUT_CHARS`].
pub fn truncate_output(output: String) -> String {
    truncate_chars(output, MAX_OUTPUT_CHARS)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello".into(), 10), "hello");
        assert_eq!(truncate_chars("hello".into(), 5), "hello");
        assert_eq!(truncate_chars("hello".into(), 2), "he");
        assert_eq!(truncate_chars("héllo".into(), 2), "hé");
        assert_eq!(truncate_chars(String::new(), 0), "");
    }

    #[test]
    fn test_truncate_output_limit() {
        let output = "x".repeat(MAX_OUTPUT_CHARS + 123);
        assert_eq!(truncate_output(output).chars().count(), MAX_OUTPUT_CHARS);
    }
}
