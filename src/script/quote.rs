// src/script/quote.rs

/// Minimal POSIX shell quoting: plain words pass through, anything else is
/// wrapped in single quotes.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:@%+=,".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_are_untouched() {
        assert_eq!(shell_quote("task0"), "task0");
        assert_eq!(shell_quote("a/b-c_d.txt"), "a/b-c_d.txt");
    }

    #[test]
    fn spaces_and_quotes_are_escaped() {
        assert_eq!(shell_quote("my task"), "'my task'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }
}
