//! Command line tokenizers for the operator console.
//!
//! Two variants are provided:
//! - [`tokenize`]: the console tokenizer. Double quotes group words, and
//!   backslashes escape spaces and quotes while UNC style paths such as
//!   `\\dc01\c$\windows` pass through untouched.
//! - [`split_quoted`]: plain whitespace splitting where a token that starts
//!   with a double quote runs until the closing quote. Used when binding
//!   declared parameters (file paths in particular).

/// Split an operator command line into arguments.
///
/// Never fails. Malformed input (an unterminated quote, a dangling
/// backslash) yields best-effort tokens that later validation rejects.
pub fn tokenize(line: &str) -> Vec<String> {
    tokenize_spans(line).into_iter().map(|(_, token)| token).collect()
}

/// [`tokenize`], pairing every token with the byte offset in `line` where
/// its first character (or opening quote) sits.
pub fn tokenize_spans(line: &str) -> Vec<(usize, String)> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    // set once the pending token holds a character or was opened by a quote,
    // so an explicit `""` still produces an (empty) argument
    let mut start: Option<usize> = None;
    let mut in_quotes = false;
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);
        let next_next = chars.get(i + 2).map(|&(_, c)| c);

        match c {
            '"' if !in_quotes => {
                in_quotes = true;
                start.get_or_insert(offset);
            }
            '"' => {
                in_quotes = false;
                if next == Some(' ') {
                    tokens.push((start.take().unwrap_or(offset), std::mem::take(&mut current)));
                    // the separating space is consumed with the quote
                    i += 1;
                }
            }
            '\\' => {
                start.get_or_insert(offset);
                match next {
                    Some('\\') if matches!(next_next, Some(' ') | Some('"')) => {
                        // `foo\\ bar` and `"foo 1\\" bar`: escaped backslash
                        current.push('\\');
                        i += 1;
                    }
                    Some('\\') => {
                        // `\\host\share` keeps both backslashes: this one now,
                        // the second one on the next iteration
                        current.push('\\');
                    }
                    Some(' ') => {
                        current.push(' ');
                        i += 1;
                    }
                    Some('"') => {
                        current.push('"');
                        i += 1;
                    }
                    _ => current.push('\\'),
                }
            }
            ' ' if !in_quotes => {
                if let Some(begin) = start.take() {
                    tokens.push((begin, std::mem::take(&mut current)));
                }
            }
            _ => {
                current.push(c);
                start.get_or_insert(offset);
            }
        }

        i += 1;
    }

    if let Some(begin) = start {
        tokens.push((begin, current));
    }

    tokens
}

/// Whitespace splitting with double quoted groups.
///
/// Inside a quoted group a backslash escapes the following character. Outside
/// of quotes backslashes are literal, so Windows paths survive unchanged.
pub fn split_quoted(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let Some(&first) = chars.peek() else {
            break;
        };

        let mut token = String::new();
        if first == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            token.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => token.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }

        tokens.push(token);
    }

    tokens
}

/// Join `tokens[index..]` with single spaces. Empty when `index` is past the end.
pub fn join_at(tokens: &[String], index: usize) -> String {
    tokens.get(index..).map(|rest| rest.join(" ")).unwrap_or_default()
}

/// Join `tokens[index..]`, re-quoting every token after the first that
/// contains a space.
pub fn join_preserving_quotes(tokens: &[String], index: usize) -> String {
    let Some(rest) = tokens.get(index..) else {
        return String::new();
    };

    let mut joined = String::new();
    for (i, token) in rest.iter().enumerate() {
        if i == 0 {
            joined.push_str(token);
        } else if token.contains(' ') {
            joined.push_str(" \"");
            joined.push_str(token);
            joined.push('"');
        } else {
            joined.push(' ');
            joined.push_str(token);
        }
    }
    joined
}

/// The raw line from the start of its `index`th token, verbatim.
///
/// Token boundaries are those of [`tokenize`]; the tail itself bypasses
/// quote handling so that embedded quotes reach the remote shell intact.
/// Empty when the line has no such token.
pub fn raw_tail(line: &str, index: usize) -> String {
    tokenize_spans(line)
        .get(index)
        .map(|&(offset, _)| line[offset..].to_string())
        .unwrap_or_default()
}

/// True when `s` is non-empty and made only of ASCII digits.
pub fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_words_round_trip() {
        let line = "proc create normal notepad.exe";
        let tokens = tokenize(line);
        assert_eq!(tokens.join(" "), line);
    }

    #[test]
    fn test_empty_line() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("    ").is_empty());
    }

    #[test]
    fn test_consecutive_spaces_dropped() {
        assert_eq!(tokenize("ls   C:\\temp   /s"), strings(&["ls", "C:\\temp", "/s"]));
    }

    #[test]
    fn test_quoted_group() {
        assert_eq!(
            tokenize("foo \"bar baz\" qux"),
            strings(&["foo", "bar baz", "qux"])
        );
    }

    #[test]
    fn test_quote_glues_to_suffix() {
        assert_eq!(tokenize("\"quoted\"suffix next"), strings(&["quotedsuffix", "next"]));
    }

    #[test]
    fn test_unc_path_untouched() {
        assert_eq!(
            tokenize("\\\\dc01\\c$\\windows"),
            strings(&["\\\\dc01\\c$\\windows"])
        );
    }

    #[test]
    fn test_escaped_trailing_backslash_in_quotes() {
        assert_eq!(tokenize("\"foo 1\\\\\" bar"), strings(&["foo 1\\", "bar"]));
    }

    #[test]
    fn test_escaped_backslash_before_space() {
        assert_eq!(tokenize("foo\\\\ bar"), strings(&["foo\\", "bar"]));
    }

    #[test]
    fn test_escaped_space_and_quote() {
        assert_eq!(tokenize("cd Program\\ Files"), strings(&["cd", "Program Files"]));
        assert_eq!(tokenize("say \\\"hi\\\""), strings(&["say", "\"hi\""]));
    }

    #[test]
    fn test_lone_backslash_is_literal() {
        assert_eq!(tokenize("C:\\Windows\\Temp"), strings(&["C:\\Windows\\Temp"]));
        assert_eq!(tokenize("trailing\\"), strings(&["trailing\\"]));
    }

    #[test]
    fn test_unterminated_quote_recovers() {
        assert_eq!(tokenize("cat \"some file"), strings(&["cat", "some file"]));
    }

    #[test]
    fn test_explicit_empty_argument() {
        assert_eq!(tokenize("a \"\" b"), strings(&["a", "", "b"]));
    }

    #[test]
    fn test_split_quoted() {
        assert_eq!(
            split_quoted("upload \"C:\\My Files\\a.txt\"  C:\\temp"),
            strings(&["upload", "C:\\My Files\\a.txt", "C:\\temp"])
        );
        assert_eq!(split_quoted("x \"say \\\"hi\\\"\""), strings(&["x", "say \"hi\""]));
        assert!(split_quoted("  ").is_empty());
    }

    #[test]
    fn test_join_helpers() {
        let tokens = strings(&["a", "b c", "d"]);
        assert_eq!(join_at(&tokens, 1), "b c d");
        assert_eq!(join_at(&tokens, 5), "");
        assert_eq!(join_preserving_quotes(&tokens, 0), "a \"b c\" d");
        assert_eq!(join_preserving_quotes(&tokens, 1), "b c d");
    }

    #[test]
    fn test_raw_tail_keeps_quotes() {
        assert_eq!(
            raw_tail("shell echo \"a  b\"", 1),
            "echo \"a  b\""
        );
        assert_eq!(raw_tail("shell", 1), "");
    }

    #[test]
    fn test_raw_tail_follows_token_boundaries() {
        assert_eq!(raw_tail("  shell whoami", 1), "whoami");
        assert_eq!(raw_tail("inline-execute  /tmp/a.o arg1", 2), "arg1");
        assert_eq!(raw_tail("inline-execute \"C:\\my files\\a.o\" arg1", 2), "arg1");
        assert_eq!(raw_tail("x \"a b\"c d", 1), "\"a b\"c d");
    }

    #[test]
    fn test_token_spans() {
        assert_eq!(
            tokenize_spans(" ab  \"c d\" e"),
            vec![(1, "ab".to_string()), (5, "c d".to_string()), (11, "e".to_string())]
        );
    }

    #[test]
    fn test_is_number() {
        assert!(is_number("1234"));
        assert!(!is_number(""));
        assert!(!is_number("-1"));
        assert!(!is_number("12a"));
    }
}
