//! TOC command-line tokenizer.
//!
//! Fields are space-delimited with double-quote grouping. `{` and `}` are
//! accepted as quote aliases, matching observed clients. Quotes are lazy: a
//! quote inside an unquoted field stays literal. Inside a quoted field a
//! backslash escapes the next character.

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command line")]
    Empty,

    #[error("command mismatch: expected {expected}, got {got}")]
    CommandMismatch { expected: String, got: String },

    #[error("command contains fewer arguments than expected")]
    NotEnoughArguments,
}

/// Split a TOC line into tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| *c == ' ').is_some() {}
        let Some(&first) = chars.peek() else { break };

        let mut token = String::new();
        if first == '"' || first == '{' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            token.push(escaped);
                        }
                    }
                    '"' | '}' => break,
                    other => token.push(other),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ' ' {
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

/// Validate the command name and split positional arguments from varargs.
/// Mirrors the contract of the OSCAR-side command handlers: `required`
/// positional arguments, everything after them returned as varargs.
pub fn parse_args<'a>(
    tokens: &'a [String],
    cmd: &str,
    required: usize,
) -> Result<(&'a [String], &'a [String]), ParseError> {
    let Some(first) = tokens.first() else {
        return Err(ParseError::Empty);
    };
    if first != cmd {
        return Err(ParseError::CommandMismatch {
            expected: cmd.to_string(),
            got: first.clone(),
        });
    }
    let rest = &tokens[1..];
    if rest.len() < required {
        return Err(ParseError::NotEnoughArguments);
    }
    Ok((&rest[..required], &rest[required..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<String> {
        tokenize(line)
    }

    #[test]
    fn test_plain_fields() {
        assert_eq!(toks("toc_send_im bob hello"), vec!["toc_send_im", "bob", "hello"]);
    }

    #[test]
    fn test_quoted_fields_group_spaces() {
        assert_eq!(
            toks(r#"toc_send_im "bob smith" "hello there""#),
            vec!["toc_send_im", "bob smith", "hello there"]
        );
    }

    #[test]
    fn test_braces_alias_quotes() {
        assert_eq!(
            toks("toc_set_config {m 1\nb bob}"),
            vec!["toc_set_config", "m 1\nb bob"]
        );
    }

    #[test]
    fn test_backslash_escapes_in_quotes() {
        assert_eq!(
            toks(r#"toc_send_im bob "say \"hi\" \\ back""#),
            vec!["toc_send_im", "bob", r#"say "hi" \ back"#]
        );
    }

    #[test]
    fn test_lazy_quote_inside_bare_field() {
        // a quote mid-token is literal, as with Go's LazyQuotes reader
        assert_eq!(toks(r#"toc_evil bob"s norm"#), vec!["toc_evil", "bob\"s", "norm"]);
    }

    #[test]
    fn test_leading_and_repeated_spaces() {
        assert_eq!(toks("  toc_init_done   "), vec!["toc_init_done"]);
        assert_eq!(toks("a  b"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_args_fixed_and_varargs() {
        let tokens = toks("toc_chat_invite 1 \"come chat\" bob carol");
        let (fixed, varargs) = parse_args(&tokens, "toc_chat_invite", 2).unwrap();
        assert_eq!(fixed, ["1".to_string(), "come chat".to_string()]);
        assert_eq!(varargs, ["bob".to_string(), "carol".to_string()]);
    }

    #[test]
    fn test_parse_args_errors() {
        let tokens = toks("toc_evil bob");
        assert_eq!(
            parse_args(&tokens, "toc_evil", 2),
            Err(ParseError::NotEnoughArguments)
        );
        assert!(matches!(
            parse_args(&tokens, "toc_send_im", 0),
            Err(ParseError::CommandMismatch { .. })
        ));
        assert_eq!(parse_args(&[], "toc_evil", 0), Err(ParseError::Empty));
    }
}
