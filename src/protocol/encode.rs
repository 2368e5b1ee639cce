//! Command line encoding: `verb "arg1" "arg2"`.

/// Quote one argument, escaping `"` and `\` with a backslash.
pub fn quote_arg(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Build the wire line for one command (without the line terminator).
pub fn encode_command<S: AsRef<str>>(verb: &str, args: &[S]) -> String {
    let mut line = String::from(verb);
    for arg in args {
        line.push(' ');
        line.push_str(&quote_arg(arg.as_ref()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_verb_is_not_quoted() {
        assert_eq!(encode_command::<&str>("status", &[]), "status");
    }

    #[test]
    fn test_each_argument_is_quoted() {
        assert_eq!(
            encode_command("find", &["artist", "Nick Cave"]),
            r#"find "artist" "Nick Cave""#
        );
    }

    #[test]
    fn test_embedded_quotes_are_escaped() {
        assert_eq!(quote_arg(r#"a"b"#), r#""a\"b""#);
        assert_eq!(
            encode_command("sendmessage", &["chat", r#"say "hi""#]),
            r#"sendmessage "chat" "say \"hi\"""#
        );
    }

    #[test]
    fn test_backslashes_are_escaped() {
        assert_eq!(quote_arg(r"C:\music"), r#""C:\\music""#);
    }
}
