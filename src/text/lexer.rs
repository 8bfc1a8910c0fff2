use crate::text::ParseError;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    Str,
    Punct,
}

/// A lexical token borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub line: usize,
    pub column: usize,
}

impl Token<'_> {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.len() == 1 && self.text.starts_with(c)
    }
}

// Alternatives are tried in order, so numbers must come before punctuation
// (".5") and whitespace/comments are matched first and dropped.
const TOKEN_RE: &str = r#"(?x)
    \A(?:
        (?P<skip>[\ \t\r\n\f\v]+|\#[^\n]*)
      | (?P<ident>[A-Za-z_][A-Za-z0-9_]*)
      | (?P<number>0[xX][0-9A-Fa-f]+|(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?[fF]?)
      | (?P<string>"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*')
      | (?P<punct>[{}\[\]<>:,;.\-/])
    )"#;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TOKEN_RE).expect("token pattern is valid"));

/// Split `text` into tokens. Also returns the position just past the last
/// character, used to report errors at end of input.
pub fn tokenize(text: &str) -> Result<(Vec<Token<'_>>, (usize, usize)), ParseError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut column = 1;

    while pos < text.len() {
        let rest = &text[pos..];
        let caps = match TOKEN.captures(rest) {
            Some(c) => c,
            None => {
                let msg = if rest.starts_with('"') || rest.starts_with('\'') {
                    "String missing ending quote.".to_string()
                } else {
                    let c = rest.chars().next().unwrap_or_default();
                    format!("Unexpected character {:?}.", c)
                };
                return Err(ParseError::new(line, column, msg));
            }
        };

        let matched = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let kind = if caps.name("skip").is_some() {
            None
        } else if caps.name("ident").is_some() {
            Some(TokenKind::Ident)
        } else if caps.name("number").is_some() {
            Some(number_kind(matched))
        } else if caps.name("string").is_some() {
            Some(TokenKind::Str)
        } else {
            Some(TokenKind::Punct)
        };

        if let Some(kind) = kind {
            tokens.push(Token {
                kind,
                text: matched,
                line,
                column,
            });
        }

        for c in matched.chars() {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        pos += matched.len();
    }

    Ok((tokens, (line, column)))
}

fn number_kind(text: &str) -> TokenKind {
    if text.starts_with("0x") || text.starts_with("0X") {
        return TokenKind::Int;
    }
    if text.contains(['.', 'e', 'E', 'f', 'F']) {
        TokenKind::Float
    } else {
        TokenKind::Int
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<(TokenKind, &str)> {
        tokenize(text)
            .unwrap()
            .0
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn splits_fields_and_values() {
        assert_eq!(
            kinds(r#"node { name: "a" size: -3 f: 1.5e-3 }"#),
            vec![
                (TokenKind::Ident, "node"),
                (TokenKind::Punct, "{"),
                (TokenKind::Ident, "name"),
                (TokenKind::Punct, ":"),
                (TokenKind::Str, r#""a""#),
                (TokenKind::Ident, "size"),
                (TokenKind::Punct, ":"),
                (TokenKind::Punct, "-"),
                (TokenKind::Int, "3"),
                (TokenKind::Ident, "f"),
                (TokenKind::Punct, ":"),
                (TokenKind::Float, "1.5e-3"),
                (TokenKind::Punct, "}"),
            ]
        );
    }

    #[test]
    fn hex_digits_are_not_float_markers() {
        assert_eq!(kinds("0xEF 1f .5"), vec![
            (TokenKind::Int, "0xEF"),
            (TokenKind::Float, "1f"),
            (TokenKind::Float, ".5"),
        ]);
    }

    #[test]
    fn comments_are_skipped_and_positions_tracked() {
        let (tokens, end) = tokenize("# header\n  op: 'Const' # trailing\n").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!((tokens[0].line, tokens[0].column), (2, 3));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 7));
        assert_eq!(end, (3, 1));
    }

    #[test]
    fn escaped_quotes_stay_inside_string() {
        assert_eq!(kinds(r#""a\"b" 'c'"#), vec![
            (TokenKind::Str, r#""a\"b""#),
            (TokenKind::Str, "'c'"),
        ]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("name: \"abc\n").unwrap_err();
        assert_eq!((err.line, err.column), (1, 7));
        assert!(err.message.contains("ending quote"));
    }

    #[test]
    fn stray_character_is_an_error() {
        let err = tokenize("name: @").unwrap_err();
        assert!(err.message.contains("'@'"));
    }
}
