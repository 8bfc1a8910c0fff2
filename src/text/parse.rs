use crate::text::escape;
use crate::text::lexer::{self, Token, TokenKind};
use crate::text::{
    MapEntry, MapValue, MessageSlot, ParseError, Scalar, TextEnum, TextFormat,
};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

/// Recursive-descent parser over a fully tokenized input.
pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    end: (usize, usize),
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str) -> Result<Self, ParseError> {
        let (tokens, end) = lexer::tokenize(text)?;
        Ok(Self {
            tokens,
            pos: 0,
            end,
        })
    }

    /// Parse the whole input as the fields of one top-level message.
    pub fn parse_message<M: TextFormat>(mut self) -> Result<M, ParseError> {
        let mut msg = M::default();
        self.merge_fields(&mut msg, None)?;
        Ok(msg)
    }

    pub fn error_at(tok: &Token<'_>, message: impl Into<String>) -> ParseError {
        ParseError::new(tok.line, tok.column, message)
    }

    fn error_at_end(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.end.0, self.end.1, message)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(tok) => Self::error_at(
                &tok,
                format!("Expected {}, found \"{}\".", expected, tok.text),
            ),
            None => self.error_at_end(format!("Expected {}, found end of input.", expected)),
        }
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    /// Consume the next token if it has the given kind.
    fn take(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        let tok = self.peek().filter(|t| t.kind == kind)?;
        self.pos += 1;
        Some(tok)
    }

    pub fn try_consume(&mut self, c: char) -> bool {
        match self.peek() {
            Some(tok) if tok.is_punct(c) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    pub fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.try_consume(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("\"{}\"", c)))
        }
    }

    /// Merge fields into `msg` until end of input (`close == None`) or the
    /// closing delimiter.
    fn merge_fields<M: TextFormat>(
        &mut self,
        msg: &mut M,
        close: Option<char>,
    ) -> Result<(), ParseError> {
        let mut seen: HashSet<&'a str> = HashSet::new();

        loop {
            match (self.peek(), close) {
                (None, None) => return Ok(()),
                (None, Some(c)) => {
                    return Err(self.error_at_end(format!(
                        "Expected \"{}\" to close \"{}\", found end of input.",
                        c,
                        M::TYPE_NAME
                    )));
                }
                (Some(tok), Some(c)) if tok.is_punct(c) => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => {}
            }

            if let Some(tok) = self.peek().filter(|t| t.is_punct('[')) {
                return Err(Self::error_at(
                    &tok,
                    "Extension and Any expansion syntax is not supported.",
                ));
            }
            let Some(name) = self.take(TokenKind::Ident) else {
                return Err(self.unexpected("field name"));
            };

            let mut field = Field {
                parser: &mut *self,
                token: name,
                seen: &mut seen,
                message: M::TYPE_NAME,
            };
            if !msg.merge_field(&mut field)? {
                return Err(Self::error_at(
                    &name,
                    format!(
                        "Message type \"{}\" has no field named \"{}\".",
                        M::TYPE_NAME,
                        name.text
                    ),
                ));
            }

            if !self.try_consume(',') {
                self.try_consume(';');
            }
        }
    }

    fn message_body<M: TextFormat>(&mut self) -> Result<M, ParseError> {
        let mut msg = M::default();
        self.merge_body(&mut msg)?;
        Ok(msg)
    }

    /// Merge a `{ ... }` or `< ... >` block into `msg`.
    fn merge_body<M: TextFormat>(&mut self, msg: &mut M) -> Result<(), ParseError> {
        let close = if self.try_consume('{') {
            '}'
        } else if self.try_consume('<') {
            '>'
        } else {
            return Err(self.unexpected("\"{\""));
        };
        self.merge_fields(msg, Some(close))
    }

    /// One or more adjacent quoted literals, concatenated and unescaped.
    pub fn bytes(&mut self) -> Result<Vec<u8>, ParseError> {
        let Some(first) = self.take(TokenKind::Str) else {
            return Err(self.unexpected("string"));
        };
        let mut out = Vec::new();
        let mut tok = Some(first);
        while let Some(t) = tok {
            let body = &t.text[1..t.text.len() - 1];
            out.extend(escape::unescape(body).map_err(|m| Self::error_at(&t, m))?);
            tok = self.take(TokenKind::Str);
        }
        Ok(out)
    }

    pub fn string(&mut self) -> Result<String, ParseError> {
        let start = self.peek();
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|_| match start {
            Some(tok) => Self::error_at(&tok, "String field is not valid UTF-8."),
            None => self.error_at_end("String field is not valid UTF-8."),
        })
    }

    /// A possibly negative integer literal, widened so every proto integer
    /// type can range-check it.
    pub fn integer(&mut self) -> Result<(Token<'a>, i128), ParseError> {
        let negative = self.try_consume('-');
        let Some(tok) = self.take(TokenKind::Int) else {
            return Err(self.unexpected("integer"));
        };
        let magnitude = parse_unsigned(tok.text).ok_or_else(|| {
            Self::error_at(&tok, format!("Couldn't parse integer: {}", tok.text))
        })?;
        let value = i128::from(magnitude);
        Ok((tok, if negative { -value } else { value }))
    }

    /// A float literal normalized into a form `str::parse` accepts.
    pub fn float_literal(&mut self) -> Result<(Token<'a>, String), ParseError> {
        let negative = self.try_consume('-');
        let Some(tok) = self.peek() else {
            return Err(self.unexpected("number"));
        };
        let body = match tok.kind {
            TokenKind::Float => tok.text.trim_end_matches(['f', 'F']).to_string(),
            TokenKind::Int if !tok.text.starts_with("0x") && !tok.text.starts_with("0X") => {
                tok.text.to_string()
            }
            TokenKind::Ident => {
                match tok.text.to_ascii_lowercase().as_str() {
                    "inf" | "inff" | "infinity" | "infinityf" => "inf".to_string(),
                    "nan" | "nanf" => "nan".to_string(),
                    _ => return Err(self.unexpected("number")),
                }
            }
            _ => return Err(self.unexpected("number")),
        };
        self.pos += 1;

        let mut text = String::with_capacity(body.len() + 1);
        if negative {
            text.push('-');
        }
        text.push_str(&body);
        Ok((tok, text))
    }

    pub fn boolean(&mut self) -> Result<bool, ParseError> {
        let value = match self.peek() {
            Some(tok) => match (tok.kind, tok.text) {
                (TokenKind::Ident, "true" | "True" | "t") | (TokenKind::Int, "1") => true,
                (TokenKind::Ident, "false" | "False" | "f") | (TokenKind::Int, "0") => false,
                _ => return Err(self.unexpected("\"true\" or \"false\"")),
            },
            None => return Err(self.unexpected("\"true\" or \"false\"")),
        };
        self.pos += 1;
        Ok(value)
    }

    /// An enum value given by name or by number.
    pub fn enumeration<E: TextEnum>(&mut self) -> Result<i32, ParseError> {
        if let Some(tok) = self.take(TokenKind::Ident) {
            return E::from_name(tok.text).ok_or_else(|| {
                Self::error_at(
                    &tok,
                    format!(
                        "Enum type \"{}\" has no value named {}.",
                        E::TYPE_NAME,
                        tok.text
                    ),
                )
            });
        }
        let (tok, value) = self.integer()?;
        i32::try_from(value).map_err(|_| {
            Self::error_at(
                &tok,
                format!("Enum value {} for \"{}\" is out of range.", value, E::TYPE_NAME),
            )
        })
    }
}

fn parse_unsigned(text: &str) -> Option<u64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}

/// The field currently being parsed, handed to [`TextFormat::merge_field`].
pub struct Field<'p, 'a> {
    parser: &'p mut Parser<'a>,
    token: Token<'a>,
    seen: &'p mut HashSet<&'a str>,
    message: &'static str,
}

impl<'a> Field<'_, 'a> {
    pub fn name(&self) -> &'a str {
        self.token.text
    }

    fn mark_singular(&mut self) -> Result<(), ParseError> {
        if self.seen.insert(self.token.text) {
            Ok(())
        } else {
            Err(Parser::error_at(
                &self.token,
                format!(
                    "Message type \"{}\" should not have multiple \"{}\" fields.",
                    self.message, self.token.text
                ),
            ))
        }
    }

    /// Reject this field if another member of the same oneof is already set.
    pub fn oneof(&self, group: &str, current: Option<&str>) -> Result<(), ParseError> {
        match current {
            Some(other) if other != self.token.text => Err(Parser::error_at(
                &self.token,
                format!(
                    "Field \"{msg}.{name}\" is specified along with field \"{msg}.{other}\", \
                     another member of oneof \"{group}\".",
                    msg = self.message,
                    name = self.token.text,
                ),
            )),
            _ => Ok(()),
        }
    }

    pub fn scalar<T: Scalar>(&mut self) -> Result<T, ParseError> {
        self.mark_singular()?;
        self.parser.expect(':')?;
        T::parse(self.parser)
    }

    pub fn enumeration<E: TextEnum>(&mut self) -> Result<i32, ParseError> {
        self.mark_singular()?;
        self.parser.expect(':')?;
        self.parser.enumeration::<E>()
    }

    /// A singular message field. Giving the field again merges into the
    /// value already parsed, so only scalars count as duplicates.
    pub fn merge_message<M, S>(&mut self, slot: &mut S) -> Result<(), ParseError>
    where
        M: TextFormat,
        S: MessageSlot<M>,
    {
        self.parser.try_consume(':');
        self.parser.merge_body(slot.message_mut())
    }

    pub fn repeated<T: Scalar>(&mut self, out: &mut Vec<T>) -> Result<(), ParseError> {
        self.parser.expect(':')?;
        self.list(out, T::parse)
    }

    pub fn repeated_enumeration<E: TextEnum>(
        &mut self,
        out: &mut Vec<i32>,
    ) -> Result<(), ParseError> {
        self.parser.expect(':')?;
        self.list(out, Parser::enumeration::<E>)
    }

    pub fn repeated_message<M: TextFormat>(&mut self, out: &mut Vec<M>) -> Result<(), ParseError> {
        self.parser.try_consume(':');
        self.list(out, Parser::message_body::<M>)
    }

    /// Map fields are repeated key/value entries; a later key overwrites an
    /// earlier one.
    pub fn map<K, V>(&mut self, out: &mut BTreeMap<K, V>) -> Result<(), ParseError>
    where
        K: Scalar + Ord + Default,
        V: MapValue,
    {
        let mut entries: Vec<MapEntry<K, V>> = Vec::new();
        self.repeated_message(&mut entries)?;
        for entry in entries {
            out.insert(
                entry.key.unwrap_or_default(),
                entry.value.unwrap_or_default(),
            );
        }
        Ok(())
    }

    /// A single value, or the `[a, b, ...]` short form.
    fn list<T>(
        &mut self,
        out: &mut Vec<T>,
        mut item: impl FnMut(&mut Parser<'a>) -> Result<T, ParseError>,
    ) -> Result<(), ParseError> {
        if !self.parser.try_consume('[') {
            out.push(item(&mut *self.parser)?);
            return Ok(());
        }
        if self.parser.try_consume(']') {
            return Ok(());
        }
        loop {
            out.push(item(&mut *self.parser)?);
            if self.parser.try_consume(']') {
                return Ok(());
            }
            self.parser.expect(',')?;
        }
    }
}

impl Scalar for String {
    fn parse(parser: &mut Parser<'_>) -> Result<Self, ParseError> {
        parser.string()
    }

    fn write(&self, out: &mut String) {
        out.push('"');
        out.push_str(&escape::escape(self.as_bytes()));
        out.push('"');
    }
}

impl Scalar for Vec<u8> {
    fn parse(parser: &mut Parser<'_>) -> Result<Self, ParseError> {
        parser.bytes()
    }

    fn write(&self, out: &mut String) {
        out.push('"');
        out.push_str(&escape::escape(self));
        out.push('"');
    }
}

impl Scalar for bool {
    fn parse(parser: &mut Parser<'_>) -> Result<Self, ParseError> {
        parser.boolean()
    }

    fn write(&self, out: &mut String) {
        out.push_str(if *self { "true" } else { "false" });
    }
}

macro_rules! integer_scalar {
    ($($ty:ty),*) => {$(
        impl Scalar for $ty {
            fn parse(parser: &mut Parser<'_>) -> Result<Self, ParseError> {
                let (tok, value) = parser.integer()?;
                <$ty>::try_from(value).map_err(|_| {
                    Parser::error_at(
                        &tok,
                        format!("Integer out of range for {}: {}", stringify!($ty), value),
                    )
                })
            }

            fn write(&self, out: &mut String) {
                let _ = write!(out, "{}", self);
            }
        }
    )*};
}

integer_scalar!(i32, i64, u32, u64);

macro_rules! float_scalar {
    ($($ty:ty),*) => {$(
        impl Scalar for $ty {
            fn parse(parser: &mut Parser<'_>) -> Result<Self, ParseError> {
                let (tok, text) = parser.float_literal()?;
                text.parse::<$ty>().map_err(|_| {
                    Parser::error_at(&tok, format!("Couldn't parse float: {}", text))
                })
            }

            fn write(&self, out: &mut String) {
                if self.is_nan() {
                    out.push_str("nan");
                } else if self.is_infinite() {
                    out.push_str(if *self > 0.0 { "inf" } else { "-inf" });
                } else {
                    // Debug keeps a decimal point and switches to exponent
                    // notation for very large or small magnitudes.
                    let _ = write!(out, "{:?}", self);
                }
            }
        }
    )*};
}

float_scalar!(f32, f64);
