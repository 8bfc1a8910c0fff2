//! Protocol-buffer text format.
//!
//! The layer is schema-agnostic: a message type opts in by implementing
//! [`TextFormat`] (the GraphDef types get generated impls from `build.rs`),
//! which routes each field name to the matching [`Field`]
//! helper when parsing and to the matching [`Printer`] helper when printing.

pub mod escape;
pub mod lexer;
pub mod parse;
pub mod print;

pub use parse::{Field, Parser};
pub use print::Printer;

use thiserror::Error;

/// Text input that does not match the grammar or the message schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column} : {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// A message type that can be read from and written to the text format.
pub trait TextFormat: Default {
    /// Fully qualified proto name, used in error messages.
    const TYPE_NAME: &'static str;

    /// Parse the value of the field named `field.name()` into `self`.
    ///
    /// Returns `Ok(false)` when the message has no such field.
    fn merge_field(&mut self, field: &mut Field<'_, '_>) -> Result<bool, ParseError>;

    /// Print every non-default field in field number order.
    fn print_fields(&self, out: &mut Printer);
}

/// A proto enum addressed by value name in the text format.
pub trait TextEnum {
    const TYPE_NAME: &'static str;

    fn from_name(name: &str) -> Option<i32>;

    fn name(value: i32) -> Option<&'static str>;
}

/// A singular scalar field value (numbers, bools, strings, bytes).
pub trait Scalar: Sized {
    fn parse(parser: &mut Parser<'_>) -> Result<Self, ParseError>;

    fn write(&self, out: &mut String);
}

/// A type usable as the value of a map field.
pub trait MapValue: Default {
    fn merge_value(field: &mut Field<'_, '_>, slot: &mut Option<Self>) -> Result<(), ParseError>;

    fn print_value(&self, out: &mut Printer);
}

macro_rules! scalar_map_value {
    ($($ty:ty),*) => {$(
        impl MapValue for $ty {
            fn merge_value(
                field: &mut Field<'_, '_>,
                slot: &mut Option<Self>,
            ) -> Result<(), ParseError> {
                *slot = Some(field.scalar()?);
                Ok(())
            }

            fn print_value(&self, out: &mut Printer) {
                out.field("value", self);
            }
        }
    )*};
}

scalar_map_value!(String, Vec<u8>, bool, i32, i64, u32, u64, f32, f64);

/// Storage for a singular message field. prost boxes fields of recursive
/// messages, so a slot is either the message itself or a `Box` of it.
pub trait MessageSlot<M> {
    fn message_mut(&mut self) -> &mut M;
}

impl<M: TextFormat> MessageSlot<M> for M {
    fn message_mut(&mut self) -> &mut M {
        self
    }
}

impl<M: TextFormat> MessageSlot<M> for Box<M> {
    fn message_mut(&mut self) -> &mut M {
        self
    }
}

/// One `{ key: ... value: ... }` entry of a map field.
#[derive(Debug, Default)]
pub(crate) struct MapEntry<K, V> {
    pub key: Option<K>,
    pub value: Option<V>,
}

impl<K, V> TextFormat for MapEntry<K, V>
where
    K: Scalar + Default,
    V: MapValue,
{
    const TYPE_NAME: &'static str = "MapEntry";

    fn merge_field(&mut self, field: &mut Field<'_, '_>) -> Result<bool, ParseError> {
        match field.name() {
            "key" => self.key = Some(field.scalar()?),
            "value" => V::merge_value(field, &mut self.value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn print_fields(&self, out: &mut Printer) {
        if let Some(key) = &self.key {
            out.field("key", key);
        }
        if let Some(value) = &self.value {
            value.print_value(out);
        }
    }
}

/// Parse a complete text-format message.
pub fn parse_text<M: TextFormat>(text: &str) -> Result<M, ParseError> {
    Parser::new(text)?.parse_message()
}

/// Render a message in canonical text format.
pub fn serialize_text<M: TextFormat>(msg: &M) -> String {
    let mut printer = Printer::new();
    msg.print_fields(&mut printer);
    printer.finish()
}
