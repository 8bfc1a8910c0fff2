//! Convert TensorFlow `GraphDef` protocol buffers from the text format to the
//! binary wire format.
//!
//! - `proto`: GraphDef schema types (prost) and their text-format bindings
//! - `text`: schema-agnostic text-format tokenizer, parser and printer
//! - `convert`: file-level pipeline with atomic output writes

pub mod convert;
pub mod error;
pub mod proto;
pub mod text;

pub use convert::{Converter, GraphConverter, OutputFormat};
pub use error::ConvertError;
pub use text::{ParseError, TextFormat, parse_text, serialize_text};
