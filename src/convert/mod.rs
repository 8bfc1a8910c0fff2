//! Text-to-binary conversion for any message type with a text-format binding.

use crate::error::ConvertError;
use crate::proto::GraphDef;
use crate::text::{self, TextFormat};
use prost::Message;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::Path;
use tempfile::Builder;
use tracing::debug;

/// Encoding used for the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Binary,
    Text,
}

/// Reads, parses and writes messages of schema `M`.
///
/// The schema is a type parameter rather than ambient state, so the same
/// pipeline serves any message that implements both [`TextFormat`] and
/// [`prost::Message`].
pub struct Converter<M> {
    schema: PhantomData<fn() -> M>,
}

pub type GraphConverter = Converter<GraphDef>;

impl<M> Default for Converter<M> {
    fn default() -> Self {
        Self {
            schema: PhantomData,
        }
    }
}

impl<M> Converter<M>
where
    M: TextFormat + Message + Default,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_text(&self, input: &str) -> Result<M, ConvertError> {
        Ok(text::parse_text(input)?)
    }

    pub fn serialize_text(&self, msg: &M) -> String {
        text::serialize_text(msg)
    }

    pub fn read_text(&self, path: &Path) -> Result<M, ConvertError> {
        let text = fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        debug!(path = %path.display(), bytes = text.len(), "read text input");
        self.parse_text(&text)
    }

    /// Write the canonical binary encoding, replacing `path` atomically.
    pub fn write_binary(&self, msg: &M, path: &Path) -> Result<(), ConvertError> {
        write_atomic(path, &msg.encode_to_vec())
    }

    /// Write the canonical text encoding, replacing `path` atomically.
    pub fn write_text(&self, msg: &M, path: &Path) -> Result<(), ConvertError> {
        write_atomic(path, self.serialize_text(msg).as_bytes())
    }

    pub fn read_binary(&self, path: &Path) -> Result<M, ConvertError> {
        let bytes = fs::read(path).map_err(|e| ConvertError::io(path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "read binary input");
        M::decode(bytes.as_slice()).map_err(|source| ConvertError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse `input` completely, then write it to `output`. A parse failure
    /// leaves `output` untouched.
    pub fn convert(
        &self,
        input: &Path,
        output: &Path,
        format: OutputFormat,
    ) -> Result<M, ConvertError> {
        let msg = self.read_text(input)?;
        match format {
            OutputFormat::Binary => self.write_binary(&msg, output)?,
            OutputFormat::Text => self.write_text(&msg, output)?,
        }
        Ok(msg)
    }
}

/// Stage `bytes` in a temporary file next to `path`, then rename it into
/// place. The destination directory must already exist.
///
/// An overwritten file keeps its permissions; a new one gets the usual
/// umask-derived mode rather than tempfile's owner-only default.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let existing = fs::metadata(path).ok().map(|m| m.permissions());

    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if existing.is_none() {
            builder.permissions(fs::Permissions::from_mode(0o666));
        }
    }

    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|e| ConvertError::io(path, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| ConvertError::io(path, e))?;
    if let Some(permissions) = existing {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| ConvertError::io(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| ConvertError::io(path, e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "wrote output");
    Ok(())
}
