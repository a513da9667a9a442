//! Failure types shared by every decoder.
//!
//! Decoders stop at the first problem and report it through [`DecodeError`]. Each variant
//! belongs to one [`ErrorKind`], which is what batch drivers and tests usually match on.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::level_decoder::LevelStage;
use crate::source::AssetKind;

/// Coarse classification of a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An expected element or attribute is missing, or a tag is wrong.
    Structural,
    /// A value is present but does not parse or falls outside its accepted set.
    Value,
    /// A named asset or trile id could not be resolved.
    Reference,
    /// A file could not be opened, read or parsed as a document.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Structural => "structural",
            ErrorKind::Value => "value",
            ErrorKind::Reference => "reference",
            ErrorKind::Io => "io",
        };
        f.write_str(label)
    }
}

/// Errors produced while decoding asset XML.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A required child element is absent.
    #[error("<{parent}> is missing required element <{element}>")]
    MissingElement {
        /// Tag of the element that was searched.
        parent: String,
        /// Tag that was expected.
        element: &'static str,
    },

    /// An element carries a different tag than the one expected at that position.
    #[error("expected <{expected}>, found <{found}>")]
    UnexpectedElement {
        /// Tag that was expected.
        expected: &'static str,
        /// Tag that was found, empty when nothing was found.
        found: String,
    },

    /// A required attribute is absent.
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// Tag of the element.
        element: String,
        /// Attribute name.
        attribute: &'static str,
    },

    /// A list that must contain at least one entry is empty.
    #[error("<{element}> must contain at least one entry")]
    EmptyList {
        /// Tag of the list element.
        element: &'static str,
    },

    /// Text that should hold a number does not parse.
    #[error("<{element}> '{field}' is not a valid number: '{value}'")]
    InvalidNumber {
        /// Tag of the element.
        element: String,
        /// Attribute name, or `text` for element content.
        field: &'static str,
        /// Offending text.
        value: String,
    },

    /// A boolean attribute is neither `true` nor `false`.
    #[error("<{element}> '{field}' must be true or false, got '{value}'")]
    InvalidBool {
        /// Tag of the element.
        element: String,
        /// Attribute name.
        field: &'static str,
        /// Offending text.
        value: String,
    },

    /// A vertex normal side index outside 0..=5.
    #[error("normal side index {0} is outside 0..=5")]
    SideIndexOutOfRange(i64),

    /// An index list whose length is zero or not a multiple of three.
    #[error("index count {0} is not a positive multiple of 3")]
    IndexCount(usize),

    /// An index that points past the vertex list.
    #[error("index {index} is out of bounds for {vertex_count} vertices")]
    IndexOutOfBounds {
        /// Offending index.
        index: u32,
        /// Number of decoded vertices.
        vertex_count: usize,
    },

    /// A trile orientation outside 0..=3.
    #[error("trile orientation {0} is outside 0..=3")]
    OrientationOutOfRange(i32),

    /// An animated texture descriptor declares a zero nominal atlas size.
    #[error("animated texture {} declares a zero atlas size", path.display())]
    ZeroAtlasDimension {
        /// Descriptor path.
        path: PathBuf,
    },

    /// A referenced asset has no backing file.
    #[error("{kind} '{name}' not found at {}", path.display())]
    MissingAsset {
        /// Kind of asset being resolved.
        kind: AssetKind,
        /// Name as referenced.
        name: String,
        /// Path that was probed.
        path: PathBuf,
    },

    /// A level references a trile id its trile set does not define.
    #[error("trile id {id} is not defined by trile set '{trile_set}'")]
    MissingTrile {
        /// Referenced trile id.
        id: i32,
        /// Name of the resolved trile set.
        trile_set: String,
    },

    /// Reading a file failed.
    #[error("failed to read {}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file is not well-formed XML.
    #[error("malformed XML in {}", path.display())]
    Xml {
        /// File that failed.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: roxmltree::Error,
    },

    /// An image header could not be read.
    #[error("unreadable image {}", path.display())]
    Image {
        /// File that failed.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// A level decode failed at a given stage.
    #[error("level {} failed during {stage}", path.display())]
    Level {
        /// Level file.
        path: PathBuf,
        /// Stage that failed.
        stage: LevelStage,
        /// Cause.
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::MissingElement { .. }
            | DecodeError::UnexpectedElement { .. }
            | DecodeError::MissingAttribute { .. }
            | DecodeError::EmptyList { .. } => ErrorKind::Structural,
            DecodeError::InvalidNumber { .. }
            | DecodeError::InvalidBool { .. }
            | DecodeError::SideIndexOutOfRange(_)
            | DecodeError::IndexCount(_)
            | DecodeError::IndexOutOfBounds { .. }
            | DecodeError::OrientationOutOfRange(_)
            | DecodeError::ZeroAtlasDimension { .. } => ErrorKind::Value,
            DecodeError::MissingAsset { .. } | DecodeError::MissingTrile { .. } => ErrorKind::Reference,
            DecodeError::Io { .. } | DecodeError::Xml { .. } | DecodeError::Image { .. } => ErrorKind::Io,
            DecodeError::Level { source, .. } => source.kind(),
        }
    }

    /// Innermost error, looking through level stage wrappers.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::Level { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DecodeError::Io { path: path.into(), source }
    }
}

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
