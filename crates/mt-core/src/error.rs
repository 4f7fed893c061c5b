use std::fmt;

use crate::fillers::FillerError;
use crate::quality::SelectorError;
use crate::scalar::Column;

#[derive(Debug)]
pub enum WriterError {
    /// Filler registry and sink disagree on column names or types.
    SchemaMismatch {
        expected: Vec<Column>,
        found: Vec<Column>,
    },
    /// Filler shape and sink shape differ.
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    InvalidShape(Vec<usize>),
    CursorRank {
        expected: usize,
        found: usize,
    },
    Selector(SelectorError),
    Filler(FillerError),
    Sink(Box<dyn std::error::Error + Send + Sync>),
    /// Write or flush after the writer was closed.
    Closed,
    InvalidConfig(String),
}

impl WriterError {
    pub fn sink<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WriterError::Sink(Box::new(e))
    }
}

fn describe_column_diff(expected: &[Column], found: &[Column]) -> String {
    let mismatch = expected
        .iter()
        .zip(found)
        .enumerate()
        .find(|(_, (e, f))| e != f);
    match mismatch {
        Some((i, (e, f))) => format!(
            "column {i}: fillers declare {}:{}, sink has {}:{}",
            e.name, e.ty, f.name, f.ty
        ),
        None => format!(
            "fillers declare {} columns, sink has {}",
            expected.len(),
            found.len()
        ),
    }
}

impl fmt::Display for WriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterError::SchemaMismatch { expected, found } => {
                write!(f, "schema mismatch: {}", describe_column_diff(expected, found))
            }
            WriterError::ShapeMismatch { expected, found } => {
                write!(f, "shape mismatch: fillers use {expected:?}, sink has {found:?}")
            }
            WriterError::InvalidShape(shape) => {
                write!(f, "invalid output shape {shape:?}: every dimension must be > 0")
            }
            WriterError::CursorRank { expected, found } => {
                write!(f, "slot cursor has rank {found}, output shape has rank {expected}")
            }
            WriterError::Selector(e) => write!(f, "quality selector failed: {e}"),
            WriterError::Filler(e) => write!(f, "filler registration failed: {e}"),
            WriterError::Sink(e) => write!(f, "sink error: {e}"),
            WriterError::Closed => write!(f, "writer already closed"),
            WriterError::InvalidConfig(msg) => write!(f, "invalid writer config: {msg}"),
        }
    }
}

impl std::error::Error for WriterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriterError::Selector(e) => Some(e),
            WriterError::Filler(e) => Some(e),
            WriterError::Sink(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<SelectorError> for WriterError {
    fn from(e: SelectorError) -> Self {
        WriterError::Selector(e)
    }
}

impl From<FillerError> for WriterError {
    fn from(e: FillerError) -> Self {
        WriterError::Filler(e)
    }
}

pub type Result<T> = std::result::Result<T, WriterError>;
