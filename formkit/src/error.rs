use crate::path::FieldPath;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("malformed field path: {0}")]
    MalformedPath(String),

    #[error("no field at {0}")]
    UnknownField(FieldPath),

    #[error("path {0} does not lead to an editable slot")]
    NotEditable(FieldPath),

    #[error("{edit} edit does not fit the field at {path}")]
    Mismatch { path: FieldPath, edit: &'static str },

    #[error("value {value:?} is out of range for {path}")]
    OutOfRange { path: FieldPath, value: String },

    #[error("{choice:?} is not a choice offered at {path}")]
    InvalidChoice { path: FieldPath, choice: String },
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("failed to prepare temp file: {0}")]
    TempFile(#[source] io::Error),

    #[error("no editor command configured")]
    NoEditor,

    #[error("editor command {command:?} could not be parsed: {reason}")]
    BadCommand { command: String, reason: String },

    #[error("failed to launch editor {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting for editor: {0}")]
    Wait(#[source] io::Error),

    #[error("failed to read edited file: {0}")]
    Read(#[source] io::Error),
}
