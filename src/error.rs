use std::io;

use thiserror::Error;

/// Fatal runtime and configuration errors.
#[derive(Debug, Error)]
pub enum TuiError {
    #[error("no screen registered for the begin state")]
    MissingBegin,
    #[error("unknown state after {from}: {to}")]
    UnknownState { from: String, to: String },
    #[error("screen already defined for state {0}")]
    StateRedefined(String),
    #[error("the end state cannot have a screen")]
    EndStateScreen,
    #[error("failed to construct screen for state {state}")]
    ScreenInit {
        state: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("index out of bounds: {index} (len {len})")]
    InvalidStartIndex { index: usize, len: usize },
    #[error("input closed")]
    InputClosed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Rejected key representations passed to the key encoders.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("empty key representation")]
    Empty,
    #[error("invalid key character: {0:?}")]
    NotPrintable(String),
    #[error("no control code for {0:?}")]
    NoControlCode(String),
}
