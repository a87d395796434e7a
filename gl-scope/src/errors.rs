use crate::driver::{BufferTarget, Handle, ObjectKind, ShaderStage, Slot};
use std::path::PathBuf;
use thiserror::Error;

/// What the driver reported after a call, see [`crate::gl_backend::explode_if_gl_error`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("driver error 0x{0:x}")]
    Code(u32),
    #[error("{0}")]
    Message(String),
}

impl DriverError {
    pub fn new(code: u32) -> Self {
        DriverError::Code(code)
    }

    pub fn with_message(msg: impl Into<String>) -> Self {
        DriverError::Message(msg.into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UploadFailure {
    #[error("no bytes to upload")]
    Empty,
    #[error("the buffer is no longer bound")]
    NotBound,
    #[error("{len} bytes at offset {offset} do not fit the {size} byte store")]
    OutOfRange { offset: usize, len: usize, size: usize },
    #[error(transparent)]
    Driver(#[from] DriverError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("driver refused to allocate a {0:?}")]
    Allocation(ObjectKind),

    #[error("{slot:?} already holds {current}, cannot bind {requested}")]
    StateConflict {
        slot: Slot,
        current: Handle,
        requested: Handle,
    },

    #[error("{slot:?} holds {current}, not {expected}")]
    StateMismatch {
        slot: Slot,
        current: Handle,
        expected: Handle,
    },

    #[error("{handle} is not bound to {slot:?} (currently {current})")]
    NotBound {
        slot: Slot,
        handle: Handle,
        current: Handle,
    },

    #[error("{0:?} was already released")]
    UseAfterRelease(ObjectKind),

    #[error("upload to {target:?} failed: {reason}")]
    Upload {
        target: BufferTarget,
        reason: UploadFailure,
    },

    #[error("{components} components is not a whole number of {arity}-component vertices")]
    MalformedData { components: usize, arity: usize },

    #[error("Error in {stage} \"{}\"\n{log}", .name.as_deref().unwrap_or("untitled"))]
    Compile {
        stage: ShaderStage,
        name: Option<String>,
        log: String,
    },

    #[error("Error in ShaderProgram{}:\n{log}", .name.as_deref().map(|n| format!(":{n}")).unwrap_or_default())]
    Link { name: Option<String>, log: String },

    #[error("cannot link without a {0}")]
    LinkPrecondition(ShaderStage),

    #[error("could not read shader source {path:?}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("program {program} has no active uniform named {name:?}")]
    UnknownUniform { program: Handle, name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
