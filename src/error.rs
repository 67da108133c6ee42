use std::fmt;
use std::io;

use thiserror::Error;

use crate::Dialog::layout::{DialogId, Pid};

/// Which fixed-capacity table ran out of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Dialogs,
    Messages,
    Participants,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Dialogs => f.write_str("dialog table"),
            Resource::Messages => f.write_str("message table"),
            Resource::Participants => f.write_str("participant table"),
        }
    }
}

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Dialog(DialogId),
    Participant { dialog_id: DialogId, pid: Pid },
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Dialog(id) => write!(f, "dialog {id}"),
            Lookup::Participant { dialog_id, pid } => {
                write!(f, "process {pid} in dialog {dialog_id}")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum DialogError {
    #[error("{0} is full")]
    ResourceExhausted(Resource),

    #[error("{0} not found")]
    NotFound(Lookup),

    #[error("failed to attach shared region `{name}`")]
    AttachFailure {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("shared region has been destroyed")]
    RegionDestroyed,
}

impl DialogError {
    pub(crate) fn attach(name: impl Into<String>, source: io::Error) -> Self {
        DialogError::AttachFailure {
            name: name.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DialogError>;
