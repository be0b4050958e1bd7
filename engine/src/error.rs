use thiserror::Error;

/// Everything that can stop a run. Strip computation itself never fails; every
/// variant originates at a boundary.
#[derive(Debug, Error)]
pub enum GolError {
    /// Rejected before the simulation starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A collaborator thread hung up or could not be started.
    #[error("{collaborator} is unavailable")]
    CollaboratorUnavailable { collaborator: &'static str },

    /// Image data that does not describe the expected board.
    #[error("malformed input {filename}: {reason}")]
    MalformedInput { filename: String, reason: String },

    /// The image store failed to read or persist a file.
    #[error("image store failed on {filename}: {source}")]
    Storage {
        filename: String,
        source: std::io::Error,
    },
}

impl GolError {
    pub fn unavailable(collaborator: &'static str) -> Self {
        GolError::CollaboratorUnavailable { collaborator }
    }
}
