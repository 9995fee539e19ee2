use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Task has no description")]
    InsufficientInput,

    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    #[error("Worker '{worker}' failed twice in phase '{phase}'")]
    WorkerFailure { worker: String, phase: String },

    #[error("Plan rejected: {0}")]
    PlanInvalid(String),

    #[error("Conflict on axis '{axis}' could not be resolved")]
    ConflictUnresolved { axis: String },

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

pub type Result<T> = std::result::Result<T, Error>;
