use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Duplicate task id: {id}")]
    DuplicateId { id: String },

    #[error("Task {task} references unknown predecessor: {missing}")]
    UnknownPredecessor { task: String, missing: String },

    #[error("Cyclic dependency involving: {}", involved.join(", "))]
    CyclicDependency { involved: Vec<String> },

    #[error("Invalid estimate for task {task}: {reason}")]
    InvalidEstimate { task: String, reason: String },

    #[error("Task table contains no tasks")]
    EmptyProject,

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Non-finite value for task {task} in trial {trial}")]
    NumericOverflow { task: String, trial: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker join error: {0}")]
    TaskJoin(String),
}

impl Error {
    /// Map an error to the process exit code of the CLI surface.
    ///
    /// Input and structural errors exit with 1, runtime errors with 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::DuplicateId { .. }
            | Error::UnknownPredecessor { .. }
            | Error::CyclicDependency { .. }
            | Error::InvalidEstimate { .. }
            | Error::EmptyProject
            | Error::MalformedRow { .. }
            | Error::TomlParse(_)
            | Error::Config(_) => 1,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
