use thiserror::Error;

/// Errors that can occur during plan operations.
#[derive(Debug, Error)]
pub enum PlanError {
    /// No plan file with the given name exists.
    #[error("plan not found: {name}")]
    NotFound { name: String },

    /// No step with the given id exists in the plan.
    #[error("step not found in plan {plan}: {step}")]
    StepNotFound { plan: String, step: String },

    /// A step with the given id already exists in the plan.
    #[error("duplicate step id in plan {plan}: {step}")]
    DuplicateStep { plan: String, step: String },

    /// A plan with the given name already exists.
    #[error("plan already exists: {name}")]
    AlreadyExists { name: String },

    /// The plan name is unusable as a file name.
    #[error("invalid plan name: {name} (allowed: letters, digits, '.', '_', '-')")]
    InvalidName { name: String },

    /// A plan file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A plan file holds malformed JSON.
    #[error("plan decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlanError>;
