use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimeForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Attempt #{attempt} found no feasible timetable ({hard_violations} hard violations left)")]
    InfeasibleAttempt { attempt: usize, hard_violations: u32 },

    #[error("No feasible schedule found after {attempts} attempts")]
    NoFeasibleSchedule { attempts: usize },

    #[error("Search cancelled before any feasible schedule was found")]
    Cancelled,

    #[error("Thread Pool Error: {0}")]
    ThreadPool(String),

    #[error("State Error: {0}")]
    State(String),
}

impl TimeForgeError {
    pub fn config(msg: impl Into<String>) -> Self {
        TimeForgeError::Config(msg.into())
    }
}

pub type TfResult<T> = Result<T, TimeForgeError>;
