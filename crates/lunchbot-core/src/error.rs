use thiserror::Error;

#[derive(Debug, Error)]
pub enum LunchError {
    /// The organization's cutoff (lunch time minus the shipping offset) has
    /// already passed. A domain signal, not a failure.
    #[error("lunch time has already passed")]
    DeadlineExceeded,

    #[error("user not found: {0}")]
    UserNotFound(i64),

    #[error("user already registered: {0}")]
    UserExists(i64),

    #[error("user {0} does not belong to an organization")]
    NotInOrganization(i64),

    #[error("organization not found: {0}")]
    OrganizationNotFound(uuid::Uuid),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LunchError>;

