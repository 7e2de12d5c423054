use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid entry: {0}")]
    Validation(String),

    #[error("Theme '{0}' is not unlocked yet")]
    NotUnlocked(String),

    #[error("Storage error")]
    Persistence(#[source] BoxError),

    #[error("Invalid rule table: {0}")]
    InvalidRules(String),
}

impl Error {
    pub fn persistence(err: impl Into<BoxError>) -> Self {
        Self::Persistence(err.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::persistence(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
