use thiserror::Error;

/// Failure of a single generation call. Both variants are surfaced to the user
/// as a notification by the client that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Gemini API key is missing. Save it in Settings first.")]
    MissingCredential,
    #[error("{message}")]
    RequestFailed {
        status: Option<u16>,
        message: String,
    },
}

impl GenerationError {
    pub fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::MissingCredential => None,
            Self::RequestFailed { status, .. } => *status,
        }
    }

    pub fn is_missing_credential(&self) -> bool {
        matches!(self, Self::MissingCredential)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("draft generator was disposed before the response arrived")]
    Disposed,
}

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("Keyring entry error: {0}")]
    Entry(#[source] keyring::Error),
    #[error("Unable to save API key: {0}")]
    Write(#[source] keyring::Error),
    #[error("Unable to remove API key: {0}")]
    Delete(#[source] keyring::Error),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unable to prepare settings directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid value {value:?} for setting {key}")]
    InvalidValue { key: String, value: String },
    #[error("settings store lock poisoned")]
    Poisoned,
}
