use git2::{ErrorClass, ErrorCode};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Reference spans multiple files: {0}")]
    MultiFileReference(String),

    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    #[error("Local history cannot be fast-forwarded to the remote")]
    NonFastForward,

    #[error("Uncommitted changes would be overwritten: {0}")]
    LocalChanges(String),

    #[error("Push rejected: {0}")]
    PushRejected(String),

    #[error("Missing configuration: {0}")]
    Misconfigured(String),

    #[error("Timed out waiting for the repository lock")]
    LockTimeout,

    #[error("Repository lock already has pending operations")]
    LockContended,

    #[error("Repository worker failed: {0}")]
    Worker(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// How a failed version-control operation is surfaced in the status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Offline,
    Unauthorized,
    Diverged,
    LocalChanges,
    Misconfigured,
    Other,
}

impl Error {
    pub fn failure(&self) -> Failure {
        match self {
            Error::Git(err) => classify_git(err),
            Error::NonFastForward => Failure::Diverged,
            Error::PushRejected(message) => {
                let message = message.to_lowercase();
                if message.contains("non-fast-forward") || message.contains("fetch first") {
                    Failure::Diverged
                } else if is_auth_message(&message) {
                    Failure::Unauthorized
                } else {
                    Failure::Other
                }
            }
            Error::LocalChanges(_) => Failure::LocalChanges,
            Error::Misconfigured(_) => Failure::Misconfigured,
            _ => Failure::Other,
        }
    }

    /// Lock errors make `synchronize()` a silent no-op instead of a failure.
    pub fn is_lock_error(&self) -> bool {
        matches!(self, Error::LockTimeout | Error::LockContended)
    }
}

fn classify_git(err: &git2::Error) -> Failure {
    match err.code() {
        ErrorCode::Auth | ErrorCode::Certificate => return Failure::Unauthorized,
        ErrorCode::NotFastForward => return Failure::Diverged,
        _ => {}
    }

    if is_auth_message(&err.message().to_lowercase()) {
        return Failure::Unauthorized;
    }

    match err.class() {
        ErrorClass::Net
        | ErrorClass::Http
        | ErrorClass::Ssh
        | ErrorClass::Ssl
        | ErrorClass::Os
        | ErrorClass::Callback => Failure::Offline,
        _ => Failure::Other,
    }
}

fn is_auth_message(message: &str) -> bool {
    message.contains("401")
        || message.contains("403")
        || message.contains("authentication")
        || message.contains("unauthorized")
        || message.contains("credentials")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_need_credentials() {
        let err = Error::Git(git2::Error::new(
            ErrorCode::Auth,
            ErrorClass::Http,
            "authentication required",
        ));
        assert_eq!(err.failure(), Failure::Unauthorized);

        let err = Error::Git(git2::Error::new(
            ErrorCode::GenericError,
            ErrorClass::Http,
            "unexpected http status code: 401",
        ));
        assert_eq!(err.failure(), Failure::Unauthorized);
    }

    #[test]
    fn test_network_errors_are_offline() {
        let err = Error::Git(git2::Error::new(
            ErrorCode::GenericError,
            ErrorClass::Net,
            "failed to resolve address",
        ));
        assert_eq!(err.failure(), Failure::Offline);
    }

    #[test]
    fn test_rejections_classify_as_divergence() {
        assert_eq!(Error::NonFastForward.failure(), Failure::Diverged);
        assert_eq!(
            Error::PushRejected("rejected: non-fast-forward".into()).failure(),
            Failure::Diverged
        );
        assert_eq!(
            Error::Misconfigured("author".into()).failure(),
            Failure::Misconfigured
        );
        assert_eq!(
            Error::LocalChanges("1 conflict prevents checkout".into()).failure(),
            Failure::LocalChanges
        );
        assert_eq!(Error::NotFound("x".into()).failure(), Failure::Other);
    }

    #[test]
    fn test_lock_errors() {
        assert!(Error::LockTimeout.is_lock_error());
        assert!(Error::LockContended.is_lock_error());
        assert!(!Error::NonFastForward.is_lock_error());
    }
}
