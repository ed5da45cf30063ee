//! Server error codes the provisioning steps react to.

use mongodb::error::{Error, ErrorKind, WriteFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerError {
    NamespaceExists,
    IndexOptionsConflict,
    IndexKeySpecsConflict,
    DuplicateKey,
    UserAlreadyExists,
    Other(i32),
}

impl ServerError {
    pub const fn from_code(code: i32) -> Self {
        match code {
            48 => Self::NamespaceExists,
            85 => Self::IndexOptionsConflict,
            86 => Self::IndexKeySpecsConflict,
            11000 => Self::DuplicateKey,
            51003 => Self::UserAlreadyExists,
            code => Self::Other(code),
        }
    }

    /// Classifies the error if the server has answered with a code.
    pub fn of(error: &Error) -> Option<Self> {
        let code = match error.kind.as_ref() {
            ErrorKind::Command(error) => error.code,
            ErrorKind::Write(WriteFailure::WriteError(error)) => error.code,
            ErrorKind::Write(WriteFailure::WriteConcernError(error)) => error.code,
            _ => return None,
        };
        Some(Self::from_code(code))
    }

    pub const fn is_index_conflict(self) -> bool {
        matches!(self, Self::IndexOptionsConflict | Self::IndexKeySpecsConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_code_ok() {
        assert_eq!(ServerError::from_code(48), ServerError::NamespaceExists);
        assert_eq!(ServerError::from_code(11000), ServerError::DuplicateKey);
        assert_eq!(ServerError::from_code(51003), ServerError::UserAlreadyExists);
        assert_eq!(ServerError::from_code(13), ServerError::Other(13));
    }

    #[test]
    fn is_index_conflict_ok() {
        assert!(ServerError::IndexOptionsConflict.is_index_conflict());
        assert!(ServerError::IndexKeySpecsConflict.is_index_conflict());
        assert!(!ServerError::DuplicateKey.is_index_conflict());
    }
}
