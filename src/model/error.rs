use std::fmt;

/// Status categories visible to RPC callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    NotFound,
    PermissionDenied,
    Unknown,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::NotFound => "NOT_FOUND",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::Unknown => "UNKNOWN",
        }
    }

    /// Numeric gRPC status for transports that speak it.
    pub fn grpc_code(&self) -> i32 {
        match self {
            Code::Unknown => 2,
            Code::NotFound => 5,
            Code::PermissionDenied => 7,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only error shape that crosses the adapter boundary.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Unknown(String),
}

impl StorageError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Code::NotFound => StorageError::NotFound(message),
            Code::PermissionDenied => StorageError::PermissionDenied(message),
            Code::Unknown => StorageError::Unknown(message),
        }
    }

    pub fn code(&self) -> Code {
        match self {
            StorageError::NotFound(_) => Code::NotFound,
            StorageError::PermissionDenied(_) => Code::PermissionDenied,
            StorageError::Unknown(_) => Code::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StorageError::NotFound(message)
            | StorageError::PermissionDenied(message)
            | StorageError::Unknown(message) => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        let cases = vec![
            (Code::NotFound, "NOT_FOUND", 5),
            (Code::PermissionDenied, "PERMISSION_DENIED", 7),
            (Code::Unknown, "UNKNOWN", 2),
        ];

        for (code, name, grpc) in cases {
            let err = StorageError::new(code, "boom");
            assert_eq!(err.code(), code, "failed for case: {}", name);
            assert_eq!(err.message(), "boom", "failed for case: {}", name);
            assert_eq!(code.to_string(), name, "failed for case: {}", name);
            assert_eq!(code.grpc_code(), grpc, "failed for case: {}", name);
        }
    }
}
