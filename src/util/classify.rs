use crate::{
    adapters::ProviderError,
    model::error::{Code, StorageError},
};

/// Maps a provider failure onto an RPC status category.
///
/// A missing object is checked before an authorization failure so that an
/// ambiguous provider answer is never reported as a permission problem.
pub fn classify(err: &ProviderError) -> Code {
    match err {
        ProviderError::ObjectNotExist => Code::NotFound,
        ProviderError::Status { code: 403, .. } => Code::PermissionDenied,
        ProviderError::Status { .. } | ProviderError::Transport(_) => Code::Unknown,
    }
}

/// Builds the caller-facing error for a failed `action` on `key`. Only
/// unknown failures carry the provider text.
pub fn to_storage_error(err: &ProviderError, action: &str, key: &str) -> StorageError {
    let code = classify(err);
    let message = match code {
        Code::NotFound => format!("object not found: {}", key),
        Code::PermissionDenied => format!("permission denied {}", action),
        Code::Unknown => format!("error {}: {}", action, err),
    };
    StorageError::new(code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ProviderError {
        ProviderError::Status {
            code,
            message: format!("http {}", code),
        }
    }

    #[test]
    fn test_classify() {
        let cases = vec![
            (ProviderError::ObjectNotExist, Code::NotFound),
            (status(403), Code::PermissionDenied),
            (status(404), Code::Unknown),
            (status(401), Code::Unknown),
            (status(500), Code::Unknown),
            (ProviderError::Transport("reset".to_string()), Code::Unknown),
        ];

        for (err, expected) in cases {
            assert_eq!(classify(&err), expected, "failed for case: {}", err);
        }
    }

    #[test]
    fn test_to_storage_error() {
        let cases = vec![
            (
                ProviderError::ObjectNotExist,
                StorageError::NotFound("object not found: a/b.txt".to_string()),
            ),
            (
                status(403),
                StorageError::PermissionDenied("permission denied reading object".to_string()),
            ),
            (
                status(503),
                StorageError::Unknown("error reading object: status 503: http 503".to_string()),
            ),
        ];

        for (err, expected) in cases {
            let result = to_storage_error(&err, "reading object", "a/b.txt");
            assert_eq!(result, expected, "failed for case: {}", err);
        }
    }
}
