use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("disk_limit_percent must be within 1..=100, got {0}")]
    InvalidDiskLimit(u8),

    #[error("Timeout must be positive: {field} = 0")]
    ZeroTimeout { field: String },

    #[error("User agent must not be empty")]
    EmptyUserAgent,

    #[error("Notes file name must be a plain file name: '{0}'")]
    InvalidNotesFile(String),

    #[error("Excluded extension must be non-empty and given without a dot: '{0}'")]
    InvalidExcludedExtension(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_worker(config)?;
    validate_timeouts(config)?;
    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    let worker = &config.worker;

    if worker.disk_limit_percent == 0 || worker.disk_limit_percent > 100 {
        return Err(ValidationError::InvalidDiskLimit(worker.disk_limit_percent));
    }

    let notes = &worker.notes_file;
    if notes.is_empty() || notes.contains(['/', '\\']) || notes == "." || notes == ".." {
        return Err(ValidationError::InvalidNotesFile(notes.clone()));
    }

    for ext in &worker.excluded_extensions {
        if ext.is_empty() || ext.contains('.') {
            return Err(ValidationError::InvalidExcludedExtension(ext.clone()));
        }
    }

    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    if config.http.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    let timeouts = [
        ("http.connect_timeout_secs", config.http.connect_timeout_secs),
        ("http.request_timeout_secs", config.http.request_timeout_secs),
        ("callback.timeout_secs", config.callback.timeout_secs),
    ];

    for (field, value) in timeouts {
        if value == 0 {
            return Err(ValidationError::ZeroTimeout {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_disk_limit_out_of_range() {
        let mut config = Config::default();
        config.worker.disk_limit_percent = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidDiskLimit(0))
        ));

        config.worker.disk_limit_percent = 101;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidDiskLimit(101))
        ));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.callback.timeout_secs = 0;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::ZeroTimeout { .. })));
    }

    #[test]
    fn test_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyUserAgent)
        ));
    }

    #[test]
    fn test_notes_file_with_separator() {
        let mut config = Config::default();
        config.worker.notes_file = "../README.txt".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidNotesFile(_))
        ));
    }

    #[test]
    fn test_dotted_extension() {
        let mut config = Config::default();
        config.worker.excluded_extensions = vec![".zip".to_string()];

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidExcludedExtension(_))
        ));
    }
}
