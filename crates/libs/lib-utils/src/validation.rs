//! # Validation Utilities
//!
//! Input validation helpers.

/// Validate that a string is not empty.
pub fn validate_not_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate email format (basic check).
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.contains('@') && email.contains('.') {
        Ok(())
    } else {
        Err("Invalid email format".to_string())
    }
}

/// Validate minimum length.
pub fn validate_min_length(value: &str, min: usize, field_name: &str) -> Result<(), String> {
    if value.len() < min {
        Err(format!("{} must be at least {} characters long", field_name, min))
    } else {
        Ok(())
    }
}

/// Validate maximum length in bytes.
pub fn validate_max_length(value: &str, max: usize, field_name: &str) -> Result<(), String> {
    if value.len() > max {
        Err(format!("{} must be at most {} bytes", field_name, max))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty_rejects_whitespace() {
        assert!(validate_not_empty("   ", "text").is_err());
        assert!(validate_not_empty(" hi ", "text").is_ok());
    }

    #[test]
    fn test_validate_min_length() {
        assert!(validate_min_length("12345678", 8, "Password").is_ok());
        assert_eq!(
            validate_min_length("1234567", 8, "Password").unwrap_err(),
            "Password must be at least 8 characters long"
        );
    }

    #[test]
    fn test_validate_max_length() {
        assert!(validate_max_length("abcd", 4, "text").is_ok());
        assert_eq!(
            validate_max_length("abcde", 4, "text").unwrap_err(),
            "text must be at most 4 bytes"
        );
    }
}
