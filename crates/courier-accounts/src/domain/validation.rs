//! Input validation for user commands.

use courier_core::error::DomainError;
use courier_core::user::UserChanges;

const MAX_USERNAME_LEN: usize = 64;

/// Checks a login name: non-blank, at most 64 characters, no whitespace.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first problem found.
pub fn validate_username(username: &str) -> Result<(), DomainError> {
    if username.trim().is_empty() {
        return Err(DomainError::Validation("username must not be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::Validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(DomainError::Validation(
            "username must not contain whitespace".into(),
        ));
    }
    Ok(())
}

/// Checks that `email` looks like `local@domain.tld`.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the address is malformed.
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let malformed = || DomainError::Validation(format!("malformed email address: {email}"));
    if email.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    let (local, domain) = email.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.contains('@') {
        return Err(malformed());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(malformed()),
    }
}

/// Checks a partial update: at least one field, each present field valid.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty update or an invalid field.
pub fn validate_changes(changes: &UserChanges) -> Result<(), DomainError> {
    if changes.is_empty() {
        return Err(DomainError::Validation("update changes no fields".into()));
    }
    if let Some(username) = &changes.username {
        validate_username(username)?;
    }
    if let Some(email) = &changes.email {
        validate_email(email)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_username_passes() {
        assert!(validate_username("alice").is_ok());
    }

    #[test]
    fn test_blank_or_spaced_username_is_rejected() {
        assert!(matches!(
            validate_username("   "),
            Err(DomainError::Validation(_))
        ));
        assert!(validate_username("al ice").is_err());
        assert!(validate_username(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_email_shape() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("first.last@mail.example.org").is_ok());
        for bad in ["", "ax.com", "@x.com", "a@x", "a@.com", "a@x.", "a@@x.com", "a b@x.com"] {
            assert!(validate_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_empty_update_is_rejected() {
        assert!(validate_changes(&UserChanges::default()).is_err());
        let changes = UserChanges {
            email: Some("new@x.com".into()),
            ..UserChanges::default()
        };
        assert!(validate_changes(&changes).is_ok());
    }
}
