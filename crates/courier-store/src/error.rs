use courier_core::error::DomainError;

/// Maps a driver error onto the domain taxonomy. Unique violations become
/// conflicts; everything else is infrastructure.
pub(crate) fn store_error(e: sqlx::Error) -> DomainError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::Conflict(
            match db.constraint() {
                Some("users_username_key") => "username is already taken".to_owned(),
                Some("users_email_key") => "email is already registered".to_owned(),
                Some(other) => format!("unique constraint {other} violated"),
                None => db.message().to_owned(),
            },
        ),
        _ => DomainError::Infrastructure(e.to_string()),
    }
}
