use genealogy_search_shared::DomainError;

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";

/// Translate a driver error into a domain error kind.
///
/// # Arguments
///
/// * `err` - The driver error
/// * `entity` - Entity name used in the rendered error
/// * `id` - Entity ID used in the rendered error
pub fn from_sqlx(err: sqlx::Error, entity: &str, id: impl ToString) -> DomainError {
    match err {
        sqlx::Error::RowNotFound => DomainError::not_found(entity, id),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(FOREIGN_KEY_VIOLATION) => DomainError::bad_reference(entity, id),
            Some(SERIALIZATION_FAILURE) | Some(UNIQUE_VIOLATION) => {
                DomainError::conflict(db_err.message().to_string())
            }
            _ => DomainError::other(db_err.to_string()),
        },
        other => DomainError::other(other.to_string()),
    }
}
