//! Classification of PostgreSQL failures by SQLSTATE.

/// Coarse category of a database failure, used to pick the [`crate::AppError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorClass {
    UniqueViolation,
    ReferenceViolation,
    CheckViolation,
    /// Deadlock, serialization failure, statement/lock timeout or pool exhaustion.
    Retryable,
    RowNotFound,
    Other,
}

/// Maps a SQLSTATE code to its category.
pub fn classify_sqlstate(code: &str) -> SqlErrorClass {
    match code {
        "23505" => SqlErrorClass::UniqueViolation,
        "23503" => SqlErrorClass::ReferenceViolation,
        "23514" | "23502" => SqlErrorClass::CheckViolation,
        // serialization_failure, deadlock_detected, lock_not_available, query_canceled
        "40001" | "40P01" | "55P03" | "57014" => SqlErrorClass::Retryable,
        _ => SqlErrorClass::Other,
    }
}

pub fn classify_sqlx_error(e: &sqlx::Error) -> SqlErrorClass {
    match e {
        sqlx::Error::RowNotFound => SqlErrorClass::RowNotFound,
        sqlx::Error::PoolTimedOut => SqlErrorClass::Retryable,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| classify_sqlstate(&code))
            .unwrap_or(SqlErrorClass::Other),
        _ => SqlErrorClass::Other,
    }
}
