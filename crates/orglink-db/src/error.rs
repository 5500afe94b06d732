//! Database-specific error types and conversions.

use orglink_core::error::OrgLinkError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[source] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),

    #[error("Version conflict on {entity} {id}")]
    VersionConflict { entity: String, id: String },

    /// The storage engine aborted the transaction because a concurrent
    /// writer touched the same keys. Safe to retry.
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Duplicate relation: {0}")]
    DuplicateRelation(String),
}

/// Whether an engine message reports an aborted, retryable transaction.
fn is_transaction_conflict(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("transaction conflict")
        || message.contains("retry the transaction")
        || message.contains("can be retried")
}

impl DbError {
    /// Classify a failed statement reported by `Response::check`.
    pub fn query(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if is_transaction_conflict(&message) {
            DbError::TransactionConflict(message)
        } else {
            DbError::Query(message)
        }
    }
}

impl From<surrealdb::Error> for DbError {
    fn from(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if is_transaction_conflict(&message) {
            DbError::TransactionConflict(message)
        } else {
            DbError::Surreal(err)
        }
    }
}

impl From<DbError> for OrgLinkError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => OrgLinkError::NotFound { entity, id },
            DbError::VersionConflict { entity, id } => OrgLinkError::Conflict {
                message: format!("{entity} {id} was modified concurrently"),
                entity,
            },
            DbError::TransactionConflict(message) => OrgLinkError::Conflict {
                entity: "transaction".into(),
                message,
            },
            DbError::DuplicateRelation(key) => OrgLinkError::Conflict {
                entity: "relation".into(),
                message: format!("a non-terminal relation already exists for {key}"),
            },
            other => OrgLinkError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_conflict_maps_to_retryable_conflict() {
        let err: OrgLinkError = DbError::VersionConflict {
            entity: "relation".into(),
            id: "abc".into(),
        }
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn decode_failure_is_a_database_error() {
        let err: OrgLinkError = DbError::Decode("bad status".into()).into();
        assert!(matches!(err, OrgLinkError::Database(_)));
    }

    #[test]
    fn engine_transaction_conflicts_are_recognized() {
        for message in [
            "Transaction conflict: Write conflict. This transaction can be retried",
            "Failed to commit transaction due to a read or write conflict. \
             This transaction can be retried",
            "Resource busy: please RETRY THE TRANSACTION",
        ] {
            assert!(is_transaction_conflict(message), "{message}");
        }
        assert!(!is_transaction_conflict("Found 'x' for field `status`"));
        assert!(!is_transaction_conflict("Parse error: unexpected token"));
    }

    #[test]
    fn transaction_conflict_maps_to_retryable_conflict() {
        let err: OrgLinkError =
            DbError::TransactionConflict("Transaction conflict: Write conflict".into()).into();
        assert!(err.is_retryable());
        assert!(matches!(err, OrgLinkError::Conflict { .. }));
    }

    #[test]
    fn other_query_failures_stay_database_errors() {
        let err: OrgLinkError = DbError::Query("Found NONE for field `kind`".into()).into();
        assert!(matches!(err, OrgLinkError::Database(_)));
        assert!(!err.is_retryable());
    }
}
