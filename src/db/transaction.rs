/*!
 * Transaction helpers
 *
 * Services open a transaction, run the mutating body against `&DatabaseTransaction`,
 * and hand the outcome to [`conclude`], which commits on success and rolls back on failure
 * while preserving the original error.
 */

use crate::errors::ServiceError;
use sea_orm::DatabaseTransaction;
use tracing::warn;

/// Commit `txn` when `outcome` is `Ok`, otherwise roll it back and return the original error.
///
/// ```rust,ignore
/// let txn = db.begin().await?;
/// let outcome = self.complete_in(&txn, &caller, id).await;
/// transaction::conclude(txn, outcome).await
/// ```
pub async fn conclude<T>(
    txn: DatabaseTransaction,
    outcome: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match outcome {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::warehouse;
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set, TransactionTrait};
    use uuid::Uuid;

    async fn memory_db() -> sea_orm::DatabaseConnection {
        let cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        };
        let db = establish_connection_with_config(&cfg).await.unwrap();
        run_migrations(&db).await.unwrap();
        db
    }

    fn new_warehouse() -> warehouse::ActiveModel {
        warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(Uuid::new_v4()),
            name: Set("Main".to_string()),
            created_at: Set(Utc::now()),
        }
    }

    #[tokio::test]
    async fn failed_outcome_rolls_back_writes() {
        let db = memory_db().await;

        let txn = db.begin().await.unwrap();
        new_warehouse().insert(&txn).await.unwrap();
        let outcome: Result<(), ServiceError> =
            Err(ServiceError::InvalidState("late failure".into()));
        let err = conclude(txn, outcome).await.unwrap_err();

        assert_eq!(err.kind(), "invalid_state");
        assert_eq!(warehouse::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn successful_outcome_commits() {
        let db = memory_db().await;

        let txn = db.begin().await.unwrap();
        let inserted = new_warehouse().insert(&txn).await.unwrap();
        let id = conclude(txn, Ok(inserted.id)).await.unwrap();

        assert!(warehouse::Entity::find_by_id(id).one(&db).await.unwrap().is_some());
    }
}
