//! Transaction scope shared by every workflow.
//!
//! The callback runs inside one database transaction. `Ok` commits, `Err`
//! rolls back, and the connection goes back to the pool either way.

use crate::errors::ServiceError;
use futures::future::BoxFuture;
use metrics::{counter, histogram};
use sea_orm::{DatabaseTransaction, TransactionError, TransactionTrait};
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Executes `f` inside a transaction on `db`, recording commit/rollback metrics
/// under the given workflow name.
///
/// ```rust,ignore
/// let order = run_workflow(db, "create_order", move |txn| {
///     Box::pin(async move {
///         let order = new_order.insert(txn).await?;
///         Ok(order)
///     })
/// })
/// .await?;
/// ```
pub async fn run_workflow<C, F, T>(db: &C, workflow: &'static str, f: F) -> Result<T, ServiceError>
where
    C: TransactionTrait,
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>> + Send,
    T: Send,
{
    let transaction_id = Uuid::new_v4();
    let start = Instant::now();
    debug!(transaction_id = %transaction_id, workflow, "Starting database transaction");

    let result = db
        .transaction::<_, T, ServiceError>(f)
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        });

    let elapsed = start.elapsed();
    histogram!("erp_db.transaction.duration", elapsed, "workflow" => workflow);

    match &result {
        Ok(_) => {
            counter!("erp_db.transaction.committed", 1, "workflow" => workflow);
            debug!(transaction_id = %transaction_id, workflow, "Transaction committed in {:?}", elapsed);
        }
        Err(e) => {
            counter!("erp_db.transaction.rolled_back", 1, "workflow" => workflow);
            warn!(transaction_id = %transaction_id, workflow, error = %e, "Transaction rolled back after {:?}", elapsed);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::service_center;
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};

    async fn pool() -> crate::db::DbPool {
        let pool = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn ok_result_commits() {
        let db = pool().await;

        let id = run_workflow(&db, "test_commit", |txn| {
            Box::pin(async move {
                let center = service_center::ActiveModel {
                    name: Set("North".to_string()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                Ok(center.id)
            })
        })
        .await
        .unwrap();

        let stored = service_center::Entity::find_by_id(id).one(&db).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn err_result_rolls_back_earlier_writes() {
        let db = pool().await;

        let result: Result<(), ServiceError> = run_workflow(&db, "test_rollback", |txn| {
            Box::pin(async move {
                service_center::ActiveModel {
                    name: Set("South".to_string()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                Err(ServiceError::ValidationError("abort".into()))
            })
        })
        .await;

        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
        let count = service_center::Entity::find().count(&db).await.unwrap();
        assert_eq!(count, 0);
    }
}
