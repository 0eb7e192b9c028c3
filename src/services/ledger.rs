use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait,
    FromQueryResult, QueryFilter, QuerySelect, Statement,
};
use tracing::instrument;

use crate::{
    entities::order_line::{self, Entity as OrderLineEntity},
    errors::ServiceError,
};

/// Durable counts of required vs. completed units per order line; the source
/// of truth for "how much is left" of every product.
#[derive(Clone)]
pub struct WorkLedgerService {
    db: Arc<DatabaseConnection>,
}

#[derive(FromQueryResult)]
struct RemainingRow {
    remaining: Option<i64>,
}

impl WorkLedgerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Units still to separate for a product, summed over all its lines.
    /// Zero for unknown or fully allocated products.
    #[instrument(skip(self))]
    pub async fn remaining_units(&self, product_code: &str) -> Result<i64, ServiceError> {
        let row = OrderLineEntity::find()
            .select_only()
            .column_as(
                Expr::expr(Func::sum(
                    Expr::col(order_line::Column::QuantityRequired)
                        .sub(Expr::col(order_line::Column::QuantityDone)),
                )),
                "remaining",
            )
            .filter(order_line::Column::ProductCode.eq(product_code))
            .into_model::<RemainingRow>()
            .one(&*self.db)
            .await?;

        Ok(row.and_then(|r| r.remaining).unwrap_or(0))
    }

    /// Atomically claims one pending unit of the given product: selects the
    /// oldest eligible line, increments `quantity_done`, recomputes its
    /// status, and returns the updated row. `None` when nothing is left.
    ///
    /// This is the primitive that makes concurrent multi-operator picking
    /// correct: overlapping calls for the same product never double-count a
    /// unit. On Postgres eligible rows locked by a concurrent transaction are
    /// skipped rather than awaited; on SQLite the single conditional UPDATE
    /// with a subquery-selected row preserves the same at-most-once-per-row
    /// guarantee without a prior SELECT.
    #[instrument(skip(self))]
    pub async fn allocate_one_unit(
        &self,
        product_code: &str,
    ) -> Result<Option<order_line::Model>, ServiceError> {
        let db = &*self.db;
        let backend = db.get_database_backend();
        let now = Utc::now();

        let stmt = match backend {
            DatabaseBackend::Postgres => Statement::from_sql_and_values(
                backend,
                r#"
                WITH next_line AS (
                    SELECT id
                    FROM order_lines
                    WHERE product_code = $1
                      AND quantity_done < quantity_required
                    ORDER BY created_at
                    FOR UPDATE SKIP LOCKED
                    LIMIT 1
                )
                UPDATE order_lines AS ol
                SET quantity_done = ol.quantity_done + 1,
                    status = CASE
                        WHEN ol.quantity_done + 1 >= ol.quantity_required THEN 'done'
                        ELSE 'pending'
                    END,
                    updated_at = $2
                FROM next_line
                WHERE ol.id = next_line.id
                RETURNING ol.id, ol.order_id, ol.product_code, ol.sku, ol.description,
                          ol.quantity_required, ol.quantity_done, ol.status,
                          ol.created_at, ol.updated_at
                "#,
                [product_code.into(), now.into()],
            ),
            _ => Statement::from_sql_and_values(
                backend,
                r#"
                UPDATE order_lines
                SET quantity_done = quantity_done + 1,
                    status = CASE
                        WHEN quantity_done + 1 >= quantity_required THEN 'done'
                        ELSE 'pending'
                    END,
                    updated_at = ?
                WHERE id = (
                    SELECT id
                    FROM order_lines
                    WHERE product_code = ?
                      AND quantity_done < quantity_required
                    ORDER BY created_at
                    LIMIT 1
                )
                RETURNING id, order_id, product_code, sku, description,
                          quantity_required, quantity_done, status,
                          created_at, updated_at
                "#,
                [now.into(), product_code.into()],
            ),
        };

        match db.query_one(stmt).await? {
            Some(row) => Ok(Some(order_line::Model::from_query_result(&row, "")?)),
            None => Ok(None),
        }
    }
}
