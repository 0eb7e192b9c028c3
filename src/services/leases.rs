use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, SqlErr,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    entities::packing_lease::{self, PackingProgress},
    entities::picking_lease,
    errors::ServiceError,
};

/// A failed insert that lost the acquisition race. The uniqueness
/// constraints (work-unit key, holder) are the final arbiter, so both
/// flavors of violation surface as a plain conflict, never corrupted state.
fn insert_conflict(err: &DbErr) -> bool {
    matches!(err, DbErr::RecordNotInserted)
        || matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Store of advisory picking leases: one per product code, one per operator.
#[derive(Clone)]
pub struct PickingLeases {
    db: Arc<DatabaseConnection>,
}

impl PickingLeases {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Attempts an atomic insert-if-absent. `None` means another holder owns
    /// the product (or this operator already holds a lease) — the existing
    /// row is never overwritten.
    #[instrument(skip(self))]
    pub async fn acquire(
        &self,
        product_code: &str,
        department_code: i32,
        holder: Uuid,
        target: i64,
    ) -> Result<Option<picking_lease::Model>, ServiceError> {
        let now = Utc::now();
        let lease = picking_lease::ActiveModel {
            product_code: Set(product_code.to_string()),
            department_code: Set(department_code),
            holder: Set(holder),
            target: Set(target),
            completed: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let insert = picking_lease::Entity::insert(lease)
            .on_conflict(
                OnConflict::column(picking_lease::Column::ProductCode)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&*self.db)
            .await;

        match insert {
            Ok(_) => self.find_by_key(product_code).await,
            Err(e) if insert_conflict(&e) => {
                debug!(product_code, %holder, "picking lease acquisition lost race");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_key(
        &self,
        product_code: &str,
    ) -> Result<Option<picking_lease::Model>, ServiceError> {
        Ok(picking_lease::Entity::find_by_id(product_code)
            .one(&*self.db)
            .await?)
    }

    /// Idempotent rediscovery of an operator's existing assignment.
    pub async fn find_by_holder(
        &self,
        holder: Uuid,
    ) -> Result<Option<picking_lease::Model>, ServiceError> {
        Ok(picking_lease::Entity::find()
            .filter(picking_lease::Column::Holder.eq(holder))
            .one(&*self.db)
            .await?)
    }

    /// Writes the complete new counter snapshot (last-writer-wins) and
    /// refreshes the staleness clock.
    #[instrument(skip(self))]
    pub async fn update_progress(
        &self,
        product_code: &str,
        target: i64,
        completed: i64,
    ) -> Result<picking_lease::Model, ServiceError> {
        let lease = self
            .find_by_key(product_code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no lease for {}", product_code)))?;

        let mut active: picking_lease::ActiveModel = lease.into();
        active.target = Set(target);
        active.completed = Set(completed);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Deletes the operator's lease; no-op when absent.
    pub async fn release_by_holder(&self, holder: Uuid) -> Result<(), ServiceError> {
        picking_lease::Entity::delete_many()
            .filter(picking_lease::Column::Holder.eq(holder))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Deletes the lease over a product; no-op when absent.
    pub async fn release_by_key(&self, product_code: &str) -> Result<(), ServiceError> {
        picking_lease::Entity::delete_many()
            .filter(picking_lease::Column::ProductCode.eq(product_code))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Deletes leases untouched past the TTL. Runs inline at the start of
    /// every acquire flow; there is no background scheduler, so an orphaned
    /// lease survives until the next acquisition attempt for this queue.
    #[instrument(skip(self))]
    pub async fn reap_stale(&self, ttl: Duration) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - ttl;
        let result = picking_lease::Entity::delete_many()
            .filter(picking_lease::Column::UpdatedAt.lt(cutoff))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            info!(reaped = result.rows_affected, "cleared stale picking leases");
        }
        Ok(result.rows_affected)
    }
}

/// Store of advisory packing leases: one per order number, one per operator.
/// Structurally identical to [`PickingLeases`]; only the key and the
/// progress payload differ.
#[derive(Clone)]
pub struct PackingLeases {
    db: Arc<DatabaseConnection>,
}

impl PackingLeases {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, progress))]
    pub async fn acquire(
        &self,
        order_number: &str,
        holder: Uuid,
        progress: PackingProgress,
    ) -> Result<Option<packing_lease::Model>, ServiceError> {
        let now = Utc::now();
        let lease = packing_lease::ActiveModel {
            order_number: Set(order_number.to_string()),
            holder: Set(holder),
            progress: Set(progress),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let insert = packing_lease::Entity::insert(lease)
            .on_conflict(
                OnConflict::column(packing_lease::Column::OrderNumber)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&*self.db)
            .await;

        match insert {
            Ok(_) => self.find_by_key(order_number).await,
            Err(e) if insert_conflict(&e) => {
                debug!(order_number, %holder, "packing lease acquisition lost race");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_key(
        &self,
        order_number: &str,
    ) -> Result<Option<packing_lease::Model>, ServiceError> {
        Ok(packing_lease::Entity::find_by_id(order_number)
            .one(&*self.db)
            .await?)
    }

    pub async fn find_by_holder(
        &self,
        holder: Uuid,
    ) -> Result<Option<packing_lease::Model>, ServiceError> {
        Ok(packing_lease::Entity::find()
            .filter(packing_lease::Column::Holder.eq(holder))
            .one(&*self.db)
            .await?)
    }

    /// Replaces the whole progress document (last-writer-wins; callers pass
    /// the complete new snapshot, there is no merge).
    #[instrument(skip(self, progress))]
    pub async fn update_progress(
        &self,
        order_number: &str,
        progress: PackingProgress,
    ) -> Result<packing_lease::Model, ServiceError> {
        let lease = self
            .find_by_key(order_number)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no lease for {}", order_number)))?;

        let mut active: packing_lease::ActiveModel = lease.into();
        active.progress = Set(progress);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn release_by_holder(&self, holder: Uuid) -> Result<(), ServiceError> {
        packing_lease::Entity::delete_many()
            .filter(packing_lease::Column::Holder.eq(holder))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    pub async fn release_by_key(&self, order_number: &str) -> Result<(), ServiceError> {
        packing_lease::Entity::delete_many()
            .filter(packing_lease::Column::OrderNumber.eq(order_number))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn reap_stale(&self, ttl: Duration) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - ttl;
        let result = packing_lease::Entity::delete_many()
            .filter(packing_lease::Column::UpdatedAt.lt(cutoff))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            info!(reaped = result.rows_affected, "cleared stale packing leases");
        }
        Ok(result.rows_affected)
    }
}
