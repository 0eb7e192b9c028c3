use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{manifest, order},
    errors::ServiceError,
    events::{Event, EventSender},
    services::order_status::OrderBucket,
};

/// A closed manifest together with how many orders it carries.
#[derive(Debug, Serialize)]
pub struct ManifestRow {
    pub manifest: manifest::Model,
    pub order_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ManifestDetail {
    pub manifest: manifest::Model,
    pub orders: Vec<order::Model>,
}

#[derive(Debug, Serialize)]
pub struct FinalizeOutcome {
    pub manifest: manifest::Model,
    pub order_count: u64,
}

/// Shipping verification and the batch finalizer: promotes a cohort of
/// checked orders into a numbered, shipped manifest.
#[derive(Clone)]
pub struct ShippingService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

/// Human-readable batch number, unique at second resolution and additionally
/// guarded by the store-level uniqueness constraint.
pub fn batch_number_for(at: DateTime<Utc>) -> String {
    format!("MAN-{}", at.format("%Y%m%d-%H%M%S"))
}

impl ShippingService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Looks up an order eligible for outbound verification by its scanned
    /// number: it must be packed and not yet shipped.
    #[instrument(skip(self))]
    pub async fn find_order_for_checking(
        &self,
        term: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let term = term.trim();
        Ok(order::Entity::find()
            .filter(order::Column::OrderNumber.eq(term))
            .filter(order::Column::StatusBucket.eq(OrderBucket::PackedPendingShip.as_str()))
            .one(&*self.db)
            .await?)
    }

    /// Marks a packed order as verified for shipping.
    #[instrument(skip(self))]
    pub async fn check_order(&self, order_number: &str) -> Result<order::Model, ServiceError> {
        let order = self
            .find_order_for_checking(order_number)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(
                    "order is not in the shipping queue or was already shipped".to_string(),
                )
            })?;

        if order.checked {
            return Err(ServiceError::InvalidInput(
                "order was already verified".to_string(),
            ));
        }

        let order_number = order.order_number.clone();
        let mut active: order::ActiveModel = order.into();
        active.checked = Set(true);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        info!(%order_number, "order verified for shipping");
        Ok(updated)
    }

    /// Verified orders awaiting the next manifest.
    pub async fn pending_checked_orders(&self) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::StatusBucket.eq(OrderBucket::PackedPendingShip.as_str()))
            .filter(order::Column::Checked.eq(true))
            .order_by_asc(order::Column::OrderNumber)
            .all(&*self.db)
            .await?)
    }

    /// Atomically promotes every checked, packed order into a new shipped
    /// manifest. All-or-nothing: either the manifest row and every order
    /// update commit together, or nothing persists — a manifest never exists
    /// with zero linked orders.
    #[instrument(skip(self))]
    pub async fn finalize_batch(&self, operator_id: Uuid) -> Result<FinalizeOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let eligible = order::Entity::find()
            .filter(order::Column::StatusBucket.eq(OrderBucket::PackedPendingShip.as_str()))
            .filter(order::Column::Checked.eq(true))
            .all(&txn)
            .await?;

        if eligible.is_empty() {
            txn.rollback().await?;
            return Err(ServiceError::InvalidOperation(
                "no verified orders to finalize".to_string(),
            ));
        }

        let now = Utc::now();
        let new_manifest = manifest::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_number: Set(batch_number_for(now)),
            created_by: Set(operator_id),
            closed_at: Set(now),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let shipped = order::Entity::update_many()
            .col_expr(
                order::Column::StatusBucket,
                Expr::value(OrderBucket::Shipped.as_str()),
            )
            .col_expr(order::Column::ManifestId, Expr::value(new_manifest.id))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::StatusBucket.eq(OrderBucket::PackedPendingShip.as_str()))
            .filter(order::Column::Checked.eq(true))
            .exec(&txn)
            .await?;

        if shipped.rows_affected == 0 {
            // A concurrent finalize won the cohort inside the window.
            txn.rollback().await?;
            return Err(ServiceError::InvalidOperation(
                "no verified orders to finalize".to_string(),
            ));
        }

        txn.commit().await?;

        info!(
            batch_number = %new_manifest.batch_number,
            orders = shipped.rows_affected,
            "shipping batch finalized"
        );
        self.event_sender
            .send(Event::ManifestClosed {
                manifest_id: new_manifest.id,
                batch_number: new_manifest.batch_number.clone(),
                order_count: shipped.rows_affected,
            })
            .await;

        Ok(FinalizeOutcome {
            manifest: new_manifest,
            order_count: shipped.rows_affected,
        })
    }

    /// All closed manifests, newest first, with their order counts.
    pub async fn list_manifests(&self) -> Result<Vec<ManifestRow>, ServiceError> {
        let manifests = manifest::Entity::find()
            .order_by_desc(manifest::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        #[derive(FromQueryResult)]
        struct ManifestCount {
            manifest_id: Uuid,
            total: i64,
        }

        let counts = order::Entity::find()
            .select_only()
            .column(order::Column::ManifestId)
            .column_as(order::Column::Id.count(), "total")
            .filter(order::Column::ManifestId.is_not_null())
            .group_by(order::Column::ManifestId)
            .into_model::<ManifestCount>()
            .all(&*self.db)
            .await?;

        Ok(manifests
            .into_iter()
            .map(|m| {
                let order_count = counts
                    .iter()
                    .find(|c| c.manifest_id == m.id)
                    .map(|c| c.total)
                    .unwrap_or(0);
                ManifestRow {
                    manifest: m,
                    order_count,
                }
            })
            .collect())
    }

    /// One manifest with all orders attached to it.
    pub async fn manifest_detail(
        &self,
        manifest_id: Uuid,
    ) -> Result<Option<ManifestDetail>, ServiceError> {
        let Some(found) = manifest::Entity::find_by_id(manifest_id)
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let orders = order::Entity::find()
            .filter(order::Column::ManifestId.eq(manifest_id))
            .order_by_asc(order::Column::OrderNumber)
            .all(&*self.db)
            .await?;

        Ok(Some(ManifestDetail {
            manifest: found,
            orders,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn batch_number_is_date_time_based() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 55).unwrap();
        assert_eq!(batch_number_for(at), "MAN-20260301-143055");
    }
}
