use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::order::{self, Entity as OrderEntity},
    entities::order_line,
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Lifecycle bucket of an order. Transitions only move forward; `Shipped` is
/// terminal and applied exclusively by the batch finalizer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderBucket {
    Pending,
    Picked,
    PackedPendingShip,
    Shipped,
}

impl OrderBucket {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Forward-only transition table; re-asserting the current bucket is a
    /// harmless no-op.
    pub fn can_transition(self, to: OrderBucket) -> bool {
        use OrderBucket::*;
        self == to
            || matches!(
                (self, to),
                (Pending, Picked) | (Picked, PackedPendingShip) | (PackedPendingShip, Shipped)
            )
    }
}

#[derive(Debug, Serialize, FromQueryResult)]
pub struct BucketCount {
    pub status_bucket: String,
    pub total: i64,
}

/// Derives and persists each order's lifecycle bucket from the state of its
/// line items.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    fn parse_bucket(raw: &str) -> Result<OrderBucket, ServiceError> {
        OrderBucket::from_str(raw)
            .map_err(|_| ServiceError::InternalError(format!("unknown status bucket '{}'", raw)))
    }

    /// Re-aggregates all lines of the order after a unit allocation: when
    /// every line is done the bucket advances `pending -> picked`. Idempotent
    /// and safe to call redundantly; never regresses a later bucket.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn recompute_after_pick(&self, order_id: Uuid) -> Result<OrderBucket, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = Self::parse_bucket(&order.status_bucket)?;
        if current != OrderBucket::Pending {
            return Ok(current);
        }

        let open_lines = order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .filter(
                Expr::col(order_line::Column::QuantityDone)
                    .lt(Expr::col(order_line::Column::QuantityRequired)),
            )
            .count(&*self.db)
            .await?;

        if open_lines > 0 {
            return Ok(OrderBucket::Pending);
        }

        self.persist_bucket(order, OrderBucket::Picked).await?;
        Ok(OrderBucket::Picked)
    }

    /// Explicit forward transition, used by the packing flow for
    /// `picked -> packed_pending_ship`. `shipped` is rejected here: it is
    /// applied only by the batch finalizer.
    #[instrument(skip(self))]
    pub async fn transition_by_number(
        &self,
        order_number: &str,
        to: OrderBucket,
    ) -> Result<order::Model, ServiceError> {
        if to == OrderBucket::Shipped {
            return Err(ServiceError::InvalidOperation(
                "shipped is applied by the batch finalizer".to_string(),
            ));
        }

        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;

        let current = Self::parse_bucket(&order.status_bucket)?;
        if !current.can_transition(to) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot transition order {} from '{}' to '{}'",
                order_number, current, to
            )));
        }

        if current == to {
            return Ok(order);
        }

        self.persist_bucket(order, to).await
    }

    async fn persist_bucket(
        &self,
        order: order::Model,
        to: OrderBucket,
    ) -> Result<order::Model, ServiceError> {
        let order_id = order.id;
        let old_status = order.status_bucket.clone();

        let mut active: order::ActiveModel = order.into();
        active.status_bucket = Set(to.as_str().to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        info!(
            "Order {} bucket advanced from '{}' to '{}'",
            order_id, old_status, to
        );
        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status: to.as_str().to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Total orders per bucket, for the presentation layer's dashboard.
    pub async fn bucket_counts(&self) -> Result<Vec<BucketCount>, ServiceError> {
        Ok(OrderEntity::find()
            .select_only()
            .column(order::Column::StatusBucket)
            .column_as(order::Column::Id.count(), "total")
            .group_by(order::Column::StatusBucket)
            .into_model::<BucketCount>()
            .all(&*self.db)
            .await?)
    }

    /// Most recent orders in one bucket.
    pub async fn list_by_bucket(
        &self,
        bucket: OrderBucket,
        limit: u64,
    ) -> Result<Vec<order::Model>, ServiceError> {
        Ok(OrderEntity::find()
            .filter(order::Column::StatusBucket.eq(bucket.as_str()))
            .order_by_desc(order::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::OrderBucket::*;

    #[test]
    fn transitions_are_forward_only() {
        assert!(Pending.can_transition(Picked));
        assert!(Picked.can_transition(PackedPendingShip));
        assert!(PackedPendingShip.can_transition(Shipped));

        assert!(!Picked.can_transition(Pending));
        assert!(!Shipped.can_transition(PackedPendingShip));
        assert!(!Pending.can_transition(PackedPendingShip));
        assert!(!Pending.can_transition(Shipped));
    }

    #[test]
    fn reasserting_current_bucket_is_allowed() {
        assert!(Picked.can_transition(Picked));
        assert!(Shipped.can_transition(Shipped));
    }

    #[test]
    fn bucket_strings_round_trip() {
        use std::str::FromStr;
        for bucket in [Pending, Picked, PackedPendingShip, Shipped] {
            assert_eq!(
                super::OrderBucket::from_str(bucket.as_str()).unwrap(),
                bucket
            );
        }
        assert_eq!(PackedPendingShip.as_str(), "packed_pending_ship");
    }
}
