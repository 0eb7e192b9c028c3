use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use sea_orm::sea_query::Query;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::packing_lease::{self, ItemProgress, PackingProgress},
    entities::{order, order_line, product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        leases::PackingLeases, order_status::{OrderBucket, OrderStatusService}, normalize_sku,
        ASSIGN_RETRY_LIMIT,
    },
};

/// The two disjoint packing queues. Which one an order lands in is a
/// property of the order itself (single line vs multi-line kit), not a
/// configuration choice.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderType {
    Simple,
    Kit,
}

#[derive(Debug, Serialize)]
pub struct PackingQueueSummary {
    pub simple: u64,
    pub kit: u64,
}

/// An operator's current packing assignment.
#[derive(Debug, Serialize)]
pub struct PackingSession {
    pub lease: packing_lease::Model,
    pub order: order::Model,
    pub lines: Vec<order_line::Model>,
}

/// Result of scanning one unit into the package.
#[derive(Debug, Serialize)]
pub struct PackScanOutcome {
    pub finished: bool,
    pub order_number: String,
    pub progress: PackingProgress,
}

/// Assigns picked orders to packing operators, one exclusive order per
/// operator, and tracks per-product scan progress until the package closes.
#[derive(Clone)]
pub struct PackingService {
    db: Arc<DatabaseConnection>,
    leases: PackingLeases,
    order_status: OrderStatusService,
    event_sender: EventSender,
    lease_ttl: Duration,
}

impl PackingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        lease_ttl: Duration,
    ) -> Self {
        Self {
            leases: PackingLeases::new(db.clone()),
            order_status: OrderStatusService::new(db.clone(), event_sender.clone()),
            db,
            event_sender,
            lease_ttl,
        }
    }

    /// Orders awaiting packing in each queue, excluding those already leased.
    pub async fn queue_summary(&self) -> Result<PackingQueueSummary, ServiceError> {
        let mut counts = [0u64; 2];
        for (slot, is_kit) in [(0, false), (1, true)] {
            counts[slot] = self
                .packable_orders(is_kit)
                .count(&*self.db)
                .await?;
        }

        Ok(PackingQueueSummary {
            simple: counts[0],
            kit: counts[1],
        })
    }

    fn packable_orders(&self, is_kit: bool) -> sea_orm::Select<order::Entity> {
        let leased_orders = Query::select()
            .column(packing_lease::Column::OrderNumber)
            .from(packing_lease::Entity)
            .to_owned();

        order::Entity::find()
            .filter(order::Column::StatusBucket.eq(OrderBucket::Picked.as_str()))
            .filter(order::Column::IsKit.eq(is_kit))
            .filter(order::Column::OrderNumber.not_in_subquery(leased_orders))
    }

    /// Idempotent re-fetch of the operator's assignment. A lease whose order
    /// vanished is inconsistent state: it is released and reported as no
    /// session.
    #[instrument(skip(self))]
    pub async fn current_assignment(
        &self,
        operator_id: Uuid,
    ) -> Result<Option<PackingSession>, ServiceError> {
        let Some(lease) = self.leases.find_by_holder(operator_id).await? else {
            return Ok(None);
        };

        let Some(order) = self.find_order(&lease.order_number).await? else {
            warn!(
                order_number = %lease.order_number,
                "packing lease references an order that no longer exists; releasing"
            );
            self.leases.release_by_holder(operator_id).await?;
            return Ok(None);
        };

        let lines = self.lines_of(order.id).await?;
        Ok(Some(PackingSession {
            lease,
            order,
            lines,
        }))
    }

    /// Assigns the next picked order of the requested queue to the operator.
    ///
    /// An existing assignment is returned as-is (session affinity). Lost
    /// acquisition races retry selection a bounded number of times; `None`
    /// means no order is currently available in this queue.
    #[instrument(skip(self))]
    pub async fn assign(
        &self,
        operator_id: Uuid,
        order_type: OrderType,
    ) -> Result<Option<PackingSession>, ServiceError> {
        self.leases.reap_stale(self.lease_ttl).await?;

        if let Some(session) = self.current_assignment(operator_id).await? {
            return Ok(Some(session));
        }

        for _ in 0..ASSIGN_RETRY_LIMIT {
            let Some(order) = self
                .packable_orders(order_type == OrderType::Kit)
                .order_by_asc(order::Column::CreatedAt)
                .one(&*self.db)
                .await?
            else {
                return Ok(None);
            };

            let lines = self.lines_of(order.id).await?;
            let progress = self.initial_progress(&lines).await?;

            match self
                .leases
                .acquire(&order.order_number, operator_id, progress)
                .await?
            {
                Some(lease) => {
                    info!(
                        order_number = %order.order_number,
                        %operator_id,
                        "packing assignment acquired"
                    );
                    self.event_sender
                        .send(Event::PackAssigned {
                            operator_id,
                            order_number: order.order_number.clone(),
                        })
                        .await;
                    return Ok(Some(PackingSession {
                        lease,
                        order,
                        lines,
                    }));
                }
                // Another operator claimed the order inside the race window.
                None => continue,
            }
        }

        Ok(None)
    }

    /// Builds the initial progress document from every line of the order.
    /// Lines with nothing required never produce an entry.
    async fn initial_progress(
        &self,
        lines: &[order_line::Model],
    ) -> Result<PackingProgress, ServiceError> {
        let codes: Vec<&str> = lines.iter().map(|l| l.product_code.as_str()).collect();
        let products = product::Entity::find()
            .filter(product::Column::Code.is_in(codes))
            .all(&*self.db)
            .await?;

        let mut map = BTreeMap::new();
        for line in lines {
            if line.quantity_required <= 0 {
                continue;
            }
            let manufacturer_code = products
                .iter()
                .find(|p| p.code == line.product_code)
                .and_then(|p| p.manufacturer_code.clone());
            map.insert(
                line.product_code.clone(),
                ItemProgress {
                    needed: line.quantity_required,
                    scanned: 0,
                    sku: line.sku.clone(),
                    manufacturer_code,
                },
            );
        }

        Ok(PackingProgress(map))
    }

    /// Records one scanned unit against the operator's assigned order.
    ///
    /// The scan must match an entry of the progress map (by sku or
    /// manufacturer code) that is not already complete. When the last entry
    /// completes, the order advances to `packed_pending_ship` and the lease
    /// is released.
    #[instrument(skip(self))]
    pub async fn scan_unit(
        &self,
        operator_id: Uuid,
        scanned_sku: &str,
    ) -> Result<PackScanOutcome, ServiceError> {
        let lease = self
            .leases
            .find_by_holder(operator_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("no active packing session for this operator".to_string())
            })?;

        let normalized = normalize_sku(scanned_sku);
        if normalized.is_empty() {
            return Err(ServiceError::InvalidInput("empty scan code".to_string()));
        }

        let mut progress = lease.progress.clone();
        let Some(code) = progress.match_code(&normalized).map(str::to_string) else {
            return Err(ServiceError::InvalidInput(
                "scanned code is not part of this order".to_string(),
            ));
        };

        if let Some(item) = progress.0.get_mut(&code) {
            if item.scanned >= item.needed {
                return Err(ServiceError::InvalidInput(format!(
                    "all {} units of this product are already scanned",
                    item.needed
                )));
            }
            item.scanned += 1;
        }

        self.event_sender
            .send(Event::UnitPacked {
                operator_id,
                order_number: lease.order_number.clone(),
                product_code: code,
            })
            .await;

        if progress.is_complete() {
            self.order_status
                .transition_by_number(&lease.order_number, OrderBucket::PackedPendingShip)
                .await?;
            self.leases.release_by_holder(operator_id).await?;
            info!(
                order_number = %lease.order_number,
                %operator_id,
                "order fully packed"
            );
            self.event_sender
                .send(Event::OrderPacked {
                    operator_id,
                    order_number: lease.order_number.clone(),
                })
                .await;

            return Ok(PackScanOutcome {
                finished: true,
                order_number: lease.order_number,
                progress,
            });
        }

        // Still in progress: persist the whole updated document.
        let updated = self
            .leases
            .update_progress(&lease.order_number, progress)
            .await?;

        Ok(PackScanOutcome {
            finished: false,
            order_number: lease.order_number,
            progress: updated.progress,
        })
    }

    /// Releases the operator's packing session; no-op when none exists.
    #[instrument(skip(self))]
    pub async fn release_session(&self, operator_id: Uuid) -> Result<(), ServiceError> {
        self.leases.release_by_holder(operator_id).await
    }

    async fn find_order(&self, order_number: &str) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?)
    }

    async fn lines_of(&self, order_id: Uuid) -> Result<Vec<order_line::Model>, ServiceError> {
        Ok(order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_line::Column::ProductCode)
            .all(&*self.db)
            .await?)
    }
}
