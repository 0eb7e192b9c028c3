use std::sync::Arc;

use chrono::Duration;
use sea_orm::sea_query::{Expr, Func, Query};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{order_line, picking_lease, product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        leases::PickingLeases, ledger::WorkLedgerService, order_status::OrderStatusService,
        normalize_sku, ASSIGN_RETRY_LIMIT,
    },
};

/// An operator's current picking assignment.
#[derive(Debug, Serialize)]
pub struct PickingSession {
    pub lease: picking_lease::Model,
    pub product: product::Model,
    pub remaining: i64,
}

/// Result of scanning one unit of the assigned product.
#[derive(Debug, Serialize)]
pub struct PickScanOutcome {
    pub finished: bool,
    pub remaining: i64,
    pub completed: i64,
}

/// A product with outstanding units in one department's queue.
#[derive(Debug, Serialize, FromQueryResult)]
pub struct PendingProduct {
    pub code: String,
    pub description: String,
    pub department_code: i32,
    pub department: Option<String>,
    pub unit: Option<String>,
    pub units_pending: i64,
}

/// A department queue overview: how many products and units await picking.
#[derive(Debug, Serialize)]
pub struct DepartmentQueue {
    pub department_code: i32,
    pub department: Option<String>,
    pub products_with_pending: i64,
    pub units_pending: i64,
}

/// Assigns products to picking operators, one exclusive product per operator
/// per department queue, and records each separated unit.
#[derive(Clone)]
pub struct PickingService {
    db: Arc<DatabaseConnection>,
    ledger: WorkLedgerService,
    leases: PickingLeases,
    order_status: OrderStatusService,
    event_sender: EventSender,
    lease_ttl: Duration,
}

impl PickingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        lease_ttl: Duration,
    ) -> Self {
        Self {
            ledger: WorkLedgerService::new(db.clone()),
            leases: PickingLeases::new(db.clone()),
            order_status: OrderStatusService::new(db.clone(), event_sender.clone()),
            db,
            event_sender,
            lease_ttl,
        }
    }

    /// Idempotent re-fetch of the operator's assignment (page reload, second
    /// tab). A lease whose product vanished from the catalog is released and
    /// reported as no session.
    #[instrument(skip(self))]
    pub async fn current_session(
        &self,
        operator_id: Uuid,
    ) -> Result<Option<PickingSession>, ServiceError> {
        let Some(lease) = self.leases.find_by_holder(operator_id).await? else {
            return Ok(None);
        };

        let Some(product) = product::Entity::find_by_id(&lease.product_code)
            .one(&*self.db)
            .await?
        else {
            warn!(
                product_code = %lease.product_code,
                "picking lease references a product that no longer exists; releasing"
            );
            self.leases.release_by_holder(operator_id).await?;
            return Ok(None);
        };

        let remaining = self.ledger.remaining_units(&lease.product_code).await?;
        Ok(Some(PickingSession {
            lease,
            product,
            remaining,
        }))
    }

    /// Assigns a product from the department queue to the operator.
    ///
    /// An existing lease is returned unchanged (session affinity) unless its
    /// department no longer matches the requested queue or its product has
    /// nothing left, in which case it is released and a fresh assignment is
    /// attempted. Lost acquisition races are retried a bounded number of
    /// times; `None` means nothing is currently available.
    #[instrument(skip(self))]
    pub async fn assign(
        &self,
        operator_id: Uuid,
        department_code: i32,
    ) -> Result<Option<PickingSession>, ServiceError> {
        self.leases.reap_stale(self.lease_ttl).await?;

        if let Some(lease) = self.leases.find_by_holder(operator_id).await? {
            if lease.department_code != department_code {
                self.leases.release_by_holder(operator_id).await?;
            } else {
                let remaining = self.ledger.remaining_units(&lease.product_code).await?;
                if remaining > 0 {
                    if let Some(product) = product::Entity::find_by_id(&lease.product_code)
                        .one(&*self.db)
                        .await?
                    {
                        return Ok(Some(PickingSession {
                            lease,
                            product,
                            remaining,
                        }));
                    }
                }
                self.leases.release_by_holder(operator_id).await?;
            }
        }

        for _ in 0..ASSIGN_RETRY_LIMIT {
            let Some(candidate) = self.next_candidate(department_code).await? else {
                return Ok(None);
            };

            let remaining = self.ledger.remaining_units(&candidate.code).await?;
            if remaining <= 0 {
                return Ok(None);
            }

            match self
                .leases
                .acquire(&candidate.code, candidate.department_code, operator_id, remaining)
                .await?
            {
                Some(lease) => {
                    info!(
                        product_code = %candidate.code,
                        %operator_id,
                        target = remaining,
                        "picking assignment acquired"
                    );
                    self.event_sender
                        .send(Event::PickAssigned {
                            operator_id,
                            product_code: candidate.code.clone(),
                            target: remaining,
                        })
                        .await;
                    return Ok(Some(PickingSession {
                        lease,
                        product: candidate,
                        remaining,
                    }));
                }
                // Another operator claimed it inside the race window.
                None => continue,
            }
        }

        Ok(None)
    }

    /// Next unleased product with pending units in the department,
    /// alphabetical by description (deterministic, reviewable).
    async fn next_candidate(
        &self,
        department_code: i32,
    ) -> Result<Option<product::Model>, ServiceError> {
        let pending_products = Query::select()
            .column(order_line::Column::ProductCode)
            .from(order_line::Entity)
            .and_where(
                Expr::col(order_line::Column::QuantityDone)
                    .lt(Expr::col(order_line::Column::QuantityRequired)),
            )
            .to_owned();

        let leased_products = Query::select()
            .column(picking_lease::Column::ProductCode)
            .from(picking_lease::Entity)
            .to_owned();

        Ok(product::Entity::find()
            .filter(product::Column::DepartmentCode.eq(department_code))
            .filter(product::Column::Code.in_subquery(pending_products))
            .filter(product::Column::Code.not_in_subquery(leased_products))
            .order_by_asc(product::Column::Description)
            .one(&*self.db)
            .await?)
    }

    /// Records one separated unit of the operator's assigned product.
    ///
    /// When a scanner code is supplied it must match the leased product.
    /// Every successful allocation re-evaluates the owning order's bucket.
    /// The lease is released automatically when the product's ledger hits
    /// zero remaining units.
    #[instrument(skip(self))]
    pub async fn scan_unit(
        &self,
        operator_id: Uuid,
        scanned_sku: Option<&str>,
    ) -> Result<PickScanOutcome, ServiceError> {
        let lease = self
            .leases
            .find_by_holder(operator_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("no active picking session for this operator".to_string())
            })?;

        let product = product::Entity::find_by_id(&lease.product_code)
            .one(&*self.db)
            .await?;
        let Some(product) = product else {
            // Inconsistent lease: release it and force reassignment rather
            // than fabricating progress.
            self.leases.release_by_holder(operator_id).await?;
            return Err(ServiceError::InvalidOperation(
                "assigned product no longer exists; assignment released".to_string(),
            ));
        };

        if let Some(sku) = scanned_sku {
            if normalize_sku(sku) != normalize_sku(&product.code) {
                return Err(ServiceError::InvalidInput(
                    "scanned code does not match the assigned product".to_string(),
                ));
            }
        }

        let Some(line) = self.ledger.allocate_one_unit(&lease.product_code).await? else {
            // The ledger is already exhausted; nothing left to pick.
            self.leases.release_by_holder(operator_id).await?;
            return Ok(PickScanOutcome {
                finished: true,
                remaining: 0,
                completed: lease.completed,
            });
        };

        self.order_status.recompute_after_pick(line.order_id).await?;

        let remaining = self.ledger.remaining_units(&lease.product_code).await?;
        self.event_sender
            .send(Event::UnitPicked {
                operator_id,
                product_code: lease.product_code.clone(),
                order_id: line.order_id,
                remaining,
            })
            .await;

        if remaining == 0 {
            self.leases.release_by_key(&lease.product_code).await?;
            self.event_sender
                .send(Event::PickCompleted {
                    operator_id,
                    product_code: lease.product_code.clone(),
                })
                .await;
            return Ok(PickScanOutcome {
                finished: true,
                remaining: 0,
                completed: lease.completed + 1,
            });
        }

        // New work for this product may have been ingested since acquisition;
        // the target only ever grows.
        let target = (lease.completed + 1 + remaining).max(lease.target);
        let updated = self
            .leases
            .update_progress(&lease.product_code, target, lease.completed + 1)
            .await?;

        Ok(PickScanOutcome {
            finished: false,
            remaining,
            completed: updated.completed,
        })
    }

    /// Releases the operator's picking session; no-op when none exists.
    #[instrument(skip(self))]
    pub async fn release_session(&self, operator_id: Uuid) -> Result<(), ServiceError> {
        self.leases.release_by_holder(operator_id).await
    }

    /// Products with outstanding units, optionally narrowed to a department,
    /// alphabetical by description.
    pub async fn pending_products(
        &self,
        department_code: Option<i32>,
    ) -> Result<Vec<PendingProduct>, ServiceError> {
        let mut query = order_line::Entity::find()
            .select_only()
            .column_as(Expr::col((product::Entity, product::Column::Code)), "code")
            .column_as(
                Expr::col((product::Entity, product::Column::Description)),
                "description",
            )
            .column_as(
                Expr::col((product::Entity, product::Column::DepartmentCode)),
                "department_code",
            )
            .column_as(
                Expr::col((product::Entity, product::Column::Department)),
                "department",
            )
            .column_as(Expr::col((product::Entity, product::Column::Unit)), "unit")
            .column_as(
                Expr::expr(Func::sum(
                    Expr::col((order_line::Entity, order_line::Column::QuantityRequired)).sub(
                        Expr::col((order_line::Entity, order_line::Column::QuantityDone)),
                    ),
                )),
                "units_pending",
            )
            .join(JoinType::InnerJoin, order_line::Relation::Product.def())
            .filter(
                Expr::col((order_line::Entity, order_line::Column::QuantityDone)).lt(Expr::col((
                    order_line::Entity,
                    order_line::Column::QuantityRequired,
                ))),
            )
            .group_by(Expr::col((product::Entity, product::Column::Code)))
            .group_by(Expr::col((product::Entity, product::Column::Description)))
            .group_by(Expr::col((product::Entity, product::Column::DepartmentCode)))
            .group_by(Expr::col((product::Entity, product::Column::Department)))
            .group_by(Expr::col((product::Entity, product::Column::Unit)))
            .order_by_asc(product::Column::Description);

        if let Some(code) = department_code {
            query = query.filter(product::Column::DepartmentCode.eq(code));
        }

        Ok(query.into_model::<PendingProduct>().all(&*self.db).await?)
    }

    /// Per-department totals of outstanding picking work.
    pub async fn department_queues(&self) -> Result<Vec<DepartmentQueue>, ServiceError> {
        let pending = self.pending_products(None).await?;

        let mut queues: Vec<DepartmentQueue> = Vec::new();
        for product in pending {
            match queues
                .iter_mut()
                .find(|q| q.department_code == product.department_code)
            {
                Some(queue) => {
                    queue.products_with_pending += 1;
                    queue.units_pending += product.units_pending;
                }
                None => queues.push(DepartmentQueue {
                    department_code: product.department_code,
                    department: product.department,
                    products_with_pending: 1,
                    units_pending: product.units_pending,
                }),
            }
        }

        queues.sort_by(|a, b| a.department.cmp(&b.department));
        Ok(queues)
    }
}
