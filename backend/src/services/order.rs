//! Manufacturer order service
//!
//! Creating an order promises stock to a warehouse: each line's ordered
//! quantity lands in the virtual pool until purchases invoice it.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    validate_positive_quantity, validate_unique_lines, CreateOrderInput, EndpointKind, Order,
    OrderLine, OrderStatus, PartyKind, Pool, PoolKey, TaxFields,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::Notification;
use crate::services::item_history::movement;
use crate::services::pricing::resolve_rate;
use crate::store::{Adjustment, LockKey, Store, UnitOfWork, Write};

/// Order lifecycle service
#[derive(Clone)]
pub struct OrderService {
    store: Arc<Store>,
}

impl OrderService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Create an order and push its quantities into the virtual pool
    #[tracing::instrument(skip(self, input), fields(warehouse_id = %input.warehouse_id))]
    pub async fn create_order(&self, input: CreateOrderInput) -> AppResult<Order> {
        input.validate()?;
        for line in &input.lines {
            validate_positive_quantity(line.ordered_quantity)
                .map_err(|e| AppError::validation("ordered_quantity", e))?;
        }
        validate_unique_lines(input.lines.iter().map(|l| (l.item_id, l.pickup.as_deref())))
            .map_err(|e| AppError::validation("lines", e))?;

        let now = Utc::now();
        let order = self.store.read(|state| {
            state.warehouse(input.warehouse_id)?;
            state.party(PartyKind::Manufacturer, input.manufacturer_id)?;
            if let Some(transporter_id) = input.transporter_id {
                state.party(PartyKind::Transporter, transporter_id)?;
            }

            let lines = input
                .lines
                .iter()
                .map(|line| -> AppResult<OrderLine> {
                    let item = state.item(line.item_id)?;
                    let rate = resolve_rate(
                        state,
                        line.rate,
                        line.item_id,
                        line.pickup.as_deref(),
                        None,
                    )?;
                    Ok(OrderLine {
                        item_id: line.item_id,
                        pickup: line.pickup.clone(),
                        ordered_quantity: line.ordered_quantity,
                        rate,
                        tax: TaxFields::compute(line.ordered_quantity, rate, item.tax_rate),
                    })
                })
                .collect::<AppResult<Vec<_>>>()?;

            Ok::<_, AppError>(Order {
                id: Uuid::new_v4(),
                organization_id: input.organization_id,
                manufacturer_id: input.manufacturer_id,
                warehouse_id: input.warehouse_id,
                transporter_id: input.transporter_id,
                lines,
                status: OrderStatus::Created,
                due_date: input.due_date,
                notes: input.notes.clone(),
                created_at: now,
                updated_at: now,
            })
        })?;

        let keys = pool_keys(&order);
        let locks = self
            .store
            .lock(
                keys.iter()
                    .cloned()
                    .map(LockKey::Pool)
                    .chain(std::iter::once(LockKey::Order(order.id))),
            )
            .await?;

        let mut uow = UnitOfWork::new();
        for (line, key) in order.lines.iter().zip(&keys) {
            uow.adjust(Adjustment::add(key.clone(), Pool::Virtual, line.ordered_quantity))
                .adjust(Adjustment::ensure(key.clone(), Pool::Billed))
                .record(movement(
                    order.organization_id,
                    key,
                    (EndpointKind::Manufacturer, order.manufacturer_id),
                    (EndpointKind::Warehouse, order.warehouse_id),
                    line.ordered_quantity,
                    now,
                ));
        }
        uow.write(Write::Order(order.clone()))
            .notify(Notification::new(
                EndpointKind::Order,
                order.id,
                "Order created",
                format!("Order {} placed with {} line(s)", order.id, order.lines.len()),
            ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(order_id = %order.id, lines = order.lines.len(), "Order created");
        Ok(order)
    }

    pub fn get_order(&self, id: Uuid) -> AppResult<Order> {
        self.store.read(|state| state.order(id).cloned())
    }

    pub fn list_orders(&self, organization_id: Option<Uuid>) -> Vec<Order> {
        self.store.read(|state| {
            let mut orders: Vec<Order> = state
                .orders
                .values()
                .filter(|o| organization_id.map_or(true, |org| o.organization_id == org))
                .cloned()
                .collect();
            orders.sort_by_key(|o| o.created_at);
            orders
        })
    }

    /// Delete an order that has no purchases, withdrawing its virtual stock
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, id: Uuid) -> AppResult<()> {
        let keys = self.store.read(|state| state.order(id).map(pool_keys))?;
        let locks = self
            .store
            .lock(
                keys.into_iter()
                    .map(LockKey::Pool)
                    .chain(std::iter::once(LockKey::Order(id))),
            )
            .await?;

        let order = self.store.read(|state| -> AppResult<Order> {
            let order = state.order(id)?.clone();
            if !state.purchases_for_order(id).is_empty() {
                return Err(AppError::AlreadyFinalized(format!(
                    "Order {} has purchases and cannot be deleted",
                    id
                )));
            }
            Ok(order)
        })?;

        let now = Utc::now();
        let mut uow = UnitOfWork::new();
        for line in &order.lines {
            let key = line_key(&order, line);
            uow.adjust(Adjustment::sub_saturating(
                key.clone(),
                Pool::Virtual,
                line.ordered_quantity,
            ))
            .record(movement(
                order.organization_id,
                &key,
                (EndpointKind::Warehouse, order.warehouse_id),
                (EndpointKind::Manufacturer, order.manufacturer_id),
                line.ordered_quantity,
                now,
            ));
        }
        uow.write(Write::RemoveOrder(id)).notify(Notification::new(
            EndpointKind::Order,
            id,
            "Order deleted",
            format!("Order {} was deleted", id),
        ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(order_id = %id, "Order deleted");
        Ok(())
    }
}

fn line_key(order: &Order, line: &OrderLine) -> PoolKey {
    PoolKey::new(order.warehouse_id, line.item_id, line.pickup.clone())
}

fn pool_keys(order: &Order) -> Vec<PoolKey> {
    order.lines.iter().map(|line| line_key(order, line)).collect()
}
