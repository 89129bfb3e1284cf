//! Purchase service
//!
//! A purchase invoices part of an order: the quantity leaves the virtual
//! pool at the order's warehouse and enters the billed pool at the
//! invoicing warehouse. The order's status is recomputed from every
//! purchase in the same transaction.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    derive_order_status, purchased_quantity, validate_positive_quantity, validate_unique_lines,
    CreatePurchaseInput, EndpointKind, Order, OrderStatus, Pool, PoolKey, Purchase, PurchaseLine,
    TaxFields,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::Notification;
use crate::services::item_history::movement;
use crate::services::pricing::resolve_rate;
use crate::store::{Adjustment, LockKey, Store, UnitOfWork, Write};

/// Purchase lifecycle service
#[derive(Clone)]
pub struct PurchaseService {
    store: Arc<Store>,
}

impl PurchaseService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Invoice quantities against an order
    #[tracing::instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn create_purchase(&self, input: CreatePurchaseInput) -> AppResult<Purchase> {
        input.validate()?;
        for line in &input.lines {
            validate_positive_quantity(line.quantity)
                .map_err(|e| AppError::validation("quantity", e))?;
        }
        validate_unique_lines(input.lines.iter().map(|l| (l.item_id, l.pickup.as_deref())))
            .map_err(|e| AppError::validation("lines", e))?;

        let order_warehouse_id = self.store.read(|state| -> AppResult<Uuid> {
            state.warehouse(input.warehouse_id)?;
            Ok(state.order(input.order_id)?.warehouse_id)
        })?;

        let purchase_id = Uuid::new_v4();
        let mut keys = vec![
            LockKey::Order(input.order_id),
            LockKey::Purchase(purchase_id),
        ];
        for line in &input.lines {
            keys.push(LockKey::Pool(PoolKey::new(
                order_warehouse_id,
                line.item_id,
                line.pickup.clone(),
            )));
            keys.push(LockKey::Pool(PoolKey::new(
                input.warehouse_id,
                line.item_id,
                line.pickup.clone(),
            )));
        }
        let locks = self.store.lock(keys).await?;

        let now = Utc::now();
        let (order, purchase, status) =
            self.store
                .read(|state| -> AppResult<(Order, Purchase, OrderStatus)> {
                    let order = state.order(input.order_id)?.clone();
                    let mut purchases = state.purchases_for_order(order.id);

                    let mut lines = Vec::with_capacity(input.lines.len());
                    for line in &input.lines {
                        let order_line = order
                            .line(line.item_id, line.pickup.as_deref())
                            .ok_or_else(|| {
                                AppError::validation(
                                    "lines",
                                    format!("Item {} is not on order {}", line.item_id, order.id),
                                )
                            })?;

                        let previously_purchased = purchased_quantity(
                            &purchases,
                            order.id,
                            line.item_id,
                            line.pickup.as_deref(),
                        );
                        if previously_purchased + line.quantity > order_line.ordered_quantity {
                            return Err(AppError::OverPurchase {
                                order_id: order.id,
                                item_id: line.item_id,
                                pickup: line.pickup.clone(),
                                ordered: order_line.ordered_quantity,
                                previously_purchased,
                                requested: line.quantity,
                            });
                        }

                        let item = state.item(line.item_id)?;
                        let rate = resolve_rate(
                            state,
                            line.rate,
                            line.item_id,
                            line.pickup.as_deref(),
                            Some(order_line.rate),
                        )?;
                        lines.push(PurchaseLine {
                            item_id: line.item_id,
                            pickup: line.pickup.clone(),
                            quantity: line.quantity,
                            rate,
                            tax: TaxFields::compute(line.quantity, rate, item.tax_rate),
                        });
                    }

                    // Line checks run first so a billed order reports the over-purchased line
                    if derive_order_status(&order, &purchases) == OrderStatus::Billed {
                        return Err(AppError::AlreadyFinalized(format!(
                            "Order {} is already billed",
                            order.id
                        )));
                    }

                    let purchase = Purchase {
                        id: purchase_id,
                        organization_id: order.organization_id,
                        order_id: order.id,
                        warehouse_id: input.warehouse_id,
                        invoice_number: input.invoice_number.clone(),
                        lines,
                        created_at: now,
                    };
                    purchases.push(purchase.clone());
                    let status = derive_order_status(&order, &purchases);

                    Ok((order, purchase, status))
                })?;

        let mut uow = UnitOfWork::new();
        for line in &purchase.lines {
            let (from, to) = pool_pair(&order, &purchase, line);
            uow.adjust(Adjustment::sub(from, Pool::Virtual, line.quantity))
                .adjust(Adjustment::add(to.clone(), Pool::Billed, line.quantity))
                .record(movement(
                    order.organization_id,
                    &to,
                    (EndpointKind::Order, order.id),
                    (EndpointKind::Warehouse, purchase.warehouse_id),
                    line.quantity,
                    now,
                ));
        }
        uow.write(Write::Purchase(purchase.clone()))
            .write(Write::Order(Order {
                status,
                updated_at: now,
                ..order.clone()
            }))
            .notify(Notification::new(
                EndpointKind::Purchase,
                purchase.id,
                "Purchase recorded",
                format!("Order {} is now {}", order.id, status),
            ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(
            purchase_id = %purchase.id,
            order_id = %order.id,
            lines = purchase.lines.len(),
            status = %status,
            "Purchase created"
        );
        Ok(purchase)
    }

    pub fn get_purchase(&self, id: Uuid) -> AppResult<Purchase> {
        self.store.read(|state| state.purchase(id).cloned())
    }

    pub fn list_purchases(&self, order_id: Option<Uuid>) -> Vec<Purchase> {
        self.store.read(|state| {
            let mut purchases: Vec<Purchase> = state
                .purchases
                .values()
                .filter(|p| order_id.map_or(true, |id| p.order_id == id))
                .cloned()
                .collect();
            purchases.sort_by_key(|p| p.created_at);
            purchases
        })
    }

    /// Delete a purchase, reversing its pool movement
    #[tracing::instrument(skip(self))]
    pub async fn delete_purchase(&self, id: Uuid) -> AppResult<()> {
        let (order_id, keys) = self.store.read(|state| -> AppResult<(Uuid, Vec<LockKey>)> {
            let purchase = state.purchase(id)?;
            let order = state.order(purchase.order_id)?;
            let keys = purchase
                .lines
                .iter()
                .flat_map(|line| {
                    let (from, to) = pool_pair(order, purchase, line);
                    [LockKey::Pool(from), LockKey::Pool(to)]
                })
                .collect();
            Ok((order.id, keys))
        })?;

        let locks = self
            .store
            .lock(
                keys.into_iter()
                    .chain([LockKey::Order(order_id), LockKey::Purchase(id)]),
            )
            .await?;

        let (order, purchase, status) =
            self.store
                .read(|state| -> AppResult<(Order, Purchase, OrderStatus)> {
                    let purchase = state.purchase(id)?.clone();
                    let order = state.order(purchase.order_id)?.clone();
                    let remaining: Vec<Purchase> = state
                        .purchases_for_order(order.id)
                        .into_iter()
                        .filter(|p| p.id != id)
                        .collect();
                    let status = derive_order_status(&order, &remaining);
                    Ok((order, purchase, status))
                })?;

        let now = Utc::now();
        let mut uow = UnitOfWork::new();
        for line in &purchase.lines {
            let (from, to) = pool_pair(&order, &purchase, line);
            uow.adjust(Adjustment::sub(to.clone(), Pool::Billed, line.quantity))
                .adjust(Adjustment::add(from, Pool::Virtual, line.quantity))
                .record(movement(
                    order.organization_id,
                    &to,
                    (EndpointKind::Warehouse, purchase.warehouse_id),
                    (EndpointKind::Order, order.id),
                    line.quantity,
                    now,
                ));
        }
        uow.write(Write::RemovePurchase(id))
            .write(Write::Order(Order {
                status,
                updated_at: now,
                ..order.clone()
            }))
            .notify(Notification::new(
                EndpointKind::Purchase,
                id,
                "Purchase deleted",
                format!("Order {} is now {}", order.id, status),
            ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(purchase_id = %id, order_id = %order.id, status = %status, "Purchase deleted");
        Ok(())
    }
}

/// Pool keys a purchase line moves between: order warehouse, invoicing warehouse
fn pool_pair(order: &Order, purchase: &Purchase, line: &PurchaseLine) -> (PoolKey, PoolKey) {
    (
        PoolKey::new(order.warehouse_id, line.item_id, line.pickup.clone()),
        PoolKey::new(purchase.warehouse_id, line.item_id, line.pickup.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_pool_pair_spans_both_warehouses() {
        let order_warehouse = Uuid::from_u128(1);
        let invoice_warehouse = Uuid::from_u128(2);
        let item = Uuid::from_u128(3);
        let line = PurchaseLine {
            item_id: item,
            pickup: Some("gate".into()),
            quantity: Decimal::ONE,
            rate: Decimal::ONE,
            tax: TaxFields::default(),
        };
        let order = Order {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            manufacturer_id: Uuid::nil(),
            warehouse_id: order_warehouse,
            transporter_id: None,
            lines: vec![],
            status: OrderStatus::Created,
            due_date: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let purchase = Purchase {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            order_id: Uuid::nil(),
            warehouse_id: invoice_warehouse,
            invoice_number: None,
            lines: vec![line.clone()],
            created_at: Utc::now(),
        };

        let (from, to) = pool_pair(&order, &purchase, &line);
        assert_eq!(from.warehouse_id, order_warehouse);
        assert_eq!(to.warehouse_id, invoice_warehouse);
        assert_eq!(to.pickup.as_deref(), Some("gate"));
    }
}
