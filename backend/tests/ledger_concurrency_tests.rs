//! Ledger conservation and concurrency tests
//!
//! - Parallel bookings and sales never drive a pool negative
//! - Conservation: pools always total ordered quantity minus sold quantity

mod common;

use common::{dec, Fixture};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    CreatePurchaseInput, CreatePurchaseLineInput, CreateSaleInput, CreateSaleLineInput, Pool,
};
use trade_ledger_backend::services::{BookingService, PurchaseService, SaleService};
use trade_ledger_backend::AppError;

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_bookings_never_overdraw() {
    let fx = Fixture::new().await;
    let order = fx.order(50).await;
    fx.purchase(order.id, 50).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = BookingService::new(fx.store.clone());
        let input = fx.booking_input(0, 5);
        handles.push(tokio::spawn(async move { service.create_booking(input).await }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(AppError::InsufficientQuantity { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(accepted, 10);
    let snapshot = fx.snapshot();
    assert_eq!(snapshot.billed_quantity, dec(0));
    assert_eq!(snapshot.sold_billed_quantity, dec(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_sales_respect_booking() {
    let fx = Fixture::new().await;
    let order = fx.order(20).await;
    fx.purchase(order.id, 20).await.unwrap();
    let booking = fx.booking(0, 20).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = SaleService::new(fx.store.clone());
        let input = CreateSaleInput {
            organization_id: fx.organization_id,
            booking_ids: vec![booking.id],
            lines: vec![CreateSaleLineInput {
                booking_id: booking.id,
                item_id: fx.item_id,
                pickup: None,
                quantity: dec(3),
                rate: None,
            }],
        };
        handles.push(tokio::spawn(async move { service.create_sale(input).await }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(AppError::OverSale { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(accepted, 6);
    assert_eq!(fx.snapshot().sold_billed_quantity, dec(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_purchases_respect_order() {
    let fx = Fixture::new().await;
    let order = fx.order(30).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let store = fx.store.clone();
        let input = CreatePurchaseInput {
            order_id: order.id,
            warehouse_id: fx.warehouse_id,
            invoice_number: None,
            lines: vec![CreatePurchaseLineInput {
                item_id: fx.item_id,
                pickup: None,
                quantity: dec(4),
                rate: None,
            }],
        };
        handles.push(tokio::spawn(async move {
            PurchaseService::new(store).create_purchase(input).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 7);
    let snapshot = fx.snapshot();
    assert_eq!(snapshot.billed_quantity, dec(28));
    assert_eq!(snapshot.virtual_quantity, dec(2));
}

// ============================================================================
// Conservation
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Order(i64),
    Purchase(i64),
    DeletePurchase,
    Book(i64, i64),
    Sell(i64),
    DeleteSale,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..=40).prop_map(Op::Order),
        (1i64..=30).prop_map(Op::Purchase),
        Just(Op::DeletePurchase),
        ((0i64..=10), (0i64..=10)).prop_map(|(v, b)| Op::Book(v, b)),
        (1i64..=10).prop_map(Op::Sell),
        Just(Op::DeleteSale),
    ]
}

/// Apply a random operation sequence, returning ordered and sold totals
async fn run(fx: &Fixture, ops: &[Op]) -> (Decimal, Decimal) {
    let store = fx.store.clone();
    let mut orders = Vec::new();
    let mut purchases = Vec::new();
    let mut bookings = Vec::new();
    let mut sales = Vec::new();

    for op in ops {
        match op {
            Op::Order(q) => orders.push(fx.order(*q).await),
            Op::Purchase(q) => {
                if let Some(order) = orders.last() {
                    if let Ok(p) = fx.purchase(order.id, *q).await {
                        purchases.push(p.id);
                    }
                }
            }
            Op::DeletePurchase => {
                if let Some(id) = purchases.last().copied() {
                    if PurchaseService::new(store.clone())
                        .delete_purchase(id)
                        .await
                        .is_ok()
                    {
                        purchases.pop();
                    }
                }
            }
            Op::Book(v, b) if v + b > 0 => {
                if let Ok(booking) = fx.booking(*v, *b).await {
                    bookings.push(booking.id);
                }
            }
            Op::Book(..) => {}
            Op::Sell(q) => {
                if let Some(id) = bookings.last().copied() {
                    if let Ok(sale) = fx.sale(id, *q).await {
                        sales.push(sale);
                    }
                }
            }
            Op::DeleteSale => {
                if let Some(sale) = sales.last() {
                    if SaleService::new(store.clone())
                        .delete_sale(sale.id)
                        .await
                        .is_ok()
                    {
                        sales.pop();
                    }
                }
            }
        }
    }

    let ordered = orders
        .iter()
        .flat_map(|o| o.lines.iter())
        .map(|l| l.ordered_quantity)
        .sum();
    let sold = sales
        .iter()
        .flat_map(|s| s.lines.iter())
        .map(|l| l.quantity)
        .sum();
    (ordered, sold)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Pools total ordered minus sold and never go negative
    #[test]
    fn prop_conservation(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let (fx, ordered, sold) = tokio_test::block_on(async {
            let fx = Fixture::new().await;
            let (ordered, sold) = run(&fx, &ops).await;
            (fx, ordered, sold)
        });

        let snapshot = fx.snapshot();
        for pool in [Pool::Virtual, Pool::Billed, Pool::SoldVirtual, Pool::SoldBilled] {
            prop_assert!(snapshot.get(pool) >= Decimal::ZERO, "{} went negative", pool);
        }
        prop_assert_eq!(snapshot.total(), ordered - sold);
    }
}

