//! Booking and sale pipeline tests
//!
//! Covers reservation into the sold pools, sale drains under both
//! shortfall policies, booking status derivation and exact reversal.

mod common;

use common::{dec, Fixture};
use shared::{
    BookingLineInput, BookingStatus, CreateSaleInput, CreateSaleLineInput, SaleDrain,
    UpdateBookingInput,
};
use trade_ledger_backend::services::{BookingService, SaleService};
use trade_ledger_backend::store::ShortfallPolicy;
use trade_ledger_backend::AppError;

/// Order 100 and invoice 60: virtual 40, billed 60
async fn stocked(policy: ShortfallPolicy) -> Fixture {
    let fx = Fixture::with_policy(policy).await;
    let order = fx.order(100).await;
    fx.purchase(order.id, 60).await.unwrap();
    fx
}

// ============================================================================
// Bookings
// ============================================================================

#[tokio::test]
async fn test_booking_moves_split_into_sold_pools() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let booking = fx.booking(10, 20).await.unwrap();

    assert_eq!(booking.status, BookingStatus::Created);
    assert_eq!(booking.lines[0].rate, dec(10));

    let snapshot = fx.snapshot();
    assert_eq!(snapshot.virtual_quantity, dec(30));
    assert_eq!(snapshot.billed_quantity, dec(40));
    assert_eq!(snapshot.sold_virtual_quantity, dec(10));
    assert_eq!(snapshot.sold_billed_quantity, dec(20));
    assert_eq!(snapshot.total(), dec(100));
}

#[tokio::test]
async fn test_booking_beyond_stock_rejected() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let before = fx.snapshot();

    match fx.booking(41, 0).await {
        Err(AppError::InsufficientQuantity {
            requested,
            available,
            ..
        }) => {
            assert_eq!(requested, dec(41));
            assert_eq!(available, dec(40));
        }
        other => panic!("expected insufficient quantity, got {other:?}"),
    }

    assert_eq!(fx.snapshot(), before);
    assert!(BookingService::new(fx.store.clone())
        .list_bookings(None)
        .is_empty());
}

#[tokio::test]
async fn test_booking_split_must_cover_quantity() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let mut input = fx.booking_input(5, 5);
    input.lines[0].quantity = dec(11);

    let result = BookingService::new(fx.store.clone())
        .create_booking(input)
        .await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_delete_booking_releases_reservation() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let before = fx.snapshot();
    let booking = fx.booking(10, 20).await.unwrap();

    BookingService::new(fx.store.clone())
        .delete_booking(booking.id)
        .await
        .unwrap();

    let after = fx.snapshot();
    assert_eq!(after.virtual_quantity, before.virtual_quantity);
    assert_eq!(after.billed_quantity, before.billed_quantity);
    assert_eq!(after.sold_virtual_quantity, dec(0));
    assert_eq!(after.sold_billed_quantity, dec(0));
}

#[tokio::test]
async fn test_delete_booking_with_sales_rejected() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let booking = fx.booking(0, 10).await.unwrap();
    fx.sale(booking.id, 4).await.unwrap();

    let result = BookingService::new(fx.store.clone())
        .delete_booking(booking.id)
        .await;
    assert!(matches!(result, Err(AppError::AlreadyFinalized(_))));
}

#[tokio::test]
async fn test_update_booking_lines_rebalances_pools() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let booking = fx.booking(0, 10).await.unwrap();

    let updated = BookingService::new(fx.store.clone())
        .update_booking(
            booking.id,
            UpdateBookingInput {
                lines: Some(vec![BookingLineInput {
                    item_id: fx.item_id,
                    pickup: None,
                    quantity: dec(12),
                    virtual_quantity: dec(4),
                    billed_quantity: dec(8),
                    rate: Some(dec(11)),
                }]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.lines[0].quantity, dec(12));
    assert_eq!(updated.lines[0].rate, dec(11));
    let snapshot = fx.snapshot();
    assert_eq!(snapshot.virtual_quantity, dec(36));
    assert_eq!(snapshot.billed_quantity, dec(52));
    assert_eq!(snapshot.sold_virtual_quantity, dec(4));
    assert_eq!(snapshot.sold_billed_quantity, dec(8));
}

#[tokio::test]
async fn test_update_booking_lines_after_sale_rejected() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let booking = fx.booking(0, 10).await.unwrap();
    fx.sale(booking.id, 2).await.unwrap();

    let result = BookingService::new(fx.store.clone())
        .update_booking(
            booking.id,
            UpdateBookingInput {
                lines: Some(fx.booking_input(0, 5).lines),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::AlreadyFinalized(_))));
}

#[tokio::test]
async fn test_payment_status_transitions() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let bookings = BookingService::new(fx.store.clone());
    let booking = fx.booking(0, 10).await.unwrap();

    let early = bookings
        .update_booking(
            booking.id,
            UpdateBookingInput {
                status: Some(BookingStatus::PaymentPending),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(early, Err(AppError::Validation { .. })));

    fx.sale(booking.id, 10).await.unwrap();
    assert_eq!(
        bookings.get_booking(booking.id).unwrap().status,
        BookingStatus::FullySold
    );

    for next in [BookingStatus::PaymentPending, BookingStatus::Completed] {
        let updated = bookings
            .update_booking(
                booking.id,
                UpdateBookingInput {
                    status: Some(next),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, next);
    }

    let backwards = bookings
        .update_booking(
            booking.id,
            UpdateBookingInput {
                status: Some(BookingStatus::FullySold),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(backwards, Err(AppError::Validation { .. })));
}

// ============================================================================
// Sales
// ============================================================================

#[tokio::test]
async fn test_sale_drains_sold_billed_first() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let bookings = BookingService::new(fx.store.clone());
    let booking = fx.booking(0, 20).await.unwrap();

    let sale = fx.sale(booking.id, 15).await.unwrap();
    assert_eq!(
        sale.lines[0].drain,
        SaleDrain {
            from_sold_billed: dec(15),
            shortfall: dec(0),
            restored_virtual: dec(0),
        }
    );
    assert_eq!(fx.snapshot().sold_billed_quantity, dec(5));
    assert_eq!(
        bookings.get_booking(booking.id).unwrap().status,
        BookingStatus::PartiallySold
    );

    fx.sale(booking.id, 5).await.unwrap();
    assert_eq!(
        bookings.get_booking(booking.id).unwrap().status,
        BookingStatus::FullySold
    );

    let again = fx.sale(booking.id, 1).await;
    assert!(matches!(again, Err(AppError::AlreadyFinalized(_))));
}

#[tokio::test]
async fn test_over_sale_rejected() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let booking = fx.booking(0, 20).await.unwrap();
    fx.sale(booking.id, 12).await.unwrap();
    let before = fx.snapshot();

    match fx.sale(booking.id, 9).await {
        Err(AppError::OverSale {
            booked,
            previously_sold,
            requested,
            ..
        }) => {
            assert_eq!(booked, dec(20));
            assert_eq!(previously_sold, dec(12));
            assert_eq!(requested, dec(9));
        }
        other => panic!("expected over-sale, got {other:?}"),
    }
    assert_eq!(fx.snapshot(), before);
}

#[tokio::test]
async fn test_shortfall_restores_virtual_by_default() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let booking = fx.booking(10, 0).await.unwrap();

    let sale = fx.sale(booking.id, 10).await.unwrap();
    assert_eq!(
        sale.lines[0].drain,
        SaleDrain {
            from_sold_billed: dec(0),
            shortfall: dec(10),
            restored_virtual: dec(10),
        }
    );

    let snapshot = fx.snapshot();
    assert_eq!(snapshot.virtual_quantity, dec(40));
    assert_eq!(snapshot.billed_quantity, dec(50));
    assert_eq!(snapshot.sold_virtual_quantity, dec(0));
    // Ordered minus sold
    assert_eq!(snapshot.total(), dec(90));
}

#[tokio::test]
async fn test_shortfall_drain_only() {
    let fx = stocked(ShortfallPolicy::DrainOnly).await;
    let booking = fx.booking(10, 0).await.unwrap();

    let sale = fx.sale(booking.id, 10).await.unwrap();
    assert_eq!(sale.lines[0].drain.restored_virtual, dec(0));

    let snapshot = fx.snapshot();
    assert_eq!(snapshot.virtual_quantity, dec(30));
    assert_eq!(snapshot.billed_quantity, dec(50));
    assert_eq!(snapshot.sold_virtual_quantity, dec(0));
}

#[tokio::test]
async fn test_shortfall_without_billed_stock_fails() {
    let fx = Fixture::new().await;
    fx.order(10).await;
    let booking = fx.booking(10, 0).await.unwrap();
    let before = fx.snapshot();

    let result = fx.sale(booking.id, 10).await;
    assert!(matches!(result, Err(AppError::InsufficientQuantity { .. })));
    assert_eq!(fx.snapshot(), before);
    assert!(SaleService::new(fx.store.clone()).list_sales(None).is_empty());
}

#[tokio::test]
async fn test_delete_sale_reverses_drains() {
    for policy in [ShortfallPolicy::RestoreVirtual, ShortfallPolicy::DrainOnly] {
        let fx = stocked(policy).await;
        let booking = fx.booking(6, 4).await.unwrap();
        let before = fx.snapshot();

        let sale = fx.sale(booking.id, 10).await.unwrap();
        SaleService::new(fx.store.clone())
            .delete_sale(sale.id)
            .await
            .unwrap();

        assert_eq!(fx.snapshot(), before, "policy {policy:?}");
        let booking = BookingService::new(fx.store.clone())
            .get_booking(booking.id)
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Created);
    }
}

#[tokio::test]
async fn test_sale_across_bookings_of_different_buyers() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let first = fx.booking(0, 5).await.unwrap();
    let mut input = fx.booking_input(0, 5);
    input.buyer_id = fx.add_buyer("Other Builder").await;
    let second = BookingService::new(fx.store.clone())
        .create_booking(input)
        .await
        .unwrap();

    let line = |booking_id| CreateSaleLineInput {
        booking_id,
        item_id: fx.item_id,
        pickup: None,
        quantity: dec(1),
        rate: None,
    };
    let result = SaleService::new(fx.store.clone())
        .create_sale(CreateSaleInput {
            organization_id: fx.organization_id,
            booking_ids: vec![first.id, second.id],
            lines: vec![line(first.id), line(second.id)],
        })
        .await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_sale_across_two_bookings() {
    let fx = stocked(ShortfallPolicy::RestoreVirtual).await;
    let bookings = BookingService::new(fx.store.clone());
    let first = fx.booking(0, 5).await.unwrap();
    let second = fx.booking(0, 8).await.unwrap();

    let sale = SaleService::new(fx.store.clone())
        .create_sale(CreateSaleInput {
            organization_id: fx.organization_id,
            booking_ids: vec![first.id, second.id],
            lines: vec![
                CreateSaleLineInput {
                    booking_id: first.id,
                    item_id: fx.item_id,
                    pickup: None,
                    quantity: dec(5),
                    rate: None,
                },
                CreateSaleLineInput {
                    booking_id: second.id,
                    item_id: fx.item_id,
                    pickup: None,
                    quantity: dec(3),
                    rate: Some(dec(12)),
                },
            ],
        })
        .await
        .unwrap();

    assert_eq!(sale.buyer_id, fx.buyer_id);
    assert_eq!(sale.lines[1].rate, dec(12));
    assert_eq!(fx.snapshot().sold_billed_quantity, dec(5));
    assert_eq!(
        bookings.get_booking(first.id).unwrap().status,
        BookingStatus::FullySold
    );
    assert_eq!(
        bookings.get_booking(second.id).unwrap().status,
        BookingStatus::PartiallySold
    );
}
