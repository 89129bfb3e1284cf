//! Shared fixtures for the integration tests
//!
//! Every fixture runs against the in-memory store with recording
//! collaborators, so no database or webhook is needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use shared::{
    Booking, BookingLineInput, CreateBookingInput, CreateItemInput, CreateOrderInput,
    CreateOrderLineInput, CreatePartyInput, CreatePurchaseInput, CreatePurchaseLineInput,
    CreateSaleInput, CreateSaleLineInput, CreateWarehouseInput, DeliveryDetails, Order, PartyKind,
    PoolKey, PoolSnapshot, Purchase, Sale, SetItemPriceInput,
};
use trade_ledger_backend::external::{MemoryHistorySink, MemoryNotifier};
use trade_ledger_backend::services::{
    BookingService, CatalogService, OrderService, PricingService, PurchaseService, SaleService,
};
use trade_ledger_backend::store::{
    LockConfig, MemoryRepository, ShortfallPolicy, Store, StoreSettings,
};
use trade_ledger_backend::AppResult;
use uuid::Uuid;

pub fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

/// One organization with a single item, warehouse, manufacturer and buyer
pub struct Fixture {
    pub store: Arc<Store>,
    pub history: MemoryHistorySink,
    pub notifier: MemoryNotifier,
    pub organization_id: Uuid,
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    pub manufacturer_id: Uuid,
    pub buyer_id: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_policy(ShortfallPolicy::RestoreVirtual).await
    }

    pub async fn with_policy(shortfall_policy: ShortfallPolicy) -> Self {
        let history = MemoryHistorySink::new();
        let notifier = MemoryNotifier::new();
        let settings = StoreSettings {
            locks: LockConfig {
                lock_timeout: Duration::from_secs(5),
                max_attempts: 5,
                ..LockConfig::default()
            },
            shortfall_policy,
        };
        let store = Arc::new(
            Store::open(
                settings,
                Arc::new(MemoryRepository::new()),
                Arc::new(history.clone()),
                Arc::new(notifier.clone()),
            )
            .await
            .unwrap(),
        );

        let organization_id = Uuid::new_v4();
        let catalog = CatalogService::new(store.clone());
        let item_id = catalog
            .create_item(CreateItemInput {
                organization_id,
                name: "Cement bag 50kg".into(),
                hsn_code: Some("2523".into()),
                weight_kg: Some(dec(50)),
                packaging: Some("bag".into()),
                tax_rate: dec(18),
            })
            .await
            .unwrap()
            .id;
        let warehouse_id = catalog
            .create_warehouse(CreateWarehouseInput {
                organization_id,
                name: "Main depot".into(),
                address: None,
            })
            .await
            .unwrap()
            .id;
        let manufacturer_id = catalog
            .create_party(PartyKind::Manufacturer, party(organization_id, "Acme Mills"))
            .await
            .unwrap()
            .id;
        let buyer_id = catalog
            .create_party(PartyKind::Buyer, party(organization_id, "Builder Co"))
            .await
            .unwrap()
            .id;

        PricingService::new(store.clone())
            .set_price(SetItemPriceInput {
                item_id,
                pickup: None,
                rate: dec(10),
            })
            .await
            .unwrap();

        Self {
            store,
            history,
            notifier,
            organization_id,
            item_id,
            warehouse_id,
            manufacturer_id,
            buyer_id,
        }
    }

    pub fn key(&self) -> PoolKey {
        PoolKey::new(self.warehouse_id, self.item_id, None)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        CatalogService::new(self.store.clone())
            .pool_snapshot(self.warehouse_id, self.item_id, None)
            .unwrap()
    }

    pub async fn add_warehouse(&self, name: &str) -> Uuid {
        CatalogService::new(self.store.clone())
            .create_warehouse(CreateWarehouseInput {
                organization_id: self.organization_id,
                name: name.into(),
                address: None,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn add_buyer(&self, name: &str) -> Uuid {
        CatalogService::new(self.store.clone())
            .create_party(PartyKind::Buyer, party(self.organization_id, name))
            .await
            .unwrap()
            .id
    }

    pub async fn order(&self, quantity: i64) -> Order {
        self.order_at(self.warehouse_id, quantity).await
    }

    pub async fn order_at(&self, warehouse_id: Uuid, quantity: i64) -> Order {
        OrderService::new(self.store.clone())
            .create_order(CreateOrderInput {
                organization_id: self.organization_id,
                manufacturer_id: self.manufacturer_id,
                warehouse_id,
                transporter_id: None,
                lines: vec![CreateOrderLineInput {
                    item_id: self.item_id,
                    pickup: None,
                    ordered_quantity: dec(quantity),
                    rate: None,
                }],
                due_date: None,
                notes: None,
            })
            .await
            .unwrap()
    }

    pub async fn purchase(&self, order_id: Uuid, quantity: i64) -> AppResult<Purchase> {
        self.purchase_into(order_id, self.warehouse_id, quantity)
            .await
    }

    pub async fn purchase_into(
        &self,
        order_id: Uuid,
        warehouse_id: Uuid,
        quantity: i64,
    ) -> AppResult<Purchase> {
        PurchaseService::new(self.store.clone())
            .create_purchase(CreatePurchaseInput {
                order_id,
                warehouse_id,
                invoice_number: None,
                lines: vec![CreatePurchaseLineInput {
                    item_id: self.item_id,
                    pickup: None,
                    quantity: dec(quantity),
                    rate: None,
                }],
            })
            .await
    }

    pub fn booking_input(&self, virtual_quantity: i64, billed_quantity: i64) -> CreateBookingInput {
        CreateBookingInput {
            organization_id: self.organization_id,
            warehouse_id: self.warehouse_id,
            buyer_id: self.buyer_id,
            lines: vec![BookingLineInput {
                item_id: self.item_id,
                pickup: None,
                quantity: dec(virtual_quantity + billed_quantity),
                virtual_quantity: dec(virtual_quantity),
                billed_quantity: dec(billed_quantity),
                rate: None,
            }],
            delivery: DeliveryDetails::default(),
            payment_due_date: None,
        }
    }

    pub async fn booking(&self, virtual_quantity: i64, billed_quantity: i64) -> AppResult<Booking> {
        BookingService::new(self.store.clone())
            .create_booking(self.booking_input(virtual_quantity, billed_quantity))
            .await
    }

    pub async fn sale(&self, booking_id: Uuid, quantity: i64) -> AppResult<Sale> {
        SaleService::new(self.store.clone())
            .create_sale(CreateSaleInput {
                organization_id: self.organization_id,
                booking_ids: vec![booking_id],
                lines: vec![CreateSaleLineInput {
                    booking_id,
                    item_id: self.item_id,
                    pickup: None,
                    quantity: dec(quantity),
                    rate: None,
                }],
            })
            .await
    }

    /// Give spawned notification and history tasks a chance to run
    pub async fn settle_notifications(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn party(organization_id: Uuid, name: &str) -> CreatePartyInput {
    CreatePartyInput {
        organization_id,
        name: name.into(),
        email: None,
        phone: None,
        gst_number: None,
    }
}
