//! Business logic services for the Trade Ledger platform

pub mod booking;
pub mod catalog;
pub mod credit_note;
pub mod item_history;
pub mod order;
pub mod pricing;
pub mod purchase;
pub mod reminder;
pub mod sale;

pub use booking::BookingService;
pub use catalog::CatalogService;
pub use credit_note::CreditNoteService;
pub use item_history::ItemHistoryService;
pub use order::OrderService;
pub use pricing::PricingService;
pub use purchase::PurchaseService;
pub use reminder::ReminderService;
pub use sale::SaleService;
