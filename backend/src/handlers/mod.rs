//! HTTP handlers for the Trade Ledger API

mod booking;
mod catalog;
mod credit_note;
mod health;
mod item_history;
mod order;
mod pricing;
mod purchase;
mod reminder;
mod sale;

pub use booking::*;
pub use catalog::*;
pub use credit_note::*;
pub use health::*;
pub use item_history::*;
pub use order::*;
pub use pricing::*;
pub use purchase::*;
pub use reminder::*;
pub use sale::*;
