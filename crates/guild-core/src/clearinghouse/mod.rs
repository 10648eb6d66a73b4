//! Order spool, order table and the clearinghouse worker.
//!
//! ```text
//!   request ──spool──▶ OrderBook (Spooled)
//!      │
//!      └──execute──▶ OrderQueue ──▶ worker ──settle──▶ users / markets
//!                    (bounded)      (single)
//! ```
//!
//! - [`reference`] -- The human-readable order reference and its parser
//! - [`book`] -- The shared order table, lifecycle and dead letters
//! - [`settle`] -- Settlement of one order against the store
//! - [`worker`] -- The consumer task, its queue and shutdown handle

pub mod book;
pub mod reference;
pub mod settle;
pub mod worker;

pub use book::{DeadLetter, OrderBook};
pub use reference::{OrderReference, ReferenceError};
pub use settle::{ClearinghouseDeps, Outcome};
pub use worker::{ClearinghouseHandle, OrderQueue, WorkerReport, spawn};
