//! Direct-message synchronization client: history loading, optimistic sends
//! and reconciliation against realtime insert events.

pub mod common;
pub mod config;
pub mod network;
pub mod storage;
pub mod sync;
pub mod ui;
