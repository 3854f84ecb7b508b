pub mod chat_db;
pub mod database;
pub mod models;
pub mod rest;
pub mod store;

pub use chat_db::ChatDatabase;
pub use rest::RestStore;
pub use store::{MessageStore, ParticipantStore, SqliteStore};
