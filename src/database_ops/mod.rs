pub mod db;
pub mod memory_store;
pub mod reconcile;
pub mod store;
