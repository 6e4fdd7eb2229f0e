pub mod db;
pub mod snapshot;
pub mod store;
pub mod types;
