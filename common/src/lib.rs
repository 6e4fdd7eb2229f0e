#![allow(clippy::missing_docs_in_private_items, clippy::module_name_repetitions)]

pub mod error;
pub mod shutdown;
pub mod storage;
pub mod utils;
