pub mod client;
pub mod fallback;
pub mod manager;
pub mod sanitize;
pub mod storage;
pub mod types;
