pub mod models;
pub mod names;
pub mod task;
