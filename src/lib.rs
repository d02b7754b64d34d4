pub mod models;
pub mod proxy;
