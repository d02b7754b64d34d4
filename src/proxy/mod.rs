// Gateway service module

pub mod agents;
pub mod common;
pub mod handlers;
pub mod mappers;
pub mod middleware;
pub mod routing;
pub mod server;
pub mod upstream;
