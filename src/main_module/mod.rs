//! HTTP server assembly: router, health check and shutdown handling

mod health;
mod server;
mod shutdown;

pub use health::*;
pub use server::*;
pub use shutdown::*;
