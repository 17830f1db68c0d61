pub mod controller;
pub mod listener;
mod logging;
pub mod server;
pub mod smtp;
pub mod traits;

pub use tracing;
