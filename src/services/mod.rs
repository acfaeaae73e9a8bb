//! Upload session logic, independent of the concrete HTTP transport.

pub mod gateway;
pub mod progress;
pub mod resolver;
pub mod retry;
pub mod session;
pub mod transmitter;
