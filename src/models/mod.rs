//! Data carried between the client and the upload API.
//!
//! Record types serialize to the server's camelCase JSON via `serde`;
//! chunk and event types are client-side only.

pub mod account;
pub mod chunk;
pub mod cloud;
pub mod event;
pub mod upload;
pub mod wire_date;
