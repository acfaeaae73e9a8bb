pub mod account_handlers;
pub mod record_handlers;
pub mod upload_handlers;
