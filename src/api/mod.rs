pub mod account;
pub mod client;
pub mod cloud;
pub mod uploader;
pub mod uploads;
