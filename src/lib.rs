pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod payments;
pub mod phone;
pub mod services;
pub mod store;
