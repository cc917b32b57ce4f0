pub mod afrikpay;
pub mod mtn_momo;

pub use afrikpay::{AfrikpayConfig, AfrikpayProvider};
pub use mtn_momo::{MomoConfig, MomoProvider, TokenScope};
