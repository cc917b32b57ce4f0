pub mod classifier;
pub mod validator;

pub use classifier::{classify, normalize, Carrier, CarrierDetection};
pub use validator::{validate, PhoneValidation};
