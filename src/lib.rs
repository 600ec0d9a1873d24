//! HoopMetrix — premium subscription checkout.

pub mod checkout;
pub mod config;
pub mod error;
pub mod plans;
