/// Portal Signup - patient portal signup wizard engine
///
/// Core library providing the multi-step signup form state machine,
/// per-step validation rules, and the verification code resend gate.

pub mod cli;
pub mod config;
pub mod core;


pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
