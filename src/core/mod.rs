pub mod config;
pub use config::{AppConfig, Credentials, RetryPolicy};

pub mod error;
pub use error::RelayError;

pub mod fetch;
pub use fetch::{fetch_with_retry, retry};

pub mod sanitize;
pub use sanitize::sanitize;
