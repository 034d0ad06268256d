/*
[INPUT]:  HTTP client configuration, API keys and exchange endpoints
[OUTPUT]: Signed HTTP requests and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod signature;
pub mod trade;
pub mod user;

pub use error::{ExchangeError, Result};
pub use signature::RequestSigner;

pub use client::{BitmexClient, ClientConfig, Credentials};
