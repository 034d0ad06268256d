/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public exchange adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod http;
pub mod stock;
pub mod types;

// Re-export commonly used types from http
pub use http::{
    BitmexClient,
    ClientConfig,
    Credentials,
    ExchangeError,
    RequestSigner,
    Result,
};

pub use stock::StockCapability;

// Re-export all types
pub use types::*;
