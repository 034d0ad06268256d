/*
[INPUT]:  Strategy intents (price, signed quantity, order id)
[OUTPUT]: JSON request bodies for exchange endpoints
[POS]:    Data layer - request payload definitions
[UPDATE]: When request schemas change
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{ExecInst, OrderType, TimeInForce};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFilter {
    pub symbol: String,
}

/// GET position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionQuery {
    pub filter: SymbolFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenFilter {
    pub open: bool,
}

/// GET order (open orders only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrdersQuery {
    pub symbol: String,
    pub filter: OpenFilter,
}

/// POST order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceStopOrderRequest {
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(with = "rust_decimal::serde::float")]
    pub stop_px: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_qty: Decimal,
    pub time_in_force: TimeInForce,
    pub exec_inst: ExecInst,
}

impl PlaceStopOrderRequest {
    pub fn new(symbol: impl Into<String>, stop_px: Decimal, order_qty: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            order_type: OrderType::Stop,
            stop_px,
            order_qty,
            time_in_force: TimeInForce::GoodTillCancel,
            exec_inst: ExecInst::LastPrice,
        }
    }
}

/// PUT order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub stop_px: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_qty: Decimal,
}

/// DELETE order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
}
