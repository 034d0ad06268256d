/*
[INPUT]:  Exchange REST schema definitions and serde requirements
[OUTPUT]: Typed position and order snapshots
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::OrderStatus;

/// Exchange-reported position snapshot
///
/// The exchange returns a row even when flat; in that case the entry price is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub avg_entry_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub liquidation_price: Option<Decimal>,
}

impl Position {
    /// True when the exchange reports an entry price, i.e. a position is held
    pub fn is_open(&self) -> bool {
        self.avg_entry_price.is_some_and(|price| !price.is_zero())
    }
}

pub type OrderId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "orderID")]
    pub order_id: OrderId,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub stop_px: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub order_qty: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ord_status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Order {
    pub fn new(order_id: impl Into<OrderId>) -> Self {
        Self {
            order_id: order_id.into(),
            price: None,
            stop_px: None,
            order_qty: None,
            ord_status: None,
            error: None,
        }
    }
}
