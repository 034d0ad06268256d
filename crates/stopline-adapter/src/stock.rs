/*
[INPUT]:  Concrete exchange clients
[OUTPUT]: Narrow async capability used by strategies and the task controller
[POS]:    Abstraction layer - seam between strategies and exchange transport
[UPDATE]: When strategies need a new exchange primitive
*/

use crate::http::BitmexClient;
use crate::types::{Order, Position};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// What a strategy may ask of an exchange.
///
/// Calls never fail: implementations retry internally and expose problems
/// only through [`StockCapability::last_error`].
#[async_trait]
pub trait StockCapability: Send + Sync {
    async fn get_position(&self) -> Option<Position>;

    async fn has_position(&self) -> bool {
        self.get_position()
            .await
            .is_some_and(|position| position.is_open())
    }

    async fn get_orders(&self) -> Vec<Order>;

    async fn has_order(&self, order_id: &str) -> bool {
        self.get_orders()
            .await
            .iter()
            .any(|order| order.order_id == order_id)
    }

    async fn place_order(&self, price: Decimal, value: Decimal) -> Order;

    async fn move_order(&self, order_id: &str, price: Decimal, value: Decimal) -> Order;

    async fn cancel_order(&self, order_id: &str) -> Vec<Order>;

    fn last_sync(&self) -> Option<DateTime<Utc>>;

    fn last_error(&self) -> Option<String>;
}

#[async_trait]
impl StockCapability for BitmexClient {
    async fn get_position(&self) -> Option<Position> {
        BitmexClient::get_position(self).await
    }

    async fn has_position(&self) -> bool {
        BitmexClient::has_position(self).await
    }

    async fn get_orders(&self) -> Vec<Order> {
        BitmexClient::get_orders(self).await
    }

    async fn has_order(&self, order_id: &str) -> bool {
        BitmexClient::has_order(self, order_id).await
    }

    async fn place_order(&self, price: Decimal, value: Decimal) -> Order {
        BitmexClient::place_order(self, price, value).await
    }

    async fn move_order(&self, order_id: &str, price: Decimal, value: Decimal) -> Order {
        BitmexClient::move_order(self, order_id, price, value).await
    }

    async fn cancel_order(&self, order_id: &str) -> Vec<Order> {
        BitmexClient::cancel_order(self, order_id).await
    }

    fn last_sync(&self) -> Option<DateTime<Utc>> {
        BitmexClient::last_sync(self)
    }

    fn last_error(&self) -> Option<String> {
        BitmexClient::last_error(self)
    }
}
