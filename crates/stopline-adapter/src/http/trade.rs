/*
[INPUT]:  Stop price, signed quantity and order ids
[OUTPUT]: Exchange order acknowledgements
[POS]:    HTTP layer - order mutation endpoints
[UPDATE]: When adding new trading endpoints or changing order flow
*/

use crate::http::BitmexClient;
use crate::types::{AmendOrderRequest, CancelOrderRequest, Order, PlaceStopOrderRequest};
use reqwest::Method;
use rust_decimal::Decimal;

impl BitmexClient {
    /// Place a good-till-cancel stop order triggered on last price
    ///
    /// POST /api/v1/order
    /// Positive `value` buys, negative sells.
    pub async fn place_order(&self, price: Decimal, value: Decimal) -> Order {
        let req = PlaceStopOrderRequest::new(self.symbol(), price, value);
        let order: Order = self.request(Method::POST, "order", &req).await;
        tracing::info!(order_id = %order.order_id, price = %price, value = %value, "stop order placed");
        order
    }

    /// Replace stop price and quantity of a resting order
    ///
    /// PUT /api/v1/order
    /// The returned order carries the id to track from now on.
    pub async fn move_order(&self, order_id: &str, price: Decimal, value: Decimal) -> Order {
        let req = AmendOrderRequest {
            order_id: order_id.to_string(),
            stop_px: price,
            order_qty: value,
        };
        let order: Order = self.request(Method::PUT, "order", &req).await;
        tracing::info!(
            previous_order_id = order_id,
            order_id = %order.order_id,
            price = %price,
            value = %value,
            "stop order moved"
        );
        order
    }

    /// Cancel a resting order
    ///
    /// DELETE /api/v1/order
    pub async fn cancel_order(&self, order_id: &str) -> Vec<Order> {
        let req = CancelOrderRequest {
            order_id: order_id.to_string(),
        };
        let orders: Vec<Order> = self.request(Method::DELETE, "order", &req).await;
        for order in orders.iter().filter(|order| order.error.is_some()) {
            tracing::warn!(
                order_id = %order.order_id,
                error = order.error.as_deref().unwrap_or_default(),
                "exchange reported cancel error"
            );
        }
        tracing::info!(order_id, "stop order cancelled");
        orders
    }
}
