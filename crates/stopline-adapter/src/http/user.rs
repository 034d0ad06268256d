/*
[INPUT]:  Configured symbol and API key pair
[OUTPUT]: Position snapshot and open-order list
[POS]:    HTTP layer - account read endpoints
[UPDATE]: When adding new account queries or changing filters
*/

use crate::http::BitmexClient;
use crate::types::{OpenFilter, OpenOrdersQuery, Order, Position, PositionQuery, SymbolFilter};
use reqwest::Method;

impl BitmexClient {
    /// Current position for the configured symbol, if the exchange reports one
    ///
    /// GET /api/v1/position {"filter":{"symbol":..}}
    pub async fn get_position(&self) -> Option<Position> {
        let query = PositionQuery {
            filter: SymbolFilter {
                symbol: self.symbol().to_string(),
            },
        };
        let positions: Vec<Position> = self.request(Method::GET, "position", &query).await;
        positions.into_iter().next()
    }

    /// True when a position with a non-zero entry price is held
    pub async fn has_position(&self) -> bool {
        self.get_position()
            .await
            .is_some_and(|position| position.is_open())
    }

    /// Open orders for the configured symbol
    ///
    /// GET /api/v1/order {"symbol":..,"filter":{"open":true}}
    pub async fn get_orders(&self) -> Vec<Order> {
        let query = OpenOrdersQuery {
            symbol: self.symbol().to_string(),
            filter: OpenFilter { open: true },
        };
        self.request(Method::GET, "order", &query).await
    }

    /// True while `order_id` is still in the open-order list
    pub async fn has_order(&self, order_id: &str) -> bool {
        self.get_orders()
            .await
            .iter()
            .any(|order| order.order_id == order_id)
    }
}
