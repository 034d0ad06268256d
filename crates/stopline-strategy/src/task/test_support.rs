//! In-memory exchange used by the strategy unit tests.

use crate::clock::ManualClock;
use crate::task::{TaskContext, TaskTiming};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use stopline_adapter::{Order, Position, StockCapability};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Place { price: Decimal, value: Decimal },
    Move { order_id: String, price: Decimal, value: Decimal },
    Cancel { order_id: String },
}

#[derive(Debug, Default)]
struct Book {
    orders: Vec<Order>,
    position: Option<Position>,
    calls: Vec<Call>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct MockStock {
    book: Mutex<Book>,
}

impl MockStock {
    pub fn calls(&self) -> Vec<Call> {
        self.book.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.book.lock().unwrap().calls.clear();
    }

    pub fn order_ids(&self) -> Vec<String> {
        let book = self.book.lock().unwrap();
        book.orders.iter().map(|order| order.order_id.clone()).collect()
    }

    /// Simulate an order leaving the book without our involvement.
    pub fn drop_order(&self, order_id: &str) {
        self.book
            .lock()
            .unwrap()
            .orders
            .retain(|order| order.order_id != order_id);
    }

    pub fn open_position(&self, entry: Decimal) {
        self.book.lock().unwrap().position = Some(Position {
            timestamp: "2024-01-01T10:00:00.000Z".to_string(),
            avg_entry_price: Some(entry),
            liquidation_price: Some(entry / Decimal::TWO),
        });
    }

    fn next_order(book: &mut Book, price: Decimal, value: Decimal) -> Order {
        book.next_id += 1;
        let mut order = Order::new(format!("order-{}", book.next_id));
        order.stop_px = Some(price);
        order.order_qty = Some(value);
        book.orders.push(order.clone());
        order
    }
}

#[async_trait]
impl StockCapability for MockStock {
    async fn get_position(&self) -> Option<Position> {
        self.book.lock().unwrap().position.clone()
    }

    async fn get_orders(&self) -> Vec<Order> {
        self.book.lock().unwrap().orders.clone()
    }

    async fn place_order(&self, price: Decimal, value: Decimal) -> Order {
        let mut book = self.book.lock().unwrap();
        book.calls.push(Call::Place { price, value });
        Self::next_order(&mut book, price, value)
    }

    async fn move_order(&self, order_id: &str, price: Decimal, value: Decimal) -> Order {
        let mut book = self.book.lock().unwrap();
        book.calls.push(Call::Move {
            order_id: order_id.to_string(),
            price,
            value,
        });
        book.orders.retain(|order| order.order_id != order_id);
        Self::next_order(&mut book, price, value)
    }

    async fn cancel_order(&self, order_id: &str) -> Vec<Order> {
        let mut book = self.book.lock().unwrap();
        book.calls.push(Call::Cancel {
            order_id: order_id.to_string(),
        });
        book.orders.retain(|order| order.order_id != order_id);
        vec![Order::new(order_id)]
    }

    fn last_sync(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn last_error(&self) -> Option<String> {
        None
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap()
}

pub fn context() -> (TaskContext, Arc<MockStock>, Arc<ManualClock>) {
    let stock = Arc::new(MockStock::default());
    let clock = Arc::new(ManualClock::new(start_time()));
    let ctx = TaskContext::new(stock.clone(), clock.clone(), TaskTiming::default());
    (ctx, stock, clock)
}

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}
