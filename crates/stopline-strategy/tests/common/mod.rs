/*
[INPUT]:  Test scenarios
[OUTPUT]: In-memory exchange, fixed clock and controller fixtures
[POS]:    Integration test support
[UPDATE]: When StockCapability gains methods
*/

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stopline_adapter::{Order, Position, StockCapability};
use stopline_strategy::{ManualClock, TaskContext, TaskController, TaskTiming};

pub const PASSWORD: &str = "test-password";

#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeCall {
    Place { price: Decimal, value: Decimal },
    Move { order_id: String, price: Decimal, value: Decimal },
    Cancel { order_id: String },
}

#[derive(Debug, Default)]
struct Book {
    orders: Vec<Order>,
    position: Option<Position>,
    calls: Vec<ExchangeCall>,
    next_id: u64,
    last_error: Option<String>,
}

/// Exchange double that keeps resting orders in memory.
#[derive(Debug, Default)]
pub struct MockStock {
    book: Mutex<Book>,
}

impl MockStock {
    pub fn calls(&self) -> Vec<ExchangeCall> {
        self.book.lock().unwrap().calls.clone()
    }

    pub fn order_ids(&self) -> Vec<String> {
        let book = self.book.lock().unwrap();
        book.orders.iter().map(|order| order.order_id.clone()).collect()
    }

    pub fn fill_order(&self, order_id: &str) {
        self.book
            .lock()
            .unwrap()
            .orders
            .retain(|order| order.order_id != order_id);
    }

    pub fn open_position(&self, entry: i64) {
        self.book.lock().unwrap().position = Some(Position {
            timestamp: "2024-01-01T10:00:00.000Z".to_string(),
            avg_entry_price: Some(Decimal::from(entry)),
            liquidation_price: Some(Decimal::from(entry / 2)),
        });
    }

    pub fn set_last_error(&self, error: &str) {
        self.book.lock().unwrap().last_error = Some(error.to_string());
    }

    fn rest(book: &mut Book, price: Decimal, value: Decimal) -> Order {
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
        book.calls.push(ExchangeCall::Place { price, value });
        Self::rest(&mut book, price, value)
    }

    async fn move_order(&self, order_id: &str, price: Decimal, value: Decimal) -> Order {
        let mut book = self.book.lock().unwrap();
        book.calls.push(ExchangeCall::Move {
            order_id: order_id.to_string(),
            price,
            value,
        });
        book.orders.retain(|order| order.order_id != order_id);
        Self::rest(&mut book, price, value)
    }

    async fn cancel_order(&self, order_id: &str) -> Vec<Order> {
        let mut book = self.book.lock().unwrap();
        book.calls.push(ExchangeCall::Cancel {
            order_id: order_id.to_string(),
        });
        book.orders.retain(|order| order.order_id != order_id);
        vec![Order::new(order_id)]
    }

    fn last_sync(&self) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
    }

    fn last_error(&self) -> Option<String> {
        self.book.lock().unwrap().last_error.clone()
    }
}

pub struct Fixture {
    pub stock: Arc<MockStock>,
    pub clock: Arc<ManualClock>,
    pub controller: Arc<TaskController>,
}

pub fn fixture() -> Fixture {
    let stock = Arc::new(MockStock::default());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap(),
    ));
    let ctx = TaskContext::new(stock.clone(), clock.clone(), TaskTiming::default());
    let controller = Arc::new(TaskController::new(ctx).with_status_delay(Duration::ZERO));
    Fixture {
        stock,
        clock,
        controller,
    }
}

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

/// Let freshly spawned task loops place their orders.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
