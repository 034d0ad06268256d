/*
[INPUT]:  Exchange capability, clock and polling cadence
[OUTPUT]: Strategy task abstraction, shared parameter types and explain projections
[POS]:    Execution layer - common ground for every strategy state machine
[UPDATE]: When adding a strategy kind or changing the task contract
*/

pub mod bart_drop;
pub mod line_break;

pub use bart_drop::{BartDropExplain, BartDropParams, BartDropTask, ExitValueParams};
pub use line_break::{LineBreakExplain, LineBreakParams, LineBreakTask};

use crate::clock::Clock;
use crate::error::{Result, TaskError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use stopline_adapter::{Order, StockCapability};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Explicit discriminant used for uniqueness checks and lookup by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    LineBreak,
    BartDrop,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::LineBreak => "LineBreak",
            StrategyKind::BartDrop => "BartDrop",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Quantity sign of an order that opens a position on this side.
    pub fn signed(&self, value: Decimal) -> Decimal {
        match self {
            Side::Long => value,
            Side::Short => -value,
        }
    }

    /// Parse the optional request field, mapping anything else to a validation error.
    pub fn parse_param(raw: Option<&str>) -> Result<Self> {
        raw.and_then(|raw| raw.parse().ok())
            .ok_or_else(|| TaskError::invalid_params("Invalid side"))
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    pub fn parse_param(raw: Option<&str>) -> Result<Self> {
        raw.and_then(|raw| raw.parse().ok())
            .ok_or_else(|| TaskError::invalid_params("Invalid direction"))
    }
}

impl FromStr for MoveDirection {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw {
            "up" => Ok(MoveDirection::Up),
            "down" => Ok(MoveDirection::Down),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Lifecycle position of a task. Every variant after `Polling` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Created,
    Polling,
    Cancelled,
    Filled,
    Orphaned,
    Exited,
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskPhase::Cancelled | TaskPhase::Filled | TaskPhase::Orphaned | TaskPhase::Exited
        )
    }
}

/// Polling cadence shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub poll_interval: Duration,
}

impl Default for TaskTiming {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Everything a task borrows from its surroundings.
#[derive(Clone)]
pub struct TaskContext {
    pub stock: Arc<dyn StockCapability>,
    pub clock: Arc<dyn Clock>,
    pub timing: TaskTiming,
}

impl TaskContext {
    pub fn new(stock: Arc<dyn StockCapability>, clock: Arc<dyn Clock>, timing: TaskTiming) -> Self {
        Self {
            stock,
            clock,
            timing,
        }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("clock", &self.clock)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

/// Read-only projection of a task for status reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TaskExplain {
    LineBreak(LineBreakExplain),
    BartDrop(BartDropExplain),
}

/// Capability set shared by every strategy task.
#[async_trait]
pub trait StrategyTask: Send + Sync + fmt::Debug {
    fn id(&self) -> Uuid;

    fn kind(&self) -> StrategyKind;

    /// Stop the task and withdraw whatever it still has resting on the book.
    async fn cancel(&self);

    /// False once the task reached a terminal phase; never flips back.
    fn is_active(&self) -> bool;

    fn explain(&self) -> TaskExplain;

    /// Place the task's orders and poll until a terminal phase.
    async fn run(self: Arc<Self>);
}

/// A constructed task, tagged by kind.
#[derive(Debug, Clone)]
pub enum TaskSlot {
    LineBreak(Arc<LineBreakTask>),
    BartDrop(Arc<BartDropTask>),
}

impl TaskSlot {
    pub fn kind(&self) -> StrategyKind {
        match self {
            TaskSlot::LineBreak(_) => StrategyKind::LineBreak,
            TaskSlot::BartDrop(_) => StrategyKind::BartDrop,
        }
    }

    pub fn as_task(&self) -> &dyn StrategyTask {
        match self {
            TaskSlot::LineBreak(task) => task.as_ref(),
            TaskSlot::BartDrop(task) => task.as_ref(),
        }
    }

    /// Second phase of the start protocol: hand the loop to the runtime.
    pub fn spawn(&self) -> JoinHandle<()> {
        match self {
            TaskSlot::LineBreak(task) => tokio::spawn(task.clone().run()),
            TaskSlot::BartDrop(task) => tokio::spawn(task.clone().run()),
        }
    }
}

/// A required numeric parameter: present and non-zero.
pub(crate) fn required(value: Option<Decimal>) -> Result<Decimal> {
    value
        .filter(|value| !value.is_zero())
        .ok_or_else(|| TaskError::invalid_params("Invalid params"))
}

pub(crate) fn contains_order(orders: &[Order], order_id: &str) -> bool {
    orders.iter().any(|order| order.order_id == order_id)
}

/// Round to a whole tick; halves round up.
pub(crate) fn round_to_tick(price: Decimal) -> Decimal {
    (price + Decimal::new(5, 1)).floor()
}

/// Hour bucket of a wall-clock reading.
pub(crate) fn hour_of(at: chrono::DateTime<chrono::Utc>) -> i64 {
    at.timestamp().div_euclid(3600)
}

#[cfg(test)]
pub(crate) mod test_support;
