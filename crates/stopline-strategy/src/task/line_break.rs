/*
[INPUT]:  LineBreak parameters, exchange capability, clock
[OUTPUT]: Trailing stop order that walks one step per wall-clock hour
[POS]:    Execution layer - LineBreak strategy state machine
[UPDATE]: When changing the drift schedule or terminal transitions
*/

use super::{
    MoveDirection, Side, StrategyKind, StrategyTask, TaskContext, TaskExplain, TaskPhase,
    contains_order, hour_of, required, round_to_tick,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use stopline_adapter::OrderId;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Number of intervals the `after5` target is spread over.
const TARGET_STEPS: i64 = 5;
const PROJECTION_STEPS: i64 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineBreakParams {
    pub price: Option<Decimal>,
    pub value: Option<Decimal>,
    pub after5: Option<Decimal>,
    pub side: Option<String>,
    pub move_direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineBreakExplain {
    pub id: Uuid,
    pub start_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub init_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub next_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub after10_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub step: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub order_id: Option<OrderId>,
    pub state: TaskPhase,
}

#[derive(Debug)]
struct LineBreakState {
    order_id: Option<OrderId>,
    current_price: Decimal,
    hour: i64,
    phase: TaskPhase,
    /// Set once someone has taken responsibility for withdrawing `order_id`.
    order_released: bool,
}

/// Trailing stop: a single resting stop order re-priced by `step` every hour.
#[derive(Debug)]
pub struct LineBreakTask {
    id: Uuid,
    start_date: DateTime<Utc>,
    init_price: Decimal,
    value: Decimal,
    step: Decimal,
    ctx: TaskContext,
    active: CancellationToken,
    state: Mutex<LineBreakState>,
}

impl LineBreakTask {
    /// Validate parameters and build an idle task. Nothing touches the
    /// exchange until [`LineBreakTask::run`] is spawned.
    pub fn new(ctx: TaskContext, params: LineBreakParams) -> Result<Arc<Self>> {
        let price = required(params.price)?;
        let value = required(params.value)?;
        let after5 = required(params.after5)?;
        let side = Side::parse_param(params.side.as_deref())?;
        MoveDirection::parse_param(params.move_direction.as_deref())?;

        // Walks toward the target whatever direction was declared.
        let step = (after5 - price) / Decimal::from(TARGET_STEPS);

        let start_date = ctx.clock.now();
        Ok(Arc::new(Self {
            id: Uuid::new_v4(),
            start_date,
            init_price: price,
            value: side.signed(value),
            step,
            active: CancellationToken::new(),
            state: Mutex::new(LineBreakState {
                order_id: None,
                current_price: price,
                hour: hour_of(start_date),
                phase: TaskPhase::Created,
                order_released: false,
            }),
            ctx,
        }))
    }

    pub fn step(&self) -> Decimal {
        self.step
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn phase(&self) -> TaskPhase {
        self.state().phase
    }

    fn state(&self) -> MutexGuard<'_, LineBreakState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place the initial stop order, then poll until a terminal phase.
    pub async fn run(self: Arc<Self>) {
        let order = self
            .ctx
            .stock
            .place_order(self.init_price, self.value)
            .await;
        tracing::info!(
            task_id = %self.id,
            order_id = %order.order_id,
            price = %self.init_price,
            value = %self.value,
            "line break order placed"
        );
        if self.adopt_order(order.order_id.clone()) {
            self.ctx.stock.cancel_order(&order.order_id).await;
            return;
        }
        {
            let mut state = self.state();
            if state.phase == TaskPhase::Created {
                state.phase = TaskPhase::Polling;
            }
        }

        loop {
            tokio::select! {
                _ = self.active.cancelled() => break,
                _ = tokio::time::sleep(self.ctx.timing.poll_interval) => {}
            }
            self.tick().await;
            if !self.is_active() {
                break;
            }
        }
        tracing::info!(task_id = %self.id, phase = ?self.phase(), "line break task finished");
    }

    /// Store a freshly placed order id. Returns true when the task was
    /// cancelled meanwhile and the caller must withdraw the order itself.
    fn adopt_order(&self, order_id: OrderId) -> bool {
        let mut state = self.state();
        state.order_id = Some(order_id);
        let stale = state.phase.is_terminal();
        state.order_released = stale;
        stale
    }

    /// One polling step.
    pub(crate) async fn tick(&self) {
        let Some(order_id) = self.state().order_id.clone() else {
            return;
        };

        let orders = self.ctx.stock.get_orders().await;
        if !self.is_active() {
            return;
        }
        if !contains_order(&orders, &order_id) {
            {
                let mut state = self.state();
                state.phase = TaskPhase::Orphaned;
                state.order_released = true;
            }
            self.active.cancel();
            tracing::warn!(task_id = %self.id, order_id = %order_id, "line break order left the book");
            return;
        }

        if self.ctx.stock.has_position().await {
            tracing::info!(task_id = %self.id, order_id = %order_id, "line break stop filled into a position");
            self.finish(TaskPhase::Filled).await;
            return;
        }
        if !self.is_active() {
            return;
        }

        let hour = hour_of(self.ctx.clock.now());
        let next_price = {
            let state = self.state();
            if hour <= state.hour {
                return;
            }
            round_to_tick(state.current_price + self.step)
        };

        let moved = self
            .ctx
            .stock
            .move_order(&order_id, next_price, self.value)
            .await;
        tracing::info!(
            task_id = %self.id,
            old_order_id = %order_id,
            order_id = %moved.order_id,
            price = %next_price,
            "line break order moved"
        );
        {
            let mut state = self.state();
            state.current_price = next_price;
            state.hour = hour;
        }
        if self.adopt_order(moved.order_id.clone()) {
            self.ctx.stock.cancel_order(&moved.order_id).await;
        }
    }

    /// Enter `phase` (unless already terminal), stop the loop and withdraw
    /// the resting order if nobody else has.
    async fn finish(&self, phase: TaskPhase) {
        let release = {
            let mut state = self.state();
            if !state.phase.is_terminal() {
                state.phase = phase;
            }
            self.active.cancel();
            match state.order_id.clone() {
                Some(order_id) if !state.order_released => {
                    state.order_released = true;
                    Some(order_id)
                }
                _ => None,
            }
        };

        if let Some(order_id) = release {
            self.ctx.stock.cancel_order(&order_id).await;
            tracing::info!(task_id = %self.id, order_id = %order_id, "line break order cancelled");
        }
    }
}

#[async_trait]
impl StrategyTask for LineBreakTask {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::LineBreak
    }

    async fn cancel(&self) {
        self.finish(TaskPhase::Cancelled).await;
    }

    fn is_active(&self) -> bool {
        !self.active.is_cancelled()
    }

    fn explain(&self) -> TaskExplain {
        let state = self.state();
        TaskExplain::LineBreak(LineBreakExplain {
            id: self.id,
            start_date: self.start_date,
            init_price: self.init_price,
            current_price: state.current_price,
            next_price: state.current_price + self.step,
            after10_price: state.current_price + self.step * Decimal::from(PROJECTION_STEPS),
            step: self.step,
            value: self.value,
            order_id: state.order_id.clone(),
            state: state.phase,
        })
    }

    async fn run(self: Arc<Self>) {
        LineBreakTask::run(self).await
    }
}
