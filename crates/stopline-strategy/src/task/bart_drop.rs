/*
[INPUT]:  BartDrop parameters, exchange capability, clock
[OUTPUT]: Entry/exit stop bracket with position tracking and exit resizing
[POS]:    Execution layer - BartDrop strategy state machine
[UPDATE]: When defining stop or fallback behaviour for the bracket
*/

use super::{
    Side, StrategyKind, StrategyTask, TaskContext, TaskExplain, TaskPhase, contains_order,
    required,
};
use crate::error::{Result, TaskError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use stopline_adapter::OrderId;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BartDropParams {
    pub enter_value: Option<Decimal>,
    pub exit_value: Option<Decimal>,
    pub enter_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub fallback_price: Option<Decimal>,
    pub side: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExitValueParams {
    pub exit_value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BartDropExplain {
    pub id: Uuid,
    pub start_date: DateTime<Utc>,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::float")]
    pub enter_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub exit_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub enter_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub exit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub stop_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fallback_price: Decimal,
    pub enter_order_id: Option<OrderId>,
    pub exit_order_id: Option<OrderId>,
    pub in_position: bool,
    pub state: TaskPhase,
}

#[derive(Debug)]
struct BartDropState {
    enter_order_id: Option<OrderId>,
    exit_order_id: Option<OrderId>,
    exit_value: Decimal,
    in_position: bool,
    phase: TaskPhase,
    cancel_requested: bool,
}

/// Bracket of two stop orders: one entering a position, one leaving it.
///
/// `stop_price` and `fallback_price` are carried and reported but do not
/// drive any transition yet.
#[derive(Debug)]
pub struct BartDropTask {
    id: Uuid,
    start_date: DateTime<Utc>,
    side: Side,
    enter_value: Decimal,
    enter_price: Decimal,
    exit_price: Decimal,
    stop_price: Decimal,
    fallback_price: Decimal,
    ctx: TaskContext,
    active: CancellationToken,
    state: Mutex<BartDropState>,
}

impl BartDropTask {
    pub fn new(ctx: TaskContext, params: BartDropParams) -> Result<Arc<Self>> {
        let enter_value = required(params.enter_value)?;
        let exit_value = required(params.exit_value)?;
        let enter_price = required(params.enter_price)?;
        let exit_price = required(params.exit_price)?;
        let stop_price = required(params.stop_price)?;
        let fallback_price = required(params.fallback_price)?;
        let side = Side::parse_param(params.side.as_deref())?;

        let ordered = match side {
            Side::Long => exit_price >= enter_price,
            Side::Short => exit_price <= enter_price,
        };
        if !ordered {
            return Err(TaskError::invalid_params("Invalid params"));
        }

        Ok(Arc::new(Self {
            id: Uuid::new_v4(),
            start_date: ctx.clock.now(),
            side,
            enter_value: side.signed(enter_value),
            enter_price,
            exit_price,
            stop_price,
            fallback_price,
            active: CancellationToken::new(),
            state: Mutex::new(BartDropState {
                enter_order_id: None,
                exit_order_id: None,
                exit_value: Self::exit_leg(side, exit_value),
                in_position: false,
                phase: TaskPhase::Created,
                cancel_requested: false,
            }),
            ctx,
        }))
    }

    /// The exit leg trades against the side.
    fn exit_leg(side: Side, value: Decimal) -> Decimal {
        -side.signed(value)
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn enter_value(&self) -> Decimal {
        self.enter_value
    }

    pub fn exit_value(&self) -> Decimal {
        self.state().exit_value
    }

    pub fn in_position(&self) -> bool {
        self.state().in_position
    }

    pub fn phase(&self) -> TaskPhase {
        self.state().phase
    }

    fn state(&self) -> MutexGuard<'_, BartDropState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place entry then exit, then poll until the bracket resolves.
    ///
    /// The two placements are independent requests; an interruption between
    /// them leaves only the entry leg on the book.
    pub async fn run(self: Arc<Self>) {
        let enter = self
            .ctx
            .stock
            .place_order(self.enter_price, self.enter_value)
            .await;
        self.state().enter_order_id = Some(enter.order_id.clone());
        tracing::info!(task_id = %self.id, order_id = %enter.order_id, price = %self.enter_price, "bart drop entry placed");
        if self.withdraw_if_cancelled(&enter.order_id).await {
            return;
        }

        let exit_value = self.exit_value();
        let exit = self
            .ctx
            .stock
            .place_order(self.exit_price, exit_value)
            .await;
        self.state().exit_order_id = Some(exit.order_id.clone());
        tracing::info!(task_id = %self.id, order_id = %exit.order_id, price = %self.exit_price, "bart drop exit placed");
        if self.withdraw_if_cancelled(&exit.order_id).await {
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
        tracing::info!(task_id = %self.id, phase = ?self.phase(), "bart drop task finished");
    }

    /// A cancel that ran while a leg was being placed could not see that
    /// leg; withdraw it here.
    async fn withdraw_if_cancelled(&self, order_id: &str) -> bool {
        if !self.state().cancel_requested {
            return false;
        }
        self.ctx.stock.cancel_order(order_id).await;
        tracing::info!(task_id = %self.id, order_id, "bart drop leg withdrawn after cancel");
        true
    }

    /// Inactive, or a cancel has started tearing the bracket down.
    fn halted(&self) -> bool {
        !self.is_active() || self.state().cancel_requested
    }

    pub(crate) async fn tick(&self) {
        let Some(exit_order_id) = self.state().exit_order_id.clone() else {
            return;
        };

        let orders = self.ctx.stock.get_orders().await;
        if self.halted() {
            return;
        }
        if !contains_order(&orders, &exit_order_id) {
            {
                // A cancel in flight may be the one that removed the exit leg.
                let mut state = self.state();
                if state.cancel_requested {
                    return;
                }
                state.phase = TaskPhase::Exited;
            }
            self.active.cancel();
            tracing::info!(task_id = %self.id, order_id = %exit_order_id, "bart drop exit left the book");
            return;
        }

        if self.in_position() {
            return;
        }
        if self.ctx.stock.has_position().await && !self.halted() {
            self.state().in_position = true;
            tracing::info!(task_id = %self.id, "bart drop entry filled");
        }
    }

    /// Resize the exit leg at its unchanged price.
    pub async fn change_exit_value(&self, value: Option<Decimal>) -> Result<()> {
        let value = Self::exit_leg(self.side, required(value)?);
        let Some(exit_order_id) = self.state().exit_order_id.clone() else {
            return Err(TaskError::invalid_params("Exit order is not placed yet"));
        };

        let moved = self
            .ctx
            .stock
            .move_order(&exit_order_id, self.exit_price, value)
            .await;
        tracing::info!(
            task_id = %self.id,
            old_order_id = %exit_order_id,
            order_id = %moved.order_id,
            value = %value,
            "bart drop exit resized"
        );

        let mut state = self.state();
        state.exit_order_id = Some(moved.order_id);
        state.exit_value = value;
        Ok(())
    }
}

#[async_trait]
impl StrategyTask for BartDropTask {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::BartDrop
    }

    /// Cancel whichever legs are still on the book, then go inactive.
    async fn cancel(&self) {
        let (enter, exit) = {
            let mut state = self.state();
            if state.cancel_requested {
                return;
            }
            state.cancel_requested = true;
            (state.enter_order_id.clone(), state.exit_order_id.clone())
        };

        if enter.is_some() || exit.is_some() {
            let orders = self.ctx.stock.get_orders().await;
            for order_id in [enter, exit].into_iter().flatten() {
                if contains_order(&orders, &order_id) {
                    self.ctx.stock.cancel_order(&order_id).await;
                    tracing::info!(task_id = %self.id, order_id = %order_id, "bart drop leg cancelled");
                }
            }
        }

        {
            let mut state = self.state();
            if !state.phase.is_terminal() {
                state.phase = TaskPhase::Cancelled;
            }
        }
        self.active.cancel();
    }

    fn is_active(&self) -> bool {
        !self.active.is_cancelled()
    }

    fn explain(&self) -> TaskExplain {
        let state = self.state();
        TaskExplain::BartDrop(BartDropExplain {
            id: self.id,
            start_date: self.start_date,
            side: self.side,
            enter_value: self.enter_value,
            exit_value: state.exit_value,
            enter_price: self.enter_price,
            exit_price: self.exit_price,
            stop_price: self.stop_price,
            fallback_price: self.fallback_price,
            enter_order_id: state.enter_order_id.clone(),
            exit_order_id: state.exit_order_id.clone(),
            in_position: state.in_position,
            state: state.phase,
        })
    }

    async fn run(self: Arc<Self>) {
        BartDropTask::run(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::test_support::{Call, context, dec};

    fn params(side: &str, enter: i64, exit: i64) -> BartDropParams {
        BartDropParams {
            enter_value: Some(dec(100)),
            exit_value: Some(dec(100)),
            enter_price: Some(dec(enter)),
            exit_price: Some(dec(exit)),
            stop_price: Some(dec(9_500)),
            fallback_price: Some(dec(9_000)),
            side: Some(side.to_string()),
        }
    }

    /// Start the task and let both legs land on the book.
    async fn started(task: &Arc<BartDropTask>) -> tokio::task::JoinHandle<()> {
        let handle = tokio::spawn(task.clone().run());
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        handle
    }

    #[rstest::rstest]
    #[case("long", 10_000, 11_000, true)]
    #[case("long", 10_000, 10_000, true)]
    #[case("long", 10_000, 9_000, false)]
    #[case("short", 10_000, 9_000, true)]
    #[case("short", 10_000, 10_000, true)]
    #[case("short", 10_000, 11_000, false)]
    fn test_price_ordering_follows_side(
        #[case] side: &str,
        #[case] enter: i64,
        #[case] exit: i64,
        #[case] accepted: bool,
    ) {
        let (ctx, _, _) = context();
        let result = BartDropTask::new(ctx, params(side, enter, exit));
        assert_eq!(result.is_ok(), accepted);
        if let Err(err) = result {
            assert_eq!(err.to_string(), "Invalid params");
        }
    }

    #[test]
    fn test_every_numeric_field_is_required() {
        let (ctx, _, _) = context();
        let mut p = params("long", 10_000, 11_000);
        p.fallback_price = Some(Decimal::ZERO);
        assert!(BartDropTask::new(ctx.clone(), p).is_err());

        let mut p = params("long", 10_000, 11_000);
        p.stop_price = None;
        assert!(BartDropTask::new(ctx.clone(), p).is_err());

        let err = BartDropTask::new(ctx, params("both", 10_000, 11_000)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid side");
    }

    #[test]
    fn test_leg_values_are_signed_by_side() {
        let (ctx, _, _) = context();
        let long = BartDropTask::new(ctx.clone(), params("long", 10_000, 11_000)).unwrap();
        assert_eq!(long.enter_value(), dec(100));
        assert_eq!(long.exit_value(), dec(-100));

        let short = BartDropTask::new(ctx, params("short", 10_000, 9_000)).unwrap();
        assert_eq!(short.enter_value(), dec(-100));
        assert_eq!(short.exit_value(), dec(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_places_entry_then_exit() {
        let (ctx, stock, _) = context();
        let task = BartDropTask::new(ctx, params("long", 10_000, 11_000)).unwrap();
        let _handle = started(&task).await;

        assert_eq!(
            stock.calls(),
            vec![
                Call::Place {
                    price: dec(10_000),
                    value: dec(100)
                },
                Call::Place {
                    price: dec(11_000),
                    value: dec(-100)
                },
            ]
        );
        assert_eq!(task.phase(), TaskPhase::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_flips_in_position_once() {
        let (ctx, stock, _) = context();
        let task = BartDropTask::new(ctx, params("long", 10_000, 11_000)).unwrap();
        let _handle = started(&task).await;

        task.tick().await;
        assert!(!task.in_position());

        stock.open_position(dec(10_000));
        task.tick().await;
        assert!(task.in_position());
        assert!(task.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_disappearing_resolves_bracket() {
        let (ctx, stock, _) = context();
        let task = BartDropTask::new(ctx, params("long", 10_000, 11_000)).unwrap();
        let handle = started(&task).await;

        stock.drop_order("order-2");
        tokio::time::sleep(std::time::Duration::from_secs(6)).await;
        assert!(!task.is_active());
        assert_eq!(task.phase(), TaskPhase::Exited);
        handle.await.unwrap();

        stock.clear_calls();
        task.cancel().await;
        assert_eq!(
            stock.calls(),
            vec![Call::Cancel {
                order_id: "order-1".to_string()
            }]
        );
        assert_eq!(task.phase(), TaskPhase::Exited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_hits_only_live_legs() {
        let (ctx, stock, _) = context();
        let task = BartDropTask::new(ctx, params("short", 10_000, 9_000)).unwrap();
        let handle = started(&task).await;

        stock.drop_order("order-1");
        stock.clear_calls();
        task.cancel().await;
        task.cancel().await;
        handle.await.unwrap();

        assert_eq!(
            stock.calls(),
            vec![Call::Cancel {
                order_id: "order-2".to_string()
            }]
        );
        assert!(!task.is_active());
        assert_eq!(task.phase(), TaskPhase::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_during_cancel_does_not_resolve_bracket() {
        let (ctx, stock, _) = context();
        let task = BartDropTask::new(ctx, params("long", 10_000, 11_000)).unwrap();
        let _handle = started(&task).await;

        // Cancel has claimed the bracket and already pulled the exit leg.
        task.state().cancel_requested = true;
        stock.drop_order("order-2");
        task.tick().await;

        assert!(task.is_active());
        assert_eq!(task.phase(), TaskPhase::Polling);
    }

    #[tokio::test]
    async fn test_cancel_before_start_withdraws_entry() {
        let (ctx, stock, _) = context();
        let task = BartDropTask::new(ctx, params("long", 10_000, 11_000)).unwrap();
        task.cancel().await;
        assert!(!task.is_active());

        task.clone().run().await;
        assert_eq!(
            stock.calls(),
            vec![
                Call::Place {
                    price: dec(10_000),
                    value: dec(100)
                },
                Call::Cancel {
                    order_id: "order-1".to_string()
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_exit_value_moves_exit_leg() {
        let (ctx, stock, _) = context();
        let task = BartDropTask::new(ctx, params("long", 10_000, 11_000)).unwrap();
        let _handle = started(&task).await;
        stock.clear_calls();

        task.change_exit_value(Some(dec(40))).await.unwrap();

        assert_eq!(
            stock.calls(),
            vec![Call::Move {
                order_id: "order-2".to_string(),
                price: dec(11_000),
                value: dec(-40),
            }]
        );
        assert_eq!(task.exit_value(), dec(-40));
        match task.explain() {
            TaskExplain::BartDrop(explain) => {
                assert_eq!(explain.exit_order_id.as_deref(), Some("order-3"));
                assert_eq!(explain.stop_price, dec(9_500));
            }
            other => panic!("unexpected explain: {other:?}"),
        }

        let err = task.change_exit_value(Some(Decimal::ZERO)).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid params");
    }
}
