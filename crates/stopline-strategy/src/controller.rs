/*
[INPUT]:  Parsed request parameters, shared TaskContext
[OUTPUT]: Task registry with uniqueness, status snapshots and bulk cancel
[POS]:    Execution layer - orchestration of running strategy tasks
[UPDATE]: When adding a strategy kind or a controller operation
*/

use crate::error::{Result as TaskResult, TaskError};
use crate::task::{
    BartDropParams, BartDropTask, ExitValueParams, LineBreakParams, LineBreakTask, StrategyKind,
    StrategyTask, TaskContext, TaskExplain, TaskSlot,
};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Pause before sampling status so tasks started by the previous request
/// have placed their orders.
pub const STATUS_DELAY: Duration = Duration::from_secs(1);
pub const OK_MESSAGE: &str = "Ok";
pub const NO_TASKS_MESSAGE: &str = "No any tasks!";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub entry: Decimal,
    pub timestamp: String,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub liquidation: Option<Decimal>,
}

/// Exchange position as reported in status; flat renders as `"None"`.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionStatus {
    None,
    Open(PositionSummary),
}

impl Serialize for PositionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PositionStatus::None => serializer.serialize_str("None"),
            PositionStatus::Open(summary) => summary.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub position: PositionStatus,
    pub tasks: Vec<TaskExplain>,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// What a controller operation hands back to the caller.
#[derive(Debug, Clone)]
pub enum ControlReply {
    Status(StatusReport),
    Message(String),
}

impl ControlReply {
    pub fn message(text: impl Into<String>) -> Self {
        ControlReply::Message(text.into())
    }

    pub fn as_message(&self) -> Option<&str> {
        match self {
            ControlReply::Message(text) => Some(text),
            ControlReply::Status(_) => None,
        }
    }

    pub fn as_status(&self) -> Option<&StatusReport> {
        match self {
            ControlReply::Status(report) => Some(report),
            ControlReply::Message(_) => None,
        }
    }
}

#[derive(Debug)]
struct RegisteredTask {
    slot: TaskSlot,
    handle: JoinHandle<()>,
}

impl RegisteredTask {
    fn task(&self) -> &dyn StrategyTask {
        self.slot.as_task()
    }
}

/// Registry of running tasks.
#[derive(Debug)]
pub struct TaskController {
    ctx: TaskContext,
    status_delay: Duration,
    tasks: Mutex<Vec<RegisteredTask>>,
}

impl TaskController {
    pub fn new(ctx: TaskContext) -> Self {
        Self {
            ctx,
            status_delay: STATUS_DELAY,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_status_delay(mut self, status_delay: Duration) -> Self {
        self.status_delay = status_delay;
        self
    }

    /// Registered tasks, including inactive ones not yet swept.
    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Snapshot of position, sync state and every active task. Inactive
    /// tasks seen during the pass are removed once it completes.
    pub async fn status(&self) -> Result<ControlReply> {
        Ok(ControlReply::Status(self.report().await?))
    }

    async fn report(&self) -> Result<StatusReport> {
        tokio::time::sleep(self.status_delay).await;

        let position = match self.ctx.stock.get_position().await {
            Some(position) if position.is_open() => PositionStatus::Open(PositionSummary {
                entry: position.avg_entry_price.unwrap_or_default(),
                timestamp: position.timestamp,
                liquidation: position.liquidation_price,
            }),
            _ => PositionStatus::None,
        };

        let (tasks, swept) = {
            let mut registry = self.tasks.lock().await;
            let mut explains = Vec::new();
            let mut inactive: Vec<Uuid> = Vec::new();
            for entry in registry.iter() {
                if entry.task().is_active() {
                    explains.push(entry.task().explain());
                } else {
                    inactive.push(entry.task().id());
                }
            }

            let (swept, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut *registry)
                .into_iter()
                .partition(|entry| inactive.contains(&entry.task().id()));
            *registry = kept;
            (explains, swept)
        };

        for entry in swept {
            tracing::debug!(task_id = %entry.task().id(), kind = %entry.slot.kind(), "removing inactive task");
            reap(entry).await.map_err(into_fatal)?;
        }

        Ok(StatusReport {
            position,
            tasks,
            last_sync: self.ctx.stock.last_sync(),
            last_error: self.ctx.stock.last_error(),
        })
    }

    pub async fn make_line_break_task(&self, params: LineBreakParams) -> Result<ControlReply> {
        self.make_task(None, |ctx| {
            LineBreakTask::new(ctx, params).map(TaskSlot::LineBreak)
        })
        .await
    }

    pub async fn make_bart_drop_task(&self, params: BartDropParams) -> Result<ControlReply> {
        self.make_task(Some(StrategyKind::BartDrop), |ctx| {
            BartDropTask::new(ctx, params).map(TaskSlot::BartDrop)
        })
        .await
    }

    /// Build and start a task. With `unique_as`, refuse when an active task
    /// of that kind is already registered.
    async fn make_task<F>(&self, unique_as: Option<StrategyKind>, build: F) -> Result<ControlReply>
    where
        F: FnOnce(TaskContext) -> TaskResult<TaskSlot>,
    {
        let mut registry = self.tasks.lock().await;

        if let Some(kind) = unique_as {
            let taken = registry
                .iter()
                .any(|entry| entry.slot.kind() == kind && entry.task().is_active());
            if taken {
                return settle(Err(TaskError::already_exists(format!(
                    "Already have {kind} task!"
                ))));
            }
        }

        let slot = match build(self.ctx.clone()) {
            Ok(slot) => slot,
            Err(err) => return settle(Err(err)),
        };
        let handle = slot.spawn();
        tracing::info!(task_id = %slot.as_task().id(), kind = %slot.kind(), "task started");
        registry.push(RegisteredTask { slot, handle });

        Ok(ControlReply::message(OK_MESSAGE))
    }

    pub async fn change_bart_drop_exit_value(&self, params: ExitValueParams) -> Result<ControlReply> {
        let task = {
            let registry = self.tasks.lock().await;
            registry.iter().find_map(|entry| match &entry.slot {
                TaskSlot::BartDrop(task) if task.is_active() => Some(task.clone()),
                _ => None,
            })
        };

        let Some(task) = task else {
            return settle(Err(TaskError::not_found(format!(
                "No {} task!",
                StrategyKind::BartDrop
            ))));
        };

        settle(
            task.change_exit_value(params.exit_value)
                .await
                .map(|()| ControlReply::message(OK_MESSAGE)),
        )
    }

    /// Cancel and forget every registered task, then report status.
    pub async fn cancel(&self) -> Result<ControlReply> {
        let taken = std::mem::take(&mut *self.tasks.lock().await);
        if taken.is_empty() {
            return Ok(ControlReply::message(NO_TASKS_MESSAGE));
        }

        let mut failure = None;
        for entry in taken {
            entry.task().cancel().await;
            tracing::info!(task_id = %entry.task().id(), kind = %entry.slot.kind(), "task cancelled");
            if let Err(err) = reap(entry).await {
                failure.get_or_insert(err);
            }
        }
        if let Some(err) = failure {
            return Err(into_fatal(err));
        }

        self.status().await
    }
}

/// Surface a panic from a finished task loop. Loops still unwinding an
/// exchange call are detached.
async fn reap(entry: RegisteredTask) -> TaskResult<()> {
    if !entry.handle.is_finished() {
        return Ok(());
    }
    let id = entry.task().id();
    match entry.handle.await {
        Err(err) if err.is_panic() => {
            tracing::error!(task_id = %id, "task loop panicked");
            Err(TaskError::Fatal(anyhow!("task {id} loop panicked: {err}")))
        }
        _ => Ok(()),
    }
}

/// Validation failures become a message for the caller; anything else is fatal.
fn settle(result: TaskResult<ControlReply>) -> Result<ControlReply> {
    match result {
        Ok(reply) => Ok(reply),
        Err(TaskError::Validation { code, message }) => {
            tracing::info!(?code, %message, "request rejected");
            Ok(ControlReply::Message(message))
        }
        Err(TaskError::Fatal(err)) => Err(err),
    }
}

fn into_fatal(err: TaskError) -> anyhow::Error {
    match err {
        TaskError::Fatal(err) => err,
        validation => anyhow!(validation.to_string()),
    }
}
