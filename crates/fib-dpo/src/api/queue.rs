//! Hardware command queue.
//!
//! The FIB enqueues commands as forwarding state changes and the owner of
//! the queue flushes them to hardware in batches. Enqueueing never blocks;
//! the returned status only says whether the command was accepted.

use crate::error::{HwError, HwResult, HwStatus};
use crate::types::{Dpo, LbBucket, LoadBalanceId};
use async_trait::async_trait;
use fib_types::{DpoProto, FibPrefix};
use log::{debug, warn};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// A request to build, change or remove a hardware forwarding object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCommand {
    LoadBalanceBuild {
        id: LoadBalanceId,
        proto: DpoProto,
        buckets: Vec<LbBucket>,
    },
    /// Replace the buckets of an existing load-balance in place.
    LoadBalanceUpdate {
        id: LoadBalanceId,
        buckets: Vec<LbBucket>,
    },
    LoadBalanceTeardown {
        id: LoadBalanceId,
    },
    RouteInstall {
        table_id: u32,
        prefix: FibPrefix,
        dpo: Dpo,
    },
    RouteWithdraw {
        table_id: u32,
        prefix: FibPrefix,
    },
}

impl HwCommand {
    /// The load-balance this command acts on, if any.
    pub fn load_balance(&self) -> Option<LoadBalanceId> {
        match self {
            HwCommand::LoadBalanceBuild { id, .. }
            | HwCommand::LoadBalanceUpdate { id, .. }
            | HwCommand::LoadBalanceTeardown { id } => Some(*id),
            HwCommand::RouteInstall { dpo, .. } => dpo.load_balance(),
            HwCommand::RouteWithdraw { .. } => None,
        }
    }
}

impl fmt::Display for HwCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HwCommand::LoadBalanceBuild { id, proto, buckets } => {
                write!(f, "lb-build {} {} buckets:{}", id, proto, buckets.len())
            }
            HwCommand::LoadBalanceUpdate { id, buckets } => {
                write!(f, "lb-update {} buckets:{}", id, buckets.len())
            }
            HwCommand::LoadBalanceTeardown { id } => write!(f, "lb-teardown {}", id),
            HwCommand::RouteInstall {
                table_id,
                prefix,
                dpo,
            } => write!(f, "route-install {}:{} via {}", table_id, prefix, dpo),
            HwCommand::RouteWithdraw { table_id, prefix } => {
                write!(f, "route-withdraw {}:{}", table_id, prefix)
            }
        }
    }
}

/// The hardware object lifecycle manager, as seen by the FIB.
#[async_trait]
pub trait HwCommandQueue: Send {
    /// Queues a command. A failure status means the command was dropped.
    fn enqueue(&mut self, cmd: HwCommand) -> HwStatus;

    /// Applies every queued command.
    async fn flush(&mut self) -> HwResult<HwStatus>;

    /// Number of commands waiting for a flush.
    fn pending(&self) -> usize;
}

#[derive(Debug, Default)]
struct RecordingState {
    pending: Vec<HwCommand>,
    log: Vec<HwCommand>,
    applied: Vec<HwCommand>,
    enqueue_status: Option<HwStatus>,
    flush_error: Option<HwError>,
}

/// An in-memory queue that records every accepted command.
///
/// Clones share state, so a caller can keep a handle for inspection after
/// boxing another clone into the FIB.
#[derive(Debug, Clone, Default)]
pub struct RecordingQueue {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every accepted command, in enqueue order.
    pub fn log(&self) -> Vec<HwCommand> {
        self.state().log.clone()
    }

    /// Forgets the command log (pending commands are kept).
    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    /// Commands applied by past flushes.
    pub fn applied(&self) -> Vec<HwCommand> {
        self.state().applied.clone()
    }

    /// Makes every following enqueue return `status`.
    pub fn set_enqueue_status(&self, status: HwStatus) {
        self.state().enqueue_status = Some(status);
    }

    /// Makes the next flush fail with `error`, leaving commands queued.
    pub fn fail_next_flush(&self, error: HwError) {
        self.state().flush_error = Some(error);
    }
}

#[async_trait]
impl HwCommandQueue for RecordingQueue {
    fn enqueue(&mut self, cmd: HwCommand) -> HwStatus {
        let mut state = self.state();
        let status = state.enqueue_status.unwrap_or(HwStatus::InProgress);
        if status.is_error() {
            warn!("RecordingQueue: Rejected {} ({})", cmd, status);
            return status;
        }
        debug!("RecordingQueue: Queued {}", cmd);
        state.log.push(cmd.clone());
        state.pending.push(cmd);
        status
    }

    async fn flush(&mut self) -> HwResult<HwStatus> {
        let mut state = self.state();
        if let Some(error) = state.flush_error.take() {
            return Err(match error {
                HwError::Timeout { .. } => HwError::Timeout {
                    pending: state.pending.len(),
                },
                other => other,
            });
        }
        if state.pending.is_empty() {
            return Ok(HwStatus::Noop);
        }
        let batch: Vec<HwCommand> = state.pending.drain(..).collect();
        debug!("RecordingQueue: Flushed {} commands", batch.len());
        state.applied.extend(batch);
        Ok(HwStatus::Ok)
    }

    fn pending(&self) -> usize {
        self.state().pending.len()
    }
}
