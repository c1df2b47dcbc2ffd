//! Forwarding objects and the hardware programming contract.
//!
//! The FIB never talks to hardware directly. It describes the forwarding
//! objects it needs (load-balances, adjacencies, routes) and hands build,
//! update and teardown commands to a [`HwCommandQueue`], which applies them
//! asynchronously when flushed.
//!
//! - [`types`]: typed object ids and the [`Dpo`] forwarding object
//! - [`error`]: hardware status codes and errors
//! - [`api`]: the command queue trait and an in-memory implementation
//!
//! # Example
//!
//! ```
//! use fib_dpo::{Dpo, HwCommand, HwCommandQueue, HwStatus, RecordingQueue};
//! use fib_types::DpoProto;
//!
//! let mut queue = RecordingQueue::new();
//! let status = queue.enqueue(HwCommand::LoadBalanceTeardown {
//!     id: fib_dpo::LoadBalanceId::from_raw(7),
//! });
//! assert_eq!(status, HwStatus::InProgress);
//! assert_eq!(queue.pending(), 1);
//! let _ = Dpo::Drop(DpoProto::Ip4);
//! ```

pub mod api;
pub mod error;
pub mod types;

pub use types::{
    AdjacencyId, AdjacencyKind, Dpo, DpoObjectId, DpoObjectKind, LbBucket, LoadBalanceId,
    LoadBalanceKind,
};

pub use api::{HwCommand, HwCommandQueue, RecordingQueue};
pub use error::{HwError, HwResult, HwStatus};
