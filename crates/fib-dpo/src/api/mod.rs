//! Hardware programming API.
//!
//! - [`queue`]: the [`HwCommandQueue`] contract, its commands, and the
//!   in-memory [`RecordingQueue`]

pub mod queue;

pub use queue::{HwCommand, HwCommandQueue, RecordingQueue};
