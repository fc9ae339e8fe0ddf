//! Heartbeat-driven liveness: beats, check tasks, interceptors and checkers.
//!
//! ## Contents
//! - [`BeatInfo`], [`BeatOutcome`]: single-instance beat payload and result
//! - [`Interceptable`], [`Interceptor`], [`InterceptorChain`]: policy gates
//! - built-in interceptors: [`ResponsibleInterceptor`], [`ServiceEnableInterceptor`],
//!   [`InstanceEnableInterceptor`], [`HealthCheckEnableInterceptor`]
//! - [`InstanceBeatChecker`] with [`UnhealthyInstanceChecker`] and [`ExpiredInstanceChecker`]
//! - [`InstanceBeatCheckTask`], [`ClientBeatCheckTask`], [`CheckContext`]
//! - [`Responsibility`], [`DistroMapper`], [`Standalone`]: who drives which client
//! - [`HealthCheckReactor`]: per-client periodic sweeps
//!
//! ## State machine of one instance
//! ```text
//!            beat (fast recovery)
//!        ┌──────────────────────────┐
//!        ▼                          │
//!    HEALTHY ── no beat > hb timeout ──► UNHEALTHY
//!        │                               │
//!        └──── no beat > delete timeout ─┴──► REMOVED (expire switch on)
//! ```

mod beat;
mod checker;
mod context;
mod distro;
mod interceptor;
mod interceptors;
mod reactor;
mod task;

pub use beat::{BeatInfo, BeatOutcome};
pub use checker::{
    CheckPlan, ExpiredInstanceChecker, InstanceBeatChecker, UnhealthyInstanceChecker,
};
pub use context::CheckContext;
pub use distro::{DistroMapper, Responsibility, Standalone};
pub use interceptor::{InterceptOutcome, Interceptable, Interceptor, InterceptorChain};
pub use interceptors::{
    HealthCheckEnableInterceptor, InstanceEnableInterceptor, ResponsibleInterceptor,
    ServiceEnableInterceptor,
};
pub use reactor::HealthCheckReactor;
pub use task::{ClientBeatCheckTask, InstanceBeatCheckTask};

pub(crate) use beat::{process_beat, process_connection_beat};
