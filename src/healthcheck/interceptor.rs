//! # Interceptor chain for check tasks.
//!
//! An [`InterceptorChain`] runs a fixed, ordered list of [`Interceptor`]s over
//! an [`Interceptable`] target. The first interceptor that returns `true`
//! stops the chain; the target's own logic is then skipped.
//!
//! ```text
//! do_intercept(task)
//!   ├─► interceptor[0].intercept(task)? ── true ──► Intercepted { by }
//!   ├─► interceptor[1].intercept(task)? ── true ──► Intercepted { by }
//!   ├─► ...
//!   └─► task.pass_intercept().await?
//!       task.after_intercept().await            ──► Passed
//! ```
//!
//! `after_intercept` runs only after a full pass, never for an intercepted task.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::HealthCheckError;

/// A unit of work that may be stopped by an interceptor chain.
#[async_trait]
pub trait Interceptable: Send + Sync {
    /// The work performed when no interceptor stopped the chain.
    async fn pass_intercept(&self) -> Result<(), HealthCheckError>;

    /// Follow-up after a successful [`pass_intercept`](Self::pass_intercept).
    async fn after_intercept(&self) {}
}

/// One policy gate in an [`InterceptorChain`].
pub trait Interceptor<T>: Send + Sync + 'static {
    /// Returns `true` to stop the chain for `target`.
    ///
    /// An error aborts the whole task (the target is left untouched).
    fn intercept(&self, target: &T) -> Result<bool, HealthCheckError>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Result of running a target through a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptOutcome {
    /// No interceptor objected; the target ran.
    Passed,
    /// The named interceptor stopped the chain.
    Intercepted { by: &'static str },
}

/// Ordered, immutable list of interceptors.
pub struct InterceptorChain<T> {
    interceptors: Vec<Arc<dyn Interceptor<T>>>,
}

impl<T: Interceptable + 'static> InterceptorChain<T> {
    /// Builds a chain that evaluates `interceptors` in the given order.
    pub fn new(interceptors: Vec<Arc<dyn Interceptor<T>>>) -> Self {
        Self { interceptors }
    }

    /// Names of the interceptors, in evaluation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs `target` through the chain.
    pub async fn do_intercept(&self, target: &T) -> Result<InterceptOutcome, HealthCheckError> {
        for interceptor in &self.interceptors {
            if interceptor.intercept(target)? {
                trace!(interceptor = interceptor.name(), "task intercepted");
                return Ok(InterceptOutcome::Intercepted {
                    by: interceptor.name(),
                });
            }
        }
        target.pass_intercept().await?;
        target.after_intercept().await;
        Ok(InterceptOutcome::Passed)
    }
}

impl<T: 'static> fmt::Debug for InterceptorChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.interceptors.iter().map(|i| i.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Target {
        calls: Mutex<Vec<&'static str>>,
        fail: bool,
    }

    #[async_trait]
    impl Interceptable for Target {
        async fn pass_intercept(&self) -> Result<(), HealthCheckError> {
            self.calls.lock().push("pass");
            if self.fail {
                return Err(HealthCheckError::Panicked {
                    info: "pass failed".into(),
                });
            }
            Ok(())
        }

        async fn after_intercept(&self) {
            self.calls.lock().push("after");
        }
    }

    struct Gate {
        name: &'static str,
        stop: bool,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Interceptor<Target> for Gate {
        fn intercept(&self, _target: &Target) -> Result<bool, HealthCheckError> {
            self.seen.lock().push(self.name);
            Ok(self.stop)
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn gate(name: &'static str, stop: bool, seen: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn Interceptor<Target>> {
        Arc::new(Gate {
            name,
            stop,
            seen: Arc::clone(seen),
        })
    }

    #[tokio::test]
    async fn test_first_intercept_stops_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new(vec![
            gate("first", false, &seen),
            gate("second", true, &seen),
            gate("third", true, &seen),
        ]);
        let target = Target::default();

        let outcome = chain.do_intercept(&target).await.expect("chain");
        assert_eq!(outcome, InterceptOutcome::Intercepted { by: "second" });
        assert_eq!(*seen.lock(), vec!["first", "second"]);
        assert!(target.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_full_pass_runs_target_then_after() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new(vec![gate("a", false, &seen), gate("b", false, &seen)]);
        let target = Target::default();

        assert_eq!(
            chain.do_intercept(&target).await.expect("chain"),
            InterceptOutcome::Passed
        );
        assert_eq!(*target.calls.lock(), vec!["pass", "after"]);
        assert_eq!(chain.names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failed_pass_skips_after() {
        let chain: InterceptorChain<Target> = InterceptorChain::new(Vec::new());
        let target = Target {
            fail: true,
            ..Target::default()
        };
        assert!(chain.do_intercept(&target).await.is_err());
        assert_eq!(*target.calls.lock(), vec!["pass"]);
    }
}
