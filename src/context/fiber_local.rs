//! Task-local request state.
//!
//! Every routing task runs inside a [`scope`] carrying a [`FiberLocals`]
//! value. Routes read and update it without threading it through every call:
//! failover routes bump the failover count, fan-out routes tag their branches
//! with log flags, destination routes read all of it when they log a reply.
//!
//! Outside any scope the accessors return defaults and the setters do
//! nothing.

use std::cell::Cell;
use std::future::Future;

use crate::logging::RequestLoggerContextFlags;
use crate::message::RequestClass;

tokio::task_local! {
    static LOCALS: FiberLocals;
}

/// State scoped to one routing task.
#[derive(Debug, Clone, Default)]
pub struct FiberLocals {
    failover_count: Cell<u32>,
    request_class: Cell<RequestClass>,
    log_flags: Cell<RequestLoggerContextFlags>,
}

impl FiberLocals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failover_count(&self) -> u32 {
        self.failover_count.get()
    }

    pub fn request_class(&self) -> RequestClass {
        self.request_class.get()
    }

    pub fn log_flags(&self) -> RequestLoggerContextFlags {
        self.log_flags.get()
    }

    pub fn with_request_class(self, class: RequestClass) -> Self {
        self.request_class.set(class);
        self
    }

    /// Adds `flags` to those already set.
    pub fn with_log_flags(self, flags: RequestLoggerContextFlags) -> Self {
        self.log_flags.set(self.log_flags.get() | flags);
        self
    }
}

/// Run `fut` with `locals` as its task-local state.
pub async fn scope<F: Future>(locals: FiberLocals, fut: F) -> F::Output {
    LOCALS.scope(locals, fut).await
}

/// Copy of the current state, for handing to a child task.
pub fn snapshot() -> FiberLocals {
    LOCALS.try_with(FiberLocals::clone).unwrap_or_default()
}

/// Run `f` with empty task-local state.
pub fn run_without_locals<T>(f: impl FnOnce() -> T) -> T {
    LOCALS.sync_scope(FiberLocals::default(), f)
}

/// Failovers taken so far by the current request.
pub fn failover_count() -> u32 {
    LOCALS.try_with(|l| l.failover_count.get()).unwrap_or(0)
}

pub fn increment_failover_count() {
    let _ = LOCALS.try_with(|l| l.failover_count.set(l.failover_count.get() + 1));
}

pub fn request_class() -> RequestClass {
    LOCALS
        .try_with(|l| l.request_class.get())
        .unwrap_or_default()
}

pub fn set_request_class(class: RequestClass) {
    let _ = LOCALS.try_with(|l| l.request_class.set(class));
}

/// Log flags for sends made by the current task.
pub fn log_flags() -> RequestLoggerContextFlags {
    LOCALS.try_with(|l| l.log_flags.get()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_outside_scope() {
        increment_failover_count();
        set_request_class(RequestClass::Failover);
        assert_eq!(failover_count(), 0);
        assert_eq!(request_class(), RequestClass::Normal);
    }

    #[tokio::test]
    async fn scoped_updates_are_visible() {
        let count = scope(FiberLocals::new(), async {
            increment_failover_count();
            increment_failover_count();
            set_request_class(RequestClass::Shadow);
            assert_eq!(request_class(), RequestClass::Shadow);
            failover_count()
        })
        .await;
        assert_eq!(count, 2);
        assert_eq!(failover_count(), 0);
    }

    #[tokio::test]
    async fn snapshot_is_a_copy() {
        scope(FiberLocals::new(), async {
            increment_failover_count();
            let child = snapshot();
            let child_count = scope(child, async {
                increment_failover_count();
                failover_count()
            })
            .await;
            assert_eq!(child_count, 2);
            assert_eq!(failover_count(), 1);
        })
        .await;
    }

    #[tokio::test]
    async fn log_flags_accumulate() {
        let locals = FiberLocals::new().with_log_flags(RequestLoggerContextFlags::BACKGROUND);
        scope(locals, async {
            let nested = snapshot().with_log_flags(RequestLoggerContextFlags::SHARD_SPLIT);
            let flags = scope(nested, async { log_flags() }).await;
            assert!(flags.contains(RequestLoggerContextFlags::BACKGROUND));
            assert!(flags.contains(RequestLoggerContextFlags::SHARD_SPLIT));
            assert_eq!(log_flags(), RequestLoggerContextFlags::BACKGROUND);
        })
        .await;
        assert_eq!(log_flags(), RequestLoggerContextFlags::NONE);
    }

    #[tokio::test]
    async fn run_without_locals_hides_state() {
        let locals = FiberLocals::new().with_request_class(RequestClass::Failover);
        scope(locals, async {
            increment_failover_count();
            let (count, class) = run_without_locals(|| (failover_count(), request_class()));
            assert_eq!(count, 0);
            assert_eq!(class, RequestClass::Normal);
            assert_eq!(failover_count(), 1);
        })
        .await;
    }
}
