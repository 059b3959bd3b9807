//! Lifecycle hook dispatch.
//!
//! Each phase runs the statement's user closures first, then the hook the
//! record's table declared for that phase. Outside a transaction after-hooks
//! run right away; inside one they are queued against a snapshot of the bean
//! and run on commit.

use std::fmt;

use sqlbean_core::{HookPhase, Record, Result};
use sqlbean_query::Closure;

/// An after-hook waiting for the transaction to commit.
pub struct DeferredHook {
    pub table: &'static str,
    pub phase: HookPhase,
    run: Box<dyn FnOnce() -> Result<()> + Send>,
}

impl DeferredHook {
    pub fn run(self) -> Result<()> {
        (self.run)()
    }
}

impl fmt::Debug for DeferredHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredHook")
            .field("table", &self.table)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

fn run_now<R: Record>(closures: &[Closure], phase: HookPhase, bean: &mut R) -> Result<()> {
    for closure in closures {
        closure(&mut *bean);
    }
    match R::table().hooks().get(phase) {
        Some(hook) => hook(bean),
        None => Ok(()),
    }
}

/// Run a before-phase against the bean.
pub(crate) fn run_before<R: Record>(
    closures: &[Closure],
    phase: HookPhase,
    bean: &mut R,
) -> Result<()> {
    tracing::trace!(table = R::table().name(), phase = ?phase, "Running before hooks");
    run_now(closures, phase, bean)
}

/// Run an after-phase now, or queue it when `queue` is given.
pub(crate) fn run_after<R: Record>(
    closures: &[Closure],
    phase: HookPhase,
    bean: &mut R,
    queue: Option<&mut Vec<DeferredHook>>,
) -> Result<()> {
    let table = R::table();
    let Some(queue) = queue else {
        tracing::trace!(table = table.name(), phase = ?phase, "Running after hooks");
        return run_now(closures, phase, bean);
    };

    let hook = table.hooks().get(phase);
    if closures.is_empty() && hook.is_none() {
        return Ok(());
    }
    let closures = closures.to_vec();
    let mut snapshot = bean.clone();
    tracing::trace!(table = table.name(), phase = ?phase, "Deferring after hooks until commit");
    queue.push(DeferredHook {
        table: table.name(),
        phase,
        run: Box::new(move || run_now(&closures, phase, &mut snapshot)),
    });
    Ok(())
}
