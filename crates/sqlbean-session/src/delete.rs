//! DELETE operations.

use sqlbean_core::{Connection, HookPhase, Record, Result};
use sqlbean_query::build_delete;

use crate::{Session, apply_stamps, hooks};

impl<C: Connection> Session<C> {
    /// Delete rows matching the statement conditions and `bean`'s non-zero
    /// fields.
    ///
    /// Fails with [`ConditionRequired`](sqlbean_core::Error::ConditionRequired)
    /// when there is neither a condition nor a row limit. Tables with a
    /// soft-delete column have it stamped instead, and the stamp is copied
    /// into `bean`; [`unscoped`](Self::unscoped) deletes physically.
    #[tracing::instrument(level = "debug", skip(self, bean), fields(table = R::table().name()))]
    pub fn delete<R: Record>(&mut self, bean: &mut R) -> Result<u64> {
        let stmt = self.stmt.take();
        let table = R::table();
        let table_name = stmt.table_name(table).to_string();
        hooks::run_before(&stmt.before, HookPhase::BeforeDelete, bean)?;

        let plan = build_delete(&self.build_context(&stmt), table, bean)?;
        let cache_plan =
            self.prepare_delete_cache::<R>(stmt.no_cache, &table_name, &plan.cache_statement);
        let affected = self.exec_logged(&plan.statement)?.rows_affected;
        tracing::debug!(rows = affected, soft = !plan.stamps.is_empty(), "Deleted rows");

        apply_stamps(bean, &plan.stamps)?;
        self.finish_cache::<R>(&table_name, cache_plan);

        let queue = self.hook_queue();
        hooks::run_after(&stmt.after, HookPhase::AfterDelete, bean, queue)?;
        Ok(affected)
    }
}
