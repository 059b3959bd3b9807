//! UPDATE operations.

use std::collections::BTreeMap;

use sqlbean_core::{Connection, HookPhase, Record, Result, Value};
use sqlbean_query::{UpdatePlan, UpdateSource, build_update};

use crate::cache_sync::add;
use crate::{Session, apply_stamps, hooks};

impl<C: Connection> Session<C> {
    /// Update rows from a record's non-zero fields.
    ///
    /// Rows are selected by the statement's explicit conditions (`id`,
    /// `where_sql`, `in_values`). With optimistic versioning the current
    /// version is part of the WHERE clause; a stale version matches nothing
    /// and the call returns `Ok(0)`.
    #[tracing::instrument(level = "debug", skip(self, bean), fields(table = R::table().name()))]
    pub fn update<R: Record>(&mut self, bean: &mut R) -> Result<u64> {
        self.update_bean(bean, None)
    }

    /// Like [`update`](Self::update), additionally matching the non-zero
    /// fields of `cond`.
    #[tracing::instrument(level = "debug", skip(self, bean, cond), fields(table = R::table().name()))]
    pub fn update_with<R: Record>(&mut self, bean: &mut R, cond: &R) -> Result<u64> {
        self.update_bean(bean, Some(cond))
    }

    /// Update `R`'s table from a column -> value map. Every key is written.
    #[tracing::instrument(level = "debug", skip(self, map), fields(table = R::table().name()))]
    pub fn update_map<R: Record>(&mut self, map: &BTreeMap<String, Value>) -> Result<u64> {
        let stmt = self.stmt.take();
        let table = R::table();
        let table_name = stmt.table_name(table).to_string();

        let plan = build_update(&self.build_context(&stmt), table, UpdateSource::Map(map), None)?;
        let cache_plan = self.prepare_update_cache::<R>(stmt.no_cache, &table_name, &plan.statement);
        let affected = self.exec_logged(&plan.statement)?.rows_affected;
        tracing::debug!(rows = affected, "Updated rows from map");

        self.finish_cache::<R>(&table_name, cache_plan);
        Ok(affected)
    }

    fn update_bean<R: Record>(&mut self, bean: &mut R, cond: Option<&R>) -> Result<u64> {
        let stmt = self.stmt.take();
        let table = R::table();
        let table_name = stmt.table_name(table).to_string();
        hooks::run_before(&stmt.before, HookPhase::BeforeUpdate, bean)?;

        let plan = build_update(&self.build_context(&stmt), table, UpdateSource::Bean(&*bean), cond)?;
        let cache_plan = self.prepare_update_cache::<R>(stmt.no_cache, &table_name, &plan.statement);
        let affected = self.exec_logged(&plan.statement)?.rows_affected;
        tracing::debug!(rows = affected, "Updated rows");

        finish_update(bean, &plan, affected)?;
        self.finish_cache::<R>(&table_name, cache_plan);

        let queue = self.hook_queue();
        hooks::run_after(&stmt.after, HookPhase::AfterUpdate, bean, queue)?;
        Ok(affected)
    }
}

/// Copy stamps into the bean and, if any row matched, bump its version.
fn finish_update<R: Record>(bean: &mut R, plan: &UpdatePlan, affected: u64) -> Result<()> {
    apply_stamps(bean, &plan.stamps)?;
    let Some(name) = plan.version.filter(|_| affected > 0) else {
        return Ok(());
    };
    let Some(column) = R::table().column(name).filter(|c| c.is_settable()) else {
        return Ok(());
    };
    if let Some(next) = add(column.get(bean)?, 1) {
        column.set(bean, next)?;
    }
    Ok(())
}
