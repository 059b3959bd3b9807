//! INSERT operations.

use std::collections::BTreeMap;

use sqlbean_core::codec::decode_value;
use sqlbean_core::{
    AutoIncrStrategy, Connection, DecodeContext, Error, HookPhase, Record, Result, Value,
};
use sqlbean_query::{InsertPlan, build_insert, build_insert_map, build_insert_multi, sequence_query};

use crate::{Session, apply_stamps, hooks};

impl<C: Connection> Session<C> {
    /// Insert one record.
    ///
    /// On success the generated id, auto-time stamps and the initial version
    /// are written back into `bean`. Returns the number of inserted rows.
    #[tracing::instrument(level = "debug", skip(self, bean), fields(table = R::table().name()))]
    pub fn insert<R: Record>(&mut self, bean: &mut R) -> Result<u64> {
        let stmt = self.stmt.take();
        let table = R::table();
        let table_name = stmt.table_name(table).to_string();
        hooks::run_before(&stmt.before, HookPhase::BeforeInsert, bean)?;

        let plan = build_insert(&self.build_context(&stmt), table, bean)?;
        let (affected, id) = self.execute_insert(&plan, &table_name)?;
        tracing::debug!(rows = affected, id = ?id, "Inserted record");

        if let (Some(column), Some(id)) = (plan.id_column, id) {
            self.write_back(bean, column, id)?;
        }
        self.finish_insert(bean, &plan)?;
        self.finish_insert_cache(&table_name);

        let queue = self.hook_queue();
        hooks::run_after(&stmt.after, HookPhase::AfterInsert, bean, queue)?;
        Ok(affected)
    }

    /// Insert many records of one type with a single statement.
    ///
    /// Hooks run per record. Generated ids are not read back.
    #[tracing::instrument(level = "debug", skip(self, beans), fields(table = R::table().name(), count = beans.len()))]
    pub fn insert_multi<R: Record>(&mut self, beans: &mut [R]) -> Result<u64> {
        let stmt = self.stmt.take();
        let table = R::table();
        let table_name = stmt.table_name(table).to_string();
        if beans.is_empty() {
            return Err(Error::Param(
                "multi-row insert needs a non-empty slice of records".to_string(),
            ));
        }
        for bean in beans.iter_mut() {
            hooks::run_before(&stmt.before, HookPhase::BeforeInsert, bean)?;
        }

        let plan = build_insert_multi(&self.build_context(&stmt), table, beans)?;
        let affected = self.exec_logged(&plan.statement)?.rows_affected;
        tracing::debug!(rows = affected, "Inserted records");

        for bean in beans.iter_mut() {
            self.finish_insert(bean, &plan)?;
        }
        self.finish_insert_cache(&table_name);

        for bean in beans.iter_mut() {
            let queue = self.hook_queue();
            hooks::run_after(&stmt.after, HookPhase::AfterInsert, bean, queue)?;
        }
        Ok(affected)
    }

    /// Insert a row from a column -> value map into `R`'s table.
    ///
    /// No record exists, so no hooks run.
    #[tracing::instrument(level = "debug", skip(self, map), fields(table = R::table().name()))]
    pub fn insert_map<R: Record>(&mut self, map: &BTreeMap<String, Value>) -> Result<u64> {
        let stmt = self.stmt.take();
        let table = R::table();
        let statement = build_insert_map(&self.build_context(&stmt), table, map)?;
        let affected = self.exec_logged(&statement)?.rows_affected;
        self.finish_insert_cache(stmt.table_name(table));
        Ok(affected)
    }

    /// Run the statement the way the dialect reports generated ids.
    fn execute_insert(&self, plan: &InsertPlan, table_name: &str) -> Result<(u64, Option<i64>)> {
        if plan.id_column.is_none() {
            return Ok((self.exec_logged(&plan.statement)?.rows_affected, None));
        }
        match plan.strategy {
            AutoIncrStrategy::Returning | AutoIncrStrategy::Output => {
                let rows = self.query_logged(&plan.statement.sql, &plan.statement.args)?;
                let Some(row) = rows.first() else {
                    return Err(Error::Custom(
                        "insert succeeded but no generated id was returned".to_string(),
                    ));
                };
                Ok((1, row.get(0).and_then(Value::as_i64)))
            }
            AutoIncrStrategy::Sequence => {
                let affected = self.exec_logged(&plan.statement)?.rows_affected;
                let rows = self.query_logged(&sequence_query(table_name), &[])?;
                let id = rows.first().and_then(|r| r.get(0)).and_then(Value::as_i64);
                Ok((affected, id))
            }
            AutoIncrStrategy::LastInsertId => {
                let result = self.exec_logged(&plan.statement)?;
                Ok((result.rows_affected, result.last_insert_id.filter(|id| *id > 0)))
            }
        }
    }

    /// Store an integer produced by the database into a field.
    fn write_back<R: Record>(&self, bean: &mut R, column: &str, raw: i64) -> Result<()> {
        let Some(column) = R::table().column(column).filter(|c| c.is_settable()) else {
            return Ok(());
        };
        let ctx = DecodeContext::new(self.codec_config());
        let value = decode_value(column.info(), &Value::BigInt(raw), &ctx)?;
        column.set(bean, value)
    }

    fn finish_insert<R: Record>(&self, bean: &mut R, plan: &InsertPlan) -> Result<()> {
        apply_stamps(bean, &plan.stamps)?;
        if let Some(version) = plan.version {
            self.write_back(bean, version, 1)?;
        }
        Ok(())
    }
}
