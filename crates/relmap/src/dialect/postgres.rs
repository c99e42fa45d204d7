use super::Dialect;
use crate::error::OrmResult;
use std::fmt::Write;

/// PostgreSQL: `$n` placeholders, `LIMIT`/`OFFSET`, `FOR UPDATE [NOWAIT]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn write_param(&self, out: &mut String, index: usize, cast: Option<&str>) {
        let _ = write!(out, "${index}");
        if let Some(ty) = cast {
            out.push_str("::");
            out.push_str(ty);
        }
    }

    fn supports_offset(&self) -> bool {
        true
    }

    fn write_limit(&self, out: &mut String, limit: Option<u64>, offset: Option<u64>) -> OrmResult<()> {
        if let Some(limit) = limit {
            let _ = write!(out, " LIMIT {limit}");
        }
        if let Some(offset) = offset.filter(|&o| o > 0) {
            let _ = write!(out, " OFFSET {offset}");
        }
        Ok(())
    }

    fn write_for_update(&self, out: &mut String, wait: Option<u32>) {
        out.push_str(" FOR UPDATE");
        match wait {
            Some(0) => out.push_str(" NOWAIT"),
            // No per-statement wait clause; lock_timeout is a session setting.
            Some(seconds) => tracing::debug!(
                target: "relmap.sql",
                seconds,
                "postgres has no FOR UPDATE WAIT, waiting indefinitely"
            ),
            None => {}
        }
    }
}
