use super::Dialect;
use crate::error::{OrmError, OrmResult};
use std::fmt::Write;

/// ANSI SQL: `?` placeholders, `FETCH FIRST n ROWS ONLY`, no native OFFSET,
/// `FOR UPDATE WAIT n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDialect;

impl Dialect for StandardDialect {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn write_param(&self, out: &mut String, _index: usize, cast: Option<&str>) {
        match cast {
            Some(ty) => {
                let _ = write!(out, "CAST(? AS {ty})");
            }
            None => out.push('?'),
        }
    }

    fn supports_offset(&self) -> bool {
        false
    }

    fn write_limit(&self, out: &mut String, limit: Option<u64>, offset: Option<u64>) -> OrmResult<()> {
        if offset.is_some_and(|o| o > 0) {
            return Err(OrmError::invalid_state(
                "the standard dialect cannot render OFFSET",
            ));
        }
        if let Some(limit) = limit {
            let _ = write!(out, " FETCH FIRST {limit} ROWS ONLY");
        }
        Ok(())
    }

    fn write_for_update(&self, out: &mut String, wait: Option<u32>) {
        out.push_str(" FOR UPDATE");
        match wait {
            Some(0) => out.push_str(" NOWAIT"),
            Some(seconds) => {
                let _ = write!(out, " WAIT {seconds}");
            }
            None => {}
        }
    }
}
