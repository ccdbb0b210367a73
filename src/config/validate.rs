// src/config/validate.rs

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{InitdagError, Result};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = InitdagError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.config, raw.item))
    }
}

/// Structural checks only.
///
/// Unknown `after` names, disabled items and cycles are all legal here: the
/// graph builder drops what it cannot schedule and the scheduler reports
/// whatever can never become ready.
fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    for (idx, item) in plan.item.iter().enumerate() {
        validate_item_name(idx, &item.name)?;

        if let Some(cmd) = &item.cmd {
            if cmd.trim().is_empty() {
                return Err(InitdagError::ConfigError(format!(
                    "item '{}' has an empty `cmd`",
                    item.name
                )));
            }
        }

        for dep in &item.after {
            if dep.trim().is_empty() {
                return Err(InitdagError::ConfigError(format!(
                    "item '{}' has an empty name in `after`",
                    item.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_item_name(idx: usize, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(InitdagError::ConfigError(format!(
            "[[item]] #{} must have a non-empty `name`",
            idx + 1
        )));
    }
    if name.trim() != name {
        return Err(InitdagError::ConfigError(format!(
            "item name '{name}' has leading or trailing whitespace"
        )));
    }
    Ok(())
}
