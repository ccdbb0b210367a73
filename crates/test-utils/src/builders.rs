#![allow(dead_code)]

use initdag::config::{ItemConfig, PlanFile, PlanSection, RawPlanFile};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanBuilder {
    plan: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                config: PlanSection::default(),
                item: Vec::new(),
            },
        }
    }

    pub fn with_item(mut self, item: ItemConfig) -> Self {
        self.plan.item.push(item);
        self
    }

    pub fn warn_on_cycles(mut self, val: bool) -> Self {
        self.plan.config.warn_on_cycles = val;
        self
    }

    pub fn raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ItemConfig`.
pub struct ItemBuilder {
    item: ItemConfig,
}

impl ItemBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            item: ItemConfig {
                name: name.to_string(),
                cmd: None,
                after: vec![],
                enabled: true,
            },
        }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.item.cmd = Some(cmd.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.item.after.push(dep.to_string());
        self
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.item.enabled = val;
        self
    }

    pub fn build(self) -> ItemConfig {
        self.item
    }
}
