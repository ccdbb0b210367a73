// src/config/model.rs

use serde::Deserialize;

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// warn_on_cycles = true
///
/// [[item]]
/// name = "settings"
/// cmd = "./load-settings.sh"
///
/// [[item]]
/// name = "database"
/// cmd = "./migrate.sh"
/// after = ["settings"]
/// ```
///
/// Items keep their file order, which is also the order ready tasks are
/// launched in.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPlanFile {
    #[serde(default)]
    pub config: PlanSection,

    #[serde(default)]
    pub item: Vec<ItemConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanSection {
    /// Log a warning before each run if the plan contains a dependency cycle.
    #[serde(default = "default_true")]
    pub warn_on_cycles: bool,
}

impl Default for PlanSection {
    fn default() -> Self {
        Self {
            warn_on_cycles: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One `[[item]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemConfig {
    /// Name of the task this item schedules.
    pub name: String,

    /// Shell command run as the task's work.
    ///
    /// Items without a command need a task registered under `name`;
    /// otherwise they are skipped.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Names of the tasks this one waits for.
    #[serde(default)]
    pub after: Vec<String>,

    /// Disabled items are not scheduled and never satisfy a dependency.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A validated plan. Build one with `PlanFile::try_from(raw)` or the loader.
#[derive(Debug, Clone)]
pub struct PlanFile {
    config: PlanSection,
    items: Vec<ItemConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(config: PlanSection, items: Vec<ItemConfig>) -> Self {
        Self { config, items }
    }

    pub fn config(&self) -> &PlanSection {
        &self.config
    }

    pub fn items(&self) -> &[ItemConfig] {
        &self.items
    }
}
