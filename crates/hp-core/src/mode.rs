//! Run modes shared by every plant entity.

use core::fmt;

/// Operating mode of an entity (or of the plant as a whole).
///
/// `Auto` only makes sense on an entity: it defers to the global mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunMode {
    /// No heating, no DHW. Frost protection stays active.
    Off,
    /// Follow the plant-wide mode.
    #[default]
    Auto,
    /// Comfort setpoints.
    Comfort,
    /// Reduced setpoints.
    Eco,
    /// Frost protection setpoints only.
    FrostFree,
    /// Domestic hot water only; space heating off.
    DhwOnly,
    /// Operator override: actuators forced to a fixed safe state.
    Manual,
    /// Commissioning: actuators exercised, laws bypassed.
    Test,
}

impl RunMode {
    /// Resolve `Auto` against the global mode. The global mode itself
    /// must never be `Auto`.
    pub fn resolve(self, global: RunMode) -> RunMode {
        match self {
            RunMode::Auto => global,
            other => other,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::Off => "off",
            RunMode::Auto => "auto",
            RunMode::Comfort => "comfort",
            RunMode::Eco => "eco",
            RunMode::FrostFree => "frostfree",
            RunMode::DhwOnly => "dhwonly",
            RunMode::Manual => "manual",
            RunMode::Test => "test",
        };
        f.write_str(s)
    }
}
