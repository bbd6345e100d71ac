use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// The kind of entity that owns a script engine.
///
/// Each category has its own program and its own native function table.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
)]
pub enum EntityCategory {
    /// A building.
    Structure,
    /// A mobile unit.
    Unit,
    /// A team of units.
    Team,
    /// An owner that is none of the above.
    #[default]
    Unknown,
}

impl EntityCategory {
    /// The lowercase name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            EntityCategory::Structure => "structure",
            EntityCategory::Unit => "unit",
            EntityCategory::Team => "team",
            EntityCategory::Unknown => "unknown",
        }
    }
}

impl Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The entity that owns a script engine.
///
/// Native functions receive the owner mutably through [`crate::ScriptContext`]; the engine only
/// reads these accessors to label diagnostics.
pub trait ScriptOwner {
    /// The category of the owner.
    fn category(&self) -> EntityCategory {
        EntityCategory::Unknown
    }

    /// The index of the owner within its category's pool.
    fn index(&self) -> u16 {
        0
    }

    /// The subtype of the owner, which selects its entry offset.
    fn subtype(&self) -> u16 {
        0
    }
}

impl ScriptOwner for () {}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn names() {
        let names: Vec<_> = EntityCategory::iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["structure", "unit", "team", "unknown"]);
    }

    #[test]
    fn unit_owner_is_unknown() {
        assert_eq!(().category(), EntityCategory::Unknown);
        assert_eq!(().index(), 0);
    }
}
