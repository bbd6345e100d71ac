use std::str::FromStr;

use tracing::warn;

const DEFAULT_INSTRUCTION_BUDGET: usize = 50;
const DEFAULT_TICKS_PER_DELAY_UNIT: u16 = 5;

/// Options for running script engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptOpts {
    /// The most instructions one engine may execute per scheduler tick.
    pub instruction_budget: usize,
    /// The divisor the delay native applies to its argument.
    pub ticks_per_delay_unit: u16,
}

impl Default for ScriptOpts {
    fn default() -> Self {
        Self {
            instruction_budget: DEFAULT_INSTRUCTION_BUDGET,
            ticks_per_delay_unit: DEFAULT_TICKS_PER_DELAY_UNIT,
        }
    }
}

fn var_or<T: FromStr + PartialOrd + Default>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => match value.parse::<T>() {
            Ok(parsed) if parsed > T::default() => parsed,
            _ => {
                warn!(name, %value, "ignoring invalid value");
                default
            }
        },
        Err(_) => default,
    }
}

impl ScriptOpts {
    /// The defaults, overridden by `EMC_INSTRUCTION_BUDGET` and `EMC_TICKS_PER_DELAY_UNIT`.
    ///
    /// Values that do not parse as a positive integer are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            instruction_budget: var_or("EMC_INSTRUCTION_BUDGET", DEFAULT_INSTRUCTION_BUDGET),
            ticks_per_delay_unit: var_or("EMC_TICKS_PER_DELAY_UNIT", DEFAULT_TICKS_PER_DELAY_UNIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ScriptOpts::default();
        assert_eq!(opts.instruction_budget, 50);
        assert_eq!(opts.ticks_per_delay_unit, 5);
    }

    #[test]
    fn env_overrides() {
        // Only this test touches these variables.
        std::env::set_var("EMC_INSTRUCTION_BUDGET", "7");
        std::env::set_var("EMC_TICKS_PER_DELAY_UNIT", "zero");
        let opts = ScriptOpts::from_env();
        std::env::remove_var("EMC_INSTRUCTION_BUDGET");
        std::env::remove_var("EMC_TICKS_PER_DELAY_UNIT");

        assert_eq!(opts.instruction_budget, 7);
        assert_eq!(opts.ticks_per_delay_unit, 5);
    }
}
