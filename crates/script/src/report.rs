use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    hash::Hash,
    ops::{Add, AddAssign},
};

use hashbrown::{hash_map::Entry, HashMap};

use crate::Opcode;

/// An execution report.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// The number of times each opcode was dispatched.
    pub opcode_counts: HashMap<Opcode, u64>,
    /// The number of calls made to each native function slot.
    pub function_counts: HashMap<u16, u64>,
    /// The number of times an engine halted on an error or an explicit stop.
    pub halts: u64,
}

impl ExecutionReport {
    /// Compute the total number of instructions run.
    #[must_use]
    pub fn total_instruction_count(&self) -> u64 {
        self.opcode_counts.values().sum()
    }

    /// Compute the total number of native calls made.
    #[must_use]
    pub fn total_function_count(&self) -> u64 {
        self.function_counts.values().sum()
    }
}

/// Combines two `HashMap`s together. If a key is in both maps, the values are added together.
fn hashmap_add_assign<K, V>(lhs: &mut HashMap<K, V>, rhs: HashMap<K, V>)
where
    K: Eq + Hash,
    V: AddAssign,
{
    for (k, v) in rhs {
        match lhs.entry(k) {
            Entry::Occupied(e) => *e.into_mut() += v,
            Entry::Vacant(e) => drop(e.insert(v)),
        }
    }
}

/// Format a count table with the largest counts first, ties broken by key.
fn sorted_table_lines<K: Display + Ord>(table: &HashMap<K, u64>) -> Vec<String> {
    let mut entries: Vec<_> = table.iter().collect();
    entries.sort_by(|(ka, va), (kb, vb)| vb.cmp(va).then_with(|| ka.cmp(kb)));

    let width = entries.iter().map(|(k, _)| k.to_string().len()).max().unwrap_or(0);
    entries.into_iter().map(|(k, v)| format!("{:<width$} {v:>8}", k.to_string())).collect()
}

impl AddAssign for ExecutionReport {
    fn add_assign(&mut self, rhs: Self) {
        hashmap_add_assign(&mut self.opcode_counts, rhs.opcode_counts);
        hashmap_add_assign(&mut self.function_counts, rhs.function_counts);
        self.halts += rhs.halts;
    }
}

impl Add for ExecutionReport {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl Display for ExecutionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "opcode counts ({} total instructions):", self.total_instruction_count())?;
        for line in sorted_table_lines(&self.opcode_counts) {
            writeln!(f, "  {line}")?;
        }

        writeln!(f, "function counts ({} total calls):", self.total_function_count())?;
        for line in sorted_table_lines(&self.function_counts) {
            writeln!(f, "  {line}")?;
        }

        writeln!(f, "halts: {}", self.halts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_merges_counts() {
        let mut a = ExecutionReport::default();
        a.opcode_counts.insert(Opcode::PUSH, 2);
        a.function_counts.insert(0, 1);

        let mut b = ExecutionReport::default();
        b.opcode_counts.insert(Opcode::PUSH, 3);
        b.opcode_counts.insert(Opcode::RETURN, 1);
        b.halts = 1;

        let sum = a + b;
        assert_eq!(sum.opcode_counts[&Opcode::PUSH], 5);
        assert_eq!(sum.opcode_counts[&Opcode::RETURN], 1);
        assert_eq!(sum.total_instruction_count(), 6);
        assert_eq!(sum.total_function_count(), 1);
        assert_eq!(sum.halts, 1);
    }

    #[test]
    fn display_sorts_by_count() {
        let mut report = ExecutionReport::default();
        report.opcode_counts.insert(Opcode::RETURN, 1);
        report.opcode_counts.insert(Opcode::PUSH, 4);
        report.opcode_counts.insert(Opcode::BINARY, 1);

        let text = report.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "opcode counts (6 total instructions):");
        assert!(lines[1].trim_start().starts_with("push "));
        assert!(lines[2].trim_start().starts_with("binary"));
        assert!(lines[3].trim_start().starts_with("ret"));
        assert_eq!(lines.last(), Some(&"halts: 0"));
    }
}
