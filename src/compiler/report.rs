//! Human-readable pass reports
//!
//! Reports are plain data returned to the caller; the pass manager also logs
//! each line through `tracing`.

use std::fmt;

use super::mir::MirFunction;
use super::passes::TaintState;
use super::passes::taint::tainted_instructions;

/// Result of taint tracking on one function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaintReport {
    pub function: String,
    /// Textual form of each tainted instruction, in layout order
    pub tainted: Vec<String>,
    /// Textual form of each tainted value written to memory
    pub memory_writes: Vec<String>,
}

impl TaintReport {
    pub fn from_state(func: &MirFunction, state: &TaintState) -> Self {
        Self {
            function: func.name.clone(),
            tainted: tainted_instructions(func, state)
                .into_iter()
                .map(|id| func.display_inst(id).to_string())
                .collect(),
            memory_writes: state
                .memory_writes()
                .iter()
                .map(|&value| func.describe_value(value))
                .collect(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.tainted
            .iter()
            .map(|inst| format!("Tainted: {}", inst))
            .chain(
                self.memory_writes
                    .iter()
                    .map(|value| format!("MWTainted: {}", value)),
            )
            .collect()
    }
}

/// Result of bounds instrumentation on one function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundsReport {
    pub function: String,
    /// Total instructions synthesized, guards and fault block included
    pub instructions_added: usize,
    /// Values carrying a bounds pair when propagation finished
    pub bounded_values: usize,
    /// Merge values that received lower/extent phis
    pub merges: usize,
    pub guarded_stores: usize,
}

impl BoundsReport {
    pub fn lines(&self) -> Vec<String> {
        vec![format!("{} instructions added", self.instructions_added)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassReport {
    Taint(TaintReport),
    Bounds(BoundsReport),
}

impl PassReport {
    pub fn lines(&self) -> Vec<String> {
        match self {
            PassReport::Taint(report) => report.lines(),
            PassReport::Bounds(report) => report.lines(),
        }
    }

    pub fn as_taint(&self) -> Option<&TaintReport> {
        match self {
            PassReport::Taint(report) => Some(report),
            PassReport::Bounds(_) => None,
        }
    }

    pub fn as_bounds(&self) -> Option<&BoundsReport> {
        match self {
            PassReport::Bounds(report) => Some(report),
            PassReport::Taint(_) => None,
        }
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taint_lines_order() {
        let report = TaintReport {
            function: "f".to_string(),
            tainted: vec!["%2 = alloca [8 x i8]".to_string()],
            memory_writes: vec!["%2 = alloca [8 x i8]".to_string()],
        };
        assert_eq!(
            report.lines(),
            vec![
                "Tainted: %2 = alloca [8 x i8]".to_string(),
                "MWTainted: %2 = alloca [8 x i8]".to_string(),
            ]
        );
    }

    #[test]
    fn test_bounds_line() {
        let report = PassReport::Bounds(BoundsReport {
            function: "f".to_string(),
            instructions_added: 15,
            ..Default::default()
        });
        assert_eq!(report.to_string(), "15 instructions added\n");
        assert!(report.as_taint().is_none());
    }
}
