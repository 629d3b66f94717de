use serde::{Deserialize, Serialize};

/// A named segment of the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Plan,
    Request,
    Build,
    Harden,
    Verify,
    Handoff,
}

impl Phase {
    pub const ORDER: [Phase; 6] = [
        Phase::Plan,
        Phase::Request,
        Phase::Build,
        Phase::Harden,
        Phase::Verify,
        Phase::Handoff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Plan => "PLAN",
            Phase::Request => "REQUEST",
            Phase::Build => "BUILD",
            Phase::Harden => "HARDEN",
            Phase::Verify => "VERIFY",
            Phase::Handoff => "HANDOFF",
        }
    }

    /// Default fractional share of the total timebox. Must sum to 1.0.
    pub fn default_allocation(self) -> f64 {
        match self {
            Phase::Plan => 0.10,
            Phase::Request => 0.00,
            Phase::Build => 0.50,
            Phase::Harden => 0.25,
            Phase::Verify => 0.10,
            Phase::Handoff => 0.05,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allocation_sums_to_one() {
        let total: f64 = Phase::ORDER.iter().map(|p| p.default_allocation()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
