use std::sync::atomic::{AtomicU64, Ordering};

use noscope_types::message::Usage;

/// Cumulative input/output token counter shared across phases and workers.
#[derive(Default)]
pub struct TokenTracker {
    input: AtomicU64,
    output: AtomicU64,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, usage: Usage) {
        self.input.fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output.fetch_add(usage.output_tokens, Ordering::Relaxed);
    }

    pub fn totals(&self) -> Usage {
        Usage {
            input_tokens: self.input.load(Ordering::Relaxed),
            output_tokens: self.output.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_calls() {
        let tracker = TokenTracker::new();
        tracker.add(Usage { input_tokens: 10, output_tokens: 5 });
        tracker.add(Usage { input_tokens: 3, output_tokens: 1 });
        let totals = tracker.totals();
        assert_eq!(totals.input_tokens, 13);
        assert_eq!(totals.output_tokens, 6);
    }
}
