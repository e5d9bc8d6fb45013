use std::collections::HashMap;

/// Per-identity recognition counters for one pipeline run.
///
/// Counters only grow; the whole state is discarded with [`reset`](Self::reset)
/// when the pipeline restarts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThrottleState {
    counters: HashMap<String, u64>,
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, identity: &str) -> u64 {
        self.counters.get(identity).copied().unwrap_or(0)
    }

    /// Increments the counter for `identity`, returning its previous value.
    pub fn record(&mut self, identity: &str) -> u64 {
        let counter = self.counters.entry(identity.to_string()).or_insert(0);
        let previous = *counter;
        *counter += 1;
        previous
    }

    pub fn reset(&mut self) {
        self.counters.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
