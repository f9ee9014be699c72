/// Resource limits applied while merging rooms and polling for cancellation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Limits {
    /// Largest product state space a merge may allocate.
    pub max_states: usize,
    /// Largest variant catalog a merge may emit.
    pub max_variants: usize,
    /// Number of loop iterations between two progress polls.
    pub tick_interval: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_states: 1 << 24,
            max_variants: 1 << 26,
            tick_interval: 4096,
        }
    }
}

impl Limits {
    /// No caps on states or variants; only the poll interval is kept.
    pub fn unbounded() -> Self {
        Self {
            max_states: usize::MAX,
            max_variants: usize::MAX,
            ..Self::default()
        }
    }

    /// Cap the product state space of a merge.
    pub fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = max_states;
        self
    }

    /// Cap the variant catalog of a merged room.
    pub fn with_max_variants(mut self, max_variants: usize) -> Self {
        self.max_variants = max_variants;
        self
    }

    /// A zero interval is treated as one, polling on every iteration.
    pub fn with_tick_interval(mut self, tick_interval: u64) -> Self {
        self.tick_interval = tick_interval.max(1);
        self
    }
}
