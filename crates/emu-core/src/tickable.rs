//! Trait for components that can be advanced by clock ticks.

/// A component advanced one master clock at a time.
pub trait Tickable {
    /// Advance by one master clock tick.
    fn tick(&mut self);

    /// Advance by `count` ticks. Overrides must behave exactly like the
    /// default loop.
    fn tick_n(&mut self, count: u64) {
        for _ in 0..count {
            self.tick();
        }
    }
}
