//! Reference clock tick abstraction
//!
//! All engines are stepped once per reference tick. Where that tick comes
//! from is up to the implementation: a virtual counter for simulation or a
//! delay for pins on real hardware.

/// Source of reference clock ticks
pub trait TickSource {
    /// Wait until the next reference tick
    ///
    /// Virtual clocks return immediately; timed sources block for one
    /// tick period.
    fn wait_tick(&mut self);

    /// Number of ticks elapsed since creation
    fn ticks(&self) -> u64;
}
