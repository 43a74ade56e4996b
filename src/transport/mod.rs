//! The `transport` module glues HTTP bodies to the session engine.
//!
//! Each polling request carries zero or more encoded messages; the matching
//! response carries the next batch of due messages for the same scope.

pub mod cycle;

pub use cycle::CycleDriver;

#[cfg(test)]
mod tests;
