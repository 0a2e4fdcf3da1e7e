//! Core engine: the tick → fetch → decide → purchase → notify loop.

pub mod decision;
pub mod guard;
pub mod scheduler;
pub mod throttle;
