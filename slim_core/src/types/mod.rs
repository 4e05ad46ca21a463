//! Validated value types shared across analysis, optimization, and
//! prediction.

mod method;
mod probe;
mod quality;

pub use method::Method;
pub use probe::ProbeValue;
pub use quality::Quality;
