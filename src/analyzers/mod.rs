//! Period bucketing and rolling-average statistics.
//!
//! Dwell times at stops and travel times along edges are both aggregated
//! through [`RollingAverages`], one average per enabled [`Period`].

pub mod period;
pub mod rolling;
mod utility;

pub use period::{Period, PeriodWindow};
pub use rolling::{RollingAverages, TimedSample};
