//! Core engine — odds math, fees, the arbitrage and EV detectors, the
//! cross-venue matcher, human-readable formatting, and the Scanner that
//! orchestrates a scan cycle end to end.

pub mod arbitrage;
pub mod ev;
pub mod fees;
pub mod format;
pub mod matcher;
pub mod odds;
pub mod scanner;
