//! Floor/ceiling market regime detection.
//!
//! Multi-level swing detection on OHLCV bars, a peak table of the legs
//! between swings, a floor/ceiling regime classifier and trading-range bands,
//! indicator overlays with simple strategy backtests, plus a CSV price source
//! and a parallel multi-symbol scanner.

pub mod analysis;
pub mod data;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod scan;

pub use error::{ConfigError, CoreError, InputError};
pub use pipeline::{run_floor_ceiling, FloorCeilingParams, FloorCeilingTables};
