//! Meridian Runner - Tick engine and harness plumbing
//!
//! Wires the strategies into a single deterministic call per tick:
//!
//! - **Config**: limits and strategy set, loaded from JSON
//! - **Engine**: `process_tick(state, snapshot) -> (state, decision)`
//! - **Codec**: engine state to and from the opaque text blob
//! - **Trader**: harness adapter that carries the blob between ticks
//! - **Feed / Replay**: synthetic snapshots and a fill simulator for
//!   exercising the engine over many ticks
//!
//! ## Architecture
//!
//! ```text
//!   trader_data (text)              MarketSnapshot
//!          │                               │
//!          ▼                               ▼
//!   ┌─────────────┐   EngineState   ┌─────────────────┐
//!   │   codec     │ ──────────────▶ │     engine      │
//!   │ decode/enc. │ ◀────────────── │  process_tick   │
//!   └─────────────┘   EngineState   └────────┬────────┘
//!                                            │ TickDecision
//!                                            ▼
//!                                 orders per instrument,
//!                                 conversion request
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod replay;
pub mod trader;

// Re-export main types
pub use codec::{decode, encode};
pub use config::EngineConfig;
pub use engine::{EngineState, TickDecision, process_tick};
pub use error::{CodecError, ConfigError};
pub use feed::{FeedConfig, SyntheticFeed};
pub use replay::{ReplaySession, ReplaySummary};
pub use trader::{TickOutput, Trader};
