//! State codec
//!
//! The harness hands the engine an opaque text blob each tick and stores
//! whatever comes back. The engine state goes through it as JSON.

use crate::engine::EngineState;
use crate::error::CodecError;

pub fn encode(state: &EngineState) -> Result<String, CodecError> {
    serde_json::to_string(state).map_err(|e| CodecError::Encode(e.to_string()))
}

pub fn decode(blob: &str) -> Result<EngineState, CodecError> {
    serde_json::from_str(blob).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::process_tick;
    use meridian_core::{MarketSnapshot, OrderBookSnapshot};
    use rust_decimal_macros::dec;

    #[test]
    fn test_fresh_state_round_trip() {
        let state = EngineState::new(&EngineConfig::with_default_strategies());
        let blob = encode(&state).unwrap();
        assert_eq!(decode(&blob).unwrap(), state);
    }

    #[test]
    fn test_state_with_history_round_trip() {
        let mut state = EngineState::new(&EngineConfig::with_default_strategies());
        for t in 0..30i64 {
            let mid = dec!(5000) + rust_decimal::Decimal::from(t % 4);
            let book = OrderBookSnapshot::from_levels(
                &[(mid - dec!(1), 10)],
                &[(mid + dec!(2), 10)],
            );
            let snapshot = MarketSnapshot::new(t * 100)
                .with_book("STARFRUIT", book.clone())
                .with_book("AMETHYSTS", book);
            state = process_tick(state, &snapshot).0;
        }

        let blob = encode(&state).unwrap();
        let restored = decode(&blob).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.ticks, 30);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode("not a state"), Err(CodecError::Decode(_))));
        assert!(matches!(decode(""), Err(CodecError::Decode(_))));
    }
}
