//! Request-id generation.
//!
//! Ids are snowflake-style: a 63-bit integer composed of a millisecond
//! timestamp, a node component and a per-millisecond sequence, so ids sort
//! by issue time. The generator is owned by the application object rather
//! than being process-global, so independent instances can coexist in tests.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const NODE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const NODE_MAX: u64 = (1 << NODE_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Custom epoch (2020-01-01T00:00:00Z) keeps ids within 63 bits for decades.
const EPOCH_MILLIS: u64 = 1_577_836_800_000;

/// Timestamp-ordered unique id generator.
#[derive(Debug)]
pub struct RequestIdGenerator {
    node_id: u64,
    state: Mutex<ClockState>,
}

#[derive(Debug)]
struct ClockState {
    last_millis: u64,
    sequence: u64,
}

impl RequestIdGenerator {
    /// Generator with a random node component.
    pub fn new() -> Self {
        Self::with_node_id(rand::random::<u64>() & NODE_MAX)
    }

    /// Generator with an explicit node component (masked to 10 bits).
    pub fn with_node_id(node_id: u64) -> Self {
        Self {
            node_id: node_id & NODE_MAX,
            state: Mutex::new(ClockState {
                last_millis: 0,
                sequence: 0,
            }),
        }
    }

    /// Next id as a 63-bit integer.
    pub fn next_id(&self) -> u64 {
        let mut state = self.state.lock();
        let mut now = current_millis();

        // Never move backwards: a clock step back reuses the last observed
        // millisecond so ordering stays monotonic.
        if now < state.last_millis {
            now = state.last_millis;
        }

        if now == state.last_millis {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted within this millisecond; spin to the next.
                while now <= state.last_millis {
                    now = current_millis();
                }
            }
        } else {
            state.sequence = 0;
        }
        state.last_millis = now;

        let elapsed = now.saturating_sub(EPOCH_MILLIS);
        (elapsed << (NODE_BITS + SEQUENCE_BITS)) | (self.node_id << SEQUENCE_BITS) | state.sequence
    }

    /// Next id in decimal string form, as carried in envelopes and logs.
    pub fn next_string(&self) -> String {
        self.next_id().to_string()
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
