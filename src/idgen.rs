// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

//! Time-ordered 64-bit identifiers.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;

/// Milliseconds of the snowflake epoch (2010-11-04T01:42:54.657Z)
pub const EPOCH_MS: i64 = 1_288_834_974_657;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE: i64 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;
const TIME_SHIFT: u32 = NODE_BITS + SEQUENCE_BITS;

/// Source of fresh, unique identifiers
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> i64;

    /// Smallest id this source could hand out at `time`.
    fn id_at(&self, time: DateTime<Utc>) -> i64;
}

struct State {
    last_ms: i64,
    sequence: i64,
}

/// Snowflake generator: 41-bit timestamp, 10-bit node, 12-bit sequence
pub struct Snowflake {
    node: i64,
    state: Mutex<State>,
}

impl Snowflake {
    pub fn new(node: i64) -> Self {
        Self {
            node: node & MAX_NODE,
            state: Mutex::new(State { last_ms: 0, sequence: 0 }),
        }
    }

    /// Generator with a node id picked at random
    pub fn with_random_node() -> Self {
        Self::new(rand::thread_rng().gen_range(0..=MAX_NODE))
    }

    pub fn node(&self) -> i64 {
        self.node
    }

    /// Creation time encoded in an id.
    pub fn time_of(id: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((id >> TIME_SHIFT) + EPOCH_MS)
    }
}

impl IdSource for Snowflake {
    fn next_id(&self) -> i64 {
        loop {
            let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // never go backwards, even if the wall clock does
            let now = Utc::now().timestamp_millis().max(state.last_ms);
            if now > state.last_ms {
                state.last_ms = now;
                state.sequence = 0;
            } else if state.sequence < MAX_SEQUENCE {
                state.sequence += 1;
            } else {
                // sequence exhausted for this millisecond; wait unlocked
                drop(state);
                std::thread::sleep(Duration::from_micros(100));
                continue;
            }
            return ((now - EPOCH_MS) << TIME_SHIFT) | (self.node << SEQUENCE_BITS) | state.sequence;
        }
    }

    fn id_at(&self, time: DateTime<Utc>) -> i64 {
        (time.timestamp_millis() - EPOCH_MS).max(0) << TIME_SHIFT
    }
}
