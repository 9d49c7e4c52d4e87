// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static AI_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter_vec("coach_ai_requests_total", "Completion requests by outcome", &["outcome"])
});

pub static DEMO_SEEDS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter_vec("coach_demo_seeds_total", "Demo seeding runs by outcome", &["outcome"])
});

pub static USERS_REGISTERED: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("coach_users_registered_total", "Users created on first login")
        .expect("valid counter definition");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
});

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter =
        IntCounterVec::new(Opts::new(name, help), labels).expect("valid counter definition");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

/// Renders all registered metrics in the prometheus text format.
pub fn gather() -> String {
    // Touch the lazies so every family shows up even before first use
    Lazy::force(&AI_REQUESTS);
    Lazy::force(&DEMO_SEEDS);
    Lazy::force(&USERS_REGISTERED);

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
