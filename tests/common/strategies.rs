//! Proptest strategies for relay naming, backoff, and listener values.

#![allow(dead_code)] // Not every test binary uses every strategy

use proptest::prelude::*;
use relay_core::config::ListenerConfig;

/// Strategy for generating broker entity names
pub fn entity_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,24}"
}

/// Strategy for generating topic subscription names (always non-empty)
pub fn subscription_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,16}"
}

/// Strategy for generating a binding target; empty means a queue listener
pub fn binding_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(String::new()),
        3 => subscription_name_strategy(),
    ]
}

/// Strategy for generating processor identifiers
pub fn processor_id_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,24}"
}

/// Strategy for generating backoff multipliers from the values operators
/// actually configure
pub fn backoff_multiplier_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(1.0),
        Just(1.25),
        Just(1.5),
        Just(2.0),
        Just(3.0),
    ]
}

/// Strategy for generating (base seconds, multiplier, cap seconds) tunings
pub fn backoff_tuning_strategy() -> impl Strategy<Value = (u64, f64, u64)> {
    (0u64..=10, backoff_multiplier_strategy(), 1u64..=120)
}

/// Strategy for generating listener configurations that pass validation
pub fn valid_listener_strategy() -> impl Strategy<Value = ListenerConfig> {
    (
        entity_name_strategy(),
        binding_strategy(),
        processor_id_strategy(),
        1usize..=16,
        0i32..=10,
        1usize..=4,
    )
        .prop_map(
            |(
                entity_name,
                subscription_name,
                processor_id,
                worker_slots,
                retry_threshold,
                instance_count,
            )| {
                ListenerConfig {
                    entity_name,
                    owner: "relay_tests".to_string(),
                    subscription_name,
                    processor_id,
                    worker_slots,
                    retry_threshold,
                    instance_count,
                    enabled: true,
                }
            },
        )
}
