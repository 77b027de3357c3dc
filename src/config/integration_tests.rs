// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::load_and_validate_config;

/// The shipped sample config loads and maps onto engine settings
#[test]
fn test_engine_yaml_loading() {
    let config = load_and_validate_config("configs/engine.yaml").unwrap();

    assert_eq!(config.executor_options.max_parallel_steps, Some(4));
    assert!(config.cache.get_enabled());
    assert!(config.cache.get_store_results());
    assert_eq!(config.events.get_capacity(), 512);
    assert_eq!(config.logging.get_filter(), "the_slotflow=info");

    let settings = config.run_settings();
    assert_eq!(settings.max_parallel_steps, 4);
    assert!(settings.use_cache);
    assert_eq!(config.queue_options().event_capacity, 512);
}

#[test]
fn test_sequential_yaml_disables_cache() {
    let config = load_and_validate_config("configs/sequential.yaml").unwrap();
    let settings = config.run_settings();

    assert_eq!(settings.max_parallel_steps, 1);
    assert!(!settings.use_cache);
    assert!(!settings.store_to_cache);
    // Sections left out of the file keep their defaults
    assert_eq!(config.logging.get_filter(), "info");
}
