//! Shared fixtures for integration tests

#![allow(dead_code)]

use slotdeck_core::api::{MemoryApi, Snapshot};
use slotdeck_core::config::ConsoleConfig;
use slotdeck_core::Console;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A small cluster: two allow-listed registries, one that is not, and a
/// fractional-GPU cluster
pub fn fixture_snapshot() -> Snapshot {
    serde_json::from_value(serde_json::json!({
        "images": [
            {
                "registry": "cr.backend.ai",
                "name": "stable/python",
                "tag": "3.9-ubuntu20.04",
                "architecture": "x86_64",
                "installed": true,
                "labels": [{"key": "ai.backend.role", "value": "COMPUTE"}],
                "resource_limits": [
                    {"key": "cpu", "min": "1", "max": "4"},
                    {"key": "mem", "min": "1g", "max": null}
                ]
            },
            {
                "registry": "cr.backend.ai",
                "name": "stable/python-tensorflow",
                "tag": "2.12-py38-cuda11.8",
                "architecture": "x86_64",
                "installed": false,
                "supported_accelerators": ["cuda", ""],
                "resource_limits": [
                    {"key": "cpu", "min": "1", "max": null},
                    {"key": "mem", "min": "2g", "max": "32g"},
                    {"key": "cuda.device", "min": "1", "max": null},
                    {"key": "cuda.shares", "min": 0.1, "max": null}
                ]
            },
            {
                "registry": "index.docker.io",
                "name": "lablup/lua",
                "tag": "5.3-alpine3.8",
                "architecture": "aarch64",
                "installed": false,
                "resource_limits": [
                    {"key": "cpu", "min": "1", "max": "2"},
                    {"key": "mem", "min": "512m", "max": "2g"}
                ]
            },
            {
                "registry": "other.example.com",
                "name": "team/custom",
                "tag": "1.0",
                "architecture": "x86_64",
                "installed": true
            }
        ],
        "resource_slots": {"cpu": "count", "mem": "bytes", "cuda.shares": "count"},
        "allowed_registries": {"default": ["cr.backend.ai", "index.docker.io"]},
        "registries": {
            "cr.backend.ai": {"": "https://cr.backend.ai", "type": "harbor2", "project": "stable"},
            "index.docker.io": "https://registry-1.docker.io",
            "other.example.com": {"": "https://other.example.com"}
        },
        "presets": {
            "small": {"name": "small", "resource_slots": {"cpu": "1", "mem": "2g"}, "shared_memory": "512m"}
        }
    }))
    .expect("fixture snapshot is valid")
}

/// Console over the fixture snapshot with built-in configuration
pub fn fixture_console() -> Console<MemoryApi> {
    init_test_logging();
    let config = ConsoleConfig::builtin().expect("built-in config parses");
    Console::new(MemoryApi::new(fixture_snapshot()), config).expect("console builds")
}
