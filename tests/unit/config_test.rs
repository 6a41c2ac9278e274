//! Tests for configuration validation

use prometheus_task_loop::config::scheduler::MIN_THREAD_STACK_SIZE;
use prometheus_task_loop::config::SchedulerConfig;
use prometheus_task_loop::core::{Scheduler, SchedulerError};

#[test]
fn test_scheduler_config_validation() {
    let valid = SchedulerConfig {
        name: "ui".to_string(),
        max_queue_depth: Some(64),
        thread_stack_size: Some(MIN_THREAD_STACK_SIZE),
    };
    assert!(valid.validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_name() {
    let invalid = SchedulerConfig::new().with_name("   ");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_queue_depth() {
    let invalid = SchedulerConfig::new().with_max_queue_depth(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_stack_size() {
    let invalid = SchedulerConfig::new().with_thread_stack_size(MIN_THREAD_STACK_SIZE - 1);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_from_json_str() {
    let json = r#"{ "name": "render", "max_queue_depth": 32 }"#;
    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.name, "render");
    assert_eq!(cfg.max_queue_depth, Some(32));
    assert_eq!(cfg.thread_stack_size, None);
}

#[test]
fn test_from_json_str_empty_object_uses_defaults() {
    let cfg = SchedulerConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, SchedulerConfig::default());
}

#[test]
fn test_from_json_str_rejects_malformed_and_invalid() {
    let err = SchedulerConfig::from_json_str("{ name: ").unwrap_err();
    assert!(err.starts_with("parse error"));

    let err = SchedulerConfig::from_json_str(r#"{ "max_queue_depth": 0 }"#).unwrap_err();
    assert!(err.contains("max_queue_depth"));
}

#[test]
fn test_config_serializes_round_trip() {
    let cfg = SchedulerConfig::new()
        .with_name("io")
        .with_thread_stack_size(1 << 20);
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_scheduler_rejects_invalid_config() {
    let result = Scheduler::with_config(SchedulerConfig::new().with_name(""));
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}
