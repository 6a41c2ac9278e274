//! Tests for error types

use prometheus_task_loop::core::SchedulerError;

#[test]
fn test_rejected_after_stop_error() {
    let err = SchedulerError::RejectedAfterStop;
    assert_eq!(format!("{err}"), "scheduler stopped: task rejected");
}

#[test]
fn test_queue_full_error() {
    let err = SchedulerError::QueueFull("immediate queue at max depth 8".to_string());
    assert_eq!(format!("{err}"), "queue full: immediate queue at max depth 8");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("name must not be empty".to_string());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: name must not be empty"
    );
}

#[test]
fn test_spawn_error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads left");
    let err: SchedulerError = io.into();
    assert!(matches!(err, SchedulerError::Spawn(_)));
    assert_eq!(
        format!("{err}"),
        "failed to spawn scheduler thread: no threads left"
    );
}

#[test]
fn test_errors_convert_to_anyhow() {
    let err: anyhow::Error = SchedulerError::AlreadyInitialized.into();
    assert_eq!(err.to_string(), "global scheduler already initialized");
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
