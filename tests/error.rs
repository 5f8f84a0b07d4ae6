use std::path::PathBuf;

use serde_json::Value;
use tix::error::{exit_codes, Error, JsonError};

#[test]
fn exit_code_user_error() {
    for err in [
        Error::NotFound(7),
        Error::InvalidState("timer already running".to_string()),
        Error::InvalidArgument("bad input".to_string()),
        Error::InvalidConfig("bad config".to_string()),
    ] {
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }
}

#[test]
fn exit_code_operation_failed() {
    let err = Error::OperationFailed("boom".to_string());
    assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);

    let err = Error::LockFailed(PathBuf::from("tasks.json.lock"));
    assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn not_found_message_and_details() {
    let err = Error::NotFound(12);
    assert_eq!(err.to_string(), "Task #12 not found");
    let details = err.details().expect("details");
    assert_eq!(details["task_id"], Value::from(12));
}

#[test]
fn json_error_includes_details() {
    let err = Error::LockFailed(PathBuf::from("/tmp/tasks.json.lock"));
    let json = JsonError::from(&err);
    let value = serde_json::to_value(json).expect("serialize");

    assert_eq!(value["code"], Value::from(exit_codes::OPERATION_FAILED));
    assert_eq!(value["kind"], "operation_failed");
    assert_eq!(value["details"]["lock"], "/tmp/tasks.json.lock");
}

#[test]
fn json_error_omits_empty_details() {
    let err = Error::InvalidConfig("bad config".to_string());
    let value = serde_json::to_value(JsonError::from(&err)).expect("serialize");

    assert_eq!(value["code"], Value::from(exit_codes::USER_ERROR));
    assert_eq!(value["kind"], "user_error");
    assert_eq!(value["message"], "Invalid configuration: bad config");
    assert!(value.get("details").is_none());
}

#[test]
fn error_kinds() {
    assert_eq!(Error::NotFound(3).kind(), "not_found");
    assert_eq!(
        Error::InvalidState("timer not running".to_string()).kind(),
        "invalid_state"
    );
    assert_eq!(Error::InvalidArgument("x".to_string()).kind(), "user_error");
    assert_eq!(Error::OperationFailed("x".to_string()).kind(), "operation_failed");
}
