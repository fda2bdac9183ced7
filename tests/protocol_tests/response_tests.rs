//! Response Tests
//!
//! Tests for the text sent back to clients.

use walkv::protocol::{Response, NOT_FOUND, OK};

#[test]
fn test_mutations_render_ok() {
    assert_eq!(Response::Stored.to_string(), OK);
    assert_eq!(Response::Deleted.to_string(), "OK");
}

#[test]
fn test_value_renders_verbatim() {
    let response = Response::Value("hello  world ".to_string());
    assert_eq!(response.to_string(), "hello  world ");
    assert!(!response.is_not_found());
}

#[test]
fn test_not_found() {
    assert_eq!(Response::NotFound.to_string(), NOT_FOUND);
    assert!(Response::NotFound.is_not_found());
}

#[test]
fn test_value_is_not_escaped() {
    // Looks exactly like a miss or an error on the wire
    assert_eq!(Response::Value("NOT_FOUND".to_string()).to_string(), NOT_FOUND);
    assert_eq!(Response::Value("ERROR: x".to_string()).to_string(), "ERROR: x");
    assert!(!Response::Value("NOT_FOUND".to_string()).is_not_found());
}
