//! Command Tests
//!
//! Tests for parsing request lines into commands.

use walkv::error::KvError;
use walkv::protocol::{Command, CommandType};
use walkv::wal::Operation;

// =============================================================================
// Valid Command Tests
// =============================================================================

#[test]
fn test_parse_set() {
    let cmd = Command::parse("SET mykey myvalue").unwrap();
    assert_eq!(
        cmd,
        Command::Set {
            key: "mykey".to_string(),
            value: "myvalue".to_string()
        }
    );
    assert_eq!(cmd.command_type(), CommandType::Set);
    assert_eq!(cmd.key(), "mykey");
}

#[test]
fn test_parse_set_value_is_rest_of_line() {
    let cmd = Command::parse("SET greeting hello   big world  ").unwrap();
    match cmd {
        Command::Set { key, value } => {
            assert_eq!(key, "greeting");
            assert_eq!(value, "hello   big world  ");
        }
        other => panic!("Expected SET command, got {:?}", other),
    }
}

#[test]
fn test_parse_get_and_del() {
    assert_eq!(
        Command::parse("GET k1").unwrap(),
        Command::Get { key: "k1".to_string() }
    );
    assert_eq!(
        Command::parse("DEL k1").unwrap(),
        Command::Delete { key: "k1".to_string() }
    );
}

#[test]
fn test_parse_is_case_insensitive() {
    assert_eq!(Command::parse("get k").unwrap().command_type(), CommandType::Get);
    assert_eq!(Command::parse("Set k v").unwrap().command_type(), CommandType::Set);
    assert_eq!(Command::parse("dEl k").unwrap().command_type(), CommandType::Delete);
}

#[test]
fn test_parse_strips_line_terminator() {
    assert_eq!(
        Command::parse("GET k\r\n").unwrap(),
        Command::Get { key: "k".to_string() }
    );
    assert_eq!(
        Command::parse("SET k v\n").unwrap(),
        Command::Set { key: "k".to_string(), value: "v".to_string() }
    );
}

#[test]
fn test_parse_tolerates_extra_separators() {
    assert_eq!(
        Command::parse("  GET    k  ").unwrap(),
        Command::Get { key: "k".to_string() }
    );
}

// =============================================================================
// Invalid Command Tests
// =============================================================================

#[test]
fn test_parse_empty_line() {
    assert!(matches!(Command::parse(""), Err(KvError::Parse(_))));
    assert!(matches!(Command::parse("   \n"), Err(KvError::Parse(_))));
}

#[test]
fn test_parse_unknown_command() {
    match Command::parse("INCR counter") {
        Err(KvError::UnknownCommand(name)) => assert_eq!(name, "INCR"),
        other => panic!("Expected unknown command, got {:?}", other),
    }
}

#[test]
fn test_parse_wrong_arity() {
    let cases = ["SET", "SET onlykey", "GET", "GET a b", "DEL", "DEL a b"];
    for line in cases {
        assert!(
            matches!(Command::parse(line), Err(KvError::Parse(_))),
            "{:?} should be rejected",
            line
        );
    }
}

#[test]
fn test_parse_error_messages() {
    let err = Command::parse("SET k").unwrap_err();
    assert_eq!(
        err.to_string(),
        "parse error: SET command requires 2 arguments: key and value"
    );

    let err = Command::parse("GET").unwrap_err();
    assert_eq!(err.to_string(), "parse error: GET command requires 1 argument: key");
}

#[test]
fn test_parse_rejects_embedded_newline() {
    assert!(matches!(Command::parse("SET a 1\nSET b 2"), Err(KvError::Parse(_))));
}

// =============================================================================
// WAL Mapping Tests
// =============================================================================

#[test]
fn test_mutating_commands_map_to_operations() {
    let set = Command::parse("SET k v").unwrap();
    assert_eq!(
        set.to_operation(),
        Some(Operation::Set { key: "k".into(), value: "v".into() })
    );

    let del = Command::parse("DEL k").unwrap();
    assert_eq!(del.to_operation(), Some(Operation::Delete { key: "k".into() }));

    let get = Command::parse("GET k").unwrap();
    assert_eq!(get.to_operation(), None);
    assert!(!get.command_type().is_mutating());
}

#[test]
fn test_operation_converts_back_to_command() {
    let op = Operation::Set { key: "k".into(), value: "two words".into() };
    assert_eq!(
        Command::from(op),
        Command::Set { key: "k".into(), value: "two words".into() }
    );
}
