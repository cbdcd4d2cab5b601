//! Tests for the kill command

use tgeraser::commands::kill::{parse_pids, PROCESS_NAME};

#[test]
fn test_kill_matches_binary_name() {
    assert_eq!(PROCESS_NAME, "tgeraser");
}

#[test]
fn test_kill_skips_own_pid() {
    let own = std::process::id();
    let output = format!("1\n{}\n2\n", own);
    assert_eq!(parse_pids(&output, own), vec![1, 2]);
}
