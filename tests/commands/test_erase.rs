//! Tests for the erase command cycles

use std::time::Duration;

use tgeraser::commands::erase::{run_cycle, run_cycles};
use tgeraser::context::RunContext;
use tgeraser::eraser::Criteria;
use tgeraser::error::Error;
use tgeraser::period::TimePeriod;
use tgeraser::platform::PeerRef;

use crate::{group, prompter, FakePlatform};

fn criteria(peers: &str) -> Criteria {
    Criteria {
        peers: PeerRef::parse_list(peers),
        ..Criteria::default()
    }
}

#[tokio::test]
async fn test_single_cycle_without_period() {
    let platform = FakePlatform::new(vec![group(10, "alpha")]).with_messages(10, 40);
    let ctx = RunContext::new();
    let mut input = prompter("", &ctx);

    run_cycles(&platform, &criteria("10"), None, &ctx, &mut input)
        .await
        .expect("one cycle");

    assert_eq!(platform.delete_calls().len(), 1);
}

#[tokio::test]
async fn test_cycle_report_counts_deletions() {
    let platform = FakePlatform::new(vec![group(10, "alpha")]).with_messages(10, 40);
    let ctx = RunContext::new();
    let mut input = prompter("", &ctx);

    let report = run_cycle(&platform, &criteria("10"), &ctx, &mut input)
        .await
        .expect("cycle");

    assert_eq!(report.found(), 40);
    assert_eq!(report.deleted(), 40);
}

#[tokio::test]
async fn test_recurrence_sleep_is_interruptible() {
    let platform = FakePlatform::new(vec![group(10, "alpha")]).with_messages(10, 5);
    let ctx = RunContext::new();
    let mut input = prompter("", &ctx);
    let period = TimePeriod::parse("1*hours").unwrap();

    let token = ctx.token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let err = run_cycles(&platform, &criteria("10"), Some(period), &ctx, &mut input)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Interrupted));
    assert_eq!(platform.delete_calls().len(), 1);
}
