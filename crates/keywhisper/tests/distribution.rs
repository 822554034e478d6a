// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole distribution flows against real files.

use std::sync::Arc;

use keywhisper::distributor::KeyDistributor;
use keywhisper::error::Error;
use keywhisper::test_support::{RecordFiles, RecordingWhisperer};

const TEMPLATE: &str = "Your code: <STEAM_KEY>";

#[tokio::test]
async fn every_recipient_gets_the_matching_code() -> anyhow::Result<()> {
    let files = RecordFiles::new("alice\nbob\n", "AAAA-1111\nBBBB-2222\n")?;
    let whisperer = Arc::new(RecordingWhisperer::new());
    let distributor = KeyDistributor::prepare(files.config(TEMPLATE), whisperer.clone())?;

    let summary = distributor.run().await?;

    assert_eq!(summary.delivered, 2);
    assert_eq!(whisperer.sent(), vec![
        ("alice".to_owned(), "Your code: AAAA-1111".to_owned()),
        ("bob".to_owned(), "Your code: BBBB-2222".to_owned()),
    ]);
    assert_eq!(RecordFiles::read(&files.recipients)?, "#alice\n#bob\n");
    assert_eq!(RecordFiles::read(&files.codes)?, "#AAAA-1111\n#BBBB-2222\n");
    Ok(())
}

#[tokio::test]
async fn undersupply_aborts_before_any_delivery() -> anyhow::Result<()> {
    let files = RecordFiles::new("alice\nbob\ncarol\n", "AAAA-1111\n")?;
    let whisperer = Arc::new(RecordingWhisperer::new());

    let result = KeyDistributor::prepare(files.config(TEMPLATE), whisperer.clone());

    assert!(matches!(result, Err(Error::InsufficientSupply { have: 1, need: 3 })));
    assert_eq!(whisperer.attempts(), 0);
    assert_eq!(RecordFiles::read(&files.recipients)?, "alice\nbob\ncarol\n");
    assert_eq!(RecordFiles::read(&files.codes)?, "AAAA-1111\n");
    Ok(())
}

#[tokio::test]
async fn consumed_recipient_is_skipped_and_untouched() -> anyhow::Result<()> {
    let files = RecordFiles::new("#alice\nbob\n", "AAAA-1111\nBBBB-2222\n")?;
    let whisperer = Arc::new(RecordingWhisperer::new());
    let distributor = KeyDistributor::prepare(files.config(TEMPLATE), whisperer.clone())?;

    distributor.run().await?;

    assert_eq!(whisperer.sent(), vec![("bob".to_owned(), "Your code: AAAA-1111".to_owned())]);
    assert_eq!(RecordFiles::read(&files.recipients)?, "#alice\n#bob\n");
    assert_eq!(RecordFiles::read(&files.codes)?, "#AAAA-1111\nBBBB-2222\n");
    Ok(())
}

#[tokio::test]
async fn restart_after_failure_resumes_from_disk() -> anyhow::Result<()> {
    let files = RecordFiles::new("alice\nbob\ncarol\n", "K1\nK2\nK3\n")?;

    let failing = Arc::new(RecordingWhisperer::failing_at(1));
    let first = KeyDistributor::prepare(files.config(TEMPLATE), failing.clone())?;
    assert!(matches!(first.run().await, Err(Error::DeliveryFailed { line: 2, .. })));
    drop(first);

    // A fresh process only sees what the files record.
    let whisperer = Arc::new(RecordingWhisperer::new());
    let second = KeyDistributor::prepare(files.config(TEMPLATE), whisperer.clone())?;
    second.run().await?;

    assert_eq!(whisperer.sent(), vec![
        ("bob".to_owned(), "Your code: K2".to_owned()),
        ("carol".to_owned(), "Your code: K3".to_owned()),
    ]);
    assert_eq!(RecordFiles::read(&files.recipients)?, "#alice\n#bob\n#carol\n");
    Ok(())
}
