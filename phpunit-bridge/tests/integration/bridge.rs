// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, eyre};
use phpunit_bridge::{
    bridge::SessionBridge, channel::Channel, config::BridgeConfig, errors::BridgeError,
    index::SharedResultIndex,
};
use phpunit_metadata::{TestOutcomeState, TestStatesEvent, TestsEvent};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

fn config() -> BridgeConfig {
    BridgeConfig::from_toml_str("ready-timeout = \"10s\"", |_, _| {})
        .expect("inline config is valid")
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Result<T> {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await?
        .ok_or_else(|| eyre!("event stream ended"))
}

#[tokio::test]
async fn load_and_run_over_json_rpc() -> Result<()> {
    let (channel, server) = FakeServer::connect();
    let server = server.serve();
    let bridge = SessionBridge::new(channel, SharedResultIndex::default(), &config());

    let (tests_tx, mut tests_rx) = mpsc::unbounded_channel();
    let _tests = bridge.tests().subscribe(move |event: &TestsEvent| {
        _ = tests_tx.send(event.clone());
    });
    let (states_tx, mut states_rx) = mpsc::unbounded_channel();
    let _states = bridge.test_states().subscribe(move |event: &TestStatesEvent| {
        _ = states_tx.send(event.clone());
    });

    // Discovery.
    bridge.load().await?;
    assert_eq!(next(&mut tests_rx).await?, TestsEvent::Started);
    let TestsEvent::Finished { suite, .. } = next(&mut tests_rx).await? else {
        panic!("expected a finished event");
    };
    let suite = suite.ok_or_else(|| eyre!("suite missing"))?;
    assert_eq!(suite.test_count(), 2);
    assert_eq!(serde_json::to_value(&suite)?, discovered_suite());

    // Execution.
    let ids = vec!["Tests\\CalculatorTest".to_owned()];
    bridge.run(ids.clone()).await?;

    let mut kinds = Vec::new();
    loop {
        let event = next(&mut states_rx).await?;
        let done = event == TestStatesEvent::RunFinished;
        kinds.push(match event {
            TestStatesEvent::RunStarted { tests } => {
                assert_eq!(tests, ids);
                "started".to_owned()
            }
            TestStatesEvent::Suite(event) => format!("suite:{}", event.suite),
            TestStatesEvent::Test(event) => format!("test:{}:{}", event.test, event.state),
            TestStatesEvent::RunFinished => "finished".to_owned(),
        });
        if done {
            break;
        }
    }
    assert_eq!(
        kinds,
        vec![
            "started",
            "suite:Tests\\CalculatorTest",
            "test:Tests\\CalculatorTest::test_sum:passed",
            "test:Tests\\CalculatorTest::test_div:failed",
            "finished",
        ]
    );

    // The drive letter is dropped from the key.
    let index = bridge.index();
    {
        let index = index.read();
        assert_eq!(
            index.keys().collect::<Vec<_>>(),
            vec!["\\project\\tests\\CalculatorTest.php"]
        );
        let by_state = index.get_by_state("D:\\project\\tests\\CalculatorTest.php");
        assert_eq!(by_state[&TestOutcomeState::Passed].len(), 2);
        assert_eq!(by_state[&TestOutcomeState::Failed].len(), 1);
        assert_eq!(
            by_state[&TestOutcomeState::Failed][0].extra()["message"],
            json!("Failed asserting that 0 matches expected 1.")
        );
    }

    assert!(matches!(
        bridge.cancel(),
        Err(BridgeError::UnsupportedOperation { .. })
    ));

    bridge.channel().send_request("shutdown", json!(null)).await?;
    let received = server.await??;
    assert_eq!(
        received,
        vec![
            "initialize",
            "initialized",
            "TestLoadStartedEvent",
            "TestRunStartedEvent",
            "shutdown",
        ]
    );

    // The server has gone away.
    let err = bridge.run(ids).await.unwrap_err();
    assert!(
        matches!(err, BridgeError::Channel(_)),
        "unexpected error: {err:?}"
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silent_server_times_out() -> Result<()> {
    // Keep the server end open but never answer `initialize`.
    let (channel, _server) = FakeServer::connect();
    let bridge = SessionBridge::new(channel, SharedResultIndex::default(), &config());

    let err = bridge.load().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "channel to the language server was not ready after 10s"
    );
    Ok(())
}
