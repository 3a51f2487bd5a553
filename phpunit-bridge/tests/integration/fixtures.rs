// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use color_eyre::eyre::{Result, bail, eyre};
use phpunit_bridge::channel::JsonRpcChannel;
use serde_json::{Value, json};
use tokio::{
    io::{
        AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf,
        WriteHalf, split,
    },
    task::JoinHandle,
};

/// The suite tree the fake server reports on load.
pub(crate) fn discovered_suite() -> Value {
    json!({
        "type": "suite",
        "id": "root",
        "label": "PHPUnit",
        "children": [
            {
                "type": "suite",
                "id": "Tests\\CalculatorTest",
                "label": "CalculatorTest",
                "file": "C:\\project\\tests\\CalculatorTest.php",
                "children": [
                    { "type": "test", "id": "Tests\\CalculatorTest::test_sum", "label": "test_sum" },
                    { "type": "test", "id": "Tests\\CalculatorTest::test_div", "label": "test_div" },
                ],
            },
        ],
    })
}

/// The results the fake server reports at the end of every run.
pub(crate) fn run_results() -> Value {
    json!([
        {
            "type": "suite",
            "suite": "Tests\\CalculatorTest",
            "state": "completed",
            "file": "C:\\project\\tests\\CalculatorTest.php",
        },
        {
            "type": "test",
            "test": "Tests\\CalculatorTest::test_sum",
            "state": "passed",
            "file": "C:\\project\\tests\\CalculatorTest.php",
            "line": 12,
        },
        {
            "type": "test",
            "test": "Tests\\CalculatorTest::test_div",
            "state": "failed",
            "file": "C:\\project\\tests\\CalculatorTest.php",
            "line": 20,
            "message": "Failed asserting that 0 matches expected 1.",
        },
    ])
}

/// A scripted PHPUnit language server on the far end of an in-memory stream.
pub(crate) struct FakeServer {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    next_id: i64,
    pub(crate) received: Vec<String>,
}

impl FakeServer {
    /// Connects a client channel to a fresh server. The server doesn't run until it is
    /// [`serve`](Self::serve)d.
    pub(crate) fn connect() -> (JsonRpcChannel, Self) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = split(client);
        let (server_read, server_write) = split(server);
        let server = Self {
            reader: BufReader::new(server_read),
            writer: server_write,
            next_id: 1000,
            received: Vec::new(),
        };
        (JsonRpcChannel::new(client_read, client_write), server)
    }

    /// Serves requests until the client goes away, then returns the methods it received.
    pub(crate) fn serve(mut self) -> JoinHandle<Result<Vec<String>>> {
        tokio::spawn(async move {
            while let Some(message) = self.recv().await? {
                let Some(method) = message.get("method").and_then(Value::as_str) else {
                    // Acknowledgements of server-to-client requests.
                    continue;
                };
                self.received.push(method.to_owned());
                let id = message.get("id").cloned();
                match method {
                    "initialize" => self.respond(id, json!({ "capabilities": {} })).await?,
                    "initialized" => {}
                    "TestLoadStartedEvent" => {
                        self.respond(id, Value::Null).await?;
                        self.push_request(
                            "TestLoadFinishedEvent",
                            json!({ "suite": discovered_suite() }),
                        )
                        .await?;
                    }
                    "TestRunStartedEvent" => {
                        let tests = message["params"]["tests"].clone();
                        self.respond(id, Value::Null).await?;
                        self.push_notification(
                            "TestRunStartedEvent",
                            json!({ "tests": tests, "events": [] }),
                        )
                        .await?;
                        self.push_request("TestRunFinishedEvent", json!({ "events": run_results() }))
                            .await?;
                    }
                    "shutdown" => {
                        self.respond(id, Value::Null).await?;
                        break;
                    }
                    other => bail!("unexpected method `{other}`"),
                }
            }
            Ok(self.received)
        })
    }

    async fn respond(&mut self, id: Option<Value>, result: Value) -> Result<()> {
        let id = id.ok_or_else(|| eyre!("request without id"))?;
        self.send(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
            .await
    }

    async fn push_notification(&mut self, method: &str, params: Value) -> Result<()> {
        self.send(json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await
    }

    async fn push_request(&mut self, method: &str, params: Value) -> Result<()> {
        self.next_id += 1;
        let id = self.next_id;
        self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await
    }

    async fn send(&mut self, message: Value) -> Result<()> {
        let body = serde_json::to_vec(&message)?;
        self.writer
            .write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())
            .await?;
        self.writer.write_all(&body).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Value>> {
        let mut content_length = None;
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some(len) = line.strip_prefix("Content-Length: ") {
                content_length = Some(len.parse::<usize>()?);
            }
        }
        let len = content_length.ok_or_else(|| eyre!("missing Content-Length"))?;
        let mut body = vec![0; len];
        self.reader.read_exact(&mut body).await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }
}
