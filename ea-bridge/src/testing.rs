//! Test doubles shared by the service and route tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ea_bridge_wire::Params;
use serde_json::Value;

use crate::bridge::{BridgeError, CommandSender};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    pub command: String,
    pub params: Option<Params>,
    pub timeout: Duration,
}

/// CommandSender that answers every command with a canned reply.
pub struct MockSender {
    reply: Result<Value, BridgeError>,
    connected: bool,
    last_seen: Option<DateTime<Utc>>,
    calls: Mutex<Vec<RecordedCommand>>,
}

impl MockSender {
    pub fn replying(data: Value) -> Self {
        Self {
            reply: Ok(data),
            connected: true,
            last_seen: Some(Utc::now()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: BridgeError) -> Self {
        Self {
            reply: Err(error),
            ..Self::replying(Value::Null)
        }
    }

    pub fn disconnected() -> Self {
        Self {
            reply: Err(BridgeError::NotConnected),
            connected: false,
            last_seen: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_last_seen(mut self, last_seen: Option<DateTime<Utc>>) -> Self {
        self.last_seen = last_seen;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> RecordedCommand {
        self.calls().pop().expect("no command was sent")
    }
}

#[async_trait]
impl CommandSender for MockSender {
    async fn send(
        &self,
        command: &str,
        params: Option<Params>,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        self.calls.lock().unwrap().push(RecordedCommand {
            command: command.to_string(),
            params,
            timeout,
        });
        self.reply.clone()
    }

    async fn connected(&self) -> bool {
        self.connected
    }

    async fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }
}
