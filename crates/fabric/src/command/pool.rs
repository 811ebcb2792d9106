use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value};

use super::CommandClient;
use crate::envelope::ResponseEnvelope;
use crate::error::{CallError, Result};

const DEFAULT_MAX_IDLE: usize = 16;

/// Independent connections to one command endpoint, shared by concurrent callers.
///
/// Each call checks out its own connection, so concurrent calls never share
/// one. Healthy connections go back to the pool; broken ones are dropped.
#[derive(Debug)]
pub struct CommandPool {
    endpoint: String,
    timeout: Duration,
    max_idle: usize,
    idle: Mutex<Vec<CommandClient>>,
}

impl CommandPool {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            max_idle: DEFAULT_MAX_IDLE,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn idle_connections(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    pub async fn call(&self, action: &str, data: Map<String, Value>) -> Result<ResponseEnvelope> {
        let mut client = self.checkout();
        let result = client.call(action, data, self.timeout).await;
        self.checkin(client);
        result
    }

    /// Like [`call`](Self::call), but unwraps the reply into its data or a rejection.
    pub async fn request(
        &self,
        action: &str,
        data: Map<String, Value>,
    ) -> std::result::Result<Value, CallError> {
        let response = self.call(action, data).await?;
        response.into_result().map_err(CallError::Rejected)
    }

    fn checkout(&self) -> CommandClient {
        let reused = match self.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        };
        reused.unwrap_or_else(|| CommandClient::new(self.endpoint.clone(), self.timeout))
    }

    fn checkin(&self, client: CommandClient) {
        if !client.is_connected() {
            return;
        }
        let mut idle = match self.idle.lock() {
            Ok(idle) => idle,
            Err(poisoned) => poisoned.into_inner(),
        };
        if idle.len() < self.max_idle {
            idle.push(client);
        }
    }
}
