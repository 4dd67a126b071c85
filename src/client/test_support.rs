//! Scripted transport for exercising the retry loop without a network

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use super::{
    error::{ClientError, Result},
    transport::{HttpTransport, RawResponse},
};

#[derive(Debug, Clone)]
pub enum Reply {
    Respond(RawResponse),
    Fail(ClientError),
    /// Never answers, so the attempt deadline fires
    Hang,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self::Respond(RawResponse {
            status,
            reason: "Scripted".into(),
            retry_after: None,
            body: String::new(),
        })
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::Respond(RawResponse {
            status,
            reason: "OK".into(),
            retry_after: None,
            body: body.to_string(),
        })
    }

    pub fn with_retry_after(self, value: &str) -> Self {
        match self {
            Self::Respond(mut response) => {
                response.retry_after = Some(value.into());
                Self::Respond(response)
            },
            other => other,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, VecDeque<Reply>>,
    fallback: Option<Reply>,
    calls: HashMap<String, Vec<Instant>>,
}

/// Answers each url from its own queue, then from the fallback reply
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, replies: impl IntoIterator<Item = Reply>) {
        let mut script = self.script.lock().unwrap();
        script.replies.entry(url.to_string()).or_default().extend(replies);
    }

    pub fn fallback(&self, reply: Reply) {
        self.script.lock().unwrap().fallback = Some(reply);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.script.lock().unwrap().calls.get(url).map_or(0, Vec::len)
    }

    /// Time between consecutive calls for `url`
    pub fn gaps(&self, url: &str) -> Vec<Duration> {
        let script = self.script.lock().unwrap();
        script
            .calls
            .get(url)
            .map(|times| times.windows(2).map(|pair| pair[1] - pair[0]).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.calls.entry(url.to_string()).or_default().push(Instant::now());
            let queued = script.replies.get_mut(url).and_then(VecDeque::pop_front);
            queued
                .or_else(|| script.fallback.clone())
                .unwrap_or_else(|| Reply::Fail(ClientError::network("no scripted reply")))
        };

        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending().await,
        }
    }
}
