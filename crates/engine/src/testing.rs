//! Test doubles for the network and the observer.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sigcache_core::{Error, Request, Response};
use url::Url;

use crate::fetch::Fetcher;
use crate::observer::Observer;

#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(Response),
    Fail,
    /// Never answers within any sane timeout.
    Hang,
}

/// Scripted fetcher. Unknown URLs fail like an offline network.
#[derive(Debug, Default)]
pub struct MockFetcher {
    replies: Mutex<HashMap<String, MockReply>>,
    requests: Mutex<Vec<Request>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.set(url, MockReply::Respond(response));
    }

    pub fn fail(&self, url: &str) {
        self.set(url, MockReply::Fail);
    }

    pub fn hang(&self, url: &str) {
        self.set(url, MockReply::Hang);
    }

    fn set(&self, url: &str, reply: MockReply) {
        let key = Url::parse(url).unwrap().to_string();
        self.replies.lock().unwrap().insert(key, reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, url: &str) -> usize {
        let key = Url::parse(url).unwrap().to_string();
        self.requests.lock().unwrap().iter().filter(|r| r.url.as_str() == key).count()
    }

    /// Last request seen for `url`.
    pub fn last_request(&self, url: &str) -> Option<Request> {
        let key = Url::parse(url).unwrap().to_string();
        self.requests.lock().unwrap().iter().rev().find(|r| r.url.as_str() == key).cloned()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().get(request.url.as_str()).cloned();

        match reply {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(Error::Network("mock hang elapsed".into()))
            }
            Some(MockReply::Fail) | None => Err(Error::Network(format!("offline: {}", request.url))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reported {
    WriteFailed(String),
    ReadFailed(String),
    RevalidationFailed(String),
    PrewarmFailed(String),
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    reports: Mutex<Vec<Reported>>,
}

impl RecordingObserver {
    pub fn reports(&self) -> Vec<Reported> {
        self.reports.lock().unwrap().clone()
    }

    fn push(&self, report: Reported) {
        self.reports.lock().unwrap().push(report);
    }
}

impl Observer for RecordingObserver {
    fn cache_write_failed(&self, _store: &str, url: &Url, _error: &Error) {
        self.push(Reported::WriteFailed(url.to_string()));
    }

    fn cache_read_failed(&self, _store: &str, url: &Url, _error: &Error) {
        self.push(Reported::ReadFailed(url.to_string()));
    }

    fn revalidation_failed(&self, url: &Url, _error: &Error) {
        self.push(Reported::RevalidationFailed(url.to_string()));
    }

    fn prewarm_failed(&self, url: &Url, _error: &Error) {
        self.push(Reported::PrewarmFailed(url.to_string()));
    }
}
