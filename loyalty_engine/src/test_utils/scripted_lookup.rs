use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use accrual_client::{AccrualApiError, AccrualLookup, AccrualOutcome};
use tokio::time::Instant;

pub type ScriptedResponse = Result<AccrualOutcome, AccrualApiError>;

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    latency: Duration,
}

/// An in-process accrual service. Each order answers from its own script, one entry per call; the last entry repeats
/// forever. Orders without a script answer as unregistered (`NEW`). Every call is logged with the time it was made.
///
/// Clones share scripts and the call log.
#[derive(Clone, Default)]
pub struct ScriptedLookup {
    inner: Arc<Inner>,
}

impl ScriptedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called before the lookup is cloned or shared.
    pub fn with_latency(self, latency: Duration) -> Self {
        let scripts = self.take_scripts();
        Self { inner: Arc::new(Inner { scripts: Mutex::new(scripts), calls: Mutex::default(), latency }) }
    }

    pub fn with_script<S: Into<String>>(self, order: S, responses: Vec<ScriptedResponse>) -> Self {
        self.set_script(order, responses);
        self
    }

    pub fn set_script<S: Into<String>>(&self, order: S, responses: Vec<ScriptedResponse>) {
        self.inner.scripts.lock().unwrap().insert(order.into(), responses.into());
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, order: &str) -> Vec<Instant> {
        self.calls().into_iter().filter(|(o, _)| o == order).map(|(_, t)| t).collect()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    fn take_scripts(&self) -> HashMap<String, VecDeque<ScriptedResponse>> {
        std::mem::take(&mut *self.inner.scripts.lock().unwrap())
    }

    fn next_response(&self, order: &str) -> ScriptedResponse {
        let mut scripts = self.inner.scripts.lock().unwrap();
        match scripts.get_mut(order) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) if !script.is_empty() => script[0].clone(),
            _ => Ok(AccrualOutcome::unregistered(order)),
        }
    }
}

impl AccrualLookup for ScriptedLookup {
    async fn lookup(&self, order_number: &str) -> Result<AccrualOutcome, AccrualApiError> {
        self.inner.calls.lock().unwrap().push((order_number.to_string(), Instant::now()));
        if !self.inner.latency.is_zero() {
            tokio::time::sleep(self.inner.latency).await;
        }
        self.next_response(order_number)
    }
}
