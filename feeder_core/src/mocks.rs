//! Test and helper mocks for feeder_core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use feeder_traits::clock::{Clock, MonotonicClock};
use feeder_traits::{BoxError, Link, Transport};

#[derive(Debug, Clone)]
enum Step {
    Line(String),
    Pause(Duration),
}

#[derive(Debug, Default)]
struct Script {
    stale: Vec<String>,
    steps: VecDeque<Step>,
    written: Vec<u8>,
    opens: usize,
    closes: usize,
    fail_open: Option<String>,
    fail_write: Option<String>,
    fail_read: Option<String>,
}

/// Transport stub that replays scripted reply lines.
///
/// Clones share the same script, so a test can keep one handle to inspect
/// what was written and how many links were opened and closed.
#[derive(Clone)]
pub struct ScriptedTransport<C: Clock + Clone = MonotonicClock> {
    script: Arc<Mutex<Script>>,
    clock: C,
}

impl ScriptedTransport<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for ScriptedTransport<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + Clone> ScriptedTransport<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            clock,
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a line the board sends after the request.
    pub fn reply(self, line: impl Into<String>) -> Self {
        self.script().steps.push_back(Step::Line(line.into()));
        self
    }

    /// Queue a stretch of silence before the next reply.
    pub fn pause(self, d: Duration) -> Self {
        self.script().steps.push_back(Step::Pause(d));
        self
    }

    /// Leftover input present when a link opens; discarded by `clear_input`.
    pub fn stale(self, line: impl Into<String>) -> Self {
        self.script().stale.push(line.into());
        self
    }

    pub fn fail_open(self, msg: impl Into<String>) -> Self {
        self.script().fail_open = Some(msg.into());
        self
    }

    pub fn fail_write(self, msg: impl Into<String>) -> Self {
        self.script().fail_write = Some(msg.into());
        self
    }

    pub fn fail_read(self, msg: impl Into<String>) -> Self {
        self.script().fail_read = Some(msg.into());
        self
    }

    /// Every byte written across all links.
    pub fn written(&self) -> Vec<u8> {
        self.script().written.clone()
    }

    pub fn opens(&self) -> usize {
        self.script().opens
    }

    pub fn closes(&self) -> usize {
        self.script().closes
    }

    /// Scripted lines not consumed yet.
    pub fn pending(&self) -> usize {
        self.script()
            .steps
            .iter()
            .filter(|s| matches!(s, Step::Line(_)))
            .count()
    }
}

impl<C: Clock + Clone> Transport for ScriptedTransport<C> {
    type Link = ScriptedLink<C>;

    fn open(&self) -> Result<Self::Link, BoxError> {
        let mut script = self.script();
        if let Some(msg) = &script.fail_open {
            return Err(msg.clone().into());
        }
        script.opens += 1;
        let unread = script.stale.drain(..).collect();
        Ok(ScriptedLink {
            script: self.script.clone(),
            clock: self.clock.clone(),
            unread,
        })
    }
}

pub struct ScriptedLink<C: Clock = MonotonicClock> {
    script: Arc<Mutex<Script>>,
    clock: C,
    unread: VecDeque<String>,
}

impl<C: Clock> ScriptedLink<C> {
    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock> Link for ScriptedLink<C> {
    fn clear_input(&mut self) -> Result<(), BoxError> {
        self.unread.clear();
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        let mut script = self.script();
        if let Some(msg) = &script.fail_write {
            return Err(msg.clone().into());
        }
        script.written.extend_from_slice(bytes);
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, BoxError> {
        if let Some(line) = self.unread.pop_front() {
            return Ok(Some(line));
        }
        let step = {
            let mut script = self.script();
            if let Some(msg) = &script.fail_read {
                return Err(msg.clone().into());
            }
            match script.steps.pop_front() {
                // Consume at most `timeout` of a pause per call.
                Some(Step::Pause(left)) if left > timeout => {
                    script.steps.push_front(Step::Pause(left - timeout));
                    Some(Step::Pause(timeout))
                }
                other => other,
            }
        };
        match step {
            Some(Step::Line(line)) => Ok(Some(line)),
            Some(Step::Pause(waited)) => {
                self.clock.sleep(waited);
                Ok(None)
            }
            None => {
                self.clock.sleep(timeout);
                Ok(None)
            }
        }
    }
}

impl<C: Clock> Drop for ScriptedLink<C> {
    fn drop(&mut self) {
        self.script().closes += 1;
    }
}
