//! Deterministic collaborators for unit tests.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::http::{Headers, HttpExecutor, Method, OptionValue, Request, Response};
use crate::utils::clock::Clock;
use crate::utils::error::HttpError;

/// A request as the executor saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub relative_path: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

/// Executor answering from a script and recording every request.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    pub responses: VecDeque<Result<Response, HttpError>>,
    pub requests: Vec<RecordedRequest>,
    pub options: Vec<(String, OptionValue)>,
    pub refuse_options: bool,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&mut self, response: Response) -> &mut Self {
        self.responses.push_back(Ok(response));
        self
    }

    pub fn respond_status(&mut self, status: u16) -> &mut Self {
        self.respond(Response::new(status))
    }

    pub fn fail(&mut self) -> &mut Self {
        self.responses
            .push_back(Err(HttpError::Builder("scripted failure".into())));
        self
    }
}

impl HttpExecutor for FakeExecutor {
    fn execute(&mut self, request: &Request<'_>) -> Result<Response, HttpError> {
        self.requests.push(RecordedRequest {
            method: request.method,
            relative_path: request.relative_path.to_string(),
            headers: request.headers.clone(),
            body: request.body.map(<[u8]>::to_vec),
        });
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::Builder("no scripted response".into())))
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<(), HttpError> {
        if self.refuse_options {
            return Err(HttpError::InvalidArg(name.to_string()));
        }
        self.options.push((name.to_string(), value.clone()));
        Ok(())
    }
}

/// Clock the test moves by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    now: Rc<Cell<Option<i64>>>,
    calls: Rc<Cell<usize>>,
}

impl FakeClock {
    pub fn at(now: i64) -> Self {
        let clock = Self::default();
        clock.set(Some(now));
        clock
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Option<i64>) {
        self.now.set(now);
    }

    pub fn advance(&self, secs: i64) {
        self.now.set(self.now.get().map(|t| t + secs));
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Option<i64> {
        self.calls.set(self.calls.get() + 1);
        self.now.get()
    }
}
