//! Fakes for the process and HTTP seams.

use crate::error::BuildResult;
use crate::http::{HttpClient, HttpResponse};
use crate::runner::{CommandOutput, CommandRunner, command_line};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

type Hook = Box<dyn Fn(&[String], Option<&Path>)>;

/// Records command lines and answers from canned responses.
///
/// Clones share state, so a clone handed to a pipeline can still be inspected.
#[derive(Clone, Default)]
pub struct FakeRunner {
    state: Rc<RefCell<RunnerState>>,
}

#[derive(Default)]
struct RunnerState {
    calls: Vec<String>,
    responses: Vec<(String, CommandOutput)>,
    hooks: Vec<(String, Hook)>,
}

/// Serves canned bodies by URL. Unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct FakeHttp {
    state: Rc<RefCell<HttpState>>,
}

#[derive(Default)]
struct HttpState {
    routes: HashMap<String, HttpResponse>,
    requests: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose line contains `pattern`.
    pub fn respond(&self, pattern: &str, exit_code: i32, stdout: &str, stderr: &str) {
        self.state.borrow_mut().responses.push((
            pattern.to_string(),
            CommandOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        ));
    }

    /// Run `hook` for commands whose line contains `pattern`, before answering.
    pub fn on(&self, pattern: &str, hook: impl Fn(&[String], Option<&Path>) + 'static) {
        self.state
            .borrow_mut()
            .hooks
            .push((pattern.to_string(), Box::new(hook)));
    }

    /// Every command line run so far.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, status: u16, body: Vec<u8>) {
        self.state
            .borrow_mut()
            .routes
            .insert(url.to_string(), HttpResponse { status, body });
    }

    /// Every URL requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.borrow().requests.clone()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> BuildResult<CommandOutput> {
        let line = command_line(program, args);
        let state = self.state.borrow();
        for (pattern, hook) in &state.hooks {
            if line.contains(pattern.as_str()) {
                hook(args, cwd);
            }
        }
        let output = state
            .responses
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default();
        drop(state);

        self.state.borrow_mut().calls.push(line);
        Ok(output)
    }
}

impl HttpClient for FakeHttp {
    fn get(&self, url: &str) -> BuildResult<HttpResponse> {
        let mut state = self.state.borrow_mut();
        state.requests.push(url.to_string());
        Ok(state.routes.get(url).cloned().unwrap_or(HttpResponse {
            status: 404,
            body: Vec::new(),
        }))
    }
}
