#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use typelox::interpreter::InterpreterConfig;
use typelox::session::Session;

/// In‑memory sink whose contents stay readable after the writer is moved
/// into a session.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A session wired to capture buffers, plus handles to read them back.
pub struct Harness {
    pub session: Session,
    pub stdout: SharedBuffer,
    pub stderr: SharedBuffer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let stdout = SharedBuffer::default();
        let stderr = SharedBuffer::default();

        let session = Session::with_config(config)
            .with_output(stdout.clone())
            .with_diagnostics(stderr.clone());

        Harness {
            session,
            stdout,
            stderr,
        }
    }

    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout.contents().lines().map(str::to_string).collect()
    }
}

/// Result of running one program to completion.
pub struct Outcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl Outcome {
    pub fn lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }
}

pub fn run(source: &str) -> Outcome {
    run_with_config(source, InterpreterConfig::default())
}

pub fn run_with_config(source: &str, config: InterpreterConfig) -> Outcome {
    let mut harness = Harness::with_config(config);
    harness.session.run(source);

    Outcome {
        stdout: harness.stdout.contents(),
        stderr: harness.stderr.contents(),
        exit_code: harness.session.exit_code(),
    }
}
