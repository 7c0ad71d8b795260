//! Pass-through to the supervisor's own stdout and stderr.

use std::io::{self, Write};
use std::sync::Mutex;

use super::observation::Observation;
use super::{Pipe, StreamClass};
use crate::error::Result;

type Sink = Mutex<Box<dyn Write + Send>>;

pub struct StandardPipe {
    observation: Observation,
    out: Sink,
    err: Sink,
}

impl Default for StandardPipe {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardPipe {
    pub fn new() -> Self {
        Self::with_writers(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_writers(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            observation: Observation::new(),
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }

    fn sink(&self, class: StreamClass) -> &Sink {
        match class {
            StreamClass::Out => &self.out,
            StreamClass::Err => &self.err,
        }
    }
}

impl Pipe for StandardPipe {
    fn observation(&self) -> &Observation {
        &self.observation
    }

    fn write(&self, class: StreamClass, chunk: &[u8]) -> Result<usize> {
        self.observation.observe(chunk);
        let mut sink = self.sink(class).lock().unwrap_or_else(|e| e.into_inner());
        sink.write_all(chunk)?;
        Ok(chunk.len())
    }

    fn flush(&self, class: StreamClass) -> Result<()> {
        let mut sink = self.sink(class).lock().unwrap_or_else(|e| e.into_inner());
        sink.flush()?;
        Ok(())
    }
}
