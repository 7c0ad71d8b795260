//! Fan-out pipe.

use std::sync::Arc;

use super::observation::Observation;
use super::{Pipe, StreamClass};
use crate::error::Result;

/// Writes every chunk to each child pipe in order.
///
/// The plexer has its own observation; children keep theirs. A failing child
/// stops the write at that child and its error is returned.
pub struct PlexingPipe {
    observation: Observation,
    plexes: Vec<Arc<dyn Pipe>>,
}

impl PlexingPipe {
    pub fn new(plexes: Vec<Arc<dyn Pipe>>) -> Self {
        Self {
            observation: Observation::new(),
            plexes,
        }
    }

    pub fn len(&self) -> usize {
        self.plexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plexes.is_empty()
    }
}

impl Pipe for PlexingPipe {
    fn observation(&self) -> &Observation {
        &self.observation
    }

    fn write(&self, class: StreamClass, chunk: &[u8]) -> Result<usize> {
        self.observation.observe(chunk);
        for plex in &self.plexes {
            plex.write(class, chunk)?;
        }
        Ok(chunk.len())
    }

    fn flush(&self, class: StreamClass) -> Result<()> {
        let mut first_error = None;
        for plex in &self.plexes {
            if let Err(e) = plex.flush(class) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
