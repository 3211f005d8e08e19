// Model source composition
// An optimization model may be split into fragments, typically a data model
// (tuples and tuple sets) followed by the optimization model that uses it.
// Fragments are concatenated in the order given, so no include statements
// are needed between them.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read};

use crate::application::resources::ResourceOpener;
use crate::domain::Location;
use crate::error::{OptimizerError, Result};

/// Where the fragments of a model come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragments {
    /// Neither locations nor text were supplied
    Empty,
    /// Model files, possibly from different places
    Locations(Vec<Location>),
    /// Literal model text
    Text(Vec<String>),
}

/// A named, possibly multi-fragment model definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    name: String,
    fragments: Fragments,
}

impl ModelSource {
    /// Create a model source from at most one fragment list.
    ///
    /// `None` means "not supplied"; an empty list is rejected.
    pub fn new(
        name: impl Into<String>,
        locations: Option<Vec<Location>>,
        text: Option<Vec<String>>,
    ) -> Result<Self> {
        let fragments = match (locations, text) {
            (Some(_), Some(_)) => return Err(OptimizerError::AmbiguousModelSource),
            (Some(locations), None) if locations.is_empty() => {
                return Err(OptimizerError::EmptyModelArgument)
            }
            (None, Some(text)) if text.is_empty() => {
                return Err(OptimizerError::EmptyModelArgument)
            }
            (Some(locations), None) => Fragments::Locations(locations),
            (None, Some(text)) => Fragments::Text(text),
            (None, None) => Fragments::Empty,
        };

        Ok(Self {
            name: name.into(),
            fragments,
        })
    }

    pub fn from_locations<I, L>(name: impl Into<String>, locations: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        Self::new(name, Some(locations.into_iter().map(Into::into).collect()), None)
    }

    pub fn from_text<I, S>(name: impl Into<String>, text: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, None, Some(text.into_iter().map(Into::into).collect()))
    }

    /// The name the model is submitted under, e.g. `diet.mod`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fragments(&self) -> &Fragments {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments == Fragments::Empty
    }

    /// Open the model as one stream over all fragments in order.
    ///
    /// Every location is opened up front, so an unreachable fragment fails
    /// here rather than halfway through an upload.
    pub fn materialize(&self, opener: &dyn ResourceOpener) -> Result<Box<dyn Read + Send>> {
        match &self.fragments {
            Fragments::Locations(locations) => {
                let mut parts = VecDeque::with_capacity(locations.len());
                for location in locations {
                    let part = opener
                        .open(location)
                        .map_err(|source| OptimizerError::Attachment {
                            location: location.clone(),
                            source,
                        })?;
                    parts.push_back(part);
                }
                Ok(Box::new(ConcatReader { parts }))
            }
            Fragments::Text(text) => Ok(Box::new(Cursor::new(text.concat().into_bytes()))),
            Fragments::Empty => Err(OptimizerError::EmptyModel),
        }
    }
}

/// Reads a sequence of streams back to back; dropping it closes them all
struct ConcatReader {
    parts: VecDeque<Box<dyn Read + Send>>,
}

impl Read for ConcatReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(current) = self.parts.front_mut() {
            let n = current.read(buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            self.parts.pop_front();
        }
        Ok(0)
    }
}
