// Per-solve resource scope
// Streams opened for one job and the job record itself are released on
// every exit path, including early returns and unwinding.

use std::fs::File;
use std::io::{self, Read};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::domain::{job_client, JobClient, JobInput, Location};

/// Resolves a location to a readable byte stream
pub trait ResourceOpener: Send + Sync {
    fn open(&self, location: &Location) -> io::Result<Box<dyn Read + Send>>;
}

/// Opens plain paths and `file://` URLs from disk and fetches `http(s)://`
/// URLs with a blocking HTTP client
#[derive(Debug, Default)]
pub struct LocationOpener {
    http: OnceLock<reqwest::blocking::Client>,
}

impl LocationOpener {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceOpener for LocationOpener {
    fn open(&self, location: &Location) -> io::Result<Box<dyn Read + Send>> {
        match location.scheme() {
            None => Ok(Box::new(File::open(location.as_str())?)),
            Some("file") => Ok(Box::new(File::open(location.path())?)),
            Some("http") | Some("https") => {
                let client = self.http.get_or_init(reqwest::blocking::Client::new);
                let response = client
                    .get(location.as_str())
                    .send()
                    .and_then(|r| r.error_for_status())
                    .map_err(io::Error::other)?;
                Ok(Box::new(response))
            }
            Some(other) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported location scheme '{}'", other),
            )),
        }
    }
}

/// Direction of a registered stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// Uploaded to the service as a job attachment
    Input,
    /// Read back from the service
    Output,
}

struct RegisteredStream {
    name: String,
    role: StreamRole,
    stream: Box<dyn Read + Send>,
}

/// Every stream opened while serving one solve.
///
/// Streams are closed (dropped) by `close_all` or, at the latest, when the
/// registry itself is dropped.
#[derive(Default)]
pub struct StreamRegistry {
    streams: Vec<RegisteredStream>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_input(&mut self, name: impl Into<String>, stream: Box<dyn Read + Send>) {
        self.register(name.into(), StreamRole::Input, stream);
    }

    /// Register an output stream and hand it back for reading
    pub fn register_output(
        &mut self,
        name: impl Into<String>,
        stream: Box<dyn Read + Send>,
    ) -> &mut (dyn Read + Send) {
        let index = self.register(name.into(), StreamRole::Output, stream);
        self.streams[index].stream.as_mut()
    }

    fn register(&mut self, name: String, role: StreamRole, stream: Box<dyn Read + Send>) -> usize {
        debug!(name = %name, ?role, "registered stream");
        self.streams.push(RegisteredStream { name, role, stream });
        self.streams.len() - 1
    }

    /// Input streams as job attachments, in registration order
    pub fn job_inputs(&mut self) -> Vec<JobInput<'_>> {
        let mut inputs = Vec::new();
        for entry in self.streams.iter_mut() {
            if entry.role == StreamRole::Input {
                inputs.push(JobInput {
                    name: entry.name.as_str(),
                    content: entry.stream.as_mut(),
                });
            }
        }
        inputs
    }

    pub fn names(&self, role: StreamRole) -> Vec<&str> {
        self.streams
            .iter()
            .filter(|s| s.role == role)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Close every registered stream; returns how many were closed
    pub fn close_all(&mut self) -> usize {
        let closed = self.streams.len();
        self.streams.clear();
        if closed > 0 {
            debug!(closed, "closed solve streams");
        }
        closed
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Deletes a remote job record exactly once, when released or dropped
pub struct RemoteJobGuard<'a> {
    client: &'a dyn JobClient,
    job_id: Option<String>,
}

impl<'a> RemoteJobGuard<'a> {
    pub fn new(client: &'a dyn JobClient) -> Self {
        Self {
            client,
            job_id: None,
        }
    }

    pub fn track(&mut self, job_id: impl Into<String>) {
        self.job_id = Some(job_id.into());
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Delete the tracked job now. Returns `None` when no job was tracked.
    pub fn release(mut self) -> Option<job_client::Result<bool>> {
        self.delete()
    }

    fn delete(&mut self) -> Option<job_client::Result<bool>> {
        let job_id = self.job_id.take()?;
        let result = self.client.delete_job(&job_id);
        match &result {
            Ok(true) => debug!(job_id = %job_id, "job deleted"),
            Ok(false) => warn!(job_id = %job_id, "job was already gone when deleting"),
            Err(e) => warn!(job_id = %job_id, error = %e, "job could not be deleted"),
        }
        Some(result)
    }
}

impl Drop for RemoteJobGuard<'_> {
    fn drop(&mut self) {
        self.delete();
    }
}
