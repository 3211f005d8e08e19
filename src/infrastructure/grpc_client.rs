// Infrastructure: gRPC adapter for the JobClient port
// Wraps the async tonic client behind a blocking interface by driving a
// private tokio runtime. Do not call it from inside another runtime.

use std::io;
use std::time::Duration;

use futures::channel::mpsc;
use futures::SinkExt;
use tonic::codec::CompressionEncoding;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;
use tracing::{debug, info};

use super::config::{ClientConfig, Credentials};
use super::mappers::{self, job_service as proto};
use crate::domain::{
    job_client::{JobClient, JobError, Result},
    models::{JobOptions, JobRequest, JobResponse},
    value_objects::ExecutionStatus,
};
use proto::job_service_client::JobServiceClient;

/// Metadata header carrying the access key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Extra time granted on top of the job wait before the client gives up,
/// so the service can answer at its own deadline
const WAIT_GRACE: Duration = Duration::from_secs(5);

/// Upload messages queued between the input readers and the RPC
const UPLOAD_QUEUE: usize = 4;

pub struct GrpcJobClient {
    runtime: tokio::runtime::Runtime,
    client: JobServiceClient<Channel>,
    api_key: AsciiMetadataValue,
    url: String,
    chunk_size: usize,
}

impl GrpcJobClient {
    /// Connect to the solve service at `credentials.url`
    pub fn connect(credentials: &Credentials, config: &ClientConfig) -> Result<Self> {
        let api_key: AsciiMetadataValue = credentials
            .api_key
            .parse()
            .map_err(|_| JobError::Connection("access key is not valid ASCII metadata".into()))?;

        let endpoint = Endpoint::from_shared(credentials.url.clone())
            .map_err(|e| JobError::Connection(format!("{}: {}", credentials.url, e)))?
            .connect_timeout(config.connect_timeout);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        let channel = runtime
            .block_on(endpoint.connect())
            .map_err(|e| JobError::Connection(format!("{}: {}", credentials.url, e)))?;

        info!(url = %credentials.url, "connected to solve service");

        Ok(Self {
            runtime,
            client: JobServiceClient::new(channel).accept_compressed(CompressionEncoding::Gzip),
            api_key,
            url: credentials.url.clone(),
            chunk_size: config.chunk_size,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request
            .metadata_mut()
            .insert(API_KEY_HEADER, self.api_key.clone());
        request
    }

    fn handle(&self, job_id: &str) -> Request<proto::JobHandle> {
        self.request(proto::JobHandle {
            job_id: job_id.to_string(),
        })
    }
}

impl JobClient for GrpcJobClient {
    /// Upload the job while it is being read.
    ///
    /// The RPC runs on the runtime; inputs are read on the calling thread and
    /// handed over through a bounded queue, so blocking readers never run on
    /// a runtime worker and at most `UPLOAD_QUEUE` chunks are in flight.
    fn submit(&self, request: JobRequest<'_>) -> Result<String> {
        let gzip = request.options.gzip;
        let mut client = self.client.clone();
        if gzip {
            client = client.send_compressed(CompressionEncoding::Gzip);
        }

        let (mut tx, rx) = mpsc::channel(UPLOAD_QUEUE);
        let call = self.request(rx);
        let upload = self
            .runtime
            .spawn(async move { client.submit_job(call).await });

        let mut closed = false;
        let sent = mappers::domain_to_proto_chunks(request, self.chunk_size, |chunk| {
            futures::executor::block_on(tx.send(chunk)).map_err(|_| {
                closed = true;
                io::Error::new(io::ErrorKind::BrokenPipe, "upload closed by the service")
            })
        });
        drop(tx);

        match sent {
            Ok(messages) => debug!(messages, gzip, "uploaded job"),
            Err(e) if !closed => {
                // Cancel so the service never sees a complete, truncated job
                upload.abort();
                return Err(JobError::Io(e));
            }
            Err(_) => debug!(gzip, "service closed the upload early"),
        }

        let handle = self
            .runtime
            .block_on(upload)
            .map_err(|e| JobError::Submission(format!("upload task failed: {}", e)))?
            .map_err(mappers::status_to_job_error)?
            .into_inner();

        if closed {
            if !handle.job_id.is_empty() {
                self.delete_job(&handle.job_id)?;
            }
            return Err(JobError::Submission(
                "service accepted the job before all inputs were sent".into(),
            ));
        }
        if handle.job_id.is_empty() {
            return Err(JobError::InvalidResponse("service returned an empty job id".into()));
        }
        Ok(handle.job_id)
    }

    fn wait_for_completion(&self, job_id: &str, options: &JobOptions) -> Result<JobResponse> {
        let mut client = self.client.clone();
        let request = self.request(proto::WaitRequest {
            job_id: job_id.to_string(),
            wait_seconds: options.wait.as_secs(),
            load_solution: options.load_solution,
        });

        let response = self
            .runtime
            .block_on(async {
                tokio::time::timeout(options.wait + WAIT_GRACE, client.wait_for_job(request)).await
            })
            .map_err(|_| JobError::Timeout(options.wait))?
            .map_err(mappers::status_to_job_error)?
            .into_inner();

        Ok(mappers::proto_to_domain_response(response))
    }

    fn execution_status(&self, job_id: &str) -> Result<ExecutionStatus> {
        let mut client = self.client.clone();
        let reply = self
            .runtime
            .block_on(client.get_execution_status(self.handle(job_id)))
            .map_err(mappers::status_to_job_error)?
            .into_inner();
        Ok(mappers::proto_to_domain_execution_status(reply.status))
    }

    fn delete_job(&self, job_id: &str) -> Result<bool> {
        let mut client = self.client.clone();
        match self.runtime.block_on(client.delete_job(self.handle(job_id))) {
            Ok(reply) => Ok(reply.into_inner().deleted),
            Err(status) if status.code() == tonic::Code::NotFound => Ok(false),
            Err(status) => Err(mappers::status_to_job_error(status)),
        }
    }

    fn name(&self) -> &str {
        "gRPC"
    }
}
