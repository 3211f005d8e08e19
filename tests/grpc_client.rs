// gRPC client against an in-process job service

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

use letsopt_jobs::infrastructure::grpc_client::API_KEY_HEADER;
use letsopt_jobs::infrastructure::mappers::{self, job_service as proto};
use letsopt_jobs::{
    ClientConfig, Credentials, ExecutionStatus, FieldType, GrpcJobClient, JobClient, JobError,
    JobResponse, Optimizer, OptimizerError, ResultSchema, SolveOutcome, SolveStatus,
};
use proto::job_chunk::Chunk;
use proto::job_service_server::{JobService, JobServiceServer};

const API_KEY: &str = "test-key";

#[derive(Debug, Clone)]
struct StoredJob {
    options: Option<proto::JobOptions>,
    inputs: Vec<(String, Vec<u8>)>,
}

#[derive(Default)]
struct ServiceState {
    next_id: usize,
    jobs: HashMap<String, StoredJob>,
    deleted: Vec<String>,
}

type SharedState = Arc<Mutex<ServiceState>>;

/// Solves nothing: a model mentioning "infeasible" fails, anything else is
/// processed with a fixed cost and the number of uploaded inputs
struct StubService {
    state: SharedState,
}

impl StubService {
    fn authorize<T>(request: &Request<T>) -> Result<(), Status> {
        match request.metadata().get(API_KEY_HEADER) {
            Some(key) if key == API_KEY => Ok(()),
            _ => Err(Status::unauthenticated("bad access key")),
        }
    }

    fn job(&self, job_id: &str) -> Result<StoredJob, Status> {
        self.state
            .lock()
            .unwrap()
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| Status::not_found(job_id.to_string()))
    }

    fn outcome(job_id: &str, job: &StoredJob) -> JobResponse {
        let failed = job
            .inputs
            .iter()
            .any(|(_, content)| String::from_utf8_lossy(content).contains("infeasible"));
        if failed {
            return JobResponse::failed(job_id, Some("infeasible".to_string()));
        }
        let solution = format!(r#"{{"cost": 42.5, "inputs": {}}}"#, job.inputs.len());
        JobResponse::processed(job_id, SolveStatus::Optimal, solution.into_bytes())
    }
}

#[tonic::async_trait]
impl JobService for StubService {
    async fn submit_job(
        &self,
        request: Request<Streaming<proto::JobChunk>>,
    ) -> Result<Response<proto::JobHandle>, Status> {
        Self::authorize(&request)?;
        let mut stream = request.into_inner();

        let mut job = StoredJob {
            options: None,
            inputs: Vec::new(),
        };
        while let Some(message) = stream.message().await? {
            match message.chunk {
                Some(Chunk::Options(options)) => job.options = Some(options),
                Some(Chunk::Attachment(header)) => job.inputs.push((header.name, Vec::new())),
                Some(Chunk::Data(data)) => match job.inputs.last_mut() {
                    Some((_, content)) => content.extend_from_slice(&data),
                    None => return Err(Status::invalid_argument("data before attachment header")),
                },
                None => {}
            }
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let job_id = format!("job-{}", state.next_id);
        state.jobs.insert(job_id.clone(), job);
        Ok(Response::new(proto::JobHandle { job_id }))
    }

    async fn wait_for_job(
        &self,
        request: Request<proto::WaitRequest>,
    ) -> Result<Response<proto::JobResponse>, Status> {
        Self::authorize(&request)?;
        let job_id = request.into_inner().job_id;
        let job = self.job(&job_id)?;
        Ok(Response::new(mappers::domain_to_proto_response(
            Self::outcome(&job_id, &job),
        )))
    }

    async fn get_execution_status(
        &self,
        request: Request<proto::JobHandle>,
    ) -> Result<Response<proto::ExecutionStatusReply>, Status> {
        Self::authorize(&request)?;
        let job_id = request.into_inner().job_id;
        let job = self.job(&job_id)?;
        let response = Self::outcome(&job_id, &job);
        Ok(Response::new(proto::ExecutionStatusReply {
            status: mappers::domain_to_proto_execution_status(response.execution_status),
            failure_message: response.failure_message,
        }))
    }

    async fn delete_job(
        &self,
        request: Request<proto::JobHandle>,
    ) -> Result<Response<proto::DeleteJobReply>, Status> {
        Self::authorize(&request)?;
        let job_id = request.into_inner().job_id;
        let mut state = self.state.lock().unwrap();
        let deleted = state.jobs.remove(&job_id).is_some();
        if deleted {
            state.deleted.push(job_id);
        }
        Ok(Response::new(proto::DeleteJobReply { deleted }))
    }
}

/// Serve the stub on an ephemeral port from a thread with its own runtime
fn start_server() -> (SocketAddr, SharedState) {
    let state = SharedState::default();
    let service = StubService {
        state: Arc::clone(&state),
    };
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            Server::builder()
                .add_service(
                    JobServiceServer::new(service)
                        .accept_compressed(CompressionEncoding::Gzip)
                        .send_compressed(CompressionEncoding::Gzip),
                )
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .unwrap();
        });
    });

    (rx.recv().unwrap(), state)
}

fn connect(addr: SocketAddr, api_key: &str, config: &ClientConfig) -> GrpcJobClient {
    let credentials = Credentials::new(format!("http://{}", addr), api_key);
    GrpcJobClient::connect(&credentials, config).unwrap()
}

fn result_schema() -> ResultSchema {
    ResultSchema::new()
        .with_field("cost", FieldType::Float)
        .with_field("inputs", FieldType::Integer)
}

#[test]
fn test_solve_end_to_end() {
    let _ = letsopt_jobs::init_tracing();
    let (addr, state) = start_server();

    let dir = tempfile::tempdir().unwrap();
    let foods = dir.path().join("foods.dat");
    std::fs::write(&foods, "foods = {\"bread\", \"milk\"};").unwrap();

    let mut builder = Optimizer::builder("Diet");
    builder
        .set_model_text("diet.mod", ["param n;\n", "dvar float+ x[1..n];"])
        .unwrap()
        .set_result_schema(result_schema())
        .unwrap()
        .attach([foods.as_path()])
        .unwrap();
    let credentials = Credentials::new(format!("http://{}", addr), API_KEY);
    let mut optimizer = builder.connect(&credentials, &ClientConfig::new()).unwrap();

    let input = serde_json::json!({"n": 2});
    let outcome = optimizer.solve(Some(&input), "0").unwrap();

    let result = outcome.solution().expect("solved");
    assert_eq!(result.name(), "DietResult0");
    assert_eq!(result.float("cost"), Some(42.5));
    assert_eq!(result.integer("inputs"), Some(3));
    assert_eq!(optimizer.solve_status(), SolveStatus::Optimal);

    let state = state.lock().unwrap();
    assert_eq!(state.deleted, vec!["job-1".to_string()]);
    assert!(state.jobs.is_empty());
}

#[test]
fn test_uploads_inputs_in_order_across_chunks() {
    let (addr, state) = start_server();
    let client = connect(addr, API_KEY, &ClientConfig::new().with_chunk_size(4));

    let options = letsopt_jobs::JobOptions::default().with_gzip(false);
    let mut model: &[u8] = b"param n;\ndvar float x;";
    let mut data: &[u8] = b"{\"n\": 3}";
    let request = letsopt_jobs::JobRequest::new(&options)
        .add_input(letsopt_jobs::JobInput { name: "diet.mod", content: &mut model })
        .add_input(letsopt_jobs::JobInput { name: "Diet.json", content: &mut data });

    let job_id = client.submit(request).unwrap();

    let job = state.lock().unwrap().jobs[&job_id].clone();
    assert_eq!(
        job.inputs,
        vec![
            ("diet.mod".to_string(), b"param n;\ndvar float x;".to_vec()),
            ("Diet.json".to_string(), b"{\"n\": 3}".to_vec()),
        ]
    );
    let sent = job.options.expect("options sent first");
    assert!(!sent.gzip);
    assert_eq!(sent.output, "results.json");
    assert_eq!(sent.wait_seconds, 300);
}

/// Yields some bytes, then fails like a dropped download
struct BrokenReader {
    sent: bool,
}

impl std::io::Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.sent {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "download interrupted",
            ));
        }
        self.sent = true;
        let data = b"foods = {";
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }
}

#[test]
fn test_large_upload_is_streamed_intact() {
    let (addr, state) = start_server();
    let client = connect(addr, API_KEY, &ClientConfig::new().with_chunk_size(1024));

    let options = letsopt_jobs::JobOptions::default();
    let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    let mut data: &[u8] = &payload;
    let request = letsopt_jobs::JobRequest::new(&options)
        .add_input(letsopt_jobs::JobInput { name: "columns", content: &mut data });

    let job_id = client.submit(request).unwrap();

    let job = state.lock().unwrap().jobs[&job_id].clone();
    assert_eq!(job.inputs, vec![("columns".to_string(), payload)]);
}

#[test]
fn test_failing_input_cancels_submission() {
    let (addr, state) = start_server();
    let client = connect(addr, API_KEY, &ClientConfig::new().with_chunk_size(4));

    let options = letsopt_jobs::JobOptions::default();
    let mut model: &[u8] = b"param n;";
    let mut data = BrokenReader { sent: false };
    let request = letsopt_jobs::JobRequest::new(&options)
        .add_input(letsopt_jobs::JobInput { name: "diet.mod", content: &mut model })
        .add_input(letsopt_jobs::JobInput { name: "foods", content: &mut data });

    assert_matches!(
        client.submit(request),
        Err(JobError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset
    );
    assert!(state.lock().unwrap().jobs.is_empty());
}

#[test]
fn test_wait_and_status_of_failed_job() {
    let (addr, _state) = start_server();
    let client = connect(addr, API_KEY, &ClientConfig::new());

    let options = letsopt_jobs::JobOptions::default();
    let mut model: &[u8] = b"// infeasible on purpose";
    let request = letsopt_jobs::JobRequest::new(&options)
        .add_input(letsopt_jobs::JobInput { name: "bad.mod", content: &mut model });
    let job_id = client.submit(request).unwrap();

    let response = client.wait_for_completion(&job_id, &options).unwrap();
    assert_eq!(response, JobResponse::failed(job_id.as_str(), Some("infeasible".into())));
    assert_eq!(
        client.execution_status(&job_id).unwrap(),
        ExecutionStatus::Failed
    );
    assert!(client.delete_job(&job_id).unwrap());
}

#[test]
fn test_failed_job_through_optimizer() {
    let (addr, state) = start_server();
    let client = connect(addr, API_KEY, &ClientConfig::new());

    let mut builder = Optimizer::builder("Diet");
    builder
        .set_model_text("diet.mod", ["constraint infeasible: 1 <= 0;"])
        .unwrap();
    let mut optimizer = builder.build(Arc::new(client));

    assert_eq!(
        optimizer.solve(None, "").unwrap(),
        SolveOutcome::Failed {
            message: "infeasible".to_string()
        }
    );
    assert!(optimizer.history().is_empty());
    assert_eq!(state.lock().unwrap().deleted, vec!["job-1".to_string()]);
}

#[test]
fn test_unknown_jobs() {
    let (addr, _state) = start_server();
    let client = connect(addr, API_KEY, &ClientConfig::new());

    assert!(!client.delete_job("job-404").unwrap());
    assert_matches!(
        client.execution_status("job-404"),
        Err(JobError::NotFound(id)) if id == "job-404"
    );
}

#[test]
fn test_wrong_access_key_is_rejected() {
    let (addr, state) = start_server();
    let client = connect(addr, "wrong", &ClientConfig::new());

    let mut builder = Optimizer::builder("Diet");
    builder.set_model_text("diet.mod", ["param n;"]).unwrap();
    let mut optimizer = builder.build(Arc::new(client));

    assert_matches!(
        optimizer.solve(None, ""),
        Err(OptimizerError::Job(JobError::Submission(_)))
    );
    assert!(state.lock().unwrap().jobs.is_empty());
}

#[test]
fn test_connect_to_closed_port() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let credentials = Credentials::new(format!("http://{}", addr), API_KEY);
    let config = ClientConfig::new().with_connect_timeout(Duration::from_secs(2));

    assert_matches!(
        GrpcJobClient::connect(&credentials, &config).err(),
        Some(JobError::Connection(_))
    );
}
