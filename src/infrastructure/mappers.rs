// Mappers: protobuf <-> domain conversion for the job service
// Only this module and the gRPC client see generated protobuf types

use std::io::{self, Read};
use std::time::Duration;

use tonic::{Code, Status};

use crate::domain::{
    job_client::JobError,
    models::{JobOptions, JobRequest, JobResponse},
    value_objects::{ExecutionStatus, SolveStatus},
};

pub mod job_service {
    tonic::include_proto!("job_service");
}

use job_service as proto;
use proto::job_chunk::Chunk;

/// Convert protobuf ExecutionStatus to domain ExecutionStatus
pub fn proto_to_domain_execution_status(value: i32) -> ExecutionStatus {
    match proto::ExecutionStatus::try_from(value) {
        Ok(proto::ExecutionStatus::Created) => ExecutionStatus::Created,
        Ok(proto::ExecutionStatus::NotStarted) => ExecutionStatus::NotStarted,
        Ok(proto::ExecutionStatus::Running) => ExecutionStatus::Running,
        Ok(proto::ExecutionStatus::Interrupting) => ExecutionStatus::Interrupting,
        Ok(proto::ExecutionStatus::Interrupted) => ExecutionStatus::Interrupted,
        Ok(proto::ExecutionStatus::Failed) => ExecutionStatus::Failed,
        Ok(proto::ExecutionStatus::Processed) => ExecutionStatus::Processed,
        Ok(proto::ExecutionStatus::Unknown) | Err(_) => ExecutionStatus::Unknown,
    }
}

/// Convert domain ExecutionStatus to protobuf ExecutionStatus
pub fn domain_to_proto_execution_status(status: ExecutionStatus) -> i32 {
    let status = match status {
        ExecutionStatus::Unknown => proto::ExecutionStatus::Unknown,
        ExecutionStatus::Created => proto::ExecutionStatus::Created,
        ExecutionStatus::NotStarted => proto::ExecutionStatus::NotStarted,
        ExecutionStatus::Running => proto::ExecutionStatus::Running,
        ExecutionStatus::Interrupting => proto::ExecutionStatus::Interrupting,
        ExecutionStatus::Interrupted => proto::ExecutionStatus::Interrupted,
        ExecutionStatus::Failed => proto::ExecutionStatus::Failed,
        ExecutionStatus::Processed => proto::ExecutionStatus::Processed,
    };
    status as i32
}

/// Convert protobuf SolveStatus to domain SolveStatus; unknown means "not reported"
pub fn proto_to_domain_solve_status(value: i32) -> Option<SolveStatus> {
    match proto::SolveStatus::try_from(value) {
        Ok(proto::SolveStatus::Feasible) => Some(SolveStatus::Feasible),
        Ok(proto::SolveStatus::Optimal) => Some(SolveStatus::Optimal),
        Ok(proto::SolveStatus::Infeasible) => Some(SolveStatus::Infeasible),
        Ok(proto::SolveStatus::Unbounded) => Some(SolveStatus::Unbounded),
        Ok(proto::SolveStatus::InfeasibleOrUnbounded) => Some(SolveStatus::InfeasibleOrUnbounded),
        Ok(proto::SolveStatus::Unknown) | Err(_) => None,
    }
}

/// Convert domain SolveStatus to protobuf SolveStatus
pub fn domain_to_proto_solve_status(status: Option<SolveStatus>) -> i32 {
    let status = match status {
        None | Some(SolveStatus::Unknown) => proto::SolveStatus::Unknown,
        Some(SolveStatus::Feasible) => proto::SolveStatus::Feasible,
        Some(SolveStatus::Optimal) => proto::SolveStatus::Optimal,
        Some(SolveStatus::Infeasible) => proto::SolveStatus::Infeasible,
        Some(SolveStatus::Unbounded) => proto::SolveStatus::Unbounded,
        Some(SolveStatus::InfeasibleOrUnbounded) => proto::SolveStatus::InfeasibleOrUnbounded,
    };
    status as i32
}

/// Convert domain JobOptions to protobuf JobOptions
pub fn domain_to_proto_options(options: &JobOptions) -> proto::JobOptions {
    proto::JobOptions {
        output: options.output.clone(),
        load_solution: options.load_solution,
        log: options.log.clone(),
        gzip: options.gzip,
        wait_seconds: options.wait.as_secs(),
        delete_on_completion: options.delete_on_completion,
    }
}

/// Convert protobuf JobOptions to domain JobOptions
pub fn proto_to_domain_options(options: proto::JobOptions) -> JobOptions {
    JobOptions {
        output: options.output,
        load_solution: options.load_solution,
        log: options.log,
        gzip: options.gzip,
        wait: Duration::from_secs(options.wait_seconds),
        delete_on_completion: options.delete_on_completion,
    }
}

/// Convert protobuf JobResponse to domain JobResponse
pub fn proto_to_domain_response(response: proto::JobResponse) -> JobResponse {
    JobResponse {
        execution_status: proto_to_domain_execution_status(response.execution_status),
        solve_status: proto_to_domain_solve_status(response.solve_status),
        job_id: response.job_id,
        solution: response.solution,
        failure_message: response.failure_message.filter(|m| !m.is_empty()),
    }
}

/// Convert domain JobResponse to protobuf JobResponse
pub fn domain_to_proto_response(response: JobResponse) -> proto::JobResponse {
    proto::JobResponse {
        job_id: response.job_id,
        execution_status: domain_to_proto_execution_status(response.execution_status),
        solve_status: domain_to_proto_solve_status(response.solve_status),
        solution: response.solution,
        failure_message: response.failure_message,
    }
}

/// Flatten a job request into the client-streamed message sequence:
/// options first, then per input a header followed by its data chunks.
///
/// Each message is handed to `emit` as soon as it is read, so at most one
/// chunk per call is held here. Returns the number of messages emitted.
pub fn domain_to_proto_chunks<F>(
    request: JobRequest<'_>,
    chunk_size: usize,
    mut emit: F,
) -> io::Result<usize>
where
    F: FnMut(proto::JobChunk) -> io::Result<()>,
{
    let chunk_size = chunk_size.max(1) as u64;
    let mut emitted = 0;
    let mut send = |chunk: Chunk| {
        emitted += 1;
        emit(proto::JobChunk { chunk: Some(chunk) })
    };

    send(Chunk::Options(domain_to_proto_options(request.options)))?;
    for input in request.inputs {
        send(Chunk::Attachment(proto::AttachmentHeader {
            name: input.name.to_string(),
        }))?;
        loop {
            let mut data = Vec::new();
            let n = Read::take(&mut *input.content, chunk_size).read_to_end(&mut data)?;
            if n == 0 {
                break;
            }
            send(Chunk::Data(data))?;
        }
    }

    Ok(emitted)
}

/// Convert a gRPC status returned by the service to a domain JobError
pub fn status_to_job_error(status: Status) -> JobError {
    let message = status.message().to_string();
    match status.code() {
        Code::NotFound => JobError::NotFound(message),
        Code::Unavailable => JobError::Connection(message),
        Code::InvalidArgument | Code::FailedPrecondition | Code::Unauthenticated => {
            JobError::Submission(message)
        }
        code => JobError::Remote(format!("{:?}: {}", code, message)),
    }
}
