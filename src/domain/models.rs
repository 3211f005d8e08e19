use std::fmt;
use std::io::Read;
use std::time::Duration;

use super::collector::Collector;
use super::value_objects::{ExecutionStatus, SolveStatus};

/// Execution options sent along with every job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Name of the attachment the service writes the solution to
    pub output: String,
    /// Whether the solution is downloaded once the job is processed
    pub load_solution: bool,
    /// Name of the solver log attachment
    pub log: String,
    /// Compress uploads
    pub gzip: bool,
    /// Upper bound on the wait for job completion
    pub wait: Duration,
    /// Let the service delete the job record itself once processed
    pub delete_on_completion: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            output: "results.json".to_string(),
            load_solution: true,
            log: "solver.log".to_string(),
            gzip: true,
            wait: Duration::from_secs(300),
            delete_on_completion: false,
        }
    }
}

impl JobOptions {
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }
}

/// Named input attachment, streamed to the service on submission
pub struct JobInput<'a> {
    pub name: &'a str,
    pub content: &'a mut (dyn Read + Send),
}

impl fmt::Debug for JobInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobInput").field("name", &self.name).finish()
    }
}

/// A complete job: its inputs in submission order plus execution options
#[derive(Debug)]
pub struct JobRequest<'a> {
    pub inputs: Vec<JobInput<'a>>,
    pub options: &'a JobOptions,
}

impl<'a> JobRequest<'a> {
    pub fn new(options: &'a JobOptions) -> Self {
        Self {
            inputs: Vec::new(),
            options,
        }
    }

    pub fn add_input(mut self, input: JobInput<'a>) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.name).collect()
    }
}

/// What the service reports once a job stops running (or the wait ends)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobResponse {
    pub job_id: String,
    pub execution_status: ExecutionStatus,
    pub solve_status: Option<SolveStatus>,
    pub solution: Option<Vec<u8>>,
    pub failure_message: Option<String>,
}

impl JobResponse {
    pub fn processed(
        job_id: impl Into<String>,
        solve_status: SolveStatus,
        solution: Vec<u8>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            execution_status: ExecutionStatus::Processed,
            solve_status: Some(solve_status),
            solution: Some(solution),
            failure_message: None,
        }
    }

    pub fn failed(job_id: impl Into<String>, message: Option<String>) -> Self {
        Self {
            job_id: job_id.into(),
            execution_status: ExecutionStatus::Failed,
            failure_message: message,
            ..Self::default()
        }
    }
}

/// Result of one `Optimizer::solve` call
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    /// Job processed; the collector was also appended to the history
    Solved(Collector),
    /// Job failed on the service, with its failure message (empty if none)
    Failed { message: String },
    /// Job ended the wait in any other state
    Unknown { status: ExecutionStatus },
}

impl SolveOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, SolveOutcome::Solved(_))
    }

    pub fn solution(&self) -> Option<&Collector> {
        match self {
            SolveOutcome::Solved(collector) => Some(collector),
            _ => None,
        }
    }

    pub fn into_solution(self) -> Option<Collector> {
        match self {
            SolveOutcome::Solved(collector) => Some(collector),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collector::ResultSchema;

    #[test]
    fn test_default_job_options() {
        let options = JobOptions::default();
        assert_eq!(options.output, "results.json");
        assert_eq!(options.log, "solver.log");
        assert!(options.load_solution);
        assert!(options.gzip);
        assert_eq!(options.wait, Duration::from_secs(300));
        assert!(!options.delete_on_completion);
    }

    #[test]
    fn test_request_keeps_input_order() {
        let options = JobOptions::default();
        let mut model: &[u8] = b"model";
        let mut data: &[u8] = b"data";
        let request = JobRequest::new(&options)
            .add_input(JobInput { name: "diet.mod", content: &mut model })
            .add_input(JobInput { name: "foods", content: &mut data });
        assert_eq!(request.input_names(), vec!["diet.mod", "foods"]);
    }

    #[test]
    fn test_outcome_accessors() {
        let solved = SolveOutcome::Solved(Collector::new("r", ResultSchema::new()));
        assert!(solved.is_solved());
        assert_eq!(solved.solution().map(Collector::name), Some("r"));

        let failed = SolveOutcome::Failed { message: "infeasible".into() };
        assert!(!failed.is_solved());
        assert!(failed.into_solution().is_none());
    }
}
