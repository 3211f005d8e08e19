// Job orchestration
// One Optimizer serves many sequential solves of the same problem: the model
// and the constant data attachments are fixed, the variable input changes
// from call to call (e.g. columns added by a decomposition master problem).

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, info_span, warn};

use crate::application::model_source::ModelSource;
use crate::application::resources::{
    LocationOpener, RemoteJobGuard, ResourceOpener, StreamRegistry,
};
use crate::domain::{
    Collector, ExecutionStatus, InputData, JobClient, JobError, JobOptions, JobRequest,
    Location, ResultSchema, SolveOutcome, SolveStatus,
};
use crate::error::{OptimizerError, Result};
use crate::infrastructure::{ClientConfig, Credentials, GrpcJobClient};

/// Collects the one-time configuration of an [`Optimizer`]
pub struct OptimizerBuilder {
    name: String,
    model: Option<ModelSource>,
    result_schema: Option<ResultSchema>,
    attachments: IndexMap<String, Location>,
    opener: Arc<dyn ResourceOpener>,
    options: JobOptions,
}

impl OptimizerBuilder {
    pub fn new(problem_name: impl Into<String>) -> Self {
        Self {
            name: problem_name.into(),
            model: None,
            result_schema: None,
            attachments: IndexMap::new(),
            opener: Arc::new(LocationOpener::new()),
            options: JobOptions::default(),
        }
    }

    /// Set the optimization model; a model can be set only once
    pub fn set_model(&mut self, model: ModelSource) -> Result<&mut Self> {
        if self.model.is_some() {
            return Err(OptimizerError::ModelAlreadySet);
        }
        self.model = Some(model);
        Ok(self)
    }

    /// Set a model given as literal text fragments, concatenated in order
    pub fn set_model_text<I, S>(&mut self, name: impl Into<String>, text: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.model.is_some() {
            return Err(OptimizerError::ModelAlreadySet);
        }
        self.set_model(ModelSource::from_text(name, text)?)
    }

    /// Set a model given as model file locations, concatenated in order
    pub fn set_model_locations<I, L>(
        &mut self,
        name: impl Into<String>,
        locations: I,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        if self.model.is_some() {
            return Err(OptimizerError::ModelAlreadySet);
        }
        self.set_model(ModelSource::from_locations(name, locations)?)
    }

    /// Set the schema results are read with; it can be set only once
    pub fn set_result_schema(&mut self, schema: ResultSchema) -> Result<&mut Self> {
        if self.result_schema.is_some() {
            return Err(OptimizerError::SchemaAlreadySet);
        }
        if schema.is_empty() {
            return Err(OptimizerError::EmptySchema);
        }
        self.result_schema = Some(schema);
        Ok(self)
    }

    /// Replace the constant data attachments.
    ///
    /// Each location is keyed by its file stem. On a duplicate stem the
    /// previous attachments are kept.
    pub fn attach<I, L>(&mut self, locations: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        let mut attachments = IndexMap::new();
        for location in locations {
            let location = location.into();
            let stem = location.stem();
            if attachments.contains_key(&stem) {
                return Err(OptimizerError::DuplicateAttachment(stem));
            }
            attachments.insert(stem, location);
        }
        self.attachments = attachments;
        Ok(self)
    }

    /// Use a custom opener for model fragments and attachments
    pub fn opener(&mut self, opener: Arc<dyn ResourceOpener>) -> &mut Self {
        self.opener = opener;
        self
    }

    pub fn job_options(&mut self, options: JobOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> Option<&ModelSource> {
        self.model.as_ref()
    }

    pub fn result_schema(&self) -> Option<&ResultSchema> {
        self.result_schema.as_ref()
    }

    pub fn attachments(&self) -> &IndexMap<String, Location> {
        &self.attachments
    }

    pub fn build(self, client: Arc<dyn JobClient>) -> Optimizer {
        Optimizer {
            name: self.name,
            model: self.model,
            result_schema: self.result_schema.unwrap_or_default(),
            attachments: self.attachments,
            opener: self.opener,
            options: self.options,
            client,
            solve_status: SolveStatus::Unknown,
            history: Vec::new(),
            last_job_id: None,
        }
    }

    /// Connect to the solve service over gRPC and build
    pub fn connect(self, credentials: &Credentials, config: &ClientConfig) -> Result<Optimizer> {
        let client = GrpcJobClient::connect(credentials, config)?;
        Ok(self.build(Arc::new(client)))
    }
}

impl fmt::Debug for OptimizerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizerBuilder")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("result_schema", &self.result_schema)
            .field("attachments", &self.attachments)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Submits solve jobs for one problem instance and keeps their results
pub struct Optimizer {
    name: String,
    model: Option<ModelSource>,
    result_schema: ResultSchema,
    attachments: IndexMap<String, Location>,
    opener: Arc<dyn ResourceOpener>,
    options: JobOptions,
    client: Arc<dyn JobClient>,
    solve_status: SolveStatus,
    history: Vec<Collector>,
    last_job_id: Option<String>,
}

impl Optimizer {
    pub fn builder(problem_name: impl Into<String>) -> OptimizerBuilder {
        OptimizerBuilder::new(problem_name)
    }

    /// Solve the problem once with the given variable input.
    ///
    /// `solution_id` tags the result collector, which is named
    /// `<problem>Result<solution_id>`. Every stream opened for the job is
    /// closed and the job record is deleted before this returns, whatever
    /// the outcome.
    pub fn solve(
        &mut self,
        input: Option<&dyn InputData>,
        solution_id: &str,
    ) -> Result<SolveOutcome> {
        if self.model.is_none() {
            return Err(OptimizerError::NoModelAttached);
        }

        let span = info_span!("solve", problem = %self.name, solution_id);
        let _enter = span.enter();
        self.solve_status = SolveStatus::Unknown;

        let client = Arc::clone(&self.client);
        let mut job = RemoteJobGuard::new(client.as_ref());
        let mut resources = StreamRegistry::new();

        let outcome = self.run_job(client.as_ref(), &mut job, &mut resources, input, solution_id);

        resources.close_all();
        job.release();
        debug!("cleaned up");

        outcome
    }

    fn run_job(
        &mut self,
        client: &dyn JobClient,
        job: &mut RemoteJobGuard<'_>,
        resources: &mut StreamRegistry,
        input: Option<&dyn InputData>,
        solution_id: &str,
    ) -> Result<SolveOutcome> {
        let model = self.model.as_ref().ok_or(OptimizerError::NoModelAttached)?;
        if !model.is_empty() {
            resources.register_input(model.name(), model.materialize(self.opener.as_ref())?);
        }

        for (stem, location) in &self.attachments {
            let stream = self
                .opener
                .open(location)
                .map_err(|source| OptimizerError::Attachment {
                    location: location.clone(),
                    source,
                })?;
            resources.register_input(stem.as_str(), stream);
        }

        if let Some(input) = input {
            let mut buffer = Vec::new();
            input.write_json(&mut buffer)?;
            resources.register_input(format!("{}.json", self.name), Box::new(Cursor::new(buffer)));
        }
        debug!(inputs = resources.len(), "inputs assembled");

        let mut request = JobRequest::new(&self.options);
        request.inputs = resources.job_inputs();
        let job_id = client.submit(request)?;
        job.track(job_id.clone());
        self.last_job_id = Some(job_id.clone());
        info!(job_id = %job_id, client = client.name(), "job submitted");

        let response = client.wait_for_completion(&job_id, &self.options)?;
        match client.execution_status(&job_id)? {
            ExecutionStatus::Processed => {
                let solution = response.solution.ok_or_else(|| {
                    JobError::InvalidResponse(format!("processed job {} has no solution", job_id))
                })?;
                let results = resources.register_output(
                    self.options.output.as_str(),
                    Box::new(Cursor::new(solution)),
                );

                self.solve_status = response.solve_status.unwrap_or_default();
                let collector = Collector::new(
                    format!("{}Result{}", self.name, solution_id),
                    self.result_schema.clone(),
                )
                .from_json(results)?;
                info!(job_id = %job_id, status = %self.solve_status, "job processed");

                self.history.push(collector.clone());
                Ok(SolveOutcome::Solved(collector))
            }
            ExecutionStatus::Failed => {
                let message = response.failure_message.unwrap_or_default();
                warn!(job_id = %job_id, message = %message, "job failed");
                Ok(SolveOutcome::Failed { message })
            }
            status => {
                info!(job_id = %job_id, status = %status, "job not processed");
                Ok(SolveOutcome::Unknown { status })
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Solve status of the most recent processed job
    pub fn solve_status(&self) -> SolveStatus {
        self.solve_status
    }

    /// Result collectors of all processed solves, oldest first
    pub fn history(&self) -> &[Collector] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn last_job_id(&self) -> Option<&str> {
        self.last_job_id.as_deref()
    }

    pub fn model(&self) -> Option<&ModelSource> {
        self.model.as_ref()
    }

    pub fn result_schema(&self) -> &ResultSchema {
        &self.result_schema
    }

    pub fn attachments(&self) -> &IndexMap<String, Location> {
        &self.attachments
    }

    pub fn job_options(&self) -> &JobOptions {
        &self.options
    }
}

impl fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Optimizer")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("attachments", &self.attachments)
            .field("client", &self.client.name())
            .field("solve_status", &self.solve_status)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}
