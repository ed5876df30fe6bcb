//! The execution engine.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use a2e_core::{ExecutionId, ExecutionStatus, OperationId};
use a2e_error::{A2eError, ErrorCategory, Result};
use a2e_journal::AuditEvent;
use a2e_resilience::run_with_retry;
use a2e_workflow::{DataModel, Operation, OperationKind, Workflow};

use crate::context::{EngineServices, ExecutionOptions};
use crate::handlers;
use crate::outcome::ExecutionOutcome;
use crate::request::send_api_call;

/// Dispatches validated workflows against the shared services.
///
/// The engine holds no per-execution state; each call to [`Engine::execute`]
/// builds its own data model and audit buffer, so concurrent executions
/// only share the vault, limiter, cache, and journal.
pub struct Engine {
    services: std::sync::Arc<EngineServices>,
}

impl Engine {
    pub fn new(services: std::sync::Arc<EngineServices>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &EngineServices {
        &self.services
    }

    /// Execute a workflow. Failures are contained per operation; dispatch
    /// only terminates early on a rate-limit refusal or when the
    /// per-execution deadline expires.
    pub async fn execute(&self, workflow: &Workflow, options: &ExecutionOptions) -> ExecutionOutcome {
        let execution_id = ExecutionId::new();
        let started = Instant::now();
        let deadline = options.max_execution_time.map(|bound| started + bound);

        info!(execution = %execution_id, workflow = %workflow.id, agent = %options.agent_id, "execution start");
        self.journal(&AuditEvent::ExecutionStart {
            timestamp: Utc::now(),
            execution_id,
            agent_id: options.agent_id.clone(),
            workflow_id: workflow.id.clone(),
            workflow_summary: json!({
                "operations": workflow.len(),
                "root": workflow.root.as_ref().map(ToString::to_string),
            }),
        });

        // Loop bodies run only inside their loop, never at the top level.
        let loop_bodies: BTreeSet<OperationId> = workflow
            .operations()
            .filter_map(|op| match &op.kind {
                OperationKind::Loop(config) => Some(config.operations.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect();

        let order: Vec<OperationId> = workflow
            .execution_order()
            .into_iter()
            .filter(|id| !loop_bodies.contains(id))
            .collect();

        let mut task = ExecutionTask {
            services: &self.services,
            options,
            execution_id,
            model: DataModel::new(),
            successful: BTreeMap::new(),
            failed: BTreeMap::new(),
            skipped: Vec::new(),
            branch_skipped: BTreeSet::new(),
        };

        let mut cancelled_from = None;
        for (index, op_id) in order.iter().enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                cancelled_from = Some(index);
                break;
            }

            if task.branch_skipped.contains(op_id) {
                task.record_skip(op_id, "skipped by conditional branch");
                continue;
            }

            let Some(operation) = workflow.get(op_id) else {
                continue;
            };

            match task.dispatch(operation, workflow).await {
                Ok(value) => {
                    task.successful.insert(op_id.clone(), value);
                }
                Err(error) => {
                    let terminal = error.category() == ErrorCategory::RateLimited;
                    task.failed.insert(op_id.clone(), error);
                    if terminal {
                        cancelled_from = Some(index + 1);
                        break;
                    }
                }
            }
        }

        if let Some(from) = cancelled_from {
            for op_id in &order[from..] {
                task.record_skip(op_id, "execution terminated before dispatch");
            }
        }

        let duration = started.elapsed();
        let status = if cancelled_from.is_some() && task.rate_limit_hit().is_none() {
            ExecutionStatus::Cancelled
        } else if task.failed.is_empty() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };

        self.journal(&AuditEvent::ExecutionComplete {
            timestamp: Utc::now(),
            execution_id,
            status,
            duration_ms: duration.as_millis() as u64,
            summary: json!({
                "succeeded": task.successful.len(),
                "failed": task.failed.len(),
                "skipped": task.skipped.len(),
            }),
        });
        info!(execution = %execution_id, ?status, "execution complete");

        ExecutionOutcome {
            execution_id,
            status,
            successful: task.successful,
            failed: task.failed,
            skipped: task.skipped,
            duration,
        }
    }

    fn journal(&self, event: &AuditEvent) {
        if let Err(err) = self.services.journal.append(event) {
            warn!(error = %err, "failed to append audit event");
        }
    }
}

/// Per-execution state: the data model, the result maps, and the set of
/// operations skipped by conditional branches.
struct ExecutionTask<'a> {
    services: &'a EngineServices,
    options: &'a ExecutionOptions,
    execution_id: ExecutionId,
    model: DataModel,
    successful: BTreeMap<OperationId, Value>,
    failed: BTreeMap<OperationId, A2eError>,
    skipped: Vec<OperationId>,
    branch_skipped: BTreeSet<OperationId>,
}

impl ExecutionTask<'_> {
    fn rate_limit_hit(&self) -> Option<&A2eError> {
        self.failed
            .values()
            .find(|error| error.category() == ErrorCategory::RateLimited)
    }

    fn record_skip(&mut self, op_id: &OperationId, reason: &str) {
        self.skipped.push(op_id.clone());
        self.journal(&AuditEvent::OperationResult {
            timestamp: Utc::now(),
            execution_id: self.execution_id,
            operation_id: op_id.clone(),
            status: ExecutionStatus::Cancelled,
            duration_ms: 0,
            result: None,
            error: Some(reason.to_string()),
        });
    }

    fn journal(&self, event: &AuditEvent) {
        if let Err(err) = self.services.journal.append(event) {
            warn!(error = %err, "failed to append audit event");
        }
    }

    /// Dispatch one operation: rate limit, cache, credential injection,
    /// handler, bookkeeping.
    ///
    /// Returns an explicitly boxed future (rather than `async fn`) so that
    /// the recursive call from `run_loop` doesn't create a cyclic `Send`
    /// auto-trait obligation during inference.
    fn dispatch<'a>(
        &'a mut self,
        operation: &'a Operation,
        workflow: &'a Workflow,
    ) -> futures::future::BoxFuture<'a, Result<Value>> {
        Box::pin(self.dispatch_inner(operation, workflow))
    }

    async fn dispatch_inner(&mut self, operation: &Operation, workflow: &Workflow) -> Result<Value> {
        let op_id = &operation.id;
        let kind_name = operation.kind.name();
        let config_value = operation.kind.config_value();
        let started = Instant::now();

        // Outbound API calls consume the per-agent call budget.
        if matches!(operation.kind, OperationKind::ApiCall(_)) {
            match self.services.limiter.check(&self.options.agent_id, true) {
                Ok(None) => {}
                Ok(Some(pause)) => tokio::time::sleep(pause).await,
                Err(refusal) => {
                    let error =
                        A2eError::rate_limited(refusal.window, refusal.limit, refusal.retry_after)
                            .with_operation(op_id.clone());
                    self.journal(&AuditEvent::OperationResult {
                        timestamp: Utc::now(),
                        execution_id: self.execution_id,
                        operation_id: op_id.clone(),
                        status: ExecutionStatus::Failed,
                        duration_ms: 0,
                        result: None,
                        error: Some(error.message.clone()),
                    });
                    return Err(error);
                }
            }
        }

        // Cache consult, keyed on the pre-injection config so fingerprints
        // never see plaintext.
        if let Some(hit) = self.services.cache.get(kind_name, &config_value) {
            debug!(operation = %op_id, kind = kind_name, "cache hit");
            if let Some(path) = operation.kind.output_path() {
                self.model.set(path, hit.clone());
            }
            self.journal(&AuditEvent::OperationResult {
                timestamp: Utc::now(),
                execution_id: self.execution_id,
                operation_id: op_id.clone(),
                status: ExecutionStatus::Success,
                duration_ms: 0,
                result: Some(hit.clone()),
                error: None,
            });
            return Ok(hit);
        }

        self.journal(&AuditEvent::OperationStart {
            timestamp: Utc::now(),
            execution_id: self.execution_id,
            operation_id: op_id.clone(),
            kind: kind_name.to_string(),
            config: config_value.clone(),
        });

        let kind = self.inject_credentials(operation)?;

        let outcome = self.run_handler(op_id, &kind, workflow).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => {
                if let Some(path) = kind.output_path() {
                    self.model.set(path, value.clone());
                }
                self.services.cache.set(kind_name, &config_value, value.clone());
                self.journal(&AuditEvent::OperationResult {
                    timestamp: Utc::now(),
                    execution_id: self.execution_id,
                    operation_id: op_id.clone(),
                    status: ExecutionStatus::Success,
                    duration_ms,
                    result: Some(value.clone()),
                    error: None,
                });
                Ok(value)
            }
            Err(error) => {
                let error = error.with_operation(op_id.clone());
                warn!(operation = %op_id, kind = kind_name, error = %error, "operation failed");
                self.journal(&AuditEvent::OperationResult {
                    timestamp: Utc::now(),
                    execution_id: self.execution_id,
                    operation_id: op_id.clone(),
                    status: ExecutionStatus::Failed,
                    duration_ms,
                    result: None,
                    error: Some(error.message.clone()),
                });
                Err(error)
            }
        }
    }

    /// Materialize credential references into an executable config,
    /// journaling every use. Configs without references pass through.
    fn inject_credentials(&self, operation: &Operation) -> Result<OperationKind> {
        if operation.kind.credential_refs().is_empty() {
            return Ok(operation.kind.clone());
        }

        let (injected, used) = self
            .services
            .vault
            .inject(&operation.kind.config_value())
            .map_err(|error| error.with_operation(operation.id.clone()))?;

        for credential_id in used {
            let credential_kind = self
                .services
                .vault
                .metadata(&credential_id)
                .map(|meta| meta.kind.as_str().to_string())
                .unwrap_or_default();
            self.journal(&AuditEvent::CredentialUse {
                timestamp: Utc::now(),
                execution_id: self.execution_id,
                operation_id: operation.id.clone(),
                credential_id,
                credential_kind,
                usage_context: "operation config".to_string(),
            });
        }

        let rebuilt = json!({ operation.kind.name(): injected });
        serde_json::from_value(rebuilt)
            .map_err(|e| A2eError::execution(format!("credential injection corrupted config: {e}")))
    }

    /// The kind → handler table. Local handlers run inline; remote calls
    /// suspend and are wrapped by the retry handler.
    async fn run_handler(
        &mut self,
        op_id: &OperationId,
        kind: &OperationKind,
        workflow: &Workflow,
    ) -> Result<Value> {
        match kind {
            OperationKind::ApiCall(config) => {
                let url = self.model.render_template(&config.url);
                let headers: Vec<(String, String)> = config
                    .headers
                    .iter()
                    .map(|(key, value)| {
                        (key.clone(), handlers::stringify(&self.model.resolve_value(value)))
                    })
                    .collect();
                let body = config.body.as_ref().map(|body| self.resolve_body(body));
                let timeout = Duration::from_millis(config.timeout);

                let services = self.services;
                let name = format!("ApiCall {} {url}", config.method);
                run_with_retry(&services.retry, &name, || {
                    send_api_call(&services.http, &config.method, &url, &headers, body.as_ref(), timeout)
                })
                .await
            }
            OperationKind::FilterData(config) => handlers::data::filter_data(config, &self.model),
            OperationKind::TransformData(config) => {
                handlers::data::transform_data(config, &self.model)
            }
            OperationKind::MergeData(config) => handlers::data::merge_data(config, &self.model),
            OperationKind::StoreData(config) => {
                let value = self
                    .model
                    .get(&config.input_path)
                    .cloned()
                    .ok_or_else(|| A2eError::missing_input(&config.input_path))?;
                let backend = self.services.storage.get(&config.storage).ok_or_else(|| {
                    A2eError::execution(format!("unknown storage backend: {}", config.storage))
                })?;
                let key = self.model.render_template(&config.key);
                backend.put(&key, value).await?;
                Ok(json!({"stored": true, "storage": config.storage, "key": key}))
            }
            OperationKind::Conditional(config) => {
                let input = self
                    .model
                    .get(&config.input_path)
                    .cloned()
                    .ok_or_else(|| A2eError::missing_input(&config.input_path))?;
                let right = self.model.resolve_value(&config.value);
                let matched = handlers::compare(Some(&input), config.operator, &right);

                let (chosen, other) = if matched {
                    (&config.if_true, &config.if_false)
                } else {
                    (&config.if_false, &config.if_true)
                };
                if let Some(other) = other {
                    self.branch_skipped.insert(other.clone());
                }
                Ok(json!({
                    "matched": matched,
                    "branch": chosen.as_ref().map(ToString::to_string),
                }))
            }
            OperationKind::Loop(config) => self.run_loop(op_id, config, workflow).await,
            OperationKind::Wait(config) => {
                tokio::time::sleep(Duration::from_millis(config.duration)).await;
                Ok(Value::Null)
            }
            OperationKind::GetCurrentDateTime(config) => {
                handlers::datetime::get_current_datetime(config, &self.model)
            }
            OperationKind::ConvertTimezone(config) => {
                handlers::datetime::convert_timezone(config, &self.model)
            }
            OperationKind::DateCalculation(config) => {
                handlers::datetime::date_calculation(config, &self.model)
            }
            OperationKind::FormatText(config) => handlers::text::format_text(config, &self.model),
            OperationKind::ExtractText(config) => handlers::text::extract_text(config, &self.model),
            OperationKind::ValidateData(config) => {
                handlers::text::validate_data(config, &self.model)
            }
            OperationKind::Calculate(config) => handlers::math::calculate(config, &self.model),
            OperationKind::EncodeDecode(config) => {
                handlers::codec::encode_decode(config, &self.model)
            }
        }
    }

    /// Run a loop body once per input element, collecting the last body
    /// operation's output per iteration. The element and index are bound
    /// at `/loop/item` and `/loop/index` for the body's duration.
    async fn run_loop(
        &mut self,
        loop_id: &OperationId,
        config: &a2e_workflow::LoopConfig,
        workflow: &Workflow,
    ) -> Result<Value> {
        let input = self
            .model
            .get(&config.input_path)
            .cloned()
            .ok_or_else(|| A2eError::missing_input(&config.input_path))?;
        let Value::Array(items) = input else {
            return Err(A2eError::data("Loop requires array input"));
        };

        let mut iterations = Vec::new();
        for (index, item) in items.iter().take(config.max_iterations as usize).enumerate() {
            self.model.set("/loop/item", item.clone());
            self.model.set("/loop/index", Value::from(index));

            let mut last = Value::Null;
            for body_id in &config.operations {
                let Some(body) = workflow.get(body_id) else {
                    return Err(A2eError::validation(format!(
                        "Loop '{loop_id}' references undeclared operation '{body_id}'"
                    )));
                };
                if matches!(body.kind, OperationKind::Loop(_)) {
                    return Err(A2eError::execution("nested Loop operations are not supported"));
                }

                // Dispatch recursion is type-erased to keep the future
                // finitely sized.
                let dispatched = self.dispatch(body, workflow);
                match dispatched.await {
                    Ok(value) => last = value,
                    Err(error) => {
                        // A failing iteration is contained like any other
                        // operation failure.
                        self.failed.insert(body_id.clone(), error);
                        last = Value::Null;
                    }
                }
            }
            iterations.push(last);
        }

        self.model.set("/loop", Value::Null);
        Ok(Value::Array(iterations))
    }

    fn resolve_body(&self, body: &Value) -> Value {
        match body {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), self.model.resolve_value(value)))
                    .collect(),
            ),
            other => self.model.resolve_value(other),
        }
    }
}
