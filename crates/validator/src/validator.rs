//! The workflow validator.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;
use url::Url;

use a2e_auth::AgentDirectory;
use a2e_core::{AgentId, OperationId};
use a2e_credential::CredentialVault;
use a2e_registry::{operation_names, ApiCatalog};
use a2e_workflow::{Operation, OperationKind, OutputShape, Workflow};

use crate::diagnostics::{Diagnostic, ValidationLevel, ValidationReport};

/// Validates submitted workflows against the capability view.
///
/// Collaborators are optional: without a registry the API checks are
/// skipped, without a vault the credential-existence checks are skipped,
/// and so on — mirroring how much of the service is wired up.
pub struct WorkflowValidator<'a> {
    registry: Option<&'a ApiCatalog>,
    vault: Option<&'a CredentialVault>,
    auth: Option<&'a AgentDirectory>,
    level: ValidationLevel,
}

impl<'a> WorkflowValidator<'a> {
    pub fn new(level: ValidationLevel) -> Self {
        Self {
            registry: None,
            vault: None,
            auth: None,
            level,
        }
    }

    pub fn with_registry(mut self, registry: &'a ApiCatalog) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_vault(mut self, vault: &'a CredentialVault) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn with_auth(mut self, auth: &'a AgentDirectory) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Validate a line-delimited workflow body.
    pub fn validate(&self, body: &str, agent: Option<&AgentId>) -> ValidationReport {
        let mut issues = Vec::new();
        let workflow = self.parse(body, &mut issues);

        if let Some(workflow) = &workflow {
            if workflow.is_empty() {
                issues.push(Diagnostic::error("Workflow contains no operations"));
            } else {
                self.check_dependencies(workflow, &mut issues);
                self.check_types(workflow, &mut issues);
                self.check_apis(workflow, agent, &mut issues);
                self.check_credentials(workflow, agent, &mut issues);
                self.check_operations_allowed(workflow, agent, &mut issues);
                self.check_patterns(workflow, &mut issues);
                self.check_graph(workflow, &mut issues);
            }
        } else {
            issues.push(Diagnostic::error("Workflow contains no operations"));
        }

        let report = ValidationReport::from_diagnostics(issues, self.level);
        debug!(
            valid = report.valid,
            errors = report.errors,
            warnings = report.warnings,
            "validated workflow"
        );
        report
    }

    /// Lenient parse: structure diagnostics come from a raw JSON pass so a
    /// malformed operation does not mask the rest of the workflow.
    fn parse(&self, body: &str, issues: &mut Vec<Diagnostic>) -> Option<Workflow> {
        let mut workflow: Option<Workflow> = None;
        let mut seen_ids: BTreeSet<String> = BTreeSet::new();

        for (index, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = index + 1;

            let frame: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(err) => {
                    issues.push(Diagnostic::error(format!(
                        "Invalid JSON on line {line_no}: {err}"
                    )));
                    continue;
                }
            };

            if let Some(update) = frame.get("operationUpdate") {
                let operations = update
                    .get("operations")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for raw in operations {
                    self.ingest_operation(&raw, &mut workflow, &mut seen_ids, issues);
                }
            } else if let Some(begin) = frame.get("beginExecution") {
                let Some(root) = begin.get("root").and_then(Value::as_str) else {
                    issues.push(Diagnostic::error(format!(
                        "beginExecution frame on line {line_no} missing 'root'"
                    )));
                    continue;
                };
                match OperationId::new(root) {
                    Ok(root) => {
                        let wf = workflow.get_or_insert_with(default_workflow);
                        wf.root = Some(root);
                    }
                    Err(err) => issues.push(Diagnostic::error(format!(
                        "beginExecution names invalid root '{root}': {err}"
                    ))),
                }
            } else {
                issues.push(Diagnostic::error(format!(
                    "Unrecognized frame on line {line_no}: expected operationUpdate or beginExecution"
                )));
            }
        }

        workflow
    }

    fn ingest_operation(
        &self,
        raw: &Value,
        workflow: &mut Option<Workflow>,
        seen_ids: &mut BTreeSet<String>,
        issues: &mut Vec<Diagnostic>,
    ) {
        let Some(id_str) = raw.get("id").and_then(Value::as_str) else {
            issues.push(Diagnostic::error("Operation missing required 'id' field"));
            return;
        };
        let id = match OperationId::new(id_str) {
            Ok(id) => id,
            Err(err) => {
                issues.push(Diagnostic::error(format!(
                    "Operation has invalid id '{id_str}': {err}"
                )));
                return;
            }
        };

        if !seen_ids.insert(id_str.to_string()) {
            issues.push(
                Diagnostic::error(format!("Duplicate operation ID: {id_str}"))
                    .for_operation(id.clone()),
            );
        }

        let Some(kind) = raw.get("operation") else {
            issues.push(
                Diagnostic::error(format!("Operation '{id_str}' missing 'operation' field"))
                    .for_operation(id),
            );
            return;
        };
        let Some(kind_map) = kind.as_object().filter(|map| map.len() == 1) else {
            issues.push(
                Diagnostic::error(format!(
                    "Operation '{id_str}' must have exactly one operation type"
                ))
                .for_operation(id),
            );
            return;
        };
        let kind_name = kind_map.keys().next().expect("single entry").clone();
        if !operation_names().contains(&kind_name.as_str()) {
            issues.push(
                Diagnostic::error(format!("Unknown operation type: {kind_name}"))
                    .for_operation(id),
            );
            return;
        }

        match serde_json::from_value::<Operation>(raw.clone()) {
            Ok(operation) => {
                let wf = workflow.get_or_insert_with(default_workflow);
                wf.upsert(operation);
            }
            Err(err) => {
                issues.push(
                    Diagnostic::error(format!(
                        "Operation '{id_str}' has invalid {kind_name} config: {err}"
                    ))
                    .for_operation(id),
                );
            }
        }
    }

    /// Every `/workflow/...` input must name a declared operation or a
    /// declared output location; branch and body references must be
    /// declared operations.
    fn check_dependencies(&self, workflow: &Workflow, issues: &mut Vec<Diagnostic>) {
        for operation in workflow.operations() {
            for path in operation.kind.input_paths() {
                if !path.starts_with("/workflow/") {
                    continue;
                }
                if workflow.producer_of(path).is_none() {
                    let referenced = path.rsplit('/').next().unwrap_or(path);
                    issues.push(
                        Diagnostic::error(format!(
                            "Operation '{}' references non-existent operation '{referenced}' in inputPath",
                            operation.id
                        ))
                        .for_operation(operation.id.clone())
                        .with_suggestion(format!(
                            "Ensure an operation writes to '{path}' before '{}' runs",
                            operation.id
                        )),
                    );
                }
            }

            for referenced in operation.kind.referenced_operations() {
                if !workflow.contains(referenced) {
                    issues.push(
                        Diagnostic::error(format!(
                            "{} operation '{}' references non-existent operation '{referenced}'",
                            operation.kind.name(),
                            operation.id
                        ))
                        .for_operation(operation.id.clone()),
                    );
                }
            }
        }
    }

    /// Array-consuming kinds must not read from a kind known to produce a
    /// scalar.
    fn check_types(&self, workflow: &Workflow, issues: &mut Vec<Diagnostic>) {
        for operation in workflow.operations() {
            let requires_array = matches!(
                operation.kind,
                OperationKind::FilterData(_) | OperationKind::TransformData(_)
            );
            if !requires_array {
                continue;
            }

            for path in operation.kind.input_paths() {
                let Some(producer_id) = workflow.producer_of(path) else {
                    continue;
                };
                let Some(producer) = workflow.get(producer_id) else {
                    continue;
                };
                if producer.kind.output_shape() == OutputShape::Scalar {
                    issues.push(
                        Diagnostic::error(format!(
                            "{} operation '{}' requires array input, but '{producer_id}' produces a scalar",
                            operation.kind.name(),
                            operation.id
                        ))
                        .for_operation(operation.id.clone())
                        .with_suggestion(format!(
                            "Ensure '{producer_id}' produces an array, or transform its output first"
                        )),
                    );
                }
            }
        }
    }

    /// Remote calls must target a registered API the agent may use; an
    /// undeclared endpoint is only a warning, since endpoint lists may be
    /// under-declared.
    fn check_apis(
        &self,
        workflow: &Workflow,
        agent: Option<&AgentId>,
        issues: &mut Vec<Diagnostic>,
    ) {
        let Some(registry) = self.registry else {
            return;
        };

        for operation in workflow.operations() {
            let OperationKind::ApiCall(config) = &operation.kind else {
                continue;
            };

            let Some(host) = parse_host(&config.url) else {
                issues.push(
                    Diagnostic::warning(format!(
                        "ApiCall operation '{}' has a URL that cannot be parsed: {}",
                        operation.id, config.url
                    ))
                    .for_operation(operation.id.clone()),
                );
                continue;
            };

            let Some(api) = registry.api_for_host(&host) else {
                issues.push(
                    Diagnostic::warning(format!(
                        "ApiCall operation '{}' uses URL from unknown API domain: {host}",
                        operation.id
                    ))
                    .for_operation(operation.id.clone())
                    .with_suggestion("Verify the API is registered in the capability registry"),
                );
                continue;
            };

            if let (Some(agent), Some(auth)) = (agent, self.auth) {
                if !auth.is_api_allowed(agent, &api.id) {
                    issues.push(
                        Diagnostic::error(format!(
                            "Agent '{agent}' does not have permission to use API '{}'",
                            api.id
                        ))
                        .for_operation(operation.id.clone())
                        .with_suggestion(format!(
                            "Request access to '{}' or use a different API",
                            api.id
                        )),
                    );
                }
            }

            if let Some(path) = parse_path(&config.url) {
                if registry.find_endpoint(&api.id, &config.method, &path).is_none() {
                    issues.push(
                        Diagnostic::warning(format!(
                            "Endpoint {} {path} not found in API '{}' definition",
                            config.method, api.id
                        ))
                        .for_operation(operation.id.clone())
                        .with_suggestion("Verify the endpoint exists or add it to the API definition"),
                    );
                }
            }
        }
    }

    /// Every credential reference must exist and be permitted to the agent.
    fn check_credentials(
        &self,
        workflow: &Workflow,
        agent: Option<&AgentId>,
        issues: &mut Vec<Diagnostic>,
    ) {
        for operation in workflow.operations() {
            for credential in operation.kind.credential_refs() {
                if let Some(vault) = self.vault {
                    if !vault.contains(&credential) {
                        issues.push(
                            Diagnostic::error(format!(
                                "Credential '{credential}' referenced in operation '{}' does not exist",
                                operation.id
                            ))
                            .for_operation(operation.id.clone())
                            .with_suggestion(format!(
                                "Register credential '{credential}' in the vault"
                            )),
                        );
                        continue;
                    }
                }

                if let (Some(agent), Some(auth)) = (agent, self.auth) {
                    if !auth.is_credential_allowed(agent, &credential) {
                        issues.push(
                            Diagnostic::error(format!(
                                "Agent '{agent}' does not have permission to use credential '{credential}'",
                            ))
                            .for_operation(operation.id.clone())
                            .with_suggestion(format!("Request access to credential '{credential}'")),
                        );
                    }
                }
            }
        }
    }

    fn check_operations_allowed(
        &self,
        workflow: &Workflow,
        agent: Option<&AgentId>,
        issues: &mut Vec<Diagnostic>,
    ) {
        let (Some(agent), Some(auth)) = (agent, self.auth) else {
            return;
        };

        for operation in workflow.operations() {
            let kind = operation.kind.name();
            if !auth.is_operation_allowed(agent, kind) {
                issues.push(
                    Diagnostic::error(format!(
                        "Agent '{agent}' does not have permission to use operation '{kind}'"
                    ))
                    .for_operation(operation.id.clone()),
                );
            }
        }
    }

    /// Known-problematic patterns: unbounded loops and filters fed
    /// directly by remote calls.
    fn check_patterns(&self, workflow: &Workflow, issues: &mut Vec<Diagnostic>) {
        for operation in workflow.operations() {
            match &operation.kind {
                OperationKind::Loop(config) => {
                    if config.max_iterations == 0 {
                        issues.push(
                            Diagnostic::error(format!(
                                "Loop operation '{}' must declare a positive maxIterations bound",
                                operation.id
                            ))
                            .for_operation(operation.id.clone()),
                        );
                    } else if config.max_iterations > 10_000 {
                        issues.push(
                            Diagnostic::warning(format!(
                                "Loop operation '{}' declares a very large bound ({})",
                                operation.id, config.max_iterations
                            ))
                            .for_operation(operation.id.clone())
                            .with_suggestion("Consider a smaller bound to limit execution time"),
                        );
                    }
                }
                OperationKind::FilterData(config) => {
                    let producer = workflow
                        .producer_of(&config.input_path)
                        .and_then(|id| workflow.get(id));
                    if let Some(producer) = producer {
                        if matches!(producer.kind, OperationKind::ApiCall(_)) {
                            issues.push(
                                Diagnostic::warning(format!(
                                    "FilterData operation '{}' may fail if API call '{}' returns an empty array",
                                    operation.id, producer.id
                                ))
                                .for_operation(operation.id.clone())
                                .with_suggestion("Consider a check for empty data before filtering"),
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Graph-level checks: the declared root must exist, and the
    /// dependency graph must be acyclic.
    fn check_graph(&self, workflow: &Workflow, issues: &mut Vec<Diagnostic>) {
        if let Some(root) = &workflow.root {
            if !workflow.contains(root) {
                issues.push(Diagnostic::error(format!(
                    "beginExecution names undeclared root operation '{root}'"
                )));
            }
        }

        if let Some(cycle) = workflow.find_cycle() {
            let path = cycle
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            issues.push(Diagnostic::error(format!(
                "Workflow contains a dependency cycle: {path}"
            )));
        }
    }
}

fn default_workflow() -> Workflow {
    Workflow::new(
        a2e_core::WorkflowId::new("default").expect("static id"),
    )
}

/// Host of a URL, tolerating `{path}` template placeholders.
fn parse_host(url: &str) -> Option<String> {
    let cleaned = strip_templates(url);
    Url::parse(&cleaned)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
}

/// Path of a URL, or `None` when templated (templated paths cannot be
/// matched against declared endpoints).
fn parse_path(url: &str) -> Option<String> {
    if url.contains('{') {
        return None;
    }
    Url::parse(url).ok().map(|u| u.path().to_string())
}

fn strip_templates(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let mut depth = 0usize;
    for c in url.chars() {
        match c {
            '{' => {
                depth += 1;
                out.push('x');
            }
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}
