//! The assembled workflow graph.

use indexmap::IndexMap;

use a2e_core::{OperationId, WorkflowId};

use crate::frames::WorkflowFrame;
use crate::operation::Operation;

/// A workflow: an ordered set of operations plus the designated root.
///
/// The graph is implicit — edges are data dependencies derived from each
/// operation's input paths naming another operation's output location.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: WorkflowId,
    operations: IndexMap<OperationId, Operation>,
    pub root: Option<OperationId>,
}

impl Workflow {
    pub fn new(id: WorkflowId) -> Self {
        Self {
            id,
            operations: IndexMap::new(),
            root: None,
        }
    }

    /// Assemble a workflow from wire frames, in arrival order. Operation
    /// updates are idempotent on id: later frames overwrite earlier ones
    /// without changing declaration order.
    pub fn from_frames(frames: &[WorkflowFrame]) -> Option<Self> {
        let mut workflow: Option<Self> = None;

        for frame in frames {
            match frame {
                WorkflowFrame::OperationUpdate(update) => {
                    let wf = workflow
                        .get_or_insert_with(|| Self::new(update.workflow_id.clone()));
                    for operation in &update.operations {
                        wf.upsert(operation.clone());
                    }
                }
                WorkflowFrame::BeginExecution(begin) => {
                    let wf = workflow
                        .get_or_insert_with(|| Self::new(begin.workflow_id.clone()));
                    wf.root = Some(begin.root.clone());
                }
            }
        }

        workflow
    }

    /// Insert or replace an operation, preserving declaration order.
    pub fn upsert(&mut self, operation: Operation) {
        self.operations.insert(operation.id.clone(), operation);
    }

    pub fn get(&self, id: &OperationId) -> Option<&Operation> {
        self.operations.get(id)
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.operations.contains_key(id)
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &OperationId> {
        self.operations.keys()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The operation that produces the value at `path`: either its output
    /// location equals the path (or a prefix of it), or the path directly
    /// names the operation as `/workflow/<opId>`.
    pub fn producer_of(&self, path: &str) -> Option<&OperationId> {
        for operation in self.operations.values() {
            if let Some(out) = operation.kind.output_path() {
                if path == out || path.starts_with(&format!("{out}/")) {
                    return Some(&operation.id);
                }
            }
        }

        let direct = path.strip_prefix("/workflow/")?;
        let head = direct.split('/').next()?;
        let id = OperationId::new(head).ok()?;
        self.operations.get_key_value(&id).map(|(key, _)| key)
    }

    /// Data dependencies of one operation, in input order, deduplicated.
    pub fn dependencies(&self, operation: &Operation) -> Vec<OperationId> {
        let mut deps = Vec::new();
        for path in operation.kind.input_paths() {
            if let Some(producer) = self.producer_of(path) {
                if producer != &operation.id && !deps.contains(producer) {
                    deps.push(producer.clone());
                }
            }
        }
        deps
    }

    /// Execution order: a topological traversal seeded at the root
    /// (dependencies before dependents), with any declared operations not
    /// reachable from the root appended in declaration order.
    pub fn execution_order(&self) -> Vec<OperationId> {
        let mut order = Vec::with_capacity(self.operations.len());
        let mut visited = Vec::new();

        if let Some(root) = &self.root {
            self.visit(root, &mut visited, &mut order);
        }

        for id in self.operations.keys() {
            if !visited.contains(id) {
                self.visit(id, &mut visited, &mut order);
            }
        }

        order
    }

    fn visit(&self, id: &OperationId, visited: &mut Vec<OperationId>, order: &mut Vec<OperationId>) {
        if visited.contains(id) {
            return;
        }
        let Some(operation) = self.operations.get(id) else {
            return;
        };
        visited.push(id.clone());

        for dep in self.dependencies(operation) {
            self.visit(&dep, visited, order);
        }
        order.push(id.clone());
    }

    /// Detect a dependency cycle, returning the operations on it. The
    /// graph is a DAG by design; a cycle is a validation error.
    pub fn find_cycle(&self) -> Option<Vec<OperationId>> {
        let mut done = Vec::new();

        for start in self.operations.keys() {
            if done.contains(start) {
                continue;
            }
            let mut stack = Vec::new();
            if let Some(cycle) = self.cycle_from(start, &mut stack, &mut done) {
                return Some(cycle);
            }
        }
        None
    }

    fn cycle_from(
        &self,
        id: &OperationId,
        stack: &mut Vec<OperationId>,
        done: &mut Vec<OperationId>,
    ) -> Option<Vec<OperationId>> {
        if let Some(pos) = stack.iter().position(|entry| entry == id) {
            return Some(stack[pos..].to_vec());
        }
        if done.contains(id) {
            return None;
        }

        let operation = self.operations.get(id)?;
        stack.push(id.clone());
        for dep in self.dependencies(operation) {
            if let Some(cycle) = self.cycle_from(&dep, stack, done) {
                return Some(cycle);
            }
        }
        stack.pop();
        done.push(id.clone());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::parse_frames;
    use pretty_assertions::assert_eq;

    fn workflow(body: &str) -> Workflow {
        Workflow::from_frames(&parse_frames(body).unwrap()).unwrap()
    }

    const PIPELINE: &str = r#"
{"operationUpdate": {"workflowId": "example", "operations": [{"id": "filter", "operation": {"FilterData": {"inputPath": "/workflow/users", "conditions": [], "outputPath": "/workflow/filtered"}}}, {"id": "fetch", "operation": {"ApiCall": {"method": "GET", "url": "https://api.example.com/users", "outputPath": "/workflow/users"}}}]}}
{"beginExecution": {"workflowId": "example", "root": "fetch"}}
"#;

    #[test]
    fn producer_is_resolved_by_output_location() {
        let wf = workflow(PIPELINE);
        assert_eq!(
            wf.producer_of("/workflow/users").unwrap(),
            &OperationId::new("fetch").unwrap()
        );
        assert_eq!(
            wf.producer_of("/workflow/users/0/points").unwrap(),
            &OperationId::new("fetch").unwrap()
        );
        assert!(wf.producer_of("/workflow/unknown").is_none());
    }

    #[test]
    fn producer_falls_back_to_direct_operation_naming() {
        let wf = workflow(PIPELINE);
        assert_eq!(
            wf.producer_of("/workflow/filter").unwrap(),
            &OperationId::new("filter").unwrap()
        );
    }

    #[test]
    fn execution_order_puts_dependencies_first() {
        // Declaration order is filter-then-fetch; data flow requires the
        // opposite.
        let wf = workflow(PIPELINE);
        let order: Vec<String> = wf.execution_order().iter().map(ToString::to_string).collect();
        assert_eq!(order, vec!["fetch", "filter"]);
    }

    #[test]
    fn unreachable_operations_append_in_declaration_order() {
        let body = r#"
{"operationUpdate": {"workflowId": "w", "operations": [{"id": "a", "operation": {"Wait": {"duration": 1}}}, {"id": "b", "operation": {"Wait": {"duration": 1}}}, {"id": "c", "operation": {"Wait": {"duration": 1}}}]}}
{"beginExecution": {"workflowId": "w", "root": "b"}}
"#;
        let wf = workflow(body);
        let order: Vec<String> = wf.execution_order().iter().map(ToString::to_string).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn later_frames_overwrite_earlier_operations() {
        let body = r#"
{"operationUpdate": {"workflowId": "w", "operations": [{"id": "wait", "operation": {"Wait": {"duration": 1}}}]}}
{"operationUpdate": {"workflowId": "w", "operations": [{"id": "wait", "operation": {"Wait": {"duration": 99}}}]}}
{"beginExecution": {"workflowId": "w", "root": "wait"}}
"#;
        let wf = workflow(body);
        assert_eq!(wf.len(), 1);
        match &wf.get(&OperationId::new("wait").unwrap()).unwrap().kind {
            crate::operation::OperationKind::Wait(config) => assert_eq!(config.duration, 99),
            other => panic!("wrong kind: {}", other.name()),
        }
    }

    #[test]
    fn cycle_detection_finds_mutual_dependencies() {
        let body = r#"
{"operationUpdate": {"workflowId": "w", "operations": [{"id": "a", "operation": {"FormatText": {"inputPath": "/workflow/b-out", "format": "trim", "outputPath": "/workflow/a-out"}}}, {"id": "b", "operation": {"FormatText": {"inputPath": "/workflow/a-out", "format": "trim", "outputPath": "/workflow/b-out"}}}]}}
{"beginExecution": {"workflowId": "w", "root": "a"}}
"#;
        let wf = workflow(body);
        let cycle = wf.find_cycle().unwrap();
        assert_eq!(cycle.len(), 2);
        assert!(workflow(PIPELINE).find_cycle().is_none());
    }
}
