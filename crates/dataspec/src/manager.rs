//! The manager: applies transforms against shared node and status storage.
//!
//! Several managers, in one process or many, may share the same stores.
//! Statuses are always read from the store; only computed values are
//! cached locally, and those are pure functions of node identities.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::constants::{
    ATTRIBUTES_BUDGET, BIG_DATA_TASK, COMPUTE_TASK, IS_BIG_DATA, PROTECTED_PATHS, PUBLIC_PATHS,
    REASON, UPSTREAM_NODE, UPSTREAM_TASK, USER_TYPE,
};
use crate::error::{DataSpecError, Result};
use crate::node::{Dataset, Node, NodeId, NodeSpec, Scalar, Value};
use crate::schema::{Schema, Size};
use crate::source::{SourceConnector, TableName};
use crate::status::{State, Status, StatusUpdate, WritePolicy};
use crate::store::{MemoryStore, NodeStore, StatusStore};
use crate::transform::{evaluate, registry, Parameters, Transform, TransformKind};
use crate::wire::{Artifact, Artifacts};

/// Applies transforms, coordinating through shared stores.
///
/// A node's `compute` status is written once, when the node is evaluated
/// or found to depend on a failed node. No `pending` record precedes it:
/// an unset `compute` status means no manager has started the node, and a
/// node that fails its own checks leaves no status at all. Managers waiting
/// on such a node report `NotReady` once their timeout elapses.
pub struct Manager {
    config: ManagerConfig,
    id: String,
    nodes: Arc<dyn NodeStore>,
    statuses: Arc<dyn StatusStore>,
    cache: RwLock<HashMap<NodeId, Value>>,
}

impl Manager {
    /// A manager keeping nodes and statuses in the same store.
    pub fn new<S>(store: S, config: ManagerConfig) -> Result<Self>
    where
        S: NodeStore + StatusStore + 'static,
    {
        let store = Arc::new(store);
        Self::with_stores(store.clone(), store, config)
    }

    /// A manager over a fresh private in-memory store.
    pub fn in_memory() -> Result<Self> {
        Self::new(MemoryStore::new(), ManagerConfig::default())
    }

    pub fn with_stores(
        nodes: Arc<dyn NodeStore>,
        statuses: Arc<dyn StatusStore>,
        config: ManagerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let id = config.resolve_manager_id();
        debug!(manager = %id, "manager started");
        Ok(Self {
            config,
            id,
            nodes,
            statuses,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The transform for `kind`, configured with this manager's policies.
    pub fn transform(&self, kind: TransformKind) -> Transform {
        match kind {
            TransformKind::AutomaticBudget => Transform::automatic_budget(&self.config.budget),
            TransformKind::AutomaticUserSettings => {
                Transform::automatic_user_settings(&self.config.user_settings)
            }
            _ => Transform::new(kind),
        }
    }

    /// Load a source through `connector` and store its definition.
    ///
    /// The `big_data` status of a source is set by an external classifier,
    /// see [`Manager::set_big_data`].
    pub fn source(
        &self,
        connector: &dyn SourceConnector,
        uri: &str,
        tables: &[TableName],
    ) -> Result<Node> {
        let node = connector.load(uri, tables)?;
        if !node.is_source() {
            return Err(DataSpecError::Source(format!(
                "connector for '{}' returned a {} node",
                uri,
                node.kind()
            )));
        }
        self.nodes.put_node(&node)?;
        debug!(node = %node.uuid(), uri, "stored source");
        Ok(node)
    }

    /// Store a literal scalar node. Scalars are ready once stored.
    pub fn scalar(&self, scalar: Scalar) -> Result<Node> {
        let node = Node::scalar(scalar)?;
        self.nodes.put_node(&node)?;
        self.set(
            StatusUpdate::new(node.uuid(), COMPUTE_TASK, State::Ready),
            WritePolicy::Transition,
        )?;
        Ok(node)
    }

    /// Apply `transform` to `inputs`.
    ///
    /// Omitted parameters with a default are first bound by applying the
    /// default inference transform to the first input. Parents must be
    /// ready (waiting up to the configured timeout). When an input has
    /// failed, the new node and every inferred parameter node are marked
    /// as failed before the error is returned. A node already computed by
    /// any manager is returned without evaluating again.
    pub fn apply(
        &self,
        transform: &Transform,
        inputs: &[&Node],
        parameters: &Parameters,
    ) -> Result<Node> {
        let spec = registry().resolve(&transform.name)?;
        let kinds: Vec<_> = inputs.iter().map(|node| node.kind()).collect();
        spec.check_inputs(&kinds)?;

        if let Err(e) = self.await_inputs(inputs) {
            if let DataSpecError::UpstreamFailed {
                node: upstream,
                task,
                reason,
            } = &e
            {
                self.fail_planned(transform, inputs, parameters, upstream, task, reason)?;
            }
            return Err(e);
        }

        let mut parameters = parameters.clone();
        for parameter in spec.parameters {
            if parameters.contains(parameter.name) {
                continue;
            }
            if let (Some(default), Some(first)) = (parameter.default, inputs.first()) {
                let inferred = self.apply(&self.transform(default), &[*first], &Parameters::new())?;
                parameters.insert(parameter.name, inferred);
            }
        }

        let node = Node::build(transform, inputs, &parameters)?;
        self.materialize(&node, inputs, &parameters)
    }

    fn await_inputs(&self, inputs: &[&Node]) -> Result<()> {
        for input in inputs {
            for task in required_tasks(input) {
                self.await_ready(input.uuid(), task)?;
            }
        }
        Ok(())
    }

    /// The nodes `apply` would build, inferred parameters first, without
    /// evaluating any of them.
    fn plan(
        &self,
        transform: &Transform,
        inputs: &[&Node],
        parameters: &Parameters,
    ) -> Result<Vec<Node>> {
        let spec = registry().resolve(&transform.name)?;
        let mut parameters = parameters.clone();
        let mut planned = Vec::new();
        for parameter in spec.parameters {
            if parameters.contains(parameter.name) {
                continue;
            }
            if let (Some(default), Some(first)) = (parameter.default, inputs.first()) {
                let mut inferred =
                    self.plan(&self.transform(default), &[*first], &Parameters::new())?;
                if let Some(node) = inferred.last() {
                    parameters.insert(parameter.name, node.clone());
                }
                planned.append(&mut inferred);
            }
        }
        planned.push(Node::build(transform, inputs, &parameters)?);
        Ok(planned)
    }

    /// Mark every planned node depending on `upstream` as failed.
    fn fail_planned(
        &self,
        transform: &Transform,
        inputs: &[&Node],
        parameters: &Parameters,
        upstream: &NodeId,
        task: &str,
        reason: &str,
    ) -> Result<()> {
        let mut failed = vec![upstream.clone()];
        for node in self.plan(transform, inputs, parameters)? {
            if node.parents().iter().any(|parent| failed.contains(*parent)) {
                self.nodes.put_node(&node)?;
                self.propagate_failure(node.uuid(), upstream, task, reason)?;
                failed.push(node.uuid().clone());
            }
        }
        Ok(())
    }

    fn materialize(&self, node: &Node, inputs: &[&Node], parameters: &Parameters) -> Result<Node> {
        if let Some(status) = self.statuses.get(node.uuid(), COMPUTE_TASK)? {
            match status.state {
                State::Ready => {
                    debug!(node = %node.uuid(), "memo hit");
                    self.nodes.put_node(node)?;
                    return Ok(node.clone());
                }
                State::Error => return Err(failure(&status)),
                State::Pending => {}
            }
        }

        let parents: Vec<&Node> = inputs
            .iter()
            .copied()
            .chain(parameters.iter().map(|(_, node)| node))
            .collect();
        for parent in &parents {
            self.nodes.put_node(parent)?;
            for task in required_tasks(parent) {
                match self.statuses.await_ready(
                    parent.uuid(),
                    task,
                    self.config.ready_timeout(),
                    self.config.poll_interval(),
                ) {
                    Ok(_) => {}
                    Err(DataSpecError::UpstreamFailed {
                        node: upstream,
                        task,
                        reason,
                    }) => {
                        self.nodes.put_node(node)?;
                        self.propagate_failure(node.uuid(), &upstream, &task, &reason)?;
                        return Err(DataSpecError::UpstreamFailed {
                            node: upstream,
                            task,
                            reason,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let transform = node
            .transform()
            .ok_or_else(|| DataSpecError::contract(node.kind().as_str(), "node has no transform"))?;
        let input_values = inputs
            .iter()
            .map(|input| self.value(input))
            .collect::<Result<Vec<_>>>()?;
        let named = parameters
            .iter()
            .map(|(name, parameter)| Ok((name.to_string(), self.value(parameter)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let value = evaluate(transform, &input_values.iter().collect::<Vec<_>>(), &named)?;
        self.remember(node.uuid(), &value);

        self.nodes.put_node(node)?;
        if node.kind().is_dataset() {
            if let Some(input) = inputs.iter().find(|input| input.kind().is_dataset()) {
                self.propagate_big_data(input.uuid(), node.uuid())?;
            }
        }
        self.set(
            StatusUpdate::new(node.uuid(), COMPUTE_TASK, State::Ready),
            WritePolicy::Transition,
        )?;
        info!(node = %node.uuid(), transform = %transform, "computed node");
        Ok(node.clone())
    }

    fn propagate_big_data(&self, from: &NodeId, to: &NodeId) -> Result<()> {
        let Some(status) = self.statuses.get(from, BIG_DATA_TASK)? else {
            return Err(DataSpecError::NotReady {
                node: from.clone(),
                task: BIG_DATA_TASK.to_string(),
            });
        };
        self.set(
            StatusUpdate::new(to, BIG_DATA_TASK, status.state).with_properties(status.properties),
            WritePolicy::Transition,
        )?;
        Ok(())
    }

    fn propagate_failure(
        &self,
        node: &NodeId,
        upstream: &NodeId,
        task: &str,
        reason: &str,
    ) -> Result<()> {
        warn!(%node, %upstream, task, reason, "upstream failed");
        let update = StatusUpdate::new(node, COMPUTE_TASK, State::Error)
            .with_property(UPSTREAM_NODE, upstream.as_str())
            .with_property(UPSTREAM_TASK, task)
            .with_property(REASON, reason);
        match self.set(update, WritePolicy::Transition) {
            Ok(_) => Ok(()),
            // Another manager already settled this node.
            Err(DataSpecError::StatusConflict { current, .. }) => {
                warn!(%node, %current, "kept existing status");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Protected paths inferred from `source`.
    pub fn automatic_protected_paths(&self, source: &Node) -> Result<Node> {
        self.apply_inference(TransformKind::AutomaticProtectedPaths, source)
    }

    /// Public paths inferred from `source`.
    pub fn automatic_public_paths(&self, source: &Node) -> Result<Node> {
        self.apply_inference(TransformKind::AutomaticPublicPaths, source)
    }

    /// Protect `source`, inferring any paths not given.
    pub fn protect(
        &self,
        source: &Node,
        protected_paths: Option<&Node>,
        public_paths: Option<&Node>,
    ) -> Result<Node> {
        let mut parameters = Parameters::new();
        if let Some(paths) = protected_paths {
            parameters.insert(PROTECTED_PATHS, paths.clone());
        }
        if let Some(paths) = public_paths {
            parameters.insert(PUBLIC_PATHS, paths.clone());
        }
        self.apply(&self.transform(TransformKind::Protect), &[source], &parameters)
    }

    pub fn automatic_user_settings(&self, dataset: &Node) -> Result<Node> {
        self.apply_inference(TransformKind::AutomaticUserSettings, dataset)
    }

    /// Apply a user type to `dataset`, inferring it when not given.
    pub fn user_settings(&self, dataset: &Node, user_type: Option<&Node>) -> Result<Node> {
        let mut parameters = Parameters::new();
        if let Some(user_type) = user_type {
            parameters.insert(USER_TYPE, user_type.clone());
        }
        self.apply(&self.transform(TransformKind::UserSettings), &[dataset], &parameters)
    }

    pub fn automatic_budget(&self, dataset: &Node) -> Result<Node> {
        self.apply_inference(TransformKind::AutomaticBudget, dataset)
    }

    pub fn attributes_budget(&self, budget: &Node) -> Result<Node> {
        self.apply_inference(TransformKind::AttributesBudget, budget)
    }

    pub fn assign_budget(&self, dataset: &Node, attributes_budget: &Node) -> Result<Node> {
        self.apply(
            &self.transform(TransformKind::AssignBudget),
            &[dataset],
            &Parameters::new().with(ATTRIBUTES_BUDGET, attributes_budget),
        )
    }

    fn apply_inference(&self, kind: TransformKind, input: &Node) -> Result<Node> {
        self.apply(&self.transform(kind), &[input], &Parameters::new())
    }

    /// The stored definition of `id`.
    pub fn node(&self, id: &NodeId) -> Result<Node> {
        self.nodes
            .get_node(id)?
            .ok_or_else(|| DataSpecError::NodeNotFound(id.clone()))
    }

    /// The computed value of `node`, derived from its definition and the
    /// stored definitions of its ancestors.
    pub fn value(&self, node: &Node) -> Result<Value> {
        if let Some(value) = self.cached(node.uuid()) {
            return Ok(value);
        }
        let value = match node.spec() {
            NodeSpec::Source(source) => Value::Dataset(Dataset {
                type_: source.type_.clone(),
                protected: None,
                statistics: source.statistics.clone(),
                budget: None,
            }),
            NodeSpec::Scalar(scalar) => Value::Scalar(scalar.clone()),
            NodeSpec::Transformed(transformed) => {
                let inputs = transformed
                    .arguments
                    .iter()
                    .map(|id| self.value(&self.node(id)?))
                    .collect::<Result<Vec<_>>>()?;
                let named = transformed
                    .named_arguments
                    .iter()
                    .map(|(name, id)| Ok((name.clone(), self.value(&self.node(id)?)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?;
                evaluate(&transformed.transform, &inputs.iter().collect::<Vec<_>>(), &named)?
            }
        };
        self.remember(node.uuid(), &value);
        Ok(value)
    }

    fn dataset(&self, node: &Node) -> Result<Dataset> {
        match self.value(node)? {
            Value::Dataset(dataset) => Ok(dataset),
            Value::Scalar(_) => Err(DataSpecError::contract(
                node.kind().as_str(),
                format!("node {} is not a dataset", node.uuid()),
            )),
        }
    }

    /// The schema facet of a dataset node.
    pub fn schema(&self, node: &Node) -> Result<Schema> {
        Ok(Schema::of(node.uuid(), &self.dataset(node)?))
    }

    /// The size facet of a dataset node.
    pub fn size(&self, node: &Node) -> Result<Size> {
        Ok(Size::of(node.uuid(), &self.dataset(node)?))
    }

    /// Encode a dataset node with its schema and size. Every required task
    /// of the node must be ready.
    pub fn export(&self, node: &Node) -> Result<Artifacts> {
        for task in required_tasks(node) {
            self.await_ready(node.uuid(), task)?;
        }
        let dataset = self.dataset(node)?;
        let artifacts = Artifacts {
            dataset: node.encode()?,
            schema: Schema::of(node.uuid(), &dataset).encode()?,
            size: Size::of(node.uuid(), &dataset).encode()?,
        };
        info!(node = %node.uuid(), "exported dataset");
        Ok(artifacts)
    }

    /// Re-derive the statuses of `node` from its parents and overwrite
    /// whatever is stored. Used when a manager restarts.
    pub fn reconcile(&self, node: &Node) -> Result<Vec<Status>> {
        self.nodes.put_node(node)?;
        match node.spec() {
            // Source readiness is owned by the external classifier.
            NodeSpec::Source(_) => {}
            NodeSpec::Scalar(_) => {
                self.set(
                    StatusUpdate::new(node.uuid(), COMPUTE_TASK, State::Ready),
                    WritePolicy::Overwrite,
                )?;
            }
            NodeSpec::Transformed(transformed) => {
                let mut settled = true;
                for id in node.parents() {
                    let parent = self.node(id)?;
                    for task in required_tasks(&parent) {
                        match self.statuses.get(id, task)? {
                            Some(status) if status.state == State::Error => {
                                self.set(
                                    StatusUpdate::new(node.uuid(), COMPUTE_TASK, State::Error)
                                        .with_property(UPSTREAM_NODE, id.as_str())
                                        .with_property(UPSTREAM_TASK, *task)
                                        .with_property(REASON, status.reason()),
                                    WritePolicy::Overwrite,
                                )?;
                                return self.statuses(node.uuid());
                            }
                            Some(status) if status.is_ready() => {}
                            _ => settled = false,
                        }
                    }
                }
                if !settled {
                    self.set(
                        StatusUpdate::new(node.uuid(), COMPUTE_TASK, State::Pending),
                        WritePolicy::Overwrite,
                    )?;
                    return self.statuses(node.uuid());
                }
                self.value(node)?;
                if node.kind().is_dataset() {
                    let input = transformed.arguments.first().ok_or_else(|| {
                        DataSpecError::contract(transformed.transform.name.clone(), "no input")
                    })?;
                    if let Some(status) = self.statuses.get(input, BIG_DATA_TASK)? {
                        self.set(
                            StatusUpdate::new(node.uuid(), BIG_DATA_TASK, status.state)
                                .with_properties(status.properties),
                            WritePolicy::Overwrite,
                        )?;
                    }
                }
                self.set(
                    StatusUpdate::new(node.uuid(), COMPUTE_TASK, State::Ready),
                    WritePolicy::Overwrite,
                )?;
            }
        }
        info!(node = %node.uuid(), "reconciled statuses");
        self.statuses(node.uuid())
    }

    /// Record the external big data classification of a dataset.
    pub fn set_big_data(&self, node: &NodeId, is_big_data: bool) -> Result<Status> {
        let flag = if is_big_data { "True" } else { "False" };
        self.ready(
            node,
            BIG_DATA_TASK,
            BTreeMap::from([(IS_BIG_DATA.to_string(), flag.to_string())]),
        )
    }

    pub fn ready(
        &self,
        node: &NodeId,
        task: &str,
        properties: BTreeMap<String, String>,
    ) -> Result<Status> {
        self.set(
            StatusUpdate::new(node, task, State::Ready).with_properties(properties),
            WritePolicy::Transition,
        )
    }

    pub fn pending(&self, node: &NodeId, task: &str) -> Result<Status> {
        self.set(
            StatusUpdate::new(node, task, State::Pending),
            WritePolicy::Transition,
        )
    }

    pub fn error(&self, node: &NodeId, task: &str, reason: &str) -> Result<Status> {
        self.set(
            StatusUpdate::new(node, task, State::Error).with_property(REASON, reason),
            WritePolicy::Transition,
        )
    }

    pub fn status(&self, node: &NodeId, task: &str) -> Result<Option<Status>> {
        self.statuses.get(node, task)
    }

    pub fn statuses(&self, node: &NodeId) -> Result<Vec<Status>> {
        self.statuses.list(node)
    }

    /// Wait for `(node, task)` with the configured timeout.
    pub fn await_ready(&self, node: &NodeId, task: &str) -> Result<Status> {
        self.statuses.await_ready(
            node,
            task,
            self.config.ready_timeout(),
            self.config.poll_interval(),
        )
    }

    fn set(&self, update: StatusUpdate, policy: WritePolicy) -> Result<Status> {
        let update = update.by(self.id.as_str());
        let (node, task, state) = (update.node.clone(), update.task.clone(), update.state);
        match self.statuses.set(update, policy) {
            Ok(status) => {
                debug!(%node, task = %task, %state, version = status.version, "status set");
                Ok(status)
            }
            Err(e) => {
                warn!(%node, task = %task, %state, error = %e, "status write rejected");
                Err(e)
            }
        }
    }

    fn cached(&self, id: &NodeId) -> Option<Value> {
        self.cache.read().ok()?.get(id).cloned()
    }

    fn remember(&self, id: &NodeId, value: &Value) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(id.clone(), value.clone());
        }
    }
}

/// Tasks that must be ready before `node` may be consumed.
fn required_tasks(node: &Node) -> &'static [&'static str] {
    if node.is_source() {
        &[BIG_DATA_TASK]
    } else if node.kind().is_dataset() {
        &[COMPUTE_TASK, BIG_DATA_TASK]
    } else {
        &[COMPUTE_TASK]
    }
}

/// The error reported for a node whose compute status is `error`.
fn failure(status: &Status) -> DataSpecError {
    DataSpecError::UpstreamFailed {
        node: status
            .property(UPSTREAM_NODE)
            .and_then(|id| id.parse().ok())
            .unwrap_or_else(|| status.node.clone()),
        task: status
            .property(UPSTREAM_TASK)
            .unwrap_or(status.task.as_str())
            .to_string(),
        reason: status.reason().to_string(),
    }
}
