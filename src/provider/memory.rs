//! In-memory implementations of the capability contracts.
//!
//! These back the unit tests and make the orchestration logic exercisable
//! without any remote control plane. Mutations are recorded so tests can
//! assert not only on outcomes but on which calls were issued.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;

use super::contracts::{FunctionOps, ObjectOps, ParameterOps, RouteOps, StackOps};
use super::types::{
    ChangeSetDescription, ChangeSetStatus, FunctionCode, FunctionDescription, FunctionSpec,
    ParameterKind, ParameterPage, ResourceChange, RouteMapping, StackDescription, StackParameter,
    StackStatus, StackTag, StackUpdate, StoredParameter, TemplateRef, VersionPage,
};

/// In-memory stack control plane.
#[derive(Debug, Default)]
pub struct InMemoryStacks {
    inner: Mutex<StackState>,
}

#[derive(Debug, Default)]
struct StackState {
    stacks: BTreeMap<String, StackDescription>,
    change_sets: BTreeMap<String, ChangeSetDescription>,
    current_template: String,
    proposed_template: String,
    proposed_changes: Vec<ResourceChange>,
    update_reports_no_changes: bool,
    create_calls: u32,
    update_calls: u32,
    delete_calls: u32,
    change_sets_created: u32,
    change_sets_deleted: u32,
}

impl InMemoryStacks {
    /// Creates an empty control plane.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an existing stack.
    pub fn insert_stack(&self, stack: StackDescription) {
        self.lock().stacks.insert(stack.name.clone(), stack);
    }

    /// Makes subsequent updates report "no changes to perform".
    pub fn report_no_changes_on_update(&self) {
        self.lock().update_reports_no_changes = true;
    }

    /// Sets the template bodies returned for the current stack and for
    /// change-set proposals.
    pub fn set_templates(&self, current: impl Into<String>, proposed: impl Into<String>) {
        let mut state = self.lock();
        state.current_template = current.into();
        state.proposed_template = proposed.into();
    }

    /// Sets the resource-level changes reported by change sets.
    pub fn set_proposed_changes(&self, changes: Vec<ResourceChange>) {
        self.lock().proposed_changes = changes;
    }

    /// Number of create calls issued.
    #[must_use]
    pub fn create_calls(&self) -> u32 {
        self.lock().create_calls
    }

    /// Number of update calls issued.
    #[must_use]
    pub fn update_calls(&self) -> u32 {
        self.lock().update_calls
    }

    /// Number of delete calls issued.
    #[must_use]
    pub fn delete_calls(&self) -> u32 {
        self.lock().delete_calls
    }

    /// Number of change sets created.
    #[must_use]
    pub fn change_sets_created(&self) -> u32 {
        self.lock().change_sets_created
    }

    /// Number of change sets deleted.
    #[must_use]
    pub fn change_sets_deleted(&self) -> u32 {
        self.lock().change_sets_deleted
    }

    /// Current status of a stack, if it exists.
    #[must_use]
    pub fn status_of(&self, stack_name: &str) -> Option<StackStatus> {
        self.lock().stacks.get(stack_name).map(|s| s.status.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StackState> {
        self.inner.lock().expect("stack state lock poisoned")
    }
}

#[async_trait]
impl StackOps for InMemoryStacks {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        Ok(self.lock().stacks.get(stack_name).cloned())
    }

    async fn create_stack(
        &self,
        stack_name: &str,
        _template: &TemplateRef,
        parameters: &[StackParameter],
        tags: &[StackTag],
    ) -> Result<String> {
        let mut state = self.lock();
        state.create_calls += 1;
        let stack_id = format!("arn:stack/{stack_name}");
        state.stacks.insert(
            stack_name.to_string(),
            StackDescription {
                stack_id: stack_id.clone(),
                name: stack_name.to_string(),
                status: StackStatus::CreateComplete,
                parameters: parameters.to_vec(),
                tags: tags.to_vec(),
                outputs: BTreeMap::new(),
            },
        );
        Ok(stack_id)
    }

    async fn update_stack(
        &self,
        stack_name: &str,
        _template: &TemplateRef,
        parameters: &[StackParameter],
    ) -> Result<StackUpdate> {
        let mut state = self.lock();
        state.update_calls += 1;
        if state.update_reports_no_changes {
            return Ok(StackUpdate::NoChanges);
        }
        if let Some(stack) = state.stacks.get_mut(stack_name) {
            stack.parameters = parameters.to_vec();
            stack.status = StackStatus::UpdateComplete;
            return Ok(StackUpdate::Updated {
                stack_id: stack.stack_id.clone(),
            });
        }
        Ok(StackUpdate::Updated {
            stack_id: format!("arn:stack/{stack_name}"),
        })
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        let mut state = self.lock();
        state.delete_calls += 1;
        state.stacks.remove(stack_name);
        Ok(())
    }

    async fn create_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        _template: &TemplateRef,
        parameters: &[StackParameter],
        tags: &[StackTag],
    ) -> Result<String> {
        let mut state = self.lock();
        state.change_sets_created += 1;
        let id = format!("arn:changeSet/{stack_name}/{change_set_name}");
        let resource_changes = state.proposed_changes.clone();
        state.change_sets.insert(
            id.clone(),
            ChangeSetDescription {
                id: id.clone(),
                name: change_set_name.to_string(),
                status: ChangeSetStatus::CreateComplete,
                status_reason: None,
                resource_changes,
                parameters: parameters.to_vec(),
                tags: tags.to_vec(),
            },
        );
        Ok(id)
    }

    async fn describe_change_set(
        &self,
        _stack_name: &str,
        change_set_id: &str,
    ) -> Result<ChangeSetDescription> {
        self.lock()
            .change_sets
            .get(change_set_id)
            .cloned()
            .ok_or_else(|| {
                crate::error::StagehandError::internal(format!(
                    "unknown change set {change_set_id}"
                ))
            })
    }

    async fn delete_change_set(&self, _stack_name: &str, change_set_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.change_sets_deleted += 1;
        state.change_sets.remove(change_set_id);
        Ok(())
    }

    async fn get_template_body(
        &self,
        _stack_name: &str,
        change_set_id: Option<&str>,
    ) -> Result<String> {
        let state = self.lock();
        Ok(if change_set_id.is_some() {
            state.proposed_template.clone()
        } else {
            state.current_template.clone()
        })
    }
}

/// In-memory compute function control plane.
#[derive(Debug, Default)]
pub struct InMemoryFunctions {
    inner: Mutex<FunctionState>,
}

#[derive(Debug, Default)]
struct FunctionState {
    exists: bool,
    spec: Option<FunctionSpec>,
    published: Vec<u32>,
    aliases: BTreeMap<String, String>,
    page_size: usize,
    forced_publish_version: Option<String>,
    code_updates: u32,
    config_updates: u32,
}

impl InMemoryFunctions {
    /// Creates a control plane with no function registered.
    #[must_use]
    pub fn new() -> Self {
        let plane = Self::default();
        plane.lock().page_size = 50;
        plane
    }

    /// Registers the function as existing with the given published versions.
    pub fn seed_versions(&self, versions: &[u32]) {
        let mut state = self.lock();
        state.exists = true;
        state.published = versions.to_vec();
    }

    /// Sets the page size used by the paginated version listing.
    pub fn set_page_size(&self, page_size: usize) {
        self.lock().page_size = page_size.max(1);
    }

    /// Forces the next publish to report this version label, simulating a
    /// concurrent competing release.
    pub fn force_publish_version(&self, version: impl Into<String>) {
        self.lock().forced_publish_version = Some(version.into());
    }

    /// Seeds an alias pointing at a version.
    pub fn insert_alias(&self, alias: impl Into<String>, version: impl Into<String>) {
        self.lock().aliases.insert(alias.into(), version.into());
    }

    /// Returns the version an alias currently points at.
    #[must_use]
    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.lock().aliases.get(alias).cloned()
    }

    /// Environment variables of the mutable head, as last configured.
    #[must_use]
    pub fn environment(&self) -> BTreeMap<String, String> {
        self.lock()
            .spec
            .as_ref()
            .map(|s| s.environment.clone())
            .unwrap_or_default()
    }

    /// Number of code update calls issued.
    #[must_use]
    pub fn code_updates(&self) -> u32 {
        self.lock().code_updates
    }

    /// Number of configuration update calls issued.
    #[must_use]
    pub fn config_updates(&self) -> u32 {
        self.lock().config_updates
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FunctionState> {
        self.inner.lock().expect("function state lock poisoned")
    }

    fn next_natural_version(state: &FunctionState) -> u32 {
        state.published.iter().max().copied().unwrap_or(0) + 1
    }
}

#[async_trait]
impl FunctionOps for InMemoryFunctions {
    async fn get_function(
        &self,
        function_name: &str,
        qualifier: Option<&str>,
    ) -> Result<Option<FunctionDescription>> {
        let state = self.lock();
        if !state.exists {
            return Ok(None);
        }
        let version = qualifier
            .and_then(|q| state.aliases.get(q).cloned())
            .or_else(|| qualifier.map(String::from));
        let spec = state.spec.clone();
        Ok(Some(FunctionDescription {
            name: function_name.to_string(),
            version,
            runtime: spec.as_ref().map(|s| s.runtime.clone()),
            memory_mb: spec.as_ref().and_then(|s| s.memory_mb),
            timeout_secs: spec.as_ref().and_then(|s| s.timeout_secs),
            description: spec.as_ref().and_then(|s| s.description.clone()),
            environment: spec.map(|s| s.environment).unwrap_or_default(),
        }))
    }

    async fn list_versions(
        &self,
        _function_name: &str,
        marker: Option<&str>,
    ) -> Result<VersionPage> {
        let state = self.lock();
        if !state.exists {
            return Ok(VersionPage::default());
        }

        // The mutable head label always leads the listing, like the real
        // control plane does.
        let mut labels = vec![super::types::UNPUBLISHED_VERSION_LABEL.to_string()];
        labels.extend(state.published.iter().map(ToString::to_string));

        let start: usize = marker.and_then(|m| m.parse().ok()).unwrap_or(0);
        let end = (start + state.page_size).min(labels.len());
        let next_marker = (end < labels.len()).then(|| end.to_string());

        Ok(VersionPage {
            versions: labels[start..end].to_vec(),
            next_marker,
        })
    }

    async fn create_function(&self, spec: &FunctionSpec, _code: &FunctionCode) -> Result<String> {
        let mut state = self.lock();
        state.exists = true;
        state.spec = Some(spec.clone());
        let version = state
            .forced_publish_version
            .take()
            .unwrap_or_else(|| Self::next_natural_version(&state).to_string());
        if let Ok(n) = version.parse() {
            state.published.push(n);
        }
        Ok(version)
    }

    async fn update_function_code(
        &self,
        _function_name: &str,
        _code: &FunctionCode,
    ) -> Result<()> {
        self.lock().code_updates += 1;
        Ok(())
    }

    async fn update_function_configuration(&self, spec: &FunctionSpec) -> Result<()> {
        let mut state = self.lock();
        state.config_updates += 1;
        state.spec = Some(spec.clone());
        Ok(())
    }

    async fn publish_version(&self, _function_name: &str) -> Result<String> {
        let mut state = self.lock();
        let version = state
            .forced_publish_version
            .take()
            .unwrap_or_else(|| Self::next_natural_version(&state).to_string());
        if let Ok(n) = version.parse() {
            state.published.push(n);
        }
        Ok(version)
    }

    async fn get_alias(&self, _function_name: &str, alias: &str) -> Result<Option<String>> {
        Ok(self.lock().aliases.get(alias).cloned())
    }

    async fn create_alias(&self, _function_name: &str, alias: &str, version: &str) -> Result<()> {
        self.lock()
            .aliases
            .insert(alias.to_string(), version.to_string());
        Ok(())
    }

    async fn update_alias(&self, _function_name: &str, alias: &str, version: &str) -> Result<()> {
        self.lock()
            .aliases
            .insert(alias.to_string(), version.to_string());
        Ok(())
    }
}

/// In-memory hierarchical parameter store.
#[derive(Debug, Default)]
pub struct InMemoryParameters {
    inner: Mutex<ParameterState>,
}

#[derive(Debug, Default)]
struct ParameterState {
    parameters: BTreeMap<String, StoredParameter>,
    page_size: usize,
    put_calls: u32,
}

impl InMemoryParameters {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let store = Self::default();
        store.lock().page_size = 10;
        store
    }

    /// Seeds a parameter.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>, kind: ParameterKind) {
        let name = name.into();
        self.lock().parameters.insert(
            name.clone(),
            StoredParameter {
                name,
                value: value.into(),
                kind,
            },
        );
    }

    /// Sets the page size used by the paginated listing.
    pub fn set_page_size(&self, page_size: usize) {
        self.lock().page_size = page_size.max(1);
    }

    /// Number of put calls issued.
    #[must_use]
    pub fn put_calls(&self) -> u32 {
        self.lock().put_calls
    }

    /// Returns a stored parameter by full path.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<StoredParameter> {
        self.lock().parameters.get(name).cloned()
    }

    /// All parameters stored directly under a path.
    #[must_use]
    pub fn under(&self, path: &str) -> Vec<StoredParameter> {
        ParameterState::direct_children(&self.lock(), path)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ParameterState> {
        self.inner.lock().expect("parameter state lock poisoned")
    }
}

impl ParameterState {
    fn direct_children(&self, path: &str) -> Vec<StoredParameter> {
        self.parameters
            .values()
            .filter(|p| {
                p.name
                    .strip_prefix(path)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ParameterOps for InMemoryParameters {
    async fn list_parameters(
        &self,
        path: &str,
        next_token: Option<&str>,
    ) -> Result<ParameterPage> {
        let state = self.lock();
        let matching = state.direct_children(path);

        let start: usize = next_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + state.page_size).min(matching.len());
        let next = (end < matching.len()).then(|| end.to_string());

        Ok(ParameterPage {
            parameters: matching[start..end].to_vec(),
            next_token: next,
        })
    }

    async fn put_parameter(
        &self,
        name: &str,
        value: &str,
        kind: ParameterKind,
        overwrite: bool,
    ) -> Result<()> {
        let mut state = self.lock();
        state.put_calls += 1;
        if !overwrite && state.parameters.contains_key(name) {
            return Err(crate::error::StagehandError::internal(format!(
                "parameter {name} already exists"
            )));
        }
        state.parameters.insert(
            name.to_string(),
            StoredParameter {
                name: name.to_string(),
                value: value.to_string(),
                kind,
            },
        );
        Ok(())
    }
}

/// In-memory API routing control plane.
#[derive(Debug, Default)]
pub struct InMemoryRoutes {
    inner: Mutex<RouteState>,
}

#[derive(Debug, Default)]
struct RouteState {
    mappings: BTreeMap<String, Vec<RouteMapping>>,
    create_calls: u32,
}

impl InMemoryRoutes {
    /// Creates an empty control plane.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an existing mapping under a domain.
    pub fn insert_mapping(&self, domain: impl Into<String>, mapping: RouteMapping) {
        self.lock()
            .mappings
            .entry(domain.into())
            .or_default()
            .push(mapping);
    }

    /// Number of create calls issued.
    #[must_use]
    pub fn create_calls(&self) -> u32 {
        self.lock().create_calls
    }

    /// All mappings stored under a domain.
    #[must_use]
    pub fn mappings(&self, domain: &str) -> Vec<RouteMapping> {
        self.lock().mappings.get(domain).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RouteState> {
        self.inner.lock().expect("route state lock poisoned")
    }
}

#[async_trait]
impl RouteOps for InMemoryRoutes {
    async fn list_mappings(&self, domain: &str) -> Result<Vec<RouteMapping>> {
        Ok(self.mappings(domain))
    }

    async fn create_mapping(&self, domain: &str, mapping: &RouteMapping) -> Result<()> {
        let mut state = self.lock();
        state.create_calls += 1;
        state
            .mappings
            .entry(domain.to_string())
            .or_default()
            .push(mapping.clone());
        Ok(())
    }
}

/// In-memory object store.
#[derive(Debug, Default)]
pub struct InMemoryObjects {
    inner: Mutex<ObjectState>,
}

#[derive(Debug, Default)]
struct ObjectState {
    objects: BTreeMap<(String, String), Vec<u8>>,
    buckets: Vec<String>,
}

impl InMemoryObjects {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stored object.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ObjectState> {
        self.inner.lock().expect("object state lock poisoned")
    }
}

#[async_trait]
impl ObjectOps for InMemoryObjects {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.object(bucket, key).ok_or_else(|| {
            crate::error::StagehandError::internal(format!("no such object {bucket}/{key}"))
        })
    }

    async fn ensure_bucket(&self, bucket: &str, _region: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.buckets.iter().any(|b| b == bucket) {
            state.buckets.push(bucket.to_string());
        }
        Ok(())
    }
}
