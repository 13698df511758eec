/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # In-Memory Store
//!
//! An in-process [`ResourceStore`] reproducing the parts of API server behaviour
//! the controller depends on:
//!
//! - every write bumps a store-wide `resourceVersion`; a replace carrying a
//!   different version is rejected with [`StoreError::Conflict`]
//! - creating a name that already exists is a conflict
//! - namespaced objects can only be created in an existing, non-terminating namespace
//! - deleting a namespace is asynchronous (see [`TerminationBehaviour`]) and
//!   cascades to everything inside it once it completes
//!
//! It also records every call and can be told to fail a given operation, which
//! is how the orchestrator tests observe ordering and abort behaviour.

use super::{parse_label_selector, ResourceStore, StoreError, StoreResult};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, NamespaceStatus, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How a deleted namespace behaves on subsequent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationBehaviour {
    /// Gone on the first read after the delete.
    Immediate,
    /// Reported with phase `Terminating` for this many reads, then gone.
    TerminatingFor(u32),
    /// Reported as `Terminating` forever.
    Stuck,
    /// Never completes and never reports a phase.
    Silent,
}

impl Default for TerminationBehaviour {
    fn default() -> Self {
        Self::TerminatingFor(1)
    }
}

struct NamespaceEntry {
    object: Namespace,
    /// Reads served since the delete was requested, `None` while live.
    terminating_reads: Option<u32>,
}

type Key = (String, String);

#[derive(Default)]
struct State {
    version: u64,
    namespaces: BTreeMap<String, NamespaceEntry>,
    deployments: BTreeMap<Key, Deployment>,
    services: BTreeMap<Key, Service>,
    ingresses: BTreeMap<Key, Ingress>,
    pods: BTreeMap<Key, Pod>,
    logs: HashMap<Key, String>,
    calls: Vec<String>,
    failures: HashMap<String, StoreError>,
    /// Failures for a single call, keyed by operation and 1-based call number.
    single_failures: HashMap<(String, usize), StoreError>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn record(&mut self, operation: &str, target: &str) -> StoreResult<()> {
        self.calls.push(format!("{}:{}", operation, target));
        let prefix = format!("{}:", operation);
        let nth = self
            .calls
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count();
        if let Some(err) = self.single_failures.remove(&(operation.to_string(), nth)) {
            return Err(err);
        }
        match self.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn require_live_namespace(&self, namespace: &str) -> StoreResult<()> {
        match self.namespaces.get(namespace) {
            None => Err(StoreError::not_found("Namespace", namespace)),
            Some(entry) if entry.terminating_reads.is_some() => Err(StoreError::Api(format!(
                "namespace {} is being terminated",
                namespace
            ))),
            Some(_) => Ok(()),
        }
    }

    fn purge(&mut self, namespace: &str) {
        self.namespaces.remove(namespace);
        self.deployments.retain(|(ns, _), _| ns != namespace);
        self.services.retain(|(ns, _), _| ns != namespace);
        self.ingresses.retain(|(ns, _), _| ns != namespace);
        self.pods.retain(|(ns, _), _| ns != namespace);
        self.logs.retain(|(ns, _), _| ns != namespace);
    }
}

fn name_of(meta: &ObjectMeta) -> StoreResult<String> {
    meta.name
        .clone()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| StoreError::Api("metadata.name is required".to_string()))
}

fn with_phase(mut namespace: Namespace, phase: Option<&str>) -> Namespace {
    namespace.status = phase.map(|phase| NamespaceStatus {
        phase: Some(phase.to_string()),
        ..NamespaceStatus::default()
    });
    namespace
}

fn labels_match(meta: &ObjectMeta, selector: &str) -> bool {
    parse_label_selector(selector).into_iter().all(|(key, value)| {
        meta.labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .is_some_and(|actual| actual == value)
    })
}

/// Creates a namespaced object, assigning namespace and resource version.
fn create_in<T: Clone>(
    state: &mut State,
    select: fn(&mut State) -> &mut BTreeMap<Key, T>,
    meta: fn(&mut T) -> &mut ObjectMeta,
    kind: &'static str,
    namespace: &str,
    object: &T,
) -> StoreResult<T> {
    state.require_live_namespace(namespace)?;
    let mut object = object.clone();
    let name = name_of(meta(&mut object))?;
    let key = (namespace.to_string(), name.clone());
    if select(state).contains_key(&key) {
        return Err(StoreError::Conflict(format!(
            "{} {} already exists",
            kind, name
        )));
    }
    let version = state.next_version();
    let metadata = meta(&mut object);
    metadata.namespace = Some(namespace.to_string());
    metadata.resource_version = Some(version);
    select(state).insert(key, object.clone());
    Ok(object)
}

fn list_in<T: Clone>(map: &BTreeMap<Key, T>, namespace: &str) -> Vec<T> {
    map.iter()
        .filter(|((ns, _), _)| ns == namespace)
        .map(|(_, object)| object.clone())
        .collect()
}

/// In-process store used by the test suites.
pub struct MemoryStore {
    state: Mutex<State>,
    termination: TerminationBehaviour,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_termination(TerminationBehaviour::default())
    }

    pub fn with_termination(termination: TerminationBehaviour) -> Self {
        Self {
            state: Mutex::new(State::default()),
            termination,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent call of `operation` (e.g. `"create_service"`) fail.
    pub fn fail_on(&self, operation: &str, error: StoreError) {
        self.lock().failures.insert(operation.to_string(), error);
    }

    /// Makes only the `nth` call (counting from 1) of `operation` fail.
    pub fn fail_call(&self, operation: &str, nth: usize, error: StoreError) {
        self.lock()
            .single_failures
            .insert((operation.to_string(), nth), error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.single_failures.clear();
    }

    /// Every call so far, as `operation:target`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls made to `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        let prefix = format!("{}:", operation);
        self.lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }

    /// Operation names in call order, without targets.
    pub fn operations(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .map(|call| call.split(':').next().unwrap_or_default().to_string())
            .collect()
    }

    /// Inserts a namespace directly, bypassing call recording and failures.
    pub fn insert_namespace(&self, namespace: Namespace) {
        let mut state = self.lock();
        let mut namespace = namespace;
        let Some(name) = namespace.metadata.name.clone() else {
            return;
        };
        namespace.metadata.resource_version = Some(state.next_version());
        state.namespaces.insert(
            name,
            NamespaceEntry {
                object: with_phase(namespace, Some("Active")),
                terminating_reads: None,
            },
        );
    }

    /// Inserts an ingress directly, creating no namespace.
    pub fn insert_ingress(&self, namespace: &str, mut ingress: Ingress) {
        let mut state = self.lock();
        let name = ingress.metadata.name.clone().unwrap_or_default();
        ingress.metadata.namespace = Some(namespace.to_string());
        ingress.metadata.resource_version = Some(state.next_version());
        state
            .ingresses
            .insert((namespace.to_string(), name), ingress);
    }

    pub fn insert_pod(&self, namespace: &str, mut pod: Pod) {
        let mut state = self.lock();
        let name = pod.metadata.name.clone().unwrap_or_default();
        pod.metadata.namespace = Some(namespace.to_string());
        pod.metadata.resource_version = Some(state.next_version());
        state.pods.insert((namespace.to_string(), name), pod);
    }

    pub fn set_logs(&self, namespace: &str, pod: &str, logs: &str) {
        self.lock()
            .logs
            .insert((namespace.to_string(), pod.to_string()), logs.to_string());
    }

    /// Overwrites a stored deployment's resource version, simulating a write by
    /// another client.
    pub fn touch_deployment(&self, namespace: &str, name: &str) {
        let mut state = self.lock();
        let version = state.next_version();
        if let Some(deployment) = state
            .deployments
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            deployment.metadata.resource_version = Some(version);
        }
    }

    /// Stored deployment, read without recording a call.
    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.lock()
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Stored namespace, read without advancing termination.
    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.lock()
            .namespaces
            .get(name)
            .map(|entry| entry.object.clone())
    }

    pub fn namespace_count(&self) -> usize {
        self.lock().namespaces.len()
    }

    pub fn object_counts(&self) -> (usize, usize, usize, usize) {
        let state = self.lock();
        (
            state.namespaces.len(),
            state.deployments.len(),
            state.services.len(),
            state.ingresses.len(),
        )
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.lock().record("ping", "")
    }

    async fn create_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace> {
        let mut state = self.lock();
        let name = name_of(&namespace.metadata)?;
        state.record("create_namespace", &name)?;
        if state.namespaces.contains_key(&name) {
            return Err(StoreError::Conflict(format!(
                "Namespace {} already exists",
                name
            )));
        }
        let mut object = namespace.clone();
        object.metadata.resource_version = Some(state.next_version());
        let object = with_phase(object, Some("Active"));
        state.namespaces.insert(
            name,
            NamespaceEntry {
                object: object.clone(),
                terminating_reads: None,
            },
        );
        Ok(object)
    }

    async fn get_namespace(&self, name: &str) -> StoreResult<Namespace> {
        let mut state = self.lock();
        state.record("get_namespace", name)?;
        let termination = self.termination;

        let Some(entry) = state.namespaces.get_mut(name) else {
            return Err(StoreError::not_found("Namespace", name));
        };
        let Some(reads) = entry.terminating_reads else {
            return Ok(entry.object.clone());
        };

        let finished = match termination {
            TerminationBehaviour::Immediate => true,
            TerminationBehaviour::TerminatingFor(limit) => reads >= limit,
            TerminationBehaviour::Stuck | TerminationBehaviour::Silent => false,
        };
        if finished {
            state.purge(name);
            return Err(StoreError::not_found("Namespace", name));
        }

        entry.terminating_reads = Some(reads + 1);
        let phase = match termination {
            TerminationBehaviour::Silent => None,
            _ => Some("Terminating"),
        };
        Ok(with_phase(entry.object.clone(), phase))
    }

    async fn list_namespaces(&self, label_selector: &str) -> StoreResult<Vec<Namespace>> {
        let mut state = self.lock();
        state.record("list_namespaces", label_selector)?;
        Ok(state
            .namespaces
            .values()
            .filter(|entry| labels_match(&entry.object.metadata, label_selector))
            .map(|entry| match entry.terminating_reads {
                Some(_) if self.termination != TerminationBehaviour::Silent => {
                    with_phase(entry.object.clone(), Some("Terminating"))
                }
                _ => entry.object.clone(),
            })
            .collect())
    }

    async fn replace_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace> {
        let mut state = self.lock();
        let name = name_of(&namespace.metadata)?;
        state.record("replace_namespace", &name)?;
        let current = state
            .namespaces
            .get(&name)
            .map(|entry| entry.object.metadata.resource_version.clone())
            .ok_or_else(|| StoreError::not_found("Namespace", name.as_str()))?;
        if namespace.metadata.resource_version.is_some()
            && namespace.metadata.resource_version != current
        {
            return Err(StoreError::Conflict(format!(
                "Namespace {} has been modified",
                name
            )));
        }

        let mut object = namespace.clone();
        object.metadata.resource_version = Some(state.next_version());
        if let Some(entry) = state.namespaces.get_mut(&name) {
            object.status = entry.object.status.clone();
            entry.object = object.clone();
        }
        Ok(object)
    }

    async fn delete_namespace(&self, name: &str) -> StoreResult<()> {
        let mut state = self.lock();
        state.record("delete_namespace", name)?;
        match state.namespaces.get_mut(name) {
            None => Err(StoreError::not_found("Namespace", name)),
            Some(entry) => {
                entry.terminating_reads.get_or_insert(0);
                Ok(())
            }
        }
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> StoreResult<Deployment> {
        let mut state = self.lock();
        state.record("create_deployment", namespace)?;
        create_in(
            &mut state,
            |s| &mut s.deployments,
            |d| &mut d.metadata,
            "Deployment",
            namespace,
            deployment,
        )
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> StoreResult<Deployment> {
        let mut state = self.lock();
        state.record("get_deployment", name)?;
        state
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("Deployment", name))
    }

    async fn list_deployments(&self, namespace: &str) -> StoreResult<Vec<Deployment>> {
        let mut state = self.lock();
        state.record("list_deployments", namespace)?;
        Ok(list_in(&state.deployments, namespace))
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> StoreResult<Deployment> {
        let mut state = self.lock();
        let name = name_of(&deployment.metadata)?;
        state.record("replace_deployment", &name)?;
        let key = (namespace.to_string(), name.clone());
        let current = state
            .deployments
            .get(&key)
            .map(|stored| stored.metadata.resource_version.clone())
            .ok_or_else(|| StoreError::not_found("Deployment", name.as_str()))?;
        if deployment.metadata.resource_version.is_some()
            && deployment.metadata.resource_version != current
        {
            return Err(StoreError::Conflict(format!(
                "Deployment {} has been modified",
                name
            )));
        }

        let mut object = deployment.clone();
        object.metadata.namespace = Some(namespace.to_string());
        object.metadata.resource_version = Some(state.next_version());
        state.deployments.insert(key, object.clone());
        Ok(object)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> StoreResult<Service> {
        let mut state = self.lock();
        state.record("create_service", namespace)?;
        create_in(
            &mut state,
            |s| &mut s.services,
            |s| &mut s.metadata,
            "Service",
            namespace,
            service,
        )
    }

    async fn list_services(&self, namespace: &str) -> StoreResult<Vec<Service>> {
        let mut state = self.lock();
        state.record("list_services", namespace)?;
        Ok(list_in(&state.services, namespace))
    }

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> StoreResult<Ingress> {
        let mut state = self.lock();
        state.record("create_ingress", namespace)?;
        create_in(
            &mut state,
            |s| &mut s.ingresses,
            |i| &mut i.metadata,
            "Ingress",
            namespace,
            ingress,
        )
    }

    async fn list_ingresses(&self, namespace: &str) -> StoreResult<Vec<Ingress>> {
        let mut state = self.lock();
        state.record("list_ingresses", namespace)?;
        Ok(list_in(&state.ingresses, namespace))
    }

    async fn list_all_ingresses(&self) -> StoreResult<Vec<Ingress>> {
        let mut state = self.lock();
        state.record("list_all_ingresses", "*")?;
        Ok(state.ingresses.values().cloned().collect())
    }

    async fn list_pods(&self, namespace: &str) -> StoreResult<Vec<Pod>> {
        let mut state = self.lock();
        state.record("list_pods", namespace)?;
        Ok(list_in(&state.pods, namespace))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> StoreResult<Pod> {
        let mut state = self.lock();
        state.record("get_pod", name)?;
        state
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("Pod", name))
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        _container: Option<&str>,
    ) -> StoreResult<String> {
        let mut state = self.lock();
        state.record("pod_logs", name)?;
        let key = (namespace.to_string(), name.to_string());
        if !state.pods.contains_key(&key) {
            return Err(StoreError::not_found("Pod", name));
        }
        Ok(state.logs.get(&key).cloned().unwrap_or_default())
    }
}
