//! Resource collection
//!
//! `ResourceCollector::get_resources` walks every discovered group/version,
//! lists the allow-listed kinds for each requested namespace and keeps the
//! objects their inclusion rule accepts. Objects are deduplicated by uid
//! across the whole call, so a kind served under two group/versions is only
//! collected once.
//!
//! Namespaces of one kind are evaluated concurrently. Cluster-scoped kinds are
//! listed once and the namespace-dependent rule is then applied per requested
//! namespace. The first error aborts the call and discards everything
//! collected so far.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, TryStreamExt};
use kube::Client;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::CollectorConfig;
use crate::discovery::{DiscoveryProvider, KindDescriptor, KubeDiscovery};
use crate::error::CollectError;
use crate::lister::{KubeLister, ObjectLister};
use crate::object::ResourceObject;
use crate::ownership::OwnershipOracle;
use crate::peek::{KubePeek, TypedPeek};
use crate::rules::{BindingCache, RuleContext, RuleTable, Verdict};
use crate::selector::LabelSelector;
use crate::PERSISTENT_VOLUME;

/// Collects migratable objects from a cluster
///
/// Holds only its collaborators; no object state survives between calls.
pub struct ResourceCollector {
    discovery: Arc<dyn DiscoveryProvider>,
    lister: Arc<dyn ObjectLister>,
    peek: Arc<dyn TypedPeek>,
    ownership: Arc<dyn OwnershipOracle>,
    rules: RuleTable,
    config: CollectorConfig,
}

/// Objects accepted so far and the uids already taken
#[derive(Default)]
struct Accumulator {
    seen: HashSet<String>,
    objects: Vec<ResourceObject>,
}

/// State of one `get_resources` call
struct CollectionRun<'a> {
    namespaces: &'a [String],
    selector: &'a LabelSelector,
    bindings: BindingCache,
    state: Mutex<Accumulator>,
}

impl<'a> CollectionRun<'a> {
    fn new(namespaces: &'a [String], selector: &'a LabelSelector) -> Self {
        Self {
            namespaces,
            selector,
            bindings: BindingCache::default(),
            state: Mutex::new(Accumulator::default()),
        }
    }

    fn is_seen(&self, uid: &str) -> bool {
        self.state.lock().seen.contains(uid)
    }

    /// Record `object` unless its uid is already taken; returns whether it was added
    fn accept(&self, object: &ResourceObject) -> bool {
        let mut state = self.state.lock();
        if !state.seen.insert(object.uid().to_string()) {
            return false;
        }
        state.objects.push(object.clone());
        true
    }

    fn into_objects(self) -> Vec<ResourceObject> {
        self.state.into_inner().objects
    }
}

impl ResourceCollector {
    /// Create a collector from its collaborators
    pub fn new(
        discovery: Arc<dyn DiscoveryProvider>,
        lister: Arc<dyn ObjectLister>,
        peek: Arc<dyn TypedPeek>,
        ownership: Arc<dyn OwnershipOracle>,
        config: CollectorConfig,
    ) -> Self {
        let rules = RuleTable::standard(&config);
        Self {
            discovery,
            lister,
            peek,
            ownership,
            rules,
            config,
        }
    }

    /// Create a collector talking to the cluster behind `client`
    ///
    /// Runs discovery once so an unreachable API server is reported here as
    /// a configuration error rather than on the first collection.
    pub async fn from_client(
        client: Client,
        ownership: Arc<dyn OwnershipOracle>,
        config: CollectorConfig,
    ) -> Result<Self, CollectError> {
        let discovery = KubeDiscovery::new(client.clone());
        discovery.refresh().await.map_err(|e| {
            CollectError::Configuration(format!("cluster discovery unavailable: {}", e))
        })?;

        Ok(Self::new(
            Arc::new(discovery),
            Arc::new(KubeLister::new(client.clone())),
            Arc::new(KubePeek::new(client)),
            ownership,
            config,
        ))
    }

    /// Replace the inclusion rules
    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    /// The collector's configuration
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collect every eligible object in `namespaces` matching `selector`
    ///
    /// Duplicate namespaces are ignored. The returned objects are unique by
    /// uid and in no particular order.
    pub async fn get_resources(
        &self,
        namespaces: &[String],
        selector: &LabelSelector,
    ) -> Result<Vec<ResourceObject>, CollectError> {
        let namespaces = distinct(namespaces);
        if namespaces.is_empty() {
            return Err(CollectError::Configuration(
                "at least one namespace is required".to_string(),
            ));
        }

        self.discovery.refresh().await?;

        info!(
            namespaces = ?namespaces,
            selector = %selector,
            "Collecting resources"
        );

        let run = CollectionRun::new(&namespaces, selector);
        for group in self.discovery.groups() {
            if self.config.excludes_group(&group.group) {
                debug!(
                    group = %group.group,
                    version = %group.version,
                    "Skipping excluded API group"
                );
                continue;
            }
            for kind in &group.kinds {
                if !self.config.collects(&kind.kind) {
                    continue;
                }
                self.collect_kind(kind, &run).await?;
            }
        }

        let objects = run.into_objects();
        info!(
            namespaces = ?namespaces,
            collected = objects.len(),
            "Collected resources"
        );
        Ok(objects)
    }

    async fn collect_kind(
        &self,
        kind: &KindDescriptor,
        run: &CollectionRun<'_>,
    ) -> Result<(), CollectError> {
        // Volumes do not carry their claim's labels; the volume rule checks the claim.
        let everything = LabelSelector::everything();
        let list_selector = if kind.kind == PERSISTENT_VOLUME {
            &everything
        } else {
            run.selector
        };
        let concurrency = self.config.namespace_concurrency.max(1);

        debug!(
            kind = %kind.kind,
            api_version = %kind.api_version(),
            namespaced = kind.namespaced,
            "Collecting kind"
        );

        if kind.namespaced {
            stream::iter(run.namespaces.iter().map(Ok::<_, CollectError>))
                .try_for_each_concurrent(concurrency, |namespace| async move {
                    let objects = self
                        .lister
                        .list(kind, Some(namespace.as_str()), list_selector)
                        .await?;
                    self.admit(&objects, namespace, run).await
                })
                .await
        } else {
            let objects = self.lister.list(kind, None, list_selector).await?;
            let objects = objects.as_slice();
            stream::iter(run.namespaces.iter().map(Ok::<_, CollectError>))
                .try_for_each_concurrent(concurrency, |namespace| async move {
                    self.admit(objects, namespace, run).await
                })
                .await
        }
    }

    /// Apply the inclusion rules to `objects` for `namespace`
    async fn admit(
        &self,
        objects: &[ResourceObject],
        namespace: &str,
        run: &CollectionRun<'_>,
    ) -> Result<(), CollectError> {
        let ctx = RuleContext {
            namespace,
            selector: run.selector,
            peek: self.peek.as_ref(),
            ownership: self.ownership.as_ref(),
            bindings: &run.bindings,
        };

        for object in objects {
            if run.is_seen(object.uid()) {
                continue;
            }
            match self.rules.evaluate(object, &ctx).await? {
                Verdict::Include => {
                    if run.accept(object) {
                        debug!(
                            object = %object.display(),
                            namespace = %namespace,
                            "Collected object"
                        );
                    }
                }
                Verdict::Exclude(reason) => {
                    debug!(
                        object = %object.display(),
                        namespace = %namespace,
                        reason,
                        "Excluded object"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Drop repeated namespaces, keeping first occurrences in order
fn distinct(namespaces: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    namespaces
        .iter()
        .filter(|ns| seen.insert(ns.as_str()))
        .cloned()
        .collect()
}
