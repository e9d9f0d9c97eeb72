use crate::driver::{BuildDriver, BuildError, MultiStats, Stats};
use crate::engine::{instantiate, BuildEngine};
use crate::plugin::PluginRegistry;
use crate::CoreError;
use forgepack_schema::{NormalizedConfig, WatchOptions};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

/// Completion callback shared between concurrently watching engines.
pub type SharedCallback<T> = Rc<RefCell<dyn FnMut(Result<T, CoreError>)>>;

/// Directed edges from each engine to the siblings it depends on, by name.
///
/// Validated on construction: every edge names exactly one sibling, no engine
/// depends on itself, and the edges form no cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    names: Vec<Option<String>>,
    dependencies: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn build(configs: &[NormalizedConfig]) -> Result<Self, CoreError> {
        let graph = Self {
            names: configs.iter().map(|c| c.name.clone()).collect(),
            dependencies: configs.iter().map(|c| c.dependencies.clone()).collect(),
        };

        for (i, deps) in graph.dependencies.iter().enumerate() {
            for dep in deps {
                if graph.names[i].as_deref() == Some(dep.as_str()) {
                    return Err(CoreError::SelfDependency(dep.clone()));
                }
                match graph.names.iter().filter(|n| n.as_deref() == Some(dep.as_str())).count() {
                    0 => {
                        return Err(CoreError::UnknownDependency {
                            from: graph.label(i),
                            name: dep.clone(),
                        })
                    }
                    1 => {}
                    _ => return Err(CoreError::DuplicateName(dep.clone())),
                }
            }
        }

        let order = graph.build_order();
        if order.len() < graph.len() {
            let stuck: Vec<String> = (0..graph.len())
                .filter(|i| !order.contains(i))
                .map(|i| graph.label(i))
                .collect();
            return Err(CoreError::DependencyCycle(stuck.join(", ")));
        }
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn label(&self, index: usize) -> String {
        self.names[index]
            .clone()
            .unwrap_or_else(|| format!("configuration[{index}]"))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.as_deref() == Some(name))
    }

    /// Declared dependency names of the engine at `index`.
    pub fn dependencies_of(&self, index: usize) -> &[String] {
        self.dependencies.get(index).map_or(&[], Vec::as_slice)
    }

    /// Resolved edges as `(dependent, dependency)` index pairs.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (i, deps) in self.dependencies.iter().enumerate() {
            for dep in deps {
                if let Some(j) = self.index_of(dep) {
                    edges.push((i, j));
                }
            }
        }
        edges
    }

    /// Topological order, dependencies first. Among engines that are ready at
    /// the same time, input order wins. Engines caught in a cycle are left out.
    pub fn build_order(&self) -> Vec<usize> {
        let n = self.len();
        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while let Some(next) = (0..n).find(|&i| {
            !placed[i]
                && self
                    .dependencies_of(i)
                    .iter()
                    .filter_map(|d| self.index_of(d))
                    .all(|j| placed[j])
        }) {
            placed[next] = true;
            order.push(next);
        }
        order
    }
}

/// Sibling engines built from one multi-configuration input.
#[derive(Debug)]
pub struct MultiEngine {
    engines: Vec<BuildEngine>,
    graph: DependencyGraph,
}

/// Build one engine per configuration, in input order, after validating the
/// dependency graph. Nothing is instantiated if the graph is invalid.
pub fn instantiate_many(
    configs: Vec<NormalizedConfig>,
    driver: Rc<dyn BuildDriver>,
    registry: &PluginRegistry,
) -> Result<MultiEngine, CoreError> {
    let graph = DependencyGraph::build(&configs)?;
    let engines = configs
        .into_iter()
        .map(|config| instantiate(config, Rc::clone(&driver), registry))
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        engines = engines.len(),
        edges = graph.edges().len(),
        "multi engine ready"
    );
    Ok(MultiEngine { engines, graph })
}

impl MultiEngine {
    pub fn engines(&self) -> &[BuildEngine] {
        &self.engines
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn get(&self, name: &str) -> Option<&BuildEngine> {
        self.graph.index_of(name).map(|i| &self.engines[i])
    }

    /// Build every engine once, dependencies first. Stops at the first failure.
    pub async fn run(&self) -> Result<MultiStats, CoreError> {
        let mut slots: Vec<Option<Stats>> = vec![None; self.engines.len()];
        for index in self.graph.build_order() {
            slots[index] = Some(self.engines[index].run().await?);
        }
        Ok(MultiStats {
            children: slots.into_iter().flatten().collect(),
        })
    }

    /// Close every engine, even after a failure. Reports the first close error.
    pub async fn close(&self) -> Result<(), CoreError> {
        let mut first = None;
        for engine in &self.engines {
            if let Err(e) = engine.close().await {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Watch all engines concurrently on the current `LocalSet`. The callback
    /// receives aggregate stats once every engine has completed a cycle, then
    /// again on each later cycle, and receives every cycle error.
    pub async fn watch(
        self: Rc<Self>,
        options: &[WatchOptions],
        on_cycle: SharedCallback<MultiStats>,
    ) -> Result<(), CoreError> {
        let latest: Rc<RefCell<Vec<Option<Stats>>>> =
            Rc::new(RefCell::new(vec![None; self.engines.len()]));

        let mut handles = Vec::with_capacity(self.engines.len());
        for index in 0..self.engines.len() {
            let multi = Rc::clone(&self);
            let opts = options.get(index).cloned().unwrap_or_default();
            let latest = Rc::clone(&latest);
            let on_cycle = Rc::clone(&on_cycle);
            handles.push(tokio::task::spawn_local(async move {
                multi.engines[index]
                    .watch(&opts, &mut |cycle| {
                        let report = match cycle {
                            Ok(stats) => {
                                let mut slots = latest.borrow_mut();
                                slots[index] = Some(stats);
                                slots.iter().all(Option::is_some).then(|| {
                                    Ok(MultiStats {
                                        children: slots.iter().flatten().cloned().collect(),
                                    })
                                })
                            }
                            Err(e) => Some(Err(e)),
                        };
                        if let Some(report) = report {
                            (&mut *on_cycle.borrow_mut())(report);
                        }
                    })
                    .await
            }));
        }

        let mut first = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first.get_or_insert(e);
                }
                Err(join) => {
                    first.get_or_insert(CoreError::Build(BuildError::new(format!(
                        "watch task failed: {join}"
                    ))));
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;

    fn config(name: Option<&str>, deps: &[&str]) -> NormalizedConfig {
        let mut c = NormalizedConfig::new("/app");
        c.name = name.map(str::to_owned);
        c.dependencies = deps.iter().map(|d| (*d).to_owned()).collect();
        c
    }

    #[test]
    fn edges_match_declared_dependencies() {
        let graph = DependencyGraph::build(&[
            config(Some("vendor"), &[]),
            config(Some("client"), &["vendor"]),
            config(Some("server"), &["client", "vendor"]),
        ])
        .unwrap();
        assert_eq!(graph.edges(), vec![(1, 0), (2, 1), (2, 0)]);
        assert_eq!(graph.dependencies_of(2), &["client", "vendor"]);
    }

    #[test]
    fn build_order_is_topological_and_stable() {
        let graph = DependencyGraph::build(&[
            config(Some("server"), &["client"]),
            config(Some("docs"), &[]),
            config(Some("client"), &[]),
        ])
        .unwrap();
        assert_eq!(graph.build_order(), vec![1, 2, 0]);
    }

    #[test]
    fn self_dependency_is_rejected() {
        let err = DependencyGraph::build(&[config(Some("a"), &["a"])]).unwrap_err();
        assert!(matches!(err, CoreError::SelfDependency(n) if n == "a"));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = DependencyGraph::build(&[config(None, &["ghost"])]).unwrap_err();
        match err {
            CoreError::UnknownDependency { from, name } => {
                assert_eq!(from, "configuration[0]");
                assert_eq!(name, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ambiguous_target_is_rejected() {
        let err = DependencyGraph::build(&[
            config(Some("a"), &[]),
            config(Some("a"), &[]),
            config(Some("b"), &["a"]),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateName(_)));
    }

    #[test]
    fn duplicate_names_without_edges_are_allowed() {
        assert!(DependencyGraph::build(&[config(Some("a"), &[]), config(Some("a"), &[])]).is_ok());
    }

    #[test]
    fn cycle_is_rejected() {
        let err = DependencyGraph::build(&[
            config(Some("a"), &["b"]),
            config(Some("b"), &["a"]),
            config(Some("c"), &[]),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::DependencyCycle(ref s) if s == "a, b"), "{err}");
    }

    #[test]
    fn invalid_graph_builds_no_engines() {
        let driver = Rc::new(MockDriver::new());
        let err = instantiate_many(
            vec![config(Some("a"), &[]), config(Some("b"), &["missing"])],
            driver.clone(),
            &PluginRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::UnknownDependency { .. }));
        assert!(driver.journal().is_empty());
    }

    #[tokio::test]
    async fn run_follows_dependency_order_and_reports_input_order() {
        let driver = Rc::new(MockDriver::new());
        let multi = instantiate_many(
            vec![config(Some("server"), &["client"]), config(Some("client"), &[])],
            driver.clone(),
            &PluginRegistry::new(),
        )
        .unwrap();
        let stats = multi.run().await.unwrap();
        let names: Vec<_> = stats.children.iter().map(|s| s.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["server", "client"]);

        let runs: Vec<_> = driver
            .journal()
            .into_iter()
            .filter(|c| c.op == "run")
            .map(|c| c.engine)
            .collect();
        assert_eq!(runs, vec!["client", "server"]);
    }

    #[tokio::test]
    async fn close_attempts_every_engine() {
        let driver = Rc::new(MockDriver::new());
        driver.fail_close("a", "locked");
        let multi = instantiate_many(
            vec![config(Some("a"), &[]), config(Some("b"), &[])],
            driver.clone(),
            &PluginRegistry::new(),
        )
        .unwrap();
        assert!(matches!(multi.close().await, Err(CoreError::Close(_))));
        assert_eq!(driver.calls_for("b", "close"), 1);
    }
}
