use crate::driver::{BuildDriver, BuildError, CloseError, Stats};
use crate::engine::BuildEngine;
use async_trait::async_trait;
use chrono::Utc;
use forgepack_schema::WatchOptions;
use serde_json::json;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// One driver call, recorded with the engine's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCall {
    pub engine: String,
    pub op: &'static str,
}

/// Scripted in-memory driver. Records every call; run, close, and watch
/// results can be set per engine name.
pub struct MockDriver {
    journal: RefCell<Vec<DriverCall>>,
    run_failures: RefCell<HashMap<String, VecDeque<BuildError>>>,
    close_failures: RefCell<HashMap<String, CloseError>>,
    watch_cycles: usize,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            journal: RefCell::new(Vec::new()),
            run_failures: RefCell::new(HashMap::new()),
            close_failures: RefCell::new(HashMap::new()),
            watch_cycles: 1,
        }
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cycles each `watch` call reports before it stops.
    #[must_use]
    pub fn with_watch_cycles(mut self, cycles: usize) -> Self {
        self.watch_cycles = cycles;
        self
    }

    /// Make the next run of `engine` fail. Queued failures apply in order.
    pub fn fail_run(&self, engine: &str, message: &str) {
        self.run_failures
            .borrow_mut()
            .entry(engine.to_owned())
            .or_default()
            .push_back(BuildError::new(message));
    }

    pub fn fail_close(&self, engine: &str, message: &str) {
        self.close_failures
            .borrow_mut()
            .insert(engine.to_owned(), CloseError::new(message));
    }

    pub fn journal(&self) -> Vec<DriverCall> {
        self.journal.borrow().clone()
    }

    pub fn calls_for(&self, engine: &str, op: &str) -> usize {
        self.journal
            .borrow()
            .iter()
            .filter(|c| c.engine == engine && c.op == op)
            .count()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.journal.borrow().iter().map(|c| c.op).collect()
    }

    fn record(&self, engine: &BuildEngine, op: &'static str) {
        self.journal.borrow_mut().push(DriverCall {
            engine: engine.display_name().to_owned(),
            op,
        });
    }

    fn next_run_failure(&self, engine: &BuildEngine) -> Option<BuildError> {
        self.run_failures
            .borrow_mut()
            .get_mut(engine.display_name())
            .and_then(VecDeque::pop_front)
    }

    fn stats(engine: &BuildEngine) -> Stats {
        let assets = engine
            .options()
            .entry
            .iter()
            .flatten()
            .map(|e| format!("mock:{e}"))
            .collect();
        Stats::for_engine(engine, Utc::now()).with_assets(assets)
    }
}

#[async_trait(?Send)]
impl BuildDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn process_options(&self, engine: &mut BuildEngine) -> Result<(), BuildError> {
        self.record(engine, "process_options");
        engine
            .state_mut()
            .insert("mock.processed".to_owned(), json!(true));
        Ok(())
    }

    async fn run(&self, engine: &BuildEngine) -> Result<Stats, BuildError> {
        self.record(engine, "run");
        tokio::task::yield_now().await;
        match self.next_run_failure(engine) {
            Some(err) => Err(err),
            None => Ok(Self::stats(engine)),
        }
    }

    async fn close(&self, engine: &BuildEngine) -> Result<(), CloseError> {
        self.record(engine, "close");
        tokio::task::yield_now().await;
        match self.close_failures.borrow().get(engine.display_name()) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn watch(
        &self,
        engine: &BuildEngine,
        _options: &WatchOptions,
        on_cycle: &mut dyn FnMut(Result<Stats, BuildError>),
    ) -> Result<(), BuildError> {
        self.record(engine, "watch");
        for _ in 0..self.watch_cycles {
            tokio::task::yield_now().await;
            let cycle = match self.next_run_failure(engine) {
                Some(err) => Err(err),
                None => Ok(Self::stats(engine)),
            };
            on_cycle(cycle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::instantiate;
    use crate::plugin::PluginRegistry;
    use forgepack_schema::NormalizedConfig;
    use std::rc::Rc;

    fn engine(driver: &Rc<MockDriver>, name: &str) -> BuildEngine {
        let mut config = NormalizedConfig::new("/app");
        config.name = Some(name.to_owned());
        instantiate(config, driver.clone(), &PluginRegistry::new()).unwrap()
    }

    #[tokio::test]
    async fn scripted_run_failure_applies_once() {
        let driver = Rc::new(MockDriver::new());
        let e = engine(&driver, "app");
        driver.fail_run("app", "syntax error");
        assert!(e.run().await.is_err());
        assert!(e.run().await.is_ok());
        assert_eq!(driver.calls_for("app", "run"), 2);
    }

    #[tokio::test]
    async fn watch_reports_each_cycle() {
        let driver = Rc::new(MockDriver::new().with_watch_cycles(3));
        let e = engine(&driver, "app");
        let mut seen = 0;
        e.watch(&WatchOptions::default(), &mut |r| {
            assert!(r.is_ok());
            seen += 1;
        })
        .await
        .unwrap();
        assert_eq!(seen, 3);
    }

    #[tokio::test]
    async fn stats_list_entries_as_assets() {
        let driver = Rc::new(MockDriver::new());
        let stats = engine(&driver, "app").run().await.unwrap();
        assert_eq!(stats.assets, vec!["mock:./src"]);
        assert_eq!(stats.name.as_deref(), Some("app"));
    }
}
