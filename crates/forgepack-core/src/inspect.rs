use crate::concurrency::shutdown_requested;
use crate::driver::{BuildDriver, BuildError, CloseError, Stats};
use crate::engine::BuildEngine;
use async_trait::async_trait;
use chrono::Utc;
use forgepack_schema::{Devtool, Poll, WatchOptions};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const IDLE_POLL: Duration = Duration::from_millis(100);

/// Reports the resolved build plan without compiling anything.
///
/// `run` lists the assets the configuration would emit. `watch` reports one
/// cycle and then idles until a shutdown is requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct InspectDriver;

impl InspectDriver {
    pub fn new() -> Self {
        Self
    }

    fn planned_assets(engine: &BuildEngine) -> Vec<String> {
        let options = engine.options();
        let filename = options.output.filename.as_deref().unwrap_or("[name].js");
        let dir = options
            .output
            .path
            .clone()
            .unwrap_or_else(|| engine.context().join("dist"));
        let entries = options.entry.as_deref().unwrap_or_default();

        let mut assets = Vec::with_capacity(entries.len());
        for (i, _) in entries.iter().enumerate() {
            let chunk = if i == 0 { "main".to_owned() } else { format!("main-{i}") };
            let file = filename.replace("[name]", &chunk);
            assets.push(dir.join(&file).display().to_string());
            if matches!(&options.devtool, Some(Devtool::Source(s)) if s.contains("source-map")) {
                assets.push(dir.join(format!("{file}.map")).display().to_string());
            }
        }
        assets
    }
}

#[async_trait(?Send)]
impl BuildDriver for InspectDriver {
    fn name(&self) -> &'static str {
        "inspect"
    }

    fn process_options(&self, engine: &mut BuildEngine) -> Result<(), BuildError> {
        let plan = json!({
            "context": engine.context().display().to_string(),
            "entry": engine.options().entry,
            "output": engine.options().output,
        });
        engine.state_mut().insert("inspect.plan".to_owned(), plan);
        Ok(())
    }

    async fn run(&self, engine: &BuildEngine) -> Result<Stats, BuildError> {
        let started = Utc::now();
        Ok(Stats::for_engine(engine, started).with_assets(Self::planned_assets(engine)))
    }

    async fn close(&self, _engine: &BuildEngine) -> Result<(), CloseError> {
        Ok(())
    }

    async fn watch(
        &self,
        engine: &BuildEngine,
        options: &WatchOptions,
        on_cycle: &mut dyn FnMut(Result<Stats, BuildError>),
    ) -> Result<(), BuildError> {
        on_cycle(self.run(engine).await);
        let idle = match options.poll {
            Some(Poll::Interval(ms)) => Duration::from_millis(ms),
            _ => IDLE_POLL,
        };
        while !shutdown_requested() {
            tokio::time::sleep(idle).await;
        }
        debug!(engine = engine.display_name(), "watch interrupted by shutdown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::instantiate;
    use crate::plugin::PluginRegistry;
    use forgepack_schema::NormalizedConfig;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn engine(config: NormalizedConfig) -> BuildEngine {
        instantiate(config, Rc::new(InspectDriver::new()), &PluginRegistry::new()).unwrap()
    }

    #[tokio::test]
    async fn plans_default_output() {
        let stats = engine(NormalizedConfig::new("/app")).run().await.unwrap();
        assert_eq!(stats.assets, vec!["/app/dist/main.js"]);
    }

    #[tokio::test]
    async fn plans_one_chunk_per_entry_with_source_maps() {
        let mut config = NormalizedConfig::new("/app");
        config.entry = Some(vec!["./a".into(), "./b".into()]);
        config.output.path = Some(PathBuf::from("/out"));
        config.output.filename = Some("[name].bundle.js".into());
        config.devtool = Some(Devtool::Source("source-map".into()));
        let stats = engine(config).run().await.unwrap();
        assert_eq!(
            stats.assets,
            vec![
                "/out/main.bundle.js",
                "/out/main.bundle.js.map",
                "/out/main-1.bundle.js",
                "/out/main-1.bundle.js.map",
            ]
        );
    }

    #[test]
    fn records_plan_during_option_processing() {
        let e = engine(NormalizedConfig::new("/app"));
        let plan = e.state().get("inspect.plan").unwrap();
        assert_eq!(plan["context"], "/app");
        assert_eq!(plan["entry"], json!(["./src"]));
    }

    #[tokio::test]
    async fn watch_stops_once_shutdown_is_requested() {
        crate::concurrency::request_shutdown();
        let e = engine(NormalizedConfig::new("/app"));
        let mut cycles = 0;
        e.watch(&WatchOptions::default(), &mut |r| {
            assert!(r.is_ok());
            cycles += 1;
        })
        .await
        .unwrap();
        assert_eq!(cycles, 1);
    }
}
