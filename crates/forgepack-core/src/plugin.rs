use crate::engine::BuildEngine;
use crate::CoreError;
use forgepack_schema::PluginEntry;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Object-shaped plugin: anything exposing an `apply` capability.
pub trait ApplyPlugin {
    fn name(&self) -> &str;

    fn apply(&self, engine: &mut BuildEngine) -> Result<(), CoreError>;
}

pub type PluginFn = dyn Fn(&mut BuildEngine) -> Result<(), CoreError>;

/// A plugin in either of its two accepted shapes. Both are applied through
/// [`Plugin::apply`], so the instantiator never inspects the shape.
#[derive(Clone)]
pub enum Plugin {
    Callable { name: String, func: Rc<PluginFn> },
    Object(Rc<dyn ApplyPlugin>),
}

impl Plugin {
    pub fn callable(
        name: impl Into<String>,
        func: impl Fn(&mut BuildEngine) -> Result<(), CoreError> + 'static,
    ) -> Self {
        Self::Callable {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn object(plugin: impl ApplyPlugin + 'static) -> Self {
        Self::Object(Rc::new(plugin))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Callable { name, .. } => name,
            Self::Object(p) => p.name(),
        }
    }

    pub fn apply(&self, engine: &mut BuildEngine) -> Result<(), CoreError> {
        match self {
            Self::Callable { func, .. } => func(engine),
            Self::Object(p) => p.apply(engine),
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable { name, .. } => f.debug_tuple("Callable").field(name).finish(),
            Self::Object(p) => f.debug_tuple("Object").field(&p.name()).finish(),
        }
    }
}

type Factory = Rc<dyn Fn(&Value) -> Result<Plugin, CoreError>>;

/// Maps plugin names used in configuration files to plugin factories.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, Factory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the plugins in [`crate::builtin`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_all(&mut registry);
        registry
    }

    /// Register a factory that builds a plugin from its configured options.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Value) -> Result<Plugin, CoreError> + 'static,
    ) {
        self.factories.insert(name.into(), Rc::new(factory));
    }

    /// Register a callable plugin that receives its configured options on every apply.
    pub fn register_fn(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&mut BuildEngine, &Value) -> Result<(), CoreError> + 'static,
    ) {
        let name = name.into();
        let func = Rc::new(func);
        let plugin_name = name.clone();
        self.register(name, move |options| {
            let func = Rc::clone(&func);
            let options = options.clone();
            Ok(Plugin::callable(plugin_name.clone(), move |engine| {
                func(engine, &options)
            }))
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn resolve(&self, entry: &PluginEntry) -> Result<Plugin, CoreError> {
        let factory = self
            .factories
            .get(&entry.name)
            .ok_or_else(|| CoreError::UnknownPlugin(entry.name.clone()))?;
        factory(&entry.options)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;
    use forgepack_schema::NormalizedConfig;
    use serde_json::json;

    struct Marker;

    impl ApplyPlugin for Marker {
        fn name(&self) -> &str {
            "marker"
        }

        fn apply(&self, engine: &mut BuildEngine) -> Result<(), CoreError> {
            engine.state_mut().insert("marker".to_owned(), json!(true));
            Ok(())
        }
    }

    fn bare_engine() -> BuildEngine {
        BuildEngine::new(NormalizedConfig::new("/app"), Rc::new(MockDriver::new()))
    }

    #[test]
    fn both_shapes_apply_through_one_call() {
        let mut engine = bare_engine();
        let plugins = [
            Plugin::object(Marker),
            Plugin::callable("counter", |engine| {
                engine.state_mut().insert("counter".to_owned(), json!(1));
                Ok(())
            }),
        ];
        for p in &plugins {
            p.apply(&mut engine).unwrap();
        }
        assert_eq!(engine.state().get("marker"), Some(&json!(true)));
        assert_eq!(engine.state().get("counter"), Some(&json!(1)));
        assert_eq!(plugins[0].name(), "marker");
        assert_eq!(plugins[1].name(), "counter");
    }

    #[test]
    fn registry_passes_options_to_callables() {
        let mut registry = PluginRegistry::new();
        registry.register_fn("echo", |engine, options| {
            engine.state_mut().insert("echo".to_owned(), options.clone());
            Ok(())
        });
        let plugin = registry
            .resolve(&PluginEntry::new("echo").with_options(json!({ "x": 1 })))
            .unwrap();
        let mut engine = bare_engine();
        plugin.apply(&mut engine).unwrap();
        assert_eq!(engine.state().get("echo"), Some(&json!({ "x": 1 })));
    }

    #[test]
    fn unknown_plugin_is_configuration_error() {
        let err = PluginRegistry::new()
            .resolve(&PluginEntry::new("nope"))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownPlugin(name) if name == "nope"));
    }

    #[test]
    fn builtins_are_registered() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.contains("banner"));
        assert!(registry.contains("define"));
        assert!(registry.contains("mode-preset"));
    }
}
