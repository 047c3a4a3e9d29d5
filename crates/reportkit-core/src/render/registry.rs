//! Registry of available report renderers.
//!
//! Renderers are kept in registration order behind one read-write lock, so
//! every read sees a consistent snapshot and every mutation is atomic.
//! Renderers can also be constructed by name through a fixed table of
//! factories.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use super::delimited::DelimitedRenderer;
use super::text::TextTableRenderer;
use super::traits::{RendererId, RenderingMode, ReportRenderer};
use crate::error::{ReportError, Result};
use crate::schema::ReportSchema;

/// Constructs a renderer instance.
pub type RendererFactory = fn() -> Arc<dyn ReportRenderer>;

/// Renderer factories keyed by stable name.
#[derive(Debug, Clone, Default)]
pub struct RendererFactories {
    factories: IndexMap<String, RendererFactory>,
}

impl RendererFactories {
    /// Create an empty table (for testing).
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in renderers: `text-table` and `delimited`.
    pub fn builtin() -> Self {
        let mut factories = Self::empty();
        factories.register(TextTableRenderer::ID, text_table);
        factories.register(DelimitedRenderer::ID, delimited);
        factories
    }

    /// Add a factory, replacing any with the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: RendererFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn get(&self, name: &str) -> Option<RendererFactory> {
        self.factories.get(name).copied()
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Factories in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = (&str, RendererFactory)> {
        self.factories
            .iter()
            .map(|(name, factory)| (name.as_str(), *factory))
    }
}

fn text_table() -> Arc<dyn ReportRenderer> {
    Arc::new(TextTableRenderer::new())
}

fn delimited() -> Arc<dyn ReportRenderer> {
    Arc::new(DelimitedRenderer::new())
}

type Entries = IndexMap<RendererId, Arc<dyn ReportRenderer>>;

/// Registered renderers, in registration order.
#[derive(Debug, Default)]
pub struct RendererRegistry {
    factories: RendererFactories,
    entries: RwLock<Entries>,
}

impl RendererRegistry {
    /// Create a registry with no renderers and the given factory table.
    pub fn new(factories: RendererFactories) -> Self {
        Self {
            factories,
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Create an empty registry without factories (for testing).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in renderer registered.
    pub fn builtin() -> Self {
        let registry = Self::new(RendererFactories::builtin());
        for (name, factory) in registry.factories.iter() {
            registry.register_as(RendererId::new(name), factory());
        }
        registry
    }

    /// Create a registry and register `names` through the built-in factories.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = Self::new(RendererFactories::builtin());
        for name in names {
            registry.register_by_name(name.as_ref())?;
        }
        Ok(registry)
    }

    pub fn factories(&self) -> &RendererFactories {
        &self.factories
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `renderer` under its own id.
    pub fn register(&self, renderer: Arc<dyn ReportRenderer>) {
        let id = RendererId::new(renderer.id());
        self.register_as(id, renderer);
    }

    /// Register `renderer` under `id`.
    ///
    /// Replacing an existing entry keeps its original position.
    pub fn register_as(&self, id: RendererId, renderer: Arc<dyn ReportRenderer>) {
        tracing::debug!(renderer = %id, "Registering renderer");
        self.write().insert(id, renderer);
    }

    /// Construct the renderer `name` through the factory table and register it.
    ///
    /// Fails with [`ReportError::UnknownRenderer`] and leaves the registry
    /// unchanged when no factory has that name.
    pub fn register_by_name(&self, name: &str) -> Result<Arc<dyn ReportRenderer>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ReportError::UnknownRenderer(name.to_string()))?;
        let renderer = factory();
        self.register_as(RendererId::new(name), renderer.clone());
        Ok(renderer)
    }

    /// Remove the renderer registered under `id`. Absent ids are ignored.
    pub fn remove(&self, id: &str) -> Option<Arc<dyn ReportRenderer>> {
        let removed = self.write().shift_remove(id);
        if removed.is_some() {
            tracing::debug!(renderer = %id, "Removed renderer");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ReportRenderer>> {
        self.read().get(id).cloned()
    }

    /// Same lookup as [`RendererRegistry::get`], for callers holding a name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn ReportRenderer>> {
        self.get(name)
    }

    /// Every registered renderer once, in registration order.
    pub fn all(&self) -> Vec<Arc<dyn ReportRenderer>> {
        self.read().values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<RendererId> {
        self.read().keys().cloned().collect()
    }

    /// Snapshot of the whole mapping.
    pub fn renderers(&self) -> IndexMap<RendererId, Arc<dyn ReportRenderer>> {
        self.read().clone()
    }

    /// Register every entry, in the order supplied.
    pub fn set_renderers<I>(&self, renderers: I)
    where
        I: IntoIterator<Item = (RendererId, Arc<dyn ReportRenderer>)>,
    {
        let mut entries = self.write();
        for (id, renderer) in renderers {
            entries.insert(id, renderer);
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Rendering modes for `schema`, most preferred first.
    ///
    /// Modes are sorted by weight; ties keep registration order, then each
    /// renderer's own order. Each mode names the id its renderer is
    /// registered under.
    pub fn rendering_modes_for(&self, schema: &ReportSchema) -> Vec<RenderingMode> {
        let mut modes: Vec<RenderingMode> = self
            .read()
            .iter()
            .filter(|(_, renderer)| renderer.can_render(schema))
            .flat_map(|(id, renderer)| {
                renderer
                    .rendering_modes(schema)
                    .into_iter()
                    .map(move |mode| RenderingMode {
                        renderer: id.clone(),
                        ..mode
                    })
            })
            .collect();
        modes.sort_by_key(|mode| mode.sort_weight);
        modes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ReportData;
    use crate::render::RenderError;
    use std::io::Write;

    struct Stub {
        id: &'static str,
        weights: Vec<i32>,
        renders: bool,
    }

    impl Stub {
        fn new(id: &'static str, weights: &[i32]) -> Arc<Self> {
            Arc::new(Self {
                id,
                weights: weights.to_vec(),
                renders: true,
            })
        }
    }

    impl ReportRenderer for Stub {
        fn id(&self) -> &str {
            self.id
        }

        fn label(&self) -> &str {
            self.id
        }

        fn can_render(&self, _schema: &ReportSchema) -> bool {
            self.renders
        }

        fn rendering_modes(&self, _schema: &ReportSchema) -> Vec<RenderingMode> {
            self.weights
                .iter()
                .enumerate()
                .map(|(i, w)| RenderingMode::new(self.id, format!("{}-{}", self.id, i), None, *w))
                .collect()
        }

        fn content_type(&self, _argument: Option<&str>) -> String {
            "text/plain".to_string()
        }

        fn filename(&self, _schema: &ReportSchema, _argument: Option<&str>) -> String {
            "out.txt".to_string()
        }

        fn render(
            &self,
            _data: &ReportData,
            _argument: Option<&str>,
            _out: &mut dyn Write,
        ) -> std::result::Result<(), RenderError> {
            Ok(())
        }
    }

    fn labels(modes: &[RenderingMode]) -> Vec<&str> {
        modes.iter().map(|m| m.label.as_str()).collect()
    }

    #[test]
    fn test_registry_empty() {
        let registry = RendererRegistry::empty();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("text-table").is_none());
    }

    #[test]
    fn test_registry_builtin() {
        let registry = RendererRegistry::builtin();
        let ids: Vec<_> = registry.ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["text-table", "delimited"]);
    }

    #[test]
    fn test_register_by_unknown_name_leaves_registry_unchanged() {
        let registry = RendererRegistry::new(RendererFactories::builtin());
        let err = registry.register_by_name("spreadsheet").unwrap_err();
        assert!(matches!(err, ReportError::UnknownRenderer(ref name) if name == "spreadsheet"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_names() {
        let registry = RendererRegistry::from_names(["delimited"]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(RendererRegistry::from_names(["delimited", "nope"]).is_err());
    }

    #[test]
    fn test_register_get_remove() {
        let registry = RendererRegistry::empty();
        registry.register(Stub::new("a", &[1]));
        assert!(registry.get("a").is_some());
        assert!(registry.get_by_name("a").is_some());

        assert!(registry.remove("a").is_some());
        assert!(registry.get("a").is_none());
        assert!(registry.get_by_name("a").is_none());
        assert!(registry.remove("a").is_none());
    }

    #[test]
    fn test_reregister_keeps_position_and_replaces_instance() {
        let registry = RendererRegistry::empty();
        registry.register(Stub::new("a", &[1]));
        registry.register(Stub::new("b", &[1]));
        let replacement: Arc<dyn ReportRenderer> = Stub::new("a", &[1]);
        registry.register(replacement.clone());

        let all = registry.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id(), "a");
        assert!(Arc::ptr_eq(&all[0], &replacement));
    }

    #[test]
    fn test_modes_sorted_by_weight_with_stable_ties() {
        let registry = RendererRegistry::empty();
        registry.register(Stub::new("r", &[5, 1]));
        registry.register(Stub::new("q", &[1, 5]));
        let modes = registry.rendering_modes_for(&ReportSchema::new("s"));
        assert_eq!(labels(&modes), vec!["r-1", "q-0", "r-0", "q-1"]);
    }

    #[test]
    fn test_modes_skip_renderers_that_cannot_render() {
        let registry = RendererRegistry::empty();
        registry.register(Arc::new(Stub {
            id: "never",
            weights: vec![0],
            renders: false,
        }));
        registry.register(Stub::new("ok", &[3]));
        let modes = registry.rendering_modes_for(&ReportSchema::new("s"));
        assert_eq!(labels(&modes), vec!["ok-0"]);
    }

    #[test]
    fn test_modes_name_registration_key() {
        let registry = RendererRegistry::empty();
        registry.register_as(RendererId::new("alias"), Stub::new("a", &[1]));
        let modes = registry.rendering_modes_for(&ReportSchema::new("s"));
        assert_eq!(modes[0].renderer, RendererId::new("alias"));
    }

    #[test]
    fn test_builtin_uses_every_factory() {
        let registry = RendererRegistry::builtin();
        let names = registry.factories().names();
        let ids: Vec<_> = registry.ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, names);
        assert_eq!(registry.get("delimited").unwrap().id(), "delimited");
    }

    #[test]
    fn test_readers_see_whole_mutations() {
        let registry = Arc::new(RendererRegistry::empty());
        let schema = ReportSchema::new("s");

        std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                for _ in 0..500 {
                    let y: Arc<dyn ReportRenderer> = Stub::new("y", &[2]);
                    let x: Arc<dyn ReportRenderer> = Stub::new("x", &[1]);
                    registry.set_renderers([(RendererId::new("y"), y), (RendererId::new("x"), x)]);
                    registry.remove("y");
                    registry.remove("x");
                }
            });

            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        // "y" is only ever added together with "x" and removed first.
                        let snapshot = registry.renderers();
                        assert!(!snapshot.contains_key("y") || snapshot.contains_key("x"));

                        let modes = registry.rendering_modes_for(&schema);
                        assert!(modes.len() <= 2);
                        assert!(modes.windows(2).all(|w| w[0].sort_weight <= w[1].sort_weight));
                        let has_y = modes.iter().any(|m| m.renderer.as_str() == "y");
                        let has_x = modes.iter().any(|m| m.renderer.as_str() == "x");
                        assert!(!has_y || has_x);
                    }
                });
            }

            writer.join().unwrap();
        });

        assert!(registry.is_empty());
    }

    #[test]
    fn test_set_renderers_in_order() {
        let registry = RendererRegistry::empty();
        let z: Arc<dyn ReportRenderer> = Stub::new("z", &[1]);
        let a: Arc<dyn ReportRenderer> = Stub::new("a", &[1]);
        registry.set_renderers([(RendererId::new("z"), z), (RendererId::new("a"), a)]);
        let snapshot = registry.renderers();
        let ids: Vec<_> = snapshot.keys().map(RendererId::as_str).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }
}
