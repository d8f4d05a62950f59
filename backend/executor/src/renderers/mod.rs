pub mod command;
pub mod mock;
pub mod svg;

use std::collections::HashMap;
use std::sync::Arc;

use chartforge_core::Renderer;

pub use command::{CommandRenderer, COMMAND_METHOD};
pub use mock::MockRenderer;
pub use svg::{SvgRenderer, NATIVE_METHOD};

/// Renderers keyed by the method name they register under.
#[derive(Default, Clone)]
pub struct RendererRegistry {
    renderers: HashMap<String, Arc<dyn Renderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the renderer's own method name, replacing any previous one.
    pub fn register(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderers.insert(renderer.method().to_string(), renderer);
    }

    pub fn with(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.register(renderer);
        self
    }

    pub fn get(&self, method: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers.get(method).cloned()
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.renderers.keys().cloned().collect();
        methods.sort();
        methods
    }
}
