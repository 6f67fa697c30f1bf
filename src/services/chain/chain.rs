use std::sync::Arc;

use tracing::debug;

use crate::services::chain::context::ValidationContext;

/// One step of a validation chain.
pub trait ValidationHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// `false` stops the chain; no later handler runs.
    fn handle(&self, ctx: &mut ValidationContext) -> bool;
}

/// Ordered, short-circuiting sequence of handlers.
///
/// Handlers run in the order they were added. Order matters: IP checks come
/// before token extraction, state validation before code exchange.
#[derive(Clone)]
pub struct ValidationChain {
    name: &'static str,
    handlers: Vec<Arc<dyn ValidationHandler>>,
}

impl ValidationChain {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(mut self, handler: impl ValidationHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn add_shared(mut self, handler: Arc<dyn ValidationHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn execute(&self, ctx: &mut ValidationContext) -> bool {
        for handler in &self.handlers {
            if !handler.handle(ctx) {
                debug!(
                    chain = self.name,
                    handler = handler.name(),
                    path = ctx.path(),
                    "validation chain stopped"
                );
                ctx.success = false;
                return false;
            }
        }
        ctx.success = true;
        true
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ValidationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationChain")
            .field("name", &self.name)
            .field("handlers", &self.handler_names())
            .finish()
    }
}
