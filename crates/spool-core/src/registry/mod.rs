//! Operation registry - operation 名 → handler
//!
//! Host アプリケーションが起動時に組み立て、worker は実行時に名前で引くだけです。
//! キューには名前と引数しか永続化しません（関数そのものは保存できないため）。
//!
//! 構築時は mutable、実行時は immutable（`Arc<OperationRegistry>` で共有）なので
//! ロックは不要です。

pub mod handler;

use std::collections::HashMap;
use std::sync::Arc;

pub use self::handler::{FnHandler, Handler, Operation, OperationHandler, TypedHandler};

use crate::domain::{Arguments, OperationError, OperationName, SpoolError};

#[derive(Default)]
pub struct OperationRegistry {
    handlers: HashMap<OperationName, Arc<dyn OperationHandler>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under `name`. Names are unique.
    pub fn register(
        &mut self,
        name: impl Into<OperationName>,
        handler: Arc<dyn OperationHandler>,
    ) -> Result<(), SpoolError> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(SpoolError::DuplicateOperation(name.to_string()));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Register a typed handler under `O::NAME`.
    pub fn register_typed<O: Operation, H: Handler<O> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), SpoolError> {
        self.register(O::NAME, Arc::new(TypedHandler::<O, H>::new(handler)))
    }

    /// Register a synchronous closure.
    pub fn register_fn<F>(&mut self, name: impl Into<OperationName>, f: F) -> Result<(), SpoolError>
    where
        F: Fn(&Arguments) -> Result<serde_json::Value, OperationError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnHandler::new(f)))
    }

    pub fn resolve(&self, name: &OperationName) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&OperationName::new(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().map(|n| n.to_string()).collect();
        names.sort();
        names
    }
}
