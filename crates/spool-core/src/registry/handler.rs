//! Handler traits - 名前付き operation の実行
//!
//! # 二層構造
//! - **表層（Typed）**: `Operation` trait + `Handler<O>` trait - 引数と戻り値が型付き
//! - **内部（Dyn）**: `OperationHandler` trait - object-safe、JSON 引数を受け取る
//!
//! `TypedHandler<O, H>` が表層を内部に変換します（type erasure）。

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{Arguments, OperationError};

/// Object-safe handler stored in the registry.
///
/// Handlers run inline on the worker; a handler that never returns stalls the
/// worker loop.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, OperationError>;
}

/// Operation binds a stable name to typed arguments and output.
///
/// # 使用例
/// ```ignore
/// #[derive(Deserialize)]
/// struct CropArgs { path: String, width: u32, height: u32 }
///
/// struct CropVideo;
///
/// impl Operation for CropVideo {
///     const NAME: &'static str = "media.crop_video";
///     type Args = CropArgs;
///     type Output = String;
/// }
/// ```
pub trait Operation: Send + Sync + 'static {
    const NAME: &'static str;
    type Args: DeserializeOwned + Send;
    type Output: Serialize + Send;
}

/// Handler executes one `Operation`.
#[async_trait]
pub trait Handler<O: Operation>: Send + Sync {
    async fn handle(&self, args: O::Args) -> Result<O::Output, OperationError>;
}

pub struct TypedHandler<O, H> {
    handler: H,
    _marker: PhantomData<fn() -> O>,
}

impl<O: Operation, H: Handler<O>> TypedHandler<O, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<O: Operation, H: Handler<O>> OperationHandler for TypedHandler<O, H> {
    async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, OperationError> {
        let args: O::Args = serde_json::from_value(serde_json::Value::Object(arguments.clone()))
            .map_err(|e| OperationError::invalid_arguments(e.to_string()))?;
        let output = self.handler.handle(args).await?;
        serde_json::to_value(output)
            .map_err(|e| OperationError::failed(format!("encode output: {e}")))
    }
}

/// Wraps a plain synchronous closure.
///
/// The closure runs on tokio's blocking pool, so a long synchronous operation
/// never occupies a runtime thread.
pub struct FnHandler<F> {
    f: Arc<F>,
}

impl<F> FnHandler<F>
where
    F: Fn(&Arguments) -> Result<serde_json::Value, OperationError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<F> OperationHandler for FnHandler<F>
where
    F: Fn(&Arguments) -> Result<serde_json::Value, OperationError> + Send + Sync + 'static,
{
    async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, OperationError> {
        let f = Arc::clone(&self.f);
        let arguments = arguments.clone();
        tokio::task::spawn_blocking(move || f(&arguments))
            .await
            .map_err(|e| OperationError::failed(format!("handler aborted: {e}")))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    pub(crate) struct SumArgs {
        a: i64,
        b: i64,
    }

    pub(crate) struct Sum;

    impl Operation for Sum {
        const NAME: &'static str = "sum";
        type Args = SumArgs;
        type Output = i64;
    }

    pub(crate) struct SumHandler;

    #[async_trait]
    impl Handler<Sum> for SumHandler {
        async fn handle(&self, args: SumArgs) -> Result<i64, OperationError> {
            Ok(args.a + args.b)
        }
    }

    fn args(v: serde_json::Value) -> Arguments {
        match v {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn typed_handler_decodes_and_encodes() {
        let handler = TypedHandler::<Sum, _>::new(SumHandler);
        let out = handler.call(&args(json!({"a": 1, "b": 2}))).await.unwrap();
        assert_eq!(out, json!(3));
    }

    #[tokio::test]
    async fn typed_handler_reports_bad_arguments() {
        let handler = TypedHandler::<Sum, _>::new(SumHandler);
        let err = handler.call(&args(json!({"a": "one"}))).await.unwrap_err();
        assert!(matches!(err, OperationError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn fn_handler_passes_arguments_through() {
        let handler = FnHandler::new(|a: &Arguments| Ok(json!(a.len())));
        let out = handler.call(&args(json!({"x": 1, "y": 2}))).await.unwrap();
        assert_eq!(out, json!(2));
    }

    #[tokio::test]
    async fn fn_handler_panic_becomes_failure() {
        let handler = FnHandler::new(|_: &Arguments| -> Result<serde_json::Value, OperationError> {
            panic!("decoder crashed")
        });
        let err = handler.call(&Arguments::new()).await.unwrap_err();
        assert!(matches!(err, OperationError::Failed(msg) if msg.starts_with("handler aborted")));
    }
}
