//! Harvesting unary RPC methods into bridged functions
//!
//! A client lists its methods through `RpcClient`. Every method whose first
//! declared return is not the client-stream marker becomes a bridged
//! function taking exactly `(context, message)`.

use std::sync::Arc;

use tracing::debug;

use crate::context::CallContext;
use crate::error::{BridgeError, BridgeResult};
use crate::function::{BridgedFunction, Entry};
use crate::message::MessageRef;
use crate::types::TypeDesc;
use crate::value::Value;

/// Name of the return marker for streaming methods
pub const STREAMING_MARKER: &str = "ClientStream";

/// Handler invoked with the receiver, the call context and the request
pub type RpcHandler<C> = Arc<dyn Fn(&C, &CallContext, MessageRef) -> BridgeResult<Value> + Send + Sync>;

/// One method of an RPC client
pub struct RpcMethod<C> {
    name: String,
    params: Vec<TypeDesc>,
    returns: Vec<TypeDesc>,
    handler: RpcHandler<C>,
}

impl<C: 'static> RpcMethod<C> {
    /// Method with explicit parameter and return declarations. `params`
    /// starts with the receiver.
    pub fn new(
        name: impl Into<String>,
        params: Vec<TypeDesc>,
        returns: Vec<TypeDesc>,
        handler: impl Fn(&C, &CallContext, MessageRef) -> BridgeResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            handler: Arc::new(handler),
        }
    }

    /// Unary method: `(receiver, context, request) -> response`
    pub fn unary(
        name: impl Into<String>,
        request: &str,
        response: &str,
        handler: impl Fn(&C, &CallContext, MessageRef) -> BridgeResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            name,
            vec![
                TypeDesc::Opaque(std::any::type_name::<C>().to_string()),
                TypeDesc::Context,
                TypeDesc::message(request),
            ],
            vec![TypeDesc::message(response)],
            handler,
        )
    }

    /// Server-streaming method; never harvested
    pub fn streaming(
        name: impl Into<String>,
        request: &str,
        handler: impl Fn(&C, &CallContext, MessageRef) -> BridgeResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            name,
            vec![
                TypeDesc::Opaque(std::any::type_name::<C>().to_string()),
                TypeDesc::Context,
                TypeDesc::message(request),
            ],
            vec![TypeDesc::Interface(STREAMING_MARKER.to_string())],
            handler,
        )
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the first return is the streaming marker
    pub fn is_streaming(&self) -> bool {
        matches!(self.returns.first(), Some(TypeDesc::Interface(name)) if name == STREAMING_MARKER)
    }
}

/// An RPC client whose methods can be exposed to scripts
pub trait RpcClient: Sized + Send + Sync + 'static {
    /// Every method of the client, streaming ones included
    fn methods(&self) -> Vec<RpcMethod<Self>>;
}

/// Turn every unary method of `client` into a bridged function in
/// `namespace`.
pub fn harvest<C: RpcClient>(namespace: &str, client: Arc<C>) -> Vec<BridgedFunction> {
    let mut functions = Vec::new();
    for method in client.methods() {
        if method.is_streaming() {
            debug!(target: "mals::rpc", method = %method.name, "skipping streaming method");
            continue;
        }
        let RpcMethod {
            name,
            params,
            returns,
            handler,
        } = method;

        let receiver = Arc::clone(&client);
        let entry: Entry = Arc::new(move |args: Vec<Value>| {
            if args.len() != 2 {
                return Err(BridgeError::ArityMismatch {
                    expected: 2,
                    actual: args.len(),
                });
            }
            let mut args = args.into_iter();
            let ctx = match args.next() {
                Some(Value::Opaque(handle)) => handle.downcast_ref::<CallContext>().cloned(),
                _ => None,
            }
            .ok_or(BridgeError::InvalidCallableTarget {
                position: 1,
                expected: "context",
            })?;
            let request = match args.next() {
                Some(Value::Message(message)) => message,
                _ => {
                    return Err(BridgeError::InvalidCallableTarget {
                        position: 2,
                        expected: "message",
                    })
                }
            };
            handler(receiver.as_ref(), &ctx, request)
        });

        let raw_name = format!("{}::{}", std::any::type_name::<C>(), name);
        let params = params.get(1..3).map(<[TypeDesc]>::to_vec).unwrap_or_default();
        debug!(target: "mals::rpc", namespace, method = %name, "harvested method");
        functions.push(BridgedFunction::from_entry(raw_name, params, returns, entry).named(namespace, name));
    }
    functions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FieldDescriptor, Message, MessageDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
    }

    impl RpcClient for Echo {
        fn methods(&self) -> Vec<RpcMethod<Self>> {
            vec![
                RpcMethod::unary("Ping", "demo.Ping", "demo.Ping", |client: &Echo, ctx, req| {
                    client.calls.fetch_add(1, Ordering::SeqCst);
                    if ctx.is_done() {
                        return Err(BridgeError::host(ctx.err().unwrap_or_default()));
                    }
                    Ok(Value::Message(req))
                }),
                RpcMethod::streaming("Watch", "demo.Ping", |_: &Echo, _, _| Ok(Value::Nil)),
            ]
        }
    }

    fn ping() -> MessageRef {
        Message::new(Arc::new(MessageDescriptor::new(
            "demo.Ping",
            vec![FieldDescriptor::new("Body", TypeDesc::Text)],
        )))
        .into_ref()
    }

    fn ctx_value(ctx: CallContext) -> Value {
        Value::Opaque(crate::value::Handle::new(ctx))
    }

    fn client() -> Arc<Echo> {
        Arc::new(Echo {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_streaming_methods_skipped() {
        let functions = harvest("echo", client());
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].qualified_name(), "echo.Ping");
    }

    #[test]
    fn test_params_drop_receiver() {
        let functions = harvest("echo", client());
        assert_eq!(
            functions[0].params(),
            &[TypeDesc::Context, TypeDesc::message("demo.Ping")]
        );
        assert_eq!(functions[0].returns(), &[TypeDesc::message("demo.Ping")]);
        assert!(functions[0].raw_name().ends_with("Echo::Ping"));
    }

    #[test]
    fn test_call_passes_context_and_message() {
        let client = client();
        let functions = harvest("echo", Arc::clone(&client));
        let request = ping();
        let out = functions[0]
            .invoke(vec![ctx_value(CallContext::background()), Value::Message(Arc::clone(&request))])
            .unwrap();
        assert_eq!(out, Value::Message(request));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_context_reaches_handler() {
        let functions = harvest("echo", client());
        let ctx = CallContext::background();
        ctx.cancel();
        let err = functions[0].invoke(vec![ctx_value(ctx), Value::Message(ping())]).unwrap_err();
        assert_eq!(err.to_string(), "context canceled");
    }

    #[test]
    fn test_invalid_targets() {
        let client = client();
        let functions = harvest("echo", Arc::clone(&client));

        let err = functions[0].invoke(vec![Value::Message(ping())]).unwrap_err();
        assert!(matches!(err, BridgeError::ArityMismatch { expected: 2, actual: 1 }));

        let err = functions[0]
            .invoke(vec![Value::Int(1), Value::Message(ping())])
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidCallableTarget {
                position: 1,
                expected: "context"
            }
        ));

        let err = functions[0]
            .invoke(vec![ctx_value(CallContext::background()), Value::text("x")])
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidCallableTarget {
                position: 2,
                expected: "message"
            }
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}
