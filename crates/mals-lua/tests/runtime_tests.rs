//! End-to-end tests: configured runtimes, context helpers and RPC clients

use std::fs;
use std::sync::Arc;

use mals_lua::{
    builtin_functions, generate_definitions, new_runtime, Bridge, BridgeConfig, RuntimeConfig,
};
use mals_sdk::{harvest, BridgeError, FunctionRegistry, MessageRegistry, RpcClient, RpcMethod, Value};
use tempfile::TempDir;

const CONFIG: &str = r#"
[render]
truncate_limit = 8

[runtime]
message_global = "Msg"

[[messages]]
name = "echo.Request"
fields = { Text = "string", Count = "int" }

[[messages]]
name = "echo.Reply"
fields = { Text = "string" }
"#;

fn configured() -> (BridgeConfig, Bridge) {
    let config = BridgeConfig::from_str(CONFIG).unwrap();
    let bridge = Bridge::new(Arc::new(config.message_registry().unwrap()))
        .with_render_options(config.render_options());
    (config, bridge)
}

struct EchoClient {
    prefix: String,
    messages: Arc<MessageRegistry>,
}

impl RpcClient for EchoClient {
    fn methods(&self) -> Vec<RpcMethod<Self>> {
        vec![
            RpcMethod::unary("Echo", "echo.Request", "echo.Reply", |client: &EchoClient, ctx, req| {
                if ctx.is_done() {
                    return Err(BridgeError::host(ctx.err().unwrap_or_default()));
                }
                let request = req.lock();
                let text = match request.get("Text") {
                    Some(Value::Text(text)) => text,
                    _ => String::new(),
                };
                let count = match request.get("Count") {
                    Some(Value::Int(count)) => count.max(1) as usize,
                    _ => 1,
                };
                let mut message = client.messages.instantiate("echo.Reply")?;
                message.set_raw("Text", Value::Text(format!("{}{}", client.prefix, text.repeat(count))));
                Ok(Value::Message(message.into_ref()))
            }),
            RpcMethod::streaming("Watch", "echo.Request", |_: &EchoClient, _, _| Ok(Value::Nil)),
        ]
    }
}

#[test]
fn test_runtime_from_config() {
    let (config, bridge) = configured();
    let lua = new_runtime(&bridge, &config.runtime).unwrap();

    let (name, err, rendered): (String, String, String) = lua
        .load(
            r#"
            local r = Request.New({Text = "abcdefghijkl"})
            local _, err = Msg.New("echo.Missing")
            return Reply._NAME, err, tostring(r)
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(name, "echo.Reply");
    assert_eq!(err, "invalid message type: echo.Missing");
    assert!(rendered.contains("\"abcdefgh......\""));
}

#[test]
fn test_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("mals.toml");
    fs::write(&path, CONFIG).unwrap();

    let config = BridgeConfig::from_file(&path).unwrap();
    assert_eq!(config.runtime.message_global, "Msg");
    assert_eq!(config.messages.len(), 2);
    assert!(BridgeConfig::from_file(&temp.path().join("missing.toml")).is_err());
}

#[test]
fn test_context_helpers() {
    let lua = new_runtime(&Bridge::default(), &RuntimeConfig::default()).unwrap();
    let (before, after, expired): (bool, bool, bool) = lua
        .load(
            r#"
            local ctx = context.background()
            local before = context.done(ctx)
            context.cancel(ctx)
            local expired = context.done(context.timeout(0))
            return before, context.done(ctx), expired
            "#,
        )
        .eval()
        .unwrap();
    assert!(!before);
    assert!(after);
    assert!(expired);
}

#[test]
fn test_log_table() {
    let lua = new_runtime(&Bridge::default(), &RuntimeConfig::default()).unwrap();
    lua.load("log.info('hello', 1, true) log.debug('x') log.warn() log.error('e')")
        .exec()
        .unwrap();

    let quiet = RuntimeConfig {
        install_log: false,
        ..RuntimeConfig::default()
    };
    let lua = new_runtime(&Bridge::default(), &quiet).unwrap();
    let missing: bool = lua.load("return log == nil").eval().unwrap();
    assert!(missing);
}

#[test]
fn test_package_path() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("helper.lua"), "return { answer = 42 }").unwrap();
    let config = RuntimeConfig {
        package_path: vec![format!("{}/?.lua", temp.path().display())],
        ..RuntimeConfig::default()
    };
    let lua = new_runtime(&Bridge::default(), &config).unwrap();
    let answer: i64 = lua.load("return require('helper').answer").eval().unwrap();
    assert_eq!(answer, 42);
}

#[test]
fn test_rpc_through_lua() {
    let (config, bridge) = configured();
    let lua = new_runtime(&bridge, &config.runtime).unwrap();

    let functions = harvest(
        "rpc",
        Arc::new(EchoClient {
            prefix: "> ".into(),
            messages: Arc::clone(bridge.messages()),
        }),
    );
    assert_eq!(functions.len(), 1);
    let mut registry = FunctionRegistry::new();
    registry.extend(functions);
    bridge
        .install_package(&lua, "rpc", &registry.package("rpc"))
        .unwrap();

    let (text, watch): (String, bool) = lua
        .load(
            r#"
            local reply = rpc.Echo(context.background(), Request.New({Text = "hi", Count = 2}))
            return reply.Text, rpc.Watch == nil
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(text, "> hihi");
    assert!(watch);

    let message: String = lua
        .load(
            r#"
            local ctx = context.background()
            context.cancel(ctx)
            local ok, err = pcall(rpc.Echo, ctx, Request.New())
            return tostring(err)
            "#,
        )
        .eval()
        .unwrap();
    assert!(message.contains("context canceled"));

    let wrong: String = lua
        .load("local ok, err = pcall(rpc.Echo, context.background(), Reply.New()) return tostring(err)")
        .eval()
        .unwrap();
    assert!(wrong.contains("argument 2"));
}

#[test]
fn test_definitions_for_builtins() {
    let builtins = builtin_functions();
    let text = generate_definitions(
        &builtins.metadata(Some("context")),
        &MessageRegistry::new(),
        "context",
    );
    assert!(text.contains("-- Group: context"));
    assert!(text.contains("--- @param ms number timeout in milliseconds"));
    assert!(text.contains("function context.timeout(ms) end"));
    assert!(text.contains("--- @return context ctx background context"));
}
