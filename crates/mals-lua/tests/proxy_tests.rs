//! Integration tests for message proxies and factories

use std::sync::Arc;

use mals_lua::{Bridge, MessageProxy};
use mals_sdk::{
    FieldDescriptor, FunctionRegistry, MessageDescriptor, MessageRef, MessageRegistry,
    RenderOptions, TypeDesc, Value,
};
use mlua::{AnyUserData, Lua};

fn registry() -> MessageRegistry {
    let mut messages = MessageRegistry::new();
    messages.register(MessageDescriptor::new(
        "demo.User",
        vec![FieldDescriptor::new("Name", TypeDesc::Text)],
    ));
    messages.register(MessageDescriptor::new(
        "demo.Task",
        vec![
            FieldDescriptor::read_only("Id", TypeDesc::Int),
            FieldDescriptor::new("Name", TypeDesc::Text),
            FieldDescriptor::new("Weight", TypeDesc::Float),
            FieldDescriptor::new("Payload", TypeDesc::Bytes),
            FieldDescriptor::new("Tags", TypeDesc::seq(TypeDesc::Text)),
            FieldDescriptor::new("Owner", TypeDesc::message("demo.User")),
        ],
    ));
    messages.register(MessageDescriptor::new(
        "demo.sub.Hidden",
        vec![FieldDescriptor::new("X", TypeDesc::Int)],
    ));
    messages
}

fn setup() -> (Bridge, Lua) {
    let bridge = Bridge::new(Arc::new(registry()));
    let lua = Lua::new();
    bridge.install(&lua, "Message").unwrap();
    bridge.register_package_messages(&lua, "demo").unwrap();
    (bridge, lua)
}

fn message_of(lua: &Lua, code: &str) -> MessageRef {
    let ud: AnyUserData = lua.load(code).eval().unwrap();
    let proxy = ud.borrow::<MessageProxy>().unwrap();
    proxy.message().clone()
}

#[test]
fn test_package_factories() {
    let (_, lua) = setup();
    let (name, has_hidden): (String, bool) = lua
        .load("return Task._NAME, rawget(_G, 'Hidden') ~= nil")
        .eval()
        .unwrap();
    assert_eq!(name, "demo.Task");
    assert!(!has_hidden);
}

#[test]
fn test_new_with_init_table() {
    let (_, lua) = setup();
    let message = message_of(
        &lua,
        "return Task.New({Name = 'build', Weight = 2, Tags = {'a', 'b'}, Payload = 'raw'})",
    );
    let message = message.lock();
    assert_eq!(message.get("Name"), Some(Value::Text("build".into())));
    assert_eq!(message.get("Weight"), Some(Value::Float(2.0)));
    assert_eq!(message.get("Payload"), Some(Value::Bytes(b"raw".to_vec())));
    match message.get("Tags") {
        Some(Value::Seq(tags)) => {
            assert_eq!(tags.elem(), &TypeDesc::Text);
            assert_eq!(tags.items(), &[Value::Text("a".into()), Value::Text("b".into())]);
        }
        other => panic!("unexpected tags: {other:?}"),
    }
}

#[test]
fn test_field_read_write() {
    let (_, lua) = setup();
    let (name, weight, tags): (String, f64, String) = lua
        .load(
            r#"
            local t = Task.New()
            t.Name = "deploy"
            t.Weight = 1.5
            t.Tags = {"x", "y"}
            return t.Name, t.Weight, table.concat(t.Tags, "+")
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(name, "deploy");
    assert_eq!(weight, 1.5);
    assert_eq!(tags, "x+y");
}

#[test]
fn test_rejected_writes_keep_fields() {
    let (_, lua) = setup();
    let (name, id, unknown, tags): (String, i64, bool, i64) = lua
        .load(
            r#"
            local t = Task.New({Name = "keep"})
            t.Missing = 5
            t.Id = 9
            t.Name = {}
            t.Tags = {"ok", 3}
            return t.Name, t.Id, t.Missing == nil, #t.Tags
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(name, "keep");
    assert_eq!(id, 0);
    assert!(unknown);
    assert_eq!(tags, 0);
}

#[test]
fn test_nested_message_field() {
    let (_, lua) = setup();
    let (owner, cleared): (String, bool) = lua
        .load(
            r#"
            local t = Task.New()
            t.Owner = User.New({Name = "ada"})
            local owner = t.Owner.Name
            t.Owner = nil
            return owner, t.Owner == nil
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(owner, "ada");
    assert!(cleared);
}

#[test]
fn test_shared_instance_identity() {
    let (_, lua) = setup();
    let name: String = lua
        .load(
            r#"
            local t = Task.New()
            t.Owner = User.New()
            local owner = t.Owner
            owner.Name = "shared"
            return t.Owner.Name
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(name, "shared");
}

#[test]
fn test_self_assignment_dropped() {
    let mut messages = registry();
    messages.register(MessageDescriptor::new(
        "demo.Node",
        vec![FieldDescriptor::new("Next", TypeDesc::message("demo.Node"))],
    ));
    let bridge = Bridge::new(Arc::new(messages));
    let lua = Lua::new();
    bridge.install(&lua, "Message").unwrap();
    bridge.register_package_messages(&lua, "demo").unwrap();
    let empty: bool = lua
        .load("local n = Node.New() n.Next = n return n.Next == nil")
        .eval()
        .unwrap();
    assert!(empty);
}

#[test]
fn test_indirect_cycle_dropped() {
    let mut messages = registry();
    messages.register(MessageDescriptor::new(
        "demo.Node",
        vec![
            FieldDescriptor::new("Name", TypeDesc::Text),
            FieldDescriptor::new("Next", TypeDesc::message("demo.Node")),
            FieldDescriptor::new("Peers", TypeDesc::seq(TypeDesc::message("demo.Node"))),
        ],
    ));
    let bridge = Bridge::new(Arc::new(messages));
    let lua = Lua::new();
    bridge.install(&lua, "Message").unwrap();
    bridge.register_package_messages(&lua, "demo").unwrap();

    let (linked, back_link, peer_link, text): (String, bool, bool, String) = lua
        .load(
            r#"
            local a = Node.New({Name = "a"})
            local b = Node.New({Name = "b"})
            local c = Node.New({Name = "c"})
            a.Next = b
            b.Next = c
            c.Next = a
            c.Peers = {b}
            return a.Next.Next.Name, c.Next == nil, #c.Peers == 0, tostring(a)
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(linked, "c");
    assert!(back_link);
    assert!(peer_link);
    assert!(text.contains("\"a\""), "{text}");
    assert!(text.contains("\"c\""), "{text}");
}

#[test]
fn test_generic_factory() {
    let (_, lua) = setup();
    let (name, missing, err): (String, bool, String) = lua
        .load(
            r#"
            local t, e1 = Message.New("demo.Task", {Name = "generic"})
            local none, e2 = Message.New("demo.Nope")
            return t.Name, none == nil, e2
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(name, "generic");
    assert!(missing);
    assert_eq!(err, "invalid message type: demo.Nope");
}

#[test]
fn test_tostring_truncates_copy_only() {
    let (_, lua) = setup();
    let (rendered, len): (String, i64) = lua
        .load(
            r#"
            local t = Task.New({Name = string.rep("x", 2000)})
            local text = tostring(t)
            return text, #t.Name
            "#,
        )
        .eval()
        .unwrap();
    assert!(rendered.starts_with("<Message: demo.Task> "));
    let truncated = format!("\"{}......\"", "x".repeat(1024));
    assert!(rendered.contains(&truncated));
    assert!(!rendered.contains(&"x".repeat(1025)));
    assert_eq!(len, 2000);
}

#[test]
fn test_custom_render_options() {
    let bridge = Bridge::new(Arc::new(registry())).with_render_options(RenderOptions {
        limit: 4,
        marker: "~".into(),
    });
    let lua = Lua::new();
    bridge.install(&lua, "Message").unwrap();
    bridge.register_package_messages(&lua, "demo").unwrap();
    let rendered: String = lua
        .load("return tostring(Task.New({Name = 'abcdefgh'}))")
        .eval()
        .unwrap();
    assert!(rendered.contains("\"abcd~\""));
}

#[test]
fn test_message_passed_to_host_function() {
    let (bridge, lua) = setup();
    let mut functions = FunctionRegistry::new();
    functions.register("tasks", "rename", |task: MessageRef, name: String| {
        task.lock().set_raw("Name", Value::Text(name));
        task
    });
    bridge
        .install_package(&lua, "tasks", &functions.package("tasks"))
        .unwrap();

    let (returned, name): (String, String) = lua
        .load(
            r#"
            local t = Task.New()
            local r = tasks.rename(t, "renamed")
            return r.Name, t.Name
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(returned, "renamed");
    assert_eq!(name, "renamed");
}
