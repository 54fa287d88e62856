//! Documentation generation for bridged packages
//!
//! Produces LuaLS definition stubs (`---@class`, `---@param`, `---@return`)
//! and Markdown reference pages from function metadata and the message
//! registry.

use std::collections::BTreeMap;
use std::fmt::Write;

use mals_sdk::{short_name, FunctionMetadata, MessageRegistry, TypeDesc};

/// Group used for functions without a help group
pub const DEFAULT_GROUP: &str = "basic";

/// Lua-facing type tag of a host type
pub fn lua_type(ty: &TypeDesc) -> String {
    match ty {
        TypeDesc::Int | TypeDesc::Float => "number".into(),
        TypeDesc::Bool => "boolean".into(),
        TypeDesc::Text | TypeDesc::Bytes => "string".into(),
        TypeDesc::Seq(elem) if **elem == TypeDesc::Text => "table<string>".into(),
        TypeDesc::Seq(_) | TypeDesc::Map(_, _) => "table".into(),
        TypeDesc::Message(Some(name)) => short_name(name).to_string(),
        TypeDesc::Callable => "function".into(),
        TypeDesc::Context => "context".into(),
        _ => "any".into(),
    }
}

fn group_functions<'a>(
    functions: &'a [FunctionMetadata],
    package: &str,
) -> BTreeMap<&'a str, Vec<&'a FunctionMetadata>> {
    let mut groups: BTreeMap<&str, Vec<&FunctionMetadata>> = BTreeMap::new();
    for function in functions.iter().filter(|f| f.package == package) {
        let group = function.group.as_deref().unwrap_or(DEFAULT_GROUP);
        groups.entry(group).or_default().push(function);
    }
    for members in groups.values_mut() {
        members.sort_by(|a, b| a.function.cmp(&b.function));
    }
    groups
}

fn param_names(function: &FunctionMetadata) -> Vec<String> {
    let inputs = function.help.as_ref().map(|h| h.inputs.as_slice()).unwrap_or(&[]);
    (0..function.params.len())
        .map(|i| match inputs.get(i) {
            Some(pair) if !pair.name.is_empty() => pair.name.clone(),
            _ => format!("arg{}", i + 1),
        })
        .collect()
}

fn push_lines(out: &mut String, prefix: &str, text: &str) {
    for line in text.lines() {
        let _ = writeln!(out, "{prefix}{line}");
    }
}

// ============================================================================
// Lua definitions
// ============================================================================

/// `---@class` block for every message type of `package`
pub fn message_classes(messages: &MessageRegistry, package: &str) -> String {
    let mut out = String::new();
    for ty in messages.package_types(package) {
        let descriptor = ty.descriptor();
        let _ = writeln!(out, "--- @class {}", descriptor.short_name());
        for field in descriptor.fields() {
            let _ = writeln!(out, "--- @field {} {}", field.name(), lua_type(field.ty()));
        }
        out.push('\n');
    }
    out
}

/// LuaLS definition file for `package`
pub fn generate_definitions(
    functions: &[FunctionMetadata],
    messages: &MessageRegistry,
    package: &str,
) -> String {
    let mut out = String::from("--- @meta\n\n");
    out.push_str(&message_classes(messages, package));

    if functions.iter().any(|f| f.package == package) {
        let _ = writeln!(out, "{package} = {{}}\n");
    }

    for (group, members) in group_functions(functions, package) {
        let _ = writeln!(out, "-- Group: {group}\n");
        for function in members {
            let _ = writeln!(out, "--- {}", function.function);
            let names = param_names(function);

            if let Some(help) = &function.help {
                if !help.short.is_empty() {
                    push_lines(&mut out, "--- ", &help.short);
                    out.push_str("---\n");
                }
                if !help.long.is_empty() {
                    push_lines(&mut out, "--- ", &help.long);
                    out.push_str("---\n");
                }
                if !help.example.is_empty() {
                    out.push_str("--- @example\n");
                    push_lines(&mut out, "--- ", &help.example);
                    out.push_str("---\n");
                }
            }

            let inputs = function.help.as_ref().map(|h| h.inputs.as_slice()).unwrap_or(&[]);
            for (i, ty) in function.params.iter().enumerate() {
                match inputs.get(i) {
                    Some(pair) if !pair.description.is_empty() => {
                        let _ = writeln!(out, "--- @param {} {} {}", names[i], lua_type(ty), pair.description);
                    }
                    _ => {
                        let _ = writeln!(out, "--- @param {} {}", names[i], lua_type(ty));
                    }
                }
            }
            if function.expects_callback {
                out.push_str("--- @param callback? function\n");
            }

            let outputs = function.help.as_ref().map(|h| h.outputs.as_slice()).unwrap_or(&[]);
            for (i, ty) in function.returns.iter().enumerate() {
                match outputs.get(i) {
                    Some(pair) if !pair.name.is_empty() => {
                        let _ = writeln!(out, "--- @return {} {} {}", lua_type(ty), pair.name, pair.description);
                    }
                    _ => {
                        let _ = writeln!(out, "--- @return {}", lua_type(ty));
                    }
                }
            }

            let mut params = names;
            if function.expects_callback {
                params.push("callback".into());
            }
            let _ = writeln!(
                out,
                "function {package}.{}({}) end\n",
                function.function,
                params.join(", ")
            );
        }
    }
    out
}

// ============================================================================
// Markdown
// ============================================================================

/// Markdown reference page for `package`
pub fn generate_markdown(functions: &[FunctionMetadata], package: &str) -> String {
    let mut out = String::new();
    for (group, members) in group_functions(functions, package) {
        let _ = writeln!(out, "## {group}\n");
        for function in members {
            let _ = writeln!(out, "### {}\n", function.function);

            if let Some(help) = &function.help {
                if !help.short.is_empty() {
                    let _ = writeln!(out, "{}\n", help.short);
                }
                if !help.long.is_empty() {
                    push_lines(&mut out, "", &help.long);
                    out.push('\n');
                }
            }

            if !function.params.is_empty() {
                out.push_str("**Arguments**\n\n");
                let inputs = function.help.as_ref().map(|h| h.inputs.as_slice());
                for (i, ty) in function.params.iter().enumerate() {
                    match inputs {
                        None => {
                            let _ = writeln!(out, "- `${}` [{}]", i + 1, lua_type(ty));
                        }
                        Some(inputs) => {
                            let (name, description) = match inputs.get(i) {
                                Some(pair) if !pair.name.is_empty() => {
                                    (pair.name.clone(), pair.description.as_str())
                                }
                                Some(pair) => (format!("${}", i + 1), pair.description.as_str()),
                                None => (format!("${}", i + 1), ""),
                            };
                            let _ = writeln!(out, "- `{name}` [{}] - {description}", lua_type(ty));
                        }
                    }
                }
                out.push('\n');
            }

            if let Some(help) = function.help.as_ref().filter(|h| !h.example.is_empty()) {
                out.push_str("**Example**\n\n```lua\n");
                push_lines(&mut out, "", &help.example);
                out.push_str("```\n\n");
            }
        }
    }
    out
}
