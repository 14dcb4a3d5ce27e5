// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn ctx() -> TemplateContext {
    TemplateContext::new(
        json!({"docker": {"network": {"interface": "172.18.0.1"}}, "api": {"port": 8080}}),
        json!({
            "uuid": "abc",
            "build": {"memory": 1024, "env": {"SERVER_JARFILE": "server.jar"}},
            "allocations": {"default": {"ip": "10.0.0.5", "port": 25565}}
        }),
    )
}

#[parameterized(
    config_path = { "{{config.docker.network.interface}}", "172.18.0.1" },
    config_number = { "{{config.api.port}}", "8080" },
    server_env = { "{{server.build.env.SERVER_JARFILE}}", "server.jar" },
    allocation_ip = { "{{server.allocations.default.ip}}", "10.0.0.5" },
    allocation_port = { "{{server.allocations.default.port}}", "25565" },
    embedded = { "host={{server.allocations.default.ip}}:{{server.allocations.default.port}}", "host=10.0.0.5:25565" },
    whitespace = { "{{ server.build.memory }}", "1024" },
    unknown = { "{{server.no.such.path}}", "" },
    no_placeholder = { "plain text", "plain text" },
)]
fn renders_placeholders(input: &str, expected: &str) {
    let value = Scalar::String(input.to_string());
    assert_eq!(ctx().render(&value), expected);
}

#[test]
fn non_string_scalars_render_canonically() {
    assert_eq!(ctx().render(&Scalar::Int(42)), "42");
    assert_eq!(ctx().render(&Scalar::Bool(true)), "true");
}
