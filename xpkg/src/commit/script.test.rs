use assert2::check;

use super::*;

#[test]
fn null_script_runner_always_succeeds() {
    let mut runner = NullScriptRunner;
    let args = ScriptArgs {
        kind: ScriptKind::Install,
        action: ScriptAction::Pre,
        pkgname: "foo",
        version: "1.0_1",
        update: false,
        cross: false,
        arch: "x86_64",
    };
    check!(runner.run(Path::new("/"), b"#!/bin/sh\nexit 1\n", args).is_ok());
}

#[test]
fn script_action_as_str() {
    check!(ScriptAction::Pre.as_str() == "pre");
    check!(ScriptAction::Post.as_str() == "post");
    check!(ScriptAction::Purge.as_str() == "purge");
}
