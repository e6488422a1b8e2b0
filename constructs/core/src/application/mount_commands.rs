// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mount Command Composition
//!
//! Every filesystem backend mounts the same way: stage its script bundle
//! through the stack's asset cache, grant the target read access, open the
//! filesystem port to the target, then append install commands followed by
//! the download/extract/invoke/cleanup sequence to the target's boot script.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Shared boot-command sequence for bundle-driven mounts

use std::borrow::Cow;
use std::sync::Arc;

use crate::domain::asset::AssetHandle;
use crate::domain::filesystem::{require_linux, FilesystemError, FilesystemKind};
use crate::domain::instance::InstanceId;
use crate::domain::network::{Port, SecurityGroupRef};
use crate::domain::stack::Stack;
use crate::infrastructure::scripts::ScriptBundle;

/// Quote a single argument for bash.
///
/// Tokens made only of `[A-Za-z0-9_./:,=@%+-]` pass through unchanged;
/// anything else is wrapped in single quotes.
pub fn shell_quote(arg: &str) -> Cow<'_, str> {
    if arg.is_empty() {
        return Cow::Borrowed("''");
    }

    let safe = arg.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | ':' | ',' | '=' | '@' | '%' | '+' | '-')
    });
    if safe {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}

/// `bash <script> <args...>` with every argument quoted
pub fn invoke_command<S: AsRef<str>>(script: &str, args: &[S]) -> String {
    let mut command = format!("bash {}", script);
    for arg in args {
        command.push(' ');
        command.push_str(&shell_quote(arg.as_ref()));
    }
    command
}

/// Download, extract, invoke and clean up a bundle script inside a fresh
/// temporary directory.
pub fn bundle_commands<S: AsRef<str>>(handle: &AssetHandle, script: &str, args: &[S]) -> Vec<String> {
    let archive = shell_quote(handle.file_name()).into_owned();
    vec![
        "TMPDIR=$(mktemp -d)".to_string(),
        "pushd \"$TMPDIR\"".to_string(),
        format!("aws s3 cp {} {}", shell_quote(&handle.s3_url()), archive),
        format!("tar -xf {}", archive),
        invoke_command(&format!("./{}", script), args),
        "popd".to_string(),
        format!("rm -f \"${{TMPDIR}}/{}\"", handle.file_name()),
    ]
}

/// Download and extract a bundle into the directory named by `dir_variable`
/// without invoking anything. Later commands call scripts from that directory.
pub fn fetch_commands(handle: &AssetHandle, dir_variable: &str) -> Vec<String> {
    let archive = format!("\"${{{}}}/{}\"", dir_variable, handle.file_name());
    vec![
        format!("{}=$(mktemp -d)", dir_variable),
        format!("aws s3 cp {} {}", shell_quote(&handle.s3_url()), archive),
        format!("tar -xf {} -C \"${{{}}}\"", archive, dir_variable),
        format!("rm -f {}", archive),
    ]
}

/// Stage a bundle for `stack` and grant `target` read access to it
pub fn stage_bundle(
    stack: &mut Stack,
    target: &InstanceId,
    bundle: ScriptBundle,
) -> Result<Arc<AssetHandle>, FilesystemError> {
    let bucket = stack.asset_bucket().to_string();
    let handle = stack.stage_asset(bundle.key(), || bundle.package(&bucket))?;
    handle.grant_read(stack.instance_mut(target)?.role_mut());
    Ok(handle)
}

/// Everything a backend contributes to one mount
#[derive(Debug, Clone)]
pub struct BundleMount {
    pub kind: FilesystemKind,
    pub bundle: ScriptBundle,
    pub script: &'static str,
    pub args: Vec<String>,
    /// Client installation commands, run before the bundle
    pub install_commands: Vec<String>,
    /// Filesystem endpoint the target must reach, if any
    pub ingress: Option<(SecurityGroupRef, Port)>,
}

/// Apply a bundle mount to `target`.
///
/// The Linux precondition and asset staging both run before the boot script
/// or the network policy is touched.
pub fn mount_with_bundle(
    stack: &mut Stack,
    target: &InstanceId,
    mount: BundleMount,
) -> Result<(), FilesystemError> {
    require_linux(stack, target, mount.kind)?;
    let handle = stage_bundle(stack, target, mount.bundle)?;

    if let Some((destination, port)) = &mount.ingress {
        let source = stack.instance(target)?.network_identity().clone();
        stack.network_policy_mut().allow(&source, destination, *port);
    }

    let user_data = stack.instance_mut(target)?.user_data_mut();
    user_data.add_commands(mount.install_commands);
    user_data.add_commands(bundle_commands(&handle, mount.script, &mount.args));

    tracing::debug!(instance = %target, script = %mount.script, kind = %mount.kind, "Appended mount commands");
    Ok(())
}
