// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the Lustre client installer
//!
//! These tests verify:
//! 1. Kernel classification agrees with the rendered boot-time check
//! 2. Old kernels are updated and rebooted, every kernel gets the client
//! 3. Boot commands after the installer still run on the update path
//! 4. Kernels from other distributions abort the boot script
//! 5. Distributions without a known procedure are refused up front
//!
//! The rendered commands are executed by bash with `uname`, `yum`, `reboot`
//! and `amazon-linux-extras` replaced by functions that echo their calls.

use sharefs_core::application::lustre_installer::LustreInstaller;
use sharefs_core::domain::lustre::{
    compare_kernel_versions, InstallerError, KernelAction, KernelArch, LustreDistribution, VersionError,
};
use std::cmp::Ordering;
use std::process::Command;

const STUBS: &str = r#"uname() { echo "$FAKE_KERNEL"; }
yum() { echo "yum $*"; }
reboot() { echo "reboot"; }
amazon-linux-extras() { echo "amazon-linux-extras $*"; }
"#;

/// Run the installer followed by `trailing` against a faked kernel,
/// returning (exit code, stdout)
fn run_boot_script(kernel: &str, trailing: &[&str]) -> Option<(i32, String)> {
    let installer = LustreInstaller::new(LustreDistribution::AmazonLinux2).unwrap();
    let mut commands = installer.install_commands().unwrap();
    commands.extend(trailing.iter().map(|c| c.to_string()));
    let script = format!("{}{}\n", STUBS, commands.join("\n"));

    let output = match Command::new("bash").arg("-c").arg(&script).env("FAKE_KERNEL", kernel).output() {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Skipping: bash unavailable ({})", e);
            return None;
        }
    };
    Some((
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    ))
}

fn run_installer(kernel: &str) -> Option<(i32, String)> {
    run_boot_script(kernel, &[])
}

#[test]
fn test_classification_matches_boot_script() {
    let installer = LustreInstaller::new(LustreDistribution::AmazonLinux2).unwrap();
    let requirement = installer.requirement();

    let cases = [
        ("4.14.104-95.84.amzn2.x86_64", KernelArch::X86_64, KernelAction::InstallClient),
        ("4.14.77-86.82.amzn2.x86_64", KernelArch::X86_64, KernelAction::UpdateKernelAndReboot),
        ("4.14.200-116.320.amzn2.x86_64", KernelArch::X86_64, KernelAction::InstallClient),
        ("4.14.181-142.260.amzn2.aarch64", KernelArch::Aarch64, KernelAction::InstallClient),
        ("4.14.146-119.123.amzn2.aarch64", KernelArch::Aarch64, KernelAction::UpdateKernelAndReboot),
    ];

    for (kernel, arch, action) in cases {
        let classified = requirement.classify(LustreDistribution::AmazonLinux2, kernel).unwrap();
        assert_eq!(classified, (arch, action), "kernel {}", kernel);

        let Some((code, stdout)) = run_installer(kernel) else {
            continue;
        };
        assert_eq!(code, 0, "kernel {}", kernel);
        match action {
            KernelAction::InstallClient => {
                assert_eq!(stdout.trim(), "amazon-linux-extras install -y lustre2.10");
            }
            KernelAction::UpdateKernelAndReboot => {
                assert_eq!(
                    stdout.trim(),
                    "yum -y update kernel\nreboot\namazon-linux-extras install -y lustre2.10"
                );
            }
        }
    }
}

#[test]
fn test_kernel_update_does_not_end_boot_script() {
    let Some((code, stdout)) = run_boot_script("4.14.77-86.82.amzn2.x86_64", &["echo mount-bundle"]) else {
        return;
    };

    assert_eq!(code, 0);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "yum -y update kernel",
            "reboot",
            "amazon-linux-extras install -y lustre2.10",
            "mount-bundle",
        ]
    );
}

#[test]
fn test_foreign_kernel_aborts() {
    let kernel = "5.10.1-1.1.amzn2.x86_64";
    let installer = LustreInstaller::new(LustreDistribution::AmazonLinux2).unwrap();

    let err = installer
        .requirement()
        .classify(LustreDistribution::AmazonLinux2, kernel)
        .unwrap_err();
    assert!(matches!(err, InstallerError::WrongDistribution { .. }));

    if let Some((code, stdout)) = run_installer(kernel) {
        assert_eq!(code, 1);
        assert!(stdout.is_empty());
    }
}

#[test]
fn test_version_comparison() {
    assert_eq!(
        compare_kernel_versions("4.14.77-86.82.amzn2.x86_64", "4.14.104-95.84.amzn2.x86_64").unwrap(),
        Ordering::Less
    );
    assert_eq!(
        compare_kernel_versions("4.14.181-142.260.amzn2.aarch64", "4.14.181-142.260.amzn2.aarch64").unwrap(),
        Ordering::Equal
    );
    assert!(matches!(
        compare_kernel_versions("4.14.181-142.260", "4.14.181-142.260.amzn2.aarch64"),
        Err(VersionError::ComponentCountMismatch {
            left_len: 5,
            right_len: 7,
            ..
        })
    ));
}

#[test]
fn test_unsupported_distributions_are_refused() {
    for distribution in LustreDistribution::all() {
        let result = LustreInstaller::new(*distribution);
        if *distribution == LustreDistribution::AmazonLinux2 {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(InstallerError::DistributionNotSupported(d)) if d == *distribution));
        }
    }
}
