// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for sharefs CLI

pub mod config;
pub mod scripts;
pub mod synth;

pub use self::config::ConfigCommand;
pub use self::scripts::ScriptsCommand;
pub use self::synth::SynthCommand;
