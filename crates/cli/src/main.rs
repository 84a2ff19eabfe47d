// Copyright 2025 EcoCompute Contributors
// SPDX-License-Identifier: Apache-2.0

//! EcoCompute CLI entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    match ecocompute_cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
