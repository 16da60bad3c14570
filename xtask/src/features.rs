use std::process::Command;

use anyhow::{Context, Result};

/// Packages and the feature sets each must compile with
const FEATURE_COMBINATIONS: &[(&str, &[&str])] = &[
    ("tokenrelay-core", &[]),
    ("tokenrelay-core", &["test-utils"]),
    ("tokenrelay-infra", &[]),
];

/// Check that all required feature combinations compile successfully.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, (package, features)) in FEATURE_COMBINATIONS.iter().enumerate() {
        let joined = features.join(",");
        let display_label =
            if features.is_empty() { format!("{package} (default)") } else { format!("{package} [{joined}]") };

        println!("\n[{}/{}] cargo check -p {display_label}", index + 1, FEATURE_COMBINATIONS.len());

        let mut command = Command::new("cargo");
        command.arg("check").arg("-p").arg(package);
        if !features.is_empty() {
            command.arg("--features").arg(&joined);
        }

        let status = command
            .status()
            .with_context(|| format!("Failed to run cargo check for '{display_label}'"))?;

        if !status.success() {
            anyhow::bail!("Feature combination '{display_label}' failed to compile");
        }

        println!("✅ {display_label} compiled successfully");
    }

    println!("\n✅ All {} feature combinations compile successfully!", FEATURE_COMBINATIONS.len());

    Ok(())
}
