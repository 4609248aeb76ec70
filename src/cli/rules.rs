//! `craftcheck rules`

use anyhow::{Context, Result};
use craftcheck::{AnalysisConfig, RuleRegistry};

pub fn run(config: &AnalysisConfig) -> Result<()> {
    let registry = RuleRegistry::builtin();
    let catalog = registry.catalog();
    let resolved = config
        .resolve(&catalog)
        .context("Invalid configuration")?;

    for info in &catalog {
        let state = if resolved.is_enabled(info.id) { "on" } else { "off" };
        println!("{:<22} {:<12} {:<4} {}", info.id, info.category.to_string(), state, info.description);
        for spec in info.thresholds {
            let value = resolved.threshold(info.id, spec.name).unwrap_or(spec.default);
            println!("{:<22}   {} = {} (default {})", "", spec.name, value, spec.default);
        }
    }
    Ok(())
}
