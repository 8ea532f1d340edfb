//! `toonlate keys`: credential pool inspection.

use console::style;

use super::AppContext;
use crate::cli::icons;
use crate::credentials::{CredentialError, DRIVE_SCOPE, VISION_SCOPE};

pub async fn cmd_keys_list(ctx: &AppContext, scopes: Vec<String>) -> anyhow::Result<()> {
    let scopes = if scopes.is_empty() {
        vec![VISION_SCOPE.to_string(), DRIVE_SCOPE.to_string()]
    } else {
        scopes
    };

    for scope in &scopes {
        if let Err(e) = ctx.credentials.initialize(scope).await {
            println!("{} {}: {}", icons::error(), style(scope).bold(), e);
            continue;
        }
        let masked = ctx.credentials.masked_credentials(scope).unwrap_or_default();
        if masked.is_empty() {
            println!("{} {}: no keys configured", icons::warn(), style(scope).bold());
            continue;
        }
        println!(
            "{} {}: {} key(s)",
            icons::success(),
            style(scope).bold(),
            masked.len()
        );
        for (i, key) in masked.iter().enumerate() {
            println!("  {} [{}] {}", icons::bullet(), i, key);
        }
    }
    Ok(())
}

pub async fn cmd_keys_stats(
    ctx: &AppContext,
    scope: &str,
    draws: usize,
    json: bool,
) -> anyhow::Result<()> {
    ctx.credentials.initialize(scope).await?;
    for _ in 0..draws {
        match ctx.credentials.next(scope).await {
            Ok(_) => {}
            Err(CredentialError::NoCredentials(_)) => break,
            Err(e) => return Err(e.into()),
        }
    }

    let stats = ctx
        .credentials
        .usage_stats(scope)
        .ok_or_else(|| anyhow::anyhow!("Scope '{}' is not loaded", scope))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let masked = ctx.credentials.masked_credentials(scope).unwrap_or_default();
    println!("{} {}", icons::info(), style(&stats.scope).bold());
    println!("  Keys:        {}", stats.count);
    println!("  Total usage: {}", stats.total_usage);
    println!("  Loaded at:   {}", stats.loaded_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for (key, used) in masked.iter().zip(&stats.per_credential_usage) {
        println!("  {} {} {}", icons::bullet(), key, style(used).dim());
    }
    Ok(())
}
