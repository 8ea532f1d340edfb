//! `toonlate extract`: parse a saved model response offline.

use std::path::PathBuf;

use tokio::io::AsyncReadExt;

use crate::cli::icons;
use crate::extract;

async fn read_input(file: Option<PathBuf>) -> anyhow::Result<String> {
    match file {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
        _ => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            Ok(raw)
        }
    }
}

pub async fn cmd_extract(
    file: Option<PathBuf>,
    compact: bool,
    diagnostics: bool,
) -> anyhow::Result<()> {
    let raw = read_input(file).await?;
    let extraction = extract::extract_with_diagnostics(&raw);

    let json = if compact {
        serde_json::to_string(&extraction.report)?
    } else {
        serde_json::to_string_pretty(&extraction.report)?
    };
    println!("{}", json);

    if diagnostics {
        if extraction.is_clean() {
            eprintln!("{} Parsed without fallbacks", icons::success());
        } else {
            for degradation in &extraction.degradations {
                eprintln!("{} {}", icons::warn(), degradation);
            }
        }
    }
    Ok(())
}
