//! `toonlate config`: show the effective configuration.

use super::AppContext;
use crate::cli::icons;
use crate::config::Config;
use crate::credentials::mask_credential;

/// Copy of the config with every credential masked.
fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    for keys in config.credentials.values_mut() {
        *keys = keys.iter().map(|k| mask_credential(k)).collect();
    }
    config
}

pub fn cmd_config_show(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let config = masked(&ctx.config);
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}

pub fn cmd_config_path(ctx: &AppContext) -> anyhow::Result<()> {
    match &ctx.config.source_path {
        Some(path) => println!("{}", path.display()),
        None => println!("{} No config file found; using defaults", icons::warn()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_every_key() {
        let mut config = Config::default();
        config.credentials.insert(
            "vision".to_string(),
            vec!["AIzaSyABCDEFGH1234".to_string(), "tiny".to_string()],
        );
        let shown = masked(&config);
        assert_eq!(shown.credentials["vision"], vec!["AIza…1234", "****"]);
        let text = toml::to_string_pretty(&shown).unwrap();
        assert!(!text.contains("AIzaSyABCDEFGH1234"));
    }
}
