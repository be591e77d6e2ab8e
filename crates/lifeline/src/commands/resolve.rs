//! `lifeline resolve`: look up the app installed at the configured location

use crate::cli::OutputFormat;
use anyhow::Result;
use lifeline_core::config::RunConfig;
use lifeline_core::platform::PlatformClient;
use lifeline_core::process::SystemRunner;
use lifeline_core::resolver::{resolve, AppHandle};
use std::sync::Arc;

pub async fn execute(config: &RunConfig, output: OutputFormat) -> Result<()> {
    let platform = PlatformClient::from_config(Arc::new(SystemRunner), config)?;
    let handle = resolve(&platform, &config.location).await?;
    println!("{}", render(&handle, output)?);
    Ok(())
}

fn render(handle: &AppHandle, output: OutputFormat) -> Result<String> {
    Ok(match output {
        OutputFormat::Json => serde_json::to_string_pretty(handle)?,
        OutputFormat::Text => format!("{}\t{}\t{}", handle.id, handle.location, handle.fqdn),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> AppHandle {
        AppHandle {
            id: "7f3c".to_string(),
            location: "test".to_string(),
            fqdn: "test.example.com".to_string(),
        }
    }

    #[test]
    fn test_text_is_tab_separated() {
        assert_eq!(
            render(&handle(), OutputFormat::Text).unwrap(),
            "7f3c\ttest\ttest.example.com"
        );
    }

    #[test]
    fn test_json_carries_all_fields() {
        let json: serde_json::Value =
            serde_json::from_str(&render(&handle(), OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["id"], "7f3c");
        assert_eq!(json["location"], "test");
        assert_eq!(json["fqdn"], "test.example.com");
    }
}
