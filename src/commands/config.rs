use crate::cli::ConfigCommand;
use crate::config::Config;
use crate::ui;
use anyhow::Result;

pub async fn execute(action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Get { key } => get_config_value(key),
        ConfigCommand::Set { key, value } => set_config_value(key, value),
        ConfigCommand::List => list_config(),
    }
}

fn get_config_value(key: String) -> Result<()> {
    let config = Config::load()?;

    match key.as_str() {
        "api_url" | "api-url" => ui::info(&config.api_url),
        "session_id" | "session-id" => ui::info(&config.effective_session_id()),
        "part_concurrency" | "part-concurrency" => {
            ui::info(&config.effective_part_concurrency().to_string())
        }
        "max_file_size_bytes" | "max-file-size-bytes" => {
            ui::info(&config.effective_max_file_size().to_string())
        }
        _ => anyhow::bail!(
            "Unknown config key: {}. Valid keys: api_url, session_id, part_concurrency, max_file_size_bytes",
            key
        ),
    }

    Ok(())
}

fn set_config_value(key: String, value: String) -> Result<()> {
    let mut config = Config::load()?;

    match key.as_str() {
        "api_url" | "api-url" => {
            config.api_url = value.clone();
        }
        "session_id" | "session-id" => {
            config.session_id = Some(value.clone());
        }
        "part_concurrency" | "part-concurrency" => {
            let parsed: usize = value
                .parse()
                .map_err(|_| anyhow::anyhow!("part_concurrency must be a positive integer"))?;
            anyhow::ensure!(parsed > 0, "part_concurrency must be a positive integer");
            config.part_concurrency = Some(parsed);
        }
        "max_file_size_bytes" | "max-file-size-bytes" => {
            let parsed: u64 = value
                .parse()
                .map_err(|_| anyhow::anyhow!("max_file_size_bytes must be an integer"))?;
            config.max_file_size_bytes = Some(parsed);
        }
        _ => anyhow::bail!(
            "Unknown config key: {}. Valid keys: api_url, session_id, part_concurrency, max_file_size_bytes",
            key
        ),
    }

    config.save_config()?;
    ui::info(&format!("Set {key} = {value}"));
    Ok(())
}

fn list_config() -> Result<()> {
    let config = Config::load()?;
    ui::info(&format!("api_url = {}", config.api_url));
    ui::info(&format!("session_id = {}", config.effective_session_id()));
    ui::info(&format!(
        "part_concurrency = {}",
        config.effective_part_concurrency()
    ));
    ui::info(&format!(
        "max_file_size_bytes = {}",
        config.effective_max_file_size()
    ));
    Ok(())
}
