use clap::Subcommand;
use onepomodoro_core::{Config, ConfigError};
use serde_json::json;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting, e.g. `durations.focus_minutes`
    Get { key: String },
    /// Change one setting and save it
    Set { key: String, value: String },
    /// Print every setting
    List,
    /// Restore the default interval lengths and notification settings
    Reset,
}

/// The settings as written plus the interval lengths the timer will use.
fn describe(config: &Config) -> serde_json::Value {
    json!({
        "durations": config.durations,
        "notifications": config.notifications,
        "effective": config.durations(),
    })
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match action {
        ConfigAction::Reset => Config::default(),
        _ => Config::load()?,
    };

    match action {
        ConfigAction::Get { key } => {
            let value = config.get(&key).ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            tracing::info!(%key, %value, "config updated");
            println!("{}", serde_json::to_string_pretty(&describe(&config))?);
        }
        ConfigAction::List => {
            println!("{}", serde_json::to_string_pretty(&describe(&config))?);
        }
        ConfigAction::Reset => {
            config.save()?;
            println!("{}", serde_json::to_string_pretty(&describe(&config))?);
        }
    }
    Ok(())
}
