mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding `data_dir`.
pub const DATA_DIR_ENV: &str = "RENDITION_DATA_DIR";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    prepare_config(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./rendition.toml",
        "~/.config/rendition/config.toml",
        "/etc/rendition/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    prepare_config(&mut config);
    Ok(config)
}

fn prepare_config(config: &mut Config) {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            config.data_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        }
    }

    let ladder = &mut config.renditions.ladder;
    ladder.sort_unstable_by(|a, b| b.cmp(a));
    ladder.dedup();
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.scheduler.max_concurrent == 0 {
        anyhow::bail!("scheduler.max_concurrent must be at least 1");
    }

    if config.scheduler.tick_secs == 0 {
        anyhow::bail!("scheduler.tick_secs must be at least 1");
    }

    if config.renditions.ladder.is_empty() {
        anyhow::bail!("renditions.ladder cannot be empty");
    }

    for &height in &config.renditions.ladder {
        if height == 0 || height % 2 != 0 {
            anyhow::bail!("Ladder height {} must be even and non-zero", height);
        }
    }

    if config.renditions.audio_kbps == 0 {
        anyhow::bail!("renditions.audio_kbps cannot be 0");
    }

    if config.events.subscriber_capacity == 0 {
        anyhow::bail!("events.subscriber_capacity cannot be 0");
    }

    if !config.renditions.ladder.contains(&config.scheduler.reference_video_height) {
        tracing::warn!(
            "Reference height {} is not on the ladder; no job will be prioritised for it",
            config.scheduler.reference_video_height
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_defaults() {
        std::env::remove_var(DATA_DIR_ENV);
        let config = load_config(write_config("").path()).unwrap();
        assert_eq!(config.scheduler.max_concurrent, 2);
        assert_eq!(config.scheduler.tick_secs, 10);
        assert_eq!(config.scheduler.reference_video_height, 480);
        assert_eq!(config.renditions.ladder, vec![1080, 720, 480, 360, 240, 144]);
        assert_eq!(config.renditions.policy, LadderPolicy::BestFit);
        assert_eq!(config.encoder.crf, 23);
        assert_eq!(config.encoder.preset, "veryfast");
        assert_eq!(config.events.subscriber_capacity, 64);
        assert_eq!(config.database_path(), PathBuf::from("data/rendition.db"));
    }

    #[test]
    #[serial]
    fn test_partial_sections_and_ladder_normalisation() {
        std::env::remove_var(DATA_DIR_ENV);
        let file = write_config(
            r#"
data_dir = "/srv/media"

[renditions]
ladder = [240, 720, 480, 720]
policy = "full-ladder"

[encoder]
crf = 20
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.renditions.ladder, vec![720, 480, 240]);
        assert_eq!(config.renditions.policy, LadderPolicy::FullLadder);
        assert_eq!(config.encoder.crf, 20);
        assert_eq!(config.encoder.preset, "veryfast");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/media/rendition.db")
        );
    }

    #[test]
    #[serial]
    fn test_data_dir_env_override() {
        std::env::set_var(DATA_DIR_ENV, "/tmp/rendition-env");
        let config = load_config(write_config("data_dir = \"/ignored\"").path()).unwrap();
        std::env::remove_var(DATA_DIR_ENV);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/rendition-env"));
    }

    #[test]
    #[serial]
    fn test_rejects_invalid_values() {
        std::env::remove_var(DATA_DIR_ENV);
        for contents in [
            "[scheduler]\nmax_concurrent = 0",
            "[scheduler]\ntick_secs = 0",
            "[renditions]\nladder = []",
            "[renditions]\nladder = [721]",
            "[renditions]\naudio_kbps = 0",
            "[events]\nsubscriber_capacity = 0",
        ] {
            let file = write_config(contents);
            assert!(load_config(file.path()).is_err(), "accepted: {contents}");
        }
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_config(Path::new("/no/such/rendition.toml")).is_err());
    }
}
