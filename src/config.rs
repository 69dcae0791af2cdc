use serde::Deserialize;

use crate::error::{RecError, Result};
use crate::mapping::ItemId;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KnnConfig {
    /// neighbors retained per target user
    pub k: usize,
    pub rec_length: usize,
    pub user_bias: bool,
    pub item_bias: bool,
    pub normalize: bool,
    pub num_workers: usize,
    /// Drop zero-valued entries from the top-k rows instead of keeping exactly
    /// `k` entries per row.
    pub prune_zero_neighbors: bool,
    /// Popularity-ranked items used to pad recommendation lists.
    pub fallback_pool: Vec<ItemId>,
    pub output: OutputFormat,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            k: 60,
            rec_length: 5,
            user_bias: true,
            item_bias: true,
            normalize: true,
            num_workers: 4,
            prune_zero_neighbors: false,
            fallback_pool: Vec::new(),
            output: OutputFormat::default(),
        }
    }
}

impl KnnConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| RecError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(RecError::Config("`k` must be positive".to_string()));
        }
        if self.rec_length == 0 {
            return Err(RecError::Config("`rec_length` must be positive".to_string()));
        }
        if self.num_workers == 0 {
            return Err(RecError::Config("`num_workers` must be positive".to_string()));
        }
        Ok(())
    }
}

/// Layout of the submission file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputFormat {
    pub user_caption: String,
    pub rec_item_caption: String,
    pub user_items_sep: String,
    pub item_item_sep: String,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            user_caption: "user_id".to_string(),
            rec_item_caption: "recommended_items".to_string(),
            user_items_sep: ",".to_string(),
            item_item_sep: "\t".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KnnConfig::default();
        assert_eq!(config.k, 60);
        assert_eq!(config.rec_length, 5);
        assert!(config.user_bias && config.item_bias && config.normalize);
        assert_eq!(config.num_workers, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides() -> Result<()> {
        let config = KnnConfig::from_toml_str(
            r#"
            k = 10
            normalize = false
            fallback_pool = [3, 1, 2]

            [output]
            item_item_sep = " "
            "#,
        )?;
        assert_eq!(config.k, 10);
        assert!(!config.normalize);
        assert_eq!(config.rec_length, 5);
        assert_eq!(config.fallback_pool, vec![3, 1, 2]);
        assert_eq!(config.output.item_item_sep, " ");
        assert_eq!(config.output.user_items_sep, ",");
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            KnnConfig::from_toml_str("num_workers = 0"),
            Err(RecError::Config(_))
        ));
        assert!(KnnConfig::from_toml_str("k = \"many\"").is_err());
    }
}
