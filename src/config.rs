use std::ffi::OsStr;
use std::fs::File;

use anyhow::anyhow;
use justconfig::error::ConfigError;
use justconfig::item::{MapAction, StringItem, ValueExtractor};
use justconfig::processors::Trim;
use justconfig::sources::env::Env;
use justconfig::sources::text::ConfigText;
use justconfig::ConfPath;
use justconfig::Config;
use tracing::warn;

use crate::knn::SelfMatchPolicy;

const DEFAULT_PORT: usize = 8080;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ARTIFACT_DIR: &str = "./artifacts";
const DEFAULT_MODEL_FILE: &str = "model_knn.bin";
const DEFAULT_ENCODER_FILE: &str = "book_encoder.bin";
const DEFAULT_MATRIX_FILE: &str = "sparse_matrix.bin";
const DEFAULT_ITEMS_FILE: &str = "Books_clean.csv";
const DEFAULT_RECOMMENDATION_COUNT: usize = 5;
const DEFAULT_MAX_RECOMMENDATION_COUNT: usize = 50;
const DEFAULT_PLACEHOLDER_IMAGE: &str = "default_book.png";

pub struct AppConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub artifacts: ArtifactConfig,
    pub recommend: RecommendConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: usize,
    pub num_workers: usize,
}

pub struct LogConfig {
    pub level: String,
}

pub struct ArtifactConfig {
    pub dir: String,
    pub model_file: String,
    pub encoder_file: String,
    pub matrix_file: String,
    pub items_file: String,
}

#[derive(Clone, Debug)]
pub struct RecommendConfig {
    pub default_count: usize,
    pub max_count: usize,
    pub self_match: SelfMatchPolicy,
    pub placeholder_image: String,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        RecommendConfig {
            default_count: DEFAULT_RECOMMENDATION_COUNT,
            max_count: DEFAULT_MAX_RECOMMENDATION_COUNT,
            self_match: SelfMatchPolicy::default(),
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `config_path` if it exists, then applies environment overrides.
    /// Values that are absent or do not parse keep their defaults.
    pub fn new(config_path: &str) -> anyhow::Result<AppConfig> {
        let mut conf = Config::default();

        if let Ok(config_file) = File::open(config_path) {
            let config_text = ConfigText::new(config_file, config_path).map_err(|err| {
                anyhow!("loading configuration file {} failed: {}", config_path, err)
            })?;
            conf.add_source(config_text);
        }

        let config_env = Env::new(&[
            (
                ConfPath::from(&["artifacts", "dir"]),
                OsStr::new("ARTIFACT_DIR"),
            ),
            (
                ConfPath::from(&["server", "num_workers"]),
                OsStr::new("NUM_WORKERS"),
            ),
            (ConfPath::from(&["log", "level"]), OsStr::new("LOG_LEVEL")),
        ]);
        conf.add_source(config_env);

        Ok(AppConfig::parse(conf))
    }

    fn parse(conf: Config) -> AppConfig {
        AppConfig {
            server: ServerConfig::parse(&conf, ConfPath::from(&["server"])),
            log: LogConfig::parse(&conf, ConfPath::from(&["log"])),
            artifacts: ArtifactConfig::parse(&conf, ConfPath::from(&["artifacts"])),
            recommend: RecommendConfig::parse(&conf, ConfPath::from(&["recommend"])),
        }
    }
}

impl ServerConfig {
    fn parse(conf: &Config, path: ConfPath) -> ServerConfig {
        ServerConfig {
            host: string_or(conf, path.push("host"), "0.0.0.0"),
            port: conf.get(path.push("port")).trim().value().unwrap_or(DEFAULT_PORT),
            num_workers: conf
                .get(path.push("num_workers"))
                .trim()
                .value()
                .unwrap_or_else(|_| detected_cpus())
                .max(1),
        }
    }
}

fn detected_cpus() -> usize {
    sys_info::cpu_num()
        .map(|qty| qty as usize)
        .unwrap_or(1)
        .max(1)
}

impl LogConfig {
    fn parse(conf: &Config, path: ConfPath) -> LogConfig {
        LogConfig {
            level: string_or(conf, path.push("level"), DEFAULT_LOG_LEVEL),
        }
    }
}

impl ArtifactConfig {
    fn parse(conf: &Config, path: ConfPath) -> ArtifactConfig {
        ArtifactConfig {
            dir: string_or(conf, path.push("dir"), DEFAULT_ARTIFACT_DIR),
            model_file: string_or(conf, path.push("model_file"), DEFAULT_MODEL_FILE),
            encoder_file: string_or(conf, path.push("encoder_file"), DEFAULT_ENCODER_FILE),
            matrix_file: string_or(conf, path.push("matrix_file"), DEFAULT_MATRIX_FILE),
            items_file: string_or(conf, path.push("items_file"), DEFAULT_ITEMS_FILE),
        }
    }
}

impl RecommendConfig {
    fn parse(conf: &Config, path: ConfPath) -> RecommendConfig {
        let default_count = conf
            .get(path.push("default_count"))
            .trim()
            .value()
            .unwrap_or(DEFAULT_RECOMMENDATION_COUNT)
            .max(1);
        let max_count = conf
            .get(path.push("max_count"))
            .trim()
            .value()
            .unwrap_or(DEFAULT_MAX_RECOMMENDATION_COUNT)
            .max(default_count);

        let raw_policy = string_or(conf, path.push("self_match"), "identity");
        let self_match = raw_policy.parse().unwrap_or_else(|err| {
            warn!("{}, falling back to identity", err);
            SelfMatchPolicy::Identity
        });

        RecommendConfig {
            default_count,
            max_count,
            self_match,
            placeholder_image: string_or(
                conf,
                path.push("placeholder_image"),
                DEFAULT_PLACEHOLDER_IMAGE,
            ),
        }
    }

    /// The number of recommendations to compute for a requested count.
    pub fn effective_count(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_count)
            .min(self.max_count)
    }
}

fn string_or(conf: &Config, path: ConfPath, default: &str) -> String {
    conf.get(path)
        .unquote()
        .value()
        .unwrap_or_else(|_| default.to_string())
}

/// Strips one pair of surrounding double quotes, so TOML-style string values
/// can be used as they are.
trait Unquote
where
    Self: Sized,
{
    fn unquote(self) -> Result<StringItem, ConfigError>;
}

impl Unquote for Result<StringItem, ConfigError> {
    fn unquote(self) -> Result<StringItem, ConfigError> {
        self?.map(|value| {
            let value = value.trim();
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                MapAction::Replace(vec![value[1..value.len() - 1].to_owned()])
            } else {
                MapAction::Replace(vec![value.to_owned()])
            }
        })
    }
}
