use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub redemption: RedemptionConfig,
    /// 首个管理员账号；提供时启动阶段确保其存在
    #[serde(default)]
    pub admin: Option<AdminSeedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// token 有效期（秒）
    #[serde(default = "default_jwt_expires_in")]
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSeedConfig {
    #[serde(default = "default_admin_name")]
    pub name: String,
    pub email: String,
    pub password: String,
}

fn default_jwt_expires_in() -> i64 {
    86400
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

/// 兑换引擎参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionConfig {
    /// 库存竞争失败后的最大重试次数（不含首次）
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// 单次兑换的截止时间（毫秒）
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// 兑换码长度
    #[serde(default = "default_code_length")]
    pub code_length: usize,
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    10
}

fn default_backoff_max_ms() -> u64 {
    200
}

fn default_deadline_ms() -> u64 {
    5000
}

fn default_code_length() -> usize {
    8
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            deadline_ms: default_deadline_ms(),
            code_length: default_code_length(),
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env()?,
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        if config.jwt.secret.trim().is_empty() {
            return Err("jwt.secret must not be empty".into());
        }
        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        toml::from_str(config_str).map_err(|e| format!("Failed to parse config file: {e}").into())
    }

    /// 无配置文件：使用环境变量与默认值构建
    fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::from_lookup(get_env)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        // 数据库 URL 与签名密钥在无配置文件时必须提供
        let database_url =
            lookup("DATABASE_URL").ok_or("DATABASE_URL is not set and no config.toml was found")?;
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or("JWT_SECRET is not set and no config.toml was found")?;

        let admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeedConfig {
                name: lookup("ADMIN_NAME").unwrap_or_else(default_admin_name),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(lookup("SERVER_PORT"), 8081u16),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(lookup("DB_MAX_CONNECTIONS"), 10u32),
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expires_in: parse_or(lookup("JWT_EXPIRES_IN"), default_jwt_expires_in()),
            },
            redemption: RedemptionConfig::default(),
            admin,
        })
    }

    /// 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.expires_in = n;
        }
        if let Ok(v) = env::var("REDEEM_MAX_RETRIES")
            && let Ok(n) = v.parse()
        {
            self.redemption.max_retries = n;
        }
        if let Ok(v) = env::var("REDEEM_BACKOFF_BASE_MS")
            && let Ok(n) = v.parse()
        {
            self.redemption.backoff_base_ms = n;
        }
        if let Ok(v) = env::var("REDEEM_BACKOFF_MAX_MS")
            && let Ok(n) = v.parse()
        {
            self.redemption.backoff_max_ms = n;
        }
        if let Ok(v) = env::var("REDEEM_DEADLINE_MS")
            && let Ok(n) = v.parse()
        {
            self.redemption.deadline_ms = n;
        }
        if let Ok(v) = env::var("REDEEM_CODE_LENGTH")
            && let Ok(n) = v.parse()
        {
            self.redemption.code_length = n;
        }
    }
}
