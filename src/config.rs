//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
    /// 请求体大小上限（字节）
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 密码最小长度
    pub password_min_length: usize,
    /// 密码必须包含大写字母
    pub password_require_uppercase: bool,
    /// 密码必须包含数字
    pub password_require_digit: bool,
    /// 密码必须包含特殊字符
    pub password_require_special: bool,
    /// Argon2 内存开销（KiB）
    pub argon2_memory_kib: u32,
    /// Argon2 迭代次数
    pub argon2_iterations: u32,
    /// Argon2 并行度
    pub argon2_parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 会话中保存当前用户 ID 的键
    pub key: String,
    /// 会话 Cookie 名称
    pub cookie_name: String,
    /// 是否只通过 HTTPS 发送 Cookie
    pub secure: bool,
    /// 无活动过期时间（秒）
    pub inactivity_secs: i64,
}

/// 启动时确保存在的管理员账户
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AclConfig {
    /// 未登录会话解析到的访客用户 ID
    pub guest_user_id: i64,
    /// 管理员角色 ID，拥有该角色即视为管理员
    pub admin_role_id: i64,
    /// 可选的初始管理员
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub acl: AclConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("server.body_limit_bytes", 64 * 1024)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.password_min_length", 8)?
            .set_default("security.password_require_uppercase", true)?
            .set_default("security.password_require_digit", true)?
            .set_default("security.password_require_special", false)?
            .set_default("security.argon2_memory_kib", 65536)?
            .set_default("security.argon2_iterations", 3)?
            .set_default("security.argon2_parallelism", 4)?
            .set_default("session.key", "acl_user_id")?
            .set_default("session.cookie_name", "acl_session")?
            .set_default("session.secure", true)?
            .set_default("session.inactivity_secs", 3600)?
            .set_default("acl.guest_user_id", 1)?
            .set_default("acl.admin_role_id", 1)?;

        // 从环境变量加载配置（前缀为 ACL_）
        settings = settings.add_source(
            Environment::with_prefix("ACL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证密码策略
        if self.security.password_min_length < 6 || self.security.password_min_length > 128 {
            return Err(ConfigError::Message(
                "password_min_length must be between 6 and 128".to_string(),
            ));
        }

        if self.security.argon2_iterations == 0 || self.security.argon2_parallelism == 0 {
            return Err(ConfigError::Message(
                "argon2_iterations and argon2_parallelism must be positive".to_string(),
            ));
        }

        // Argon2 要求 m >= 8 * p
        if self.security.argon2_memory_kib < 8 * self.security.argon2_parallelism {
            return Err(ConfigError::Message(
                "argon2_memory_kib must be at least 8 * argon2_parallelism".to_string(),
            ));
        }

        // 验证会话配置
        if self.session.key.trim().is_empty() {
            return Err(ConfigError::Message("session.key must not be empty".to_string()));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "session.cookie_name must not be empty".to_string(),
            ));
        }

        if self.session.inactivity_secs < 60 {
            return Err(ConfigError::Message(
                "session.inactivity_secs must be at least 60".to_string(),
            ));
        }

        // 验证 ACL 标识
        if self.acl.guest_user_id < 1 {
            return Err(ConfigError::Message(format!(
                "acl.guest_user_id must be a positive integer, got {}",
                self.acl.guest_user_id
            )));
        }

        if self.acl.admin_role_id < 1 {
            return Err(ConfigError::Message(format!(
                "acl.admin_role_id must be a positive integer, got {}",
                self.acl.admin_role_id
            )));
        }

        if let Some(admin) = &self.acl.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.expose_secret().is_empty() {
                return Err(ConfigError::Message(
                    "acl.bootstrap_admin requires a username and a password".to_string(),
                ));
            }
        }

        Ok(())
    }
}
