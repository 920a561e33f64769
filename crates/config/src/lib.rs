//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 数据库连接
//! - JWT认证
//! - 实时通道（空闲超时、过期清扫间隔）
//! - 服务设置

use serde::{Deserialize, Serialize};
use std::env;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据库配置
    pub database: DatabaseConfig,
    /// JWT认证配置
    pub jwt: JwtConfig,
    /// 服务配置
    pub server: ServerConfig,
    /// 实时通道配置
    pub realtime: RealtimeConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 实时通道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket 连接空闲超时（秒）
    pub idle_timeout_secs: u64,
    /// 过期消息清扫间隔（秒）
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    /// 从环境变量加载配置
    /// 对于关键安全配置（DATABASE_URL, JWT_SECRET），如果环境变量不存在将会 panic
    /// 这确保了生产环境中不会使用不安全的默认值
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .expect("DATABASE_URL environment variable is required for production safety"),
                max_connections: env_or("DB_MAX_CONNECTIONS", 5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .expect("JWT_SECRET environment variable is required for production safety"),
                expiration_hours: env_or("JWT_EXPIRATION_HOURS", 24),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env_or("SERVER_PORT", 8080),
            },
            realtime: RealtimeConfig {
                idle_timeout_secs: env_or("WS_IDLE_TIMEOUT_SECS", 900),
                sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", 300),
            },
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::env_or;

    #[test]
    fn env_or_falls_back_to_default() {
        assert_eq!(env_or("DEFINITELY_NOT_SET_12345", 42u32), 42);
    }
}
