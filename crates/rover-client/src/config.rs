//! 会话配置
//!
//! 会话创建时确定，之后不再改变。可以从 TOML 加载：
//!
//! ```toml
//! host = "192.168.0.42"
//! port = 5000
//! nominal_speed_cm_per_sec = 20.0
//! ```

use crate::error::ClientError;
use rover_transport::Endpoint;
use serde::{Deserialize, Serialize};

/// 小车默认地址
pub const DEFAULT_HOST: &str = "192.168.0.42";
/// 指令服务器默认端口
pub const DEFAULT_PORT: u16 = 5000;
/// 估算距离使用的标称速度（cm/s）
pub const FIXED_SPEED_CM_S: f64 = 20.0;

/// 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    host: String,
    port: u16,
    nominal_speed_cm_per_sec: f64,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// 设置标称速度（cm/s）
    pub fn with_nominal_speed(mut self, cm_per_sec: f64) -> Self {
        self.nominal_speed_cm_per_sec = cm_per_sec;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn nominal_speed_cm_per_sec(&self) -> f64 {
        self.nominal_speed_cm_per_sec
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// 校验：主机名非空，端口非 0，速度为有限非负数
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.host.trim().is_empty() {
            return Err(ClientError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ClientError::InvalidConfig("port must be non-zero".to_string()));
        }
        if !self.nominal_speed_cm_per_sec.is_finite() || self.nominal_speed_cm_per_sec < 0.0 {
            return Err(ClientError::InvalidConfig(format!(
                "nominal speed must be a finite non-negative number, got {}",
                self.nominal_speed_cm_per_sec
            )));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            nominal_speed_cm_per_sec: FIXED_SPEED_CM_S,
        }
    }
}
