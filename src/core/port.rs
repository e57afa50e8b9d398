use crate::domain::model::{PortResolution, DEFAULT_PORT, PORT_ENV_VAR};
use crate::domain::ports::EnvSource;

/// 解析要綁定的埠：有效的 `PORT` 覆蓋值優先，其餘情況一律退回預設埠。
///
/// 每次程序啟動呼叫一次，不做快取；同一映像在不同平台可注入不同的埠。
/// 無效值不會讓程序失敗，只會記錄警告。
pub fn resolve_port(env: &dyn EnvSource) -> PortResolution {
    let resolution = match env.var(PORT_ENV_VAR) {
        None => PortResolution::Default,
        Some(raw) => match parse_port(&raw) {
            Ok(port) => PortResolution::Override(port),
            Err(reason) => PortResolution::Fallback { raw, reason },
        },
    };

    match &resolution {
        PortResolution::Override(port) => {
            tracing::info!("🔌 Using {}={} from environment", PORT_ENV_VAR, port);
        }
        PortResolution::Default => {
            tracing::info!("🔌 {} not set, using default port {}", PORT_ENV_VAR, DEFAULT_PORT);
        }
        PortResolution::Fallback { raw, reason } => {
            tracing::warn!(
                "⚠️ Ignoring invalid {}={:?} ({}), falling back to default port {}",
                PORT_ENV_VAR,
                raw,
                reason,
                DEFAULT_PORT
            );
        }
    }

    resolution
}

/// 接受 1..=65535 的十進位整數，容許前後空白
pub fn parse_port(raw: &str) -> std::result::Result<u16, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("value is empty".to_string());
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err("value is not a decimal integer".to_string());
    }

    match trimmed.parse::<u32>() {
        Ok(0) => Err("port 0 is not bindable".to_string()),
        Ok(port) if port <= u16::MAX as u32 => Ok(port as u16),
        _ => Err("port must be between 1 and 65535".to_string()),
    }
}
