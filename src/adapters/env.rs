use crate::domain::ports::EnvSource;
use std::collections::HashMap;

/// 讀取真實程序環境
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
    }
}

/// 記憶體內的環境，供測試與 dry run 使用
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_env_lookup() {
        let mut env = MapEnv::from_pairs([("PORT", "9000")]);
        assert_eq!(env.var("PORT").as_deref(), Some("9000"));
        assert_eq!(env.var("MISSING"), None);

        env.set("PORT", "9001");
        assert_eq!(env.var("PORT").as_deref(), Some("9001"));
    }
}
