//! 配置模块，负责加载JSON格式的存储连接配置

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(".{0} required")]
    MissingField(&'static str),

    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 一致性级别, 原样传给存储客户端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    #[default]
    Strong,
    BoundedStaleness,
    Session,
    Eventual,
}

/// 集合的索引策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingPolicy {
    pub automatic: bool,
    pub indexing_mode: String,
}

impl Default for IndexingPolicy {
    fn default() -> Self {
        Self {
            automatic: true,
            indexing_mode: "Consistent".to_string(),
        }
    }
}

/// 新建集合时使用的参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionProvisioning {
    pub indexing_policy: IndexingPolicy,
    pub offer_type: String,
}

impl Default for CollectionProvisioning {
    fn default() -> Self {
        Self {
            indexing_policy: IndexingPolicy::default(),
            offer_type: "S1".to_string(),
        }
    }
}

/// 存储连接配置结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// 服务端地址, 例如 `https://my-account.documents.azure.com:443/`
    pub host: String,
    pub master_key: String,
    pub database_id: String,
    /// 文档主键所在的属性名
    pub id_property: String,
    pub consistency_level: ConsistencyLevel,
    /// 用户字段外层的包装属性; 为空时字段直接存放在文档根部
    pub data_attribute: Option<String>,
    pub collection: CollectionProvisioning,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            master_key: String::new(),
            database_id: String::new(),
            id_property: "id".to_string(),
            consistency_level: ConsistencyLevel::default(),
            data_attribute: None,
            collection: CollectionProvisioning::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(
        host: impl Into<String>,
        master_key: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            master_key: master_key.into(),
            database_id: database_id.into(),
            ..Default::default()
        }
    }

    /// 从JSON文件加载配置并校验必填项
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::read_json_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// 只读取并解析JSON文件, 不校验连接所需的必填项
    ///
    /// 只关心查询构建相关设置 (例如 `dataAttribute`) 的调用方使用。
    pub fn read_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.to_path_buf(),
            source,
        })?;

        let config: StoreConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path_ref.to_path_buf(),
                source,
            })?;

        Ok(config)
    }

    /// 校验必填项, 顺序为 databaseId、host、masterKey
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_id.is_empty() {
            return Err(ConfigError::MissingField("databaseId"));
        }
        if self.host.is_empty() {
            return Err(ConfigError::MissingField("host"));
        }
        if self.master_key.is_empty() {
            return Err(ConfigError::MissingField("masterKey"));
        }
        if self.id_property.is_empty() {
            return Err(ConfigError::MissingField("idProperty"));
        }
        Ok(())
    }

    /// 非空的包装属性
    pub fn data_attribute(&self) -> Option<&str> {
        self.data_attribute.as_deref().filter(|s| !s.is_empty())
    }
}
