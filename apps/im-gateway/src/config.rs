use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_admin_listen")]
    pub admin_listen: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_router_addr")]
    pub router_addr: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default)]
    pub sync_self: bool,
    #[serde(default = "default_sync_limit")]
    pub sync_limit: usize,
    #[serde(default = "default_sync_group_limit")]
    pub sync_group_limit: usize,
    #[serde(default)]
    pub kefu_appid: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            admin_listen: default_admin_listen(),
            data_dir: default_data_dir(),
            router_addr: default_router_addr(),
            redis_url: default_redis_url(),
            sync_self: false,
            sync_limit: default_sync_limit(),
            sync_group_limit: default_sync_group_limit(),
            kefu_appid: 0,
        }
    }
}

impl Config {
    pub fn gateway_config(&self) -> im_gateway::GatewayConfig {
        im_gateway::GatewayConfig {
            sync_self: self.sync_self,
            sync_limit: self.sync_limit,
            sync_group_limit: self.sync_group_limit,
            kefu_appid: self.kefu_appid,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:7000".to_string()
}

fn default_admin_listen() -> String {
    "127.0.0.1:7001".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_router_addr() -> String {
    "127.0.0.1:7100".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1/".to_string()
}

fn default_sync_limit() -> usize {
    200
}

fn default_sync_group_limit() -> usize {
    50
}
