use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_admin_listen")]
    pub admin_listen: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// When set, this store runs as a replica and dials this address's
    /// `STORAGE_SYNC_BEGIN` listener instead of accepting replicas itself.
    #[serde(default)]
    pub primary_addr: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            admin_listen: default_admin_listen(),
            data_dir: default_data_dir(),
            primary_addr: None,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:7200".to_string()
}

fn default_admin_listen() -> String {
    "127.0.0.1:7201".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}
