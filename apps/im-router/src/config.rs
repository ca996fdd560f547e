use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_admin_listen")]
    pub admin_listen: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            admin_listen: default_admin_listen(),
            redis_url: default_redis_url(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:7100".to_string()
}

fn default_admin_listen() -> String {
    "127.0.0.1:7101".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1/".to_string()
}
