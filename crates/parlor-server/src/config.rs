use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Hostname advertised to clients in ReconnectHere TLVs.
    pub oscar_host: String,
    pub auth_port: u16,
    pub bos_port: u16,
    pub chat_nav_port: u16,
    pub chat_port: u16,
    pub bart_port: u16,
    pub admin_port: u16,
    pub toc_port: u16,
    pub http_port: u16,
    pub db_path: PathBuf,
    pub bart_path: PathBuf,
    /// Auto-register unknown screen names and skip password checks.
    /// Development convenience, never a default.
    pub disable_auth: bool,
    /// Hex-encoded 32-byte cookie MAC key. A random key is generated when
    /// unset, which invalidates outstanding cookies on restart.
    pub cookie_key: Option<[u8; 32]>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            oscar_host: "127.0.0.1".to_string(),
            auth_port: 5190,
            bos_port: 5191,
            chat_nav_port: 5192,
            chat_port: 5193,
            bart_port: 5194,
            admin_port: 5195,
            toc_port: 9898,
            http_port: 8080,
            db_path: PathBuf::from("./parlor.db"),
            bart_path: PathBuf::from("./bart"),
            disable_auth: false,
            cookie_key: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("OSCAR_HOST") {
            config.oscar_host = host;
        }

        read_port("AUTH_PORT", &mut config.auth_port);
        read_port("BOS_PORT", &mut config.bos_port);
        read_port("CHAT_NAV_PORT", &mut config.chat_nav_port);
        read_port("CHAT_PORT", &mut config.chat_port);
        read_port("BART_PORT", &mut config.bart_port);
        read_port("ADMIN_PORT", &mut config.admin_port);
        read_port("TOC_PORT", &mut config.toc_port);
        read_port("HTTP_PORT", &mut config.http_port);

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("BART_PATH") {
            config.bart_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("DISABLE_AUTH") {
            config.disable_auth = val == "true" || val == "1";
        }

        if let Ok(hex_key) = std::env::var("COOKIE_KEY") {
            match parse_hex_key(&hex_key) {
                Ok(key) => config.cookie_key = Some(key),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid COOKIE_KEY, using a random key (cookies won't survive restart)"
                    );
                }
            }
        }

        config
    }

    pub fn bos_addr(&self) -> String {
        format!("{}:{}", self.oscar_host, self.bos_port)
    }

    pub fn chat_addr(&self) -> String {
        format!("{}:{}", self.oscar_host, self.chat_port)
    }

    pub fn chat_nav_addr(&self) -> String {
        format!("{}:{}", self.oscar_host, self.chat_nav_port)
    }

    pub fn bart_addr(&self) -> String {
        format!("{}:{}", self.oscar_host, self.bart_port)
    }

    pub fn admin_addr(&self) -> String {
        format!("{}:{}", self.oscar_host, self.admin_port)
    }
}

fn read_port(var: &str, target: &mut u16) {
    if let Ok(val) = std::env::var(var) {
        if let Ok(port) = val.parse::<u16>() {
            *target = port;
        } else {
            tracing::warn!(var, value = %val, "Invalid port, using default");
        }
    }
}

fn parse_hex_key(hex_str: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(hex_str.trim()).map_err(|e| e.to_string())?;
    if bytes.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", bytes.len()));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
