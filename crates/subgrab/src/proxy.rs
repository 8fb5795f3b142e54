use reqwest::Proxy;

use crate::SubgrabError;

/// Proxy protocol spoken by the upstream proxy server.
#[derive(Debug, Clone, PartialEq, Eq, Copy, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks5,
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy used for every manifest and segment request of a transport.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>, proxy_type: ProxyType) -> Self {
        Self {
            url: url.into(),
            proxy_type,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Proxy URL with the scheme reqwest expects for this proxy type.
    fn normalized_url(&self) -> String {
        match self.proxy_type {
            ProxyType::Socks5
                if !(self.url.starts_with("socks5://") || self.url.starts_with("socks5h://")) =>
            {
                format!("socks5://{}", self.url)
            }
            _ => self.url.clone(),
        }
    }
}

/// Build a reqwest `Proxy` from the proxy configuration.
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy, SubgrabError> {
    let url = config.normalized_url();
    let proxy = match config.proxy_type {
        ProxyType::Http => Proxy::http(&url),
        ProxyType::Https => Proxy::https(&url),
        ProxyType::Socks5 => Proxy::all(&url),
    }
    .map_err(|e| SubgrabError::ProxyConfiguration {
        reason: format!("invalid {:?} proxy URL `{url}`: {e}", config.proxy_type),
    })?;

    Ok(match &config.auth {
        Some(auth) => proxy.basic_auth(&auth.username, &auth.password),
        None => proxy,
    })
}
