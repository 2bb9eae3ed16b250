//! `AppleMIDI` service advertisement
//!
//! Peers such as macOS Audio MIDI Setup and iOS "Network MIDI" list
//! sessions found under `_apple-midi._udp`. The advertised port is the
//! control port; the data port is implied as control + 1.

use std::collections::HashMap;

use mdns_sd::{Error as MdnsError, ServiceDaemon, ServiceInfo};

use super::APPLE_MIDI_SERVICE_TYPE;
use crate::protocol::applemidi::bounded_name;
use crate::types::SessionConfig;

/// Errors from service advertisement
#[derive(Debug, thiserror::Error)]
pub enum AdvertiserError {
    /// mDNS error
    #[error("mDNS error: {0}")]
    Mdns(#[from] MdnsError),

    /// Service not registered
    #[error("Service not registered")]
    NotRegistered,

    /// Service already registered
    #[error("Service already registered")]
    AlreadyRegistered,
}

/// What to advertise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertiserConfig {
    /// Session name shown to browsing peers
    pub name: String,
    /// Control port
    pub port: u16,
    /// mDNS host name; derived from the machine's host name when `None`
    pub host_name: Option<String>,
}

impl Default for AdvertiserConfig {
    fn default() -> Self {
        Self::from_session(&SessionConfig::default())
    }
}

impl AdvertiserConfig {
    /// Advertise a session under its local name and default port
    #[must_use]
    pub fn from_session(config: &SessionConfig) -> Self {
        Self {
            name: config.local_name.clone(),
            port: config.default_port,
            host_name: None,
        }
    }

    /// Override the advertised port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Registers one `AppleMIDI` session with the local mDNS responder
///
/// The service is withdrawn when the advertiser is dropped.
pub struct SessionAdvertiser {
    config: AdvertiserConfig,
    daemon: ServiceDaemon,
    service_fullname: Option<String>,
}

impl SessionAdvertiser {
    /// Create an advertiser; nothing is published until [`register`](Self::register)
    ///
    /// # Errors
    ///
    /// Returns error if the mDNS daemon cannot be initialized.
    pub fn new(config: AdvertiserConfig) -> Result<Self, AdvertiserError> {
        let daemon = ServiceDaemon::new()?;

        Ok(Self {
            config,
            daemon,
            service_fullname: None,
        })
    }

    /// Instance name that will be advertised
    #[must_use]
    pub fn service_name(&self) -> &str {
        bounded_name(&self.config.name)
    }

    /// Advertised control port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Whether the service is currently published
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.service_fullname.is_some()
    }

    /// Publish the service
    ///
    /// # Errors
    ///
    /// Returns error if the service is already registered or mDNS
    /// registration fails.
    pub fn register(&mut self) -> Result<(), AdvertiserError> {
        if self.service_fullname.is_some() {
            return Err(AdvertiserError::AlreadyRegistered);
        }

        let host_name = self
            .config
            .host_name
            .as_deref()
            .map_or_else(local_host_name, mdns_host_name);
        let service_info = ServiceInfo::new(
            APPLE_MIDI_SERVICE_TYPE,
            self.service_name(),
            &host_name,
            "",
            self.config.port,
            HashMap::<String, String>::new(),
        )?
        .enable_addr_auto();

        self.daemon.register(service_info.clone())?;
        self.service_fullname = Some(service_info.get_fullname().to_string());

        tracing::info!(
            name = %self.service_name(),
            port = %self.config.port,
            host = %host_name,
            "AppleMIDI service registered"
        );

        Ok(())
    }

    /// Withdraw the service
    ///
    /// # Errors
    ///
    /// Returns error if the service is not registered or mDNS
    /// unregistration fails.
    pub fn unregister(&mut self) -> Result<(), AdvertiserError> {
        let fullname = self
            .service_fullname
            .take()
            .ok_or(AdvertiserError::NotRegistered)?;

        self.daemon.unregister(&fullname)?;

        tracing::info!(name = %fullname, "AppleMIDI service unregistered");

        Ok(())
    }
}

impl Drop for SessionAdvertiser {
    fn drop(&mut self) {
        if self.service_fullname.is_some() {
            let _ = self.unregister();
        }
        let _ = self.daemon.shutdown();
    }
}

/// Turn a host or session name into an mDNS host name (`name.local.`)
#[must_use]
pub fn mdns_host_name(name: &str) -> String {
    let label: String = name
        .trim()
        .trim_end_matches('.')
        .trim_end_matches(".local")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c.to_ascii_lowercase() } else { '-' })
        .collect();

    if label.is_empty() {
        "applemidi.local.".to_string()
    } else {
        format!("{label}.local.")
    }
}

/// mDNS host name of this machine
#[must_use]
pub fn local_host_name() -> String {
    hostname::get().map_or_else(
        |_| "applemidi.local.".to_string(),
        |s| mdns_host_name(&s.to_string_lossy()),
    )
}
