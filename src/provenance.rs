//! Provenance metadata
//!
//! A ready-made metadata shape recording when, where and by whom a file
//! was sealed. Field names serialize in PascalCase so envelopes written by
//! other producers of this shape resolve into it.

use std::env;
use std::net::{IpAddr, UdpSocket};

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Reported instead of an address when no network route exists.
pub const NOT_CONNECTED: &str = "Not connected to the internet";

/// Reported when the local address cannot be determined.
pub const NO_ADDRESS: &str = "Could not get IP address";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FileProvenance {
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub encrypted_at: String,
    pub original_filename: String,
    pub machine_name: String,
    pub author: String,
    pub author_domain: String,
    pub ip_address: String,
}

impl FileProvenance {
    /// Capture provenance for `original_filename` from the running host.
    pub fn capture(original_filename: impl Into<String>) -> Self {
        let machine_name = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Only Windows has a separate logon domain; elsewhere it is the host.
        let author_domain = match env_first(&["USERDOMAIN"]) {
            domain if domain.is_empty() => machine_name.clone(),
            domain => domain,
        };

        Self {
            encrypted_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            original_filename: original_filename.into(),
            machine_name,
            author: env_first(&["USER", "USERNAME", "LOGNAME"]),
            author_domain,
            ip_address: local_ipv4(),
        }
    }
}

fn env_first(names: &[&str]) -> String {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|v| !v.is_empty()))
        .unwrap_or_default()
}

/// First local IPv4 address, found by asking the OS which interface routes
/// to a public address. Connecting a UDP socket sends no packets.
fn local_ipv4() -> String {
    let Ok(socket) = UdpSocket::bind("0.0.0.0:0") else {
        return NO_ADDRESS.to_owned();
    };
    if socket.connect("192.0.2.1:9").is_err() {
        return NOT_CONNECTED.to_owned();
    }
    match socket.local_addr().map(|addr| addr.ip()) {
        Ok(IpAddr::V4(ip)) if !ip.is_unspecified() => ip.to_string(),
        _ => NO_ADDRESS.to_owned(),
    }
}
