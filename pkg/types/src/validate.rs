use anyhow::{Result, bail};
use std::net::IpAddr;

/// Validate an IPv4 or IPv6 address literal.
pub fn validate_ip(ip: &str) -> Result<()> {
    if ip.parse::<IpAddr>().is_err() {
        bail!("'{}' is not a valid IP address", ip);
    }
    Ok(())
}

/// Validate a MAC address in the host's notation.
/// Rules: six two-digit hex groups separated by `-` (or `:`), e.g. `00-11-22-33-44-55`.
pub fn validate_mac_address(mac: &str) -> Result<()> {
    let sep = if mac.contains('-') { '-' } else { ':' };
    let groups: Vec<&str> = mac.split(sep).collect();
    if groups.len() != 6 {
        bail!("MAC address '{}' must have 6 groups (got {})", mac, groups.len());
    }
    if !groups
        .iter()
        .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()))
    {
        bail!(
            "MAC address '{}' must contain only two-digit hex groups",
            mac
        );
    }
    Ok(())
}
