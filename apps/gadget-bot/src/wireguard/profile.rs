use std::net::Ipv4Addr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const SCAN_SCHEME: &str = "wireguard://";
pub const KEEPALIVE_SECS: u16 = 25;
pub const ALLOWED_IPS: &str = "0.0.0.0/0";

/// Renders a client profile in `wg-quick` syntax.
pub fn render(
    private_key: &str,
    server_public_key: &str,
    server_endpoint: &str,
    client_address: Ipv4Addr,
    dns_servers: &[String],
) -> String {
    format!(
        "[Interface]\n\
         PrivateKey = {private_key}\n\
         Address = {client_address}/32\n\
         DNS = {dns}\n\
         \n\
         [Peer]\n\
         PublicKey = {server_public_key}\n\
         AllowedIPs = {ALLOWED_IPS}\n\
         Endpoint = {server_endpoint}\n\
         PersistentKeepalive = {KEEPALIVE_SECS}",
        dns = dns_servers.join(", "),
    )
}

/// Payload for a QR code: the profile as base64 behind a URI scheme marker.
pub fn encode_for_scan(profile: &str) -> String {
    format!("{SCAN_SCHEME}{}", STANDARD.encode(profile.as_bytes()))
}
