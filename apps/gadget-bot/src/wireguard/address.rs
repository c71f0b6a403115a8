use std::net::Ipv4Addr;

use thiserror::Error;

/// Highest value the last octet takes before rolling into the next /24.
pub const MAX_HOST_OCTET: u8 = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("client address pool exhausted after {0}")]
    PoolExhausted(Ipv4Addr),
}

/// Address following `last_issued` in the pool.
///
/// The last two octets act as a counter: the fourth octet counts up to 254,
/// then resets to 0 and carries into the third. Running off the end of the
/// third octet is an error, never a silent wrap.
pub fn next_address(last_issued: Ipv4Addr) -> Result<Ipv4Addr, AllocationError> {
    let [a, b, c, d] = last_issued.octets();

    if d < MAX_HOST_OCTET {
        return Ok(Ipv4Addr::new(a, b, c, d + 1));
    }

    c.checked_add(1)
        .map(|c| Ipv4Addr::new(a, b, c, 0))
        .ok_or(AllocationError::PoolExhausted(last_issued))
}
