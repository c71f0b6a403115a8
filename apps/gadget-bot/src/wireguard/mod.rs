//! WireGuard peer provisioning primitives: key pairs, client addresses and
//! rendered client profiles.

pub mod address;
pub mod keys;
pub mod profile;

pub use address::{next_address, AllocationError};
pub use keys::{IdentityError, KeyGenerator, X25519KeyGenerator};
pub use profile::{encode_for_scan, render};
