//! Random egress address allocation.
//!
//! Draws a fresh IPv6 address from a configured block for every proxied
//! request, skipping a reserved sub-range used by other infrastructure.

use crate::config::{GatewayError, Result};
use rand::Rng;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

const MIN_HOST_BITS: u8 = 8;
const MAX_DRAWS: usize = 64;

/// An IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Block {
    network: u128,
    prefix_len: u8,
}

impl Ipv6Block {
    /// Creates a block, zeroing any host bits of `addr`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::AddressBlock` if `prefix_len` exceeds 128.
    pub fn new(addr: Ipv6Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 128 {
            return Err(GatewayError::AddressBlock(format!(
                "prefix length {prefix_len} exceeds 128"
            )));
        }
        Ok(Self {
            network: u128::from(addr) & Self::mask(prefix_len),
            prefix_len,
        })
    }

    const fn mask(prefix_len: u8) -> u128 {
        if prefix_len == 0 {
            0
        } else {
            u128::MAX << (128 - prefix_len as u32)
        }
    }

    #[must_use]
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    #[must_use]
    pub fn network(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.network)
    }

    #[must_use]
    pub fn contains(&self, addr: Ipv6Addr) -> bool {
        u128::from(addr) & Self::mask(self.prefix_len) == self.network
    }

    /// Whether every address of `other` lies inside this block.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        other.prefix_len >= self.prefix_len && self.contains(other.network())
    }

    const fn host_bits(&self) -> u8 {
        128 - self.prefix_len
    }
}

impl FromStr for Ipv6Block {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, len) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| GatewayError::AddressBlock(format!("{s:?} is not in CIDR notation")))?;
        let addr: Ipv6Addr = addr
            .parse()
            .map_err(|e| GatewayError::AddressBlock(format!("{s:?}: {e}")))?;
        let len: u8 = len
            .parse()
            .map_err(|e| GatewayError::AddressBlock(format!("{s:?}: {e}")))?;
        Self::new(addr, len)
    }
}

impl fmt::Display for Ipv6Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len)
    }
}

/// Source address attached to a proxied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EgressAddress(pub Ipv6Addr);

impl fmt::Display for EgressAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Allocates random addresses out of an egress block.
#[derive(Debug, Clone)]
pub struct AddressAllocator {
    block: Ipv6Block,
    reserved: Option<Ipv6Block>,
}

impl AddressAllocator {
    /// Creates an allocator for `block`, never handing out `reserved`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::AddressBlock` if the block has fewer than eight
    /// host bits, or if the reserved range swallows the whole block.
    pub fn new(block: Ipv6Block, reserved: Option<Ipv6Block>) -> Result<Self> {
        if block.host_bits() < MIN_HOST_BITS {
            return Err(GatewayError::AddressBlock(format!(
                "{block} leaves fewer than {MIN_HOST_BITS} host bits"
            )));
        }
        if let Some(r) = reserved
            && r.covers(&block)
        {
            return Err(GatewayError::AddressBlock(format!(
                "reserved range {r} covers the whole egress block {block}"
            )));
        }
        Ok(Self { block, reserved })
    }

    /// Returns a random address inside the block and outside the reserved range.
    #[must_use]
    pub fn allocate(&self) -> EgressAddress {
        let host_mask = !Ipv6Block::mask(self.block.prefix_len);
        let mut rng = rand::rng();
        let mut candidate = self.block.network;

        for _ in 0..MAX_DRAWS {
            candidate = self.block.network | (rng.random::<u128>() & host_mask);
            if !self.is_reserved(candidate) {
                return EgressAddress(Ipv6Addr::from(candidate));
            }
        }

        // A reserved sub-block lies inside one half of the block, so flipping
        // the top host bit always moves a reserved draw out of it.
        let top_host_bit = 1u128 << (self.block.host_bits() - 1);
        EgressAddress(Ipv6Addr::from(candidate ^ top_host_bit))
    }

    fn is_reserved(&self, addr: u128) -> bool {
        self.reserved
            .is_some_and(|r| r.contains(Ipv6Addr::from(addr)))
    }
}
