//! IPv4 host address allocation.
//!
//! Sinks without an explicit address get one from a single subnet, handed
//! out in order starting at the first host address. Explicit addresses are
//! registered through [`AddressAllocator::reserve`] so that automatic
//! assignment never collides with them.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::str::FromStr;

use super::error::AddressError;

#[derive(Debug, Clone)]
pub struct AddressAllocator {
    network: u32,
    mask: u32,
    next_host: u32,
    assigned: HashSet<Ipv4Addr>,
}

impl AddressAllocator {
    /// Create an allocator for `base`/`mask`, e.g. `("10.1.1.0", "255.255.255.0")`.
    ///
    /// The mask must be contiguous and leave room for at least two hosts.
    pub fn new(base: &str, mask: &str) -> Result<Self, AddressError> {
        let base = Ipv4Addr::from_str(base.trim()).map_err(|_| AddressError::InvalidBase(base.to_string()))?;
        let mask_addr =
            Ipv4Addr::from_str(mask.trim()).map_err(|_| AddressError::InvalidMask(mask.to_string()))?;

        let mask_bits = u32::from(mask_addr);
        // Contiguous masks are all ones followed by all zeros.
        if mask_bits.leading_ones() + mask_bits.trailing_zeros() != 32 || mask_bits.trailing_zeros() < 2 {
            return Err(AddressError::InvalidMask(mask.to_string()));
        }

        Ok(Self {
            network: u32::from(base) & mask_bits,
            mask: mask_bits,
            next_host: 1,
            assigned: HashSet::new(),
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn prefix_len(&self) -> u32 {
        self.mask.leading_ones()
    }

    fn host_count(&self) -> u32 {
        // Excludes network and broadcast addresses.
        (!self.mask).saturating_sub(1)
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.mask == self.network
    }

    /// Next unassigned host address.
    pub fn allocate(&mut self) -> Result<Ipv4Addr, AddressError> {
        while self.next_host <= self.host_count() {
            let candidate = Ipv4Addr::from(self.network | self.next_host);
            self.next_host += 1;
            if self.assigned.insert(candidate) {
                log::debug!("Allocated address {}", candidate);
                return Ok(candidate);
            }
        }
        Err(AddressError::Exhausted {
            network: self.network(),
            prefix: self.prefix_len(),
        })
    }

    /// Mark an explicitly configured address as taken.
    ///
    /// Addresses outside the subnet are accepted but not tracked, since
    /// they cannot collide with automatic assignment.
    pub fn reserve(&mut self, addr: Ipv4Addr) -> Result<(), AddressError> {
        if !self.contains(addr) {
            log::debug!(
                "Address {} is outside {}/{}; not tracked",
                addr,
                self.network(),
                self.prefix_len()
            );
            return Ok(());
        }
        let host = u32::from(addr) & !self.mask;
        if host == 0 || host > self.host_count() {
            return Err(AddressError::OutOfSubnet(addr, self.network(), self.prefix_len()));
        }
        if !self.assigned.insert(addr) {
            return Err(AddressError::Conflict(addr));
        }
        Ok(())
    }
}

impl Default for AddressAllocator {
    fn default() -> Self {
        Self {
            network: u32::from(Ipv4Addr::new(10, 1, 1, 0)),
            mask: u32::from(Ipv4Addr::new(255, 255, 255, 0)),
            next_host: 1,
            assigned: HashSet::new(),
        }
    }
}
