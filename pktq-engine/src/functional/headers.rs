//! Bounds-checked views into Ethernet/IPv4 frames.

use std::net::Ipv4Addr;

pub(crate) const ETH_HLEN: usize = 14;
pub(crate) const ETH_P_IP: u16 = 0x0800;

pub(crate) const IPPROTO_ICMP: u8 = 1;
pub(crate) const IPPROTO_TCP: u8 = 6;
pub(crate) const IPPROTO_UDP: u8 = 17;

pub(crate) fn be16(frame: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*frame.get(at)?, *frame.get(at + 1)?]))
}

pub(crate) fn ethertype(frame: &[u8]) -> Option<u16> {
    be16(frame, 12)
}

/// Byte length of the IPv4 header, from IHL.
pub(crate) fn ipv4_hlen(frame: &[u8]) -> Option<usize> {
    Some(((frame.get(ETH_HLEN)? & 0x0f) as usize) * 4)
}

pub(crate) fn ipv4_proto(frame: &[u8]) -> Option<u8> {
    if ethertype(frame)? != ETH_P_IP {
        return None;
    }
    frame.get(ETH_HLEN + 9).copied()
}

pub(crate) fn ipv4_saddr(frame: &[u8]) -> Option<Ipv4Addr> {
    ipv4_addr(frame, ETH_HLEN + 12)
}

pub(crate) fn ipv4_daddr(frame: &[u8]) -> Option<Ipv4Addr> {
    ipv4_addr(frame, ETH_HLEN + 16)
}

fn ipv4_addr(frame: &[u8], at: usize) -> Option<Ipv4Addr> {
    Some(Ipv4Addr::new(
        *frame.get(at)?,
        *frame.get(at + 1)?,
        *frame.get(at + 2)?,
        *frame.get(at + 3)?,
    ))
}

/// Source and destination ports of the L4 header following IPv4.
pub(crate) fn l4_ports(frame: &[u8]) -> Option<(u16, u16)> {
    let l4 = ETH_HLEN + ipv4_hlen(frame)?;
    Some((be16(frame, l4)?, be16(frame, l4 + 2)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 14-byte Ethernet header + minimal IPv4/UDP headers.
    fn udp_frame() -> Vec<u8> {
        let mut f = vec![0u8; 60];
        f[12] = 0x08;
        f[13] = 0x00;
        f[14] = 0x45; // version 4, IHL 5
        f[23] = IPPROTO_UDP;
        f[26..30].copy_from_slice(&[10, 0, 0, 1]);
        f[30..34].copy_from_slice(&[10, 0, 0, 2]);
        f[34..36].copy_from_slice(&53u16.to_be_bytes());
        f[36..38].copy_from_slice(&1234u16.to_be_bytes());
        f
    }

    #[test]
    fn parses_udp() {
        let f = udp_frame();
        assert_eq!(ethertype(&f), Some(ETH_P_IP));
        assert_eq!(ipv4_proto(&f), Some(IPPROTO_UDP));
        assert_eq!(ipv4_saddr(&f), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(l4_ports(&f), Some((53, 1234)));
    }

    #[test]
    fn short_frames_yield_none() {
        assert_eq!(ethertype(&[0u8; 4]), None);
        assert_eq!(ipv4_proto(&[0u8; 16]), None);
    }
}
