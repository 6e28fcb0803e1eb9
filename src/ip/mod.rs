/*! Contract with the enclosing IPv4 stack.

The UDP protocol handler does not frame, route or transmit IPv4 datagrams
itself; it delegates to a host stack through the [`IpStack`] trait. The types
here carry exactly what crosses that boundary: addresses, per-datagram
parameters, receive metadata and the error stratum surfaced to callers.
*/

use core::fmt;

use bitflags::bitflags;

use crate::buf::BufRef;
use crate::wire::{Icmpv4DstUnreachable, IpProtocol, Ipv4Address};

/// Opaque identity of a network interface.
///
/// The UDP layer never inspects interfaces; it only compares them for
/// identity and asks the host stack address-locality questions about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IfaceId(usize);

impl IfaceId {
    pub const fn new(id: usize) -> IfaceId {
        IfaceId(id)
    }
}

impl fmt::Display for IfaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "iface#{}", self.0)
    }
}

/// Local and remote addresses of an outgoing datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ip4Addrs {
    pub local_addr: Ipv4Address,
    pub remote_addr: Ipv4Address,
}

/// Addressing information of a received IPv4 datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ip4RxInfo {
    pub src_addr: Ipv4Address,
    pub dst_addr: Ipv4Address,
    /// The interface the datagram arrived on.
    pub iface: IfaceId,
}

/// Per-datagram parameters handed to the IP send path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ip4DgramMeta {
    pub ttl: u8,
    pub protocol: IpProtocol,
}

/// Parameters for an ICMP Destination Unreachable message.
///
/// The host stack frames the message itself (rest-of-header and the quoted
/// original datagram); protocol handlers only select the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ip4DestUnreachMeta {
    pub icmp_code: Icmpv4DstUnreachable,
}

bitflags! {
    /// Flags forwarded to the IP send path.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SendFlags: u8 {
        /// Permit sending to a broadcast address.
        const ALLOW_BROADCAST = 0x01;
        /// Request the don't-fragment bit on the emitted datagram.
        const DONT_FRAGMENT = 0x02;
    }
}

/// Errors surfaced by the IP layer and by UDP registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpErr {
    /// The 4-tuple is already claimed by another association.
    AddrInUse,
    /// No route to the destination.
    NoRoute,
    /// The datagram exceeds what the path can carry.
    PacketTooLarge,
    /// Link-layer or driver buffers are exhausted.
    BufferFull,
}

impl fmt::Display for IpErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IpErr::AddrInUse => write!(f, "address in use"),
            IpErr::NoRoute => write!(f, "no route to destination"),
            IpErr::PacketTooLarge => write!(f, "packet too large"),
            IpErr::BufferFull => write!(f, "buffers exhausted"),
        }
    }
}

impl std::error::Error for IpErr {}

/// Host-facade contract required from the enclosing IPv4 stack.
pub trait IpStack {
    /// Opaque send-retry handle forwarded through the UDP send path; its
    /// semantics live entirely in the host stack.
    type Retry;

    /// Frame and transmit an IPv4 datagram carrying `dgram` as its payload.
    fn send_ip4_dgram(
        &mut self,
        addrs: &Ip4Addrs,
        meta: &Ip4DgramMeta,
        dgram: BufRef<'_>,
        iface: Option<IfaceId>,
        retry: Option<&mut Self::Retry>,
        flags: SendFlags,
    ) -> Result<(), IpErr>;

    /// Emit an ICMP Destination Unreachable message quoting the offending
    /// datagram.
    fn send_ip4_dest_unreach(
        &mut self,
        rx_info: &Ip4RxInfo,
        dgram: BufRef<'_>,
        meta: &Ip4DestUnreachMeta,
    );

    /// Whether `addr` is a local address of `iface`.
    fn ip4_addr_is_local(&self, iface: IfaceId, addr: Ipv4Address) -> bool;
}
