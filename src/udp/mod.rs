/*! UDP protocol handling.

[`UdpCore`] sits between the host IPv4 stack and any number of UDP endpoints.
Endpoints come in two kinds: *listeners*, which match datagrams against a
possibly wildcarded `(addr, port, iface)` triple, and *associations*, which
claim exactly one `(local, remote, local port, remote port)` 4-tuple through
the [`AssociationIndex`].

On receive, the core parses and (lazily) checksums the datagram, offers it to
the association for its 4-tuple and then to each matching listener in reverse
registration order, and finally answers with ICMP Port Unreachable when a
locally addressed datagram found no taker. Receive callbacks run inside
[`recv`](UdpCore::recv) and may freely register and reset endpoints, including
the ones currently being dispatched to; the single-slot `next_listener` cursor
keeps the iteration well defined under such mutation.

On send, the UDP header is written into leading slack the caller reserved in
front of the payload, so no payload byte is ever copied.
*/

use crate::buf::BufRef;
use crate::ip::{
    IfaceId, Ip4Addrs, Ip4DestUnreachMeta, Ip4DgramMeta, Ip4RxInfo, IpErr, IpStack, SendFlags,
};
use crate::wire::{
    checksum, Icmpv4DstUnreachable, IpProtocol, Ipv4Address, UdpHeader, IPV4_HEADER_LEN,
    UDP_HEADER_LEN,
};

mod index;
mod slab;

pub use self::index::{AssociationIndex, AssociationKey, HashIndex, OrderedIndex};
use self::slab::Slab;

/// Leading slack a send buffer must reserve in front of the UDP payload, for
/// the UDP header plus the IPv4 header the host stack will prepend.
pub const HEADER_BEFORE_UDP_DATA: usize = IPV4_HEADER_LEN + UDP_HEADER_LEN;

/// Maximum UDP payload length representable by the 16-bit length field.
pub const MAX_UDP_DATA_LEN: usize = u16::MAX as usize - UDP_HEADER_LEN;

/// Tunables of the UDP protocol handler.
///
/// The ephemeral port range is reserved for automatic local port allocation,
/// which the core does not perform yet; it is validated and carried but
/// otherwise unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpConfig {
    /// TTL of outgoing datagrams.
    pub ttl: u8,
    pub ephemeral_port_first: u16,
    pub ephemeral_port_last: u16,
}

impl Default for UdpConfig {
    fn default() -> UdpConfig {
        UdpConfig {
            ttl: 64,
            ephemeral_port_first: 49152,
            ephemeral_port_last: 65535,
        }
    }
}

/// What a listener accepts.
///
/// `None` address and interface act as wildcards, as does port zero.
/// `accept_nonlocal_dst` lifts the requirement that the datagram's
/// destination be an address of the receiving interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpListenParams {
    pub addr: Option<Ipv4Address>,
    pub port: u16,
    pub iface: Option<IfaceId>,
    pub accept_nonlocal_dst: bool,
}

/// What an association claims: a fully qualified 4-tuple.
#[derive(Debug, Clone, Copy)]
pub struct UdpAssociationParams {
    pub key: AssociationKey,
    pub accept_nonlocal_dst: bool,
}

impl UdpAssociationParams {
    pub const fn new(key: AssociationKey) -> UdpAssociationParams {
        UdpAssociationParams {
            key,
            accept_nonlocal_dst: false,
        }
    }
}

/// UDP-level information about a received datagram.
///
/// `has_checksum` is false when the datagram carried checksum zero, meaning
/// the sender generated none; such datagrams are delivered unverified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpRxInfo {
    pub src_port: u16,
    pub dst_port: u16,
    pub has_checksum: bool,
}

/// UDP-level parameters of an outgoing datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpTxInfo {
    pub src_port: u16,
    pub dst_port: u16,
}

/// Verdict of a receive callback, controlling further dispatch of the same
/// datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvResult {
    /// Not accepted; keep offering the datagram to later receivers.
    Reject,
    /// Accepted; later receivers still see the datagram.
    AcceptContinue,
    /// Accepted; no further receiver sees the datagram.
    AcceptStop,
}

/// A receive callback.
///
/// Runs inside [`UdpCore::recv`]; the core itself is passed back in so the
/// callback can send, register new endpoints or reset existing ones
/// (including the one being called). Nested calls into `recv` are not
/// permitted.
pub trait UdpReceiver<S: IpStack, I: AssociationIndex = OrderedIndex> {
    fn recv_udp(
        &mut self,
        udp: &mut UdpCore<S, I>,
        ip_info: &Ip4RxInfo,
        udp_info: &UdpRxInfo,
        udp_data: BufRef<'_>,
    ) -> RecvResult;
}

/// Stable reference to an attached listener.
///
/// Becomes stale once the listener is reset; passing a stale handle to any
/// core operation is a programmer error and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(slab::Key);

/// Stable reference to an attached association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationHandle(slab::Key);

#[cfg(test)]
impl AssociationHandle {
    pub(crate) const fn fake(index: usize) -> AssociationHandle {
        AssociationHandle(slab::Key::fake(index))
    }
}

struct ListenerSlot<S: IpStack, I: AssociationIndex> {
    params: UdpListenParams,
    receiver: Option<Box<dyn UdpReceiver<S, I>>>,
    next: Option<usize>,
}

struct AssociationSlot<S: IpStack, I: AssociationIndex> {
    params: UdpAssociationParams,
    receiver: Option<Box<dyn UdpReceiver<S, I>>>,
}

/// The UDP protocol handler.
///
/// Owns the listener list, the association index and the receive callbacks
/// registered with them, and holds the host stack facade it sends through.
pub struct UdpCore<S: IpStack, I: AssociationIndex = OrderedIndex> {
    stack: S,
    config: UdpConfig,
    listeners: Slab<ListenerSlot<S, I>>,
    listeners_head: Option<usize>,
    /// Successor of the listener currently in callback; `reset_listener`
    /// advances it past a listener removed mid-iteration.
    next_listener: Option<usize>,
    associations: Slab<AssociationSlot<S, I>>,
    index: I,
}

impl<S: IpStack, I: AssociationIndex> UdpCore<S, I> {
    pub fn new(stack: S) -> UdpCore<S, I> {
        UdpCore::with_config(stack, UdpConfig::default())
    }

    pub fn with_config(stack: S, config: UdpConfig) -> UdpCore<S, I> {
        assert!(config.ephemeral_port_first > 0);
        assert!(config.ephemeral_port_first <= config.ephemeral_port_last);
        UdpCore {
            stack,
            config,
            listeners: Slab::new(),
            listeners_head: None,
            next_listener: None,
            associations: Slab::new(),
            index: I::default(),
        }
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    /// The configured ephemeral port range (reserved, currently unused).
    pub fn ephemeral_ports(&self) -> core::ops::RangeInclusive<u16> {
        self.config.ephemeral_port_first..=self.config.ephemeral_port_last
    }

    /// Whether no listener and no association is attached.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.associations.is_empty()
    }

    /// Attach a listener at the head of the list, so that the most recently
    /// registered listener is offered datagrams first.
    pub fn start_listening(
        &mut self,
        params: UdpListenParams,
        receiver: Box<dyn UdpReceiver<S, I>>,
    ) -> ListenerHandle {
        let key = self.listeners.insert(ListenerSlot {
            params,
            receiver: Some(receiver),
            next: self.listeners_head,
        });
        self.listeners_head = Some(key.index);
        ListenerHandle(key)
    }

    /// Detach a listener.
    ///
    /// Legal from within a receive callback, for any attached listener
    /// including the one currently in callback; iteration continues with the
    /// removed listener's successor.
    pub fn reset_listener(&mut self, handle: ListenerHandle) {
        assert!(
            self.listeners.contains(handle.0),
            "listener is not attached"
        );
        let index = handle.0.index;
        if self.next_listener == Some(index) {
            self.next_listener = self.listeners.at(index).next;
        }
        self.unlink_listener(index);
        self.listeners.remove(handle.0);
    }

    pub fn is_listening(&self, handle: ListenerHandle) -> bool {
        self.listeners.contains(handle.0)
    }

    pub fn listener_params(&self, handle: ListenerHandle) -> &UdpListenParams {
        match self.listeners.get(handle.0) {
            Some(slot) => &slot.params,
            None => panic!("listener is not attached"),
        }
    }

    /// Attach an association, claiming its 4-tuple.
    pub fn associate(
        &mut self,
        params: UdpAssociationParams,
        receiver: Box<dyn UdpReceiver<S, I>>,
    ) -> Result<AssociationHandle, IpErr> {
        if self.index.lookup(&params.key).is_some() {
            return Err(IpErr::AddrInUse);
        }
        let key4 = params.key;
        let key = self.associations.insert(AssociationSlot {
            params,
            receiver: Some(receiver),
        });
        let handle = AssociationHandle(key);
        let inserted = self.index.insert(key4, handle);
        debug_assert!(inserted);
        Ok(handle)
    }

    /// Detach an association, releasing its 4-tuple.
    pub fn reset_association(&mut self, handle: AssociationHandle) {
        let slot = match self.associations.remove(handle.0) {
            Some(slot) => slot,
            None => panic!("association is not attached"),
        };
        let removed = self.index.remove(&slot.params.key);
        debug_assert_eq!(removed, Some(handle));
    }

    pub fn is_associated(&self, handle: AssociationHandle) -> bool {
        self.associations.contains(handle.0)
    }

    pub fn association_params(&self, handle: AssociationHandle) -> &UdpAssociationParams {
        match self.associations.get(handle.0) {
            Some(slot) => &slot.params,
            None => panic!("association is not attached"),
        }
    }

    /// Build and transmit a UDP datagram.
    ///
    /// `udp_data` references the payload and must leave
    /// [`HEADER_BEFORE_UDP_DATA`] bytes of slack in front of it within its
    /// first buffer; the UDP header is written into that slack and the
    /// combined datagram handed to the host stack. `retry` and `flags` are
    /// forwarded opaquely.
    pub fn send(
        &mut self,
        addrs: &Ip4Addrs,
        udp_info: &UdpTxInfo,
        udp_data: BufRef<'_>,
        iface: Option<IfaceId>,
        retry: Option<&mut S::Retry>,
        flags: SendFlags,
    ) -> Result<(), IpErr> {
        assert!(udp_data.total_len() <= MAX_UDP_DATA_LEN);
        assert!(udp_data.offset() >= HEADER_BEFORE_UDP_DATA);

        let dgram = udp_data.reveal_header_must(UDP_HEADER_LEN);
        let header = UdpHeader::new(&dgram);
        header.set_src_port(udp_info.src_port);
        header.set_dst_port(udp_info.dst_port);
        header.set_len(dgram.total_len() as u16);
        header.set_checksum(0);

        // Pseudo-header followed by the datagram itself. A computed zero is
        // sent as all-ones: zero on the wire always means "no checksum".
        let mut accum = checksum::Accumulator::new();
        accum.add_addr(addrs.local_addr);
        accum.add_addr(addrs.remote_addr);
        accum.add_word(u16::from(u8::from(IpProtocol::Udp)));
        accum.add_word(dgram.total_len() as u16);
        let mut checksum = accum.checksum(dgram);
        if checksum == 0 {
            checksum = 0xffff;
        }
        header.set_checksum(checksum);

        let meta = Ip4DgramMeta {
            ttl: self.config.ttl,
            protocol: IpProtocol::Udp,
        };
        self.stack
            .send_ip4_dgram(addrs, &meta, dgram, iface, retry, flags)
    }

    /// Entry point for UDP datagrams from the IP layer.
    ///
    /// `dgram` is the IP payload. Malformed or bad-checksum datagrams are
    /// dropped silently; the checksum is only computed once some receiver
    /// actually matches (or the unreachable fallback fires).
    pub fn recv(&mut self, ip_info: &Ip4RxInfo, dgram: BufRef<'_>) {
        if !dgram.has_header(UDP_HEADER_LEN) {
            net_trace!("udp: datagram too short for the header, dropping");
            return;
        }
        let header = UdpHeader::new(&dgram);
        let src_port = header.src_port();
        let dst_port = header.dst_port();

        let udp_length = usize::from(header.len());
        if udp_length < UDP_HEADER_LEN || udp_length > dgram.total_len() {
            net_trace!("udp: bad length field {}, dropping", udp_length);
            return;
        }
        let dgram = dgram.sub_to(udp_length);

        // By default a datagram is only dispatched if addressed to the
        // receiving interface; individual endpoints can opt out.
        let dst_is_iface_addr = self.stack.ip4_addr_is_local(ip_info.iface, ip_info.dst_addr);

        let mut checksum_verified = false;
        let mut has_checksum = false;
        let mut accepted = false;

        // Offer the datagram to the association claiming its 4-tuple first.
        let assoc_key = AssociationKey {
            local_addr: ip_info.dst_addr,
            remote_addr: ip_info.src_addr,
            local_port: dst_port,
            remote_port: src_port,
        };
        if let Some(handle) = self.index.lookup(&assoc_key) {
            let accept_nonlocal_dst = match self.associations.get(handle.0) {
                Some(slot) => slot.params.accept_nonlocal_dst,
                None => unreachable!("association index out of sync"),
            };
            if accept_nonlocal_dst || dst_is_iface_addr {
                if !verify_checksum_on_demand(
                    ip_info,
                    dgram,
                    &mut checksum_verified,
                    &mut has_checksum,
                ) {
                    return;
                }

                let mut receiver = match self
                    .associations
                    .get_mut(handle.0)
                    .and_then(|slot| slot.receiver.take())
                {
                    Some(receiver) => receiver,
                    None => unreachable!("association receiver already taken"),
                };
                let udp_info = UdpRxInfo {
                    src_port,
                    dst_port,
                    has_checksum,
                };
                let result =
                    receiver.recv_udp(self, ip_info, &udp_info, dgram.hide_header(UDP_HEADER_LEN));
                if let Some(slot) = self.associations.get_mut(handle.0) {
                    slot.receiver = Some(receiver);
                }

                match result {
                    RecvResult::AcceptStop => return,
                    RecvResult::AcceptContinue => accepted = true,
                    RecvResult::Reject => {}
                }
            }
        }

        // Offer it to every matching listener, most recently registered
        // first.
        debug_assert!(self.next_listener.is_none(), "nested receive dispatch");
        let mut cursor = self.listeners_head;
        while let Some(index) = cursor {
            let (params, next) = {
                let slot = self.listeners.at(index);
                (slot.params, slot.next)
            };

            let matches = (params.port == 0 || params.port == dst_port)
                && params.addr.map_or(true, |addr| addr == ip_info.dst_addr)
                && params.iface.map_or(true, |iface| iface == ip_info.iface)
                && (params.accept_nonlocal_dst || dst_is_iface_addr);
            if !matches {
                cursor = next;
                continue;
            }

            if !verify_checksum_on_demand(ip_info, dgram, &mut checksum_verified, &mut has_checksum)
            {
                return;
            }

            // Stash the successor where reset_listener can adjust it if the
            // callback removes that listener.
            self.next_listener = next;

            let key = self.listeners.key_at(index);
            let mut receiver = match self.listeners.at_mut(index).receiver.take() {
                Some(receiver) => receiver,
                None => unreachable!("listener receiver already taken"),
            };
            let udp_info = UdpRxInfo {
                src_port,
                dst_port,
                has_checksum,
            };
            let result =
                receiver.recv_udp(self, ip_info, &udp_info, dgram.hide_header(UDP_HEADER_LEN));
            if let Some(slot) = self.listeners.get_mut(key) {
                slot.receiver = Some(receiver);
            }

            cursor = self.next_listener.take();

            match result {
                RecvResult::AcceptStop => return,
                RecvResult::AcceptContinue => accepted = true,
                RecvResult::Reject => {}
            }
        }

        // Nothing claimed a datagram addressed to us: answer with ICMP Port
        // Unreachable, but never for a datagram that fails verification.
        if !accepted && dst_is_iface_addr {
            if !verify_checksum_on_demand(ip_info, dgram, &mut checksum_verified, &mut has_checksum)
            {
                return;
            }
            net_debug!(
                "udp: no receiver for {}:{}, sending port unreachable",
                ip_info.dst_addr,
                dst_port
            );
            let du_meta = Ip4DestUnreachMeta {
                icmp_code: Icmpv4DstUnreachable::PortUnreachable,
            };
            self.stack.send_ip4_dest_unreach(ip_info, dgram, &du_meta);
        }
    }

    /// Inbound ICMP Destination Unreachable quoting one of our datagrams.
    ///
    /// UDP has no connection state to tear down, so this is ignored.
    pub fn handle_dest_unreach(
        &mut self,
        _du_meta: &Ip4DestUnreachMeta,
        _ip_info: &Ip4RxInfo,
        _dgram_initial: BufRef<'_>,
    ) {
    }

    fn unlink_listener(&mut self, index: usize) {
        let next = self.listeners.at(index).next;
        if self.listeners_head == Some(index) {
            self.listeners_head = next;
            return;
        }
        let mut cursor = self.listeners_head;
        while let Some(current) = cursor {
            let current_next = self.listeners.at(current).next;
            if current_next == Some(index) {
                self.listeners.at_mut(current).next = next;
                return;
            }
            cursor = current_next;
        }
        unreachable!("listener is not on the list");
    }
}

fn verify_checksum(ip_info: &Ip4RxInfo, dgram: BufRef<'_>, has_checksum: &mut bool) -> bool {
    let header = UdpHeader::new(&dgram);
    *has_checksum = header.checksum() != 0;
    if !*has_checksum {
        return true;
    }

    let mut accum = checksum::Accumulator::new();
    accum.add_addr(ip_info.src_addr);
    accum.add_addr(ip_info.dst_addr);
    accum.add_word(u16::from(u8::from(IpProtocol::Udp)));
    accum.add_word(dgram.total_len() as u16);
    accum.checksum(dgram) == 0
}

fn verify_checksum_on_demand(
    ip_info: &Ip4RxInfo,
    dgram: BufRef<'_>,
    verified: &mut bool,
    has_checksum: &mut bool,
) -> bool {
    if *verified {
        return true;
    }
    if !verify_checksum(ip_info, dgram, has_checksum) {
        net_trace!("udp: bad checksum, dropping");
        return false;
    }
    *verified = true;
    true
}
