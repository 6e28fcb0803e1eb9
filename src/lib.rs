/*! Zero-copy UDP over IPv4.

This crate implements the UDP protocol handler of an embedded-friendly IPv4
network stack, together with the scatter-gather buffer model it relies on:

 * The [`buf`] module provides [`BufNode`](buf::BufNode) and
   [`BufRef`](buf::BufRef), a view over a chain of caller-owned buffers that
   supports header reveal/hide, chunk iteration and byte copy-in/out without
   ever copying payload data between buffers.
 * The [`wire`] module deals with the packet representation: UDP header field
   access, the internet-checksum accumulator and the protocol-number enums.
 * The [`ip`] module defines the contract with the enclosing IPv4 stack (the
   [`IpStack`](ip::IpStack) trait) which performs datagram framing, routing
   and ICMP emission on our behalf.
 * The [`udp`] module contains [`UdpCore`](udp::UdpCore), which demultiplexes
   received datagrams to *listeners* (possibly wildcarded receivers) and
   *associations* (fully qualified 4-tuple endpoints), and builds outgoing
   datagrams in place.

All operations run to completion on a single execution context; there is no
internal locking and no suspension point inside the send or receive paths.
*/

#[macro_use]
mod macros;

pub mod buf;
pub mod ip;
pub mod udp;
pub mod wire;
