/*! Low-level packet representation.

The `wire` module provides field-level access to the packet formats this
crate touches. UDP header fields are read and written in place through a
chunk of a buffer chain ([`UdpHeader`]); the internet checksum is folded
incrementally over words and chain tails ([`checksum::Accumulator`]).

Nothing here allocates; parsing untrusted input is guarded by explicit
length checks ([`BufRef::has_header`](crate::buf::BufRef::has_header))
before any accessor runs.
*/

mod field {
    pub type Field = ::core::ops::Range<usize>;
}

pub(crate) mod ip;
pub use self::ip::Protocol as IpProtocol;

pub(crate) mod ipv4;
pub use self::ipv4::{Address as Ipv4Address, HEADER_LEN as IPV4_HEADER_LEN};

pub mod checksum;

pub(crate) mod udp;
pub use self::udp::{Header as UdpHeader, HEADER_LEN as UDP_HEADER_LEN};

mod icmpv4;
pub use self::icmpv4::DstUnreachable as Icmpv4DstUnreachable;
