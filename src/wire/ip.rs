use core::fmt;

enum_with_unknown! {
    /// Protocol number carried in the IPv4 header.
    ///
    /// Values are the IANA-assigned protocol numbers; this crate only ever
    /// produces [`Protocol::Udp`], the rest exist so that receive metadata
    /// can be named rather than numeric.
    pub enum Protocol(u8) {
        Icmp = 0x01,
        Igmp = 0x02,
        Tcp = 0x06,
        Udp = 0x11
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Protocol::Icmp => write!(f, "icmp"),
            Protocol::Igmp => write!(f, "igmp"),
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Unknown(id) => write!(f, "proto {id}"),
        }
    }
}
