pub use core::net::Ipv4Addr as Address;

/// Length of the fixed portion of the IPv4 header.
///
/// Senders reserve this much leading slack (plus the UDP header) so that
/// lower layers can prepend their headers without copying.
pub const HEADER_LEN: usize = 20;
