enum_with_unknown! {
    /// Code field of an ICMPv4 Destination Unreachable message.
    ///
    /// The numeric values are fixed by RFC 792; only the codes this crate
    /// emits or can plausibly be handed back are named.
    pub enum DstUnreachable(u8) {
        /// "Net unreachable."
        NetUnreachable = 0,
        /// "Host unreachable."
        HostUnreachable = 1,
        /// "Protocol unreachable."
        ProtocolUnreachable = 2,
        /// "Port unreachable." Emitted for locally addressed datagrams no
        /// receiver claimed.
        PortUnreachable = 3,
        /// "Fragmentation needed and DF set."
        FragmentationNeeded = 4,
        /// "Source route failed."
        SourceRouteFailed = 5
    }
}
