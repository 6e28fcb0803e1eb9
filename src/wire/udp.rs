use core::cell::Cell;
use core::fmt;

use crate::buf::BufRef;
use crate::wire::field::*;

mod field {
    use crate::wire::field::*;

    pub const SRC_PORT: Field = 0..2;
    pub const DST_PORT: Field = 2..4;
    pub const LENGTH: Field = 4..6;
    pub const CHECKSUM: Field = 6..8;
}

pub const HEADER_LEN: usize = field::CHECKSUM.end;

/// In-place view of the UDP header at the front of a datagram.
///
/// The header must be contiguous in the first chunk of the range; the
/// constructor asserts [`has_header`](BufRef::has_header). Setters write
/// network byte order through the shared cells, so a view and the `BufRef`
/// it was created from may coexist.
pub struct Header<'a> {
    data: &'a [Cell<u8>],
}

impl<'a> Header<'a> {
    pub fn new(dgram: &BufRef<'a>) -> Header<'a> {
        assert!(dgram.has_header(HEADER_LEN));
        Header {
            data: &dgram.chunk()[..HEADER_LEN],
        }
    }

    fn get(&self, field: Field) -> u16 {
        u16::from_be_bytes([self.data[field.start].get(), self.data[field.start + 1].get()])
    }

    fn set(&self, field: Field, value: u16) {
        let bytes = value.to_be_bytes();
        self.data[field.start].set(bytes[0]);
        self.data[field.start + 1].set(bytes[1]);
    }

    /// Return the source port field.
    pub fn src_port(&self) -> u16 {
        self.get(field::SRC_PORT)
    }

    /// Return the destination port field.
    pub fn dst_port(&self) -> u16 {
        self.get(field::DST_PORT)
    }

    /// Return the length field (header plus payload).
    pub fn len(&self) -> u16 {
        self.get(field::LENGTH)
    }

    /// Return the checksum field; zero means no checksum was generated.
    pub fn checksum(&self) -> u16 {
        self.get(field::CHECKSUM)
    }

    /// Set the source port field.
    pub fn set_src_port(&self, value: u16) {
        self.set(field::SRC_PORT, value)
    }

    /// Set the destination port field.
    pub fn set_dst_port(&self, value: u16) {
        self.set(field::DST_PORT, value)
    }

    /// Set the length field.
    pub fn set_len(&self, value: u16) {
        self.set(field::LENGTH, value)
    }

    /// Set the checksum field.
    pub fn set_checksum(&self, value: u16) {
        self.set(field::CHECKSUM, value)
    }
}

impl fmt::Display for Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "UDP src={} dst={} len={}",
            self.src_port(),
            self.dst_port(),
            self.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::{as_cells, BufNode};

    static PACKET_BYTES: [u8; 12] = [
        0xbf, 0x00, 0x00, 0x35, 0x00, 0x0c, 0x12, 0x4d, 0xaa, 0x00, 0x00, 0xff,
    ];

    #[test]
    fn field_access() {
        let mut bytes = PACKET_BYTES;
        let cells = as_cells(&mut bytes);
        let node = BufNode::new(cells, None);
        let dgram = BufRef::new(&node, 0, 12);

        let header = Header::new(&dgram);
        assert_eq!(header.src_port(), 48896);
        assert_eq!(header.dst_port(), 53);
        assert_eq!(header.len(), 12);
        assert_eq!(header.checksum(), 0x124d);
    }

    #[test]
    fn construction() {
        let mut bytes = [0u8; 12];
        let cells = as_cells(&mut bytes);
        let node = BufNode::new(cells, None);
        let dgram = BufRef::new(&node, 0, 12);

        let header = Header::new(&dgram);
        header.set_src_port(48896);
        header.set_dst_port(53);
        header.set_len(12);
        header.set_checksum(0x124d);
        drop(header);

        let mut got = [0u8; 8];
        let mut reader = dgram;
        reader.take_bytes(&mut got);
        assert_eq!(&got[..], &PACKET_BYTES[..8]);
    }
}
