//! # Wire Codec
//!
//! Compact binary form of block records used for inter-node block transfer.
//!
//! ## Layout (big-endian)
//!
//! ```text
//! string      := len:i32 bytes[len]                     (UTF-8)
//! BlockRecord := parent:string id:string SENTINEL:i64 length:i64 version:i64
//!              | parent:string id:string length:i64       (legacy, version = 0)
//! NodeBlock   := BlockRecord physical_length:i64
//! Location    := NodeBlock node:string
//! ServerBlock := BlockRecord capacity:i32 count:i32 Location[count]
//! Variant     := tag:u8 (0 Logical | 1 WithPhysical | 2 ServerTracked) body
//! ```
//!
//! The sentinel occupies the length position. Payloads written before records
//! carried a version have a real length there, so they still decode.

use std::io::{Read, Write};

use crate::entities::{
    BlockRecord, LocationRecord, NodeBlockRecord, NodeId, PhysicalInfo, RecordVariant,
    ServerBlockRecord,
};
use crate::errors::CodecError;

/// Marks that a version field follows the length.
pub const VERSION_SENTINEL: i64 = i64::MIN;

/// Upper bound for any string field.
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Upper bound for the replica count of a server record.
const MAX_LOCATIONS: i32 = 1024;

const TAG_LOGICAL: u8 = 0;
const TAG_PHYSICAL: u8 = 1;
const TAG_SERVER: u8 = 2;

/// Binary wire form of a record.
pub trait WireFormat: Sized {
    fn write_wire<W: Write>(&self, out: &mut W) -> Result<(), CodecError>;

    fn read_wire<R: Read>(input: &mut R) -> Result<Self, CodecError>;

    fn to_wire(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        self.write_wire(&mut buf)?;
        Ok(buf)
    }

    fn from_wire(mut bytes: &[u8]) -> Result<Self, CodecError> {
        Self::read_wire(&mut bytes)
    }
}

// =============================================================================
// PRIMITIVES
// =============================================================================

fn write_i64<W: Write>(out: &mut W, value: i64) -> Result<(), CodecError> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

fn read_i64<R: Read>(input: &mut R) -> Result<i64, CodecError> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

fn write_i32<W: Write>(out: &mut W, value: i32) -> Result<(), CodecError> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

fn read_i32<R: Read>(input: &mut R) -> Result<i32, CodecError> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn write_str<W: Write>(out: &mut W, value: &str) -> Result<(), CodecError> {
    if value.len() > MAX_STRING_LEN {
        return Err(CodecError::FieldTooLong {
            length: value.len(),
            limit: MAX_STRING_LEN,
        });
    }
    write_i32(out, value.len() as i32)?;
    out.write_all(value.as_bytes())?;
    Ok(())
}

fn read_str<R: Read>(input: &mut R) -> Result<String, CodecError> {
    let len = read_i32(input)?;
    if len < 0 {
        return Err(CodecError::NegativeLength(len));
    }
    let len = len as usize;
    if len > MAX_STRING_LEN {
        return Err(CodecError::FieldTooLong {
            length: len,
            limit: MAX_STRING_LEN,
        });
    }
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| CodecError::InvalidUtf8)
}

/// Write a record in the pre-versioning layout. Kept for peers that still
/// expect it; the version is dropped.
pub fn write_legacy_record<W: Write>(record: &BlockRecord, out: &mut W) -> Result<(), CodecError> {
    write_str(out, record.parent_file_name())?;
    write_str(out, record.block_id().as_str())?;
    write_i64(out, record.logical_length())
}

// =============================================================================
// RECORDS
// =============================================================================

impl WireFormat for BlockRecord {
    fn write_wire<W: Write>(&self, out: &mut W) -> Result<(), CodecError> {
        write_str(out, self.parent_file_name())?;
        write_str(out, self.block_id().as_str())?;
        write_i64(out, VERSION_SENTINEL)?;
        write_i64(out, self.logical_length())?;
        write_i64(out, self.version() as i64)
    }

    fn read_wire<R: Read>(input: &mut R) -> Result<Self, CodecError> {
        let parent = read_str(input)?;
        let id = read_str(input)?;
        let head = read_i64(input)?;
        let (length, version) = if head == VERSION_SENTINEL {
            let length = read_i64(input)?;
            let version = read_i64(input)?;
            if version < 0 {
                return Err(CodecError::NegativeVersion(version));
            }
            (length, version as u64)
        } else {
            (head, 0)
        };
        Ok(BlockRecord::new(parent, id, length).with_version(version))
    }
}

impl WireFormat for NodeBlockRecord {
    fn write_wire<W: Write>(&self, out: &mut W) -> Result<(), CodecError> {
        self.record().write_wire(out)?;
        write_i64(out, self.physical_length())
    }

    fn read_wire<R: Read>(input: &mut R) -> Result<Self, CodecError> {
        let record = BlockRecord::read_wire(input)?;
        let physical = read_i64(input)?;
        let physical = if physical < 0 {
            PhysicalInfo::absent()
        } else {
            PhysicalInfo::present(physical)
        };
        Ok(NodeBlockRecord::new(record, physical))
    }
}

impl WireFormat for LocationRecord {
    fn write_wire<W: Write>(&self, out: &mut W) -> Result<(), CodecError> {
        self.block().write_wire(out)?;
        write_str(out, self.node().as_str())
    }

    fn read_wire<R: Read>(input: &mut R) -> Result<Self, CodecError> {
        let block = NodeBlockRecord::read_wire(input)?;
        let node = NodeId::new(read_str(input)?);
        Ok(LocationRecord::from_node_record(node, &block))
    }
}

impl WireFormat for ServerBlockRecord {
    fn write_wire<W: Write>(&self, out: &mut W) -> Result<(), CodecError> {
        self.record().write_wire(out)?;
        let locations = self.locations();
        write_i32(out, self.replica_capacity() as i32)?;
        write_i32(out, locations.len() as i32)?;
        for location in &locations {
            location.write_wire(out)?;
        }
        Ok(())
    }

    fn read_wire<R: Read>(input: &mut R) -> Result<Self, CodecError> {
        let record = BlockRecord::read_wire(input)?;
        let capacity = read_i32(input)?;
        let count = read_i32(input)?;
        if capacity < 0 {
            return Err(CodecError::NegativeLength(capacity));
        }
        if count < 0 {
            return Err(CodecError::NegativeLength(count));
        }
        if count > MAX_LOCATIONS {
            return Err(CodecError::FieldTooLong {
                length: count as usize,
                limit: MAX_LOCATIONS as usize,
            });
        }
        let server =
            ServerBlockRecord::with_capacity(record, (capacity as usize).max(count as usize));
        for _ in 0..count {
            server.attach(LocationRecord::read_wire(input)?);
        }
        Ok(server)
    }
}

impl WireFormat for RecordVariant {
    fn write_wire<W: Write>(&self, out: &mut W) -> Result<(), CodecError> {
        match self {
            RecordVariant::Logical(r) => {
                out.write_all(&[TAG_LOGICAL])?;
                r.write_wire(out)
            }
            RecordVariant::WithPhysical(n) => {
                out.write_all(&[TAG_PHYSICAL])?;
                n.write_wire(out)
            }
            RecordVariant::ServerTracked(s) => {
                out.write_all(&[TAG_SERVER])?;
                s.write_wire(out)
            }
        }
    }

    fn read_wire<R: Read>(input: &mut R) -> Result<Self, CodecError> {
        let mut tag = [0u8; 1];
        input.read_exact(&mut tag)?;
        match tag[0] {
            TAG_LOGICAL => Ok(RecordVariant::Logical(BlockRecord::read_wire(input)?)),
            TAG_PHYSICAL => Ok(RecordVariant::WithPhysical(NodeBlockRecord::read_wire(
                input,
            )?)),
            TAG_SERVER => Ok(RecordVariant::ServerTracked(ServerBlockRecord::read_wire(
                input,
            )?)),
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}
