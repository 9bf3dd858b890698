//! Versioned binary encoding of selections.
//!
//! All integers are little-endian. Every encoding starts with the selection type
//! tag and the format version as `u32` values:
//!
//! - `None` / `All`: `tag, version = 1, reserved = 0, length = 0`.
//! - Version 1 (irregular form only): `reserved u32, length u32, rank u32,
//!   nblocks u32`, then per block `start[rank]` and `end[rank]` as `u32`.
//!   `length` counts the bytes following the length field.
//! - Version 2 (regular form only): `flags u8, length u32, rank u32`, then per
//!   dimension `start, stride, count, block` as `u64`.
//! - Version 3: `flags u8, enc_size u8, rank u32`, then either the regular form
//!   (four `enc_size`-byte values per dimension) or the irregular form
//!   (`nblocks`, then per block `start[rank]` and `end[rank]`, all `enc_size`
//!   bytes wide). In the regular form the all-ones value stands for
//!   [`UNLIMITED`].
//!
//! The encoder picks the lowest version able to represent the selection, then
//! applies the bounds of the [`CodecConfig`].

use std::{borrow::Cow, rc::Rc};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hyperslab_common::{
    Result,
    error::Error,
    try_or_ret_some_err, verify_data,
};
use log::debug;

use crate::{
    MAX_RANK,
    block::Block,
    config::CodecConfig,
    epoch::Epoch,
    regular::{HyperslabDim, RegularDescriptor, UNLIMITED},
    selection::{RegularBlocks, SelectOp, Selection, SelectionKind},
    span::SpanList,
};

const TAG_NONE: u32 = 0;
const TAG_HYPERSLAB: u32 = 2;
const TAG_ALL: u32 = 3;

const FLAG_REGULAR: u8 = 0x01;

const U32_MAX: u64 = u32::MAX as u64;

/// Version of the binary selection format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum FormatVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
}

impl FormatVersion {
    pub fn from_u32(value: u32) -> Option<FormatVersion> {
        match value {
            1 => Some(FormatVersion::V1),
            2 => Some(FormatVersion::V2),
            3 => Some(FormatVersion::V3),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

enum BlockSource<'a> {
    Regular(Cow<'a, RegularDescriptor>),
    Tree(Rc<SpanList>),
}

enum Layout<'a> {
    Empty { tag: u32 },
    Regular { desc: Cow<'a, RegularDescriptor> },
    Blocks { source: BlockSource<'a>, nblocks: u64 },
}

/// The version, value width and layout chosen for one selection.
struct Plan<'a> {
    version: FormatVersion,
    enc_size: u8,
    rank: usize,
    layout: Layout<'a>,
}

/// Smallest value width in {2, 4, 8} that keeps the all-ones value free.
fn enc_size_for(max_value: u64) -> u8 {
    if max_value < u64::from(u16::MAX) {
        2
    } else if max_value < U32_MAX {
        4
    } else {
        8
    }
}

fn malformed(message: impl Into<String>) -> Error {
    Error::invalid_format("selection", message)
}

fn check_bounds(required: FormatVersion, config: &CodecConfig) -> Result<FormatVersion> {
    let version = required.max(config.low_bound);
    if version > config.high_bound {
        return Err(Error::encoding_overflow(
            version as u8,
            config.high_bound as u8,
        ));
    }
    Ok(version)
}

/// Payload size of a version 1 encoding after its length field.
fn v1_length(rank: usize, nblocks: u64) -> Option<u64> {
    nblocks
        .checked_mul(rank as u64 * 8)
        .and_then(|v| v.checked_add(8))
}

impl Selection {
    fn plan(&self, config: &CodecConfig) -> Result<Plan<'_>> {
        config.validate()?;
        let rank = self.rank();
        let h = match self.kind() {
            SelectionKind::None | SelectionKind::All => {
                let tag = if matches!(self.kind(), SelectionKind::None) {
                    TAG_NONE
                } else {
                    TAG_ALL
                };
                return Ok(Plan {
                    version: FormatVersion::V1,
                    enc_size: 4,
                    rank,
                    layout: Layout::Empty { tag },
                });
            }
            SelectionKind::Hyperslab(h) => h,
        };

        let plan = match (h.regular_view(), &h.spans) {
            (Some(desc), _) => {
                let nblocks = desc
                    .opt()
                    .iter()
                    .try_fold(1u64, |acc, d| acc.checked_mul(d.count));
                let fits_v1 = h.unlimited_dim.is_none()
                    && desc
                        .app()
                        .iter()
                        .all(|d| d.start.max(d.stride).max(d.count).max(d.block) <= U32_MAX)
                    && desc.high_bounds().iter().all(|&hi| hi <= U32_MAX)
                    && nblocks.and_then(|n| v1_length(rank, n)).is_some_and(|len| len <= U32_MAX);
                let required = if fits_v1 {
                    FormatVersion::V1
                } else {
                    FormatVersion::V2
                };
                let version = check_bounds(required, config)?;
                match (version, nblocks) {
                    (FormatVersion::V1, Some(nblocks)) => Plan {
                        version,
                        enc_size: 4,
                        rank,
                        layout: Layout::Blocks {
                            source: BlockSource::Regular(desc),
                            nblocks,
                        },
                    },
                    _ => {
                        let max_value = desc
                            .app()
                            .iter()
                            .flat_map(|d| [d.start, d.stride, d.count, d.block])
                            .filter(|&v| v != UNLIMITED)
                            .max()
                            .unwrap_or(0);
                        Plan {
                            version,
                            enc_size: if version == FormatVersion::V3 {
                                enc_size_for(max_value)
                            } else {
                                8
                            },
                            rank,
                            layout: Layout::Regular { desc },
                        }
                    }
                }
            }
            (None, Some(tree)) => {
                let nblocks = tree.num_blocks(Epoch::next());
                let max_high = tree.high_bounds().iter().copied().max().unwrap_or(0);
                let fits_v1 = max_high <= U32_MAX
                    && v1_length(rank, nblocks).is_some_and(|len| len <= U32_MAX);
                let required = if fits_v1 {
                    FormatVersion::V1
                } else {
                    FormatVersion::V3
                };
                let mut version = required.max(config.low_bound);
                if version == FormatVersion::V2 {
                    version = FormatVersion::V3;
                }
                let version = check_bounds(version, config)?;
                Plan {
                    version,
                    enc_size: if version == FormatVersion::V3 {
                        enc_size_for(nblocks.max(max_high))
                    } else {
                        4
                    },
                    rank,
                    layout: Layout::Blocks {
                        source: BlockSource::Tree(tree.clone()),
                        nblocks,
                    },
                }
            }
            (None, None) => return Err(Error::invalid_operation("hyperslab without content")),
        };
        debug!(
            "encoding rank {} hyperslab with format version {:?} ({}-byte values)",
            rank, plan.version, plan.enc_size
        );
        Ok(plan)
    }

    /// The format version the encoder would choose under `config`.
    pub fn encoding_version(&self, config: &CodecConfig) -> Result<FormatVersion> {
        Ok(self.plan(config)?.version)
    }

    /// Encoded size in bytes with the default configuration.
    pub fn serial_size(&self) -> Result<usize> {
        self.serial_size_with(&CodecConfig::default())
    }

    pub fn serial_size_with(&self, config: &CodecConfig) -> Result<usize> {
        plan_size(&self.plan(config)?)
    }

    /// Encodes the selection with the default configuration.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(&CodecConfig::default())
    }

    pub fn encode_with(&self, config: &CodecConfig) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf, config)?;
        Ok(buf)
    }

    /// Appends the encoding of the selection to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>, config: &CodecConfig) -> Result<()> {
        let plan = self.plan(config)?;
        let size = plan_size(&plan)?;
        buf.try_reserve(size)
            .map_err(|e| Error::allocation("encoded selection", e))?;
        write_plan(&plan, buf)
    }

    /// Decodes a selection of `extent` from `buf`.
    ///
    /// Regular encodings are installed as one hyperslab; irregular encodings are
    /// rebuilt by setting the first block and OR-ing every following one.
    pub fn decode(buf: &[u8], extent: impl Into<Vec<u64>>) -> Result<Selection> {
        let extent = extent.into();
        let mut reader = buf;
        let tag = reader.read_u32::<LittleEndian>()?;
        let version = reader.read_u32::<LittleEndian>()?;
        match tag {
            TAG_NONE | TAG_ALL => {
                verify_data!(version, version == 1);
                let _reserved = reader.read_u32::<LittleEndian>()?;
                let length = reader.read_u32::<LittleEndian>()?;
                verify_data!(length, length == 0);
                Ok(if tag == TAG_NONE {
                    Selection::none(extent)
                } else {
                    Selection::all(extent)
                })
            }
            TAG_HYPERSLAB => match FormatVersion::from_u32(version) {
                Some(FormatVersion::V1) => decode_v1(&mut reader, extent),
                Some(FormatVersion::V2) => decode_v2(&mut reader, extent),
                Some(FormatVersion::V3) => decode_v3(&mut reader, extent),
                None => Err(malformed(format!("unknown hyperslab format version {version}"))),
            },
            _ => Err(malformed(format!("unknown selection type {tag}"))),
        }
    }
}

fn plan_size(plan: &Plan<'_>) -> Result<usize> {
    let rank = plan.rank as u64;
    let enc = u64::from(plan.enc_size);
    let size = match (&plan.layout, plan.version) {
        (Layout::Empty { .. }, _) => Some(16),
        (Layout::Blocks { nblocks, .. }, FormatVersion::V1) => {
            v1_length(plan.rank, *nblocks).map(|len| len + 16)
        }
        (Layout::Regular { .. }, FormatVersion::V2) => Some(17 + rank * 32),
        (Layout::Regular { .. }, _) => Some(14 + rank * 4 * enc),
        (Layout::Blocks { nblocks, .. }, _) => nblocks
            .checked_mul(rank * 2 * enc)
            .and_then(|v| v.checked_add(14 + enc)),
    };
    size.and_then(|s| usize::try_from(s).ok())
        .ok_or_else(|| Error::invalid_operation("selection encoding exceeds the address space"))
}

fn write_value(buf: &mut Vec<u8>, value: u64, enc_size: u8) -> Result<()> {
    match enc_size {
        2 => buf.write_u16::<LittleEndian>(if value == UNLIMITED {
            u16::MAX
        } else {
            value as u16
        })?,
        4 => buf.write_u32::<LittleEndian>(if value == UNLIMITED {
            u32::MAX
        } else {
            value as u32
        })?,
        _ => buf.write_u64::<LittleEndian>(value)?,
    }
    Ok(())
}

fn write_blocks(
    buf: &mut Vec<u8>,
    blocks: impl Iterator<Item = Block>,
    enc_size: u8,
) -> Result<()> {
    for block in blocks {
        for &v in block.start.iter().chain(&block.end) {
            write_value(buf, v, enc_size)?;
        }
    }
    Ok(())
}

fn write_plan(plan: &Plan<'_>, buf: &mut Vec<u8>) -> Result<()> {
    let rank = plan.rank as u32;
    match &plan.layout {
        Layout::Empty { tag } => {
            buf.write_u32::<LittleEndian>(*tag)?;
            buf.write_u32::<LittleEndian>(1)?;
            buf.write_u32::<LittleEndian>(0)?;
            buf.write_u32::<LittleEndian>(0)?;
            return Ok(());
        }
        Layout::Regular { .. } | Layout::Blocks { .. } => {
            buf.write_u32::<LittleEndian>(TAG_HYPERSLAB)?;
            buf.write_u32::<LittleEndian>(plan.version.as_u32())?;
        }
    }

    match (&plan.layout, plan.version) {
        (Layout::Blocks { source, nblocks }, FormatVersion::V1) => {
            let length = v1_length(plan.rank, *nblocks)
                .and_then(|len| u32::try_from(len).ok())
                .ok_or_else(|| Error::encoding_overflow(3, 1))?;
            buf.write_u32::<LittleEndian>(0)?;
            buf.write_u32::<LittleEndian>(length)?;
            buf.write_u32::<LittleEndian>(rank)?;
            buf.write_u32::<LittleEndian>(*nblocks as u32)?;
            write_source(buf, source, 4)?;
        }
        (Layout::Regular { desc }, FormatVersion::V2) => {
            buf.write_u8(FLAG_REGULAR)?;
            buf.write_u32::<LittleEndian>(4 + rank * 32)?;
            buf.write_u32::<LittleEndian>(rank)?;
            for d in desc.app() {
                for v in [d.start, d.stride, d.count, d.block] {
                    buf.write_u64::<LittleEndian>(v)?;
                }
            }
        }
        (Layout::Regular { desc }, _) => {
            buf.write_u8(FLAG_REGULAR)?;
            buf.write_u8(plan.enc_size)?;
            buf.write_u32::<LittleEndian>(rank)?;
            for d in desc.app() {
                for v in [d.start, d.stride, d.count, d.block] {
                    write_value(buf, v, plan.enc_size)?;
                }
            }
        }
        (Layout::Blocks { source, nblocks }, _) => {
            buf.write_u8(0)?;
            buf.write_u8(plan.enc_size)?;
            buf.write_u32::<LittleEndian>(rank)?;
            write_value(buf, *nblocks, plan.enc_size)?;
            write_source(buf, source, plan.enc_size)?;
        }
        (Layout::Empty { .. }, _) => {}
    }
    Ok(())
}

fn write_source(buf: &mut Vec<u8>, source: &BlockSource<'_>, enc_size: u8) -> Result<()> {
    match source {
        BlockSource::Regular(desc) => write_blocks(buf, RegularBlocks::new(desc.opt()), enc_size),
        BlockSource::Tree(tree) => write_blocks(buf, tree.blocks(), enc_size),
    }
}

/// Reads one value of `enc_size` bytes without sentinel translation.
fn read_raw(reader: &mut &[u8], enc_size: u8) -> Result<u64> {
    Ok(match enc_size {
        2 => u64::from(reader.read_u16::<LittleEndian>()?),
        4 => u64::from(reader.read_u32::<LittleEndian>()?),
        _ => reader.read_u64::<LittleEndian>()?,
    })
}

/// Reads one regular-form value, mapping the all-ones value to [`UNLIMITED`].
fn read_dim_value(reader: &mut &[u8], enc_size: u8) -> Result<u64> {
    let value = read_raw(reader, enc_size)?;
    let all_ones = match enc_size {
        2 => u64::from(u16::MAX),
        4 => U32_MAX,
        _ => u64::MAX,
    };
    Ok(if value == all_ones { UNLIMITED } else { value })
}

fn check_rank(rank: u32, extent: &[u64]) -> Result<usize> {
    let rank = rank as usize;
    verify_data!(rank, (1..=MAX_RANK).contains(&rank));
    if rank != extent.len() {
        return Err(malformed(format!(
            "encoded rank {rank} does not match the extent rank {}",
            extent.len()
        )));
    }
    Ok(rank)
}

/// Decoded blocks of the irregular form.
struct BlockReader<'r, 'b> {
    reader: &'r mut &'b [u8],
    rank: usize,
    enc_size: u8,
    remaining: u64,
}

impl BlockReader<'_, '_> {
    fn read_block(&mut self) -> Result<Block> {
        let mut coords = Vec::with_capacity(self.rank * 2);
        for _ in 0..self.rank * 2 {
            coords.push(read_raw(self.reader, self.enc_size)?);
        }
        let end = coords.split_off(self.rank);
        if coords.iter().zip(&end).any(|(s, e)| s > e) {
            return Err(malformed("block start is above its end"));
        }
        if end.contains(&UNLIMITED) {
            return Err(malformed("block end reaches the unlimited sentinel"));
        }
        Ok(Block::new(coords, end))
    }
}

impl Iterator for BlockReader<'_, '_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Result<Block>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let block = try_or_ret_some_err!(self.read_block());
        Some(Ok(block))
    }
}

fn decode_blocks(
    reader: &mut &[u8],
    extent: Vec<u64>,
    rank: usize,
    nblocks: u64,
    enc_size: u8,
) -> Result<Selection> {
    let needed = nblocks
        .checked_mul(rank as u64 * 2 * u64::from(enc_size))
        .ok_or_else(|| malformed("block count overflows the buffer size"))?;
    if (reader.len() as u64) < needed {
        return Err(malformed("truncated buffer"));
    }
    let mut blocks = Vec::new();
    blocks
        .try_reserve(nblocks as usize)
        .map_err(|e| Error::allocation("decoded selection blocks", e))?;
    for block in (BlockReader {
        reader,
        rank,
        enc_size,
        remaining: nblocks,
    }) {
        blocks.push(block?);
    }

    let mut selection = Selection::none(extent);
    for (i, block) in blocks.iter().enumerate() {
        let dims = block
            .start
            .iter()
            .zip(&block.end)
            .map(|(&s, &e)| HyperslabDim::inclusive(s, e))
            .collect::<Vec<_>>();
        let op = if i == 0 { SelectOp::Set } else { SelectOp::Or };
        selection
            .select_hyperslab_dims(op, &dims)
            .map_err(|e| malformed(e.to_string()))?;
    }
    Ok(selection)
}

fn decode_regular(extent: Vec<u64>, dims: Vec<HyperslabDim>) -> Result<Selection> {
    let mut selection = Selection::none(extent);
    selection
        .select_hyperslab_dims(SelectOp::Set, &dims)
        .map_err(|e| malformed(e.to_string()))?;
    Ok(selection)
}

fn decode_v1(reader: &mut &[u8], extent: Vec<u64>) -> Result<Selection> {
    let _reserved = reader.read_u32::<LittleEndian>()?;
    let length = reader.read_u32::<LittleEndian>()?;
    let rank = check_rank(reader.read_u32::<LittleEndian>()?, &extent)?;
    let nblocks = u64::from(reader.read_u32::<LittleEndian>()?);
    verify_data!(length, v1_length(rank, nblocks) == Some(u64::from(length)));
    decode_blocks(reader, extent, rank, nblocks, 4)
}

fn decode_v2(reader: &mut &[u8], extent: Vec<u64>) -> Result<Selection> {
    let flags = reader.read_u8()?;
    let length = reader.read_u32::<LittleEndian>()?;
    let rank = check_rank(reader.read_u32::<LittleEndian>()?, &extent)?;
    verify_data!(flags, flags & FLAG_REGULAR != 0);
    verify_data!(length, u64::from(length) == 4 + rank as u64 * 32);
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        let start = reader.read_u64::<LittleEndian>()?;
        let stride = reader.read_u64::<LittleEndian>()?;
        let count = reader.read_u64::<LittleEndian>()?;
        let block = reader.read_u64::<LittleEndian>()?;
        dims.push(HyperslabDim::new(start, stride, count, block));
    }
    decode_regular(extent, dims)
}

fn decode_v3(reader: &mut &[u8], extent: Vec<u64>) -> Result<Selection> {
    let flags = reader.read_u8()?;
    let enc_size = reader.read_u8()?;
    verify_data!(enc_size, matches!(enc_size, 2 | 4 | 8));
    let rank = check_rank(reader.read_u32::<LittleEndian>()?, &extent)?;
    if flags & FLAG_REGULAR != 0 {
        let mut dims = Vec::with_capacity(rank);
        for _ in 0..rank {
            let start = read_dim_value(reader, enc_size)?;
            let stride = read_dim_value(reader, enc_size)?;
            let count = read_dim_value(reader, enc_size)?;
            let block = read_dim_value(reader, enc_size)?;
            dims.push(HyperslabDim::new(start, stride, count, block));
        }
        decode_regular(extent, dims)
    } else {
        let nblocks = read_raw(reader, enc_size)?;
        decode_blocks(reader, extent, rank, nblocks, enc_size)
    }
}

#[cfg(test)]
mod tests {
    use hyperslab_common::error::ErrorKind;

    use super::*;

    fn checkerboard() -> Selection {
        let mut sel = Selection::hyperslab(vec![6, 6], &[0, 0], None, &[1, 1], Some(&[2, 2])).unwrap();
        sel.select_hyperslab(SelectOp::Or, &[3, 3], None, &[1, 1], Some(&[3, 2]))
            .unwrap();
        sel
    }

    #[test]
    fn test_none_and_all_headers() {
        let bytes = Selection::none(vec![3]).encode().unwrap();
        assert_eq!(bytes, [0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let all = Selection::decode(&Selection::all(vec![3]).encode().unwrap(), vec![3]).unwrap();
        assert_eq!(all.num_elements(), 3);
    }

    #[test]
    fn test_regular_defaults_to_version_1_blocks() {
        let sel = Selection::hyperslab(vec![10], &[1], Some(&[4]), &[2], Some(&[2])).unwrap();
        let bytes = sel.encode().unwrap();
        assert_eq!(sel.encoding_version(&CodecConfig::default()).unwrap(), FormatVersion::V1);
        assert_eq!(bytes.len(), 24 + 2 * 8);
        assert_eq!(&bytes[0..8], &[2, 0, 0, 0, 1, 0, 0, 0]);
        // nblocks
        assert_eq!(&bytes[20..24], &[2, 0, 0, 0]);
        // second block [5, 6]
        assert_eq!(&bytes[32..40], &[5, 0, 0, 0, 6, 0, 0, 0]);
        assert_eq!(sel.serial_size().unwrap(), bytes.len());
    }

    #[test]
    fn test_unlimited_requires_version_2() {
        let sel = Selection::hyperslab(vec![10], &[0], Some(&[3]), &[UNLIMITED], Some(&[2])).unwrap();
        assert_eq!(sel.encoding_version(&CodecConfig::default()).unwrap(), FormatVersion::V2);
        let bytes = sel.encode().unwrap();
        assert_eq!(bytes.len(), 17 + 32);
        let decoded = Selection::decode(&bytes, vec![10]).unwrap();
        assert_eq!(decoded.unlimited_dim(), Some(0));
        assert_eq!(decoded.regular_hyperslab(), sel.regular_hyperslab());

        let v1_only = CodecConfig::with_bounds(FormatVersion::V1, FormatVersion::V1).unwrap();
        let err = sel.encode_with(&v1_only).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::EncodingOverflow {
                required: 2,
                allowed: 1
            }
        ));
    }

    #[test]
    fn test_version_3_widths() {
        let config = CodecConfig::with_bounds(FormatVersion::V3, FormatVersion::V3).unwrap();
        let small = Selection::hyperslab(vec![100], &[1], Some(&[3]), &[UNLIMITED], Some(&[2])).unwrap();
        let bytes = small.encode_with(&config).unwrap();
        assert_eq!(bytes[9], 2);
        assert_eq!(bytes.len(), 14 + 4 * 2);
        assert_eq!(&bytes[18..20], &[0xff, 0xff]);
        let decoded = Selection::decode(&bytes, vec![100]).unwrap();
        assert_eq!(decoded.regular_hyperslab(), small.regular_hyperslab());

        let wide = Selection::hyperslab(vec![1 << 40], &[1 << 33], None, &[4], None).unwrap();
        let bytes = wide.encode_with(&config).unwrap();
        assert_eq!(bytes[9], 8);
    }

    #[test]
    fn test_irregular_round_trips() {
        let sel = checkerboard();
        for (low, high) in [
            (FormatVersion::V1, FormatVersion::V3),
            (FormatVersion::V2, FormatVersion::V3),
        ] {
            let config = CodecConfig::with_bounds(low, high).unwrap();
            let bytes = sel.encode_with(&config).unwrap();
            let expected = if low == FormatVersion::V1 { 1 } else { 3 };
            assert_eq!(bytes[4], expected);
            let decoded = Selection::decode(&bytes, vec![6, 6]).unwrap();
            assert_eq!(decoded.num_elements(), sel.num_elements());
            assert_eq!(decoded.block_list().unwrap(), sel.block_list().unwrap());
        }
        let v2_only = CodecConfig::with_bounds(FormatVersion::V2, FormatVersion::V2).unwrap();
        assert!(sel.encode_with(&v2_only).is_err());
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        let bytes = checkerboard().encode().unwrap();
        let err = Selection::decode(&bytes[..bytes.len() - 1], vec![6, 6]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }));
        assert!(Selection::decode(&bytes, vec![6]).is_err());

        let mut bad_tag = bytes.clone();
        bad_tag[0] = 7;
        assert!(Selection::decode(&bad_tag, vec![6, 6]).is_err());

        let mut bad_version = bytes;
        bad_version[4] = 9;
        assert!(Selection::decode(&bad_version, vec![6, 6]).is_err());
    }

    /// Version 3 irregular buffer of rank 1 with 8-byte values and one block.
    fn v3_single_block(start: u64, end: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(2).unwrap();
        buf.write_u32::<LittleEndian>(3).unwrap();
        buf.write_u8(0).unwrap();
        buf.write_u8(8).unwrap();
        buf.write_u32::<LittleEndian>(1).unwrap();
        for v in [1, start, end] {
            buf.write_u64::<LittleEndian>(v).unwrap();
        }
        buf
    }

    #[test]
    fn test_decode_rejects_block_ending_at_sentinel() {
        let ok = Selection::decode(&v3_single_block(1, 20), vec![1 << 40]).unwrap();
        assert_eq!(ok.num_elements(), 20);
        assert_eq!(ok.unlimited_dim(), None);

        for start in [0, 1] {
            let err = Selection::decode(&v3_single_block(start, u64::MAX), vec![1 << 40]).unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }), "start {start}");
        }
        let err = Selection::decode(&v3_single_block(9, 3), vec![1 << 40]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }));
    }
}
