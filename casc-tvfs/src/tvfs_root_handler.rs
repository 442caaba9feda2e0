use crate::content_key::{ContentKey, KEY_LENGTH};
use crate::error::CascError;
use crate::ext::io_ext::SliceCursorExt;
use crate::path_table_node_flags::PathTableNodeFlags;
use crate::span_info::SpanInfo;
use std::io::Cursor;

/// `"TVFS"` read as a big-endian integer.
pub(crate) const TVFS_SIGNATURE: u32 = 0x5456_4653;

/// Container file table entries carry content keys.
pub const TVFS_FLAG_INCLUDE_CKEY: u32 = 0x01;
/// Write support enabled.
pub const TVFS_FLAG_WRITE_SUPPORT: u32 = 0x02;
/// Patch support enabled.
pub const TVFS_FLAG_PATCH_SUPPORT: u32 = 0x04;

const MIN_HEADER_SIZE: u8 = 38;
const MAX_FOLDER_DEPTH: usize = 512;
/// Span counts at or above this value are reserved markers, not file entries.
const MAX_SPAN_COUNT: u8 = 224;

/// Represents the header of a TVFS root structure in a CASC archive.
///
/// This header contains metadata about the TVFS tables and their locations.
/// All fields are big-endian on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TvfsHeader {
    pub format_version: u8,
    pub header_size: u8,
    pub encoding_key_size: u8,
    pub patch_key_size: u8,
    pub flags: u32,
    pub path_table_offset: u32,
    pub path_table_size: u32,
    pub vfs_table_offset: u32,
    pub vfs_table_size: u32,
    pub cft_table_offset: u32,
    pub cft_table_size: u32,
    pub max_depth: u16,
}

impl TvfsHeader {
    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, CascError> {
        let signature = cursor.read_uint_be(4)? as u32;
        if signature != TVFS_SIGNATURE {
            return Err(CascError::malformed(format!(
                "invalid TVFS signature {signature:#010x}"
            )));
        }
        let header = Self {
            format_version: cursor.read_byte()?,
            header_size: cursor.read_byte()?,
            encoding_key_size: cursor.read_byte()?,
            patch_key_size: cursor.read_byte()?,
            flags: cursor.read_uint_be(4)? as u32,
            path_table_offset: cursor.read_uint_be(4)? as u32,
            path_table_size: cursor.read_uint_be(4)? as u32,
            vfs_table_offset: cursor.read_uint_be(4)? as u32,
            vfs_table_size: cursor.read_uint_be(4)? as u32,
            cft_table_offset: cursor.read_uint_be(4)? as u32,
            cft_table_size: cursor.read_uint_be(4)? as u32,
            max_depth: cursor.read_uint_be(2)? as u16,
        };

        if header.format_version != 1 {
            return Err(CascError::Unsupported(format!(
                "TVFS format version {}",
                header.format_version
            )));
        }
        if header.header_size < MIN_HEADER_SIZE {
            return Err(CascError::malformed(format!(
                "TVFS header size {} is below {MIN_HEADER_SIZE}",
                header.header_size
            )));
        }
        if !(KEY_LENGTH..=16).contains(&usize::from(header.encoding_key_size)) {
            return Err(CascError::malformed(format!(
                "TVFS encoding key size {} is out of range",
                header.encoding_key_size
            )));
        }
        Ok(header)
    }

    /// Whether container file table entries carry content keys.
    pub fn includes_content_keys(&self) -> bool {
        self.flags & TVFS_FLAG_INCLUDE_CKEY != 0
    }

    fn table<'a>(&self, data: &'a [u8], offset: u32, size: u32, name: &str) -> Result<&'a [u8], CascError> {
        let start = offset as usize;
        start
            .checked_add(size as usize)
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| {
                CascError::malformed(format!(
                    "{name} table ({offset}+{size}) exceeds the {} byte TVFS root",
                    data.len()
                ))
            })
    }
}

/// Represents a node in the TVFS path table.
///
/// Each node may represent a directory or file path component, or only a
/// prefix of one: the path table is a prefix tree.
#[derive(Debug, Default, Clone)]
struct PathTableNode {
    name: String,
    flags: PathTableNodeFlags,
    value: Option<u32>,
}

/// A file entry of the path table with its full path and spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TvfsLeaf {
    pub(crate) path: String,
    pub(crate) spans: Vec<SpanInfo>,
}

/// Reads the TVFS root structure: header plus path, VFS and container file tables.
#[derive(Debug)]
pub(crate) struct TVFSRootHandler<'a> {
    header: TvfsHeader,
    path_table: &'a [u8],
    vfs_table: &'a [u8],
    cft_table: &'a [u8],
}

impl<'a> TVFSRootHandler<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Result<Self, CascError> {
        let mut cursor = Cursor::new(data);
        let header = TvfsHeader::read(&mut cursor)?;

        let path_table = header.table(data, header.path_table_offset, header.path_table_size, "path")?;
        let vfs_table = header.table(data, header.vfs_table_offset, header.vfs_table_size, "VFS")?;
        let cft_table = header.table(data, header.cft_table_offset, header.cft_table_size, "container file")?;

        Ok(Self {
            header,
            path_table,
            vfs_table,
            cft_table,
        })
    }

    pub(crate) fn header(&self) -> &TvfsHeader {
        &self.header
    }

    /// Walks the whole path table and returns every file entry in table order.
    pub(crate) fn leaves(&self) -> Result<Vec<TvfsLeaf>, CascError> {
        let mut cursor = Cursor::new(self.path_table);
        let mut leaves = Vec::new();
        let mut builder = String::with_capacity(255);
        self.parse(&mut cursor, self.path_table.len() as u64, &mut builder, 0, &mut leaves)?;
        Ok(leaves)
    }

    fn parse(
        &self,
        cursor: &mut Cursor<&'a [u8]>,
        end: u64,
        builder: &mut String,
        depth: usize,
        leaves: &mut Vec<TvfsLeaf>,
    ) -> Result<(), CascError> {
        if depth > MAX_FOLDER_DEPTH {
            return Err(CascError::malformed("TVFS path table nests too deeply"));
        }
        let current_size = builder.len();

        while cursor.position() < end {
            let entry = Self::parse_path_node(cursor, end)?;

            if entry.flags.contains(PathTableNodeFlags::PATH_SEPARATOR_PRE) {
                builder.push('\\');
            }
            builder.push_str(&entry.name);
            if entry.flags.contains(PathTableNodeFlags::PATH_SEPARATOR_POST) {
                builder.push('\\');
            }

            if let Some(value) = entry.value {
                if value & 0x8000_0000 != 0 {
                    // Folder size counts the 4-byte value already consumed.
                    let folder_size = u64::from(value & 0x7FFF_FFFF);
                    let folder_start = cursor.position();
                    let folder_end = (folder_start + folder_size)
                        .checked_sub(4)
                        .filter(|folder_end| *folder_end >= folder_start && *folder_end <= end)
                        .ok_or_else(|| {
                            CascError::malformed(format!(
                                "folder at {folder_start} with size {folder_size} overruns its parent"
                            ))
                        })?;
                    self.parse(cursor, folder_end, builder, depth + 1, leaves)?;
                    if cursor.position() != folder_end {
                        return Err(CascError::malformed(format!(
                            "folder ending at {folder_end} was overrun to {}",
                            cursor.position()
                        )));
                    }
                } else {
                    leaves.push(TvfsLeaf {
                        path: builder.clone(),
                        spans: self.read_spans(value)?,
                    });
                }
                // Reset builder to original
                builder.truncate(current_size);
            }
        }
        Ok(())
    }

    fn parse_path_node(cursor: &mut Cursor<&'a [u8]>, end: u64) -> Result<PathTableNode, CascError> {
        let mut entry = PathTableNode::default();
        let has_more = |cursor: &Cursor<&'a [u8]>| cursor.position() < end;

        if has_more(cursor) && cursor.peek_byte()? == 0 {
            entry.flags |= PathTableNodeFlags::PATH_SEPARATOR_PRE;
            cursor.skip(1)?;
        }

        if has_more(cursor) && cursor.peek_byte()? != 0xFF {
            let length = cursor.read_byte()?;
            let name = cursor.read_slice(usize::from(length))?;
            entry.name = String::from_utf8_lossy(name).into_owned();
        }

        if has_more(cursor) && cursor.peek_byte()? == 0 {
            entry.flags |= PathTableNodeFlags::PATH_SEPARATOR_POST;
            cursor.skip(1)?;
        }

        if has_more(cursor) {
            if cursor.peek_byte()? == 0xFF {
                cursor.skip(1)?;
                entry.value = Some(cursor.read_uint_be(4)? as u32);
                entry.flags |= PathTableNodeFlags::IS_NODE_VALUE;
            } else {
                entry.flags |= PathTableNodeFlags::PATH_SEPARATOR_POST;
            }
        }

        if cursor.position() > end {
            return Err(CascError::malformed(format!(
                "path node runs past its folder end {end}"
            )));
        }
        Ok(entry)
    }

    fn read_spans(&self, vfs_offset: u32) -> Result<Vec<SpanInfo>, CascError> {
        if vfs_offset as usize >= self.vfs_table.len() {
            return Err(CascError::malformed(format!(
                "dangling VFS offset {vfs_offset} (table is {} bytes)",
                self.vfs_table.len()
            )));
        }
        let mut reader = Cursor::new(self.vfs_table);
        reader.set_position(u64::from(vfs_offset));

        let span_count = reader.read_byte()?;
        if span_count == 0 || span_count >= MAX_SPAN_COUNT {
            return Err(CascError::malformed(format!(
                "invalid span count {span_count} at VFS offset {vfs_offset}"
            )));
        }

        let cft_width = Self::variable_int_width(self.header.cft_table_size);
        let key_size = usize::from(self.header.encoding_key_size);
        let mut spans = Vec::with_capacity(usize::from(span_count));
        for _ in 0..span_count {
            let file_offset = reader.read_uint_be(4)? as u32;
            let content_size = reader.read_uint_be(4)? as u32;
            let cft_offset = reader.read_uint_be(cft_width)? as usize;

            let key_bytes = cft_offset
                .checked_add(key_size)
                .and_then(|cft_end| self.cft_table.get(cft_offset..cft_end))
                .ok_or_else(|| {
                    CascError::malformed(format!(
                        "dangling container file offset {cft_offset} (table is {} bytes)",
                        self.cft_table.len()
                    ))
                })?;
            spans.push(SpanInfo {
                key: ContentKey::from_slice(key_bytes)?,
                file_offset,
                content_size,
            });
        }
        Ok(spans)
    }

    /// Width of container file table offsets, chosen by the table's size.
    fn variable_int_width(data_size: u32) -> usize {
        if data_size > 0xFF_FFFF {
            4
        } else if data_size > 0xFFFF {
            3
        } else if data_size > 0xFF {
            2
        } else {
            1
        }
    }
}
