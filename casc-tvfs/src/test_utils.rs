//! Fixture writers shared by the unit tests.

use crate::content_key::{ContentKey, KEY_LENGTH};
use crate::guarded_block::encode_block;
use crate::storage::{Storage, StorageParams};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) fn key(n: u8) -> ContentKey {
    ContentKey::new([n, 0xC0, 0xFF, 0xEE, 0x00, 0x11, 0x22, 0x33, n])
}

pub(crate) enum TvfsNodeSpec {
    File(String, Vec<(ContentKey, u32)>),
    Dir(String, Vec<TvfsNodeSpec>),
}

impl TvfsNodeSpec {
    pub(crate) fn file(name: &str, spans: &[(ContentKey, u32)]) -> Self {
        TvfsNodeSpec::File(name.to_string(), spans.to_vec())
    }

    pub(crate) fn dir(name: &str, children: Vec<TvfsNodeSpec>) -> Self {
        TvfsNodeSpec::Dir(name.to_string(), children)
    }
}

/// Builds a TVFS root in the layout `header | path table | VFS table | CFT`.
///
/// `tests/common/mod.rs` writes the same layout from full paths for the
/// integration tests; keep the CFT entry size and header fields in step.
#[derive(Default)]
pub(crate) struct TvfsTableBuilder {
    nodes: Vec<TvfsNodeSpec>,
}

const CFT_ENTRY_SIZE: usize = KEY_LENGTH + 4;

impl TvfsTableBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn node(mut self, node: TvfsNodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut files = Vec::new();
        collect_files(&self.nodes, &mut files);
        let span_total: usize = files.iter().map(|spans| spans.len()).sum();
        let cft_size = span_total * CFT_ENTRY_SIZE;

        let mut vfs = Vec::new();
        let mut cft = Vec::new();
        let mut vfs_offsets = Vec::new();
        for spans in &files {
            vfs_offsets.push(vfs.len() as u32);
            vfs.extend(vfs_entry(spans, &mut cft, cft_size));
        }

        let mut next_file = 0;
        let path = encode_nodes(&self.nodes, &vfs_offsets, &mut next_file);
        assemble(&path, &vfs, &cft)
    }

    /// Wraps a hand-written path table; every leaf should point at VFS offset 0,
    /// which holds one entry made of `spans`.
    pub(crate) fn raw(path_table: Vec<u8>, spans: Vec<(ContentKey, u32)>) -> Vec<u8> {
        let cft_size = spans.len() * CFT_ENTRY_SIZE;
        let mut cft = Vec::new();
        let vfs = vfs_entry(&spans, &mut cft, cft_size);
        assemble(&path_table, &vfs, &cft)
    }
}

fn collect_files(nodes: &[TvfsNodeSpec], files: &mut Vec<Vec<(ContentKey, u32)>>) {
    for node in nodes {
        match node {
            TvfsNodeSpec::File(_, spans) => files.push(spans.clone()),
            TvfsNodeSpec::Dir(_, children) => collect_files(children, files),
        }
    }
}

fn vfs_entry(spans: &[(ContentKey, u32)], cft: &mut Vec<u8>, cft_size: usize) -> Vec<u8> {
    let width = if cft_size > 0xFF_FFFF {
        4
    } else if cft_size > 0xFFFF {
        3
    } else if cft_size > 0xFF {
        2
    } else {
        1
    };
    let mut entry = vec![spans.len() as u8];
    let mut file_offset = 0u32;
    for (key, size) in spans {
        entry.extend_from_slice(&file_offset.to_be_bytes());
        entry.extend_from_slice(&size.to_be_bytes());
        let cft_offset = cft.len() as u32;
        entry.extend_from_slice(&cft_offset.to_be_bytes()[4 - width..]);
        cft.extend_from_slice(key.as_bytes());
        cft.extend_from_slice(&size.to_be_bytes());
        file_offset += size;
    }
    entry
}

fn encode_nodes(nodes: &[TvfsNodeSpec], vfs_offsets: &[u32], next_file: &mut usize) -> Vec<u8> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            TvfsNodeSpec::File(name, _) => {
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
                out.push(0xFF);
                out.extend_from_slice(&vfs_offsets[*next_file].to_be_bytes());
                *next_file += 1;
            }
            TvfsNodeSpec::Dir(name, children) => {
                let body = encode_nodes(children, vfs_offsets, next_file);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
                out.push(0x00);
                out.push(0xFF);
                out.extend_from_slice(&(0x8000_0000u32 | (body.len() as u32 + 4)).to_be_bytes());
                out.extend(body);
            }
        }
    }
    out
}

fn assemble(path: &[u8], vfs: &[u8], cft: &[u8]) -> Vec<u8> {
    let header_size = 38u32;
    let path_offset = header_size;
    let vfs_offset = path_offset + path.len() as u32;
    let cft_offset = vfs_offset + vfs.len() as u32;

    let mut out = Vec::new();
    out.extend_from_slice(b"TVFS");
    out.extend_from_slice(&[1, header_size as u8, KEY_LENGTH as u8, KEY_LENGTH as u8]);
    out.extend_from_slice(&0u32.to_be_bytes());
    for value in [
        path_offset,
        path.len() as u32,
        vfs_offset,
        vfs.len() as u32,
        cft_offset,
        cft.len() as u32,
    ] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(path);
    out.extend_from_slice(vfs);
    out.extend_from_slice(cft);
    out
}

/// Builds a `.idx` key mapping table with 9-byte keys, 5-byte offsets,
/// 4-byte sizes and 30 file-offset bits.
pub(crate) fn index_table(entries: &[(ContentKey, u16, u64, u32)]) -> Vec<u8> {
    let mut header = Vec::new();
    header.extend_from_slice(&7u16.to_le_bytes());
    header.extend_from_slice(&[0, 0, 4, 5, KEY_LENGTH as u8, 30]);
    header.extend_from_slice(&0x4000_0000u64.to_le_bytes());

    let mut body = Vec::new();
    for (key, archive, offset, size) in entries {
        body.extend_from_slice(key.as_bytes());
        let packed = (u64::from(*archive) << 30) | offset;
        body.extend_from_slice(&packed.to_be_bytes()[3..]);
        body.extend_from_slice(&size.to_le_bytes());
    }

    let mut out = encode_block(&header).unwrap();
    out.resize(0x20, 0);
    out.extend(encode_block(&body).unwrap());
    out
}

/// Encodes a BLTE stream with a frame table. Mode `b'Z'` compresses with zlib.
pub(crate) fn blte(frames: &[(u8, &[u8])]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = frames
        .iter()
        .map(|(mode, content)| {
            let mut frame = vec![*mode];
            if *mode == b'Z' {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(content).unwrap();
                frame.extend(encoder.finish().unwrap());
            } else {
                frame.extend_from_slice(content);
            }
            frame
        })
        .collect();

    let mut out = b"BLTE".to_vec();
    out.extend_from_slice(&(12 + 24 * frames.len() as u32).to_be_bytes());
    out.push(0x0F);
    out.extend_from_slice(&(frames.len() as u32).to_be_bytes()[1..]);
    for (frame, (_, content)) in encoded.iter().zip(frames) {
        out.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        out.extend_from_slice(&(content.len() as u32).to_be_bytes());
        out.extend_from_slice(&md5::compute(frame).0);
    }
    for frame in encoded {
        out.extend(frame);
    }
    out
}

/// Prefixes `body` with the 30-byte local header archives store before content.
pub(crate) fn local_header(key: &ContentKey, body: &[u8]) -> Vec<u8> {
    let mut encoding_key = [0u8; 16];
    encoding_key[..KEY_LENGTH].copy_from_slice(key.as_bytes());
    encoding_key.reverse();

    let mut out = encoding_key.to_vec();
    out.extend_from_slice(&(30 + body.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 10]);
    out.extend_from_slice(body);
    out
}

/// Writes `data.000` plus one `.idx` table holding `blobs` in order and opens
/// a storage over them. The directory must outlive the storage.
pub(crate) fn storage_with(blobs: &[(ContentKey, Vec<u8>)]) -> (TempDir, Arc<Storage>) {
    let dir = TempDir::new().unwrap();
    let mut archive = Vec::new();
    let mut entries = Vec::new();
    for (key, bytes) in blobs {
        entries.push((*key, 0u16, archive.len() as u64, bytes.len() as u32));
        archive.extend_from_slice(bytes);
    }
    fs::write(dir.path().join("data.000"), archive).unwrap();
    fs::write(dir.path().join("0000000001.idx"), index_table(&entries)).unwrap();
    let storage = Storage::open(&StorageParams::new(dir.path())).unwrap();
    (dir, Arc::new(storage))
}
