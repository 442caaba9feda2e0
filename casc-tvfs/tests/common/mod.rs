//! Writes small but complete CASC installations to a temporary folder.
//!
//! The byte layouts here mirror the unit-test writers in `src/test_utils.rs`
//! (`TvfsBuilder`, `index_table`); `fixture_layouts_match_the_unit_writers`
//! pins the shared constants so a change to one side shows up here.

#![allow(dead_code)]

use casc_tvfs::guarded_block::encode_block;
use casc_tvfs::{ContentKey, KEY_LENGTH};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const BUILD_KEY: &str = "b0a1d2c3e4f5061728394a5b6c7d8e9f";

/// Each container file table entry is a key followed by a 4-byte BE size.
pub const CFT_ENTRY_SIZE: usize = KEY_LENGTH + 4;
/// Path table depth written into every root header.
pub const MAX_DEPTH: u16 = 4;

pub fn key(n: u8) -> ContentKey {
    ContentKey::new([0x5E, n, 0x00, 0xC4, 0x5C, 0x00, 0xAB, 0xCD, n])
}

/// Full 16-byte hex form of a key, as build configs write encoding keys.
pub fn long_hex(key: &ContentKey) -> String {
    format!("{key}00000000000000")
}

enum Tree {
    Dir(BTreeMap<String, Tree>),
    File(Vec<(ContentKey, u32)>),
}

/// A TVFS root table built from full paths.
#[derive(Default)]
pub struct TvfsRoot {
    files: Vec<(String, Vec<(ContentKey, u32)>)>,
}

impl TvfsRoot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, spans: &[(ContentKey, u32)]) -> Self {
        self.files.push((path.to_string(), spans.to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut root = BTreeMap::new();
        for (path, spans) in &self.files {
            let parts: Vec<&str> = path.split('/').collect();
            insert(&mut root, &parts, spans.clone());
        }

        let span_count: usize = self.files.iter().map(|(_, spans)| spans.len()).sum();
        let cft_size = span_count * CFT_ENTRY_SIZE;
        let mut vfs = Vec::new();
        let mut cft = Vec::new();
        let path = encode_dir(&root, &mut vfs, &mut cft, cft_size);

        let header_size = 38u32;
        let vfs_offset = header_size + path.len() as u32;
        let cft_offset = vfs_offset + vfs.len() as u32;
        let mut out = b"TVFS".to_vec();
        out.extend_from_slice(&[1, header_size as u8, KEY_LENGTH as u8, KEY_LENGTH as u8]);
        for value in [
            0,
            header_size,
            path.len() as u32,
            vfs_offset,
            vfs.len() as u32,
            cft_offset,
            cft.len() as u32,
        ] {
            out.extend_from_slice(&value.to_be_bytes());
        }
        out.extend_from_slice(&MAX_DEPTH.to_be_bytes());
        out.extend(path);
        out.extend(vfs);
        out.extend(cft);
        out
    }
}

fn insert(dir: &mut BTreeMap<String, Tree>, parts: &[&str], spans: Vec<(ContentKey, u32)>) {
    match parts {
        [name] => {
            dir.insert(name.to_string(), Tree::File(spans));
        }
        [name, rest @ ..] => {
            let child = dir
                .entry(name.to_string())
                .or_insert_with(|| Tree::Dir(BTreeMap::new()));
            if let Tree::Dir(children) = child {
                insert(children, rest, spans);
            }
        }
        [] => {}
    }
}

fn encode_dir(dir: &BTreeMap<String, Tree>, vfs: &mut Vec<u8>, cft: &mut Vec<u8>, cft_size: usize) -> Vec<u8> {
    let width = if cft_size > 0xFF_FFFF {
        4
    } else if cft_size > 0xFFFF {
        3
    } else if cft_size > 0xFF {
        2
    } else {
        1
    };
    let mut out = Vec::new();
    for (name, node) in dir {
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
        match node {
            Tree::File(spans) => {
                out.push(0xFF);
                out.extend_from_slice(&(vfs.len() as u32).to_be_bytes());
                vfs.push(spans.len() as u8);
                let mut file_offset = 0u32;
                for (key, size) in spans {
                    vfs.extend_from_slice(&file_offset.to_be_bytes());
                    vfs.extend_from_slice(&size.to_be_bytes());
                    vfs.extend_from_slice(&(cft.len() as u32).to_be_bytes()[4 - width..]);
                    cft.extend_from_slice(key.as_bytes());
                    cft.extend_from_slice(&size.to_be_bytes());
                    file_offset += size;
                }
            }
            Tree::Dir(children) => {
                let body = encode_dir(children, vfs, cft, cft_size);
                out.push(0x00);
                out.push(0xFF);
                out.extend_from_slice(&(0x8000_0000u32 | (body.len() as u32 + 4)).to_be_bytes());
                out.extend(body);
            }
        }
    }
    out
}

/// Lays out `Data/data`, `Data/config` and `.build.info` under a temp folder.
pub struct Install {
    pub dir: TempDir,
}

impl Install {
    /// `blobs` are written back to back into `data.000` after `padding` zero
    /// bytes. The TVFS root is stored under `root_key` among them.
    pub fn write(blobs: &[(ContentKey, Vec<u8>)], padding: usize, root_key: ContentKey, nested: &[ContentKey]) -> Self {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("Data").join("data");
        fs::create_dir_all(&data).unwrap();

        let mut archive = vec![0u8; padding];
        let mut entries = Vec::new();
        for (key, bytes) in blobs {
            entries.push((*key, archive.len() as u64, bytes.len() as u32));
            archive.extend_from_slice(bytes);
        }
        fs::write(data.join("data.000"), archive).unwrap();
        fs::write(data.join("0000000003.idx"), index_file(&entries)).unwrap();

        let mut config = format!("# Build Configuration\n\nvfs-root = {} {}\n", "ff".repeat(16), long_hex(&root_key));
        for (n, nested_key) in nested.iter().enumerate() {
            config.push_str(&format!("vfs-{} = {} {}\n", n + 1, "ee".repeat(16), long_hex(nested_key)));
        }
        let config_dir = dir.path().join("Data").join("config").join(&BUILD_KEY[0..2]).join(&BUILD_KEY[2..4]);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(BUILD_KEY), config).unwrap();

        write_build_info(dir.path());
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn write_build_info(root: &Path) {
    let text = format!(
        "Branch!STRING:0|Active!DEC:1|Build Key!HEX:16|Version!STRING:0\n\
         old|0|{}|1.0.0\n\
         eu|1|{BUILD_KEY}|1.0.1\n",
        "0".repeat(32)
    );
    fs::write(root.join(".build.info"), text).unwrap();
}

/// A key mapping table with 9-byte keys, 5-byte offsets (30 offset bits),
/// 4-byte sizes, every entry in archive 0.
pub fn index_file(entries: &[(ContentKey, u64, u32)]) -> Vec<u8> {
    let mut header = vec![7, 0, 3, 0, 4, 5, 9, 30];
    header.extend_from_slice(&0x4000_0000u64.to_le_bytes());
    let mut body = Vec::new();
    for (key, offset, size) in entries {
        body.extend_from_slice(key.as_bytes());
        body.extend_from_slice(&offset.to_be_bytes()[3..]);
        body.extend_from_slice(&size.to_le_bytes());
    }
    let mut out = encode_block(&header).unwrap();
    out.resize(0x20, 0);
    out.extend(encode_block(&body).unwrap());
    out
}
