// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use flate2::read::MultiGzDecoder;
use liblzma::read::XzDecoder;
use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use tar::Archive as TarArchive;

use super::ParsingFormat;
use crate::error::{Result, SyncError};

const TAR_MAGIC_OFFSET: usize = 257;
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Transport compression of a downloaded index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Xz,
    Zstd,
}

impl Compression {
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(GZIP_MAGIC) {
            Compression::Gzip
        } else if data.starts_with(XZ_MAGIC) {
            Compression::Xz
        } else if data.starts_with(ZSTD_MAGIC) {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Xz => "xz",
            Compression::Zstd => "zstd",
        };
        write!(f, "{name}")
    }
}

pub fn is_gzip(data: &[u8]) -> bool {
    Compression::detect(data) == Compression::Gzip
}

fn is_tar(data: &[u8]) -> bool {
    data.len() >= TAR_MAGIC_OFFSET + 5 && &data[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar"
}

/// Undo transport packaging: gzip, xz and zstd are detected by magic bytes,
/// and tarballs (`APKINDEX.tar.gz`, pacman `.db`) are flattened to the index
/// text they carry. Concatenated gzip members are read in full, which is how
/// signed APKINDEX archives are laid out.
pub fn decompress(bytes: &[u8], format: ParsingFormat) -> Result<Cow<'_, [u8]>> {
    let compression = Compression::detect(bytes);
    let data: Cow<'_, [u8]> = match compression {
        Compression::None => Cow::Borrowed(bytes),
        Compression::Gzip => {
            Cow::Owned(read_all(MultiGzDecoder::new(bytes), compression, format)?)
        }
        Compression::Xz => Cow::Owned(read_all(XzDecoder::new(bytes), compression, format)?),
        Compression::Zstd => {
            let decoder = zstd::Decoder::new(bytes).map_err(|e| {
                parse_error(format, format!("zstd decoder creation failed: {e}"))
            })?;
            Cow::Owned(read_all(decoder, compression, format)?)
        }
    };
    if compression != Compression::None {
        log::trace!(
            "Decompressed {compression} {} bytes -> {} bytes",
            bytes.len(),
            data.len()
        );
    }

    if is_tar(&data) {
        return Ok(Cow::Owned(flatten_tar(&data, format)?));
    }
    Ok(data)
}

fn read_all<R: Read>(
    mut decoder: R,
    compression: Compression,
    format: ParsingFormat,
) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| parse_error(format, format!("{compression} decompression failed: {e}")))?;
    Ok(output)
}

fn flatten_tar(data: &[u8], format: ParsingFormat) -> Result<Vec<u8>> {
    let mut archive = TarArchive::new(data);
    // Signed indexes are several tar streams back to back
    archive.set_ignore_zeros(true);
    let mut output = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| parse_error(format, format!("invalid tar archive: {e}")))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| parse_error(format, format!("invalid tar entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| parse_error(format, format!("invalid tar path: {e}")))?
            .to_string_lossy()
            .into_owned();

        let wanted = match format {
            ParsingFormat::AlpineApkindex => path == "APKINDEX",
            ParsingFormat::PacmanDesc => path.ends_with("/desc"),
            _ => false,
        };
        if !wanted {
            continue;
        }

        entry
            .read_to_end(&mut output)
            .map_err(|e| parse_error(format, format!("failed to read {path}: {e}")))?;
        // Blocks from separate files must stay separated
        output.extend_from_slice(b"\n\n");
    }

    Ok(output)
}

fn parse_error(format: ParsingFormat, message: String) -> SyncError {
    SyncError::Parse {
        format: format.to_string(),
        message,
    }
}
