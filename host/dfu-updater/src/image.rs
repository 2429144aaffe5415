// Licensed under the Apache-2.0 license

use elf::abi::SHT_NOBITS;
use elf::endian::AnyEndian;
use elf::ElfBytes;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("failed to parse ELF file: {0}")]
    Parse(String),
    #[error("ELF file has no section headers")]
    NoSectionHeaders,
    #[error("section {0} is compressed")]
    CompressedSection(String),
    #[error("no section named {0}*")]
    RegionNotFound(String),
}

/// One section of a named region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionChunk<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
}

impl AsRef<[u8]> for SectionChunk<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}

/// Collects every section whose name starts with `name_prefix`, in section header order.
///
/// Sections without file contents (`SHT_NOBITS`, e.g. `.bss`) are skipped.
pub fn get_named_region<'a>(
    elf_bytes: &'a [u8],
    name_prefix: &str,
) -> Result<Vec<SectionChunk<'a>>, ImageError> {
    let elf_file = ElfBytes::<AnyEndian>::minimal_parse(elf_bytes)
        .map_err(|e| ImageError::Parse(e.to_string()))?;

    let (headers, strtab) = elf_file
        .section_headers_with_strtab()
        .map_err(|e| ImageError::Parse(e.to_string()))?;
    let (Some(headers), Some(strtab)) = (headers, strtab) else {
        return Err(ImageError::NoSectionHeaders);
    };

    let mut chunks = Vec::new();
    for header in headers.iter() {
        let name = strtab
            .get(header.sh_name as usize)
            .map_err(|e| ImageError::Parse(e.to_string()))?;
        if !name.starts_with(name_prefix) || header.sh_type == SHT_NOBITS {
            continue;
        }
        let (data, compression) = elf_file
            .section_data(&header)
            .map_err(|e| ImageError::Parse(e.to_string()))?;
        if compression.is_some() {
            return Err(ImageError::CompressedSection(name.to_string()));
        }
        chunks.push(SectionChunk { name, data });
    }

    if chunks.is_empty() {
        return Err(ImageError::RegionNotFound(name_prefix.to_string()));
    }
    Ok(chunks)
}
