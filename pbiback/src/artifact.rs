//! PBIX artifact files.
//!
//! Report names become file names, so they are percent-encoded first:
//! `%`, path separators, `<>:"|?*`, control characters, a leading `.` and a
//! trailing space or `.` are replaced by `%XX` (one escape per UTF-8 byte).
//! Everything else, including non-ASCII letters, is kept. An empty name is
//! stored as `untitled`. [`decode_file_stem`] reverses the encoding so a
//! restored dataset gets the report's original name.
//!
//! Stems must also differ without regard to case. A name that differs from
//! an earlier one only in case has its ASCII letters escaped, left to right,
//! until the stem is distinct (`Sales`, then `sales` as `%73ales`), so it
//! still decodes to its own name. Only exact duplicates get a `_n` suffix,
//! and those come back suffixed on restore.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

/// Artifact subdirectory of a snapshot
pub const PBIX_DIR: &str = "pbix";

/// Artifact file extension
pub const PBIX_EXT: &str = "pbix";

const PART_EXT: &str = "pbix.part";

const EMPTY_NAME_STEM: &str = "untitled";

const RESERVED: &[char] = &['%', '/', '\\', '<', '>', ':', '"', '|', '?', '*'];

fn push_escaped(out: &mut String, ch: char) {
    let mut buf = [0u8; 4];
    for byte in ch.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("%{byte:02X}"));
    }
}

/// File-system-safe stem (no extension) for a report name.
pub fn artifact_file_stem(name: &str) -> String {
    if name.is_empty() {
        return EMPTY_NAME_STEM.to_string();
    }
    let chars: Vec<char> = name.chars().collect();
    let last = chars.len() - 1;
    let mut out = String::with_capacity(name.len());
    for (idx, &ch) in chars.iter().enumerate() {
        let escape = RESERVED.contains(&ch)
            || ch.is_control()
            || (idx == 0 && ch == '.')
            || (idx == last && (ch == ' ' || ch == '.'));
        if escape {
            push_escaped(&mut out, ch);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Escapes the ASCII letters of `stem` one at a time, left to right, until
/// `is_taken` rejects it. Existing `%XX` escapes are left alone. Returns
/// `None` if the stem is still taken with every letter escaped.
pub fn case_distinct_stem(stem: &str, is_taken: impl Fn(&str) -> bool) -> Option<String> {
    let chars: Vec<char> = stem.chars().collect();
    let mut escaped = vec![false; chars.len()];
    let mut idx = 0;
    while idx < chars.len() {
        if chars[idx] == '%' {
            idx += 3;
            continue;
        }
        if chars[idx].is_ascii_alphabetic() {
            escaped[idx] = true;
            let mut candidate = String::with_capacity(stem.len() + 2);
            for (&ch, &esc) in chars.iter().zip(&escaped) {
                if esc {
                    push_escaped(&mut candidate, ch);
                } else {
                    candidate.push(ch);
                }
            }
            if !is_taken(&candidate) {
                return Some(candidate);
            }
        }
        idx += 1;
    }
    None
}

/// Reverses [`artifact_file_stem`]. Malformed escapes are kept literally.
pub fn decode_file_stem(stem: &str) -> String {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%'
            && idx + 2 < bytes.len()
            && let Some(value) = hex_pair(bytes[idx + 1], bytes[idx + 2])
        {
            out.push(value);
            idx += 3;
        } else {
            out.push(bytes[idx]);
            idx += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = char::from(hi).to_digit(16)?;
    let lo = char::from(lo).to_digit(16)?;
    u8::try_from(hi * 16 + lo).ok()
}

/// Path of the artifact with `stem` in `dir`.
pub fn artifact_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.{PBIX_EXT}"))
}

/// Writes an artifact through a `.pbix.part` file renamed on completion, so
/// an interrupted or failed write never leaves a `.pbix` file behind.
pub fn write_artifact(dir: &Path, stem: &str, content: &[u8]) -> io::Result<PathBuf> {
    let part = dir.join(format!("{stem}.{PART_EXT}"));
    let dest = artifact_path(dir, stem);
    let result = fs::File::create(&part).and_then(|mut file| {
        file.write_all(content)?;
        file.sync_all()
    });
    if let Err(err) = result.and_then(|()| fs::rename(&part, &dest)) {
        let _ = fs::remove_file(&part);
        return Err(err);
    }
    debug!(path = %dest.display(), bytes = content.len(), "artifact written");
    Ok(dest)
}

/// Artifact files of a snapshot directory, sorted by file name.
/// A snapshot without an artifact directory has no artifacts.
pub fn list_artifacts(snapshot_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let dir = snapshot_dir.join(PBIX_DIR);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file()
            && path.extension().is_some_and(|ext| ext == PBIX_EXT)
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Dataset name to request for an artifact file: its decoded stem.
pub fn desired_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| decode_file_stem(&stem.to_string_lossy()))
        .unwrap_or_default()
}
