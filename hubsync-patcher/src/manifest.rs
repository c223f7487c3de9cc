//! Line-oriented parser for package manifest scripts.
//!
//! Each line is classified by the call it starts with (after indentation):
//!
//! ```text
//! addappid(<id>)                          package declaration
//! addappid(<id>, <0|1>, "<hash>")         depot declaration
//! setManifestid(<depot>, "<gid>"[, ...])  depot-manifest declaration
//! anything else                           verbatim
//! ```
//!
//! Rewriting touches only the bytes of a manifest literal; indentation,
//! spacing, trailing text and line terminators survive byte for byte.

use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

use hubsync_core::{DepotId, ManifestId, PackageId};

use crate::error::{io_err, PatchError};
use crate::metadata::DepotManifestMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Package {
        id: PackageId,
    },
    Depot {
        depot: DepotId,
        hash: String,
    },
    DepotManifest {
        depot: DepotId,
        manifest: ManifestId,
        /// Byte range of the literal's contents (inside the quotes) in the file.
        span: Range<usize>,
    },
    Verbatim,
}

#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
    source: String,
    declarations: Vec<Declaration>,
}

impl ManifestFile {
    pub fn load(path: &Path) -> Result<Self, PatchError> {
        let source = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Self::parse(path, source)
    }

    /// Parse and validate: at least one package, at most one manifest per depot.
    pub fn parse(path: impl Into<PathBuf>, source: String) -> Result<Self, PatchError> {
        let path = path.into();
        let mut declarations = Vec::new();
        let mut offset = 0;
        for raw in source.split_inclusive('\n') {
            let body = raw
                .strip_suffix("\r\n")
                .or_else(|| raw.strip_suffix('\n'))
                .unwrap_or(raw);
            declarations.push(classify(body, offset));
            offset += raw.len();
        }

        let mut seen = HashSet::new();
        for decl in &declarations {
            if let Declaration::DepotManifest { depot, .. } = decl {
                if !seen.insert(depot.clone()) {
                    return Err(PatchError::Malformed {
                        path,
                        reason: format!("depot {depot} has more than one manifest declaration"),
                    });
                }
            }
        }

        let file = Self {
            path,
            source,
            declarations,
        };
        if file.package_ids().is_empty() {
            return Err(PatchError::NoPackages { path: file.path });
        }
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// One entry per line, in file order.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Distinct package ids in declaration order.
    pub fn package_ids(&self) -> Vec<PackageId> {
        let mut seen = HashSet::new();
        self.declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Package { id } if seen.insert(id.clone()) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// depot → content hash
    pub fn depot_entries(&self) -> BTreeMap<DepotId, String> {
        self.declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Depot { depot, hash } => Some((depot.clone(), hash.clone())),
                _ => None,
            })
            .collect()
    }

    /// depot → current manifest id
    pub fn manifest_entries(&self) -> BTreeMap<DepotId, ManifestId> {
        self.declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::DepotManifest {
                    depot, manifest, ..
                } => Some((depot.clone(), manifest.clone())),
                _ => None,
            })
            .collect()
    }

    /// Rewrite every manifest literal whose depot has a different, non-empty
    /// value in `merged`. Returns the new text and the number of rewrites.
    pub fn apply(&self, merged: &DepotManifestMap) -> (String, usize) {
        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        let mut updates = 0;
        for decl in &self.declarations {
            let Declaration::DepotManifest {
                depot,
                manifest,
                span,
            } = decl
            else {
                continue;
            };
            let Some(new) = merged.get(depot).filter(|m| !m.is_empty()) else {
                continue;
            };
            if new == manifest {
                continue;
            }
            out.push_str(&self.source[cursor..span.start]);
            out.push_str(new.as_str());
            cursor = span.end;
            updates += 1;
        }
        out.push_str(&self.source[cursor..]);
        (out, updates)
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

enum Arg {
    Number(String),
    /// Contents and their byte range within the line.
    Str(String, Range<usize>),
}

fn classify(line: &str, line_offset: usize) -> Declaration {
    let Some((name, args)) = parse_call(line) else {
        return Declaration::Verbatim;
    };
    match (name, args.as_slice()) {
        ("addappid", [Arg::Number(id)]) => match PackageId::parse(id) {
            Ok(id) => Declaration::Package { id },
            Err(_) => Declaration::Verbatim,
        },
        ("addappid", [Arg::Number(depot), Arg::Number(flag), Arg::Str(hash, _)])
            if (flag == "0" || flag == "1") && !hash.is_empty() =>
        {
            Declaration::Depot {
                depot: DepotId::from(depot.as_str()),
                hash: hash.clone(),
            }
        }
        ("setManifestid", [Arg::Number(depot), Arg::Str(gid, range), ..]) if !gid.is_empty() => {
            Declaration::DepotManifest {
                depot: DepotId::from(depot.as_str()),
                manifest: ManifestId::from(gid.as_str()),
                span: (line_offset + range.start)..(line_offset + range.end),
            }
        }
        _ => Declaration::Verbatim,
    }
}

/// `<ws>name(<arg>, <arg>, ...)` at the start of `line`. Text after the closing
/// parenthesis is ignored.
fn parse_call(line: &str) -> Option<(&str, Vec<Arg>)> {
    let bytes = line.as_bytes();
    let mut pos = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let name_start = pos;
    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
        pos += 1;
    }
    let name = &line[name_start..pos];
    if name.is_empty() || bytes.get(pos) != Some(&b'(') {
        return None;
    }
    pos += 1;

    let mut args = Vec::new();
    loop {
        pos = skip_ws(bytes, pos);
        match bytes.get(pos)? {
            b')' if args.is_empty() => return Some((name, args)),
            b'"' => {
                let start = pos + 1;
                let len = bytes[start..].iter().position(|b| *b == b'"')?;
                args.push(Arg::Str(line[start..start + len].to_string(), start..start + len));
                pos = start + len + 1;
            }
            b if b.is_ascii_digit() => {
                let start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                args.push(Arg::Number(line[start..pos].to_string()));
            }
            _ => return None,
        }
        pos = skip_ws(bytes, pos);
        match bytes.get(pos)? {
            b',' => pos += 1,
            b')' => return Some((name, args)),
            _ => return None,
        }
    }
}

fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}
