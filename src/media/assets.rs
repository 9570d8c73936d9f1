/// Master asset library and stem resolution
///
/// The library maps a lowercase stem to exactly one master file. Stems are kept
/// in lexicographic order, which is also the tie-break order for nearest-match
/// lookups, so resolution never depends on filesystem enumeration order.
use crate::error::{ArchiveError, Result};
use crate::warning::Warning;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct AssetLibrary {
    stems: BTreeMap<String, PathBuf>,
}

/// A stem resolved to a master file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub stem: String,
    pub path: PathBuf,
    /// Set when the exact stem was missing and a nearest match was used
    pub fallback: Option<Warning>,
}

impl AssetLibrary {
    /// Scan `<root>/<subdir>/<file>.<extension>` for masters.
    ///
    /// Only immediate subdirectories whose name starts with `subdir_prefix`
    /// are considered. Two files sharing a stem are an error.
    pub fn scan(root: &Path, extension: &str, subdir_prefix: Option<&str>) -> Result<Self> {
        let mut library = Self::default();

        // Loose files at depth 1 fail the predicate, so only subdirectory contents remain
        let walker = WalkDir::new(root)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() != 1 || is_scanned_subdir(entry, subdir_prefix));

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.depth() != 2 || !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if !matches_extension {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                library.insert(stem.to_lowercase(), path.to_path_buf())?;
            }
        }

        info!("🎞️ Indexed {} master files under {}", library.len(), root.display());
        Ok(library)
    }

    /// Build a library from explicit entries, rejecting duplicate stems
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        let mut library = Self::default();
        for (stem, path) in entries {
            library.insert(stem.to_lowercase(), path)?;
        }
        Ok(library)
    }

    fn insert(&mut self, stem: String, path: PathBuf) -> Result<()> {
        if let Some(existing) = self.stems.get(&stem) {
            return Err(ArchiveError::AmbiguousAsset {
                stem,
                first: existing.clone(),
                second: path,
            });
        }
        self.stems.insert(stem, path);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    pub fn get(&self, stem: &str) -> Option<&Path> {
        self.stems.get(stem).map(PathBuf::as_path)
    }

    /// Minimum edit distance entry; ties go to the lexicographically first stem
    pub fn nearest(&self, stem: &str) -> Option<(&str, &Path, usize)> {
        let mut best: Option<(&str, &Path, usize)> = None;
        for (candidate, path) in &self.stems {
            let distance = levenshtein(stem, candidate);
            if best.map_or(true, |(_, _, best_distance)| distance < best_distance) {
                best = Some((candidate.as_str(), path.as_path(), distance));
            }
        }
        best
    }

    /// Exact lookup first, nearest match otherwise
    pub fn resolve(&self, stem: &str) -> Result<Resolution> {
        if let Some(path) = self.get(stem) {
            debug!("Exact master match for {}", stem);
            return Ok(Resolution {
                stem: stem.to_string(),
                path: path.to_path_buf(),
                fallback: None,
            });
        }

        let (chosen, path, distance) = self
            .nearest(stem)
            .ok_or_else(|| ArchiveError::NoAsset { stem: stem.to_string() })?;

        Ok(Resolution {
            stem: chosen.to_string(),
            path: path.to_path_buf(),
            fallback: Some(Warning::FuzzyAssetMatch {
                requested: stem.to_string(),
                chosen: chosen.to_string(),
                distance,
            }),
        })
    }
}

fn is_scanned_subdir(entry: &walkdir::DirEntry, subdir_prefix: Option<&str>) -> bool {
    entry.file_type().is_dir()
        && subdir_prefix.map_or(true, |prefix| entry.file_name().to_string_lossy().starts_with(prefix))
}

/// Resolves stems against a master directory scanned on first use
#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
    extension: String,
    subdir_prefix: Option<String>,
    library: Option<AssetLibrary>,
}

impl AssetResolver {
    pub fn new(root: PathBuf, extension: String, subdir_prefix: Option<String>) -> Self {
        Self {
            root,
            extension,
            subdir_prefix,
            library: None,
        }
    }

    /// Resolver over an already-built library
    pub fn with_library(root: PathBuf, library: AssetLibrary) -> Self {
        Self {
            root,
            extension: String::new(),
            subdir_prefix: None,
            library: Some(library),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The library, scanning the master directory the first time it is needed
    pub fn library(&mut self) -> Result<&AssetLibrary> {
        let library = match self.library.take() {
            Some(library) => library,
            None => AssetLibrary::scan(&self.root, &self.extension, self.subdir_prefix.as_deref())?,
        };
        Ok(self.library.insert(library))
    }

    pub fn resolve(&mut self, stem: &str) -> Result<Resolution> {
        self.library()?.resolve(stem)
    }
}

/// Edit distance between two strings, counted in characters
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
