//! Layer registry for named, file-based layer loading.
//!
//! [`LayerRegistry`] resolves layer names from several sources:
//!
//! 1. **Inline layers** (added via [`LayerRegistry::add_inline`] or
//!    [`LayerRegistry::add_layer`]) have highest priority
//! 2. **Embedded layers** (built-ins, see [`LayerRegistry::with_builtin`])
//! 3. **File layers** from registered directories
//!
//! # Supported Extensions
//!
//! | Priority | Extension | Format |
//! |----------|-----------|--------|
//! | 1 (highest) | `.qss` | Qt stylesheet |
//! | 2 | `.css` | CSS |
//! | 3 | `.yaml` | YAML |
//! | 4 (lowest) | `.yml` | YAML |
//!
//! A file is registered under its path relative to the directory, without
//! extension (`themes/chat.qss` → `chat`), and also under its full name
//! (`chat.qss`). When one directory holds the same base name with several
//! extensions, the higher-priority extension owns the bare name.
//!
//! Two *different* directories providing the same name is a configuration
//! error reported as [`LayerLoadError::Collision`].
//!
//! # Hot Reloading
//!
//! File layers are re-read and re-parsed on every [`get`](LayerRegistry::get),
//! so edits are picked up by the next theme switch. [`refresh`](LayerRegistry::refresh)
//! re-walks directories to discover added or removed files.
//!
//! ```rust,ignore
//! let mut registry = LayerRegistry::with_builtin()?;
//! registry.add_dir("./themes")?;
//! let chat = registry.get("chat")?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::builtin::builtin_layers;
use crate::error::{LayerLoadError, ParseError, StyleError};
use crate::layer::{LayerFormat, ThemeLayer};

/// Recognized layer file extensions in priority order.
pub const LAYER_EXTENSIONS: &[&str] = &[".qss", ".css", ".yaml", ".yml"];

/// A layer file discovered while walking a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFile {
    /// Resolution name without extension (e.g. `"chat"` or `"extra/compact"`).
    pub name: String,
    /// Resolution name with extension (e.g. `"chat.qss"`).
    pub name_with_ext: String,
    pub path: PathBuf,
    /// The registered directory this file was found under.
    pub source_dir: PathBuf,
}

impl LayerFile {
    fn extension_priority(&self) -> usize {
        extension_priority(&self.name_with_ext)
    }
}

/// Returns the priority of a file name's extension (lower wins).
pub fn extension_priority(name: &str) -> usize {
    LAYER_EXTENSIONS
        .iter()
        .position(|ext| name.ends_with(ext))
        .unwrap_or(usize::MAX)
}

/// Strips a recognized layer extension, if present.
pub fn strip_extension(name: &str) -> &str {
    LAYER_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

#[derive(Debug, Clone)]
enum LayerEntry {
    Embedded(ThemeLayer),
    File(PathBuf),
}

/// Registry of named layers from inline text, built-ins and directories.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    inline: HashMap<String, ThemeLayer>,
    dirs: Vec<PathBuf>,
    entries: HashMap<String, LayerEntry>,
    /// name → (path, source dir) for collision detection.
    sources: HashMap<String, (PathBuf, PathBuf)>,
    initialized: bool,
}

impl LayerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the built-in layers.
    pub fn with_builtin() -> Result<Self, ParseError> {
        let mut registry = Self::new();
        for layer in builtin_layers()? {
            registry.add_embedded(layer);
        }
        Ok(registry)
    }

    /// Parses and registers an inline layer. Inline layers shadow every
    /// other source with the same name.
    pub fn add_inline(
        &mut self,
        name: impl Into<String>,
        content: &str,
        format: LayerFormat,
    ) -> Result<(), ParseError> {
        let name = name.into();
        let layer = ThemeLayer::parse(name.clone(), content, format)?;
        self.inline.insert(name, layer);
        Ok(())
    }

    /// Registers an already built layer under its own id.
    pub fn add_layer(&mut self, layer: ThemeLayer) {
        self.inline.insert(layer.id().to_string(), layer);
    }

    /// Registers an embedded layer under its own id. Embedded layers shadow
    /// file layers with the same name.
    pub fn add_embedded(&mut self, layer: ThemeLayer) {
        self.entries
            .insert(layer.id().to_string(), LayerEntry::Embedded(layer));
    }

    /// Adds a directory to search for layer files.
    ///
    /// The directory is validated now but walked lazily on first access.
    pub fn add_dir<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LayerLoadError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(LayerLoadError::DirectoryNotFound {
                path: path.to_path_buf(),
            });
        }
        self.dirs.push(path.to_path_buf());
        self.initialized = false;
        Ok(())
    }

    /// Re-walks all registered directories.
    ///
    /// # Errors
    ///
    /// Fails if a directory cannot be read or two directories provide the
    /// same layer name.
    pub fn refresh(&mut self) -> Result<(), LayerLoadError> {
        let mut files = Vec::new();
        for dir in &self.dirs {
            files.extend(walk_dir(dir)?);
        }
        // Stable sort keeps walk order for equal priorities.
        files.sort_by_key(LayerFile::extension_priority);

        let mut entries: HashMap<String, LayerEntry> = self
            .entries
            .iter()
            .filter(|(_, entry)| matches!(entry, LayerEntry::Embedded(_)))
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        let mut sources: HashMap<String, (PathBuf, PathBuf)> = HashMap::new();

        for file in files {
            if let Some((existing, existing_dir)) = sources.get(&file.name) {
                if existing_dir != &file.source_dir {
                    return Err(LayerLoadError::Collision {
                        name: file.name,
                        existing: existing.clone(),
                        conflicting: file.path,
                    });
                }
                // Lower-priority extension in the same directory: explicit name only.
                entries
                    .entry(file.name_with_ext)
                    .or_insert(LayerEntry::File(file.path));
                continue;
            }

            sources.insert(
                file.name.clone(),
                (file.path.clone(), file.source_dir.clone()),
            );
            entries
                .entry(file.name.clone())
                .or_insert_with(|| LayerEntry::File(file.path.clone()));
            entries
                .entry(file.name_with_ext)
                .or_insert(LayerEntry::File(file.path));
        }

        debug!(
            dirs = self.dirs.len(),
            entries = entries.len(),
            "layer registry refreshed"
        );
        self.entries = entries;
        self.sources = sources;
        self.initialized = true;
        Ok(())
    }

    fn ensure_initialized(&mut self) -> Result<(), LayerLoadError> {
        if !self.initialized && !self.dirs.is_empty() {
            self.refresh()?;
        }
        Ok(())
    }

    /// Gets a layer by name, reading and parsing files on each call.
    ///
    /// The returned layer's id is always `name`, so diagnostics refer to the
    /// name the caller asked for.
    pub fn get(&mut self, name: &str) -> Result<ThemeLayer, StyleError> {
        if let Some(layer) = self.inline.get(name) {
            return Ok(layer.clone());
        }

        self.ensure_initialized()?;
        match self.entries.get(name) {
            Some(LayerEntry::Embedded(layer)) => Ok(layer.clone().with_id(name)),
            Some(LayerEntry::File(path)) => {
                debug!(name, path = %path.display(), "loading layer file");
                ThemeLayer::from_file_named(name, path)
            }
            None => Err(LayerLoadError::NotFound {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Checks whether `name` is known, without reading any file.
    pub fn contains(&self, name: &str) -> bool {
        self.inline.contains_key(name) || self.entries.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&mut self) -> Result<Vec<String>, LayerLoadError> {
        self.ensure_initialized()?;
        let mut names: Vec<String> = self
            .inline
            .keys()
            .chain(self.entries.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Base names (without extension) grouped with their source, sorted.
    pub fn describe(&mut self) -> Result<BTreeMap<String, String>, LayerLoadError> {
        self.ensure_initialized()?;
        let mut out = BTreeMap::new();
        for name in self.inline.keys() {
            out.insert(name.clone(), "inline".to_string());
        }
        for (name, entry) in &self.entries {
            if strip_extension(name) != name.as_str() {
                continue;
            }
            let source = match entry {
                LayerEntry::Embedded(_) => "builtin".to_string(),
                LayerEntry::File(path) => path.display().to_string(),
            };
            out.entry(name.clone()).or_insert(source);
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.inline.len() + self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inline.is_empty() && self.entries.is_empty()
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Removes every layer and directory.
    pub fn clear(&mut self) {
        self.inline.clear();
        self.dirs.clear();
        self.entries.clear();
        self.sources.clear();
        self.initialized = false;
    }
}

/// Walks `root` recursively and collects files with a layer extension,
/// sorted by path.
pub fn walk_dir(root: &Path) -> Result<Vec<LayerFile>, LayerLoadError> {
    let root = root.canonicalize().map_err(|e| LayerLoadError::Io {
        path: root.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    walk_dir_recursive(&root, &root, &mut files)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn walk_dir_recursive(
    current: &Path,
    root: &Path,
    files: &mut Vec<LayerFile>,
) -> Result<(), LayerLoadError> {
    let entries = std::fs::read_dir(current).map_err(|e| LayerLoadError::Io {
        path: current.to_path_buf(),
        message: e.to_string(),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| LayerLoadError::Io {
            path: current.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();

        if path.is_dir() {
            walk_dir_recursive(&path, root, files)?;
        } else if path.is_file() {
            if let Some(file) = layer_file(&path, root) {
                files.push(file);
            }
        }
    }
    Ok(())
}

fn layer_file(path: &Path, root: &Path) -> Option<LayerFile> {
    LayerFormat::from_path(path)?;
    let relative = path.strip_prefix(root).ok()?;
    let name_with_ext = relative
        .to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/");
    let name = strip_extension(&name_with_ext).to_string();
    if name == name_with_ext {
        return None;
    }

    Some(LayerFile {
        name,
        name_with_ext,
        path: path.to_path_buf(),
        source_dir: root.to_path_buf(),
    })
}
