//! Transactional asset store.
//!
//! A [`TransactionalFileSystem`] is a purely in-memory directory tree used to
//! stage library-element files (inside a clipboard snapshot, or backing a
//! project-library element) without touching any real storage. A
//! [`TransactionalDirectory`] is a cheap handle scoped to one path inside
//! such a tree; handles share the tree via `Rc` because the whole document
//! model is single-threaded (see crate docs).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid path segment `{0}`")]
    InvalidPath(String),

    #[error("no such file: {0}")]
    NoSuchFile(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct DirNode {
    dirs: BTreeMap<String, DirNode>,
    files: BTreeMap<String, Vec<u8>>,
}

impl DirNode {
    fn get(&self, segments: &[String]) -> Option<&DirNode> {
        let mut node = self;
        for seg in segments {
            node = node.dirs.get(seg)?;
        }
        Some(node)
    }

    fn ensure(&mut self, segments: &[String]) -> &mut DirNode {
        let mut node = self;
        for seg in segments {
            node = node.dirs.entry(seg.clone()).or_default();
        }
        node
    }

    /// Deep-copy everything from `src` into this node, overwriting files
    /// that already exist under the same name.
    fn merge_from(&mut self, src: &DirNode) {
        for (name, content) in &src.files {
            self.files.insert(name.clone(), content.clone());
        }
        for (name, subdir) in &src.dirs {
            self.dirs.entry(name.clone()).or_default().merge_from(subdir);
        }
    }

    fn collect_files(&self, prefix: &str, out: &mut BTreeMap<String, Vec<u8>>) {
        for (name, content) in &self.files {
            out.insert(format!("{prefix}{name}"), content.clone());
        }
        for (name, subdir) in &self.dirs {
            subdir.collect_files(&format!("{prefix}{name}/"), out);
        }
    }
}

/// An in-memory, addressable directory tree.
#[derive(Debug, Default, PartialEq)]
pub struct TransactionalFileSystem {
    root: DirNode,
}

impl TransactionalFileSystem {
    /// Create a fresh empty tree behind a shared handle.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Rebuild a tree from a flat `path → content` map (the out-of-band part
    /// of a clipboard payload).
    pub fn from_file_entries(
        entries: &BTreeMap<String, Vec<u8>>,
    ) -> Result<Rc<RefCell<Self>>, StorageError> {
        let fs = Self::new();
        {
            let mut borrow = fs.borrow_mut();
            for (path, content) in entries {
                let mut segments = parse_path(path)?;
                let file_name = segments
                    .pop()
                    .ok_or_else(|| StorageError::InvalidPath(path.clone()))?;
                borrow
                    .root
                    .ensure(&segments)
                    .files
                    .insert(file_name, content.clone());
            }
        }
        Ok(fs)
    }

    /// Flatten the tree into a `path → content` map. Empty directories are
    /// not representable in this form and are dropped.
    pub fn file_entries(&self) -> BTreeMap<String, Vec<u8>> {
        let mut out = BTreeMap::new();
        self.root.collect_files("", &mut out);
        out
    }
}

/// A handle scoped to one directory inside a [`TransactionalFileSystem`].
///
/// The directory does not need to exist yet: listing a missing directory
/// yields empty results and the first write materializes it.
#[derive(Debug, Clone)]
pub struct TransactionalDirectory {
    fs: Rc<RefCell<TransactionalFileSystem>>,
    path: Vec<String>,
}

impl TransactionalDirectory {
    /// A handle to the root of the given tree.
    pub fn root(fs: Rc<RefCell<TransactionalFileSystem>>) -> Self {
        Self { fs, path: Vec::new() }
    }

    /// A handle to `path` (slash-separated, relative to the tree root).
    pub fn new(
        fs: Rc<RefCell<TransactionalFileSystem>>,
        path: &str,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            fs,
            path: parse_path(path)?,
        })
    }

    /// A handle to a subdirectory of this one.
    pub fn subdir(&self, rel: &str) -> Result<Self, StorageError> {
        let mut path = self.path.clone();
        path.extend(parse_path(rel)?);
        Ok(Self {
            fs: Rc::clone(&self.fs),
            path,
        })
    }

    /// The slash-separated path of this handle, relative to the tree root.
    pub fn path(&self) -> String {
        self.path.join("/")
    }

    /// The shared tree this handle points into.
    pub fn filesystem(&self) -> Rc<RefCell<TransactionalFileSystem>> {
        Rc::clone(&self.fs)
    }

    /// Names of the immediate subdirectories, sorted.
    pub fn dir_names(&self) -> Vec<String> {
        let fs = self.fs.borrow();
        match fs.root.get(&self.path) {
            Some(node) => node.dirs.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Names of the files directly in this directory, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let fs = self.fs.borrow();
        match fs.root.get(&self.path) {
            Some(node) => node.files.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        let fs = self.fs.borrow();
        match fs.root.get(&self.path) {
            Some(node) => node.files.is_empty() && node.dirs.is_empty(),
            None => true,
        }
    }

    /// Read a file directly in this directory.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let fs = self.fs.borrow();
        fs.root
            .get(&self.path)
            .and_then(|node| node.files.get(name))
            .cloned()
            .ok_or_else(|| StorageError::NoSuchFile(self.join(name)))
    }

    /// Write a file directly in this directory, creating parents as needed.
    pub fn write_file(&self, name: &str, content: &[u8]) -> Result<(), StorageError> {
        if name.is_empty() || name.contains('/') {
            return Err(StorageError::InvalidPath(name.to_string()));
        }
        let mut fs = self.fs.borrow_mut();
        fs.root
            .ensure(&self.path)
            .files
            .insert(name.to_string(), content.to_vec());
        Ok(())
    }

    /// Deep-copy this whole subtree into `dest`, which may live in a
    /// different tree. Files already present under the same names in the
    /// destination are overwritten.
    pub fn copy_to(&self, dest: &TransactionalDirectory) -> Result<(), StorageError> {
        // Clone the source subtree first so that source and destination may
        // share one underlying tree without aliasing the borrow.
        let subtree = {
            let fs = self.fs.borrow();
            fs.root.get(&self.path).cloned().unwrap_or_default()
        };
        let mut fs = dest.fs.borrow_mut();
        fs.root.ensure(&dest.path).merge_from(&subtree);
        Ok(())
    }

    fn join(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path(), name)
        }
    }
}

fn parse_path(path: &str) -> Result<Vec<String>, StorageError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() || seg == "." || seg == ".." {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        segments.push(seg.to_string());
    }
    Ok(segments)
}
