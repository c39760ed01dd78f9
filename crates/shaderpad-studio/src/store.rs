use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

pub const VERTEX_FILE: &str = "shader.vert";
pub const FRAGMENT_FILE: &str = "shader.frag";
pub const VERTICES_FILE: &str = "vertices.txt";

/// The three editable texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sources {
    pub vertex: String,
    pub fragment: String,
    pub vertices: String,
}

impl Sources {
    /// Built-in shaders and a colored quad.
    pub fn builtin() -> Self {
        Self {
            vertex: include_str!("../assets/default.vert").to_string(),
            fragment: include_str!("../assets/default.frag").to_string(),
            vertices: include_str!("../assets/default_vertices.txt").to_string(),
        }
    }
}

/// Fixed-name source files under one directory, stored as raw UTF-8.
#[derive(Debug, Clone)]
pub struct SourceFiles {
    dir: PathBuf,
}

impl SourceFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn vertex_path(&self) -> PathBuf {
        self.dir.join(VERTEX_FILE)
    }

    pub fn fragment_path(&self) -> PathBuf {
        self.dir.join(FRAGMENT_FILE)
    }

    pub fn vertices_path(&self) -> PathBuf {
        self.dir.join(VERTICES_FILE)
    }

    pub fn load(&self) -> Result<Sources> {
        Ok(Sources {
            vertex: read(&self.vertex_path())?,
            fragment: read(&self.fragment_path())?,
            vertices: read(&self.vertices_path())?,
        })
    }

    /// Writes every file whose content differs from `sources`.
    ///
    /// `loaded` is what the files held when they were last read. A file that
    /// has changed on disk since then is not overwritten: the save fails as a
    /// whole and nothing is written. Missing files are created.
    ///
    /// Returns the number of files written.
    pub fn save(&self, sources: &Sources, loaded: &Sources) -> Result<usize> {
        let mut pending = Vec::new();
        let mut conflicts = Vec::new();
        for ((path, text), (_, base)) in self.pairs(sources).into_iter().zip(self.pairs(loaded)) {
            match fs::read_to_string(&path) {
                Ok(current) if current == text => {}
                Ok(current) if current != base => conflicts.push(path),
                Ok(_) => pending.push((path, text)),
                Err(err) if err.kind() == ErrorKind::NotFound => pending.push((path, text)),
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to read {}", path.display()));
                }
            }
        }

        if !conflicts.is_empty() {
            let names: Vec<_> = conflicts.iter().map(|p| p.display().to_string()).collect();
            bail!(
                "{} changed on disk since it was loaded; reload before saving",
                names.join(", ")
            );
        }

        for (path, text) in &pending {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            log::debug!(target: "studio", "wrote {}", path.display());
        }
        Ok(pending.len())
    }

    /// Loads the files, first creating the directory and any missing file
    /// from `defaults`.
    pub fn load_or_init(&self, defaults: &Sources) -> Result<Sources> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        for (path, text) in self.pairs(defaults) {
            if !path.exists() {
                log::info!(target: "studio", "creating {}", path.display());
                fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
            }
        }

        self.load()
    }

    fn pairs<'s>(&self, sources: &'s Sources) -> [(PathBuf, &'s str); 3] {
        [
            (self.vertex_path(), sources.vertex.as_str()),
            (self.fragment_path(), sources.fragment.as_str()),
            (self.vertices_path(), sources.vertices.as_str()),
        ]
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
