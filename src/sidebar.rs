//! Docsify sidebar generation
//!
//! Walks a documentation tree depth-first and renders a markdown list where
//! directories become bold headers and markdown files become links.

use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{HookError, Result};

const INDENT: &str = "  ";
const MARKDOWN_EXTENSION: &str = "md";

/// How file links are written into the sidebar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// `guide/1.intro.md`, relative to the docs root
    #[default]
    Relative,
    /// `link_base` followed by the relative path, e.g. `/docs/guide/1.intro.md`
    Absolute,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SidebarOptions {
    pub output_file: String,
    pub exclude: Vec<String>,
    pub home_label: String,
    pub home_link: String,
    pub link_style: LinkStyle,
    pub link_base: String,
    /// Display text overrides keyed by file or directory name
    pub display_names: BTreeMap<String, String>,
}

impl Default for SidebarOptions {
    fn default() -> Self {
        Self {
            output_file: "_sidebar.md".to_string(),
            exclude: vec![
                "_sidebar.md".to_string(),
                ".git".to_string(),
                ".gitignore".to_string(),
            ],
            home_label: "首页".to_string(),
            home_link: "/docs/".to_string(),
            link_style: LinkStyle::Relative,
            link_base: "/docs/".to_string(),
            display_names: BTreeMap::new(),
        }
    }
}

impl SidebarOptions {
    /// `output_file` must be a bare file name in the docs root.
    pub fn validate(&self) -> Result<()> {
        let name = self.output_file.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(HookError::ConfigError(format!(
                "output_file '{}' must be a plain file name without path separators",
                name
            )));
        }
        Ok(())
    }

    fn is_excluded(&self, name: &str) -> bool {
        name.starts_with('.') || name == self.output_file || self.exclude.iter().any(|e| e == name)
    }

    fn link_for(&self, relative: &str) -> String {
        match self.link_style {
            LinkStyle::Relative => relative.to_string(),
            LinkStyle::Absolute => {
                if self.link_base.ends_with('/') {
                    format!("{}{}", self.link_base, relative)
                } else {
                    format!("{}/{}", self.link_base, relative)
                }
            }
        }
    }
}

/// Numeric prefix of the form `<digits>.` at the start of a name.
pub fn extract_number_prefix(name: &str) -> Option<u64> {
    let digits_len = name.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 || name.as_bytes().get(digits_len) != Some(&b'.') {
        return None;
    }
    // Prefixes too large for u64 still sort after every smaller prefix.
    Some(name[..digits_len].parse().unwrap_or(u64::MAX))
}

/// Sort order within one directory level: numbered entries first by number,
/// then by case-insensitive name.
pub fn compare_entries(a: &str, b: &str) -> Ordering {
    let by_prefix = match (extract_number_prefix(a), extract_number_prefix(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_prefix
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Link text for a file stem: `1.intro` becomes `1. intro`.
pub fn display_name(stem: &str) -> String {
    match extract_number_prefix(stem) {
        Some(_) => {
            let dot = stem.find('.').unwrap_or(stem.len());
            format!("{} {}", &stem[..=dot], &stem[dot + 1..])
        }
        None => stem.to_string(),
    }
}

fn is_readme(stem: &str) -> bool {
    stem.eq_ignore_ascii_case("readme")
}

pub struct SidebarGenerator<'a> {
    root: &'a Path,
    options: &'a SidebarOptions,
}

impl<'a> SidebarGenerator<'a> {
    pub fn new(root: &'a Path, options: &'a SidebarOptions) -> Self {
        Self { root, options }
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.options.output_file)
    }

    /// Renders the sidebar text without touching the filesystem beyond reads.
    pub fn render(&self) -> Result<String> {
        self.options.validate()?;
        let mut out = format!("* [{}]({})\n", self.options.home_label, self.options.home_link);
        self.walk(self.root, 0, &mut out)?;
        Ok(out)
    }

    /// Renders and writes the sidebar to `<root>/<output_file>`.
    pub fn write(&self) -> Result<PathBuf> {
        let content = self.render()?;
        let path = self.output_path();
        fs::write(&path, content).map_err(|source| HookError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        info!("{} generated successfully.", path.display());
        Ok(path)
    }

    fn walk(&self, dir: &Path, level: usize, out: &mut String) -> Result<()> {
        let read_dir = |source| HookError::ReadDirFailed {
            path: dir.to_path_buf(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_dir)? {
            let entry = entry.map_err(read_dir)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort_by(|a, b| compare_entries(a, b));

        let indent = INDENT.repeat(level);
        for name in names {
            if self.options.is_excluded(&name) {
                debug!("Excluding: {}", name);
                continue;
            }

            let path = dir.join(&name);
            // Follows symlinks, so linked directories are traversed too.
            let metadata = fs::metadata(&path).map_err(|source| HookError::MetadataFailed {
                path: path.clone(),
                source,
            })?;

            if metadata.is_dir() {
                let label = self.options.display_names.get(&name).unwrap_or(&name);
                out.push_str(&format!("{}* **{}**\n", indent, label));
                self.walk(&path, level + 1, out)?;
            } else if metadata.is_file() && is_markdown(&path) {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if is_readme(&stem) {
                    debug!("Excluding README file entry: {}", path.display());
                    continue;
                }

                let label = match self.options.display_names.get(&name) {
                    Some(label) => label.clone(),
                    None => display_name(&stem),
                };
                let link = self.options.link_for(&self.relative_link(&path));
                out.push_str(&format!("{}* [{}]({})\n", indent, label, link));
            }
        }
        Ok(())
    }

    fn relative_link(&self, path: &Path) -> String {
        let relative = path.strip_prefix(self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
            .replace('\\', "/")
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(MARKDOWN_EXTENSION)
}
