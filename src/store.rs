//! Hierarchical settings storage.
//!
//! `SettingsTree` models the registry-like layout the host keeps user
//! settings in: every node holds scalar string values plus named child nodes.
//! `SettingsHive` persists the whole tree as one TOML document in the user's
//! settings directory; values are plain TOML strings and children are
//! sub-tables, so the file stays hand-editable.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::theme::IndentTheme;

/// Key of the current-format theme tree inside the hive.
pub const ROOT_KEY: &str = "IndentGuide";
/// Key of the pre-upgrade flat record (see `migrate`).
pub const LEGACY_KEY: &str = "DisplayOptions";

const HIVE_FILE: &str = "settings.toml";
const DIR_ENV_OVERRIDE: &str = "INDENT_GUIDES_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Entry {
    Value(String),
    Node(SettingsTree),
}

/// One node of the settings hierarchy: scalar values plus named children.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsTree {
    entries: BTreeMap<String, Entry>,
}

impl SettingsTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scalar value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(Entry::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), Entry::Value(value.into()));
    }

    pub fn child(&self, name: &str) -> Option<&SettingsTree> {
        match self.entries.get(name) {
            Some(Entry::Node(node)) => Some(node),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut SettingsTree> {
        match self.entries.get_mut(name) {
            Some(Entry::Node(node)) => Some(node),
            _ => None,
        }
    }

    /// Child node under `name`, created empty if absent. An existing child
    /// keeps its contents.
    pub fn create_child(&mut self, name: &str) -> &mut SettingsTree {
        let entry = self
            .entries
            .entry(name.to_string())
            .and_modify(|entry| {
                if matches!(entry, Entry::Value(_)) {
                    *entry = Entry::Node(SettingsTree::new());
                }
            })
            .or_insert_with(|| Entry::Node(SettingsTree::new()));
        match entry {
            Entry::Node(node) => node,
            Entry::Value(_) => unreachable!("scalar entry replaced above"),
        }
    }

    /// Fresh child node under `name`; any existing entry is dropped.
    pub fn replace_child(&mut self, name: &str) -> &mut SettingsTree {
        self.entries
            .insert(name.to_string(), Entry::Node(SettingsTree::new()));
        match self.entries.get_mut(name) {
            Some(Entry::Node(node)) => node,
            _ => unreachable!("node inserted above"),
        }
    }

    /// Remove the subtree under `name`. Returns whether anything was removed;
    /// an absent child is a no-op.
    pub fn remove_child(&mut self, name: &str) -> bool {
        match self.entries.get(name) {
            Some(Entry::Node(_)) => self.entries.remove(name).is_some(),
            _ => false,
        }
    }

    /// Names of all child nodes, in lexicographic order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            Entry::Node(_) => Some(name.as_str()),
            Entry::Value(_) => None,
        })
    }
}

/// One `Result` per stored entry, in lexicographic entry order. A malformed
/// entry fails alone; the remaining entries still load.
pub fn load_all(
    root: &SettingsTree,
) -> impl Iterator<Item = (String, Result<IndentTheme>)> + '_ {
    root.child_names()
        .map(|name| (name.to_string(), IndentTheme::load(root, name)))
}

/// Write every theme under `root` via [`IndentTheme::save`].
pub fn save_all<'a, I>(root: &mut SettingsTree, themes: I)
where
    I: IntoIterator<Item = &'a IndentTheme>,
{
    for theme in themes {
        theme.save(root);
    }
}

/// The on-disk user-settings root.
#[derive(Debug, Clone)]
pub struct SettingsHive {
    dir: PathBuf,
}

impl SettingsHive {
    /// Default settings directory: `INDENT_GUIDES_DIR` if set, else
    /// `~/.indent-guides`.
    pub fn open_default() -> Result<Self> {
        if let Ok(custom_dir) = std::env::var(DIR_ENV_OVERRIDE) {
            return Ok(Self::at_path(custom_dir));
        }
        let home = dirs::home_dir().context("could not find home directory")?;
        Ok(Self::at_path(home.join(".indent-guides")))
    }

    /// Hive rooted at an explicit directory (hosts and tests inject this).
    pub fn at_path(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn hive_path(&self) -> PathBuf {
        self.dir.join(HIVE_FILE)
    }

    fn load_tree(&self) -> Result<SettingsTree> {
        let path = self.hive_path();
        if !path.exists() {
            return Ok(SettingsTree::new());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Read-only view of the current-format root. `Ok(None)` when the root
    /// key does not exist yet, which is how the migrator detects a
    /// not-yet-upgraded installation.
    pub fn open_root(&self) -> Result<Option<SettingsTree>> {
        let tree = self.load_tree()?;
        Ok(tree.child(ROOT_KEY).cloned())
    }

    /// Writable handle over the whole hive, creating the current-format root
    /// key if absent. Writes take effect on [`WritableHive::commit`];
    /// dropping the handle without committing leaves disk state untouched.
    pub fn open_writable(&self) -> Result<WritableHive<'_>> {
        let mut tree = self.load_tree()?;
        tree.create_child(ROOT_KEY);
        Ok(WritableHive { hive: self, tree })
    }
}

/// Scoped write handle: batch mutations in memory, then `commit` persists the
/// whole document in one write.
pub struct WritableHive<'a> {
    hive: &'a SettingsHive,
    tree: SettingsTree,
}

impl WritableHive<'_> {
    /// The current-format root node.
    pub fn root_mut(&mut self) -> &mut SettingsTree {
        self.tree.create_child(ROOT_KEY)
    }

    /// The whole hive tree (the legacy record lives beside the root key).
    pub fn tree(&self) -> &SettingsTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SettingsTree {
        &mut self.tree
    }

    pub fn commit(self) -> Result<()> {
        fs::create_dir_all(&self.hive.dir)
            .with_context(|| format!("failed to create {}", self.hive.dir.display()))?;
        let toml_string =
            toml::to_string_pretty(&self.tree).context("failed to serialize settings hive")?;
        let path = self.hive.hive_path();
        fs::write(&path, toml_string).with_context(|| format!("failed to write {}", path.display()))
    }
}
