//! Identity store — persisted links between Jira and Linear issues and
//! between mirrored comments.
//!
//! Persists an [`IdentityFile`] JSON document, by default at
//! `<home>/.trackbridge/mappings.json`. Nothing is cached in memory: every
//! read loads the file fresh. Every mutation takes an exclusive lock on the
//! sibling `<path>.lock`, reloads inside the lock, applies the change, and
//! writes `<path>.tmp` followed by a rename.
//!
//! A missing or unparseable file reads as empty.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::config::bridge_root;
use crate::error::{store_io, StoreError};
use crate::types::{IssueKey, JiraCommentId, LinearCommentId, LinearIssueId, Tracker};

pub const STORE_FILE: &str = "mappings.json";

// ---------------------------------------------------------------------------
// On-disk payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraKeyRef {
    pub jira_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearIssueRef {
    pub linear_issue_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearCommentRef {
    pub linear_comment_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraCommentRef {
    pub jira_comment_id: String,
}

/// The four link tables. Each pair of tables is always written together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityFile {
    #[serde(default)]
    pub linear_to_jira: BTreeMap<String, JiraKeyRef>,
    #[serde(default)]
    pub jira_to_linear: BTreeMap<String, LinearIssueRef>,
    #[serde(default)]
    pub jira_comment_to_linear_comment: BTreeMap<String, LinearCommentRef>,
    #[serde(default)]
    pub linear_comment_to_jira_comment: BTreeMap<String, JiraCommentRef>,
}

impl IdentityFile {
    pub fn jira_key(&self, id: &LinearIssueId) -> Option<IssueKey> {
        self.linear_to_jira
            .get(id.as_str())
            .map(|r| IssueKey::from(r.jira_key.as_str()))
    }

    pub fn linear_issue_id(&self, key: &IssueKey) -> Option<LinearIssueId> {
        self.jira_to_linear
            .get(key.as_str())
            .map(|r| LinearIssueId::from(r.linear_issue_id.as_str()))
    }

    /// Link `key` and `id`, dropping any previous partner of either side.
    pub fn link_issue(&mut self, key: &IssueKey, id: &LinearIssueId) {
        if let Some(old) = self.jira_to_linear.get(key.as_str()) {
            if old.linear_issue_id != id.as_str() {
                let stale = old.linear_issue_id.clone();
                self.linear_to_jira.remove(&stale);
            }
        }
        if let Some(old) = self.linear_to_jira.get(id.as_str()) {
            if old.jira_key != key.as_str() {
                let stale = old.jira_key.clone();
                self.jira_to_linear.remove(&stale);
            }
        }
        self.linear_to_jira.insert(
            id.0.clone(),
            JiraKeyRef {
                jira_key: key.0.clone(),
            },
        );
        self.jira_to_linear.insert(
            key.0.clone(),
            LinearIssueRef {
                linear_issue_id: id.0.clone(),
            },
        );
    }

    /// Remove the link involving `key`, returning the removed pair.
    pub fn unlink_key(&mut self, key: &IssueKey) -> Option<(IssueKey, LinearIssueId)> {
        let removed = self.jira_to_linear.remove(key.as_str())?;
        self.linear_to_jira.remove(&removed.linear_issue_id);
        Some((key.clone(), LinearIssueId::from(removed.linear_issue_id)))
    }

    /// Remove the link involving `id`, returning the removed pair.
    pub fn unlink_issue_id(&mut self, id: &LinearIssueId) -> Option<(IssueKey, LinearIssueId)> {
        let removed = self.linear_to_jira.remove(id.as_str())?;
        self.jira_to_linear.remove(&removed.jira_key);
        Some((IssueKey::from(removed.jira_key), id.clone()))
    }

    pub fn is_jira_comment_mirrored(&self, id: &JiraCommentId) -> bool {
        self.jira_comment_to_linear_comment.contains_key(id.as_str())
    }

    pub fn is_linear_comment_mirrored(&self, id: &LinearCommentId) -> bool {
        self.linear_comment_to_jira_comment.contains_key(id.as_str())
    }

    pub fn link_comment(&mut self, jira: &JiraCommentId, linear: &LinearCommentId) {
        if let Some(old) = self.jira_comment_to_linear_comment.get(jira.as_str()) {
            if old.linear_comment_id != linear.as_str() {
                let stale = old.linear_comment_id.clone();
                self.linear_comment_to_jira_comment.remove(&stale);
            }
        }
        if let Some(old) = self.linear_comment_to_jira_comment.get(linear.as_str()) {
            if old.jira_comment_id != jira.as_str() {
                let stale = old.jira_comment_id.clone();
                self.jira_comment_to_linear_comment.remove(&stale);
            }
        }
        self.jira_comment_to_linear_comment.insert(
            jira.0.clone(),
            LinearCommentRef {
                linear_comment_id: linear.0.clone(),
            },
        );
        self.linear_comment_to_jira_comment.insert(
            linear.0.clone(),
            JiraCommentRef {
                jira_comment_id: jira.0.clone(),
            },
        );
    }

    /// All issue links, ordered by Jira key.
    pub fn issue_pairs(&self) -> Vec<(IssueKey, LinearIssueId)> {
        self.jira_to_linear
            .iter()
            .map(|(key, r)| {
                (
                    IssueKey::from(key.as_str()),
                    LinearIssueId::from(r.linear_issue_id.as_str()),
                )
            })
            .collect()
    }

    pub fn comment_pair_count(&self) -> usize {
        self.jira_comment_to_linear_comment.len()
    }
}

// ---------------------------------------------------------------------------
// Store handle
// ---------------------------------------------------------------------------

/// Handle to the identity store file. Cheap to clone; holds no open file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityStore {
    path: PathBuf,
}

/// `<home>/.trackbridge/mappings.json`
pub fn default_store_path_at(home: &Path) -> PathBuf {
    bridge_root(home).join(STORE_FILE)
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location under `home`.
    pub fn open_at(home: &Path) -> Self {
        Self::new(default_store_path_at(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole store from disk.
    ///
    /// Returns an empty store if the file does not exist or cannot be
    /// decoded, including bytes that are not UTF-8.
    pub fn load(&self) -> Result<IdentityFile, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(IdentityFile::default()),
            Err(err) => return Err(store_io(&self.path, err)),
        };
        match serde_json::from_slice::<IdentityFile>(&bytes) {
            Ok(file) => Ok(file),
            Err(err) => {
                tracing::warn!(
                    "identity store {} is unreadable ({err}); treating it as empty",
                    self.path.display()
                );
                Ok(IdentityFile::default())
            }
        }
    }

    /// Apply `change` to the persisted store under the store lock.
    pub fn update<R>(&self, change: impl FnOnce(&mut IdentityFile) -> R) -> Result<R, StoreError> {
        let Some(dir) = self.path.parent() else {
            return Err(store_io(
                &self.path,
                std::io::Error::other("invalid identity store path"),
            ));
        };
        fs::create_dir_all(dir).map_err(|e| store_io(dir, e))?;

        let lock_path = sibling(&self.path, ".lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| store_io(&lock_path, e))?;
        lock.lock_exclusive().map_err(|source| StoreError::Lock {
            path: lock_path.clone(),
            source,
        })?;

        let result = self.load().and_then(|mut file| {
            let out = change(&mut file);
            self.save(&file)?;
            Ok(out)
        });

        let _ = FileExt::unlock(&lock);
        result
    }

    fn save(&self, file: &IdentityFile) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(file)?;
        let tmp = sibling(&self.path, ".tmp");
        fs::write(&tmp, json).map_err(|e| store_io(&tmp, e))?;
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(store_io(&self.path, err));
        }
        Ok(())
    }

    // -- contract operations -------------------------------------------------

    pub fn jira_key(&self, id: &LinearIssueId) -> Result<Option<IssueKey>, StoreError> {
        Ok(self.load()?.jira_key(id))
    }

    pub fn linear_issue_id(&self, key: &IssueKey) -> Result<Option<LinearIssueId>, StoreError> {
        Ok(self.load()?.linear_issue_id(key))
    }

    pub fn set_issue_pair(&self, key: &IssueKey, id: &LinearIssueId) -> Result<(), StoreError> {
        self.update(|file| file.link_issue(key, id))
    }

    /// Whether a comment id from `side` has already been mirrored.
    pub fn is_comment_mirrored(&self, side: Tracker, comment_id: &str) -> Result<bool, StoreError> {
        let file = self.load()?;
        Ok(match side {
            Tracker::Jira => file.is_jira_comment_mirrored(&JiraCommentId::from(comment_id)),
            Tracker::Linear => file.is_linear_comment_mirrored(&LinearCommentId::from(comment_id)),
        })
    }

    pub fn set_comment_pair(
        &self,
        jira: &JiraCommentId,
        linear: &LinearCommentId,
    ) -> Result<(), StoreError> {
        self.update(|file| file.link_comment(jira, linear))
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
