//! In-memory collaborators for exercising the pipeline without network access.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::hosting::{
    CommitDetail, CommitQuery, HostingApi, HostingError, ListedCommit, RepoMetadata,
};
use crate::model::{CompletionRequest, ModelClient};
use crate::repo_ref::RepoRef;
use crate::types::{CommitRef, FileChange};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build a listing entry. An unparseable `date` leaves the commit undated.
pub fn listed_commit(sha: &str, date: &str, parent_count: usize) -> ListedCommit {
    ListedCommit {
        commit: CommitRef {
            sha: sha.to_string(),
            author: "Test Author".to_string(),
            date: date.parse().ok(),
            message: format!("commit {}\n\nbody", sha),
        },
        parent_count,
    }
}

pub fn file_change(filename: &str, additions: u64, deletions: u64, patch: &str) -> FileChange {
    FileChange {
        filename: filename.to_string(),
        status: "modified".to_string(),
        additions,
        deletions,
        changes: additions + deletions,
        patch: patch.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostingCall {
    GetRepository,
    ListBranches,
    ListCommits { branch: String },
    GetCommit { sha: String },
}

/// Scripted hosting API. Branches enumerate in insertion order.
pub struct FakeHosting {
    metadata: RepoMetadata,
    branches: Vec<(String, Vec<ListedCommit>)>,
    details: HashMap<String, Vec<FileChange>>,
    failure: Option<(u16, String)>,
    calls: Mutex<Vec<HostingCall>>,
}

impl FakeHosting {
    pub fn new(default_branch: &str) -> Self {
        Self {
            metadata: RepoMetadata {
                full_name: "octo/demo".to_string(),
                default_branch: default_branch.to_string(),
                private: false,
            },
            branches: Vec::new(),
            details: HashMap::new(),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn private(mut self) -> Self {
        self.metadata.private = true;
        self
    }

    pub fn with_branch(mut self, name: &str, commits: Vec<ListedCommit>) -> Self {
        self.branches.push((name.to_string(), commits));
        self
    }

    /// Files returned by `get_commit`. Unregistered shas have no files.
    pub fn with_files(mut self, sha: &str, files: Vec<FileChange>) -> Self {
        self.details.insert(sha.to_string(), files);
        self
    }

    /// Every call fails with this upstream status.
    pub fn failing_with(mut self, status: u16, message: &str) -> Self {
        self.failure = Some((status, message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<HostingCall> {
        lock(&self.calls).clone()
    }

    pub fn commit_detail_fetches(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, HostingCall::GetCommit { .. }))
            .count()
    }

    fn record(&self, call: HostingCall) -> Result<(), HostingError> {
        lock(&self.calls).push(call);
        match &self.failure {
            Some((status, message)) => Err(HostingError::from_status(*status, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HostingApi for FakeHosting {
    async fn get_repository(&self, _repo: &RepoRef) -> Result<RepoMetadata, HostingError> {
        self.record(HostingCall::GetRepository)?;
        Ok(self.metadata.clone())
    }

    async fn list_branches(&self, _repo: &RepoRef) -> Result<Vec<String>, HostingError> {
        self.record(HostingCall::ListBranches)?;
        Ok(self.branches.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn list_commits(
        &self,
        _repo: &RepoRef,
        query: &CommitQuery,
    ) -> Result<Vec<ListedCommit>, HostingError> {
        self.record(HostingCall::ListCommits {
            branch: query.branch.clone(),
        })?;
        self.branches
            .iter()
            .find(|(name, _)| *name == query.branch)
            .map(|(_, commits)| commits.clone())
            .ok_or_else(|| HostingError::from_status(404, "Branch not found".to_string()))
    }

    async fn get_commit(&self, _repo: &RepoRef, sha: &str) -> Result<CommitDetail, HostingError> {
        self.record(HostingCall::GetCommit {
            sha: sha.to_string(),
        })?;
        Ok(CommitDetail {
            sha: sha.to_string(),
            files: self.details.get(sha).cloned().unwrap_or_default(),
            stats: None,
        })
    }
}

/// Model that replays queued responses, then a fixed fallback text.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(fallback: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, text: &str) -> Self {
        lock(&self.responses).push_back(Ok(text.to_string()));
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        lock(&self.responses).push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        lock(&self.requests).push(request.clone());
        match lock(&self.responses).pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}
