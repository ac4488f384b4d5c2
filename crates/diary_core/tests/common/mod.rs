#![allow(dead_code)]

use async_trait::async_trait;
use diary_core::ai::{
    Prompt, ProviderFailure, ProviderFailureKind, SearchError, SearchHit, SearchProvider,
    TextProvider,
};
use diary_core::model::user::User;
use diary_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use diary_core::service::user_service::UserService;
use diary_core::{ServiceResult, Store};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const ADMIN: i64 = 1000;
pub const STUDENT: i64 = 2000;

/// Provider that replays scripted answers in order, then repeats the last.
pub struct ScriptedProvider {
    name: &'static str,
    answers: Mutex<VecDeque<Result<String, ProviderFailureKind>>>,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, answers: Vec<Result<&str, ProviderFailureKind>>) -> Self {
        Self {
            name,
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|answer| answer.map(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(name: &'static str, answer: &str) -> Self {
        Self::new(name, vec![Ok(answer)])
    }

    pub fn failing(name: &'static str, kind: ProviderFailureKind) -> Self {
        Self::new(name, vec![Err(kind)])
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderFailure> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let mut answers = self.answers.lock().unwrap();
        let answer = if answers.len() > 1 {
            answers.pop_front()
        } else {
            answers.front().cloned()
        };
        match answer {
            Some(Ok(text)) => Ok(text),
            Some(Err(kind)) => Err(ProviderFailure::new(self.name, kind, "scripted failure")),
            None => Err(ProviderFailure::new(
                self.name,
                ProviderFailureKind::InvalidResponse,
                "no scripted answer",
            )),
        }
    }
}

/// Provider that never answers within any reasonable timeout.
pub struct StalledProvider;

#[async_trait]
impl TextProvider for StalledProvider {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String, ProviderFailure> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }
}

/// Search backend that fails every query.
#[derive(Default)]
pub struct FailingSearch {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SearchProvider for FailingSearch {
    async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SearchError::Http("connection refused".into()))
    }
}

/// Search backend returning fixed hits for every query.
pub struct FixedSearch {
    pub hits: Vec<SearchHit>,
}

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchHit>, SearchError> {
        Ok(self.hits.clone())
    }
}

pub fn hit(title: &str, link: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        link: link.to_string(),
    }
}

pub fn resolve(store: &Store, external_id: i64) -> User {
    store
        .with_conn(|conn| -> ServiceResult<User> {
            UserService::new(SqliteUserRepository::try_new(conn)?).resolve_or_create(
                external_id,
                Some("tester"),
                None,
            )
        })
        .unwrap()
}

pub fn reload_user(store: &Store, external_id: i64) -> User {
    store
        .with_conn(|conn| -> ServiceResult<Option<User>> {
            Ok(SqliteUserRepository::try_new(conn)?.find_by_external_id(external_id)?)
        })
        .unwrap()
        .unwrap()
}

pub fn count_rows(store: &Store, table: &str) -> i64 {
    store
        .with_conn(|conn| -> ServiceResult<i64> {
            Ok(conn
                .query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
                .map_err(diary_core::RepoError::from)?)
        })
        .unwrap()
}
