//! Simulated user directory backing the demo commands.
//!
//! Each page takes `latency` to arrive and fails with probability
//! `failure_rate`. A refresh resets the accumulated list, a load-more appends
//! to it, and pages past the last one report no more data.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use stateforge_config::StateforgeConfig;
use stateforge_plugins::{LoadResult, PageRequest};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSettings {
    pub pages: u32,
    pub page_size: u32,
    pub refresh_page: i32,
    pub latency: Duration,
    pub failure_rate: f64,
}

impl SourceSettings {
    pub fn from_config(config: &StateforgeConfig) -> Self {
        Self {
            pages: config.demo_pages(),
            page_size: config.demo_page_size(),
            refresh_page: config.refresh_page(),
            latency: Duration::from_millis(config.demo_latency_ms()),
            failure_rate: config.demo_failure_rate(),
        }
    }
}

pub struct UserSource {
    settings: SourceSettings,
    users: Mutex<Vec<String>>,
}

impl UserSource {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            users: Mutex::new(Vec::new()),
        }
    }

    fn should_fail(&self) -> bool {
        rand::thread_rng().gen_bool(self.settings.failure_rate.clamp(0.0, 1.0))
    }

    pub async fn load_page(&self, request: PageRequest) -> LoadResult<String> {
        let id = Uuid::new_v4();
        debug!(page = request.page, is_refresh = request.is_refresh, %id, "Loading users");
        tokio::time::sleep(self.settings.latency).await;

        if self.should_fail() {
            debug!(%id, "Load failed");
            return LoadResult::failure(anyhow!("Connection timeout."), None);
        }

        let index = request.page - self.settings.refresh_page;
        if index < 0 || index >= self.settings.pages as i32 {
            debug!(%id, "No more users");
            return LoadResult::success(None, 0, Some(false));
        }

        let batch: Vec<String> = (0..self.settings.page_size).map(|_| user_name()).collect();
        let page_size = batch.len();
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if request.is_refresh {
            users.clear();
        }
        users.extend(batch);
        let has_more = index + 1 < self.settings.pages as i32;
        LoadResult::success(Some(users.clone()), page_size, Some(has_more))
    }

    /// Single profile lookup for the data demo.
    pub async fn load_profile(&self) -> Result<String> {
        tokio::time::sleep(self.settings.latency).await;
        if self.should_fail() {
            return Err(anyhow!("Connection timeout."));
        }
        Ok(user_name())
    }
}

fn user_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("user-{}", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SourceSettings {
        SourceSettings {
            pages: 2,
            page_size: 3,
            refresh_page: 1,
            latency: Duration::from_millis(10),
            failure_rate: 0.0,
        }
    }

    fn request(page: i32, is_refresh: bool) -> PageRequest {
        PageRequest { page, is_refresh }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_accumulate_until_exhausted() {
        let source = UserSource::new(settings());

        let LoadResult::Success { data: Some(first), has_more, .. } =
            source.load_page(request(1, true)).await
        else {
            panic!("expected first page");
        };
        assert_eq!(first.len(), 3);
        assert_eq!(has_more, Some(true));

        let LoadResult::Success { data: Some(second), has_more, page_size } =
            source.load_page(request(2, false)).await
        else {
            panic!("expected second page");
        };
        assert_eq!(second.len(), 6);
        assert_eq!(page_size, 3);
        assert_eq!(has_more, Some(false));

        assert_eq!(
            source.load_page(request(3, false)).await,
            LoadResult::success(None, 0, Some(false))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_resets_list() {
        let source = UserSource::new(settings());
        source.load_page(request(1, true)).await;
        source.load_page(request(2, false)).await;

        let LoadResult::Success { data: Some(users), .. } = source.load_page(request(1, true)).await
        else {
            panic!("expected refresh page");
        };
        assert_eq!(users.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_certain_failure() {
        let source = UserSource::new(SourceSettings {
            failure_rate: 1.0,
            ..settings()
        });
        assert!(!source.load_page(request(1, true)).await.is_success());
        assert!(source.load_profile().await.is_err());
    }
}
