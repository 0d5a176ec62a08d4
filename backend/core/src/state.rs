//! Immutable state snapshots published by the load plugins.

use serde::Serialize;

use crate::error::LoadError;

/// Outcome of the last completed load. `None` in a snapshot means no load has
/// completed yet.
pub type LoadOutcome = Result<(), LoadError>;

fn classify(result: &Option<LoadOutcome>) -> (bool, bool, bool) {
    match result {
        None => (true, false, false),
        Some(Ok(())) => (false, true, false),
        Some(Err(_)) => (false, false, true),
    }
}

/// State of a single-resource load.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataState<T> {
    pub data: T,
    pub result: Option<LoadOutcome>,
    /// Independent of `result`: a reload keeps the previous result visible.
    pub is_loading: bool,
}

impl<T> DataState<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            result: None,
            is_loading: false,
        }
    }

    pub fn is_initial(&self) -> bool {
        classify(&self.result).0
    }

    pub fn is_success(&self) -> bool {
        classify(&self.result).1
    }

    pub fn is_failure(&self) -> bool {
        classify(&self.result).2
    }

    pub fn failure(&self) -> Option<&LoadError> {
        self.result.as_ref().and_then(|r| r.as_ref().err())
    }
}

impl<T: Default> Default for DataState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// State of a payload-less load channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadState {
    pub is_loading: bool,
}

/// Merged state of a paginated list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState<T> {
    pub data: Vec<T>,
    /// Page of the last completed load; set together with `result`.
    pub page: Option<i32>,
    pub result: Option<LoadOutcome>,
    /// Whether `result` came from a refresh (`true`) or a load-more (`false`).
    pub is_refresh_result: Option<bool>,
    /// `None` until a successful load reports it.
    pub has_more: Option<bool>,
    pub is_refreshing: bool,
    pub is_loading_more: bool,
}

impl<T> PageState<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            page: None,
            result: None,
            is_refresh_result: None,
            has_more: None,
            is_refreshing: false,
            is_loading_more: false,
        }
    }

    pub fn is_initial(&self) -> bool {
        classify(&self.result).0
    }

    pub fn is_success(&self) -> bool {
        classify(&self.result).1
    }

    pub fn is_failure(&self) -> bool {
        classify(&self.result).2
    }

    pub fn failure(&self) -> Option<&LoadError> {
        self.result.as_ref().and_then(|r| r.as_ref().err())
    }

    /// The last load succeeded but produced nothing to show.
    pub fn is_success_empty(&self) -> bool {
        self.is_success() && self.data.is_empty() && !self.is_refreshing
    }

    /// The last load failed and there is nothing to show instead.
    pub fn is_failure_empty(&self) -> bool {
        self.is_failure() && self.data.is_empty() && !self.is_refreshing
    }
}

impl<T> Default for PageState<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// What a paged load callback reports back.
///
/// `data: None` in any variant leaves the current list unchanged, which lets a
/// callback report side-channel updates such as "no more pages".
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult<T> {
    Success {
        data: Option<Vec<T>>,
        /// Number of new items the requested page contributed.
        page_size: usize,
        has_more: Option<bool>,
    },
    Failure {
        error: LoadError,
        data: Option<Vec<T>>,
    },
    /// Publishes `data` only; result, cursor and `has_more` stay as they are.
    Probe { data: Option<Vec<T>> },
}

impl<T> LoadResult<T> {
    pub fn success(data: Option<Vec<T>>, page_size: usize, has_more: Option<bool>) -> Self {
        Self::Success {
            data,
            page_size,
            has_more,
        }
    }

    pub fn failure(error: impl Into<LoadError>, data: Option<Vec<T>>) -> Self {
        Self::Failure {
            error: error.into(),
            data,
        }
    }

    pub fn probe(data: Option<Vec<T>>) -> Self {
        Self::Probe { data }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_state_classification() {
        let mut state = DataState::new(0);
        assert!(state.is_initial());
        assert!(!state.is_success() && !state.is_failure());

        state.result = Some(Ok(()));
        assert!(state.is_success());

        state.result = Some(Err(LoadError::msg("boom")));
        assert!(state.is_failure());
        assert_eq!(state.failure().map(ToString::to_string).as_deref(), Some("boom"));
    }

    #[test]
    fn test_page_state_empty_views() {
        let mut state: PageState<i32> = PageState::default();
        assert!(!state.is_success_empty());

        state.result = Some(Ok(()));
        assert!(state.is_success_empty());

        state.is_refreshing = true;
        assert!(!state.is_success_empty());

        state.is_refreshing = false;
        state.result = Some(Err(LoadError::msg("offline")));
        assert!(state.is_failure_empty());

        state.data = vec![1];
        assert!(!state.is_failure_empty());
    }

    #[test]
    fn test_page_state_serializes_camel_case() {
        let mut state = PageState::new(vec![1, 2]);
        state.page = Some(1);
        state.result = Some(Err(LoadError::msg("offline")));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["page"], 1);
        assert_eq!(json["isLoadingMore"], false);
        assert_eq!(json["result"]["Err"], "offline");
    }
}
