//! Scene construction configuration and the process-wide default project.
//!
//! The process default project is read exactly once per Scene, when
//! [`SceneConfig::default`] runs, never at call time. A reassignment only
//! affects Scenes constructed afterwards. Concurrent reassignments are atomic
//! and the last write wins.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;

/// Project used when neither the process nor the Scene names one.
pub const FALLBACK_PROJECT: &str = "default";

static DEFAULT_PROJECT: LazyLock<ArcSwap<String>> =
    LazyLock::new(|| ArcSwap::from_pointee(FALLBACK_PROJECT.to_string()));

/// Returns the process-wide default project.
#[must_use]
pub fn default_project() -> Arc<String> {
    DEFAULT_PROJECT.load_full()
}

/// Replaces the process-wide default project.
///
/// Scenes that already exist keep the project they were constructed with.
pub fn set_default_project(project: impl Into<String>) {
    let project = project.into();
    tracing::info!(project = %project, "process default project changed");
    DEFAULT_PROJECT.store(Arc::new(project));
}

/// Construction-time settings for a [`Scene`](super::Scene).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneConfig {
    /// Project targeted by remote calls that do not name one explicitly.
    pub default_project: String,
}

impl SceneConfig {
    /// Configuration targeting `project` by default.
    #[must_use]
    pub fn with_project(project: impl Into<String>) -> Self {
        Self {
            default_project: project.into(),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            default_project: default_project().as_ref().clone(),
        }
    }
}
