use crate::config::Dao;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};
use tracing::{info, warn};
use utils::errors::{SETTINGS_PERSIST_FAILED, UNKNOWN_WIDGET_KIND};

pub const WIDGET_KINDS: [&str; 6] = [
    "auction-stats",
    "proposal-countdown",
    "favorite-delegates",
    "voting-power",
    "recent-activity",
    "treasury-stats",
];

const DEFAULT_SETTINGS_FILE: &str = "nouniverse-settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub rpc_override: Option<String>,
    pub nouns_graph_override: Option<String>,
    pub lilnouns_graph_override: Option<String>,
    pub selected_dao: Dao,
    pub widgets: Vec<String>,
    pub favorite_proposals: Vec<String>,
    pub favorite_delegates: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            rpc_override: None,
            nouns_graph_override: None,
            lilnouns_graph_override: None,
            selected_dao: Dao::Nouns,
            widgets: vec![
                "auction-stats".to_string(),
                "proposal-countdown".to_string(),
            ],
            favorite_proposals: Vec::new(),
            favorite_delegates: Vec::new(),
        }
    }
}

impl AppSettings {
    pub fn indexer_override(&self, dao: Dao) -> Option<&str> {
        let value = match dao {
            Dao::Nouns => self.nouns_graph_override.as_deref(),
            Dao::LilNouns => self.lilnouns_graph_override.as_deref(),
        };
        value.filter(|url| !url.is_empty())
    }
}

/// Persisted user settings behind intent-named operations. Callers never
/// overwrite fields directly; every mutation goes through an operation that
/// enforces the settings invariants and persists the result.
pub struct SettingsStore {
    path: PathBuf,
    settings: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn load() -> Self {
        let path = std::env::var("NOUNIVERSE_SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));
        Self::load_from(path)
    }

    pub fn load_from(path: PathBuf) -> Self {
        let settings = Self::read_settings(&path);
        Self {
            path,
            settings: RwLock::new(settings),
        }
    }

    fn read_settings(path: &Path) -> AppSettings {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    info!(path = %path.display(), "Loaded settings");
                    settings
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Settings file is corrupt, using defaults");
                    AppSettings::default()
                }
            },
            Err(_) => AppSettings::default(),
        }
    }

    pub fn current(&self) -> AppSettings {
        self.settings.read().unwrap().clone()
    }

    pub fn selected_dao(&self) -> Dao {
        self.settings.read().unwrap().selected_dao
    }

    pub fn set_selected_dao(&self, dao: Dao) -> Result<()> {
        self.mutate(|settings| {
            settings.selected_dao = dao;
            Ok(())
        })
    }

    pub fn set_rpc_override(&self, url: Option<String>) -> Result<()> {
        self.mutate(|settings| {
            settings.rpc_override = url.filter(|u| !u.is_empty());
            Ok(())
        })
    }

    pub fn set_indexer_override(&self, dao: Dao, url: Option<String>) -> Result<()> {
        self.mutate(|settings| {
            let slot = match dao {
                Dao::Nouns => &mut settings.nouns_graph_override,
                Dao::LilNouns => &mut settings.lilnouns_graph_override,
            };
            *slot = url.filter(|u| !u.is_empty());
            Ok(())
        })
    }

    /// Returns true when the proposal is a favorite after the toggle.
    pub fn toggle_favorite_proposal(&self, proposal_id: &str) -> Result<bool> {
        self.mutate(|settings| {
            Ok(toggle(&mut settings.favorite_proposals, proposal_id))
        })
    }

    /// Returns true when the delegate is a favorite after the toggle.
    pub fn toggle_favorite_delegate(&self, delegate_id: &str) -> Result<bool> {
        self.mutate(|settings| {
            Ok(toggle(&mut settings.favorite_delegates, delegate_id))
        })
    }

    pub fn add_widget(&self, kind: &str) -> Result<()> {
        if !WIDGET_KINDS.contains(&kind) {
            anyhow::bail!("{}: {}", UNKNOWN_WIDGET_KIND, kind);
        }
        self.mutate(|settings| {
            if !settings.widgets.iter().any(|w| w == kind) {
                settings.widgets.push(kind.to_string());
            }
            Ok(())
        })
    }

    pub fn remove_widget(&self, kind: &str) -> Result<()> {
        self.mutate(|settings| {
            settings.widgets.retain(|w| w != kind);
            Ok(())
        })
    }

    pub fn reset(&self) -> Result<()> {
        self.mutate(|settings| {
            *settings = AppSettings::default();
            Ok(())
        })
    }

    fn mutate<R>(&self, apply: impl FnOnce(&mut AppSettings) -> Result<R>) -> Result<R> {
        let mut settings = self.settings.write().unwrap();
        let result = apply(&mut settings)?;
        self.persist(&settings)?;
        Ok(result)
    }

    fn persist(&self, settings: &AppSettings) -> Result<()> {
        let contents = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("{}: {}", SETTINGS_PERSIST_FAILED, self.path.display()))
    }
}

fn toggle(list: &mut Vec<String>, id: &str) -> bool {
    if let Some(position) = list.iter().position(|entry| entry == id) {
        list.remove(position);
        false
    } else {
        list.push(id.to_string());
        true
    }
}
