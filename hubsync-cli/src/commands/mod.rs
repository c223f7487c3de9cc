pub mod collect;
pub mod detect;
pub mod maintenance;
pub mod patch;
pub mod reconcile;
pub mod run;
pub mod shortlist;
pub mod status;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use hubsync_core::Settings;

/// Resolved global options shared by every subcommand.
#[derive(Debug)]
pub struct Context {
    pub repo: PathBuf,
    pub settings: Settings,
}

/// "3h ago", "2d ago", "never".
pub fn format_age(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "never".to_string();
    };
    let secs = now.signed_duration_since(at).num_seconds().max(0);
    match secs {
        s if s < 60 => "just now".to_string(),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86_400),
    }
}
