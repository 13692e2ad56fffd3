//! # Tana Connector - Mail Module
//!
//! Mail folder identifiers as understood by the Graph mail API.

use serde::{Deserialize, Serialize};

/// Well-known Graph mail folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellKnownFolder {
    Inbox,
    SentItems,
    Drafts,
    DeletedItems,
    JunkEmail,
    Archive,
    Outbox,
    Scheduled,
    Clutter,
    ConversationHistory,
    MsgFolderRoot,
    SearchFolders,
    RecoverableItemsDeletions,
}

impl WellKnownFolder {
    /// Canonical Graph name, usable in place of a folder id
    pub fn as_str(&self) -> &'static str {
        match self {
            WellKnownFolder::Inbox => "inbox",
            WellKnownFolder::SentItems => "sentitems",
            WellKnownFolder::Drafts => "drafts",
            WellKnownFolder::DeletedItems => "deleteditems",
            WellKnownFolder::JunkEmail => "junkemail",
            WellKnownFolder::Archive => "archive",
            WellKnownFolder::Outbox => "outbox",
            WellKnownFolder::Scheduled => "scheduled",
            WellKnownFolder::Clutter => "clutter",
            WellKnownFolder::ConversationHistory => "conversationhistory",
            WellKnownFolder::MsgFolderRoot => "msgfolderroot",
            WellKnownFolder::SearchFolders => "searchfolders",
            WellKnownFolder::RecoverableItemsDeletions => "recoverableitemsdeletions",
        }
    }

    /// Match a canonical name or a common alias, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        let folder = match name.trim().to_lowercase().as_str() {
            "inbox" => WellKnownFolder::Inbox,
            "sentitems" | "sent" | "sent items" => WellKnownFolder::SentItems,
            "drafts" | "draft" => WellKnownFolder::Drafts,
            "deleteditems" | "deleted" | "deleted items" | "trash" => WellKnownFolder::DeletedItems,
            "junkemail" | "junk" | "spam" => WellKnownFolder::JunkEmail,
            "archive" => WellKnownFolder::Archive,
            "outbox" => WellKnownFolder::Outbox,
            "scheduled" => WellKnownFolder::Scheduled,
            "clutter" => WellKnownFolder::Clutter,
            "conversationhistory" => WellKnownFolder::ConversationHistory,
            "msgfolderroot" => WellKnownFolder::MsgFolderRoot,
            "searchfolders" => WellKnownFolder::SearchFolders,
            "recoverableitemsdeletions" => WellKnownFolder::RecoverableItemsDeletions,
            _ => return None,
        };
        Some(folder)
    }
}

/// Normalize a folder reference to the id used for API calls and cache keys.
///
/// Well-known names and aliases map to their canonical name; anything else
/// is an opaque provider id and is only trimmed (Graph ids are case-sensitive).
pub fn normalize_folder_id(folder: &str) -> String {
    match WellKnownFolder::from_name(folder) {
        Some(known) => known.as_str().to_string(),
        None => folder.trim().to_string(),
    }
}
