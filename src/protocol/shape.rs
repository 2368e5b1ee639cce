//! Output-shape configuration.
//!
//! The wire format carries no type tags, so two facts about each verb have to
//! be known up front: whether it must always yield a list, and whether its
//! output is a set of named sub-objects introduced by a repeating key. The
//! default table below is kept exactly as-is; callers may extend it.

use std::collections::{HashMap, HashSet};

/// Verbs whose result is always list-shaped, even for zero or one lines.
pub const LIST_VERBS: &[&str] = &[
    "channels",
    "commands",
    "decoders",
    "find",
    "list",
    "listall",
    "listallinfo",
    "listfiles",
    "listmounts",
    "listneighbors",
    "listpartitions",
    "listplaylist",
    "listplaylistinfo",
    "listplaylists",
    "lsinfo",
    "notcommands",
    "outputs",
    "playlist",
    "playlistfind",
    "playlistid",
    "playlistinfo",
    "playlistsearch",
    "plchanges",
    "plchangesposid",
    "readmessages",
    "search",
    "tagtypes",
    "urlhandlers",
];

/// Verbs whose output is grouped by a repeating key.
pub const GROUPING_KEYS: &[(&str, &str)] = &[("decoders", "plugin"), ("listplaylists", "playlist")];

/// How the parser should shape one verb's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shape {
    pub expects_list: bool,
    pub grouping_key: Option<String>,
}

/// Verb name to [`Shape`] lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseShapes {
    list_verbs: HashSet<String>,
    grouping_keys: HashMap<String, String>,
}

impl Default for ResponseShapes {
    fn default() -> Self {
        Self {
            list_verbs: LIST_VERBS.iter().map(|v| v.to_string()).collect(),
            grouping_keys: GROUPING_KEYS
                .iter()
                .map(|(verb, key)| (verb.to_string(), key.to_string()))
                .collect(),
        }
    }
}

impl ResponseShapes {
    /// An empty table: every verb is parsed purely from its output.
    pub fn empty() -> Self {
        Self {
            list_verbs: HashSet::new(),
            grouping_keys: HashMap::new(),
        }
    }

    pub fn with_list_verb(mut self, verb: impl Into<String>) -> Self {
        self.list_verbs.insert(verb.into());
        self
    }

    pub fn with_grouping_key(mut self, verb: impl Into<String>, key: impl Into<String>) -> Self {
        self.grouping_keys.insert(verb.into(), key.into());
        self
    }

    pub fn expects_list(&self, verb: &str) -> bool {
        self.list_verbs.contains(verb)
    }

    pub fn grouping_key(&self, verb: &str) -> Option<&str> {
        self.grouping_keys.get(verb).map(String::as_str)
    }

    pub fn shape_for(&self, verb: &str) -> Shape {
        Shape {
            expects_list: self.expects_list(verb),
            grouping_key: self.grouping_key(verb).map(str::to_string),
        }
    }
}
