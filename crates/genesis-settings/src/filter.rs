//! Filter state: which part of the settings tree the UI shows right now.

use ahash::AHashSet;

use crate::arena::SettingArena;
use crate::ids::SettingId;
use crate::setting::SettingKind;

/// Query describing which settings to list.
#[derive(Debug, Clone)]
pub struct FilterState {
    /// Include settings that are disabled.
    pub include_disabled: bool,
    /// Include settings that are hidden.
    pub include_hidden: bool,
    /// Include settings that cannot be reset. When false, only resetable settings pass.
    pub include_resetable: bool,
    /// Expand pages inline instead of treating them as single rows.
    pub include_nested_pages: bool,
    allow_list: AHashSet<SettingId>,
    root_list: Vec<SettingId>,
    search_text: String,
    search_terms: Vec<String>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            include_disabled: true,
            include_hidden: false,
            include_resetable: true,
            include_nested_pages: false,
            allow_list: AHashSet::new(),
            root_list: Vec::new(),
            search_text: String::new(),
            search_terms: Vec::new(),
        }
    }
}

impl FilterState {
    /// Default filter: everything visible.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether disabled settings are included.
    #[must_use]
    pub fn with_include_disabled(mut self, include: bool) -> Self {
        self.include_disabled = include;
        self
    }

    /// Set whether hidden settings are included.
    #[must_use]
    pub fn with_include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Set whether settings that cannot be reset are included.
    #[must_use]
    pub fn with_include_resetable(mut self, include: bool) -> Self {
        self.include_resetable = include;
        self
    }

    /// Set whether nested pages are expanded.
    #[must_use]
    pub fn with_include_nested_pages(mut self, include: bool) -> Self {
        self.include_nested_pages = include;
        self
    }

    /// Start traversal at `setting` (and allow it and its descendants).
    #[must_use]
    pub fn with_root(mut self, setting: SettingId) -> Self {
        self.add_setting_to_root_list(setting);
        self
    }

    /// Set the search text.
    #[must_use]
    pub fn with_search_text(mut self, text: impl Into<String>) -> Self {
        self.set_search_text(text);
        self
    }

    /// Use `setting` as a traversal root. Roots are also allowed.
    pub fn add_setting_to_root_list(&mut self, setting: SettingId) {
        self.allow_list.insert(setting);
        if !self.root_list.contains(&setting) {
            self.root_list.push(setting);
        }
    }

    /// Only allow `setting` and its descendants (plus anything else allowed).
    pub fn add_setting_to_allow_list(&mut self, setting: SettingId) {
        self.allow_list.insert(setting);
    }

    /// Is `setting` a traversal root?
    #[must_use]
    pub fn is_setting_in_root_list(&self, setting: SettingId) -> bool {
        self.root_list.contains(&setting)
    }

    /// Is `setting` directly allowed?
    #[must_use]
    pub fn is_setting_in_allow_list(&self, setting: SettingId) -> bool {
        self.allow_list.contains(&setting)
    }

    /// Traversal roots.
    #[must_use]
    pub fn root_list(&self) -> &[SettingId] {
        &self.root_list
    }

    /// Set the search text. Whitespace separated terms must all match; quotes group a phrase.
    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
        self.search_terms = parse_search_terms(&self.search_text);
    }

    /// Current search text.
    #[must_use]
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    /// Does the setting pass every filter?
    ///
    /// Stale handles never pass. Search text is tested last.
    #[must_use]
    pub fn does_setting_pass_filter(&self, settings: &SettingArena, id: SettingId) -> bool {
        let Some(setting) = settings.get(id) else {
            return false;
        };
        let state = setting.edit_state();

        if !self.include_hidden && !state.is_visible() {
            return false;
        }
        if !self.include_disabled && !state.is_enabled() {
            return false;
        }
        if !self.include_resetable && !state.is_resetable() {
            return false;
        }

        if !self.allow_list.is_empty() && !self.allow_list.contains(&id) {
            let mut next = setting.parent();
            let mut allowed = false;
            while let Some(parent) = next {
                if self.allow_list.contains(&parent) {
                    allowed = true;
                    break;
                }
                next = settings.get(parent).and_then(|p| p.parent());
            }
            if !allowed {
                return false;
            }
        }

        self.matches_search(setting.description_plain_text())
    }

    fn matches_search(&self, plain_text: &str) -> bool {
        if self.search_terms.is_empty() {
            return true;
        }
        let haystack = plain_text.to_lowercase();
        self.search_terms.iter().all(|term| haystack.contains(term.as_str()))
    }
}

fn parse_search_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for (i, chunk) in text.split('"').enumerate() {
        if i % 2 == 1 {
            let phrase = chunk.trim();
            if !phrase.is_empty() {
                terms.push(phrase.to_lowercase());
            }
        } else {
            terms.extend(chunk.split_whitespace().map(str::to_lowercase));
        }
    }
    terms
}

/// Project the tree into the flat list of rows to display.
///
/// Traversal starts at the filter's root list if it has one, otherwise at
/// `top_level`.
pub(crate) fn settings_for_filter(
    settings: &SettingArena,
    filter: &FilterState,
    top_level: &[SettingId],
) -> Vec<SettingId> {
    let roots = if filter.root_list.is_empty() {
        top_level
    } else {
        &filter.root_list
    };

    let mut out = Vec::new();
    for &root in roots {
        let Some(setting) = settings.get(root) else {
            continue;
        };
        if setting.is_collection() {
            collect_collection(settings, filter, root, &mut out);
        } else if filter.does_setting_pass_filter(settings, root) {
            out.push(root);
        }
    }
    out
}

fn collect_collection(settings: &SettingArena, filter: &FilterState, id: SettingId, out: &mut Vec<SettingId>) {
    let Some(collection) = settings.get(id) else {
        return;
    };

    // Page contents are shown on their own screen.
    if collection.is_page() && !filter.include_nested_pages && !filter.is_setting_in_root_list(id) {
        return;
    }

    for &child_id in collection.children() {
        let Some(child) = settings.get(child_id) else {
            continue;
        };
        match child.kind() {
            SettingKind::Page(_) => {
                if filter.does_setting_pass_filter(settings, child_id) {
                    out.push(child_id);
                    if filter.include_nested_pages {
                        collect_collection(settings, filter, child_id, out);
                    }
                }
            },
            SettingKind::Collection => {
                let mut nested = Vec::new();
                collect_collection(settings, filter, child_id, &mut nested);
                if !nested.is_empty() {
                    if !filter.is_setting_in_root_list(child_id) {
                        out.push(child_id);
                    }
                    out.append(&mut nested);
                }
            },
            SettingKind::Value(_) | SettingKind::Action(_) => {
                if filter.does_setting_pass_filter(settings, child_id) {
                    out.push(child_id);
                }
            },
        }
    }
}
