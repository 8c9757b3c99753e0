use crate::entity::{AttrValue, Document, EntityId, ListRef, Slot};
use crate::statics;
use regex::{Regex, RegexBuilder};

/// Immutable tree filter: free text (literal or regex), optional exact
/// variant filter and optional single-attribute filter.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    text: String,
    type_filter: Option<String>,
    property_filter: Option<String>,
    use_regex: bool,
    pattern: Option<Regex>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

impl SearchCriteria {
    pub fn new(
        text: &str,
        type_filter: Option<&str>,
        property_filter: Option<&str>,
        use_regex: bool,
    ) -> Self {
        let pattern = if use_regex && !text.is_empty() {
            RegexBuilder::new(text).case_insensitive(true).build().ok()
        } else {
            None
        };
        Self {
            text: text.to_string(),
            type_filter: non_empty(type_filter),
            property_filter: non_empty(property_filter),
            use_regex,
            pattern,
        }
    }

    /// Literal, case-insensitive text match over the common attributes.
    pub fn text(text: &str) -> Self {
        Self::new(text, None, None, false)
    }

    pub fn search_text(&self) -> &str {
        &self.text
    }

    pub fn type_filter(&self) -> Option<&str> {
        self.type_filter.as_deref()
    }

    pub fn property_filter(&self) -> Option<&str> {
        self.property_filter.as_deref()
    }

    pub fn use_regex(&self) -> bool {
        self.use_regex
    }

    /// No text and no type filter: the tree is shown unfiltered.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.type_filter.is_none()
    }

    /// False only for regex criteria whose pattern does not compile.
    pub fn is_valid_pattern(&self) -> bool {
        !self.use_regex || self.text.is_empty() || self.pattern.is_some()
    }

    pub fn matches(&self, document: &Document, id: EntityId) -> bool {
        let Some(entity) = document.get(id) else {
            return false;
        };
        if let Some(type_filter) = &self.type_filter {
            if entity.variant() != type_filter {
                return false;
            }
        }
        if self.text.is_empty() {
            return true;
        }

        match &self.property_filter {
            Some(property) => entity
                .attribute(property)
                .and_then(AttrValue::search_text)
                .is_some_and(|value| self.matches_text(&value)),
            None => statics::XD_COMMON_TEXT_PROPERTIES.iter().any(|property| {
                entity
                    .attribute(property)
                    .and_then(AttrValue::search_text)
                    .is_some_and(|value| self.matches_text(&value))
            }),
        }
    }

    pub fn matches_text(&self, value: &str) -> bool {
        if self.use_regex {
            return self.pattern.as_ref().is_some_and(|p| p.is_match(value));
        }
        value.to_lowercase().contains(&self.text.to_lowercase())
    }
}

/// One planned text substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub entity: EntityId,
    pub property: String,
    pub old: String,
    pub new: String,
}

/// Text substitution over text attributes. Literal mode is case-sensitive;
/// regex mode expands `$n` groups. Unlike `SearchCriteria` the pattern here is
/// compiled case-sensitively.
#[derive(Debug, Clone)]
pub struct Replacer {
    search: String,
    replace: String,
    type_filter: Option<String>,
    property_filter: Option<String>,
    use_regex: bool,
    pattern: Option<Regex>,
    /// `replace` rewritten for `Regex::replace_all`.
    template: String,
}

impl Replacer {
    pub fn new(search: &str, replace: &str) -> Self {
        Self {
            search: search.to_string(),
            replace: replace.to_string(),
            type_filter: None,
            property_filter: None,
            use_regex: false,
            pattern: None,
            template: String::new(),
        }
    }

    pub fn regex(mut self, use_regex: bool) -> Self {
        self.use_regex = use_regex;
        self.pattern = if use_regex {
            Regex::new(&self.search).ok()
        } else {
            None
        };
        if let Some(pattern) = &self.pattern {
            self.template = regex_template(&self.replace, pattern.captures_len() - 1);
        }
        self
    }

    pub fn type_filter(mut self, type_filter: Option<&str>) -> Self {
        self.type_filter = non_empty(type_filter);
        self
    }

    pub fn property_filter(mut self, property_filter: Option<&str>) -> Self {
        self.property_filter = non_empty(property_filter);
        self
    }

    /// Reuse the filters of the active search.
    pub fn from_criteria(criteria: &SearchCriteria, replace: &str) -> Self {
        Replacer::new(criteria.search_text(), replace)
            .regex(criteria.use_regex())
            .type_filter(criteria.type_filter())
            .property_filter(criteria.property_filter())
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn filtered_property(&self) -> Option<&str> {
        self.property_filter.as_deref()
    }

    pub fn replacement(&self) -> &str {
        &self.replace
    }

    pub fn substitute(&self, value: &str) -> String {
        if self.search.is_empty() {
            return value.to_string();
        }
        if self.use_regex {
            return match &self.pattern {
                Some(pattern) => pattern
                    .replace_all(value, self.template.as_str())
                    .into_owned(),
                None => value.to_string(),
            };
        }
        value.replace(&self.search, &self.replace)
    }

    /// Substitutions for a single entity. The type filter does not apply.
    pub fn plan_entity(&self, document: &Document, id: EntityId) -> Vec<Replacement> {
        let mut out = Vec::new();
        self.collect(document, id, &mut out);
        out
    }

    /// Substitutions for every entity reachable from `root` (lists and nested
    /// entities, depth first). Entities of other variants are skipped but
    /// their subtrees are still visited.
    pub fn plan_all(&self, document: &Document, root: &ListRef) -> Vec<Replacement> {
        let mut out = Vec::new();
        if let Some(items) = document.list(root) {
            for id in items {
                self.walk(document, *id, &mut out);
            }
        }
        out
    }

    fn walk(&self, document: &Document, id: EntityId, out: &mut Vec<Replacement>) {
        let Some(entity) = document.get(id) else {
            return;
        };
        let type_ok = self
            .type_filter
            .as_deref()
            .is_none_or(|t| entity.variant() == t);
        if type_ok {
            self.collect(document, id, out);
        }
        for slot in entity.slots().values() {
            match slot {
                Slot::List(items) => {
                    for child in items {
                        self.walk(document, *child, out);
                    }
                }
                Slot::Nested(Some(child)) => self.walk(document, *child, out),
                _ => {}
            }
        }
    }

    fn collect(&self, document: &Document, id: EntityId, out: &mut Vec<Replacement>) {
        let Some(entity) = document.get(id) else {
            return;
        };
        let candidates: Vec<&str> = match &self.property_filter {
            Some(property) => vec![property.as_str()],
            None => statics::XD_COMMON_TEXT_PROPERTIES.to_vec(),
        };
        for property in candidates {
            let Some(AttrValue::Text(old)) = entity.attribute(property) else {
                continue;
            };
            let new = self.substitute(old);
            if new != *old {
                out.push(Replacement {
                    entity: id,
                    property: property.to_string(),
                    old: old.clone(),
                    new,
                });
            }
        }
    }
}

/// Rewrite a replacement written with `$n` group references and `\` escapes
/// into the braced form the `regex` crate expands. A reference takes further
/// digits only while the number stays within `groups`, so `$1_btn` is group 1
/// followed by `_btn` and `$10` with one group is group 1 followed by `0`.
fn regex_template(replace: &str, groups: usize) -> String {
    let mut out = String::with_capacity(replace.len() + 8);
    let mut chars = replace.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('$') => out.push_str("$$"),
                Some(escaped) => out.push(escaped),
                None => {}
            },
            '$' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    chars.next();
                    let mut group = d as usize - '0' as usize;
                    while let Some(next) = chars.peek().and_then(|n| n.to_digit(10)) {
                        let wider = group * 10 + next as usize;
                        if wider > groups {
                            break;
                        }
                        group = wider;
                        chars.next();
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('{') => {
                    out.push('$');
                    for n in chars.by_ref() {
                        out.push(n);
                        if n == '}' {
                            break;
                        }
                    }
                }
                _ => out.push_str("$$"),
            },
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{Replacer, SearchCriteria, regex_template};
    use crate::entity::{AttrValue, Document, ListRef};
    use crate::schema::Schema;
    use crate::statics;

    fn doc_with_button(name: &str, text: &str) -> (Document, crate::entity::EntityId) {
        let mut doc = Document::new(Schema::ui_descriptor().unwrap()).unwrap();
        let button = doc.create("Button").unwrap();
        doc.set_attribute(button, "name", AttrValue::Text(name.into()))
            .unwrap();
        doc.set_attribute(button, "buttonNameText", AttrValue::Text(text.into()))
            .unwrap();
        (doc, button)
    }

    #[test]
    fn literal_match_is_case_insensitive_substring() {
        let (doc, button) = doc_with_button("OkButton", "Confirm");
        assert!(SearchCriteria::text("okbut").matches(&doc, button));
        assert!(SearchCriteria::text("CONFIRM").matches(&doc, button));
        assert!(!SearchCriteria::text("cancel").matches(&doc, button));
    }

    #[test]
    fn type_filter_is_exact_and_type_only_matches() {
        let (doc, button) = doc_with_button("a", "b");
        let of_type =
            |text: &str, variant: &str| SearchCriteria::new(text, Some(variant), None, false);
        assert!(of_type("", "Button").matches(&doc, button));
        assert!(!of_type("", "UIEntity").matches(&doc, button));
        assert!(!of_type("a", "Window").matches(&doc, button));
    }

    #[test]
    fn property_filter_restricts_to_one_attribute() {
        let (doc, button) = doc_with_button("alpha", "beta");
        let by_label = |text: &str| SearchCriteria::new(text, None, Some("buttonNameText"), false);
        assert!(by_label("beta").matches(&doc, button));
        assert!(!by_label("alpha").matches(&doc, button));
        let by_width = SearchCriteria::new("0", None, Some("width"), false);
        assert!(by_width.matches(&doc, button));
    }

    #[test]
    fn regex_is_case_insensitive_find() {
        let (doc, button) = doc_with_button("Btn_Close_01", "x");
        let regex = |pattern: &str| SearchCriteria::new(pattern, None, None, true);
        assert!(regex("close_\\d+").matches(&doc, button));
        assert!(!regex("^close").matches(&doc, button));
    }

    #[test]
    fn invalid_pattern_matches_nothing() {
        let (doc, button) = doc_with_button("a(b", "x");
        let criteria = SearchCriteria::new("a(b", None, None, true);
        assert!(!criteria.is_valid_pattern());
        assert!(!criteria.matches(&doc, button));
        assert!(SearchCriteria::text("a(b").matches(&doc, button));
    }

    #[test]
    fn empty_criteria() {
        assert!(SearchCriteria::default().is_empty());
        let blank_type = SearchCriteria::new("", Some(""), Some("name"), true);
        assert!(blank_type.is_empty());
        let type_only = SearchCriteria::new("", Some("Button"), None, false);
        assert!(!type_only.is_empty());
    }

    #[test]
    fn literal_substitution_is_case_sensitive() {
        let replacer = Replacer::new("foo", "baz");
        assert_eq!(replacer.substitute("foo Foo foo"), "baz Foo baz");
    }

    #[test]
    fn regex_substitution_expands_groups() {
        let replacer = Replacer::new("btn_(\\w+)", "button_$1").regex(true);
        assert_eq!(
            replacer.substitute("btn_ok btn_cancel"),
            "button_ok button_cancel"
        );
        let suffixed = Replacer::new("(\\w+)Button", "$1_btn").regex(true);
        assert_eq!(suffixed.substitute("OkButton"), "Ok_btn");
        let escaped = Replacer::new("(\\d+)", "\\$$1").regex(true);
        assert_eq!(escaped.substitute("cost 5"), "cost $5");
        let broken = Replacer::new("(", "x").regex(true);
        assert_eq!(broken.substitute("(("), "((");
    }

    #[test]
    fn group_references_stop_at_the_group_count() {
        assert_eq!(regex_template("$1_btn", 1), "${1}_btn");
        assert_eq!(regex_template("$10", 1), "${1}0");
        assert_eq!(regex_template("$10", 10), "${10}");
        assert_eq!(regex_template("${name}x", 1), "${name}x");
        assert_eq!(regex_template("100$", 0), "100$$");
    }

    #[test]
    fn plan_all_recurses_past_filtered_variants() {
        let mut doc = Document::new(Schema::ui_descriptor().unwrap()).unwrap();
        let windows = ListRef::new(doc.root(), statics::XD_LIST_WINDOWS);
        let window = doc.create("Window").unwrap();
        let button = doc.create("Button").unwrap();
        doc.set_attribute(window, "name", AttrValue::Text("foo_win".into()))
            .unwrap();
        doc.set_attribute(button, "name", AttrValue::Text("foo_btn".into()))
            .unwrap();
        doc.list_mut(&windows).unwrap().push(window);
        doc.list_mut(&ListRef::new(window, "children"))
            .unwrap()
            .push(button);

        let plan = Replacer::new("foo", "bar")
            .type_filter(Some("Button"))
            .plan_all(&doc, &windows);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].entity, button);
        assert_eq!(plan[0].new, "bar_btn");
    }
}
