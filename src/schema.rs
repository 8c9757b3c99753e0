use crate::entity::{AttrValue, Entity, Slot};
use crate::error::{EditorError, EditorResult};
use crate::statics;
use indexmap::IndexMap;
use std::sync::Arc;

/// Scalar attribute kinds known to the property editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Text,
    Bool,
    Int,
    Float,
    /// Numeric id of another object in the game data.
    Reference,
    /// Opaque engine payload, shared (not copied) by clones.
    Blob,
}

impl AttrKind {
    pub fn default_value(self) -> AttrValue {
        match self {
            AttrKind::Text => AttrValue::Text(String::new()),
            AttrKind::Bool => AttrValue::Bool(false),
            AttrKind::Int => AttrValue::Int(0),
            AttrKind::Float => AttrValue::Float(0.0),
            AttrKind::Reference => AttrValue::Ref(0),
            AttrKind::Blob => AttrValue::Null,
        }
    }

    /// Whether `value` may be stored in a slot of this kind. `Null` is always accepted.
    pub fn accepts(self, value: &AttrValue) -> bool {
        matches!(
            (self, value),
            (_, AttrValue::Null)
                | (AttrKind::Text, AttrValue::Text(_))
                | (AttrKind::Bool, AttrValue::Bool(_))
                | (AttrKind::Int, AttrValue::Int(_))
                | (AttrKind::Float, AttrValue::Float(_))
                | (AttrKind::Reference, AttrValue::Ref(_))
                | (AttrKind::Blob, AttrValue::Blob(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    Attribute(AttrKind),
    /// Exclusively owned child entity of (at least) the given variant.
    Nested { variant: String },
    /// Ordered owned entities. `element` is the most general variant a member
    /// may have; `None` means the schema forgot to declare it.
    List { element: Option<String> },
    /// Ordered scalars (not shown in the tree).
    Values(AttrKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDef {
    pub name: String,
    pub kind: SlotKind,
    pub description: Option<String>,
    pub hidden: bool,
}

impl SlotDef {
    /// Scalar, visible slots are what the property sheet edits.
    pub fn is_property(&self) -> bool {
        matches!(self.kind, SlotKind::Attribute(_)) && !self.hidden
    }
}

/// Resolved description of one variant: every slot it carries (inherited
/// first), its ancestry and the cached property-sheet descriptors.
#[derive(Debug, Clone)]
pub struct VariantLayout {
    pub name: String,
    pub parent: Option<String>,
    pub constructible: bool,
    slots: Vec<SlotDef>,
    /// Self first, then parent, grandparent, ...
    lineage: Vec<String>,
    properties: Vec<usize>,
}

impl VariantLayout {
    pub fn slots(&self) -> &[SlotDef] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&SlotDef> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &SlotDef> {
        self.properties.iter().map(|&i| &self.slots[i])
    }

    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// True when the variant carries a text `name` attribute.
    pub fn is_named(&self) -> bool {
        self.slot(statics::XD_PROP_NAME)
            .is_some_and(|s| s.kind == SlotKind::Attribute(AttrKind::Text))
    }
}

/// Explicit per-variant schema table. Built once, shared via `Arc`.
#[derive(Debug)]
pub struct Schema {
    root: String,
    variants: IndexMap<String, VariantLayout>,
}

impl Schema {
    pub fn builder(root: &str) -> SchemaBuilder {
        SchemaBuilder {
            root: root.to_string(),
            defs: IndexMap::new(),
        }
    }

    pub fn root_variant(&self) -> &str {
        &self.root
    }

    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    pub fn variant(&self, name: &str) -> EditorResult<&VariantLayout> {
        self.variants
            .get(name)
            .ok_or_else(|| EditorError::Schema(format!("unknown variant {name}")))
    }

    pub fn slot(&self, variant: &str, slot: &str) -> Option<&SlotDef> {
        self.variants.get(variant)?.slot(slot)
    }

    /// Whether any variant carries a scalar attribute called `name`.
    pub fn declares_attribute(&self, name: &str) -> bool {
        self.variants.values().any(|layout| {
            layout
                .slot(name)
                .is_some_and(|s| matches!(s.kind, SlotKind::Attribute(_)))
        })
    }

    /// Element-type constraint of a list slot. Missing metadata is an error,
    /// never silently tolerated.
    pub fn list_element(&self, variant: &str, field: &str) -> EditorResult<&str> {
        let slot = self
            .slot(variant, field)
            .ok_or_else(|| EditorError::Schema(format!("{variant}.{field} is not declared")))?;
        match &slot.kind {
            SlotKind::List {
                element: Some(element),
            } => Ok(element),
            SlotKind::List { element: None } => Err(EditorError::Schema(format!(
                "{variant}.{field}: element type not defined"
            ))),
            _ => Err(EditorError::Schema(format!(
                "{variant}.{field} is not an entity list"
            ))),
        }
    }

    /// `variant` satisfies `constraint` if it is the constraint or derives from it.
    pub fn is_assignable(&self, constraint: &str, variant: &str) -> bool {
        self.variants
            .get(variant)
            .is_some_and(|layout| layout.lineage.iter().any(|v| v == constraint))
    }

    /// Constructible variants that may be placed into a list of `constraint`.
    pub fn creatable_variants(&self, constraint: &str) -> Vec<&str> {
        self.variants
            .values()
            .filter(|v| v.constructible && self.is_assignable(constraint, &v.name))
            .map(|v| v.name.as_str())
            .collect()
    }

    /// The constructor-equivalent: a fresh entity with every slot at its default.
    pub fn instantiate(&self, variant: &str) -> EditorResult<Entity> {
        let layout = self.variants.get(variant).ok_or_else(|| EditorError::CloneFailure {
            variant: variant.to_string(),
            reason: "variant is not part of the schema".to_string(),
        })?;
        if !layout.constructible {
            return Err(EditorError::CloneFailure {
                variant: variant.to_string(),
                reason: "variant has no constructor".to_string(),
            });
        }

        let mut slots = IndexMap::with_capacity(layout.slots.len());
        for slot in &layout.slots {
            let value = match &slot.kind {
                SlotKind::Attribute(kind) => Slot::Attr(kind.default_value()),
                SlotKind::Nested { .. } => Slot::Nested(None),
                SlotKind::List { .. } => Slot::List(Vec::new()),
                SlotKind::Values(_) => Slot::Values(Vec::new()),
            };
            slots.insert(slot.name.clone(), value);
        }
        Ok(Entity::from_slots(variant.to_string(), slots))
    }

    /// Built-in schema for the game UI descriptor documents.
    pub fn ui_descriptor() -> EditorResult<Arc<Schema>> {
        let schema = Schema::builder(statics::XD_VARIANT_ROOT)
            .variant(statics::XD_VARIANT_ROOT, None, |v| {
                v.list(statics::XD_LIST_WINDOWS, "Window")
                    .list(statics::XD_LIST_FONTS, "FontInfo")
            })
            .abstract_variant("UIEntity", None, |v| {
                v.text("name")
                    .describe("Element name, unique among its siblings")
                    .text("parentName")
                    .int("x")
                    .int("y")
                    .int("width")
                    .int("height")
                    .boolean("visible")
                    .blob("userData")
                    .hidden()
            })
            .variant("Window", Some("UIEntity"), |v| {
                v.text("titleText")
                    .text("backTex")
                    .text("styleName")
                    .boolean("alwaysOnTop")
                    .nested("tooltip", "Tooltip")
                    .list("children", "UIEntity")
                    .values("scripts", AttrKind::Text)
            })
            .variant("Button", Some("UIEntity"), |v| {
                v.text("buttonNameText")
                    .text("normalTex")
                    .text("pushedTex")
                    .text("fontName")
                    .reference("linkId")
                    .describe("Id of the window opened on click")
            })
            .variant("TextBox", Some("UIEntity"), |v| {
                v.text("text").text("fontName").text("styleName")
            })
            .variant("EditBox", Some("UIEntity"), |v| v.text("text").int("maxLength"))
            .variant("CheckBox", Some("UIEntity"), |v| {
                v.text("text").boolean("checked")
            })
            .variant("Texture", Some("UIEntity"), |v| v.text("file").float("alpha"))
            .variant("Tab", Some("UIEntity"), |v| v.list("pages", "Window"))
            .variant("Tooltip", None, |v| v.text("text").text("styleName"))
            .variant("FontInfo", None, |v| v.text("name").text("file").int("size"))
            .build()?;
        Ok(Arc::new(schema))
    }
}

#[derive(Debug, Clone)]
struct VariantDef {
    parent: Option<String>,
    constructible: bool,
    slots: Vec<SlotDef>,
}

pub struct SchemaBuilder {
    root: String,
    defs: IndexMap<String, VariantDef>,
}

impl SchemaBuilder {
    pub fn variant(
        self,
        name: &str,
        parent: Option<&str>,
        slots: impl FnOnce(SlotList) -> SlotList,
    ) -> Self {
        self.define(name, parent, true, slots)
    }

    pub fn abstract_variant(
        self,
        name: &str,
        parent: Option<&str>,
        slots: impl FnOnce(SlotList) -> SlotList,
    ) -> Self {
        self.define(name, parent, false, slots)
    }

    fn define(
        mut self,
        name: &str,
        parent: Option<&str>,
        constructible: bool,
        slots: impl FnOnce(SlotList) -> SlotList,
    ) -> Self {
        let list = slots(SlotList::default());
        self.defs.insert(
            name.to_string(),
            VariantDef {
                parent: parent.map(str::to_string),
                constructible,
                slots: list.slots,
            },
        );
        self
    }

    /// Resolve inheritance and validate references between variants.
    pub fn build(self) -> EditorResult<Schema> {
        if !self.defs.contains_key(&self.root) {
            return Err(EditorError::Schema(format!(
                "root variant {} is not defined",
                self.root
            )));
        }

        let mut variants = IndexMap::with_capacity(self.defs.len());
        for name in self.defs.keys() {
            let mut lineage = vec![name.clone()];
            let mut cursor = self.defs[name].parent.clone();
            while let Some(parent) = cursor {
                if lineage.contains(&parent) {
                    return Err(EditorError::Schema(format!(
                        "variant {name} inherits from itself"
                    )));
                }
                let def = self.defs.get(&parent).ok_or_else(|| {
                    EditorError::Schema(format!("{name}: unknown parent variant {parent}"))
                })?;
                cursor = def.parent.clone();
                lineage.push(parent);
            }

            // Most-base-first slot order.
            let mut slots: Vec<SlotDef> = Vec::new();
            for ancestor in lineage.iter().rev() {
                for slot in &self.defs[ancestor].slots {
                    if slots.iter().any(|s| s.name == slot.name) {
                        return Err(EditorError::Schema(format!(
                            "{name}: slot {} declared twice",
                            slot.name
                        )));
                    }
                    slots.push(slot.clone());
                }
            }

            for slot in &slots {
                let referenced = match &slot.kind {
                    SlotKind::Nested { variant } => Some(variant),
                    SlotKind::List {
                        element: Some(element),
                    } => Some(element),
                    _ => None,
                };
                if let Some(target) = referenced {
                    if !self.defs.contains_key(target) {
                        return Err(EditorError::Schema(format!(
                            "{name}.{}: unknown variant {target}",
                            slot.name
                        )));
                    }
                }
            }

            let properties = slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_property())
                .map(|(i, _)| i)
                .collect();

            variants.insert(
                name.clone(),
                VariantLayout {
                    name: name.clone(),
                    parent: self.defs[name].parent.clone(),
                    constructible: self.defs[name].constructible,
                    slots,
                    lineage,
                    properties,
                },
            );
        }

        Ok(Schema {
            root: self.root,
            variants,
        })
    }
}

/// Slot declarations of one variant, in declaration order.
#[derive(Debug, Default)]
pub struct SlotList {
    slots: Vec<SlotDef>,
}

impl SlotList {
    fn push(mut self, name: &str, kind: SlotKind) -> Self {
        self.slots.push(SlotDef {
            name: name.to_string(),
            kind,
            description: None,
            hidden: false,
        });
        self
    }

    pub fn attribute(self, name: &str, kind: AttrKind) -> Self {
        self.push(name, SlotKind::Attribute(kind))
    }

    pub fn text(self, name: &str) -> Self {
        self.attribute(name, AttrKind::Text)
    }

    pub fn boolean(self, name: &str) -> Self {
        self.attribute(name, AttrKind::Bool)
    }

    pub fn int(self, name: &str) -> Self {
        self.attribute(name, AttrKind::Int)
    }

    pub fn float(self, name: &str) -> Self {
        self.attribute(name, AttrKind::Float)
    }

    pub fn reference(self, name: &str) -> Self {
        self.attribute(name, AttrKind::Reference)
    }

    pub fn blob(self, name: &str) -> Self {
        self.attribute(name, AttrKind::Blob)
    }

    pub fn nested(self, name: &str, variant: &str) -> Self {
        self.push(
            name,
            SlotKind::Nested {
                variant: variant.to_string(),
            },
        )
    }

    pub fn list(self, name: &str, element: &str) -> Self {
        self.push(
            name,
            SlotKind::List {
                element: Some(element.to_string()),
            },
        )
    }

    /// A list whose element type was never declared. Building a tree over it fails.
    pub fn untyped_list(self, name: &str) -> Self {
        self.push(name, SlotKind::List { element: None })
    }

    pub fn values(self, name: &str, kind: AttrKind) -> Self {
        self.push(name, SlotKind::Values(kind))
    }

    /// Attach a description hint to the last declared slot.
    pub fn describe(mut self, description: &str) -> Self {
        if let Some(last) = self.slots.last_mut() {
            last.description = Some(description.to_string());
        }
        self
    }

    /// Hide the last declared slot from the property sheet.
    pub fn hidden(mut self) -> Self {
        if let Some(last) = self.slots.last_mut() {
            last.hidden = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{AttrKind, Schema, SlotKind};
    use crate::error::EditorError;

    #[test]
    fn layout_lists_inherited_slots_first() {
        let schema = Schema::ui_descriptor().unwrap();
        let button = schema.variant("Button").unwrap();
        let names: Vec<&str> = button.slots().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(&names[..3], &["name", "parentName", "x"]);
        assert_eq!(names.last(), Some(&"linkId"));
        assert_eq!(button.lineage(), ["Button", "UIEntity"]);
    }

    #[test]
    fn assignability_follows_lineage() {
        let schema = Schema::ui_descriptor().unwrap();
        assert!(schema.is_assignable("UIEntity", "Button"));
        assert!(schema.is_assignable("Window", "Window"));
        assert!(!schema.is_assignable("Button", "Window"));
        assert!(!schema.is_assignable("UIEntity", "Tooltip"));
    }

    #[test]
    fn properties_skip_hidden_and_collections() {
        let schema = Schema::ui_descriptor().unwrap();
        let window = schema.variant("Window").unwrap();
        let props: Vec<&str> = window.properties().map(|s| s.name.as_str()).collect();
        assert!(props.contains(&"titleText"));
        assert!(!props.contains(&"userData"));
        assert!(!props.contains(&"children"));
        assert!(!props.contains(&"scripts"));
    }

    #[test]
    fn abstract_variant_cannot_be_instantiated() {
        let schema = Schema::ui_descriptor().unwrap();
        let err = schema.instantiate("UIEntity").unwrap_err();
        assert!(matches!(err, EditorError::CloneFailure { .. }));
        assert!(schema.instantiate("Window").is_ok());
    }

    #[test]
    fn creatable_variants_are_constructible_subtypes() {
        let schema = Schema::ui_descriptor().unwrap();
        let creatable = schema.creatable_variants("UIEntity");
        assert!(creatable.contains(&"Button"));
        assert!(creatable.contains(&"Window"));
        assert!(!creatable.contains(&"UIEntity"));
        assert!(!creatable.contains(&"Tooltip"));
    }

    #[test]
    fn missing_list_element_type_is_a_schema_error() {
        let schema = Schema::builder("Root")
            .variant("Root", None, |v| v.untyped_list("legacy").list("items", "Root"))
            .build()
            .unwrap();
        assert!(matches!(
            schema.list_element("Root", "legacy"),
            Err(EditorError::Schema(_))
        ));
        assert_eq!(schema.list_element("Root", "items").unwrap(), "Root");
    }

    #[test]
    fn build_rejects_unknown_references() {
        let err = Schema::builder("Root")
            .variant("Root", None, |v| v.nested("child", "Missing"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown variant Missing"));

        let err = Schema::builder("Root")
            .variant("Root", Some("Nope"), |v| v)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown parent"));
    }

    #[test]
    fn kinds_accept_matching_values_and_null() {
        use crate::entity::AttrValue;
        assert!(AttrKind::Text.accepts(&AttrValue::Text("a".into())));
        assert!(AttrKind::Int.accepts(&AttrValue::Null));
        assert!(!AttrKind::Int.accepts(&AttrValue::Text("1".into())));
        assert_eq!(
            Schema::ui_descriptor().unwrap().slot("Window", "tooltip").map(|s| &s.kind),
            Some(&SlotKind::Nested {
                variant: "Tooltip".to_string()
            })
        );
    }
}
