use serde::Deserialize;
use serde_json::Value;

use crate::geofile::feature::Feature;

/// One control in a table row's action column.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RowAction {
    SimpleButton(ButtonAction),
    Dropdown(DropdownAction),
}

impl RowAction {
    pub fn name(&self) -> &str {
        match self {
            RowAction::SimpleButton(button) => &button.name,
            RowAction::Dropdown(dropdown) => &dropdown.name,
        }
    }
}

/// A button calling `handler` with the row's event id.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ButtonAction {
    pub name: String,
    pub css_class: String,
    pub handler: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DropdownAction {
    pub name: String,
    pub css_class: String,
    pub actions: Vec<MenuItem>,
}

/// Entry of a dropdown menu. `href` and `download` are templates with `{attribute}` placeholders.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub text: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub download: Option<String>,
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub visible_when: Visibility,
}

/// Decides per record whether a menu item is shown.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Always,
    /// Shown when the attribute is present and neither null nor an empty string.
    HasAttribute(String),
    AttributeEquals { attribute: String, value: Value },
}

impl Visibility {
    pub fn is_visible(&self, feature: &Feature) -> bool {
        match self {
            Visibility::Always => true,
            Visibility::HasAttribute(attribute) => match feature.attribute(attribute) {
                None | Some(Value::Null) => false,
                Some(Value::String(text)) => !text.is_empty(),
                Some(_) => true,
            },
            Visibility::AttributeEquals { attribute, value } => {
                feature.attribute(attribute) == Some(value)
            }
        }
    }
}
