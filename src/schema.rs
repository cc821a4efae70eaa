//! Attribute schemas for resources and data sources.
//!
//! A [`Schema`] declares every attribute a resource block may carry together
//! with its flags (required, optional, computed, force-new, sensitive), its
//! default, list limits, conflicts and value validators. Configuration is
//! validated against the schema before any network call is made.

use std::collections::BTreeSet;
use std::net::IpAddr;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Value type of an attribute.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 string.
    String,
    /// Non-negative integer.
    Int,
    /// Boolean.
    Bool,
    /// Map of string values.
    Map,
    /// Ordered list of strings.
    List,
    /// Unordered set of strings.
    Set,
    /// Unordered set of nested objects.
    Block(Vec<Attribute>),
}

/// Predicate applied to a scalar value, or to every element of a list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
    /// The string must match `pattern`.
    Matches {
        /// Regular expression.
        pattern: &'static str,
        /// Message reported on mismatch.
        message: &'static str,
    },
    /// The string must be an IPv4 or IPv6 address.
    IpAddress,
    /// The integer must lie in `min..=max`.
    IntBetween {
        /// Inclusive lower bound.
        min: u64,
        /// Inclusive upper bound.
        max: u64,
    },
    /// The string must be one of `values`.
    OneOf {
        /// Accepted values.
        values: &'static [&'static str],
    },
}

impl Validator {
    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::Matches { pattern, message } => {
                let regex = Regex::new(pattern).map_err(|err| err.to_string())?;
                match value.as_str() {
                    Some(text) if regex.is_match(text) => Ok(()),
                    _ => Err((*message).to_owned()),
                }
            }
            Self::IpAddress => match value.as_str().map(str::parse::<IpAddr>) {
                Some(Ok(_)) => Ok(()),
                _ => Err(format!("{value} is not a valid IP address")),
            },
            Self::IntBetween { min, max } => match value.as_u64() {
                Some(number) if (*min..=*max).contains(&number) => Ok(()),
                _ => Err(format!("expected an integer between {min} and {max}, got {value}")),
            },
            Self::OneOf { values } => match value.as_str() {
                Some(text) if values.contains(&text) => Ok(()),
                _ => Err(format!("expected one of {}, got {value}", values.join(", "))),
            },
        }
    }
}

/// Declaration of a single attribute.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Attribute {
    /// Attribute name as it appears in configuration and state.
    pub name: &'static str,
    /// Value type.
    #[serde(rename = "type")]
    pub kind: AttributeType,
    /// Human readable description.
    pub description: &'static str,
    /// Must be set in configuration.
    pub required: bool,
    /// May be set in configuration.
    pub optional: bool,
    /// Filled from the array when not configured.
    pub computed: bool,
    /// Changing the value requires replacing the object.
    pub force_new: bool,
    /// Value is masked in plan output.
    pub sensitive: bool,
    /// Value used when the attribute is not configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Maximum number of list elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    /// Attributes that may not be set together with this one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<&'static str>,
    /// Value validators.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
}

impl Attribute {
    const fn new(name: &'static str, kind: AttributeType) -> Self {
        Self {
            name,
            kind,
            description: "",
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            max_items: None,
            conflicts_with: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Declares a required attribute.
    #[must_use]
    pub const fn required(name: &'static str, kind: AttributeType) -> Self {
        let mut attribute = Self::new(name, kind);
        attribute.required = true;
        attribute
    }

    /// Declares an optional attribute.
    #[must_use]
    pub const fn optional(name: &'static str, kind: AttributeType) -> Self {
        let mut attribute = Self::new(name, kind);
        attribute.optional = true;
        attribute
    }

    /// Declares an attribute only the array sets.
    #[must_use]
    pub const fn computed(name: &'static str, kind: AttributeType) -> Self {
        let mut attribute = Self::new(name, kind);
        attribute.computed = true;
        attribute
    }

    /// Sets the description.
    #[must_use]
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Lets the array fill the value when it is not configured.
    #[must_use]
    pub const fn with_computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Marks the attribute as requiring replacement when changed.
    #[must_use]
    pub const fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Marks the attribute as sensitive.
    #[must_use]
    pub const fn with_sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Limits the number of list elements.
    #[must_use]
    pub const fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Declares attributes that may not be set together with this one.
    #[must_use]
    pub fn with_conflicts(mut self, names: &[&'static str]) -> Self {
        self.conflicts_with = names.to_vec();
        self
    }

    /// Adds a value validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    const fn is_computed_only(&self) -> bool {
        self.computed && !self.required && !self.optional
    }

    fn check_type(&self, value: &Value) -> bool {
        match &self.kind {
            AttributeType::String => value.is_string(),
            AttributeType::Int => value.is_u64(),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::Map => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
            AttributeType::List | AttributeType::Set => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            AttributeType::Block(_) => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object)),
        }
    }

    fn type_label(&self) -> &'static str {
        match self.kind {
            AttributeType::String => "a string",
            AttributeType::Int => "a non-negative integer",
            AttributeType::Bool => "a boolean",
            AttributeType::Map => "a map of strings",
            AttributeType::List | AttributeType::Set => "a list of strings",
            AttributeType::Block(_) => "a list of objects",
        }
    }
}

/// One schema violation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationError {
    /// Path of the offending attribute, e.g. `volume[1].lun`.
    pub attribute: String,
    /// What is wrong with it.
    pub message: String,
}

/// Every violation found in one configuration block.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid configuration: {}", render(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

fn render(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.attribute, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    /// Returns true when any violation concerns `attribute`.
    #[must_use]
    pub fn mentions(&self, attribute: &str) -> bool {
        self.0.iter().any(|error| error.attribute == attribute)
    }
}

/// Attribute declarations of one resource or data source.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Schema {
    /// Declared attributes.
    pub attributes: Vec<Attribute>,
}

fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

impl Schema {
    /// Builds a schema from its attributes.
    #[must_use]
    pub const fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    /// Looks an attribute up by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    /// Validates a configuration block.
    ///
    /// # Errors
    ///
    /// Returns every violation found: unknown, missing or computed-only
    /// attributes, wrong types, validator failures, oversized lists and
    /// conflicting attributes.
    pub fn validate(&self, config: &Value) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        match config.as_object() {
            Some(object) => check_object(&self.attributes, object, "", &mut errors),
            None => errors.push(ValidationError {
                attribute: String::from("<root>"),
                message: String::from("expected an object"),
            }),
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Builds the planned state for a configuration block.
    ///
    /// Configured values win. Unconfigured computed attributes keep their
    /// prior value; everything else falls back to its default or `null`.
    /// Nested block elements receive their own defaults.
    #[must_use]
    pub fn planned_state(&self, prior: Option<&Value>, config: &Value) -> Value {
        let mut planned = Map::new();
        for attribute in &self.attributes {
            let configured = config.get(attribute.name).filter(|value| !value.is_null());
            let value = match configured {
                Some(value) => with_block_defaults(attribute, value),
                None if attribute.computed => prior
                    .and_then(|state| state.get(attribute.name))
                    .cloned()
                    .unwrap_or(Value::Null),
                None => attribute.default.clone().unwrap_or(Value::Null),
            };
            planned.insert(attribute.name.to_owned(), value);
        }
        Value::Object(planned)
    }

    /// Names of configurable attributes whose planned value differs from the
    /// prior state. Sets and blocks compare without regard to order.
    #[must_use]
    pub fn changed_attributes(&self, prior: &Value, planned: &Value) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|attribute| !attribute.is_computed_only())
            .filter(|attribute| {
                let before = normalise(attribute, prior.get(attribute.name));
                let after = normalise(attribute, planned.get(attribute.name));
                before != after
            })
            .map(|attribute| attribute.name)
            .collect()
    }

    /// Subset of `changed` whose attributes force replacement.
    #[must_use]
    pub fn force_new(&self, changed: &[&'static str]) -> Vec<&'static str> {
        changed
            .iter()
            .copied()
            .filter(|name| self.attribute(name).is_some_and(|attribute| attribute.force_new))
            .collect()
    }
}

fn check_object(
    attributes: &[Attribute],
    object: &Map<String, Value>,
    prefix: &str,
    errors: &mut Vec<ValidationError>,
) {
    let mut push = |name: &str, message: String| {
        errors.push(ValidationError {
            attribute: format!("{prefix}{name}"),
            message,
        });
    };

    for key in object.keys() {
        if !attributes.iter().any(|attribute| attribute.name == key) {
            push(key.as_str(), String::from("unknown attribute"));
        }
    }

    let mut nested = Vec::new();
    for attribute in attributes {
        let value = object.get(attribute.name).filter(|value| !value.is_null());
        let Some(value) = value else {
            if attribute.required {
                push(attribute.name, String::from("required attribute is missing"));
            }
            continue;
        };
        if attribute.is_computed_only() {
            push(attribute.name, String::from("attribute is computed and cannot be set"));
            continue;
        }
        if !attribute.check_type(value) {
            push(attribute.name, format!("expected {}", attribute.type_label()));
            continue;
        }
        if let (Some(limit), Some(items)) = (attribute.max_items, value.as_array())
            && items.len() > limit
        {
            push(
                attribute.name,
                format!("at most {limit} items allowed, got {}", items.len()),
            );
        }
        let elements: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for element in &elements {
            for validator in &attribute.validators {
                if let Err(message) = validator.check(element) {
                    push(attribute.name, message);
                }
            }
        }
        for other in &attribute.conflicts_with {
            if is_set(Some(value)) && is_set(object.get(*other)) && attribute.name < *other {
                push(attribute.name, format!("conflicts with `{other}`"));
            }
        }
        if let AttributeType::Block(children) = &attribute.kind {
            nested.push((attribute.name, children, elements));
        }
    }

    for (name, children, elements) in nested {
        for (index, element) in elements.into_iter().enumerate() {
            if let Some(child) = element.as_object() {
                check_object(children, child, &format!("{prefix}{name}[{index}]."), errors);
            }
        }
    }
}

fn with_block_defaults(attribute: &Attribute, value: &Value) -> Value {
    let (AttributeType::Block(children), Value::Array(items)) = (&attribute.kind, value) else {
        return value.clone();
    };
    let filled = items
        .iter()
        .map(|item| {
            let mut element = item.as_object().cloned().unwrap_or_default();
            for child in children {
                if element.get(child.name).is_none_or(Value::is_null)
                    && let Some(default) = &child.default
                {
                    element.insert(child.name.to_owned(), default.clone());
                }
            }
            Value::Object(element)
        })
        .collect();
    Value::Array(filled)
}

/// Canonical form used for change detection: `null` and empty collections
/// are equivalent, and unordered collections are sorted.
fn normalise(attribute: &Attribute, value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::Null,
        Some(Value::Array(items)) if items.is_empty() => Value::Null,
        Some(Value::Array(items))
            if matches!(attribute.kind, AttributeType::Set | AttributeType::Block(_)) =>
        {
            let sorted: BTreeSet<String> = items.iter().map(Value::to_string).collect();
            Value::Array(sorted.into_iter().map(Value::String).collect())
        }
        Some(other) => other.clone(),
    }
}
