// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles container names and image tags.

use serde::Deserialize;

use crate::types::ResourceName;

pub fn deserialize_container_name<'de, D>(deserializer: D) -> Result<ResourceName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ResourceName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_container_name_option<'de, D>(
    deserializer: D,
) -> Result<Option<ResourceName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    opt.map(|s| ResourceName::new(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn deserialize_image_tag<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    validate_image_tag(&s).map_err(serde::de::Error::custom)?;
    Ok(s)
}

pub fn deserialize_image_tag_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    if let Some(ref tag) = opt {
        validate_image_tag(tag).map_err(serde::de::Error::custom)?;
    }
    Ok(opt)
}

/// Docker tag grammar: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`.
pub fn validate_image_tag(tag: &str) -> Result<(), String> {
    let mut chars = tag.chars();
    let first = chars.next().ok_or("image tag cannot be empty")?;
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return Err(format!("image tag cannot start with '{first}'"));
    }
    if tag.len() > 128 {
        return Err("image tag exceeds maximum length of 128 characters".to_string());
    }
    if let Some(c) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))) {
        return Err(format!("invalid character in image tag: '{c}'"));
    }
    Ok(())
}
