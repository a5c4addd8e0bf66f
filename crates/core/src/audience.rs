// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audience predicates evaluated against device state
//!
//! Every clause is optional; an absent clause passes. The miss behavior
//! travels with the audience but is applied by the caller.

use crate::matcher::{JsonMatcher, ValueMatcher};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// What to do with a schedule whose audience check fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissBehavior {
    Cancel,
    Skip,
    #[default]
    Penalize,
}

/// Host platform, used to scope app version checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Android,
    Amazon,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Amazon => "amazon",
        }
    }
}

/// Boolean expression over device tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagSelector {
    And {
        and: Vec<TagSelector>,
    },
    Or {
        or: Vec<TagSelector>,
    },
    Not {
        not: Box<TagSelector>,
    },
    Tag {
        tag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
    },
}

impl TagSelector {
    pub fn tag(tag: impl Into<String>) -> Self {
        TagSelector::Tag {
            tag: tag.into(),
            group: None,
        }
    }

    pub fn apply(&self, tags: &BTreeSet<String>, groups: &BTreeMap<String, BTreeSet<String>>) -> bool {
        match self {
            TagSelector::And { and } => and.iter().all(|s| s.apply(tags, groups)),
            TagSelector::Or { or } => or.iter().any(|s| s.apply(tags, groups)),
            TagSelector::Not { not } => !not.apply(tags, groups),
            TagSelector::Tag { tag, group: None } => tags.contains(tag),
            TagSelector::Tag {
                tag,
                group: Some(group),
            } => groups.get(group).is_some_and(|g| g.contains(tag)),
        }
    }
}

/// Declarative audience
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Audience {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_opt_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_opt_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_analytics: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_devices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_selector: Option<TagSelector>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub language_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<ValueMatcher>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miss_behavior: Option<MissBehavior>,
}

impl Audience {
    /// Declared miss behavior, penalize when unspecified
    pub fn miss_behavior(&self) -> MissBehavior {
        self.miss_behavior.unwrap_or_default()
    }
}

/// Point-in-time view of the device the audience is checked against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSnapshot {
    pub platform: Platform,
    pub channel_id: Option<String>,
    pub notifications_opted_in: bool,
    pub location_opted_in: bool,
    pub analytics_enabled: bool,
    pub tags: BTreeSet<String>,
    pub tag_groups: BTreeMap<String, BTreeSet<String>>,
    /// BCP-47 style locale, e.g. `en-US`
    pub locale: String,
    pub app_version_code: i64,
    pub app_version_name: String,
    pub sdk_version: String,
    pub install_date_ms: i64,
    /// Pending tag mutations not yet uploaded
    pub tag_overrides: Vec<Value>,
    /// Pending attribute mutations not yet uploaded
    pub attribute_overrides: Vec<Value>,
}

impl DeviceSnapshot {
    /// Language and optional country of the device locale
    pub fn locale_parts(&self) -> (String, Option<String>) {
        match parse_language_tag(&self.locale) {
            Some((language, country)) => (language, country),
            None => (String::new(), None),
        }
    }
}

/// When the audience is being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudiencePhase {
    /// At scheduling time; the new-user clause compares install time to the cut-off
    Scheduling { new_user_cutoff_ms: i64 },
    /// At prepare time; the new-user clause is ignored
    Execution,
}

/// Evaluate all present clauses of an audience against the device
pub fn check_audience(audience: &Audience, device: &DeviceSnapshot, phase: AudiencePhase) -> bool {
    if let (Some(expected), AudiencePhase::Scheduling { new_user_cutoff_ms }) =
        (audience.new_user, phase)
    {
        let is_new = device.install_date_ms >= new_user_cutoff_ms;
        if is_new != expected {
            return false;
        }
    }

    if !audience.test_devices.is_empty() {
        let Some(channel_id) = &device.channel_id else {
            return false;
        };
        let digest = test_device_digest(channel_id);
        if !audience.test_devices.iter().any(|d| d == &digest) {
            return false;
        }
    }

    if audience
        .notification_opt_in
        .is_some_and(|required| required != device.notifications_opted_in)
    {
        return false;
    }

    if audience
        .location_opt_in
        .is_some_and(|required| required != device.location_opted_in)
    {
        return false;
    }

    if audience.requires_analytics == Some(true) && !device.analytics_enabled {
        return false;
    }

    if !languages_match(&audience.language_tags, &device.locale) {
        return false;
    }

    if let Some(selector) = &audience.tag_selector {
        if !selector.apply(&device.tags, &device.tag_groups) {
            return false;
        }
    }

    if let Some(version) = &audience.app_version {
        let matcher = JsonMatcher {
            scope: vec![device.platform.as_str().to_string()],
            key: Some("version".to_string()),
            value: version.clone(),
        };
        let mut doc = serde_json::Map::new();
        doc.insert(
            device.platform.as_str().to_string(),
            json!({ "version": device.app_version_code }),
        );
        let doc = Value::Object(doc);
        if !matcher.matches(&doc) {
            return false;
        }
    }

    true
}

/// Base64 of the first 16 bytes of SHA-256 over the channel id
pub fn test_device_digest(channel_id: &str) -> String {
    let hash = Sha256::digest(channel_id.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(&hash[..16])
}

fn languages_match(tags: &[String], locale: &str) -> bool {
    let wanted: Vec<_> = tags.iter().filter_map(|t| parse_language_tag(t)).collect();
    if wanted.is_empty() {
        return true;
    }
    let Some((language, country)) = parse_language_tag(locale) else {
        return false;
    };
    wanted.iter().any(|(want_language, want_country)| {
        want_language.eq_ignore_ascii_case(&language)
            && match want_country {
                None => true,
                Some(c) => country.as_deref().is_some_and(|d| d.eq_ignore_ascii_case(c)),
            }
    })
}

/// Split `en-US` / `en_US` into language and country, ignoring malformed tags
fn parse_language_tag(tag: &str) -> Option<(String, Option<String>)> {
    let normalized = tag.trim().replace('_', "-");
    let normalized = normalized.trim_matches('-');
    if normalized.is_empty() {
        return None;
    }
    let mut parts = normalized.split('-').filter(|p| !p.is_empty());
    let language = parts.next()?.to_string();
    let country = parts.next().map(str::to_string);
    Some((language, country))
}

#[cfg(test)]
#[path = "audience_tests.rs"]
mod tests;
