//! Preview generation requests and their cache identifiers

use crate::models::analysis_result::{OutfitItem, StyleItem};
use crate::models::backend_types::{HeadshotImageRequest, OutfitImageRequest};
use std::fmt;

/// Headshot preview category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadshotStyle {
    Hairstyle,
    Beard,
}

impl HeadshotStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadshotStyle::Hairstyle => "hairstyle",
            HeadshotStyle::Beard => "beard",
        }
    }
}

impl fmt::Display for HeadshotStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One preview to generate
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewRequest {
    Outfit {
        context_name: String,
        outfit_index: usize,
        outfit: OutfitItem,
    },
    Headshot {
        style: HeadshotStyle,
        index: usize,
        item: StyleItem,
    },
}

impl PreviewRequest {
    /// Stable cache identifier
    ///
    /// An outfit keeps the `outfit_id` the backend gave it; otherwise the id
    /// is derived from its context and position.
    pub fn identifier(&self) -> String {
        match self {
            PreviewRequest::Outfit {
                context_name,
                outfit_index,
                outfit,
            } => match outfit.outfit_id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => outfit_id(context_name, *outfit_index),
            },
            PreviewRequest::Headshot { style, index, .. } => format!("{}-{}", style, index),
        }
    }

    pub(crate) fn outfit_body(&self, phone: Option<String>) -> Option<OutfitImageRequest> {
        match self {
            PreviewRequest::Outfit {
                context_name,
                outfit_index,
                outfit,
            } => Some(OutfitImageRequest {
                visual_spec: outfit.visual_spec.clone(),
                context_name: context_name.clone(),
                outfit_index: *outfit_index,
                outfit_title: outfit.title.clone(),
                head_to_toe: outfit.head_to_toe.clone(),
                phone,
            }),
            PreviewRequest::Headshot { .. } => None,
        }
    }

    pub(crate) fn headshot_body(&self, phone: Option<String>) -> Option<HeadshotImageRequest> {
        match self {
            PreviewRequest::Headshot { style, item, .. } => Some(HeadshotImageRequest {
                style_type: style.as_str().to_string(),
                name: item.name.clone(),
                description: item.description.clone(),
                phone,
            }),
            PreviewRequest::Outfit { .. } => None,
        }
    }
}

/// Outfit identifier: lower-cased context slug plus the outfit index
///
/// Every character outside `[a-z0-9]` becomes `-`, so "Date Night" at index 2
/// is `date-night-2`.
pub fn outfit_id(context_name: &str, index: usize) -> String {
    let slug: String = context_name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{}", slug, index)
}
