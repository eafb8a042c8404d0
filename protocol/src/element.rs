//! Drawable elements and partial element changes.
//!
//! DESIGN
//! ======
//! `Element` carries the style and position shared by every kind, plus a
//! flattened `Shape` whose `type` tag selects the geometry. `ElementPatch` is
//! the payload of an `update` operation: every field is optional, and the
//! optional element fields (`fill`, `strokeDashArray`) are tri-state so an
//! inverse patch can restore "unset".
//!
//! Merging a patch never fails. Geometry keys that the target's kind does not
//! have are ignored.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// =============================================================================
// IDS
// =============================================================================

/// Board-unique element identifier, assigned by the creating client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for a newly drawn element.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Id-keyed element set. Insertion order is draw order.
pub type ElementMap = IndexMap<ElementId, Element>;

/// Build an id-keyed map from a stored element list. Later duplicates win.
#[must_use]
pub fn elements_to_map(elements: impl IntoIterator<Item = Element>) -> ElementMap {
    elements.into_iter().map(|el| (el.id.clone(), el)).collect()
}

// =============================================================================
// ELEMENT
// =============================================================================

/// Geometry by kind. Serialized as the element's `type` field plus the
/// kind-specific keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    /// Flat `[x1, y1, x2, y2, ...]` point list relative to the element origin.
    Freehand { points: Vec<f64> },
    Rectangle { width: f64, height: f64 },
    Circle { radius: f64 },
    /// `[x1, y1, x2, y2]`.
    Line { points: Vec<f64> },
}

impl Shape {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Freehand { .. } => "freehand",
            Self::Rectangle { .. } => "rectangle",
            Self::Circle { .. } => "circle",
            Self::Line { .. } => "line",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub shape: Shape,
    pub stroke_color: String,
    pub stroke_width: f64,
    #[serde(
        default,
        rename = "strokeDashArray",
        alias = "strokeDashPattern",
        skip_serializing_if = "Option::is_none"
    )]
    pub stroke_dash_pattern: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

impl Element {
    /// Element with default stroke (`#000000`, width 2) and no fill.
    #[must_use]
    pub fn new(id: ElementId, x: f64, y: f64, shape: Shape) -> Self {
        Self {
            id,
            x,
            y,
            shape,
            stroke_color: "#000000".to_owned(),
            stroke_width: 2.0,
            stroke_dash_pattern: None,
            fill: None,
        }
    }

    #[must_use]
    pub fn rectangle(id: impl Into<ElementId>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(id.into(), x, y, Shape::Rectangle { width, height })
    }

    #[must_use]
    pub fn circle(id: impl Into<ElementId>, x: f64, y: f64, radius: f64) -> Self {
        Self::new(id.into(), x, y, Shape::Circle { radius })
    }

    #[must_use]
    pub fn line(id: impl Into<ElementId>, from: (f64, f64), to: (f64, f64)) -> Self {
        Self::new(id.into(), 0.0, 0.0, Shape::Line { points: vec![from.0, from.1, to.0, to.1] })
    }

    #[must_use]
    pub fn freehand(id: impl Into<ElementId>, x: f64, y: f64, points: Vec<f64>) -> Self {
        Self::new(id.into(), x, y, Shape::Freehand { points })
    }

    #[must_use]
    pub fn with_stroke(mut self, color: impl Into<String>, width: f64) -> Self {
        self.stroke_color = color.into();
        self.stroke_width = width;
        self
    }

    #[must_use]
    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    #[must_use]
    pub fn with_dash_pattern(mut self, pattern: Vec<f64>) -> Self {
        self.stroke_dash_pattern = Some(pattern);
        self
    }
}

// =============================================================================
// PATCH
// =============================================================================

/// Partial field changes carried by an `update` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(
        default,
        rename = "strokeDashArray",
        alias = "strokeDashPattern",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub stroke_dash_pattern: Option<Option<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub fill: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

/// Distinguish an explicit `null` (`Some(None)`) from an absent key (`None`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ElementPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    #[must_use]
    pub fn stroke_width(width: f64) -> Self {
        Self { stroke_width: Some(width), ..Self::default() }
    }

    #[must_use]
    pub fn stroke_color(color: impl Into<String>) -> Self {
        Self { stroke_color: Some(color.into()), ..Self::default() }
    }

    #[must_use]
    pub fn fill(fill: Option<String>) -> Self {
        Self { fill: Some(fill), ..Self::default() }
    }

    /// Shallow-merge this patch into `element`, key by key.
    pub fn merge_into(&self, element: &mut Element) {
        if let Some(x) = self.x {
            element.x = x;
        }
        if let Some(y) = self.y {
            element.y = y;
        }
        if let Some(color) = &self.stroke_color {
            element.stroke_color.clone_from(color);
        }
        if let Some(width) = self.stroke_width {
            element.stroke_width = width;
        }
        if let Some(pattern) = &self.stroke_dash_pattern {
            element.stroke_dash_pattern.clone_from(pattern);
        }
        if let Some(fill) = &self.fill {
            element.fill.clone_from(fill);
        }

        match &mut element.shape {
            Shape::Freehand { points } | Shape::Line { points } => {
                if let Some(next) = &self.points {
                    points.clone_from(next);
                }
            }
            Shape::Rectangle { width, height } => {
                if let Some(next) = self.width {
                    *width = next;
                }
                if let Some(next) = self.height {
                    *height = next;
                }
            }
            Shape::Circle { radius } => {
                if let Some(next) = self.radius {
                    *radius = next;
                }
            }
        }
    }

    /// Current values in `element` for the keys this patch touches.
    ///
    /// Keys the element's kind does not have are left out, so applying the
    /// result restores exactly what `merge_into` changed.
    #[must_use]
    pub fn capture_from(&self, element: &Element) -> Self {
        let mut prior = Self {
            x: self.x.map(|_| element.x),
            y: self.y.map(|_| element.y),
            stroke_color: self.stroke_color.as_ref().map(|_| element.stroke_color.clone()),
            stroke_width: self.stroke_width.map(|_| element.stroke_width),
            stroke_dash_pattern: self
                .stroke_dash_pattern
                .as_ref()
                .map(|_| element.stroke_dash_pattern.clone()),
            fill: self.fill.as_ref().map(|_| element.fill.clone()),
            ..Self::default()
        };

        match &element.shape {
            Shape::Freehand { points } | Shape::Line { points } => {
                prior.points = self.points.as_ref().map(|_| points.clone());
            }
            Shape::Rectangle { width, height } => {
                prior.width = self.width.map(|_| *width);
                prior.height = self.height.map(|_| *height);
            }
            Shape::Circle { radius } => {
                prior.radius = self.radius.map(|_| *radius);
            }
        }
        prior
    }
}

#[cfg(test)]
#[path = "element_test.rs"]
mod tests;
