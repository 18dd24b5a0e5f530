use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};

use crate::array::Array;

/// The type of a horizontal dimension along the x axis.
pub const DIMENSION_TYPE_HORIZONTAL_X: &str = "HORIZONTAL_X";
/// The type of a horizontal dimension along the y axis.
pub const DIMENSION_TYPE_HORIZONTAL_Y: &str = "HORIZONTAL_Y";
/// The type of a vertical dimension.
pub const DIMENSION_TYPE_VERTICAL: &str = "VERTICAL";
/// The type of a time dimension.
pub const DIMENSION_TYPE_TEMPORAL: &str = "TEMPORAL";

/// A named dimension shared by the arrays of a hierarchy.
///
/// A dimension may have an indexing variable, a one-dimensional array of the same name holding its coordinates.
/// The dimension only holds a weak reference to its indexing variable.
#[derive(Debug)]
pub struct Dimension {
    name: String,
    full_name: String,
    size: AtomicU64,
    dimension_type: Option<String>,
    direction: Option<String>,
    indexing_variable: Mutex<Weak<Array>>,
}

impl Dimension {
    /// Create a dimension.
    #[must_use]
    pub fn new(
        name: &str,
        full_name: &str,
        size: u64,
        dimension_type: Option<String>,
        direction: Option<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            full_name: full_name.to_string(),
            size: AtomicU64::new(size),
            dimension_type,
            direction,
            indexing_variable: Mutex::new(Weak::new()),
        }
    }

    /// The name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full name, e.g. `/group/x`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The number of elements.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Set the number of elements, when an array using the dimension is resized.
    pub(crate) fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::Release);
    }

    /// The type, e.g. [`DIMENSION_TYPE_HORIZONTAL_X`].
    #[must_use]
    pub fn dimension_type(&self) -> Option<&str> {
        self.dimension_type.as_deref()
    }

    /// The direction, e.g. `EAST`.
    #[must_use]
    pub fn direction(&self) -> Option<&str> {
        self.direction.as_deref()
    }

    /// The indexing variable, if it is set and still alive.
    #[must_use]
    pub fn indexing_variable(&self) -> Option<Arc<Array>> {
        self.indexing_variable.lock().upgrade()
    }

    /// Set the indexing variable.
    pub fn set_indexing_variable(&self, array: &Arc<Array>) {
        *self.indexing_variable.lock() = Arc::downgrade(array);
    }
}

/// The type and direction of a dimension from the CF attributes of its indexing variable.
///
/// `standard_name` sets a horizontal or temporal type, with the direction set from `units` for geographic coordinates.
/// An `axis` of `Z` sets a vertical type with the direction from `positive`.
#[must_use]
pub fn dimension_type_direction(
    attributes: &Map<String, JsonValue>,
    unit: Option<&str>,
) -> (Option<String>, Option<String>) {
    let mut dimension_type = None;
    let mut direction = None;
    match attributes.get("standard_name").and_then(JsonValue::as_str) {
        Some("projection_x_coordinate" | "longitude") => {
            dimension_type = Some(DIMENSION_TYPE_HORIZONTAL_X);
            if unit == Some("degrees_east") {
                direction = Some("EAST");
            }
        }
        Some("projection_y_coordinate" | "latitude") => {
            dimension_type = Some(DIMENSION_TYPE_HORIZONTAL_Y);
            if unit == Some("degrees_north") {
                direction = Some("NORTH");
            }
        }
        Some("time") => dimension_type = Some(DIMENSION_TYPE_TEMPORAL),
        _ => {}
    }
    if attributes.get("axis").and_then(JsonValue::as_str) == Some("Z") {
        dimension_type = Some(DIMENSION_TYPE_VERTICAL);
        match attributes.get("positive").and_then(JsonValue::as_str) {
            Some("up") => direction = Some("UP"),
            Some("down") => direction = Some("DOWN"),
            _ => {}
        }
    }
    (
        dimension_type.map(str::to_string),
        direction.map(str::to_string),
    )
}
