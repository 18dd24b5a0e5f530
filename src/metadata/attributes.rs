use serde_json::{Map, Value as JsonValue};

const ARRAY_DIMENSIONS: &str = "_ARRAY_DIMENSIONS";
const UNITS: &str = "units";
const ADD_OFFSET: &str = "add_offset";
const SCALE_FACTOR: &str = "scale_factor";
const CRS: &str = "_CRS";

/// An opaque spatial reference, carried in the `_CRS` attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum SpatialReference {
    /// A URL, e.g. `http://www.opengis.net/def/crs/EPSG/0/4326`.
    Url(String),
    /// A WKT string.
    Wkt(String),
    /// A PROJJSON object.
    ProjJson(JsonValue),
}

impl SpatialReference {
    fn from_json(crs: &JsonValue) -> Option<Self> {
        let crs = crs.as_object()?;
        if let Some(url) = crs.get("url").and_then(JsonValue::as_str) {
            Some(Self::Url(url.to_string()))
        } else if let Some(wkt) = crs.get("wkt").and_then(JsonValue::as_str) {
            Some(Self::Wkt(wkt.to_string()))
        } else {
            crs.get("projjson")
                .filter(|projjson| projjson.is_object())
                .map(|projjson| Self::ProjJson(projjson.clone()))
        }
    }

    fn to_json(&self) -> JsonValue {
        let mut crs = Map::new();
        match self {
            Self::Url(url) => crs.insert("url".to_string(), url.clone().into()),
            Self::Wkt(wkt) => crs.insert("wkt".to_string(), wkt.clone().into()),
            Self::ProjJson(projjson) => crs.insert("projjson".to_string(), projjson.clone()),
        };
        JsonValue::Object(crs)
    }
}

/// The attributes of an array, with the attributes that have a dedicated meaning lifted out of the user attributes.
///
/// The lifted attributes are
///  - `_ARRAY_DIMENSIONS`: the dimension names,
///  - `units`: the unit,
///  - `add_offset` and `scale_factor`: the offset and scale of the values, and
///  - `_CRS`: the [spatial reference](SpatialReference).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrayAttributes {
    /// The dimension names.
    pub dimension_names: Option<Vec<String>>,
    /// The full names of the dimensions from the NCZarr `_NCZARR_ARRAY.dimrefs` extension, e.g. `/group/x`.
    ///
    /// Only used when there are no dimension names, and never written.
    pub dimension_refs: Option<Vec<String>>,
    /// The unit.
    pub unit: Option<String>,
    /// The offset.
    pub offset: Option<f64>,
    /// The scale.
    pub scale: Option<f64>,
    /// The spatial reference.
    pub spatial_ref: Option<SpatialReference>,
    /// The remaining user attributes.
    pub user: Map<String, JsonValue>,
}

impl ArrayAttributes {
    /// Split `attributes` into the lifted attributes and the user attributes.
    ///
    /// An attribute with an unexpected JSON type is left in the user attributes.
    #[must_use]
    pub fn from_json(mut attributes: Map<String, JsonValue>) -> Self {
        let dimension_names = attributes
            .get(ARRAY_DIMENSIONS)
            .and_then(JsonValue::as_array)
            .and_then(|names| {
                names
                    .iter()
                    .map(|name| name.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            });
        if dimension_names.is_some() {
            attributes.remove(ARRAY_DIMENSIONS);
        }
        let unit = attributes
            .get(UNITS)
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        if unit.is_some() {
            attributes.remove(UNITS);
        }
        let offset = attributes.get(ADD_OFFSET).and_then(JsonValue::as_f64);
        if offset.is_some() {
            attributes.remove(ADD_OFFSET);
        }
        let scale = attributes.get(SCALE_FACTOR).and_then(JsonValue::as_f64);
        if scale.is_some() {
            attributes.remove(SCALE_FACTOR);
        }
        let spatial_ref = attributes.get(CRS).and_then(SpatialReference::from_json);
        if spatial_ref.is_some() {
            attributes.remove(CRS);
        }
        Self {
            dimension_names,
            dimension_refs: None,
            unit,
            offset,
            scale,
            spatial_ref,
            user: attributes,
        }
    }

    /// Merge the lifted attributes back into the user attributes.
    #[must_use]
    pub fn to_json(&self) -> Map<String, JsonValue> {
        let mut attributes = Map::new();
        if let Some(dimension_names) = &self.dimension_names {
            attributes.insert(ARRAY_DIMENSIONS.to_string(), dimension_names.clone().into());
        }
        attributes.extend(self.user.clone());
        if let Some(unit) = &self.unit {
            attributes.insert(UNITS.to_string(), unit.clone().into());
        }
        if let Some(offset) = self.offset {
            attributes.insert(ADD_OFFSET.to_string(), offset.into());
        }
        if let Some(scale) = self.scale {
            attributes.insert(SCALE_FACTOR.to_string(), scale.into());
        }
        if let Some(spatial_ref) = &self.spatial_ref {
            attributes.insert(CRS.to_string(), spatial_ref.to_json());
        }
        attributes
    }
}
