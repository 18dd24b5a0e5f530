//! Groups, dimensions and hierarchies.
//!
//! A group is a node in a hierarchy with attributes and child nodes (groups or [`arrays`](crate::array)).
//! Every node of a hierarchy shares a [`Hierarchy`]: the store, the metadata dialect and the options it was opened with.
//!
//! Use [`Group::open_root`] to open an existing hierarchy, or [`Group::create_root`] to create a new one.
//!
//! A Zarr V2 group is a `.zgroup` document with optional `.zattrs`:
//! ```json
//! {
//!     "zarr_format": 2
//! }
//! ```
//! A V3 group is a `meta/root{path}.group.json` document holding its attributes, or is implicit if it has children but no document.
//!
//! Groups also hold the named [`Dimension`]s shared by their arrays.
//! The dimensions of an array are named by its `_ARRAY_DIMENSIONS` attribute and resolved against the dimensions of its group and the
//! ancestors of that group. A one-dimensional array with the same name as its dimension is the indexing variable of that dimension.

mod dimension;
mod hierarchy;
mod hierarchy_options;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};

pub use self::{
    dimension::{
        dimension_type_direction, Dimension, DIMENSION_TYPE_HORIZONTAL_X,
        DIMENSION_TYPE_HORIZONTAL_Y, DIMENSION_TYPE_TEMPORAL, DIMENSION_TYPE_VERTICAL,
    },
    hierarchy::{Hierarchy, ZarrVersion},
    hierarchy_options::HierarchyOptions,
};

use crate::{
    array::{check_attribute, Array, ArrayBuilder, ArrayDefinition, ArrayError},
    metadata::{
        node_prefix,
        v2::{ArrayMetadataV2, GroupMetadataV2, ZARRAY, ZATTRS, ZGROUP, ZMETADATA},
        v3::{self, ArrayMetadataV3, EntryPointMetadataV3, GroupMetadataV3, ENTRY_POINT},
        ConsolidatedMetadata,
    },
    node::{NodeName, NodePath},
    storage::{ReadableWritableListableStorage, StoreKey},
};

#[derive(Debug, Default)]
struct GroupState {
    attributes: Map<String, JsonValue>,
    attributes_modified: bool,
    arrays: BTreeMap<String, Arc<Array>>,
    groups: BTreeMap<String, Arc<Group>>,
    dimensions: BTreeMap<String, Arc<Dimension>>,
    dimensions_discovered: bool,
    opening: BTreeSet<String>,
}

/// A group.
///
/// Child arrays and groups are cached once opened or created, so opening the same child twice returns the same instance.
/// Attribute changes are written when the group is flushed or dropped.
#[derive(Debug)]
pub struct Group {
    hierarchy: Arc<Hierarchy>,
    parent: Weak<Group>,
    path: NodePath,
    this: Weak<Group>,
    state: Mutex<GroupState>,
}

fn as_object(json: JsonValue, key: &StoreKey) -> Result<Map<String, JsonValue>, ArrayError> {
    match json {
        JsonValue::Object(map) => Ok(map),
        _ => Err(ArrayError::InvalidMetadata(format!(
            "{key} is not a JSON object"
        ))),
    }
}

fn parse<T: serde::de::DeserializeOwned>(json: JsonValue, key: &StoreKey) -> Result<T, ArrayError> {
    serde_json::from_value(json)
        .map_err(|err| ArrayError::InvalidMetadata(format!("{key}: {err}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<JsonValue, ArrayError> {
    serde_json::to_value(value).map_err(|err| ArrayError::InvalidMetadata(err.to_string()))
}

/// The key of the Zarr V2 metadata `document` of the node at `path`.
fn v2_key(path: &NodePath, document: &str) -> Result<StoreKey, ArrayError> {
    Ok(node_prefix(path).key(document)?)
}

fn is_not_found(err: &ArrayError) -> bool {
    matches!(err, ArrayError::NodeNotFound(_))
}

impl Group {
    fn new(
        hierarchy: Arc<Hierarchy>,
        parent: Weak<Group>,
        path: NodePath,
        attributes: Map<String, JsonValue>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            hierarchy,
            parent,
            path,
            this: this.clone(),
            state: Mutex::new(GroupState {
                attributes,
                ..GroupState::default()
            }),
        })
    }

    /// Open the root group of the hierarchy in `storage`.
    ///
    /// The dialect is detected from the store: a `zarr.json` entry point is V3, otherwise the hierarchy is Zarr V2.
    /// A Zarr V2 hierarchy is read from its `.zmetadata` document if it exists and
    /// [consolidated metadata is enabled](HierarchyOptions::use_consolidated_metadata).
    ///
    /// # Errors
    /// Returns [`ArrayError::NodeNotFound`] if there is no hierarchy in the store, or an [`ArrayError`] if its metadata is invalid
    /// or cannot be retrieved.
    pub fn open_root(
        storage: ReadableWritableListableStorage,
        options: HierarchyOptions,
    ) -> Result<Arc<Self>, ArrayError> {
        let entry_point_key = StoreKey::new(ENTRY_POINT)?;
        if let Some(entry_point) = storage.get(&entry_point_key)? {
            let entry_point: EntryPointMetadataV3 = serde_json::from_slice(&entry_point)
                .map_err(|err| ArrayError::InvalidMetadata(format!("{entry_point_key}: {err}")))?;
            entry_point.validate()?;
            let hierarchy = Arc::new(Hierarchy::new(storage, ZarrVersion::V3, options, None));
            let key = v3::group_metadata_key(&NodePath::root())?;
            let attributes = match hierarchy.read_json(&key)? {
                Some(json) => parse::<GroupMetadataV3>(json, &key)?.attributes,
                None => Map::new(),
            };
            return Ok(Self::new(hierarchy, Weak::new(), NodePath::root(), attributes));
        }

        let zmetadata_key = StoreKey::new(ZMETADATA)?;
        let consolidated = if options.use_consolidated_metadata() {
            storage
                .get(&zmetadata_key)?
                .map(|bytes| {
                    serde_json::from_slice::<ConsolidatedMetadata>(&bytes).map_err(|err| {
                        ArrayError::InvalidMetadata(format!("{zmetadata_key}: {err}"))
                    })
                })
                .transpose()?
        } else {
            None
        };
        let hierarchy = Arc::new(Hierarchy::new(
            storage,
            ZarrVersion::V2,
            options,
            consolidated,
        ));
        let root = NodePath::root();
        let zgroup_key = v2_key(&root, ZGROUP)?;
        let zgroup = hierarchy
            .read_json(&zgroup_key)?
            .ok_or_else(|| ArrayError::NodeNotFound(root.to_string()))?;
        parse::<GroupMetadataV2>(zgroup, &zgroup_key)?;
        let attributes = Self::read_attributes_v2(&hierarchy, &root)?;
        Ok(Self::new(hierarchy, Weak::new(), root, attributes))
    }

    /// Create a new hierarchy with dialect `version` in `storage` and return its root group.
    ///
    /// The hierarchy is always [updatable](HierarchyOptions::updatable).
    /// A Zarr V2 hierarchy maintains a `.zmetadata` document if [consolidated metadata creation is enabled](HierarchyOptions::create_consolidated_metadata).
    ///
    /// # Errors
    /// Returns [`ArrayError::NodeExists`] if the store already holds a hierarchy, or an [`ArrayError`] if the metadata cannot be written.
    pub fn create_root(
        storage: ReadableWritableListableStorage,
        version: ZarrVersion,
        mut options: HierarchyOptions,
    ) -> Result<Arc<Self>, ArrayError> {
        options.set_updatable(true);
        let root = NodePath::root();
        let existing = [
            StoreKey::new(ENTRY_POINT)?,
            v2_key(&root, ZGROUP)?,
            v2_key(&root, ZARRAY)?,
        ];
        for key in &existing {
            if storage.exists(key)? {
                return Err(ArrayError::NodeExists(root.to_string()));
            }
        }

        let hierarchy = match version {
            ZarrVersion::V2 => {
                let consolidated = options
                    .create_consolidated_metadata()
                    .then(ConsolidatedMetadata::new);
                let hierarchy = Hierarchy::new(storage, version, options, consolidated);
                hierarchy.write_json(&v2_key(&root, ZGROUP)?, to_json(&GroupMetadataV2::default())?)?;
                hierarchy
            }
            ZarrVersion::V3 => {
                let hierarchy = Hierarchy::new(storage, version, options, None);
                hierarchy.write_json(
                    &StoreKey::new(ENTRY_POINT)?,
                    to_json(&EntryPointMetadataV3::default())?,
                )?;
                hierarchy.write_json(
                    &v3::group_metadata_key(&root)?,
                    to_json(&GroupMetadataV3::default())?,
                )?;
                hierarchy
            }
        };
        Ok(Self::new(Arc::new(hierarchy), Weak::new(), root, Map::new()))
    }

    fn read_attributes_v2(
        hierarchy: &Hierarchy,
        path: &NodePath,
    ) -> Result<Map<String, JsonValue>, ArrayError> {
        let key = v2_key(path, ZATTRS)?;
        hierarchy
            .read_json(&key)?
            .map_or_else(|| Ok(Map::new()), |json| as_object(json, &key))
    }

    /// The hierarchy of the group.
    #[must_use]
    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    /// The path of the group, e.g. `/` or `/group`.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// The name of the group. Empty for the root group.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// The full name of the group, e.g. `/group`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.path.as_str()
    }

    /// The parent group, if this is not the root group and the parent is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Group>> {
        self.parent.upgrade()
    }

    fn child_path(&self, name: &str) -> Result<NodePath, ArrayError> {
        Ok(self.path.child(&NodeName::new(name)?))
    }

    fn child_full_name(&self, name: &str) -> String {
        if self.path.is_root() {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.path)
        }
    }

    /// The names of the child arrays, in lexicographical order.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the store cannot be listed.
    pub fn array_names(&self) -> Result<Vec<String>, ArrayError> {
        self.child_names(ZARRAY, ".array.json")
    }

    /// The names of the child groups, in lexicographical order.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the store cannot be listed.
    pub fn group_names(&self) -> Result<Vec<String>, ArrayError> {
        self.child_names(ZGROUP, ".group.json")
    }

    fn child_names(&self, document_v2: &str, suffix_v3: &str) -> Result<Vec<String>, ArrayError> {
        let storage = self.hierarchy.storage();
        let mut names = BTreeSet::new();
        match self.hierarchy.version() {
            ZarrVersion::V2 => {
                let prefix = node_prefix(&self.path);
                if let Some(consolidated) =
                    self.hierarchy.consolidated_children(prefix.as_str(), document_v2)
                {
                    names.extend(consolidated);
                } else {
                    for child in storage.list_dir(&prefix)?.prefixes() {
                        let Some(name) = child
                            .as_str()
                            .strip_prefix(prefix.as_str())
                            .and_then(|name| name.strip_suffix('/'))
                        else {
                            continue;
                        };
                        if NodeName::validate(name) && storage.exists(&child.key(document_v2)?)? {
                            names.insert(name.to_string());
                        }
                    }
                }
            }
            ZarrVersion::V3 => {
                let prefix = v3::children_metadata_prefix(&self.path)?;
                let listing = storage.list_dir(&prefix)?;
                for key in listing.keys() {
                    if let Some(name) = key.name().strip_suffix(suffix_v3) {
                        names.insert(name.to_string());
                    }
                }
                if suffix_v3 == ".group.json" {
                    for child in listing.prefixes() {
                        if let Some(name) = child
                            .as_str()
                            .strip_prefix(prefix.as_str())
                            .and_then(|name| name.strip_suffix('/'))
                        {
                            let array_key = prefix.key(&format!("{name}.array.json"))?;
                            if !storage.exists(&array_key)? {
                                names.insert(name.to_string());
                            }
                        }
                    }
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Open the child array `name`.
    ///
    /// # Errors
    /// Returns [`ArrayError::NodeNotFound`] if the array does not exist, or an [`ArrayError`] if its metadata is invalid
    /// or cannot be retrieved.
    pub fn open_array(&self, name: &str) -> Result<Arc<Array>, ArrayError> {
        {
            let mut state = self.state.lock();
            if let Some(array) = state.arrays.get(name) {
                return Ok(array.clone());
            }
            if !state.opening.insert(name.to_string()) {
                return Err(ArrayError::NodeNotFound(self.child_full_name(name)));
            }
        }
        let array = self.load_array(name);
        let mut state = self.state.lock();
        state.opening.remove(name);
        let array = array?;
        state.arrays.insert(name.to_string(), array.clone());
        Ok(array)
    }

    fn load_array(&self, name: &str) -> Result<Arc<Array>, ArrayError> {
        let path = self.child_path(name)?;
        let definition = match self.hierarchy.version() {
            ZarrVersion::V2 => {
                let key = v2_key(&path, ZARRAY)?;
                let zarray = self
                    .hierarchy
                    .read_json(&key)?
                    .ok_or_else(|| ArrayError::NodeNotFound(path.to_string()))?;
                let metadata: ArrayMetadataV2 = parse(zarray, &key)?;
                let attributes = Self::read_attributes_v2(&self.hierarchy, &path)?;
                metadata.to_definition(attributes)?
            }
            ZarrVersion::V3 => {
                let key = v3::array_metadata_key(&path)?;
                let json = self
                    .hierarchy
                    .read_json(&key)?
                    .ok_or_else(|| ArrayError::NodeNotFound(path.to_string()))?;
                parse::<ArrayMetadataV3>(json, &key)?.to_definition()?
            }
        };
        let dimensions = self.resolve_dimensions(name, &definition);
        let array = Arc::new(Array::new(
            self.hierarchy.clone(),
            self.this.clone(),
            path,
            definition,
            dimensions,
        )?);
        Self::register_indexing_variable(&array);
        Ok(array)
    }

    fn register_indexing_variable(array: &Arc<Array>) {
        if let [dimension] = array.dimensions() {
            if dimension.name() == array.name() && dimension.indexing_variable().is_none() {
                dimension.set_indexing_variable(array);
            }
        }
    }

    /// Find the dimension `name` of `size` in this group or its ancestors.
    fn find_dimension(&self, name: &str, size: u64) -> Option<Arc<Dimension>> {
        if let Some(dimension) = self.state.lock().dimensions.get(name) {
            if dimension.size() == size {
                return Some(dimension.clone());
            }
        }
        self.parent
            .upgrade()
            .and_then(|parent| parent.find_dimension(name, size))
    }

    fn resolve_dimensions(&self, array_name: &str, definition: &ArrayDefinition) -> Vec<Arc<Dimension>> {
        let names = match &definition.attributes.dimension_names {
            Some(names) if names.len() == definition.shape.len() => names,
            Some(names) => {
                log::warn!(
                    "{} has {} dimension names for {} dimensions, using anonymous dimensions",
                    self.child_full_name(array_name),
                    names.len(),
                    definition.shape.len()
                );
                return self.anonymous_dimensions(&definition.shape);
            }
            None => {
                return match &definition.attributes.dimension_refs {
                    Some(refs) if refs.len() == definition.shape.len() => {
                        self.nczarr_dimensions(array_name, refs, definition)
                    }
                    Some(refs) => {
                        log::warn!(
                            "{} has {} NCZarr dimension references for {} dimensions, using anonymous dimensions",
                            self.child_full_name(array_name),
                            refs.len(),
                            definition.shape.len()
                        );
                        self.anonymous_dimensions(&definition.shape)
                    }
                    None => self.anonymous_dimensions(&definition.shape),
                };
            }
        };

        let mut dimensions = Vec::with_capacity(names.len());
        for (name, &size) in names.iter().zip(&definition.shape) {
            if let Some(dimension) = self.find_dimension(name, size) {
                dimensions.push(dimension);
                continue;
            }
            if name != array_name && NodeName::validate(name) {
                match self.open_array(name) {
                    Ok(_) => {
                        if let Some(dimension) = self.find_dimension(name, size) {
                            dimensions.push(dimension);
                            continue;
                        }
                    }
                    Err(err) if is_not_found(&err) => {}
                    Err(err) => log::warn!(
                        "cannot open the indexing variable {}: {err}",
                        self.child_full_name(name)
                    ),
                }
            }

            let (dimension_type, direction) = if definition.shape.len() == 1 && name == array_name {
                dimension_type_direction(
                    &definition.attributes.user,
                    definition.attributes.unit.as_deref(),
                )
            } else {
                (None, None)
            };
            let dimension = Arc::new(Dimension::new(
                name,
                &self.child_full_name(name),
                size,
                dimension_type,
                direction,
            ));
            self.state
                .lock()
                .dimensions
                .entry(name.clone())
                .or_insert_with(|| dimension.clone());
            dimensions.push(dimension);
        }
        dimensions
    }

    /// The root group of the hierarchy.
    fn root(&self) -> Option<Arc<Group>> {
        let mut group = self.this.upgrade()?;
        while let Some(parent) = group.parent.upgrade() {
            group = parent;
        }
        Some(group)
    }

    /// Resolve NCZarr dimension references, the full names of dimensions such as `/group/x`.
    ///
    /// A dimension is looked up in (or added to) the group its full name points to.
    /// A reference to a missing group, or to a dimension of a different size, falls back to an anonymous dimension.
    fn nczarr_dimensions(
        &self,
        array_name: &str,
        refs: &[String],
        definition: &ArrayDefinition,
    ) -> Vec<Arc<Dimension>> {
        let array_full_name = self.child_full_name(array_name);
        let mut dimensions = self.anonymous_dimensions(&definition.shape);
        for ((dimension, dimref), &size) in dimensions.iter_mut().zip(refs).zip(&definition.shape) {
            let (group_path, name) = dimref
                .trim_start_matches('/')
                .rsplit_once('/')
                .unwrap_or(("", dimref.trim_start_matches('/')));
            if !NodeName::validate(name) {
                log::warn!("invalid NCZarr dimension reference {dimref} in {array_full_name}");
                continue;
            }
            let group = group_path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .try_fold(self.root(), |group, segment| {
                    group.map(|group| group.open_group(segment)).transpose()
                });
            let group = match group {
                Ok(Some(group)) => group,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("cannot find NCZarr dimension {dimref}: {err}");
                    continue;
                }
            };

            let mut state = group.state.lock();
            match state.dimensions.get(name) {
                Some(existing) if existing.size() == size => *dimension = existing.clone(),
                Some(_) => log::warn!(
                    "NCZarr dimension {dimref} of {array_full_name} does not have size {size}"
                ),
                None => {
                    let (dimension_type, direction) =
                        if definition.shape.len() == 1 && group.child_full_name(name) == array_full_name {
                            dimension_type_direction(
                                &definition.attributes.user,
                                definition.attributes.unit.as_deref(),
                            )
                        } else {
                            (None, None)
                        };
                    let created = Arc::new(Dimension::new(
                        name,
                        &group.child_full_name(name),
                        size,
                        dimension_type,
                        direction,
                    ));
                    state.dimensions.insert(name.to_string(), created.clone());
                    *dimension = created;
                }
            }
        }
        dimensions
    }

    fn anonymous_dimensions(&self, shape: &[u64]) -> Vec<Arc<Dimension>> {
        shape
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let name = format!("dim{i}");
                Arc::new(Dimension::new(
                    &name,
                    &self.child_full_name(&name),
                    size,
                    None,
                    None,
                ))
            })
            .collect()
    }

    /// Open the child group `name`.
    ///
    /// # Errors
    /// Returns [`ArrayError::NodeNotFound`] if the group does not exist, or an [`ArrayError`] if its metadata is invalid
    /// or cannot be retrieved.
    pub fn open_group(&self, name: &str) -> Result<Arc<Group>, ArrayError> {
        if let Some(group) = self.state.lock().groups.get(name) {
            return Ok(group.clone());
        }
        let path = self.child_path(name)?;
        let attributes = match self.hierarchy.version() {
            ZarrVersion::V2 => {
                let key = v2_key(&path, ZGROUP)?;
                let zgroup = self
                    .hierarchy
                    .read_json(&key)?
                    .ok_or_else(|| ArrayError::NodeNotFound(path.to_string()))?;
                parse::<GroupMetadataV2>(zgroup, &key)?;
                Self::read_attributes_v2(&self.hierarchy, &path)?
            }
            ZarrVersion::V3 => {
                let key = v3::group_metadata_key(&path)?;
                if let Some(json) = self.hierarchy.read_json(&key)? {
                    parse::<GroupMetadataV3>(json, &key)?.attributes
                } else {
                    let children = self
                        .hierarchy
                        .storage()
                        .list_dir(&v3::children_metadata_prefix(&path)?)?;
                    if children.keys().is_empty() && children.prefixes().is_empty() {
                        return Err(ArrayError::NodeNotFound(path.to_string()));
                    }
                    Map::new()
                }
            }
        };
        let group = Self::new(self.hierarchy.clone(), self.this.clone(), path, attributes);
        Ok(self
            .state
            .lock()
            .groups
            .entry(name.to_string())
            .or_insert(group)
            .clone())
    }

    fn check_new_child(&self, name: &str) -> Result<NodePath, ArrayError> {
        self.hierarchy.check_updatable()?;
        let path = self.child_path(name)?;
        {
            let state = self.state.lock();
            if state.arrays.contains_key(name) || state.groups.contains_key(name) {
                return Err(ArrayError::NodeExists(path.to_string()));
            }
        }
        let keys = match self.hierarchy.version() {
            ZarrVersion::V2 => vec![v2_key(&path, ZARRAY)?, v2_key(&path, ZGROUP)?],
            ZarrVersion::V3 => vec![
                v3::array_metadata_key(&path)?,
                v3::group_metadata_key(&path)?,
            ],
        };
        for key in &keys {
            if self.hierarchy.exists_json(key)? {
                return Err(ArrayError::NodeExists(path.to_string()));
            }
        }
        Ok(path)
    }

    /// Create the child array `name` and write its metadata.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable, [`ArrayError::NodeExists`] if a child `name` already exists,
    /// [`ArrayError::InvalidNodeName`] if `name` is invalid, or an [`ArrayError`] if the builder is invalid for the dialect of the hierarchy
    /// or the metadata cannot be written.
    pub fn create_array(&self, name: &str, builder: &ArrayBuilder) -> Result<Arc<Array>, ArrayError> {
        let path = self.check_new_child(name)?;
        let definition = builder.build_definition(self.hierarchy.version())?;
        let array = Arc::new(Array::new(
            self.hierarchy.clone(),
            self.this.clone(),
            path,
            definition,
            builder.dimensions().to_vec(),
        )?);
        array.store_metadata()?;
        Self::register_indexing_variable(&array);
        self.state
            .lock()
            .arrays
            .insert(name.to_string(), array.clone());
        Ok(array)
    }

    /// Create the child group `name` and write its metadata.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable, [`ArrayError::NodeExists`] if a child `name` already exists,
    /// [`ArrayError::InvalidNodeName`] if `name` is invalid, or an [`ArrayError`] if the metadata cannot be written.
    pub fn create_group(&self, name: &str) -> Result<Arc<Group>, ArrayError> {
        let path = self.check_new_child(name)?;
        match self.hierarchy.version() {
            ZarrVersion::V2 => self
                .hierarchy
                .write_json(&v2_key(&path, ZGROUP)?, to_json(&GroupMetadataV2::default())?)?,
            ZarrVersion::V3 => self.hierarchy.write_json(
                &v3::group_metadata_key(&path)?,
                to_json(&GroupMetadataV3::default())?,
            )?,
        }
        let group = Self::new(self.hierarchy.clone(), self.this.clone(), path, Map::new());
        self.state
            .lock()
            .groups
            .insert(name.to_string(), group.clone());
        Ok(group)
    }

    /// Create the dimension `name` of `size` in this group.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable, or [`ArrayError::NodeExists`] if the group already has
    /// a dimension `name`.
    pub fn create_dimension(
        &self,
        name: &str,
        size: u64,
        dimension_type: Option<&str>,
        direction: Option<&str>,
    ) -> Result<Arc<Dimension>, ArrayError> {
        self.hierarchy.check_updatable()?;
        let mut state = self.state.lock();
        if state.dimensions.contains_key(name) {
            return Err(ArrayError::NodeExists(self.child_full_name(name)));
        }
        let dimension = Arc::new(Dimension::new(
            name,
            &self.child_full_name(name),
            size,
            dimension_type.map(str::to_string),
            direction.map(str::to_string),
        ));
        state
            .dimensions
            .insert(name.to_string(), dimension.clone());
        Ok(dimension)
    }

    /// The dimensions of this group, in lexicographical order of their names.
    ///
    /// The first call opens every child array so that their dimensions are known.
    /// Each call then resolves the indexing variable of every dimension without one by opening the array of the same name.
    /// Arrays that fail to open are skipped with a warning.
    #[must_use]
    pub fn dimensions(&self) -> Vec<Arc<Dimension>> {
        let discover = !std::mem::replace(&mut self.state.lock().dimensions_discovered, true);
        if discover {
            match self.array_names() {
                Ok(names) => {
                    for name in names {
                        if let Err(err) = self.open_array(&name) {
                            log::warn!("cannot open {}: {err}", self.child_full_name(&name));
                        }
                    }
                }
                Err(err) => log::warn!("cannot list the arrays of {}: {err}", self.path),
            }
        }

        let dimensions: Vec<Arc<Dimension>> =
            self.state.lock().dimensions.values().cloned().collect();
        for dimension in &dimensions {
            if dimension.indexing_variable().is_some() {
                continue;
            }
            match self.open_array(dimension.name()) {
                Ok(array) if array.dimensions().len() == 1 => {
                    dimension.set_indexing_variable(&array);
                }
                Ok(_) => {}
                Err(err) if is_not_found(&err) => {}
                Err(err) => log::warn!(
                    "cannot open the indexing variable of {}: {err}",
                    dimension.full_name()
                ),
            }
        }
        dimensions
    }

    /// The attributes.
    #[must_use]
    pub fn attributes(&self) -> Map<String, JsonValue> {
        self.state.lock().attributes.clone()
    }

    /// The attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<JsonValue> {
        self.state.lock().attributes.get(name).cloned()
    }

    /// Create or replace the attribute `name`.
    ///
    /// An attribute has 0 dimensions (a scalar) or 1 dimension (a JSON array of `dimensions[0]` values).
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable, [`ArrayError::UnsupportedRank`] if there are 2 or more
    /// dimensions, or [`ArrayError::IncompatibleElementType`] if `value` does not match `dimensions`.
    pub fn create_attribute(
        &self,
        name: &str,
        dimensions: &[u64],
        value: JsonValue,
    ) -> Result<(), ArrayError> {
        self.hierarchy.check_updatable()?;
        check_attribute(dimensions, &value)?;
        let mut state = self.state.lock();
        state.attributes.insert(name.to_string(), value);
        state.attributes_modified = true;
        Ok(())
    }

    /// Delete the attribute `name`. Returns true if it existed.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable.
    pub fn delete_attribute(&self, name: &str) -> Result<bool, ArrayError> {
        self.hierarchy.check_updatable()?;
        let mut state = self.state.lock();
        let existed = state.attributes.remove(name).is_some();
        state.attributes_modified |= existed;
        Ok(existed)
    }

    fn flush_attributes(&self) -> Result<(), ArrayError> {
        let attributes = {
            let mut state = self.state.lock();
            if !state.attributes_modified {
                return Ok(());
            }
            state.attributes_modified = false;
            state.attributes.clone()
        };
        let result = match self.hierarchy.version() {
            ZarrVersion::V2 => self
                .hierarchy
                .write_json(&v2_key(&self.path, ZATTRS)?, JsonValue::Object(attributes)),
            ZarrVersion::V3 => self.hierarchy.write_json(
                &v3::group_metadata_key(&self.path)?,
                to_json(&GroupMetadataV3 {
                    extensions: Vec::new(),
                    attributes,
                })?,
            ),
        };
        if result.is_err() {
            self.state.lock().attributes_modified = true;
        }
        result
    }

    /// Write the modified attributes of this group, flush every opened child array and group, then write the consolidated metadata.
    ///
    /// # Errors
    /// Returns the first [`ArrayError`] encountered.
    pub fn flush(&self) -> Result<(), ArrayError> {
        self.flush_attributes()?;
        let (arrays, groups): (Vec<_>, Vec<_>) = {
            let state = self.state.lock();
            (
                state.arrays.values().cloned().collect(),
                state.groups.values().cloned().collect(),
            )
        };
        for array in arrays {
            array.flush()?;
        }
        for group in groups {
            group.flush()?;
        }
        self.hierarchy.flush()
    }
}

impl Drop for Group {
    fn drop(&mut self) {
        if let Err(err) = self.flush_attributes() {
            self.hierarchy.options().error_sink().report(&err);
        }
    }
}
