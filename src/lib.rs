//! A chunked multidimensional array engine for the [Zarr V2](https://zarr.readthedocs.io/en/stable/spec/v2.html) storage layout and the pre-release Zarr V3 ("core protocol 3.0") layout.
//!
//! A hierarchy is a tree of [groups](group::Group) and [arrays](array::Array) held in a [store](storage).
//! Arrays are split into equally sized chunks, each encoded independently and stored under its own key.
//! Groups carry attributes and the named [dimensions](group::Dimension) shared by their arrays.
//!
//! ## Getting Started
//! - [`group::Group::create_root`] and [`group::Group::open_root`] are the entry points to a hierarchy.
//! - [`array::ArrayBuilder`] describes a new array, and [`array::Array`] details reading and writing.
//! - [`storage::store`] has the in-memory and filesystem stores.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use zarrs_mdarray::array::{ArrayBuilder, DataType, NumericType};
//! use zarrs_mdarray::group::{Group, HierarchyOptions, ZarrVersion};
//! use zarrs_mdarray::storage::store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! let root = Group::create_root(store, ZarrVersion::V2, HierarchyOptions::default())?;
//! let y = root.create_dimension("y", 4, None, None)?;
//! let x = root.create_dimension("x", 6, None, None)?;
//! let array = root.create_array(
//!     "temperature",
//!     ArrayBuilder::new(vec![y, x], DataType::Numeric(NumericType::Float32))
//!         .block_shape(vec![2, 3])
//!         .fill_value(-999.0),
//! )?;
//! array.write_region::<f32>(&[1, 1], &[2, 2], &[1.0, 2.0, 3.0, 4.0])?;
//! let elements = array.read_region::<f64>(&[0, 0], &[2, 2])?;
//! assert_eq!(elements, vec![-999.0, -999.0, -999.0, 1.0]);
//! root.flush()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `ndarray`: [`ndarray`] utility functions for [`Array`](crate::array::Array).
//!  - Codecs: `blosc`, `gzip` (also provides `zlib`), `zstd`. The `delta` filter is always available.
//!
//! ## Logging
//! Metadata writes, chunk retrievals and conversion warnings are logged with the [`log`] crate.
//! Errors raised while flushing on drop are passed to the [`ErrorSink`](array::ErrorSink) of the hierarchy, which logs them by default.
#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array;
pub mod config;
pub mod group;
pub mod metadata;
pub mod node;
pub mod plugin;
pub mod storage;
