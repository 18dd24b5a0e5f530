use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use num::complex::Complex32;
use serde_json::json;
use zarrs_mdarray::{
    array::{
        ArrayBuilder, ArrayError, CodecMetadata, CompoundType, DataType, Element, MemoryOrder,
        Number, NumericType, StringFormat, Value,
    },
    group::{Group, HierarchyOptions, ZarrVersion},
    storage::{
        store::MemoryStore, ListableStorageTraits, MaybeBytes, ReadableStorageTraits,
        StorageError, StoreKey, StoreKeysPrefixes, StorePrefix, WritableStorageTraits,
    },
};

fn create_root(store: &Arc<MemoryStore>) -> Arc<Group> {
    Group::create_root(store.clone(), ZarrVersion::V2, HierarchyOptions::default()).unwrap()
}

fn open_root(store: &Arc<MemoryStore>, updatable: bool) -> Arc<Group> {
    let mut options = HierarchyOptions::default();
    options.set_updatable(updatable);
    Group::open_root(store.clone(), options).unwrap()
}

fn get(store: &MemoryStore, key: &str) -> Option<Vec<u8>> {
    store.get(&StoreKey::new(key).unwrap()).unwrap()
}

fn set(store: &MemoryStore, key: &str, value: &[u8]) {
    store.set(&StoreKey::new(key).unwrap(), value).unwrap();
}

fn get_json(store: &MemoryStore, key: &str) -> serde_json::Value {
    serde_json::from_slice(&get(store, key).unwrap()).unwrap()
}

fn chunk_keys(store: &MemoryStore) -> Vec<String> {
    store
        .keys()
        .iter()
        .map(|key| key.as_str().to_string())
        .filter(|key| !key.rsplit('/').next().unwrap().starts_with('.'))
        .collect()
}

fn round_trip<T: Element + PartialEq + std::fmt::Debug>(data_type: DataType, elements: &[T]) {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let x = root
            .create_dimension("x", elements.len() as u64, None, None)
            .unwrap();
        let array = root
            .create_array(
                "a",
                ArrayBuilder::new(vec![x], data_type.clone()).block_shape(vec![3]),
            )
            .unwrap();
        array
            .write_region(&[0], &[elements.len()], elements)
            .unwrap();
    }
    let root = open_root(&store, false);
    let array = root.open_array("a").unwrap();
    assert_eq!(array.data_type(), data_type);
    assert_eq!(
        array.read_region::<T>(&[0], &[elements.len()]).unwrap(),
        elements
    );
}

#[test]
fn array_round_trip_numeric() {
    round_trip::<u8>(NumericType::UInt8.into(), &[0, 1, 2, 254, 255]);
    round_trip::<i16>(NumericType::Int16.into(), &[-32768, -1, 0, 1, 32767]);
    round_trip::<u16>(NumericType::UInt16.into(), &[0, 1, 65535, 7, 9]);
    round_trip::<i32>(NumericType::Int32.into(), &[i32::MIN, -5, 0, 5, i32::MAX]);
    round_trip::<u32>(NumericType::UInt32.into(), &[0, 1, u32::MAX, 3, 4]);
    round_trip::<f32>(NumericType::Float32.into(), &[-1.5, 0.0, 0.25, 1e30, 3.0]);
    round_trip::<f64>(NumericType::Float64.into(), &[-1.5, 0.0, 0.1, 1e300, 3.0]);
    round_trip::<Complex32>(
        NumericType::Complex64.into(),
        &[
            Complex32::new(1.0, -1.0),
            Complex32::new(0.0, 0.0),
            Complex32::new(2.5, 3.5),
            Complex32::new(-4.0, 0.5),
        ],
    );
}

#[test]
fn array_round_trip_strings() {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let x = root.create_dimension("x", 3, None, None).unwrap();
        let string = DataType::String {
            max_length: Some(5),
        };
        let ascii = root
            .create_array("ascii", &ArrayBuilder::new(vec![x.clone()], string.clone()))
            .unwrap();
        ascii
            .write_region(
                &[0],
                &[3],
                &[Some("ab".to_string()), Some("hello".to_string()), Some("z".to_string())],
            )
            .unwrap();
        let unicode = root
            .create_array(
                "unicode",
                ArrayBuilder::new(vec![x], string).string_format(StringFormat::Unicode),
            )
            .unwrap();
        unicode
            .write_region(
                &[0],
                &[3],
                &[Some("héllo".to_string()), Some("ω".to_string()), Some("x".to_string())],
            )
            .unwrap();
    }
    assert_eq!(get_json(&store, "ascii/.zarray")["dtype"], json!("|S5"));
    assert_eq!(get_json(&store, "unicode/.zarray")["dtype"], json!("<U5"));
    assert_eq!(get(&store, "unicode/0").unwrap().len(), 3 * 5 * 4);

    let root = open_root(&store, false);
    assert_eq!(
        root.open_array("ascii")
            .unwrap()
            .read_region::<Option<String>>(&[0], &[3])
            .unwrap(),
        vec![Some("ab".to_string()), Some("hello".to_string()), Some("z".to_string())]
    );
    assert_eq!(
        root.open_array("unicode")
            .unwrap()
            .read_region::<Option<String>>(&[1], &[2])
            .unwrap(),
        vec![Some("ω".to_string()), Some("x".to_string())]
    );
}

#[test]
fn array_round_trip_nested_compound() {
    let inner = CompoundType::new_aligned([
        ("x".to_string(), DataType::from(NumericType::Float64)),
        ("y".to_string(), DataType::from(NumericType::UInt8)),
    ])
    .unwrap();
    let outer = CompoundType::new_aligned([
        ("a".to_string(), DataType::from(NumericType::Int16)),
        ("b".to_string(), DataType::Compound(inner)),
    ])
    .unwrap();
    let element = |a: i16, x: f64, y: u8| {
        Value::Compound(vec![
            Value::Number(Number::Int16(a)),
            Value::Compound(vec![
                Value::Number(Number::Float64(x)),
                Value::Number(Number::UInt8(y)),
            ]),
        ])
    };
    let elements = [element(1, 2.5, 3), element(-4, 0.125, 255)];

    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let x = root.create_dimension("x", 2, None, None).unwrap();
        let array = root
            .create_array(
                "a",
                &ArrayBuilder::new(vec![x], DataType::Compound(outer.clone())),
            )
            .unwrap();
        array.write_region(&[0], &[2], &elements).unwrap();
    }
    assert_eq!(
        get_json(&store, "a/.zarray")["dtype"],
        json!([["a", "<i2"], ["b", [["x", "<f8"], ["y", "|u1"]]]])
    );

    let root = open_root(&store, false);
    let array = root.open_array("a").unwrap();
    assert_eq!(array.data_type(), DataType::Compound(outer));
    assert_eq!(array.read_region::<Value>(&[0], &[2]).unwrap(), elements);
}

#[test]
fn array_big_endian() {
    let store = Arc::new(MemoryStore::new());
    set(&store, ".zgroup", br#"{"zarr_format": 2}"#);
    set(
        &store,
        "a/.zarray",
        json!({
            "chunks": [4],
            "compressor": null,
            "dtype": ">i4",
            "fill_value": 0,
            "filters": null,
            "order": "C",
            "shape": [4],
            "zarr_format": 2
        })
        .to_string()
        .as_bytes(),
    );
    let values: [i32; 4] = [1, -2, 300_000, -400_000];
    let chunk: Vec<u8> = values.iter().flat_map(|value| value.to_be_bytes()).collect();
    set(&store, "a/0", &chunk);

    {
        let root = open_root(&store, true);
        let array = root.open_array("a").unwrap();
        assert_eq!(array.read_region::<i32>(&[0], &[4]).unwrap(), values);
        array.write_region::<i32>(&[2], &[1], &[7]).unwrap();
        array.flush().unwrap();
    }
    let expected: Vec<u8> = [1i32, -2, 7, -400_000]
        .iter()
        .flat_map(|value| value.to_be_bytes())
        .collect();
    assert_eq!(get(&store, "a/0").unwrap(), expected);
}

#[test]
fn array_sparse_fill() {
    let store = Arc::new(MemoryStore::new());
    let root = create_root(&store);
    let y = root.create_dimension("y", 10, None, None).unwrap();
    let x = root.create_dimension("x", 10, None, None).unwrap();
    let filled = root
        .create_array(
            "filled",
            ArrayBuilder::new(vec![y.clone(), x.clone()], NumericType::Float32.into())
                .block_shape(vec![4, 4])
                .fill_value(-9999.0),
        )
        .unwrap();
    let zero = root
        .create_array(
            "zero",
            ArrayBuilder::new(vec![y, x], NumericType::Int16.into()).block_shape(vec![4, 4]),
        )
        .unwrap();

    assert_eq!(
        filled.read_region::<f32>(&[3, 3], &[2, 2]).unwrap(),
        vec![-9999.0; 4]
    );
    assert_eq!(zero.read_region::<i16>(&[0, 0], &[10, 10]).unwrap(), vec![0; 100]);

    // Chunks that hold only the fill value are not stored
    filled
        .write_region::<f32>(&[0, 0], &[4, 4], &[-9999.0; 16])
        .unwrap();
    zero.write_region::<i16>(&[4, 4], &[4, 4], &[0; 16]).unwrap();
    root.flush().unwrap();
    assert!(chunk_keys(&store).is_empty());

    filled.write_region::<f32>(&[9, 9], &[1, 1], &[1.0]).unwrap();
    root.flush().unwrap();
    assert_eq!(chunk_keys(&store), vec!["filled/2.2".to_string()]);

    // Restoring the fill value erases the chunk
    filled
        .write_region::<f32>(&[9, 9], &[1, 1], &[-9999.0])
        .unwrap();
    root.flush().unwrap();
    assert!(chunk_keys(&store).is_empty());
}

#[test]
fn array_sparse_strings() {
    let store = Arc::new(MemoryStore::new());
    let root = create_root(&store);
    let x = root.create_dimension("x", 4, None, None).unwrap();
    let string = DataType::String {
        max_length: Some(3),
    };
    let empty = root
        .create_array("empty", &ArrayBuilder::new(vec![x.clone()], string.clone()))
        .unwrap();
    let filled = root
        .create_array(
            "filled",
            ArrayBuilder::new(vec![x], string).fill_value("ab"),
        )
        .unwrap();

    // Empty strings encode to the zero bytes of a missing fill value
    empty
        .write_region(&[0], &[4], &vec![Some(String::new()); 4])
        .unwrap();
    filled
        .write_region(&[0], &[4], &vec![Some("ab".to_string()); 4])
        .unwrap();
    root.flush().unwrap();
    assert!(chunk_keys(&store).is_empty());

    empty
        .write_region(&[1], &[1], &[Some("ab".to_string())])
        .unwrap();
    root.flush().unwrap();
    assert_eq!(chunk_keys(&store), vec!["empty/0".to_string()]);

    // Decoded from storage then restored
    let root = open_root(&store, true);
    let empty = root.open_array("empty").unwrap();
    empty
        .write_region(&[1], &[1], &[Some(String::new())])
        .unwrap();
    root.flush().unwrap();
    assert!(chunk_keys(&store).is_empty());
}

#[test]
fn array_partial_chunk_preserved() {
    let store = Arc::new(MemoryStore::new());
    let root = create_root(&store);
    let y = root.create_dimension("y", 8, None, None).unwrap();
    let x = root.create_dimension("x", 8, None, None).unwrap();
    let array = root
        .create_array(
            "a",
            ArrayBuilder::new(vec![y, x], NumericType::UInt8.into()).block_shape(vec![4, 4]),
        )
        .unwrap();
    let elements: Vec<u8> = (1..=16).collect();
    array.write_region(&[0, 0], &[4, 4], &elements).unwrap();
    array.flush().unwrap();

    array
        .write_region::<u8>(&[1, 1], &[2, 2], &[100, 101, 102, 103])
        .unwrap();
    array.flush().unwrap();

    let mut expected = elements;
    expected[5] = 100;
    expected[6] = 101;
    expected[9] = 102;
    expected[10] = 103;
    assert_eq!(array.read_region::<u8>(&[0, 0], &[4, 4]).unwrap(), expected);
    assert_eq!(get(&store, "a/0.0").unwrap(), expected);
}

#[test]
fn array_strided() {
    let store = Arc::new(MemoryStore::new());
    let root = create_root(&store);
    let x = root.create_dimension("x", 10, None, None).unwrap();
    let array = root
        .create_array(
            "a",
            ArrayBuilder::new(vec![x], NumericType::Int32.into()).block_shape(vec![3]),
        )
        .unwrap();
    let elements: Vec<i32> = (0..10).collect();
    array.write_region(&[0], &[10], &elements).unwrap();

    let mut buffer = [0i32; 4];
    array.read(&[8], &[4], &[-2], &[1], &mut buffer).unwrap();
    assert_eq!(buffer, [8, 6, 4, 2]);

    // A negative buffer stride reverses the buffer
    let mut reversed = [0i32; 3];
    array.read(&[1], &[3], &[3], &[-1], &mut reversed).unwrap();
    assert_eq!(reversed, [7, 4, 1]);

    array.write(&[9], &[5], &[-2], &[1], &[-1, -3, -5, -7, -9]).unwrap();
    assert_eq!(
        array.read_region::<i32>(&[0], &[10]).unwrap(),
        vec![0, -9, 2, -7, 4, -5, 6, -3, 8, -1]
    );

    assert!(matches!(
        array.read(&[2], &[2], &[-3], &[1], &mut buffer),
        Err(ArrayError::InvalidRegion(_))
    ));
    assert!(matches!(
        array.read(&[0], &[11], &[1], &[1], &mut [0i32; 11]),
        Err(ArrayError::InvalidRegion(_))
    ));
    assert!(matches!(
        array.read(&[0], &[5], &[1], &[1], &mut buffer),
        Err(ArrayError::InvalidBufferSize { .. })
    ));
    assert!(array.read(&[0], &[0], &[1], &[1], &mut buffer).is_ok());
}

#[test]
fn array_cross_chunk_region() {
    let store = Arc::new(MemoryStore::new());
    let root = create_root(&store);
    let y = root.create_dimension("y", 10, None, None).unwrap();
    let x = root.create_dimension("x", 10, None, None).unwrap();
    let array = root
        .create_array(
            "a",
            ArrayBuilder::new(vec![y, x], NumericType::UInt16.into()).block_shape(vec![4, 4]),
        )
        .unwrap();
    let elements: Vec<u16> = (0..100).collect();
    array.write_region(&[0, 0], &[10, 10], &elements).unwrap();
    root.flush().unwrap();
    assert_eq!(chunk_keys(&store).len(), 9);
    // Edge chunks are stored at the full chunk size
    assert_eq!(get(&store, "a/2.2").unwrap().len(), 4 * 4 * 2);

    let region = array.read_region::<u16>(&[3, 3], &[5, 6]).unwrap();
    let expected: Vec<u16> = (3..8)
        .flat_map(|y| (3..9).map(move |x| y * 10 + x))
        .collect();
    assert_eq!(region, expected);

    // Widening and narrowing conversions
    assert_eq!(
        array.read_region::<f64>(&[9, 8], &[1, 2]).unwrap(),
        vec![98.0, 99.0]
    );
    assert_eq!(array.read_region::<u8>(&[2, 5], &[1, 1]).unwrap(), vec![25]);
}

#[test]
fn array_memory_order() {
    let store = Arc::new(MemoryStore::new());
    let root = create_root(&store);
    let y = root.create_dimension("y", 2, None, None).unwrap();
    let x = root.create_dimension("x", 3, None, None).unwrap();
    let c = root
        .create_array(
            "c",
            ArrayBuilder::new(vec![y.clone(), x.clone()], NumericType::UInt8.into())
                .block_shape(vec![2, 3]),
        )
        .unwrap();
    let f = root
        .create_array(
            "f",
            ArrayBuilder::new(vec![y, x], NumericType::UInt8.into())
                .block_shape(vec![2, 3])
                .order(MemoryOrder::F),
        )
        .unwrap();
    let elements: Vec<u8> = (0..6).collect();
    c.write_region(&[0, 0], &[2, 3], &elements).unwrap();
    f.write_region(&[0, 0], &[2, 3], &elements).unwrap();
    root.flush().unwrap();

    assert_eq!(get(&store, "c/0.0").unwrap(), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(get(&store, "f/0.0").unwrap(), vec![0, 3, 1, 4, 2, 5]);
    assert_eq!(get_json(&store, "f/.zarray")["order"], json!("F"));
    assert_eq!(f.read_region::<u8>(&[0, 0], &[2, 3]).unwrap(), elements);
}

#[test]
fn array_compressor() {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let x = root.create_dimension("x", 64, None, None).unwrap();
        let mut configuration = serde_json::Map::new();
        configuration.insert("level".to_string(), json!(5));
        let array = root
            .create_array(
                "a",
                ArrayBuilder::new(vec![x], NumericType::Float64.into())
                    .block_shape(vec![32])
                    .compressor(Some(CodecMetadata::new("gzip", configuration))),
            )
            .unwrap();
        let elements: Vec<f64> = (0..64).map(f64::from).collect();
        array.write_region(&[0], &[64], &elements).unwrap();
    }
    assert_eq!(
        get_json(&store, "a/.zarray")["compressor"],
        json!({"id": "gzip", "level": 5})
    );
    assert_ne!(get(&store, "a/1").unwrap().len(), 32 * 8);

    let root = open_root(&store, false);
    let array = root.open_array("a").unwrap();
    assert_eq!(array.compressor().map(|codec| codec.id().to_string()), Some("gzip".to_string()));
    assert_eq!(
        array.read_region::<f64>(&[30], &[4]).unwrap(),
        vec![30.0, 31.0, 32.0, 33.0]
    );
}

#[test]
fn array_not_writable() {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let x = root.create_dimension("x", 4, None, None).unwrap();
        root.create_array("a", &ArrayBuilder::new(vec![x], NumericType::UInt8.into()))
            .unwrap();
    }
    let root = open_root(&store, false);
    let array = root.open_array("a").unwrap();
    assert!(matches!(
        array.write_region::<u8>(&[0], &[1], &[1]),
        Err(ArrayError::NotWritable)
    ));
    assert!(matches!(
        array.create_attribute("name", &[], json!("value")),
        Err(ArrayError::NotWritable)
    ));
    assert!(matches!(
        array.set_unit(Some("m")),
        Err(ArrayError::NotWritable)
    ));
    assert!(matches!(
        array.set_no_data_value(Some(&Value::from(1.0))),
        Err(ArrayError::NotWritable)
    ));
    assert_eq!(array.read_region::<u8>(&[0], &[4]).unwrap(), vec![0; 4]);
}

#[test]
fn array_attributes() {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let x = root.create_dimension("x", 4, None, None).unwrap();
        let array = root
            .create_array("a", &ArrayBuilder::new(vec![x], NumericType::Float32.into()))
            .unwrap();
        array.create_attribute("vector", &[3], json!([1, 2, 3])).unwrap();
        assert!(matches!(
            array.create_attribute("matrix", &[2, 2], json!([[1, 2], [3, 4]])),
            Err(ArrayError::UnsupportedRank(2))
        ));
        assert!(matches!(
            array.create_attribute("vector", &[2], json!([1, 2, 3])),
            Err(ArrayError::IncompatibleElementType(_))
        ));
        array.create_attribute("units", &[], json!("K")).unwrap();
        array.set_offset(Some(273.15)).unwrap();
        array.set_scale(Some(0.5)).unwrap();
        array.create_attribute("temporary", &[], json!(true)).unwrap();
        assert!(array.delete_attribute("temporary").unwrap());
        assert!(!array.delete_attribute("temporary").unwrap());
        array.set_no_data_value(Some(&Value::from(-1.0))).unwrap();
    }
    let zattrs = get_json(&store, "a/.zattrs");
    assert_eq!(zattrs["_ARRAY_DIMENSIONS"], json!(["x"]));
    assert_eq!(zattrs["units"], json!("K"));
    assert_eq!(zattrs["add_offset"], json!(273.15));
    assert!(zattrs.get("temporary").is_none());
    assert_eq!(get_json(&store, "a/.zarray")["fill_value"], json!(-1.0));

    let root = open_root(&store, false);
    let array = root.open_array("a").unwrap();
    assert_eq!(array.unit().as_deref(), Some("K"));
    assert_eq!(array.offset(), Some(273.15));
    assert_eq!(array.scale(), Some(0.5));
    assert_eq!(array.attribute("vector"), Some(json!([1, 2, 3])));
    assert!(array.attribute("units").is_none());
    assert_eq!(array.read_region::<f32>(&[0], &[2]).unwrap(), vec![-1.0; 2]);
}

#[derive(Debug, Default)]
struct CountingStore {
    store: MemoryStore,
    sets: AtomicUsize,
    erases: AtomicUsize,
    failing: AtomicBool,
}

impl CountingStore {
    fn counts(&self) -> (usize, usize) {
        (
            self.sets.load(Ordering::SeqCst),
            self.erases.load(Ordering::SeqCst),
        )
    }
}

impl ReadableStorageTraits for CountingStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        self.store.get(key)
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        self.store.size_key(key)
    }
}

impl WritableStorageTraits for CountingStore {
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Other(format!("cannot write {key}")));
        }
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.store.set(key, value)
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.erases.fetch_add(1, Ordering::SeqCst);
        self.store.erase(key)
    }
}

impl ListableStorageTraits for CountingStore {
    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        self.store.list_dir(prefix)
    }
}

#[test]
fn array_flush_idempotent() {
    let store = Arc::new(CountingStore::default());
    {
        let root =
            Group::create_root(store.clone(), ZarrVersion::V2, HierarchyOptions::default())
                .unwrap();
        let x = root.create_dimension("x", 8, None, None).unwrap();
        let array = root
            .create_array(
                "a",
                ArrayBuilder::new(vec![x], NumericType::UInt8.into()).block_shape(vec![4]),
            )
            .unwrap();
        array.write_region::<u8>(&[2], &[4], &[1, 2, 3, 4]).unwrap();
        root.flush().unwrap();
        let counts = store.counts();
        root.flush().unwrap();
        array.flush().unwrap();
        assert_eq!(store.counts(), counts);

        // Reading does not dirty a chunk
        array.read_region::<u8>(&[0], &[8]).unwrap();
        array.flush().unwrap();
        assert_eq!(store.counts(), counts);
    }
    let counts = store.counts();
    assert_eq!(counts.1, 0);
    assert!(store.store.get(&StoreKey::new("a/1").unwrap()).unwrap().is_some());
}

#[test]
fn array_flush_failure_keeps_tile() {
    let store = Arc::new(CountingStore::default());
    let root = Group::create_root(store.clone(), ZarrVersion::V2, HierarchyOptions::default())
        .unwrap();
    let x = root.create_dimension("x", 8, None, None).unwrap();
    let array = root
        .create_array(
            "a",
            ArrayBuilder::new(vec![x], NumericType::UInt8.into()).block_shape(vec![4]),
        )
        .unwrap();
    array.write_region::<u8>(&[0], &[4], &[1, 2, 3, 4]).unwrap();

    // Moving to chunk 1 flushes chunk 0, which fails
    store.failing.store(true, Ordering::SeqCst);
    assert!(matches!(
        array.read_region::<u8>(&[4], &[4]),
        Err(ArrayError::StorageError(_))
    ));
    assert!(matches!(array.flush(), Err(ArrayError::StorageError(_))));
    assert!(store.store.get(&StoreKey::new("a/0").unwrap()).unwrap().is_none());

    store.failing.store(false, Ordering::SeqCst);
    assert_eq!(array.read_region::<u8>(&[2], &[4]).unwrap(), vec![3, 4, 0, 0]);
    array.flush().unwrap();
    assert_eq!(
        store.store.get(&StoreKey::new("a/0").unwrap()).unwrap(),
        Some(vec![1, 2, 3, 4])
    );
}

#[test]
fn array_codec_failure() {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let x = root.create_dimension("x", 8, None, None).unwrap();
        root.create_array(
            "a",
            ArrayBuilder::new(vec![x], NumericType::UInt8.into())
                .block_shape(vec![4])
                .compressor(Some(CodecMetadata::new("gzip", serde_json::Map::new()))),
        )
        .unwrap();
    }
    set(&store, "a/1", b"not gzip");

    let root = open_root(&store, false);
    let array = root.open_array("a").unwrap();
    assert_eq!(array.read_region::<u8>(&[0], &[4]).unwrap(), vec![0; 4]);
    match array.read_region::<u8>(&[4], &[4]) {
        Err(ArrayError::CodecFailure { stage, key, .. }) => {
            assert_eq!(stage, "gzip");
            assert_eq!(key, Some(StoreKey::new("a/1").unwrap()));
        }
        result => panic!("expected a codec failure, got {result:?}"),
    }
}

#[test]
fn array_resize() {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let y = root.create_dimension("y", 3, None, None).unwrap();
        let x = root.create_dimension("x", 5, None, None).unwrap();
        let array = root
            .create_array(
                "a",
                ArrayBuilder::new(vec![y, x.clone()], NumericType::Int16.into())
                    .block_shape(vec![2, 4])
                    .fill_value(-1),
            )
            .unwrap();
        let elements: Vec<i16> = (0..15).collect();
        array.write_region(&[0, 0], &[3, 5], &elements).unwrap();

        array.resize(&[4, 7]).unwrap();
        assert_eq!(array.shape(), vec![4, 7]);
        assert_eq!(x.size(), 7);
        assert_eq!(
            array.read_region::<i16>(&[2, 3], &[2, 4]).unwrap(),
            vec![13, 14, -1, -1, -1, -1, -1, -1]
        );
        array.write_region::<i16>(&[3, 6], &[1, 1], &[99]).unwrap();
    }
    assert_eq!(get_json(&store, "a/.zarray")["shape"], json!([4, 7]));

    let root = open_root(&store, false);
    let array = root.open_array("a").unwrap();
    assert_eq!(array.shape(), vec![4, 7]);
    assert_eq!(array.read_region::<i16>(&[2, 4], &[2, 3]).unwrap(), vec![14, -1, -1, -1, -1, 99]);
}

#[test]
fn array_resize_rejected() {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let x = root.create_dimension("x", 4, None, None).unwrap();
        let square = root
            .create_array(
                "square",
                &ArrayBuilder::new(vec![x.clone(), x.clone()], NumericType::UInt8.into()),
            )
            .unwrap();
        assert!(matches!(
            square.resize(&[2, 4]),
            Err(ArrayError::InvalidRegion(_))
        ));
        assert!(matches!(
            square.resize(&[6, 8]),
            Err(ArrayError::InvalidRegion(_))
        ));
        assert!(matches!(square.resize(&[6]), Err(ArrayError::InvalidRegion(_))));
        square.resize(&[6, 6]).unwrap();
        assert_eq!(x.size(), 6);
        assert_eq!(square.shape(), vec![6, 6]);
    }

    let root = open_root(&store, false);
    let square = root.open_array("square").unwrap();
    assert_eq!(square.shape(), vec![6, 6]);
    assert!(matches!(
        square.resize(&[8, 8]),
        Err(ArrayError::NotWritable)
    ));
}

#[test]
fn array_delta_filter() {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let x = root.create_dimension("x", 16, None, None).unwrap();
        let array = root
            .create_array(
                "a",
                ArrayBuilder::new(vec![x], NumericType::Int32.into())
                    .block_shape(vec![8])
                    .filters(vec![CodecMetadata::new("delta", serde_json::Map::new())]),
            )
            .unwrap();
        let elements: Vec<i32> = (0..16).map(|i| 100 + 3 * i).collect();
        array.write_region(&[0], &[16], &elements).unwrap();
    }
    assert_eq!(
        get_json(&store, "a/.zarray")["filters"],
        json!([{"id": "delta", "dtype": "<i4"}])
    );
    let chunk = get(&store, "a/1").unwrap();
    assert_eq!(chunk[..4], 124i32.to_le_bytes());
    assert_eq!(chunk[4..8], 3i32.to_le_bytes());

    let root = open_root(&store, false);
    let array = root.open_array("a").unwrap();
    assert_eq!(array.read_region::<i32>(&[6], &[4]).unwrap(), vec![118, 121, 124, 127]);
}

#[cfg(feature = "blosc")]
#[test]
fn array_blosc_compressor() {
    let store = Arc::new(MemoryStore::new());
    {
        let root = create_root(&store);
        let y = root.create_dimension("y", 32, None, None).unwrap();
        let x = root.create_dimension("x", 32, None, None).unwrap();
        let configuration = json!({"cname": "lz4", "clevel": 5, "shuffle": 1, "blocksize": 0});
        let array = root
            .create_array(
                "a",
                ArrayBuilder::new(vec![y, x], NumericType::Float32.into())
                    .block_shape(vec![16, 32])
                    .compressor(Some(CodecMetadata::new(
                        "blosc",
                        configuration.as_object().unwrap().clone(),
                    ))),
            )
            .unwrap();
        let elements: Vec<f32> = (0..1024u16).map(f32::from).collect();
        array.write_region(&[0, 0], &[32, 32], &elements).unwrap();
    }
    assert_eq!(
        get_json(&store, "a/.zarray")["compressor"],
        json!({"id": "blosc", "cname": "lz4", "clevel": 5, "shuffle": 1, "blocksize": 0})
    );
    assert!(get(&store, "a/1.0").unwrap().len() < 16 * 32 * 4);

    let root = open_root(&store, false);
    let array = root.open_array("a").unwrap();
    assert_eq!(
        array.read_region::<f32>(&[20, 30], &[1, 2]).unwrap(),
        vec![670.0, 671.0]
    );
}
