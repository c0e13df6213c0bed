#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case and failure-injection tests
//! Tests truncation, corruption, unregistered types, session misuse, and resource limits

mod common;

use common::{empty_registry, shape_registry, Circle, Node};
use graph_archive::config::{ReaderConfig, WriterConfig};
use graph_archive::{
    decode, encode, ArchiveError, ArchiveReader, ArchiveWriter, ObjectHandle, Record, Result,
    TypeRegistry,
};
use std::cell::RefCell;
use std::rc::Rc;

fn shared_pair_bytes() -> Vec<u8> {
    let registry = empty_registry();
    let shared = Rc::new(RefCell::new(String::from("x")));
    encode(&registry, &vec![shared.clone(), shared])
        .unwrap()
        .to_vec()
}

// ============================================================================
// TRUNCATION AND CORRUPTION
// ============================================================================

#[test]
fn test_every_truncation_is_detected() {
    let registry = empty_registry();
    let bytes = shared_pair_bytes();

    for cut in 1..=bytes.len() {
        let truncated = bytes[..bytes.len() - cut].to_vec();
        let err = decode::<Vec<Rc<RefCell<String>>>>(&registry, truncated).unwrap_err();
        assert!(
            matches!(err, ArchiveError::TruncatedStream { .. }),
            "cutting {cut} bytes gave {err:?}"
        );
    }
}

#[test]
fn test_empty_buffer_is_truncated() {
    let err = ArchiveReader::open(Vec::new(), empty_registry()).unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::TruncatedStream {
            offset: 0,
            needed: 12,
            available: 0
        }
    ));
}

#[test]
fn test_corrupt_reference_is_dangling() {
    let mut bytes = shared_pair_bytes();
    // sub-archive len + count, then the first body (1 + 4 + 4 + 4 + 1), then the REF
    let at = 4 + 4 + 14;
    assert_eq!(bytes[at], 0x02);
    bytes[at + 1..at + 5].copy_from_slice(&99u32.to_le_bytes());

    let err = decode::<Vec<Rc<RefCell<String>>>>(&empty_registry(), bytes).unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::DanglingReference { identity: 99, .. }
    ));
}

#[test]
fn test_inconsistent_trailer_is_malformed() {
    let mut bytes = shared_pair_bytes();
    let len = bytes.len();
    // table length no longer matches row count
    bytes[len - 12] = 3;
    let err = ArchiveReader::open(bytes, empty_registry()).unwrap_err();
    assert!(matches!(err, ArchiveError::MalformedTrailer { .. }));
}

#[test]
fn test_row_pointing_elsewhere_is_malformed() {
    let registry = empty_registry();
    let mut bytes = encode(&registry, &Rc::new(RefCell::new(String::from("ab"))))
        .unwrap()
        .to_vec();
    let len = bytes.len();
    // the single row's offset sits just before the trailer
    let row_offset = len - 12 - 4;
    bytes[row_offset..row_offset + 4].copy_from_slice(&0u32.to_le_bytes());

    let err = decode::<Rc<RefCell<String>>>(&registry, bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::MalformedTrailer { .. }));
}

#[test]
fn test_unknown_marker_is_mismatch() {
    let registry = empty_registry();
    let mut writer = ArchiveWriter::new(registry.clone());
    writer.write_u8(0x07).unwrap();
    let bytes = writer.finalize().unwrap();

    let mut reader = ArchiveReader::open(bytes, registry).unwrap();
    let err = reader.read_optional_object::<String>().unwrap_err();
    assert!(matches!(err, ArchiveError::TypeMismatch { offset: 0, .. }));
}

#[test]
fn test_null_in_required_slot_is_mismatch() {
    let registry = empty_registry();
    let mut writer = ArchiveWriter::new(registry.clone());
    writer.write_optional_object::<String>(None).unwrap();
    let bytes = writer.finalize().unwrap();

    let err = decode::<Rc<RefCell<String>>>(&registry, bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::TypeMismatch { .. }));
}

#[test]
fn test_invalid_utf8_is_mismatch() {
    let registry = empty_registry();
    let mut writer = ArchiveWriter::new(registry.clone());
    writer.write_bytes(&[0xFF, 0xFE]).unwrap();
    let bytes = writer.finalize().unwrap();

    let err = decode::<String>(&registry, bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::TypeMismatch { .. }));
}

#[test]
fn test_unread_root_bytes_are_mismatch() {
    let registry = empty_registry();
    let bytes = encode(&registry, &(1u32, 2u32)).unwrap();
    let err = decode::<u32>(&registry, bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::TypeMismatch { offset: 4, .. }));
}

#[derive(Debug, Default)]
struct Greedy(u64);

impl Record for Greedy {
    fn type_name(&self) -> &'static str {
        "test.greedy"
    }

    fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
        w.write_u64(self.0)
    }

    fn decode(&mut self, r: &mut ArchiveReader) -> Result<()> {
        // reads only half of what was written
        self.0 = r.read_u32()? as u64;
        Ok(())
    }
}

#[test]
fn test_body_with_unread_fields_is_mismatch() {
    let registry = empty_registry();
    let bytes = encode(&registry, &Rc::new(RefCell::new(Greedy(5)))).unwrap();
    let err = decode::<Rc<RefCell<Greedy>>>(&registry, bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::TypeMismatch { .. }));
}

// ============================================================================
// REGISTRY
// ============================================================================

#[test]
fn test_unregistered_tag_on_read() {
    let bytes = encode(&shape_registry(), &ObjectHandle::new(Circle { radius: 1.0 })).unwrap();
    let err = decode::<ObjectHandle>(&empty_registry(), bytes).unwrap_err();
    match err {
        ArchiveError::UnknownType { tag, offset } => {
            assert_eq!(tag, graph_archive::TypeTag::of("shape.circle"));
            assert_eq!(offset, Some(0));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unregistered_type_on_write() {
    let mut writer = ArchiveWriter::new(empty_registry());
    let err = writer
        .write_polymorphic(&ObjectHandle::new(Circle { radius: 1.0 }))
        .unwrap_err();
    assert!(matches!(err, ArchiveError::UnknownType { .. }));
}

#[test]
fn test_duplicate_registration() {
    let mut registry = TypeRegistry::new();
    registry.register::<Circle>().unwrap();
    assert!(matches!(
        registry.register::<Circle>(),
        Err(ArchiveError::DuplicateRegistration { .. })
    ));
}

// ============================================================================
// SESSION MISUSE
// ============================================================================

#[test]
fn test_finalize_twice() {
    let mut writer = ArchiveWriter::new(empty_registry());
    writer.write_u32(1).unwrap();
    writer.finalize().unwrap();
    assert!(matches!(
        writer.finalize(),
        Err(ArchiveError::FinalizedWriterReuse)
    ));
}

#[test]
fn test_every_write_after_finalize_fails() {
    let mut writer = ArchiveWriter::new(empty_registry());
    writer.finalize().unwrap();

    let text = Rc::new(RefCell::new(String::from("late")));
    assert!(matches!(
        writer.write_str("late"),
        Err(ArchiveError::FinalizedWriterReuse)
    ));
    assert!(matches!(
        writer.write_object(&text),
        Err(ArchiveError::FinalizedWriterReuse)
    ));
    assert!(matches!(
        writer.begin_sub_archive(),
        Err(ArchiveError::FinalizedWriterReuse)
    ));
}

#[derive(Default)]
struct LeavesFrameOpen;

impl Record for LeavesFrameOpen {
    fn type_name(&self) -> &'static str {
        "test.open_frame"
    }

    fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
        w.begin_sub_archive()
    }

    fn decode(&mut self, _r: &mut ArchiveReader) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_body_leaving_sub_archive_open() {
    let mut writer = ArchiveWriter::new(empty_registry());
    let err = writer
        .write_object(&Rc::new(RefCell::new(LeavesFrameOpen)))
        .unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::UnbalancedSubArchive {
            open: 1,
            expected: 0
        }
    ));
}

#[derive(Default)]
struct SwapsFrame;

impl Record for SwapsFrame {
    fn type_name(&self) -> &'static str {
        "test.swaps_frame"
    }

    // closes the enclosing frame and opens a fresh one, keeping the count level
    fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
        w.end_sub_archive()?;
        w.begin_sub_archive()
    }

    fn decode(&mut self, _r: &mut ArchiveReader) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_body_swapping_enclosing_frame() {
    let mut writer = ArchiveWriter::new(empty_registry());
    writer.begin_sub_archive().unwrap();
    writer.write_u32(5).unwrap();
    let err = writer
        .write_object(&Rc::new(RefCell::new(SwapsFrame)))
        .unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::UnbalancedSubArchive {
            open: 1,
            expected: 1
        }
    ));
}

#[derive(Default)]
struct FailsToEncode;

impl Record for FailsToEncode {
    fn type_name(&self) -> &'static str {
        "test.fails"
    }

    fn encode(&self, _w: &mut ArchiveWriter) -> Result<()> {
        Err(ArchiveError::ConfigError("refusing to encode".into()))
    }

    fn decode(&mut self, _r: &mut ArchiveReader) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_failed_body_blocks_finalize() {
    let mut writer = ArchiveWriter::new(empty_registry());
    assert!(writer
        .write_object(&Rc::new(RefCell::new(FailsToEncode)))
        .is_err());
    assert!(matches!(
        writer.finalize(),
        Err(ArchiveError::IncompleteObject { identity: 0 })
    ));
}

#[test]
fn test_sub_archive_end_without_begin_on_read() {
    let registry = empty_registry();
    let bytes = encode(&registry, &1u32).unwrap();
    let mut reader = ArchiveReader::open(bytes, registry).unwrap();
    assert!(matches!(
        reader.end_sub_archive(),
        Err(ArchiveError::UnbalancedSubArchive { .. })
    ));
}

#[test]
fn test_abandoned_writer_has_no_side_effects() {
    let registry = empty_registry();
    {
        let mut writer = ArchiveWriter::new(registry.clone());
        writer.begin_sub_archive().unwrap();
        writer.write_str("never finished").unwrap();
    }
    let bytes = encode(&registry, &7u8).unwrap();
    assert_eq!(decode::<u8>(&registry, bytes).unwrap(), 7);
}

// ============================================================================
// RESOURCE LIMITS
// ============================================================================

fn chain(length: usize) -> Rc<RefCell<Node>> {
    let mut head = Node::shared("tail");
    for i in 1..length {
        let node = Node::shared(&i.to_string());
        node.borrow_mut().next = Some(head);
        head = node;
    }
    head
}

#[test]
fn test_writer_depth_limit() {
    let config = WriterConfig {
        max_depth: 5,
        ..WriterConfig::default()
    };
    let mut writer = ArchiveWriter::with_config(empty_registry(), &config);
    let err = writer.write_object(&chain(20)).unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::DepthLimitExceeded { depth: 6, limit: 5 }
    ));
}

#[test]
fn test_reader_depth_limit() {
    let registry = empty_registry();
    let bytes = encode(&registry, &chain(20)).unwrap();
    let config = ReaderConfig {
        max_depth: 5,
        ..ReaderConfig::default()
    };
    let mut reader = ArchiveReader::open_with_config(bytes, registry, &config).unwrap();
    assert!(matches!(
        reader.read_object::<Node>(),
        Err(ArchiveError::DepthLimitExceeded { .. })
    ));
}

#[test]
fn test_writer_size_limit() {
    let config = WriterConfig {
        initial_capacity: 64,
        max_archive_size: 64,
        ..WriterConfig::default()
    };
    let mut writer = ArchiveWriter::with_config(empty_registry(), &config);
    let err = writer.write_bytes(&[0u8; 100]).unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::SizeLimitExceeded { size: 104, limit: 64 }
    ));
}

#[test]
fn test_trailer_counts_toward_size_limit() {
    let config = WriterConfig {
        initial_capacity: 16,
        max_archive_size: 16,
        ..WriterConfig::default()
    };
    let mut writer = ArchiveWriter::with_config(empty_registry(), &config);
    writer.write_u64(1).unwrap();
    assert!(matches!(
        writer.finalize(),
        Err(ArchiveError::SizeLimitExceeded { size: 20, limit: 16 })
    ));
}

#[test]
fn test_reader_size_limit() {
    let registry = empty_registry();
    let bytes = encode(&registry, &vec![0u64; 16]).unwrap();
    let config = ReaderConfig {
        max_archive_size: 32,
        ..ReaderConfig::default()
    };
    let err = ArchiveReader::open_with_config(bytes, registry, &config).unwrap_err();
    assert!(matches!(err, ArchiveError::SizeLimitExceeded { .. }));
}

#[test]
fn test_reader_text_limit() {
    let registry = empty_registry();
    let bytes = encode(&registry, &String::from("hello")).unwrap();
    let config = ReaderConfig {
        max_text_len: 4,
        ..ReaderConfig::default()
    };
    let mut reader = ArchiveReader::open_with_config(bytes, registry, &config).unwrap();
    assert!(matches!(
        reader.read_string(),
        Err(ArchiveError::SizeLimitExceeded { size: 5, limit: 4 })
    ));
}

#[test]
fn test_reader_text_limit_covers_serde_payloads() {
    let registry = empty_registry();
    let mut writer = ArchiveWriter::new(registry.clone());
    writer.write_serde(&vec![7u8; 32]).unwrap();
    let bytes = writer.finalize().unwrap();

    let config = ReaderConfig {
        max_text_len: 16,
        ..ReaderConfig::default()
    };
    let mut reader = ArchiveReader::open_with_config(bytes, registry, &config).unwrap();
    assert!(matches!(
        reader.read_serde::<Vec<u8>>(),
        Err(ArchiveError::SizeLimitExceeded { limit: 16, .. })
    ));
}

#[test]
fn test_oversized_sub_archive_length_is_truncated() {
    let registry = empty_registry();
    let mut writer = ArchiveWriter::new(registry.clone());
    // claims a 1000-byte region that is not there
    writer.write_u32(1000).unwrap();
    writer.write_u32(0).unwrap();
    let bytes = writer.finalize().unwrap();

    let err = decode::<Vec<u8>>(&registry, bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::TruncatedStream { .. }));
}
