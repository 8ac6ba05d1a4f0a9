// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use routemap_container::{
    ContainerError, OpenMode, RegionFile, RegionFileWriter, RegionSource, RegionTarget,
};
use routemap_segments::{
    IndexConfig, LoadError, OrderDefect, SegOffset, SegRange, Segment, SegmentIndex,
    SegmentIndexBuilder,
};

fn seg(fid: u32, s: u32, e: u32) -> Segment {
    Segment::new(fid, s, e).expect("valid segment")
}

fn build(nodes: &[Vec<Segment>]) -> SegmentIndexBuilder {
    let mut builder = SegmentIndexBuilder::new();
    for (node, segments) in (0u32..).zip(nodes) {
        builder.append(node, segments).expect("append");
    }
    builder
}

fn container_of(builder: &SegmentIndexBuilder) -> RegionFile {
    let mut writer = RegionFileWriter::new();
    builder.save(&mut writer).expect("save");
    RegionFile::from_bytes(&writer.finish()).expect("container")
}

fn mixed_nodes() -> Vec<Vec<Segment>> {
    vec![
        vec![seg(5, 0, 3)],
        vec![seg(5, 3, 6), seg(5, 6, 9)],
        vec![],
        vec![seg(7, 0, 2)],
    ]
}

#[test]
fn mixed_nodes_encode_and_decode() {
    let builder = build(&mixed_nodes());
    assert_eq!(
        builder.segments(),
        &[
            seg(5, 0, 3),
            seg(5, 3, 6),
            seg(5, 6, 9),
            Segment::NO_GEOMETRY,
            seg(7, 0, 2),
        ]
    );
    assert_eq!(builder.offsets(), &[SegOffset::new(1, 1)]);

    let index = SegmentIndex::open(&container_of(&builder)).expect("load");
    let range = |start, len| SegRange { start, len };
    assert_eq!(index.segments_range(0), range(0, 1));
    assert_eq!(index.segments_range(1), range(1, 2));
    assert_eq!(index.segments_range(2), range(3, 1));
    assert_eq!(index.segments_range(3), range(4, 1));
    assert_eq!(index.node_id(2), 1);
    assert_eq!(index.node_id(3), 2);

    assert_eq!(index.segments_for(1), &[seg(5, 3, 6), seg(5, 6, 9)]);
    assert!(index.segments_for(2).is_empty());
    assert_eq!(index.segments_for(3), &[seg(7, 0, 2)]);
}

#[test]
fn index_survives_disk_roundtrip_with_custom_tags() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("index.json");
    let data_path = dir.path().join("index.rmc");
    std::fs::write(
        &config_path,
        br#"{ "open_mode": "read", "segments_tag": "segs", "offsets_tag": "offs" }"#,
    )
    .expect("write config");
    let config = IndexConfig::load(&config_path).expect("config");

    let builder = build(&mixed_nodes());
    let mut writer = RegionFileWriter::new();
    builder.save_with(&mut writer, &config).expect("save");
    writer.write_to_path(&data_path).expect("write container");

    let file = config.open_container(&data_path).expect("open");
    assert!(!file.is_mapped());
    assert!(file.contains("segs") && file.contains("offs"));

    let mut index = SegmentIndex::new();
    index.load_with(&file, &config).expect("load");
    assert_eq!(index.segments(), builder.segments());
    assert_eq!(index.offset_table().entries(), builder.offsets());

    // Default tags are absent from this container.
    let err = index.load(&file).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Container(ContainerError::MissingRegion { .. })
    ));
}

#[test]
fn mapped_index_outlives_its_file_handle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mapped.rmc");
    let mut writer = RegionFileWriter::new();
    build(&mixed_nodes()).save(&mut writer).expect("save");
    writer.write_to_path(&path).expect("write");

    let index = {
        let file = RegionFile::open_with(&path, OpenMode::Mmap).expect("open");
        assert!(file.is_mapped());
        SegmentIndex::open(&file).expect("load")
    };
    assert_eq!(index.segment_count(), 5);
    assert_eq!(index.segments_for(0), &[seg(5, 0, 3)]);
}

fn container_with(segments: &[Segment], offsets: &[SegOffset]) -> RegionFile {
    let config = IndexConfig::default();
    let mut writer = RegionFileWriter::new();
    writer
        .writer_for_tag(&config.segments_tag)
        .unwrap()
        .write_all(bytemuck::cast_slice(segments))
        .unwrap();
    writer
        .writer_for_tag(&config.offsets_tag)
        .unwrap()
        .write_all(bytemuck::cast_slice(offsets))
        .unwrap();
    RegionFile::from_bytes(&writer.finish()).unwrap()
}

#[test]
fn unsorted_offsets_are_rejected() {
    let segments = vec![seg(1, 0, 1); 8];
    let file = container_with(&segments, &[SegOffset::new(2, 1), SegOffset::new(1, 2)]);
    let err = SegmentIndex::open(&file).unwrap_err();
    assert!(matches!(
        err,
        LoadError::UnsortedOffsets(OrderDefect::NodeId(1))
    ));
}

#[test]
fn offsets_past_segment_table_are_rejected() {
    // Node 1 would own slots 1..=3, but only three segments are stored.
    let segments = vec![seg(1, 0, 1); 3];
    let file = container_with(&segments, &[SegOffset::new(1, 2)]);
    let err = SegmentIndex::open(&file).unwrap_err();
    assert!(matches!(
        err,
        LoadError::OffsetsPastSegments {
            last_slot: 3,
            segment_count: 3,
        }
    ));
}

#[test]
fn ragged_segment_region_is_rejected() {
    let config = IndexConfig::default();
    let mut writer = RegionFileWriter::new();
    writer
        .writer_for_tag(&config.segments_tag)
        .unwrap()
        .write_all(&[0u8; 12])
        .unwrap();
    writer.writer_for_tag(&config.offsets_tag).unwrap().flush().unwrap();
    let file = RegionFile::from_bytes(&writer.finish()).unwrap();

    let err = SegmentIndex::open(&file).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Container(ContainerError::RecordCast { .. })
    ));
    assert!(file.map(&config.segments_tag).is_ok());
}

fn any_segment() -> impl Strategy<Value = Segment> {
    (0u32..64, 0u32..200, 1u32..50, any::<bool>()).prop_map(|(fid, lo, span, forward)| {
        let hi = lo + span;
        if forward {
            seg(fid, lo, hi)
        } else {
            seg(fid, hi, lo)
        }
    })
}

fn any_nodes() -> impl Strategy<Value = Vec<Vec<Segment>>> {
    prop::collection::vec(prop::collection::vec(any_segment(), 0..5), 0..40)
}

proptest! {
    #[test]
    fn every_node_reads_back_its_segments(nodes in any_nodes()) {
        let builder = build(&nodes);
        let index = SegmentIndex::open(&container_of(&builder)).unwrap();

        let mut expected_slot = 0;
        for (node, segments) in (0u32..).zip(&nodes) {
            prop_assert_eq!(index.segments_for(node), segments.as_slice());

            let range = index.segments_range(node);
            prop_assert_eq!(range.start, expected_slot);
            prop_assert_eq!(range.len, segments.len().max(1));
            for slot in range.as_range() {
                prop_assert_eq!(index.node_id(slot), node);
            }
            expected_slot = range.end();
        }
        prop_assert_eq!(expected_slot, index.segment_count());
        prop_assert_eq!(
            index.offset_table().len(),
            nodes.iter().filter(|segments| segments.len() > 1).count()
        );
    }

    #[test]
    fn reported_owners_contain_the_query(nodes in any_nodes(), query in any_segment()) {
        let query = if query.is_forward() {
            query
        } else {
            seg(query.feature_id(), u32::from(query.point_end()), u32::from(query.point_start()))
        };
        let index = SegmentIndex::open(&container_of(&build(&nodes))).unwrap();

        if let Ok(owners) = index.nodes_for(&query) {
            for (owner, forward) in [(owners.forward, true), (owners.reverse, false)] {
                let Some(owner) = owner else { continue };
                let (lo, hi) = (query.point_start(), query.point_end());
                let holds = index.segments_for(owner).iter().any(|stored| {
                    let (s_lo, s_hi) = stored.bounds();
                    stored.feature_id() == query.feature_id()
                        && stored.is_forward() == forward
                        && s_lo <= lo
                        && hi <= s_hi
                });
                prop_assert!(holds);
            }
        }
    }
}
