// Malformed GSUB tables must produce errors, never panics.

#[allow(dead_code)]
#[path = "common.rs"]
mod common;

use common::*;
use glyphsub::binary::read::ReadScope;
use glyphsub::gdef::GDEFTable;
use glyphsub::gsub::{gsub_process, FeatureInfo, GlyphFlags, RawGlyph};
use glyphsub::layout::{LayoutTable, GSUB};
use glyphsub::tag;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FEATURES: [u32; 5] = [tag::CCMP, tag::LIGA, tag::CALT, tag::SALT, tag::RLIG];

fn sample_gsub() -> Vec<u8> {
    let chain_rule = ChainRule {
        backtrack: vec![1],
        input: vec![2],
        lookahead: vec![],
        lookup_records: vec![(1, 3)],
    };
    simple_gsub(
        vec![
            (tag::CCMP, vec![0, 1]),
            (tag::LIGA, vec![2, 3]),
            (tag::CALT, vec![4, 5, 6]),
            (tag::SALT, vec![7]),
            (tag::RLIG, vec![8, 9]),
        ],
        vec![
            lookup(
                1,
                0,
                vec![
                    single_subst_format1(coverage_format2(&[(1, 3, 0)]), 10),
                    single_subst_format2(coverage_format1(&[4, 5]), &[6, 7]),
                ],
                None,
            ),
            lookup(
                2,
                0,
                vec![multiple_subst(coverage_format1(&[11, 12]), vec![vec![1, 2], vec![]])],
                None,
            ),
            lookup(
                4,
                0x0008,
                vec![ligature_subst(
                    coverage_format1(&[1, 2]),
                    vec![vec![(20, vec![2, 3]), (21, vec![2])], vec![(22, vec![1])]],
                )],
                None,
            ),
            lookup(
                7,
                0x0010,
                vec![extension(
                    1,
                    single_subst_format2(coverage_format1(&[3]), &[30]),
                )],
                Some(0),
            ),
            lookup(
                5,
                0,
                vec![
                    context_format1(
                        coverage_format1(&[1]),
                        vec![Some(vec![(vec![2], vec![(1, 3), (0, 0)])])],
                    ),
                    context_format2(
                        coverage_format1(&[2, 3]),
                        classdef_format2(&[(1, 2, 1), (3, 5, 2)]),
                        vec![None, Some(vec![(vec![2, 2], vec![(2, 1)])])],
                    ),
                ],
                None,
            ),
            lookup(
                6,
                0,
                vec![
                    chain_context_format1(
                        coverage_format1(&[2]),
                        vec![Some(vec![chain_rule.clone()])],
                    ),
                    chain_context_format2(
                        coverage_format1(&[2]),
                        Some(classdef_format1(1, &[1, 2])),
                        classdef_format1(1, &[1, 2]),
                        None,
                        vec![None, None, Some(vec![chain_rule])],
                    ),
                ],
                None,
            ),
            lookup(
                6,
                0,
                vec![chain_context_format3(
                    vec![coverage_format1(&[1])],
                    vec![coverage_format1(&[2]), coverage_format1(&[3])],
                    vec![coverage_format2(&[(4, 6, 0)])],
                    &[(0, 1), (1, 4)],
                )],
                None,
            ),
            lookup(
                3,
                0,
                vec![alternate_subst(coverage_format1(&[1, 4]), vec![vec![40, 41], vec![42]])],
                None,
            ),
            lookup(
                8,
                0,
                vec![reverse_chain(
                    coverage_format1(&[5, 6]),
                    vec![coverage_format1(&[4])],
                    vec![coverage_format1(&[5])],
                    &[50, 60],
                )],
                None,
            ),
            lookup(
                4,
                0x0001,
                vec![ligature_subst(coverage_format1(&[4]), vec![vec![(44, vec![5])]])],
                None,
            ),
        ],
    )
}

fn sample_gdef() -> Vec<u8> {
    gdef_table(
        Some(classdef_format2(&[(1, 6, 1), (30, 31, 3)])),
        Some(classdef_format1(30, &[1, 2])),
        &[coverage_format1(&[31])],
    )
}

fn features() -> Vec<FeatureInfo> {
    let mut features = FEATURES
        .iter()
        .map(|&feature_tag| FeatureInfo::new(feature_tag))
        .collect::<Vec<_>>();
    features[3].alternate = Some(1);
    features
}

fn make_glyphs() -> Vec<RawGlyph<()>> {
    [1, 2, 3, 30, 4, 5, 6, 11, 1, 31, 2, 12, 5, 5]
        .iter()
        .enumerate()
        .map(|(char_index, &glyph_index)| RawGlyph::new(glyph_index, char_index, ()))
        .collect()
}

/// Whatever the outcome, deleted glyphs are gone and every glyph maps back to input characters.
fn assert_well_formed(glyphs: &[RawGlyph<()>], input_len: usize) {
    for glyph in glyphs {
        assert!(!glyph.flags.contains(GlyphFlags::DELETED));
        assert!(glyph
            .char_indices
            .iter()
            .all(|&char_index| char_index < input_len));
    }
}

/// Parse and apply `data`, checking the glyphs but not the result.
fn exercise(data: &[u8], gdef: &GDEFTable) {
    let gsub = match ReadScope::new(data).read::<LayoutTable<'_, GSUB>>() {
        Ok(gsub) => gsub,
        Err(_) => return,
    };
    let features = features();
    for (feature_order, right_to_left) in [(false, false), (true, true)] {
        let mut glyphs = make_glyphs();
        let input_len = glyphs.len();
        let result = gsub_process(
            &gsub,
            Some(gdef),
            None,
            tag::LATN,
            None,
            &features,
            feature_order,
            right_to_left,
            &mut glyphs,
        );
        if let Ok(count) = result {
            assert_eq!(count, glyphs.len());
        }
        assert_well_formed(&glyphs, input_len);
    }
}

#[test]
fn sample_table_applies() {
    let data = sample_gsub();
    let gdef_data = sample_gdef();
    let gdef = ReadScope::new(&gdef_data).read::<GDEFTable>().unwrap();
    let gsub = ReadScope::new(&data)
        .read::<LayoutTable<'_, GSUB>>()
        .unwrap();
    let mut glyphs = make_glyphs();
    let result = gsub_process(
        &gsub,
        Some(&gdef),
        None,
        tag::LATN,
        None,
        &features(),
        false,
        false,
        &mut glyphs,
    );
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), glyphs.len());
    assert_well_formed(&glyphs, make_glyphs().len());
}

#[test]
fn truncated_tables() {
    let data = sample_gsub();
    let gdef_data = sample_gdef();
    let gdef = ReadScope::new(&gdef_data).read::<GDEFTable>().unwrap();
    for len in 0..data.len() {
        exercise(&data[..len], &gdef);
    }
}

#[test]
fn corrupted_tables() {
    let data = sample_gsub();
    let gdef_data = sample_gdef();
    let gdef = ReadScope::new(&gdef_data).read::<GDEFTable>().unwrap();
    let mut rng = StdRng::seed_from_u64(0x6773_7562);
    for _ in 0..2000 {
        let mut corrupted = data.clone();
        for _ in 0..rng.gen_range(1..=4) {
            let index = rng.gen_range(0..corrupted.len());
            corrupted[index] = match rng.gen_range(0..4) {
                0 => 0,
                1 => 0xFF,
                2 => corrupted[index].wrapping_add(1),
                _ => rng.gen(),
            };
        }
        exercise(&corrupted, &gdef);
    }
}

#[test]
fn corrupted_gdef() {
    let data = sample_gsub();
    let gsub = ReadScope::new(&data)
        .read::<LayoutTable<'_, GSUB>>()
        .unwrap();
    let gdef_data = sample_gdef();
    let mut rng = StdRng::seed_from_u64(0x6764_6566);
    for _ in 0..500 {
        let mut corrupted = gdef_data.clone();
        let index = rng.gen_range(0..corrupted.len());
        corrupted[index] = rng.gen();
        if let Ok(gdef) = ReadScope::new(&corrupted).read::<GDEFTable>() {
            let mut glyphs = make_glyphs();
            let input_len = glyphs.len();
            let _ = gsub_process(
                &gsub,
                Some(&gdef),
                None,
                tag::LATN,
                None,
                &features(),
                false,
                false,
                &mut glyphs,
            );
            assert_well_formed(&glyphs, input_len);
        }
    }
}
