// Builders for binary layout tables used by the tests.
//
// Every builder returns the bytes of one table. Tables are assembled by `table` from a list of
// header fields followed by child tables, with offsets to children filled in from their
// position after the header.

/// A header field of a table being assembled by `table`.
#[derive(Clone, Copy, Debug)]
pub enum Field {
    U16(u16),
    I16(i16),
    U32(u32),
    /// 16-bit offset to the child table with this index.
    Offset16(usize),
    /// A zero 16-bit offset.
    Null16,
    /// 32-bit offset to the child table with this index.
    Offset32(usize),
}

/// A contextual rule: the input glyphs or classes after the first, and the lookup records.
pub type Rule = (Vec<u16>, Vec<(u16, u16)>);

/// A chaining contextual rule. `input` excludes the first glyph or class.
#[derive(Clone, Debug, Default)]
pub struct ChainRule {
    pub backtrack: Vec<u16>,
    pub input: Vec<u16>,
    pub lookahead: Vec<u16>,
    pub lookup_records: Vec<(u16, u16)>,
}

pub fn table(fields: &[Field], children: &[Vec<u8>]) -> Vec<u8> {
    let header_len: usize = fields
        .iter()
        .map(|field| match field {
            Field::U32(_) | Field::Offset32(_) => 4,
            _ => 2,
        })
        .sum();
    let mut child_offsets = Vec::with_capacity(children.len());
    let mut offset = header_len;
    for child in children {
        child_offsets.push(offset);
        offset += child.len();
    }

    let mut data = Vec::with_capacity(offset);
    for field in fields {
        match *field {
            Field::U16(n) => data.extend_from_slice(&n.to_be_bytes()),
            Field::I16(n) => data.extend_from_slice(&n.to_be_bytes()),
            Field::U32(n) => data.extend_from_slice(&n.to_be_bytes()),
            Field::Offset16(child) => {
                let offset = u16::try_from(child_offsets[child]).expect("offset too large");
                data.extend_from_slice(&offset.to_be_bytes());
            }
            Field::Null16 => data.extend_from_slice(&[0, 0]),
            Field::Offset32(child) => {
                let offset = u32::try_from(child_offsets[child]).expect("offset too large");
                data.extend_from_slice(&offset.to_be_bytes());
            }
        }
    }
    for child in children {
        data.extend_from_slice(child);
    }
    data
}

fn u16_fields(values: &[u16]) -> impl Iterator<Item = Field> + '_ {
    values.iter().map(|&value| Field::U16(value))
}

fn count(len: usize) -> Field {
    Field::U16(u16::try_from(len).expect("count too large"))
}

fn record_fields(lookup_records: &[(u16, u16)]) -> Vec<Field> {
    lookup_records
        .iter()
        .flat_map(|&(sequence_index, lookup_index)| {
            [Field::U16(sequence_index), Field::U16(lookup_index)]
        })
        .collect()
}

/// Offsets to `len` children starting at child index `first`.
fn offsets(first: usize, len: usize) -> impl Iterator<Item = Field> {
    (first..first + len).map(Field::Offset16)
}

/// Offsets to optional children starting at child index `first`, with the present children.
fn nullable_offsets(first: usize, tables: Vec<Option<Vec<u8>>>) -> (Vec<Field>, Vec<Vec<u8>>) {
    let mut fields = Vec::with_capacity(tables.len());
    let mut children = Vec::new();
    for table in tables {
        match table {
            Some(table) => {
                fields.push(Field::Offset16(first + children.len()));
                children.push(table);
            }
            None => fields.push(Field::Null16),
        }
    }
    (fields, children)
}

pub fn coverage_format1(glyphs: &[u16]) -> Vec<u8> {
    let mut fields = vec![Field::U16(1), count(glyphs.len())];
    fields.extend(u16_fields(glyphs));
    table(&fields, &[])
}

/// Ranges of (start glyph, end glyph, start coverage index).
pub fn coverage_format2(ranges: &[(u16, u16, u16)]) -> Vec<u8> {
    let mut fields = vec![Field::U16(2), count(ranges.len())];
    for &(start, end, index) in ranges {
        fields.extend([Field::U16(start), Field::U16(end), Field::U16(index)]);
    }
    table(&fields, &[])
}

pub fn classdef_format1(start_glyph: u16, classes: &[u16]) -> Vec<u8> {
    let mut fields = vec![Field::U16(1), Field::U16(start_glyph), count(classes.len())];
    fields.extend(u16_fields(classes));
    table(&fields, &[])
}

/// Ranges of (start glyph, end glyph, class).
pub fn classdef_format2(ranges: &[(u16, u16, u16)]) -> Vec<u8> {
    let mut fields = vec![Field::U16(2), count(ranges.len())];
    for &(start, end, class) in ranges {
        fields.extend([Field::U16(start), Field::U16(end), Field::U16(class)]);
    }
    table(&fields, &[])
}

pub fn single_subst_format1(coverage: Vec<u8>, delta: i16) -> Vec<u8> {
    table(
        &[Field::U16(1), Field::Offset16(0), Field::I16(delta)],
        &[coverage],
    )
}

pub fn single_subst_format2(coverage: Vec<u8>, substitutes: &[u16]) -> Vec<u8> {
    let mut fields = vec![Field::U16(2), Field::Offset16(0), count(substitutes.len())];
    fields.extend(u16_fields(substitutes));
    table(&fields, &[coverage])
}

fn glyph_sequence(glyphs: &[u16]) -> Vec<u8> {
    let mut fields = vec![count(glyphs.len())];
    fields.extend(u16_fields(glyphs));
    table(&fields, &[])
}

fn sequence_subst(coverage: Vec<u8>, sequences: Vec<Vec<u16>>) -> Vec<u8> {
    let mut fields = vec![Field::U16(1), Field::Offset16(0), count(sequences.len())];
    fields.extend(offsets(1, sequences.len()));
    let mut children = vec![coverage];
    children.extend(sequences.iter().map(|glyphs| glyph_sequence(glyphs.as_slice())));
    table(&fields, &children)
}

pub fn multiple_subst(coverage: Vec<u8>, sequences: Vec<Vec<u16>>) -> Vec<u8> {
    sequence_subst(coverage, sequences)
}

pub fn alternate_subst(coverage: Vec<u8>, alternate_sets: Vec<Vec<u16>>) -> Vec<u8> {
    sequence_subst(coverage, alternate_sets)
}

/// One ligature set per covered glyph, each a list of (ligature glyph, following components).
pub fn ligature_subst(coverage: Vec<u8>, ligature_sets: Vec<Vec<(u16, Vec<u16>)>>) -> Vec<u8> {
    let mut fields = vec![Field::U16(1), Field::Offset16(0), count(ligature_sets.len())];
    fields.extend(offsets(1, ligature_sets.len()));
    let mut children = vec![coverage];
    for ligatures in ligature_sets {
        let mut set_fields = vec![count(ligatures.len())];
        set_fields.extend(offsets(0, ligatures.len()));
        let ligature_tables = ligatures
            .iter()
            .map(|(ligature_glyph, components)| {
                let mut fields = vec![Field::U16(*ligature_glyph), count(components.len() + 1)];
                fields.extend(u16_fields(components));
                table(&fields, &[])
            })
            .collect::<Vec<_>>();
        children.push(table(&set_fields, &ligature_tables));
    }
    table(&fields, &children)
}

fn rule_set(rules: Vec<Rule>) -> Vec<u8> {
    let mut fields = vec![count(rules.len())];
    fields.extend(offsets(0, rules.len()));
    let rule_tables = rules
        .iter()
        .map(|(input, lookup_records)| {
            let mut fields = vec![count(input.len() + 1), count(lookup_records.len())];
            fields.extend(u16_fields(input));
            fields.extend(record_fields(lookup_records));
            table(&fields, &[])
        })
        .collect::<Vec<_>>();
    table(&fields, &rule_tables)
}

pub fn context_format1(coverage: Vec<u8>, rule_sets: Vec<Option<Vec<Rule>>>) -> Vec<u8> {
    let set_count = rule_sets.len();
    let (set_fields, sets) = nullable_offsets(
        1,
        rule_sets.into_iter().map(|set| set.map(rule_set)).collect(),
    );
    let mut fields = vec![Field::U16(1), Field::Offset16(0), count(set_count)];
    fields.extend(set_fields);
    let mut children = vec![coverage];
    children.extend(sets);
    table(&fields, &children)
}

pub fn context_format2(
    coverage: Vec<u8>,
    classdef: Vec<u8>,
    class_sets: Vec<Option<Vec<Rule>>>,
) -> Vec<u8> {
    let set_count = class_sets.len();
    let (set_fields, sets) = nullable_offsets(
        2,
        class_sets.into_iter().map(|set| set.map(rule_set)).collect(),
    );
    let mut fields = vec![
        Field::U16(2),
        Field::Offset16(0),
        Field::Offset16(1),
        count(set_count),
    ];
    fields.extend(set_fields);
    let mut children = vec![coverage, classdef];
    children.extend(sets);
    table(&fields, &children)
}

/// `coverages` holds one coverage table per input glyph, including the first.
pub fn context_format3(coverages: Vec<Vec<u8>>, lookup_records: &[(u16, u16)]) -> Vec<u8> {
    let mut fields = vec![
        Field::U16(3),
        count(coverages.len()),
        count(lookup_records.len()),
    ];
    fields.extend(offsets(0, coverages.len()));
    fields.extend(record_fields(lookup_records));
    table(&fields, &coverages)
}

fn chain_rule_set(rules: Vec<ChainRule>) -> Vec<u8> {
    let mut fields = vec![count(rules.len())];
    fields.extend(offsets(0, rules.len()));
    let rule_tables = rules
        .iter()
        .map(|rule| {
            let mut fields = vec![count(rule.backtrack.len())];
            fields.extend(u16_fields(&rule.backtrack));
            fields.push(count(rule.input.len() + 1));
            fields.extend(u16_fields(&rule.input));
            fields.push(count(rule.lookahead.len()));
            fields.extend(u16_fields(&rule.lookahead));
            fields.push(count(rule.lookup_records.len()));
            fields.extend(record_fields(&rule.lookup_records));
            table(&fields, &[])
        })
        .collect::<Vec<_>>();
    table(&fields, &rule_tables)
}

pub fn chain_context_format1(coverage: Vec<u8>, rule_sets: Vec<Option<Vec<ChainRule>>>) -> Vec<u8> {
    let set_count = rule_sets.len();
    let (set_fields, sets) = nullable_offsets(
        1,
        rule_sets.into_iter().map(|set| set.map(chain_rule_set)).collect(),
    );
    let mut fields = vec![Field::U16(1), Field::Offset16(0), count(set_count)];
    fields.extend(set_fields);
    let mut children = vec![coverage];
    children.extend(sets);
    table(&fields, &children)
}

pub fn chain_context_format2(
    coverage: Vec<u8>,
    backtrack_classdef: Option<Vec<u8>>,
    input_classdef: Vec<u8>,
    lookahead_classdef: Option<Vec<u8>>,
    class_sets: Vec<Option<Vec<ChainRule>>>,
) -> Vec<u8> {
    let mut fields = vec![Field::U16(2), Field::Offset16(0)];
    let mut children = vec![coverage];
    let (classdef_fields, classdefs) = nullable_offsets(
        1,
        vec![backtrack_classdef, Some(input_classdef), lookahead_classdef],
    );
    fields.extend(classdef_fields);
    children.extend(classdefs);
    fields.push(count(class_sets.len()));
    let (set_fields, sets) = nullable_offsets(
        children.len(),
        class_sets.into_iter().map(|set| set.map(chain_rule_set)).collect(),
    );
    fields.extend(set_fields);
    children.extend(sets);
    table(&fields, &children)
}

/// `input` holds one coverage table per input glyph, including the first.
pub fn chain_context_format3(
    backtrack: Vec<Vec<u8>>,
    input: Vec<Vec<u8>>,
    lookahead: Vec<Vec<u8>>,
    lookup_records: &[(u16, u16)],
) -> Vec<u8> {
    let mut fields = vec![Field::U16(3), count(backtrack.len())];
    fields.extend(offsets(0, backtrack.len()));
    fields.push(count(input.len()));
    fields.extend(offsets(backtrack.len(), input.len()));
    fields.push(count(lookahead.len()));
    fields.extend(offsets(backtrack.len() + input.len(), lookahead.len()));
    fields.push(count(lookup_records.len()));
    fields.extend(record_fields(lookup_records));
    let children = backtrack
        .into_iter()
        .chain(input)
        .chain(lookahead)
        .collect::<Vec<_>>();
    table(&fields, &children)
}

pub fn reverse_chain(
    coverage: Vec<u8>,
    backtrack: Vec<Vec<u8>>,
    lookahead: Vec<Vec<u8>>,
    substitutes: &[u16],
) -> Vec<u8> {
    let mut fields = vec![Field::U16(1), Field::Offset16(0), count(backtrack.len())];
    fields.extend(offsets(1, backtrack.len()));
    fields.push(count(lookahead.len()));
    fields.extend(offsets(1 + backtrack.len(), lookahead.len()));
    fields.push(count(substitutes.len()));
    fields.extend(u16_fields(substitutes));
    let children = std::iter::once(coverage)
        .chain(backtrack)
        .chain(lookahead)
        .collect::<Vec<_>>();
    table(&fields, &children)
}

pub fn extension(lookup_type: u16, subtable: Vec<u8>) -> Vec<u8> {
    table(
        &[Field::U16(1), Field::U16(lookup_type), Field::Offset32(0)],
        &[subtable],
    )
}

pub fn lookup(
    lookup_type: u16,
    lookup_flag: u16,
    subtables: Vec<Vec<u8>>,
    mark_filtering_set: Option<u16>,
) -> Vec<u8> {
    let mut fields = vec![
        Field::U16(lookup_type),
        Field::U16(lookup_flag),
        count(subtables.len()),
    ];
    fields.extend(offsets(0, subtables.len()));
    fields.extend(mark_filtering_set.map(Field::U16));
    table(&fields, &subtables)
}

pub fn lookup_list(lookups: Vec<Vec<u8>>) -> Vec<u8> {
    let mut fields = vec![count(lookups.len())];
    fields.extend(offsets(0, lookups.len()));
    table(&fields, &lookups)
}

/// Features of (feature tag, lookup indices), in feature index order.
pub fn feature_list(features: Vec<(u32, Vec<u16>)>) -> Vec<u8> {
    let mut fields = vec![count(features.len())];
    let mut children = Vec::with_capacity(features.len());
    for (index, (feature_tag, lookup_indices)) in features.iter().enumerate() {
        fields.extend([Field::U32(*feature_tag), Field::Offset16(index)]);
        let mut feature_fields = vec![Field::Null16, count(lookup_indices.len())];
        feature_fields.extend(u16_fields(lookup_indices));
        children.push(table(&feature_fields, &[]));
    }
    table(&fields, &children)
}

/// A language system with no required feature.
pub fn langsys(feature_indices: &[u16]) -> Vec<u8> {
    let mut fields = vec![
        Field::Null16,
        Field::U16(0xFFFF),
        count(feature_indices.len()),
    ];
    fields.extend(u16_fields(feature_indices));
    table(&fields, &[])
}

pub fn script(default_langsys: Option<Vec<u8>>, langsys_records: Vec<(u32, Vec<u8>)>) -> Vec<u8> {
    let mut fields = Vec::new();
    let mut children = Vec::new();
    match default_langsys {
        Some(default_langsys) => {
            fields.push(Field::Offset16(0));
            children.push(default_langsys);
        }
        None => fields.push(Field::Null16),
    }
    fields.push(count(langsys_records.len()));
    for (langsys_tag, langsys) in langsys_records {
        fields.extend([Field::U32(langsys_tag), Field::Offset16(children.len())]);
        children.push(langsys);
    }
    table(&fields, &children)
}

pub fn script_list(scripts: Vec<(u32, Vec<u8>)>) -> Vec<u8> {
    let mut fields = vec![count(scripts.len())];
    let mut children = Vec::with_capacity(scripts.len());
    for (index, (script_tag, script)) in scripts.into_iter().enumerate() {
        fields.extend([Field::U32(script_tag), Field::Offset16(index)]);
        children.push(script);
    }
    table(&fields, &children)
}

pub fn gsub_table(script_list: Vec<u8>, feature_list: Vec<u8>, lookup_list: Vec<u8>) -> Vec<u8> {
    table(
        &[
            Field::U16(1),
            Field::U16(0),
            Field::Offset16(0),
            Field::Offset16(1),
            Field::Offset16(2),
        ],
        &[script_list, feature_list, lookup_list],
    )
}

/// A GSUB table with only a `DFLT` script whose default language system has every feature.
pub fn simple_gsub(features: Vec<(u32, Vec<u16>)>, lookups: Vec<Vec<u8>>) -> Vec<u8> {
    let feature_indices = (0..features.len())
        .map(|index| u16::try_from(index).expect("too many features"))
        .collect::<Vec<_>>();
    gsub_table(
        script_list(vec![(
            u32::from_be_bytes(*b"DFLT"),
            script(Some(langsys(&feature_indices)), vec![]),
        )]),
        feature_list(features),
        lookup_list(lookups),
    )
}

/// A GDEF table. Version 1.2 is written when there are mark glyph sets, otherwise 1.0.
pub fn gdef_table(
    glyph_classdef: Option<Vec<u8>>,
    mark_attach_classdef: Option<Vec<u8>>,
    mark_glyph_sets: &[Vec<u8>],
) -> Vec<u8> {
    let minor_version = if mark_glyph_sets.is_empty() { 0 } else { 2 };
    let mut fields = vec![Field::U16(1), Field::U16(minor_version)];
    let mut children = Vec::new();
    match glyph_classdef {
        Some(classdef) => {
            fields.push(Field::Offset16(children.len()));
            children.push(classdef);
        }
        None => fields.push(Field::Null16),
    }
    fields.extend([Field::Null16, Field::Null16]);
    match mark_attach_classdef {
        Some(classdef) => {
            fields.push(Field::Offset16(children.len()));
            children.push(classdef);
        }
        None => fields.push(Field::Null16),
    }
    if !mark_glyph_sets.is_empty() {
        let mut set_fields = vec![Field::U16(1), count(mark_glyph_sets.len())];
        set_fields.extend((0..mark_glyph_sets.len()).map(Field::Offset32));
        fields.push(Field::Offset16(children.len()));
        children.push(table(&set_fields, mark_glyph_sets));
    }
    table(&fields, &children)
}
