use super::*;
use codec::Element;
use schema::{ColumnWidth, ElementType};
use table::Table;

/// Builds and publishes the Monty Python table from spec.md's S1 scenario:
/// `(row_id: uint(4), name: char var(1), born: uint(2))`.
fn build_pythons(dir: &std::path::Path) -> Table {
    let homedir = dir.join("pythons");
    let mut table = Table::create(&homedir, 4).unwrap();
    table
        .add_column(ColumnDescriptor::new("name", "", ElementType::Char, 1, ColumnWidth::Var1).unwrap())
        .unwrap();
    table
        .add_column(ColumnDescriptor::new("born", "", ElementType::Uint, 2, ColumnWidth::Fixed(1)).unwrap())
        .unwrap();

    let rows: &[(&str, u64)] = &[
        ("John Cleese", 1939),
        ("Terry Gilliam", 1940),
        ("Eric Idle", 1943),
        ("Terry Jones", 1942),
        ("Michael Palin", 1943),
        ("Graham Chapman", 1941),
    ];
    for (name, born) in rows {
        let mut row = row::RowBuffer::new(table.schema());
        row.set(1, &[Element::Bytes(name.as_bytes().to_vec())]).unwrap();
        row.set(2, &[Element::Uint(*born)]).unwrap();
        table.add_row(&row).unwrap();
    }
    table.close().unwrap();
    Table::open(&homedir).unwrap()
}

#[test]
fn s2_single_column_index_min_max_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());
    let spec = IndexSpec::parse("born").unwrap();
    let index = Index::build(&table, spec).unwrap();

    assert_eq!(index.min_key().unwrap(), Some(vec![Element::Uint(1939)]));
    assert_eq!(index.max_key().unwrap(), Some(vec![Element::Uint(1943)]));

    // Ascending born, ties broken by ascending row_id.
    let mut names_in_order = Vec::new();
    for (key, value) in index.reader.iter() {
        let row_id = decode_uint(value).unwrap();
        let row = table.row(row_id).unwrap();
        let name = match &row.get(1).unwrap()[0] {
            Element::Bytes(b) => String::from_utf8(b.clone()).unwrap(),
            _ => unreachable!(),
        };
        let born = decode_composite(&index.columns, key).unwrap();
        names_in_order.push((name, born[0].clone()));
    }
    assert_eq!(
        names_in_order,
        vec![
            ("John Cleese".to_string(), Element::Uint(1939)),
            ("Terry Gilliam".to_string(), Element::Uint(1940)),
            ("Graham Chapman".to_string(), Element::Uint(1941)),
            ("Terry Jones".to_string(), Element::Uint(1942)),
            ("Eric Idle".to_string(), Element::Uint(1943)),
            ("Michael Palin".to_string(), Element::Uint(1943)),
        ]
    );
}

#[test]
fn s4_binned_index_counter() {
    let dir = tempfile::tempdir().unwrap();
    let homedir = dir.path().join("quals");
    let mut table = Table::create(&homedir, 4).unwrap();
    table
        .add_column(ColumnDescriptor::new("qual", "", ElementType::Float, 8, ColumnWidth::Fixed(1)).unwrap())
        .unwrap();
    for v in [0.0, 25.1, 45.3, 50.0, 65.9] {
        let mut row = row::RowBuffer::new(table.schema());
        row.set(1, &[Element::Float(v)]).unwrap();
        table.add_row(&row).unwrap();
    }
    table.close().unwrap();
    let table = Table::open(&homedir).unwrap();

    let spec = IndexSpec::parse("qual[5]").unwrap();
    let index = Index::build(&table, spec).unwrap();
    let counter = index.counter();

    assert_eq!(counter.get(&[Element::Float(0.0)]).unwrap(), 1);
    assert_eq!(counter.get(&[Element::Float(25.0)]).unwrap(), 1);
    assert_eq!(counter.get(&[Element::Float(45.0)]).unwrap(), 1);
    assert_eq!(counter.get(&[Element::Float(50.0)]).unwrap(), 1);
    assert_eq!(counter.get(&[Element::Float(65.0)]).unwrap(), 1);
    assert_eq!(counter.get(&[Element::Float(5.0)]).unwrap(), 0);
}

#[test]
fn compound_index_prefix_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let homedir = dir.path().join("pairs");
    let mut table = Table::create(&homedir, 4).unwrap();
    table
        .add_column(ColumnDescriptor::new("director", "", ElementType::Uint, 2, ColumnWidth::Fixed(1)).unwrap())
        .unwrap();
    table
        .add_column(ColumnDescriptor::new("producer", "", ElementType::Uint, 2, ColumnWidth::Fixed(1)).unwrap())
        .unwrap();

    let pairs: &[(u64, u64)] = &[(0, 1), (0, 2), (0, 43), (7, 5), (16, 1), (18, 8)];
    for (d, p) in pairs {
        let mut row = row::RowBuffer::new(table.schema());
        row.set(1, &[Element::Uint(*d)]).unwrap();
        row.set(2, &[Element::Uint(*p)]).unwrap();
        table.add_row(&row).unwrap();
    }
    table.close().unwrap();
    let table = Table::open(&homedir).unwrap();

    let spec = IndexSpec::parse("director+producer").unwrap();
    let index = Index::build(&table, spec).unwrap();

    assert_eq!(
        index.min_key().unwrap(),
        Some(vec![Element::Uint(0), Element::Uint(1)])
    );
    assert_eq!(
        index.max_key().unwrap(),
        Some(vec![Element::Uint(18), Element::Uint(8)])
    );
    assert_eq!(
        index.min_key_with_prefix(&[Element::Uint(7)]).unwrap(),
        Some(vec![Element::Uint(7), Element::Uint(5)])
    );
    assert_eq!(
        index.max_key_with_prefix(&[Element::Uint(0)]).unwrap(),
        Some(vec![Element::Uint(0), Element::Uint(43)])
    );
}

#[test]
fn reopen_recovers_spec_from_filename() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());
    Index::build(&table, IndexSpec::parse("born").unwrap()).unwrap();

    let reopened = Index::open(&table, "born").unwrap();
    assert_eq!(reopened.min_key().unwrap(), Some(vec![Element::Uint(1939)]));
    assert_eq!(reopened.len(), 6);
}

#[test]
fn char_column_rejects_bin() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());
    let spec = IndexSpec::parse("name[5]").unwrap();
    let err = Index::build(&table, spec).unwrap_err();
    assert!(matches!(err, IndexError::Validation(_)));
}

#[test]
fn build_requires_open_for_read_table() {
    let dir = tempfile::tempdir().unwrap();
    let homedir = dir.path().join("t1");
    let mut table = Table::create(&homedir, 4).unwrap();
    table
        .add_column(ColumnDescriptor::new("v", "", ElementType::Uint, 4, ColumnWidth::Fixed(1)).unwrap())
        .unwrap();
    let err = Index::build(&table, IndexSpec::parse("v").unwrap()).unwrap_err();
    assert!(matches!(err, IndexError::State(_)));
}

#[test]
fn keys_coalesces_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());
    let index = Index::build(&table, IndexSpec::parse("born").unwrap()).unwrap();
    let keys = index.keys().unwrap();
    assert_eq!(keys.len(), 5); // 1943 appears twice, coalesced to one key
}
