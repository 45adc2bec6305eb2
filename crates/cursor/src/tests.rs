use super::*;
use index::{Index, IndexSpec};
use schema::{ColumnDescriptor, ColumnWidth, ElementType};
use table::Table;

/// Builds and publishes the Monty Python table from spec.md's S1 scenario.
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

fn names_from(rows: &[ProjectedRow]) -> Vec<String> {
    rows.iter()
        .map(|r| match &r[0][0] {
            Element::Bytes(b) => String::from_utf8(b.clone()).unwrap(),
            _ => unreachable!(),
        })
        .collect()
}

#[test]
fn s5_primary_cursor_row_id_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());

    let mut cursor = Cursor::over_table(&table)
        .project(&["name"])
        .start(Bound::RowId(1))
        .stop(Bound::RowId(4))
        .open()
        .unwrap();

    let mut rows = Vec::new();
    while let Some(row) = cursor.next_row().unwrap() {
        rows.push(row);
    }
    assert_eq!(
        names_from(&rows),
        vec!["Terry Gilliam", "Eric Idle", "Terry Jones"]
    );
}

#[test]
fn primary_cursor_unbounded_visits_every_row_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());

    let mut cursor = Cursor::over_table(&table).project(&["name", "born"]).open().unwrap();
    let mut count = 0;
    while cursor.next_row().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 6);
}

#[test]
fn table_cursor_rejects_key_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());
    let err = Cursor::over_table(&table)
        .project(&["name"])
        .start(Bound::Key(vec![Element::Uint(1)]))
        .open()
        .unwrap_err();
    assert!(matches!(err, CursorError::Validation(_)));
}

#[test]
fn index_cursor_yields_ascending_index_order_with_row_id_tiebreak() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());
    let index = Index::build(&table, IndexSpec::parse("born").unwrap()).unwrap();

    let mut cursor = Cursor::over_index(&table, &index)
        .project(&["name", "born"])
        .open()
        .unwrap();

    let mut rows = Vec::new();
    while let Some(row) = cursor.next_row().unwrap() {
        rows.push(row);
    }
    assert_eq!(
        names_from(&rows),
        vec![
            "John Cleese",
            "Terry Gilliam",
            "Graham Chapman",
            "Terry Jones",
            "Eric Idle",
            "Michael Palin",
        ]
    );
}

#[test]
fn index_cursor_partial_prefix_start_and_stop() {
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
    let index = Index::build(&table, IndexSpec::parse("director+producer").unwrap()).unwrap();

    // start=[7] (partial prefix, inclusive) through stop=[16] (partial
    // prefix expanded to its largest completion, so director=16's own
    // group is included and director=18's is not).
    let mut cursor = Cursor::over_index(&table, &index)
        .project(&["director", "producer"])
        .start(Bound::Key(vec![Element::Uint(7)]))
        .stop(Bound::Key(vec![Element::Uint(16)]))
        .open()
        .unwrap();

    let mut seen = Vec::new();
    while let Some(row) = cursor.next_row().unwrap() {
        let director = match row[0][0] {
            Element::Uint(v) => v,
            _ => unreachable!(),
        };
        let producer = match row[1][0] {
            Element::Uint(v) => v,
            _ => unreachable!(),
        };
        seen.push((director, producer));
    }
    assert_eq!(seen, vec![(7, 5), (16, 1)]);
}

#[test]
fn index_cursor_full_length_stop_key_is_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());
    let index = Index::build(&table, IndexSpec::parse("born").unwrap()).unwrap();

    // Single-column index: a bound tuple is always full-length, so stop
    // excludes its own value — matching it requires naming the next one.
    let mut cursor = Cursor::over_index(&table, &index)
        .project(&["born"])
        .start(Bound::Key(vec![Element::Uint(1942)]))
        .stop(Bound::Key(vec![Element::Uint(1944)]))
        .open()
        .unwrap();

    let mut borns = Vec::new();
    while let Some(row) = cursor.next_row().unwrap() {
        match row[0][0] {
            Element::Uint(v) => borns.push(v),
            _ => unreachable!(),
        }
    }
    assert_eq!(borns, vec![1942, 1943, 1943]);
}

#[test]
fn index_cursor_rejects_row_id_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());
    let index = Index::build(&table, IndexSpec::parse("born").unwrap()).unwrap();
    let err = Cursor::over_index(&table, &index)
        .project(&["born"])
        .start(Bound::RowId(0))
        .open()
        .unwrap_err();
    assert!(matches!(err, CursorError::Validation(_)));
}

#[test]
fn empty_projection_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let table = build_pythons(dir.path());
    let err = Cursor::over_table(&table).open().unwrap_err();
    assert!(matches!(err, CursorError::Validation(_)));
}
