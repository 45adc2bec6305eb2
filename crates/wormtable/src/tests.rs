use super::*;

#[test]
fn table_error_converts_into_facade_error() {
    fn fails() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let homedir = dir.path().join("t1");
        std::fs::create_dir_all(&homedir).unwrap();
        Table::create(&homedir, 4)?; // homedir already exists -> TableError::State
        Ok(())
    }
    assert!(matches!(fails().unwrap_err(), Error::Table(TableError::State(_))));
}

#[test]
fn index_error_converts_into_facade_error() {
    fn fails() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let homedir = dir.path().join("t1");
        let mut table = Table::create(&homedir, 4)?;
        table.add_column(ColumnDescriptor::new(
            "v",
            "",
            ElementType::Uint,
            4,
            ColumnWidth::Fixed(1),
        )?)?;
        Index::build(&table, IndexSpec::parse("v")?)?; // BUILDING, not OPEN-FOR-READ
        Ok(())
    }
    assert!(matches!(fails().unwrap_err(), Error::Index(IndexError::State(_))));
}
