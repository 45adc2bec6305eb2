//! # CLI - wormtable Interactive Shell
//!
//! A REPL-style command-line interface over the `wormtable` facade crate.
//! Reads commands from stdin, executes them against whichever table (and
//! indexes) are currently open in this session, and prints results to
//! stdout.
//!
//! ## Commands
//!
//! ```text
//! CREATE <homedir> [row_id_size]         start a BUILDING table
//! ADDCOL <name> <type> <size> <arity>    add a column (BUILDING only)
//! APPEND <col=val> [col=val ...]         append one row (BUILDING only)
//! PUBLISH                                BUILDING -> PUBLISHED, reopen
//! OPEN <homedir>                         open a PUBLISHED table read-only
//! ROW <row_id>                           print one row
//! LEN                                    row count
//! BUILDINDEX <name-expr>                 build a named index
//! MINKEY <index> / MAXKEY <index>        print the index's min/max key
//! COUNT <index> <key...>                 print counter[key]
//! SCAN <PRIMARY|index> <cols> [start] [stop]   cursor dump
//! STATS / EXIT
//! ```
//!
//! `type` is one of `uint`/`int`/`float`/`char`; `arity` is either an
//! element count (`1`, `2`, ...) or `var1`/`var2`. `cols` in `SCAN` is a
//! comma-separated column list with no spaces. `start`/`stop` on `SCAN
//! PRIMARY` are row ids; on `SCAN <index>` they are comma-separated value
//! tuples matching a prefix of the index's columns.
//!
//! ## Configuration
//!
//! ```text
//! WORMTABLE_HOMEDIR      default homedir for CREATE/OPEN when omitted
//! WORMTABLE_ROW_ID_SIZE  default row_id_size for CREATE (default: 4)
//! ```
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use wormtable::{
    Bound, ColumnDescriptor, ColumnWidth, Cursor, Element, ElementType, Index, IndexSpec,
    RowBuffer, Table,
};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// The one table (and its built indexes) this REPL session is working with.
enum Session {
    Empty,
    Building(Table),
    Ready { table: Table, indexes: HashMap<String, Index> },
}

fn parse_element_type(s: &str) -> Result<ElementType> {
    match s.to_lowercase().as_str() {
        "uint" => Ok(ElementType::Uint),
        "int" => Ok(ElementType::Int),
        "float" => Ok(ElementType::Float),
        "char" => Ok(ElementType::Char),
        other => Err(anyhow!("unknown element type '{other}' (want uint/int/float/char)")),
    }
}

fn parse_column_width(s: &str) -> Result<ColumnWidth> {
    match s.to_lowercase().as_str() {
        "var1" => Ok(ColumnWidth::Var1),
        "var2" => Ok(ColumnWidth::Var2),
        other => other
            .parse::<u32>()
            .map(ColumnWidth::Fixed)
            .map_err(|_| anyhow!("invalid arity '{other}' (want a count or var1/var2)")),
    }
}

fn parse_element(element_type: ElementType, raw: &str) -> Result<Element> {
    Ok(match element_type {
        ElementType::Uint => Element::Uint(raw.parse().context("expected an unsigned integer")?),
        ElementType::Int => Element::Int(raw.parse().context("expected a signed integer")?),
        ElementType::Float => Element::Float(raw.parse().context("expected a float")?),
        ElementType::Char => Element::Bytes(raw.as_bytes().to_vec()),
    })
}

fn format_element(el: &Element) -> String {
    match el {
        Element::Uint(v) => v.to_string(),
        Element::Int(v) => v.to_string(),
        Element::Float(v) => v.to_string(),
        Element::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

fn format_tuple(values: &[Element]) -> String {
    values.iter().map(format_element).collect::<Vec<_>>().join(",")
}

fn format_row(table: &Table, row: &RowBuffer) -> Result<String> {
    let schema = table.schema();
    let mut parts = Vec::with_capacity(schema.columns.len());
    for (idx, col) in schema.columns.iter().enumerate() {
        let values = row.get(idx)?;
        parts.push(format!("{}={}", col.name, format_tuple(&values)));
    }
    Ok(parts.join(" "))
}

/// Parses a comma-separated tuple of values against an index's columns,
/// allowing a prefix shorter than the full column list.
fn parse_key_tuple(columns: &[ColumnDescriptor], raw: &str) -> Result<Vec<Element>> {
    let tokens: Vec<&str> = raw.split(',').collect();
    if tokens.len() > columns.len() {
        return Err(anyhow!(
            "key has {} value(s), index only has {} column(s)",
            tokens.len(),
            columns.len()
        ));
    }
    tokens
        .iter()
        .zip(columns)
        .map(|(tok, col)| parse_element(col.element_type, tok))
        .collect()
}

fn main() -> Result<()> {
    let default_homedir = env_or("WORMTABLE_HOMEDIR", "");
    let default_row_id_size = env_or("WORMTABLE_ROW_ID_SIZE", "4");

    println!("wormtable started");
    println!("Commands: CREATE | ADDCOL | APPEND | PUBLISH | OPEN | ROW | LEN");
    println!("          BUILDINDEX | MINKEY | MAXKEY | COUNT | SCAN | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let mut session = Session::Empty;
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "CREATE" => {
                    let homedir = parts.next().unwrap_or(&default_homedir);
                    if homedir.is_empty() {
                        println!("ERR usage: CREATE <homedir> [row_id_size]");
                    } else {
                        let row_id_size: Result<u8> = parts
                            .next()
                            .unwrap_or(&default_row_id_size)
                            .parse()
                            .context("row_id_size must be a byte count");
                        match row_id_size.and_then(|n| Table::create(homedir, n).map_err(Into::into)) {
                            Ok(table) => {
                                println!("OK");
                                session = Session::Building(table);
                            }
                            Err(e) => println!("ERR create failed: {e}"),
                        }
                    }
                }
                "ADDCOL" => match &mut session {
                    Session::Building(table) => {
                        let (name, ty, size, arity) =
                            (parts.next(), parts.next(), parts.next(), parts.next());
                        let result = (|| -> Result<()> {
                            let name = name.ok_or_else(|| anyhow!("missing column name"))?;
                            let element_type =
                                parse_element_type(ty.ok_or_else(|| anyhow!("missing element type"))?)?;
                            let size: u8 = size
                                .ok_or_else(|| anyhow!("missing element size"))?
                                .parse()
                                .context("element size must be a byte count")?;
                            let width =
                                parse_column_width(arity.ok_or_else(|| anyhow!("missing arity"))?)?;
                            let col = ColumnDescriptor::new(name, "", element_type, size, width)?;
                            table.add_column(col)?;
                            Ok(())
                        })();
                        match result {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR addcol failed: {e}"),
                        }
                    }
                    _ => println!("ERR ADDCOL requires a BUILDING table (see CREATE)"),
                },
                "APPEND" => match &mut session {
                    Session::Building(table) => {
                        let assignments: Vec<&str> = parts.collect();
                        let result = (|| -> Result<u64> {
                            let schema = table.schema();
                            let mut row = RowBuffer::new(schema.clone());
                            for assignment in &assignments {
                                let (name, raw) = assignment
                                    .split_once('=')
                                    .ok_or_else(|| anyhow!("expected col=val, got '{assignment}'"))?;
                                let idx = schema
                                    .column_index(name)
                                    .ok_or_else(|| anyhow!("unknown column '{name}'"))?;
                                let col = &schema.columns[idx];
                                row.set(idx, &[parse_element(col.element_type, raw)?])?;
                            }
                            Ok(table.add_row(&row)?)
                        })();
                        match result {
                            Ok(row_id) => println!("OK (row_id={row_id})"),
                            Err(e) => println!("ERR append failed: {e}"),
                        }
                    }
                    _ => println!("ERR APPEND requires a BUILDING table (see CREATE)"),
                },
                "PUBLISH" => {
                    match std::mem::replace(&mut session, Session::Empty) {
                        Session::Building(mut table) => {
                            let homedir = table.homedir().to_path_buf();
                            match table.close().map_err(Into::into).and_then(|()| {
                                Table::open(&homedir).map_err(anyhow::Error::from)
                            }) {
                                Ok(opened) => {
                                    println!("OK ({} rows)", opened.len());
                                    session = Session::Ready {
                                        table: opened,
                                        indexes: HashMap::new(),
                                    };
                                }
                                Err(e) => println!("ERR publish failed: {e}"),
                            }
                        }
                        other => {
                            session = other;
                            println!("ERR PUBLISH requires a BUILDING table (see CREATE)");
                        }
                    }
                }
                "OPEN" => {
                    let homedir = parts.next().unwrap_or(&default_homedir);
                    if homedir.is_empty() {
                        println!("ERR usage: OPEN <homedir>");
                    } else {
                        match Table::open(homedir) {
                            Ok(table) => {
                                println!("OK ({} rows)", table.len());
                                session = Session::Ready {
                                    table,
                                    indexes: HashMap::new(),
                                };
                            }
                            Err(e) => println!("ERR open failed: {e}"),
                        }
                    }
                }
                "ROW" => match &session {
                    Session::Ready { table, .. } => {
                        let result = (|| -> Result<String> {
                            let row_id: u64 = parts
                                .next()
                                .ok_or_else(|| anyhow!("usage: ROW <row_id>"))?
                                .parse()
                                .context("row_id must be an integer")?;
                            let row = table.row(row_id)?;
                            format_row(table, &row)
                        })();
                        match result {
                            Ok(line) => println!("{line}"),
                            Err(e) => println!("ERR row lookup failed: {e}"),
                        }
                    }
                    _ => println!("ERR ROW requires an open table (see OPEN)"),
                },
                "LEN" => match &session {
                    Session::Ready { table, .. } => println!("{}", table.len()),
                    _ => println!("ERR LEN requires an open table (see OPEN)"),
                },
                "BUILDINDEX" => match &mut session {
                    Session::Ready { table, indexes } => {
                        let result = (|| -> Result<(String, usize)> {
                            let expr = parts.next().ok_or_else(|| anyhow!("usage: BUILDINDEX <expr>"))?;
                            let spec = IndexSpec::parse(expr)?;
                            let name = spec.canonical_name();
                            let index = Index::build(table, spec)?;
                            let len = index.len();
                            indexes.insert(name.clone(), index);
                            Ok((name, len))
                        })();
                        match result {
                            Ok((name, len)) => println!("OK ({name}, {len} entries)"),
                            Err(e) => println!("ERR buildindex failed: {e}"),
                        }
                    }
                    _ => println!("ERR BUILDINDEX requires an open table (see OPEN)"),
                },
                cmd @ ("MINKEY" | "MAXKEY") => match &session {
                    Session::Ready { indexes, .. } => {
                        let result = (|| -> Result<Option<Vec<Element>>> {
                            let name = parts.next().ok_or_else(|| anyhow!("usage: {cmd} <index>"))?;
                            let index = indexes
                                .get(name)
                                .ok_or_else(|| anyhow!("no such index '{name}' (see BUILDINDEX)"))?;
                            Ok(if cmd == "MINKEY" { index.min_key()? } else { index.max_key()? })
                        })();
                        match result {
                            Ok(Some(key)) => println!("{}", format_tuple(&key)),
                            Ok(None) => println!("(empty)"),
                            Err(e) => println!("ERR {cmd} failed: {e}"),
                        }
                    }
                    _ => println!("ERR {cmd} requires an open table (see OPEN)"),
                },
                "COUNT" => match &session {
                    Session::Ready { indexes, .. } => {
                        let result = (|| -> Result<usize> {
                            let name = parts.next().ok_or_else(|| anyhow!("usage: COUNT <index> <key...>"))?;
                            let index = indexes
                                .get(name)
                                .ok_or_else(|| anyhow!("no such index '{name}' (see BUILDINDEX)"))?;
                            let key_raw = parts.next().ok_or_else(|| anyhow!("usage: COUNT <index> <key...>"))?;
                            let key = parse_key_tuple(index.columns(), key_raw)?;
                            Ok(index.counter().get(&key)?)
                        })();
                        match result {
                            Ok(n) => println!("{n}"),
                            Err(e) => println!("ERR count failed: {e}"),
                        }
                    }
                    _ => println!("ERR COUNT requires an open table (see OPEN)"),
                },
                "SCAN" => match &session {
                    Session::Ready { table, indexes } => {
                        let result = run_scan(table, indexes, &mut parts);
                        if let Err(e) = result {
                            println!("ERR scan failed: {e}");
                        }
                    }
                    _ => println!("ERR SCAN requires an open table (see OPEN)"),
                },
                "STATS" => match &session {
                    Session::Empty => println!("(no table open)"),
                    Session::Building(table) => {
                        println!("BUILDING {} ({} rows so far)", table.homedir().display(), table.len());
                    }
                    Session::Ready { table, indexes } => {
                        println!(
                            "OPEN-FOR-READ {} ({} rows, {} indexes: {})",
                            table.homedir().display(),
                            table.len(),
                            indexes.len(),
                            indexes.keys().cloned().collect::<Vec<_>>().join(",")
                        );
                    }
                },
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {other}");
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}

fn run_scan(
    table: &Table,
    indexes: &HashMap<String, Index>,
    parts: &mut std::str::SplitWhitespace<'_>,
) -> Result<()> {
    let source = parts.next().ok_or_else(|| {
        anyhow!("usage: SCAN <PRIMARY|index> <col1,col2,...> [start] [stop]")
    })?;
    let cols_raw = parts
        .next()
        .ok_or_else(|| anyhow!("usage: SCAN <PRIMARY|index> <col1,col2,...> [start] [stop]"))?;
    let cols: Vec<&str> = cols_raw.split(',').collect();
    let start_raw = parts.next();
    let stop_raw = parts.next();

    let mut rows_printed = 0usize;
    if source.eq_ignore_ascii_case("primary") {
        let mut builder = Cursor::over_table(table).project(&cols);
        if let Some(s) = start_raw {
            builder = builder.start(Bound::RowId(s.parse().context("start must be a row id")?));
        }
        if let Some(s) = stop_raw {
            builder = builder.stop(Bound::RowId(s.parse().context("stop must be a row id")?));
        }
        let mut cursor = builder.open()?;
        while let Some(row) = cursor.next_row()? {
            println!("{}", format_projected_row(&cols, &row));
            rows_printed += 1;
        }
    } else {
        let index = indexes
            .get(source)
            .ok_or_else(|| anyhow!("no such index '{source}' (see BUILDINDEX)"))?;
        let mut builder = Cursor::over_index(table, index).project(&cols);
        if let Some(s) = start_raw {
            builder = builder.start(Bound::Key(parse_key_tuple(index.columns(), s)?));
        }
        if let Some(s) = stop_raw {
            builder = builder.stop(Bound::Key(parse_key_tuple(index.columns(), s)?));
        }
        let mut cursor = builder.open()?;
        while let Some(row) = cursor.next_row()? {
            println!("{}", format_projected_row(&cols, &row));
            rows_printed += 1;
        }
    }
    println!("({rows_printed} rows)");
    Ok(())
}

fn format_projected_row(cols: &[&str], row: &[Vec<Element>]) -> String {
    cols.iter()
        .zip(row)
        .map(|(name, values)| format!("{name}={}", format_tuple(values)))
        .collect::<Vec<_>>()
        .join(" ")
}
