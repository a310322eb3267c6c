//! Table formatting utilities

use prettytable::{Cell, Row, Table};
use spiral_archive::ContainerEntry;

use super::{format_bytes, format_priority, truncate_path};

/// Create a table with bold headers
pub fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(Row::new(
        headers
            .iter()
            .map(|h| Cell::new(h).style_spec("b"))
            .collect(),
    ));
    table
}

/// Add a row of plain cells
pub fn add_table_row(table: &mut Table, cells: Vec<String>) {
    table.add_row(Row::new(cells.iter().map(|s| Cell::new(s)).collect()));
}

/// Tabulate container entries with size, offset and priority columns
pub fn entry_table<'a, I>(entries: I) -> Table
where
    I: IntoIterator<Item = &'a ContainerEntry>,
{
    let mut table = create_table(&["Entry", "Size", "Offset", "Priority"]);
    for entry in entries {
        add_table_row(
            &mut table,
            vec![
                truncate_path(&entry.name, 50),
                format_bytes(entry.size),
                format!("{:#x}", entry.offset),
                format_priority(entry.priority),
            ],
        );
    }
    table
}
