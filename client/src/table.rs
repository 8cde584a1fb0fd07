use comfy_table::{presets::UTF8_HORIZONTAL_ONLY, Attribute, Cell, ContentArrangement, Table};
use kernel::StoredFile;

/// Renders one page of stored files for terminal output.
#[must_use]
pub fn render(files: &[StoredFile]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_HORIZONTAL_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Size").add_attribute(Attribute::Bold),
            Cell::new("Last modified").add_attribute(Attribute::Bold),
            Cell::new("Key").add_attribute(Attribute::Bold),
        ]);

    for file in files {
        table.add_row(vec![
            Cell::new(&file.name),
            Cell::new(file.size),
            Cell::new(file.last_modified.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&file.key),
        ]);
    }
    table
}
