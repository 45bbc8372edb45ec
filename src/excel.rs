//! Inventory spreadsheet writer. Kept entirely in the binary crate:
//! `reorg-core` exposes [`reorg_core::inventory::InventoryWriter`] as a seam
//! precisely so this dependency never has to live in the library.

use std::path::Path;

use reorg_core::error::ReorgError;
use reorg_core::inventory::{Inventory, InventoryWriter};
use rust_xlsxwriter::{Format, Workbook};

/// Writes an [`Inventory`] to a single-sheet `.xlsx` file with a bold header
/// row and one row per document.
#[derive(Debug, Default)]
pub struct XlsxInventoryWriter;

impl InventoryWriter for XlsxInventoryWriter {
    fn write(&self, inventory: &Inventory, path: &Path) -> Result<(), ReorgError> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let sheet = workbook.add_worksheet().set_name("Inventory").map_err(xlsx_err)?;

        let headers = ["Partition", "VIN", "Category", "Filename", "Original Filename", "Status"];
        for (col, header) in headers.iter().enumerate() {
            sheet
                .write_with_format(0, col as u16, *header, &header_format)
                .map_err(xlsx_err)?;
        }

        for (index, row) in inventory.rows.iter().enumerate() {
            let r = (index + 1) as u32;
            sheet.write(r, 0, &row.partition).map_err(xlsx_err)?;
            sheet.write(r, 1, &row.vin).map_err(xlsx_err)?;
            sheet.write(r, 2, &row.category).map_err(xlsx_err)?;
            sheet.write(r, 3, &row.filename).map_err(xlsx_err)?;
            sheet
                .write(r, 4, row.original_filename.as_deref().unwrap_or(""))
                .map_err(xlsx_err)?;
            sheet.write(r, 5, &row.status).map_err(xlsx_err)?;
        }

        for col in 0..headers.len() as u16 {
            sheet.set_column_width(col, 24).map_err(xlsx_err)?;
        }

        workbook.save(path).map_err(xlsx_err)
    }
}

fn xlsx_err(err: rust_xlsxwriter::XlsxError) -> ReorgError {
    ReorgError::Io(std::io::Error::other(err.to_string()))
}
