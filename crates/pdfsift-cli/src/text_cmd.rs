use std::path::Path;

use pdfsift::ExtractOptions;

use crate::cli::TextFormat;
use crate::shared::{ProgressReporter, open_pdf, resolve_pages};

pub fn run(
    file: &Path,
    pages: Option<&str>,
    format: &TextFormat,
    options: ExtractOptions,
) -> Result<(), i32> {
    let fail_fast = options.fail_fast;
    let pdf = open_pdf(file, options)?;
    let pages = resolve_pages(pages, pdf.page_count())?;
    let progress = ProgressReporter::new(pages.len());

    for (i, &page) in pages.iter().enumerate() {
        progress.report(i + 1);

        let text = match pdf.extract_text(page) {
            Ok(text) => text,
            Err(e) if fail_fast => {
                progress.finish();
                eprintln!("Error reading page {page}: {e}");
                return Err(1);
            }
            Err(e) => {
                eprintln!("Warning: skipping page {page}: {e}");
                continue;
            }
        };

        match format {
            TextFormat::Text => {
                println!("--- Page {page} ---");
                println!("{text}");
            }
            TextFormat::Json => {
                let obj = serde_json::json!({
                    "page": page,
                    "text": text,
                });
                println!("{obj}");
            }
        }
    }

    progress.finish();
    Ok(())
}
