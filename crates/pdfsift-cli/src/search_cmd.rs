use std::path::Path;

use pdfsift::{ExtractOptions, PageFailure, Pdf, PdfError, SearchOptions, SearchReport};

use crate::cli::OutputFormat;
use crate::shared::{csv_escape, open_pdf, resolve_pages};

pub fn run(
    file: &Path,
    pattern: &str,
    pages: Option<&str>,
    case_insensitive: bool,
    no_regex: bool,
    format: &OutputFormat,
    options: ExtractOptions,
) -> Result<(), i32> {
    let pdf = open_pdf(file, options)?;
    let opts = SearchOptions {
        regex: !no_regex,
        case_sensitive: !case_insensitive,
    };

    let report = match pages {
        Some(range) => {
            let pages = resolve_pages(Some(range), pdf.page_count())?;
            search_pages(&pdf, &pages, pattern, &opts)
        }
        None => search_all(&pdf, pattern, &opts),
    }
    .map_err(|e| {
        eprintln!("Error: {e}");
        1
    })?;

    for failure in &report.failures {
        eprintln!("Warning: skipped page {}: {}", failure.page, failure.error);
    }

    match format {
        OutputFormat::Text => write_text(&report),
        OutputFormat::Json => write_json(&report)?,
        OutputFormat::Csv => write_csv(&report),
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn search_all(pdf: &Pdf, pattern: &str, opts: &SearchOptions) -> Result<SearchReport, PdfError> {
    pdf.search_file_parallel(pattern, opts)
}

#[cfg(not(feature = "parallel"))]
fn search_all(pdf: &Pdf, pattern: &str, opts: &SearchOptions) -> Result<SearchReport, PdfError> {
    pdf.search_file(pattern, opts)
}

/// Like `Pdf::search_file`, restricted to the given pages.
fn search_pages(
    pdf: &Pdf,
    pages: &[u32],
    pattern: &str,
    opts: &SearchOptions,
) -> Result<SearchReport, PdfError> {
    let mut report = SearchReport::default();
    for &page in pages {
        match pdf.search_page(page, pattern, opts) {
            Ok(matches) => report.matches.extend(matches),
            Err(error @ PdfError::InvalidPattern(_)) => return Err(error),
            Err(error) if pdf.options().fail_fast => return Err(error),
            Err(error) => report.failures.push(PageFailure { page, error }),
        }
    }
    Ok(report)
}

fn write_text(report: &SearchReport) {
    println!("page\ttext\tllx\tlly\turx\tury");
    for m in &report.matches {
        println!(
            "{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}",
            m.page, m.text, m.bbox.llx, m.bbox.lly, m.bbox.urx, m.bbox.ury,
        );
    }
}

fn write_json(report: &SearchReport) -> Result<(), i32> {
    let json = serde_json::to_string(&report.matches).map_err(|e| {
        eprintln!("Error: failed to serialize matches: {e}");
        1
    })?;
    println!("{json}");
    Ok(())
}

fn write_csv(report: &SearchReport) {
    println!("page,text,llx,lly,urx,ury");
    for m in &report.matches {
        println!(
            "{},{},{:.2},{:.2},{:.2},{:.2}",
            m.page,
            csv_escape(&m.text),
            m.bbox.llx,
            m.bbox.lly,
            m.bbox.urx,
            m.bbox.ury,
        );
    }
}
