/// Parse a page range string like "1,3-5" into sorted, unique 1-based page
/// numbers, validated against the document's page count.
pub fn parse_page_range(input: &str, page_count: u32) -> Result<Vec<u32>, String> {
    let mut pages = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (page_number(start, page_count)?, page_number(end, page_count)?),
            None => {
                let page = page_number(part, page_count)?;
                (page, page)
            }
        };
        if start > end {
            return Err(format!("descending page range '{part}'"));
        }
        pages.extend(start..=end);
    }

    pages.sort_unstable();
    pages.dedup();
    Ok(pages)
}

fn page_number(text: &str, page_count: u32) -> Result<u32, String> {
    let text = text.trim();
    let page: u32 = text
        .parse()
        .map_err(|_| format!("invalid page number: '{text}'"))?;
    if page == 0 {
        return Err("page 0 is invalid (pages start at 1)".to_string());
    }
    if page > page_count {
        return Err(format!(
            "page {page} exceeds document page count ({page_count})"
        ));
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page() {
        assert_eq!(parse_page_range("1", 5).unwrap(), vec![1]);
        assert_eq!(parse_page_range("3", 5).unwrap(), vec![3]);
    }

    #[test]
    fn page_range() {
        assert_eq!(parse_page_range("2-4", 5).unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn mixed() {
        assert_eq!(
            parse_page_range("1-3,7,10-12", 12).unwrap(),
            vec![1, 2, 3, 7, 10, 11, 12]
        );
    }

    #[test]
    fn page_zero_invalid() {
        let err = parse_page_range("0", 5).unwrap_err();
        assert!(err.contains("invalid"));
    }

    #[test]
    fn page_exceeds_count() {
        let err = parse_page_range("6", 5).unwrap_err();
        assert!(err.contains("exceeds"));
        assert!(parse_page_range("4-6", 5).is_err());
    }

    #[test]
    fn descending_range_rejected() {
        assert!(parse_page_range("4-2", 5).unwrap_err().contains("descending"));
    }

    #[test]
    fn duplicates_removed() {
        assert_eq!(parse_page_range("1,1,2,1-2", 5).unwrap(), vec![1, 2]);
    }

    #[test]
    fn whitespace_tolerance() {
        assert_eq!(
            parse_page_range(" 1 , 3 - 5 ", 5).unwrap(),
            vec![1, 3, 4, 5]
        );
    }

    #[test]
    fn not_a_number() {
        assert!(parse_page_range("one", 5).unwrap_err().contains("'one'"));
    }
}
