//! Sequential pagination over listing endpoints

use log::debug;

use crate::error::Result;
use crate::service::Page;

/// Call `fetch_page` until the service stops returning a page token
///
/// Pages are requested one after the other; the token of page N is needed
/// to request page N+1. An empty token counts as the end of the listing.
/// The first failing page aborts the whole listing.
pub fn paginate<T, F>(what: &str, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<&str>) -> Result<Page<T>>,
{
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(page_token.as_deref())?;
        pages += 1;
        items.extend(page.items);
        debug!("Fetched {} page {} ({} items so far)", what, pages, items.len());

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_follows_tokens_until_exhausted() {
        let mut seen = Vec::new();
        let items = paginate("numbers", |token| {
            seen.push(token.map(str::to_string));
            Ok(match token {
                None => Page {
                    items: vec![1, 2],
                    next_page_token: Some("a".into()),
                },
                Some("a") => Page {
                    items: vec![3],
                    next_page_token: Some("b".into()),
                },
                _ => Page::last(vec![4]),
            })
        })
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4]);
        assert_eq!(seen, vec![None, Some("a".into()), Some("b".into())]);
    }

    #[test]
    fn test_empty_token_ends_listing() {
        let mut calls = 0;
        let items = paginate("numbers", |_| {
            calls += 1;
            Ok(Page {
                items: vec![7],
                next_page_token: Some(String::new()),
            })
        })
        .unwrap();
        assert_eq!(items, vec![7]);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_page_failure_aborts() {
        let result: Result<Vec<u32>> = paginate("numbers", |token| match token {
            None => Ok(Page {
                items: vec![1],
                next_page_token: Some("next".into()),
            }),
            Some(_) => Err(Error::Network("reset".into())),
        });
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
