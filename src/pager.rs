//! Continuation-token pagination
//!
//! [`pages`] turns a "fetch one page given an optional token" operation into
//! a lazy stream of pages. The stream is finite (it ends after the first
//! page without a continuation token, or after the first error) and
//! restartable (calling [`pages`] again starts from the first page).
//!
//! [`collect_all`] drains that stream into a single ordered `Vec`, with an
//! optional cap on the number of pages.

use std::future::Future;

use futures::stream::{self, Stream, StreamExt};
use tracing::warn;

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page, in remote order
    pub items: Vec<T>,

    /// Token for the next page; `None` (or empty) ends the listing
    pub next_token: Option<String>,
}

enum Cursor {
    First,
    Next(String),
    Done,
}

/// Lazily request pages until the remote side stops returning a token.
///
/// `fetch` receives `None` for the first page and the previous page's token
/// afterwards. An error is yielded once and ends the stream.
///
/// # Examples
///
/// ```
/// use cwlogs_tail::pager::{pages, Page};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let all: Vec<_> = pages(|token: Option<String>| async move {
///     let page = match token.as_deref() {
///         None => Page { items: vec![1, 2], next_token: Some("b".to_string()) },
///         Some(_) => Page { items: vec![3], next_token: None },
///     };
///     Ok::<_, ()>(page)
/// })
/// .collect()
/// .await;
/// assert_eq!(all.len(), 2);
/// # }
/// ```
pub fn pages<'a, T, E, F, Fut>(fetch: F) -> impl Stream<Item = Result<Page<T>, E>> + 'a
where
    T: 'a,
    E: 'a,
    F: FnMut(Option<String>) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>, E>> + 'a,
{
    stream::unfold((fetch, Cursor::First), |(mut fetch, cursor)| async move {
        let token = match cursor {
            Cursor::First => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return None,
        };

        match fetch(token).await {
            Ok(page) => {
                let next = match page.next_token.as_deref() {
                    Some(token) if !token.is_empty() => Cursor::Next(token.to_string()),
                    _ => Cursor::Done,
                };
                Some((Ok(page), (fetch, next)))
            }
            Err(e) => Some((Err(e), (fetch, Cursor::Done))),
        }
    })
}

/// Fetch every page and concatenate the items in order.
///
/// With `max_pages` set, stops after that many pages even if the remote side
/// still returns a continuation token, and logs a warning.
///
/// # Errors
///
/// Returns the first error reported by `fetch`; items gathered before it are
/// discarded.
pub async fn collect_all<T, E, F, Fut>(fetch: F, max_pages: Option<usize>) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let stream = pages(fetch);
    futures::pin_mut!(stream);

    let mut items = Vec::new();
    let mut fetched = 0usize;

    while let Some(page) = stream.next().await {
        let page = page?;
        let has_more = page.next_token.as_deref().is_some_and(|t| !t.is_empty());
        items.extend(page.items);
        fetched += 1;

        if let Some(cap) = max_pages {
            if fetched >= cap && has_more {
                warn!(
                    max_pages = cap,
                    items = items.len(),
                    "Page limit reached, remaining pages skipped"
                );
                break;
            }
        }
    }

    Ok(items)
}
