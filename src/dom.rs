use crate::browser::{Browser, Query};
use crate::error::BrowserResult;
use crate::types::{PAGE_PREVIEW_MAX_CHARS, PageSnapshot};

/// Capture title, URL and a bounded body-text preview of the current page.
///
/// The preview is capped so later prompts stay small.
pub fn capture_snapshot<B: Browser>(browser: &B) -> BrowserResult<PageSnapshot> {
    let title = browser.title()?;
    let url = browser.url()?;
    let body = match browser.find(&Query::Css("body".into()))? {
        Some(body) => browser.visible_text(&body)?,
        None => String::new(),
    };

    Ok(PageSnapshot {
        title,
        url,
        preview: truncate_chars(&body, PAGE_PREVIEW_MAX_CHARS),
    })
}

/// First `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
