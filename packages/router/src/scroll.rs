use spa_history::Platform;

/// Scroll to the element named by `hash`, or to `fallback` if there is no such element.
///
/// A leading `#` is ignored, so both `location.hash` style and bare ids work.
pub fn scroll_to_hash(platform: &dyn Platform, hash: &str, fallback: f64) {
    let id = hash.strip_prefix('#').unwrap_or(hash);
    if !id.is_empty() && platform.scroll_into_view(id) {
        tracing::trace!("scrolled #{id} into view");
        return;
    }
    platform.set_scroll_top(fallback);
}
