/// Progress update emitted while a category is processed.
#[derive(Clone, Copy, Debug)]
pub struct ExtractionProgress<'a> {
    /// Category currently being processed.
    pub category: &'a str,
    /// Canonical files handled so far in this category.
    pub processed: usize,
    /// Canonical files in this category.
    pub total: usize,
    /// Files skipped so far in this category.
    pub skipped: usize,
}

pub(super) fn progress_tick(
    progress: &mut Option<&mut dyn FnMut(ExtractionProgress<'_>)>,
    category: &str,
    processed: usize,
    total: usize,
    skipped: usize,
) {
    if let Some(callback) = progress.as_deref_mut() {
        callback(ExtractionProgress {
            category,
            processed,
            total,
            skipped,
        });
    }
}
