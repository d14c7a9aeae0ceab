//! Positional pairing of titles with deduplicated images.
//!
//! Titles and images come from two independent extractions and are matched
//! purely by index. When the lists differ in length the extras are dropped.

use super::dedup::ImageAsset;

/// One unit of work: a title and the image believed to hold its metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricJob {
    /// 1-based, in document order.
    pub id: usize,
    pub title: String,
    pub image: ImageAsset,
}

/// Pairs titles and images 1:1 by position, truncating to the shorter list.
pub fn pair(titles: Vec<String>, images: Vec<ImageAsset>) -> Vec<MetricJob> {
    if titles.len() != images.len() {
        tracing::warn!(
            titles = titles.len(),
            images = images.len(),
            paired = titles.len().min(images.len()),
            "Title and image counts differ; extras are dropped"
        );
    }

    titles
        .into_iter()
        .zip(images)
        .enumerate()
        .map(|(idx, (title, image))| MetricJob {
            id: idx + 1,
            title,
            image,
        })
        .collect()
}
