//! Category digests: one group per category and publication date.

use crate::pipeline::{CategoryGroup, Grouper, SummarizedArticle};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Groups summarized articles by (category, publication date).
///
/// Groups appear in the order their first article appears; articles keep
/// their input order inside a group.
#[derive(Debug, Clone, Default)]
pub struct CategoryGrouper {
    labels: HashMap<String, String>,
}

impl CategoryGrouper {
    /// `labels` maps category keys to display names.
    pub fn new(labels: HashMap<String, String>) -> Self {
        Self { labels }
    }

    fn label(&self, category: &str) -> String {
        self.labels
            .get(category)
            .cloned()
            .unwrap_or_else(|| category.to_string())
    }
}

impl Grouper for CategoryGrouper {
    fn group(&self, articles: &[SummarizedArticle]) -> Vec<CategoryGroup> {
        let mut groups: Vec<CategoryGroup> = Vec::new();
        let mut index: HashMap<(String, NaiveDate), usize> = HashMap::new();

        for article in articles {
            let category = &article.article().category;
            let date = article.article().date();
            let slot = *index.entry((category.clone(), date)).or_insert_with(|| {
                let category_label = self.label(category);
                groups.push(CategoryGroup {
                    category: category.clone(),
                    title: format!("{category_label} digest {date}"),
                    category_label,
                    date,
                    articles: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].articles.push(article.clone());
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{CollectedArticle, ExtractedArticle};
    use chrono::{TimeZone, Utc};

    fn summarized(url: &str, category: &str, day: u32) -> SummarizedArticle {
        let collected = CollectedArticle {
            url: url.to_string(),
            title: url.to_string(),
            source: "feed".to_string(),
            category: category.to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap()),
            feed_summary: String::new(),
            collected_at: Utc.with_ymd_and_hms(2025, 5, 20, 0, 0, 0).unwrap(),
        };
        SummarizedArticle::success(
            ExtractedArticle::success(collected, "body".to_string()),
            "summary".to_string(),
        )
    }

    #[test]
    fn test_groups_by_category_and_date_in_first_seen_order() {
        let grouper = CategoryGrouper::new(HashMap::from([(
            "tech".to_string(),
            "Technology".to_string(),
        )]));
        let groups = grouper.group(&[
            summarized("a", "tech", 6),
            summarized("b", "world", 6),
            summarized("c", "tech", 6),
            summarized("d", "tech", 7),
        ]);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].title, "Technology digest 2025-05-06");
        assert_eq!(groups[0].articles.len(), 2);
        assert_eq!(groups[0].articles[1].url(), "c");
        assert_eq!(groups[1].category_label, "world");
        assert_eq!(groups[1].title, "world digest 2025-05-06");
        assert_eq!(groups[2].date, NaiveDate::from_ymd_opt(2025, 5, 7).unwrap());
    }

    #[test]
    fn test_missing_publish_date_uses_collection_date() {
        let mut a = summarized("a", "tech", 6);
        a.extracted.article.published_at = None;
        let groups = CategoryGrouper::default().group(&[a]);
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2025, 5, 20).unwrap());
    }

    #[test]
    fn test_empty_input_gives_no_groups() {
        assert!(CategoryGrouper::default().group(&[]).is_empty());
    }
}
