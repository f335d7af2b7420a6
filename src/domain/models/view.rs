use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::domain::models::{FileObject, FolderDescriptor, ObjectFilter, SortField, SortOrder};
use crate::domain::value_objects::{BucketId, FolderPath, ObjectId};

/// Immutable projection of one bucket folder.
///
/// `filter`, `search` and `sort_by` never mutate the receiver; they return a new view, so a
/// listing can be re-derived from the same source any number of times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectView {
    pub bucket: BucketId,
    pub folder: FolderPath,
    pub folders: Vec<FolderDescriptor>,
    pub files: Vec<FileObject>,
}

/// One page of files from a view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl ObjectView {
    pub fn new(
        bucket: BucketId,
        folder: FolderPath,
        folders: Vec<FolderDescriptor>,
        files: Vec<FileObject>,
    ) -> Self {
        Self {
            bucket,
            folder,
            folders,
            files,
        }
    }

    pub fn filter(&self, filter: &ObjectFilter) -> ObjectView {
        if filter.is_empty() {
            return self.clone();
        }
        ObjectView {
            bucket: self.bucket.clone(),
            folder: self.folder.clone(),
            folders: self
                .folders
                .iter()
                .filter(|f| filter.matches_folder(f))
                .cloned()
                .collect(),
            files: self
                .files
                .iter()
                .filter(|o| filter.matches(o))
                .cloned()
                .collect(),
        }
    }

    pub fn search(&self, term: &str) -> ObjectView {
        self.filter(&ObjectFilter::new().with_search(term))
    }

    /// Sizes compare numerically on bytes; names compare case-insensitively
    pub fn sort_by(&self, field: SortField, order: SortOrder) -> ObjectView {
        let mut files = self.files.clone();
        files.sort_by(|a, b| {
            let primary = match field {
                SortField::Name => compare_names(&a.name, &b.name),
                SortField::Size => a.size_bytes.cmp(&b.size_bytes),
                SortField::Date => a.last_modified.cmp(&b.last_modified),
            };
            apply_order(primary, order)
                .then_with(|| compare_names(&a.name, &b.name))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut folders = self.folders.clone();
        folders.sort_by(|a, b| {
            let primary = match field {
                SortField::Name => compare_names(&a.name, &b.name),
                SortField::Size => a.total_size.cmp(&b.total_size),
                SortField::Date => a.last_modified.cmp(&b.last_modified),
            };
            apply_order(primary, order).then_with(|| compare_names(&a.name, &b.name))
        });

        ObjectView {
            bucket: self.bucket.clone(),
            folder: self.folder.clone(),
            folders,
            files,
        }
    }

    /// Page through the files of this view. Pages are 1-based; page 0 is treated as 1.
    pub fn page(&self, page: usize, per_page: usize) -> Page<FileObject> {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total = self.files.len();
        let total_pages = total.div_ceil(per_page);
        let items = self
            .files
            .iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect();

        Page {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }

    pub fn ids(&self) -> BTreeSet<ObjectId> {
        self.files.iter().map(|o| o.id).collect()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.files.iter().any(|o| &o.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileObject> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn apply_order(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::parse_size_label;
    use crate::domain::value_objects::TypeFamilyId;
    use chrono::{Duration, Utc};

    fn object(name: &str, size: &str, age_days: i64) -> FileObject {
        FileObject {
            id: ObjectId::generate(),
            name: name.to_string(),
            size_bytes: parse_size_label(size).unwrap(),
            type_family: TypeFamilyId::new("document").unwrap(),
            last_modified: Utc::now() - Duration::days(age_days),
            metadata: Default::default(),
        }
    }

    fn view(files: Vec<FileObject>) -> ObjectView {
        ObjectView::new(
            BucketId::new("clinical-documents").unwrap(),
            FolderPath::root(),
            Vec::new(),
            files,
        )
    }

    fn sizes(view: &ObjectView) -> Vec<String> {
        view.iter().map(|o| o.display_size()).collect()
    }

    #[test]
    fn test_sort_by_size_normalizes_units() {
        let v = view(vec![
            object("a.pdf", "500 KB", 1),
            object("b.pdf", "2 GB", 2),
            object("c.pdf", "10 MB", 3),
        ]);

        let asc = v.sort_by(SortField::Size, SortOrder::Asc);
        assert_eq!(sizes(&asc), vec!["500 KB", "10 MB", "2 GB"]);

        let desc = v.sort_by(SortField::Size, SortOrder::Desc);
        assert_eq!(sizes(&desc), vec!["2 GB", "10 MB", "500 KB"]);
    }

    #[test]
    fn test_sort_by_date_and_name() {
        let v = view(vec![
            object("beta.pdf", "1 KB", 1),
            object("Alpha.pdf", "1 KB", 5),
            object("gamma.pdf", "1 KB", 3),
        ]);

        let by_name: Vec<_> = v
            .sort_by(SortField::Name, SortOrder::Asc)
            .iter()
            .map(|o| o.name.clone())
            .collect();
        assert_eq!(by_name, vec!["Alpha.pdf", "beta.pdf", "gamma.pdf"]);

        let newest_first: Vec<_> = v
            .sort_by(SortField::Date, SortOrder::Desc)
            .iter()
            .map(|o| o.name.clone())
            .collect();
        assert_eq!(newest_first, vec!["beta.pdf", "gamma.pdf", "Alpha.pdf"]);
    }

    #[test]
    fn test_filter_is_idempotent_and_non_mutating() {
        let v = view(vec![
            object("consent_form.pdf", "1 KB", 1),
            object("lab_results.pdf", "1 KB", 1),
        ]);
        let filter = ObjectFilter::new().with_search("consent");

        let once = v.filter(&filter);
        let twice = once.filter(&filter);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_search_without_matches_is_empty() {
        let v = view(vec![object("notes.pdf", "1 KB", 1)]);
        let result = v.search("does-not-exist");
        assert!(result.is_empty());
        assert!(result.ids().is_empty());
    }

    #[test]
    fn test_pagination() {
        let files = (0..7)
            .map(|i| object(&format!("file{}.pdf", i), "1 KB", i))
            .collect();
        let v = view(files).sort_by(SortField::Name, SortOrder::Asc);

        let first = v.page(1, 3);
        assert_eq!(first.items.len(), 3);
        assert_eq!(first.total, 7);
        assert_eq!(first.total_pages, 3);

        let last = v.page(3, 3);
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].name, "file6.pdf");

        assert!(v.page(9, 3).items.is_empty());
        assert_eq!(v.page(0, 3).page, 1);
    }
}
