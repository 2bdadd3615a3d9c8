use std::sync::Arc;

use crate::application::dto::{FileDto, ListFilesRequest, ListFilesResponse, PageRequest};
use crate::application::errors::FileQueryError;
use crate::application::ports::DedupRepository;

pub const DEFAULT_PAGE_SIZE: u64 = 5;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Use case: List stored files with filters and page-number pagination
pub struct ListFilesUseCase {
    repository: Arc<dyn DedupRepository>,
}

impl ListFilesUseCase {
    pub fn new(repository: Arc<dyn DedupRepository>) -> Self {
        Self { repository }
    }

    /// Pages are 1-based; a page past the end is clamped to the last one
    pub async fn execute(
        &self,
        request: ListFilesRequest,
    ) -> Result<ListFilesResponse, FileQueryError> {
        let filter = request.filter;
        if let (Some(min), Some(max)) = (filter.min_size, filter.max_size) {
            if min > max {
                return Err(FileQueryError::InvalidRequest(format!(
                    "min_size ({}) is greater than max_size ({})",
                    min, max
                )));
            }
        }

        let page_size = request
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let requested_page = request.page.unwrap_or(1).max(1);

        let mut page = self
            .repository
            .list(&filter, window(requested_page, page_size))
            .await?;

        let pages = page.total.div_ceil(page_size).max(1);
        let current_page = requested_page.min(pages);
        // An empty store has nothing on the clamped page either
        if current_page != requested_page && page.total > 0 {
            page = self
                .repository
                .list(&filter, window(current_page, page_size))
                .await?;
        }

        Ok(ListFilesResponse {
            results: page.records.iter().map(FileDto::from).collect(),
            total: page.total,
            pages,
            current_page,
        })
    }
}

fn window(page: u64, page_size: u64) -> PageRequest {
    let offset = (page - 1).saturating_mul(page_size);
    PageRequest {
        limit: page_size as i64,
        offset: i64::try_from(offset).unwrap_or(i64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dto::FileFilter;
    use crate::application::ports::{MockDedupRepository, RecordPage};
    use crate::domain::entities::BlobRecord;
    use crate::domain::value_objects::StorageLocator;
    use crate::infrastructure::storage::ContentHasher;
    use mockall::predicate::*;

    fn record(label: &str) -> BlobRecord {
        BlobRecord::new(
            ContentHasher::hash_bytes(label.as_bytes()),
            label.len() as u64,
            label.to_string(),
            "application/pdf".to_string(),
            StorageLocator::new(format!("uploads/ab/{}", label)).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_list_defaults_to_first_page_of_five() {
        let mut repository = MockDedupRepository::new();
        repository
            .expect_list()
            .with(
                eq(FileFilter::default()),
                eq(PageRequest {
                    limit: 5,
                    offset: 0,
                }),
            )
            .times(1)
            .returning(|_, _| {
                Ok(RecordPage {
                    records: vec![record("a.pdf"), record("b.pdf")],
                    total: 12,
                })
            });

        let use_case = ListFilesUseCase::new(Arc::new(repository));
        let response = use_case
            .execute(ListFilesRequest::default())
            .await
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.total, 12);
        assert_eq!(response.pages, 3);
        assert_eq!(response.current_page, 1);
    }

    #[tokio::test]
    async fn test_page_past_end_is_clamped() {
        let mut repository = MockDedupRepository::new();
        repository
            .expect_list()
            .with(
                always(),
                eq(PageRequest {
                    limit: 10,
                    offset: 90,
                }),
            )
            .times(1)
            .returning(|_, _| {
                Ok(RecordPage {
                    records: vec![],
                    total: 15,
                })
            });
        repository
            .expect_list()
            .with(
                always(),
                eq(PageRequest {
                    limit: 10,
                    offset: 10,
                }),
            )
            .times(1)
            .returning(|_, _| {
                Ok(RecordPage {
                    records: (0..5).map(|i| record(&format!("{}.pdf", i))).collect(),
                    total: 15,
                })
            });

        let use_case = ListFilesUseCase::new(Arc::new(repository));
        let response = use_case
            .execute(ListFilesRequest {
                page: Some(10),
                page_size: Some(10),
                ..ListFilesRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(response.current_page, 2);
        assert_eq!(response.pages, 2);
        assert_eq!(response.results.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_store_has_one_page() {
        let mut repository = MockDedupRepository::new();
        repository
            .expect_list()
            .with(
                always(),
                eq(PageRequest {
                    limit: 5,
                    offset: 10,
                }),
            )
            .times(1)
            .returning(|_, _| Ok(RecordPage::default()));

        let use_case = ListFilesUseCase::new(Arc::new(repository));
        let response = use_case
            .execute(ListFilesRequest {
                page: Some(3),
                ..ListFilesRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(response.pages, 1);
        assert_eq!(response.current_page, 1);
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_page_size_is_capped() {
        let mut repository = MockDedupRepository::new();
        repository
            .expect_list()
            .with(
                always(),
                eq(PageRequest {
                    limit: 100,
                    offset: 0,
                }),
            )
            .times(1)
            .returning(|_, _| Ok(RecordPage::default()));

        let use_case = ListFilesUseCase::new(Arc::new(repository));
        use_case
            .execute(ListFilesRequest {
                page_size: Some(5000),
                ..ListFilesRequest::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_inverted_size_range_is_rejected() {
        let mut repository = MockDedupRepository::new();
        repository.expect_list().never();

        let use_case = ListFilesUseCase::new(Arc::new(repository));
        let err = use_case
            .execute(ListFilesRequest {
                filter: FileFilter {
                    min_size: Some(10),
                    max_size: Some(5),
                    ..FileFilter::default()
                },
                ..ListFilesRequest::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FileQueryError::InvalidRequest(_)));
    }
}
