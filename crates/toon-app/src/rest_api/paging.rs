use crate::error::{ApiError, ApiResult};
use garde::Validate;
use serde::Serialize;
use toon_dal::{Batch, ListingParams, Order};

#[derive(Debug, Clone, Default, Validate, serde::Deserialize)]
#[garde(allow_unvalidated)]
pub struct Paging {
    #[garde(range(min = 1))]
    page: Option<u32>,
    #[garde(range(min = 1, max = 1000))]
    page_size: Option<u32>,
    #[garde(length(max = 255))]
    sort: Option<String>,
}

fn parse_ordering(orderings: &str) -> ApiResult<Vec<Order>> {
    orderings
        .split(',')
        .map(|name| {
            let order = match name.trim() {
                "" => return Err(ApiError::InvalidQuery("Empty ordering name".to_string())),
                name if name.len() > 100 => {
                    return Err(ApiError::InvalidQuery("Ordering name too long".to_string()));
                }
                name if name.starts_with('-') => Order::Desc(name[1..].to_string()),
                name if name.starts_with('+') => Order::Asc(name[1..].to_string()),
                name => Order::Asc(name.to_string()),
            };
            Ok(order)
        })
        .collect()
}

impl Paging {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            sort: None,
        }
    }

    pub fn into_listing_params(self, default_page_size: u32) -> ApiResult<ListingParams> {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size(default_page_size);
        let offset = (page as i64 - 1) * page_size as i64;
        let params = ListingParams::new(offset, page_size.into());
        Ok(match self.sort {
            Some(sort) => params.with_order(parse_ordering(&sort)?),
            None => params,
        })
    }

    pub fn page_size(&self, default_page_size: u32) -> u32 {
        self.page_size.unwrap_or(default_page_size).max(1)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    page: u32,
    page_size: u32,
    total_pages: u32,
    total: u64,
    rows: Vec<T>,
}

impl<T> Page<T>
where
    T: Serialize,
{
    pub fn from_batch(batch: Batch<T>, page_size: u32) -> ApiResult<Self> {
        let too_big = |_| ApiError::InvalidQuery("Page out of range".to_string());
        let page = u32::try_from(batch.offset / page_size as i64).map_err(too_big)? + 1;
        let total_pages =
            u32::try_from(batch.total.div_ceil(page_size as u64)).map_err(too_big)?;
        Ok(Self {
            page,
            page_size,
            total_pages,
            total: batch.total,
            rows: batch.rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_params() {
        let paging = Paging {
            page: Some(3),
            page_size: Some(20),
            sort: Some("-title, id".to_string()),
        };
        let params = paging.into_listing_params(100).unwrap();
        assert_eq!(params.offset, 40);
        assert_eq!(params.limit, 20);
        assert_eq!(
            params.ordering(&["id", "title"]).unwrap(),
            "ORDER BY title DESC, id"
        );

        let bad = Paging {
            sort: Some("title,,id".to_string()),
            ..Default::default()
        };
        assert!(bad.into_listing_params(100).is_err());
    }

    #[test]
    fn test_page_from_batch() {
        let batch = Batch {
            offset: 50,
            limit: 25,
            total: 101,
            rows: vec![1, 2, 3],
        };
        let page = Page::from_batch(batch, 25).unwrap();
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 5);
        assert_eq!(page.total, 101);
    }
}
