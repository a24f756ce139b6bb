use serde::{Deserialize, Serialize};

use crate::{ChosenConnection, error::Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Navigation {
    pub previous_page_id: Option<i64>,
    pub next_page_id: Option<i64>,
    pub is_first: bool,
    pub is_last: bool,
}

/// Links for pages given in reading order
pub fn compute_links(ordered_ids: &[i64]) -> Vec<(i64, Navigation)> {
    let last = ordered_ids.len().saturating_sub(1);
    ordered_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            let nav = Navigation {
                previous_page_id: idx.checked_sub(1).map(|i| ordered_ids[i]),
                next_page_id: ordered_ids.get(idx + 1).copied(),
                is_first: idx == 0,
                is_last: idx == last,
            };
            (*id, nav)
        })
        .collect()
}

#[derive(Debug, sqlx::FromRow)]
struct NavRow {
    id: i64,
    #[sqlx(flatten)]
    nav: Navigation,
}

/// Relinks all pages of the series in global page order, writes only pages
/// whose stored links differ, returns number of written pages
pub async fn relink_series(conn: &mut ChosenConnection, series_id: i64) -> Result<u64> {
    let rows = sqlx::query_as::<_, NavRow>(
        "SELECT id, previous_page_id, next_page_id, is_first, is_last FROM page \
         WHERE series_id = ? ORDER BY global_page_number IS NULL, global_page_number, id",
    )
    .bind(series_id)
    .fetch_all(&mut *conn)
    .await?;

    let ids = rows.iter().map(|r| r.id).collect::<Vec<_>>();
    let mut written = 0;
    for (row, (id, nav)) in rows.iter().zip(compute_links(&ids)) {
        if row.nav == nav {
            continue;
        }
        sqlx::query(
            "UPDATE page SET previous_page_id = ?, next_page_id = ?, is_first = ?, is_last = ? \
             WHERE id = ?",
        )
        .bind(nav.previous_page_id)
        .bind(nav.next_page_id)
        .bind(nav.is_first)
        .bind(nav.is_last)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_of_three() {
        let links = compute_links(&[10, 20, 30]);
        assert_eq!(links.len(), 3);
        assert_eq!(
            links[0].1,
            Navigation {
                previous_page_id: None,
                next_page_id: Some(20),
                is_first: true,
                is_last: false
            }
        );
        assert_eq!(links[1].1.previous_page_id, Some(10));
        assert_eq!(links[1].1.next_page_id, Some(30));
        assert!(!links[1].1.is_first && !links[1].1.is_last);
        assert!(links[2].1.is_last);
        assert_eq!(links[2].1.next_page_id, None);
    }

    #[test]
    fn test_single_and_empty() {
        let links = compute_links(&[7]);
        assert!(links[0].1.is_first && links[0].1.is_last);
        assert!(compute_links(&[]).is_empty());
    }
}
