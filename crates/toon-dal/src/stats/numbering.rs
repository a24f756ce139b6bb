use tracing::debug;

use crate::{ChosenConnection, error::Result};

/// Next free chapter page number: max among siblings + 1.
/// Siblings are pages of the same chapter, or chapterless pages of the series.
///
/// Reads without locking, two callers can get the same number.
pub async fn next_chapter_page_number(
    conn: &mut ChosenConnection,
    series_id: i64,
    chapter_id: Option<i64>,
) -> Result<i64> {
    let next: i64 = match chapter_id {
        Some(chapter_id) => {
            sqlx::query_scalar(
                "SELECT COALESCE(MAX(chapter_page_number), 0) + 1 FROM page WHERE chapter_id = ?",
            )
            .bind(chapter_id)
            .fetch_one(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT COALESCE(MAX(chapter_page_number), 0) + 1 FROM page \
                 WHERE series_id = ? AND chapter_id IS NULL",
            )
            .bind(series_id)
            .fetch_one(&mut *conn)
            .await?
        }
    };
    Ok(next)
}

/// Frees `position` for a page placed explicitly: siblings at or after it move one down.
/// The placed page itself is excluded, so it can be an already stored page.
pub async fn open_position(
    conn: &mut ChosenConnection,
    series_id: i64,
    chapter_id: Option<i64>,
    position: i64,
    page_id: Option<i64>,
) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE page SET chapter_page_number = chapter_page_number + 1 \
         WHERE series_id = ? AND chapter_id IS ? AND chapter_page_number >= ? AND id IS NOT ?",
    )
    .bind(series_id)
    .bind(chapter_id)
    .bind(position)
    .bind(page_id)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected())
}

/// Makes chapter page numbers contiguous from 1, keeping current relative order
pub async fn compact_chapter(
    conn: &mut ChosenConnection,
    series_id: i64,
    chapter_id: Option<i64>,
) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE page SET chapter_page_number = ranked.n \
         FROM (SELECT id, row_number() OVER (ORDER BY chapter_page_number, id) AS n FROM page \
               WHERE series_id = ? AND chapter_id IS ?) AS ranked \
         WHERE page.id = ranked.id AND page.chapter_page_number != ranked.n",
    )
    .bind(series_id)
    .bind(chapter_id)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected())
}

/// Assigns chapter page numbers from the given order of page ids (1 based),
/// pages of the chapter not listed follow in their previous relative order.
/// Ids must be already validated as members of the chapter.
pub async fn apply_page_order(
    conn: &mut ChosenConnection,
    chapter_id: i64,
    ordered_ids: &[i64],
) -> Result<u64> {
    let mut rest: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM page WHERE chapter_id = ? ORDER BY chapter_page_number, id",
    )
    .bind(chapter_id)
    .fetch_all(&mut *conn)
    .await?;
    rest.retain(|id| !ordered_ids.contains(id));

    let mut changed = 0;
    for (idx, page_id) in ordered_ids.iter().chain(rest.iter()).enumerate() {
        changed += sqlx::query(
            "UPDATE page SET chapter_page_number = ?, modified = CURRENT_TIMESTAMP \
             WHERE id = ? AND chapter_page_number != ?",
        )
        .bind(idx as i64 + 1)
        .bind(page_id)
        .bind(idx as i64 + 1)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    debug!("Reordered chapter {chapter_id}, {changed} pages changed");
    Ok(changed)
}

/// Recomputes series wide page numbers, chapters by order, pages by chapter page number
/// (ties by id), chapterless pages come last. Only changed rows are written.
pub async fn renumber_series(conn: &mut ChosenConnection, series_id: i64) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE page SET global_page_number = ranked.n \
         FROM (SELECT p.id, row_number() OVER \
                 (ORDER BY (c.id IS NULL), c.chapter_order, c.id, p.chapter_page_number, p.id) AS n \
               FROM page p LEFT JOIN chapter c ON c.id = p.chapter_id \
               WHERE p.series_id = ?) AS ranked \
         WHERE page.id = ranked.id AND page.global_page_number IS NOT ranked.n",
    )
    .bind(series_id)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected())
}
