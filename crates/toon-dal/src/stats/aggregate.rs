use crate::{ChosenConnection, error::Result};

/// page_count, first and last global page of every chapter of the series
pub async fn update_chapter_stats(conn: &mut ChosenConnection, series_id: i64) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE chapter SET page_count = agg.page_count, \
             first_global_page = agg.first_page, last_global_page = agg.last_page \
         FROM (SELECT c.id AS chapter_id, count(p.id) AS page_count, \
                 min(p.global_page_number) AS first_page, max(p.global_page_number) AS last_page \
               FROM chapter c LEFT JOIN page p ON p.chapter_id = c.id \
               WHERE c.series_id = ? GROUP BY c.id) AS agg \
         WHERE chapter.id = agg.chapter_id \
           AND (chapter.page_count IS NOT agg.page_count \
             OR chapter.first_global_page IS NOT agg.first_page \
             OR chapter.last_global_page IS NOT agg.last_page)",
    )
    .bind(series_id)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected())
}

/// total_pages (published), total_chapters and last_published_at of the series
pub async fn update_series_stats(conn: &mut ChosenConnection, series_id: i64) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE series SET total_pages = agg.total_pages, total_chapters = agg.total_chapters, \
             last_published_at = agg.last_published_at \
         FROM (SELECT s.id AS series_id, \
                 (SELECT count(*) FROM page p WHERE p.series_id = s.id AND p.status = 'published') \
                   AS total_pages, \
                 (SELECT count(*) FROM chapter c WHERE c.series_id = s.id) AS total_chapters, \
                 (SELECT max(p.published_date) FROM page p \
                   WHERE p.series_id = s.id AND p.status = 'published') AS last_published_at \
               FROM series s WHERE s.id = ?) AS agg \
         WHERE series.id = agg.series_id \
           AND (series.total_pages IS NOT agg.total_pages \
             OR series.total_chapters IS NOT agg.total_chapters \
             OR series.last_published_at IS NOT agg.last_published_at)",
    )
    .bind(series_id)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected())
}
