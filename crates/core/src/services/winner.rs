//! Winner, trending and history queries.
//!
//! Nothing here is stored: winners are recomputed from vote counts on every
//! request.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::try_join_all;
use iftar_common::{AppError, AppResult, DayWindow};
use iftar_db::repositories::{PostRepository, PostWithVotes};
use serde::Serialize;

use crate::services::post::PostView;

/// Longest history window served.
pub const MAX_HISTORY_DAYS: u32 = 30;

/// Largest trending list served.
pub const MAX_TRENDING_LIMIT: u64 = 50;

/// Longest trending lookback, in hours.
pub const MAX_TRENDING_HOURS: i64 = 24 * 7;

/// Today's leader and when it is announced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyWinner {
    pub date: NaiveDate,
    pub winner: Option<PostView>,
    pub announcement_at: DateTime<Utc>,
    /// Whether the announcement time has passed.
    pub announced: bool,
}

/// A past day's winner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub winner: PostView,
}

/// Winner service for leaderboard queries.
#[derive(Clone)]
pub struct WinnerService {
    post_repo: PostRepository,
    announcement_hour_utc: u32,
}

impl WinnerService {
    /// Create a new winner service.
    #[must_use]
    pub const fn new(post_repo: PostRepository, announcement_hour_utc: u32) -> Self {
        Self {
            post_repo,
            announcement_hour_utc,
        }
    }

    /// The leading post of the UTC day containing `as_of`.
    ///
    /// Most votes wins; ties go to the earliest post, then the lowest ID.
    pub async fn daily_winner(&self, as_of: DateTime<Utc>) -> AppResult<Option<PostWithVotes>> {
        self.winner_of(DayWindow::containing(as_of)).await
    }

    /// The current leader together with its announcement time.
    pub async fn daily(&self, now: DateTime<Utc>) -> AppResult<DailyWinner> {
        let window = DayWindow::containing(now);
        let announcement_at = window.announcement_at(self.announcement_hour_utc);
        let winner = self.winner_of(window).await?;

        Ok(DailyWinner {
            date: window.date(),
            winner: winner.map(PostView::from),
            announcement_at,
            announced: now >= announcement_at,
        })
    }

    /// Posts from the last `hours` hours ranked by votes.
    pub async fn trending(
        &self,
        hours: i64,
        limit: u64,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PostView>> {
        if !(1..=MAX_TRENDING_HOURS).contains(&hours) {
            return Err(AppError::Validation(format!(
                "hours must be between 1 and {MAX_TRENDING_HOURS}"
            )));
        }
        if !(1..=MAX_TRENDING_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_TRENDING_LIMIT}"
            )));
        }

        let rows = self
            .post_repo
            .find_top_in_range(now - Duration::hours(hours), now, limit)
            .await?;

        Ok(rows.into_iter().map(PostView::from).collect())
    }

    /// Winners of the `days` days before `today`, most recent first.
    ///
    /// Days without posts are skipped.
    pub async fn history(&self, days: u32, today: DayWindow) -> AppResult<Vec<HistoryEntry>> {
        if !(1..=MAX_HISTORY_DAYS).contains(&days) {
            return Err(AppError::Validation(format!(
                "days must be between 1 and {MAX_HISTORY_DAYS}"
            )));
        }

        let lookups = (1..=days).map(|offset| {
            let window = today.days_before(offset);
            async move {
                self.winner_of(window).await.map(|winner| {
                    winner.map(|w| HistoryEntry {
                        date: window.date(),
                        winner: PostView::from(w),
                    })
                })
            }
        });

        Ok(try_join_all(lookups).await?.into_iter().flatten().collect())
    }

    async fn winner_of(&self, window: DayWindow) -> AppResult<Option<PostWithVotes>> {
        let mut top = self
            .post_repo
            .find_top_in_range(window.start(), window.end(), 1)
            .await?;
        Ok(top.pop())
    }
}
