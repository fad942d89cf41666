use std::str::FromStr;

use crate::client::models::reconciler::{append_page, upsert, upsert_fields, Outcome};
use crate::client::models::view_state::{FetchFuture, Resource, ViewModel};
use crate::client::services::api_client::{Page, SharedApi};
use crate::client::services::websocket_client::Channel;
use crate::common::models::Review;
use crate::common::protocol::PushEvent;
use crate::error::ClientError;

/// `None` shows every rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatingFilter(pub Option<u8>);

impl FromStr for RatingFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" | "" => Ok(RatingFilter(None)),
            n => match n.parse::<u8>() {
                Ok(r) if (1..=5).contains(&r) => Ok(RatingFilter(Some(r))),
                _ => Err(format!("rating filter must be 'all' or 1-5, got '{}'", n)),
            },
        }
    }
}

/// Reviews received by one user.
#[derive(Debug, Clone)]
pub struct ReviewsView {
    pub user_id: String,
    pub reviews: Resource<Vec<Review>>,
    pub filter: RatingFilter,
    pub page: Page,
    pub has_more: bool,
}

impl ReviewsView {
    pub fn new(user_id: impl Into<String>, limit: u32) -> Self {
        Self {
            user_id: user_id.into(),
            reviews: Resource::Loading,
            filter: RatingFilter::default(),
            page: Page::first(limit),
            has_more: false,
        }
    }

    pub fn visible(&self) -> Vec<&Review> {
        let Some(reviews) = self.reviews.ready() else {
            return Vec::new();
        };
        reviews.iter().filter(|r| self.filter.0.map_or(true, |rating| r.rating == rating)).collect()
    }

    pub fn average(&self) -> Option<f64> {
        let reviews = self.reviews.ready().filter(|r| !r.is_empty())?;
        let total: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
        Some(f64::from(total) / reviews.len() as f64)
    }

    pub fn load_more(&mut self) -> bool {
        if !self.has_more || self.reviews.ready().is_none() {
            return false;
        }
        self.page.page += 1;
        true
    }

    /// Shows a review the user just wrote.
    pub fn prepend(&mut self, review: Review) -> Outcome {
        match self.reviews.ready_mut() {
            Some(reviews) => upsert(reviews, review),
            None => Outcome::Ignored,
        }
    }
}

impl ViewModel for ReviewsView {
    type Payload = (Page, Vec<Review>);

    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Self::Payload>> {
        let user_id = self.user_id.clone();
        let page = self.page;
        Some(Box::pin(async move { api.list_reviews(&user_id, page).await.map(|items| (page, items)) }))
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::Reviews)
    }

    fn begin_fetch(&mut self) {
        if self.page.page <= 1 {
            self.reviews = Resource::Loading;
        }
    }

    fn apply_fetch(&mut self, result: Result<Self::Payload, ClientError>) {
        match result {
            Ok((page, items)) => {
                self.has_more = page.limit > 0 && items.len() as u32 >= page.limit;
                if page.page > 1 {
                    if let Some(reviews) = self.reviews.ready_mut() {
                        append_page(reviews, items);
                        return;
                    }
                }
                self.reviews = Resource::Ready(items);
            }
            Err(e) => self.reviews = Resource::Failed(e.describe("fetch reviews")),
        }
    }

    fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError> {
        match (event, self.reviews.ready_mut()) {
            (PushEvent::Replace(fields), Some(reviews)) => upsert_fields(reviews, &fields),
            _ => Ok(Outcome::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn review(id: &str, rating: u8) -> Review {
        Review { id: id.into(), contract_id: "c1".into(), rating, comment: None }
    }

    #[test]
    fn rating_filter_and_average() {
        let mut view = ReviewsView::new("u1", 10);
        view.apply_fetch(Ok((Page::first(10), vec![review("r1", 5), review("r2", 3), review("r3", 5)])));
        view.filter = "5".parse().unwrap();
        assert_eq!(view.visible().len(), 2);
        assert!((view.average().unwrap() - 13.0 / 3.0).abs() < 1e-9);
        assert!("9".parse::<RatingFilter>().is_err());
    }

    #[test]
    fn pushed_review_is_prepended() {
        let mut view = ReviewsView::new("u1", 10);
        view.apply_fetch(Ok((Page::first(10), vec![review("r1", 4)])));
        let Some(fields) = json!({"id": "r2", "contractId": "c2", "rating": 2}).as_object().cloned() else { panic!() };
        assert_eq!(view.apply_event(PushEvent::Replace(fields)).unwrap(), Outcome::Inserted);
        assert_eq!(view.reviews.ready().unwrap()[0].id, "r2");
    }

    #[test]
    fn second_page_appends() {
        let mut view = ReviewsView::new("u1", 1);
        view.apply_fetch(Ok((Page::first(1), vec![review("r1", 4)])));
        assert!(view.load_more());
        view.apply_fetch(Ok((view.page, vec![])));
        assert!(!view.has_more);
        assert_eq!(view.reviews.ready().map(Vec::len), Some(1));
    }
}
