use {
    crate::{money::Amount, role::{RoleId, UserId}},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

pub type AuctionId = i64;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Open,
    Closed,
    Cancelled,
}

impl AuctionStatus {
    /// CLOSED and CANCELLED are terminal: no transition ever leaves them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// Where a point in time falls relative to an auction's bidding window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Window {
    NotStarted,
    Within,
    Ended,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub min_price_cents: Amount,
    pub buy_now_price_cents: Option<Amount>,
    pub status: AuctionStatus,
    pub seller_role_id: RoleId,
    pub seller_user_id: UserId,
    pub category: Option<String>,
}

impl Auction {
    pub fn is_buy_now_enabled(&self) -> bool {
        self.buy_now_price_cents.is_some()
    }

    /// The window is closed at both ends, matching the checks the bid and
    /// buy now paths perform.
    pub fn window(&self, now: DateTime<Utc>) -> Window {
        if now < self.start_date {
            Window::NotStarted
        } else if now > self.end_date {
            Window::Ended
        } else {
            Window::Within
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone};

    fn auction(start: DateTime<Utc>, end: DateTime<Utc>) -> Auction {
        Auction {
            id: 1,
            title: "vintage camera".to_string(),
            start_date: start,
            end_date: end,
            min_price_cents: Amount(1000),
            buy_now_price_cents: None,
            status: AuctionStatus::Open,
            seller_role_id: 7,
            seller_user_id: 3,
            category: None,
        }
    }

    #[test]
    fn window_is_closed_at_both_ends() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 8, 12, 0, 0).unwrap();
        let auction = auction(start, end);

        assert_eq!(auction.window(start - chrono::TimeDelta::seconds(1)), Window::NotStarted);
        assert_eq!(auction.window(start), Window::Within);
        assert_eq!(auction.window(end), Window::Within);
        assert_eq!(auction.window(end + chrono::TimeDelta::seconds(1)), Window::Ended);
    }

    #[test]
    fn status_serializes_as_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&AuctionStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
        assert!(AuctionStatus::Closed.is_terminal());
        assert!(!AuctionStatus::Open.is_terminal());
    }
}
