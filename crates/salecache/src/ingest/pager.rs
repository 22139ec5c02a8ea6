//! 아이템 하나에 대한 역방향 페이지네이션 상태 기계.
//!
//! `Paging → Stopping(reason) → Done` 순서로만 진행한다. I/O는 하지 않으며,
//! 코디네이터가 `next_request`로 요청을 받아 피드를 호출하고 결과를 `absorb`에 넘긴다.
//! 누적된 기록은 `finish`가 `ItemOutcome` 값으로 돌려준다.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

use interface::{FeedRequest, InventoryItem, SaleNode, SalePage, SaleRecord};

/// 페이지네이션을 멈춘 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// 워터마크 이하의 거래에 도달
    KnownHistoryReached,
    /// 아이템당 할당량 도달
    QuotaReached,
    /// 더 이전 페이지가 없거나 빈 페이지
    PageExhausted,
    /// 실행 취소 또는 제한 시간 초과
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerState {
    Paging { before: Option<String> },
    Stopping(StopReason),
    Done,
}

/// 아이템 한 건의 수집 결과
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub item_id: String,
    /// 새로 받은 기록 (최신 순)
    pub accepted: Vec<SaleRecord>,
    /// 판매자나 가격이 없어 버린 노드 수
    pub dropped: usize,
    pub pages: usize,
    pub stop: StopReason,
}

pub struct ItemPager {
    item: InventoryItem,
    watermark: Option<DateTime<Utc>>,
    page_size: u32,
    total_limit: u64,
    state: PagerState,
    accepted: Vec<SaleRecord>,
    dropped: usize,
    pages: usize,
}

impl ItemPager {
    pub fn new(
        item: InventoryItem,
        watermark: Option<DateTime<Utc>>,
        page_size: u32,
        total_limit: u64,
    ) -> Self {
        let state = if total_limit == 0 {
            PagerState::Stopping(StopReason::QuotaReached)
        } else {
            PagerState::Paging { before: None }
        };

        Self {
            item,
            watermark,
            page_size,
            total_limit,
            state,
            accepted: Vec::new(),
            dropped: 0,
            pages: 0,
        }
    }

    pub fn state(&self) -> &PagerState {
        &self.state
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// 다음에 보낼 피드 요청. 멈춘 상태면 None.
    pub fn next_request(&self) -> Option<FeedRequest> {
        match &self.state {
            PagerState::Paging { before } => Some(FeedRequest {
                item_id: self.item.item_id.clone(),
                category: self.item.category,
                season_eligibility: self.item.season_eligibility,
                before: before.clone(),
                page_size: self.page_size,
            }),
            _ => None,
        }
    }

    /// 받은 페이지를 최신 순으로 소비한다.
    pub fn absorb(&mut self, page: SalePage) {
        if !matches!(self.state, PagerState::Paging { .. }) {
            return;
        }
        self.pages += 1;

        if page.nodes.is_empty() {
            self.state = PagerState::Stopping(StopReason::PageExhausted);
            return;
        }

        for node in page.nodes {
            // 같은 시각의 새 거래도 이미 아는 것으로 취급한다 (<=)
            if self
                .watermark
                .is_some_and(|mark| stored_precision(node.date) <= mark)
            {
                self.state = PagerState::Stopping(StopReason::KnownHistoryReached);
                return;
            }

            match validate_node(node, &self.item) {
                Some(record) => {
                    self.accepted.push(record);
                    if self.accepted.len() as u64 >= self.total_limit {
                        self.state = PagerState::Stopping(StopReason::QuotaReached);
                        return;
                    }
                }
                None => self.dropped += 1,
            }
        }

        self.state = match page.page_info {
            info if info.has_previous_page && info.start_cursor.is_some() => PagerState::Paging {
                before: info.start_cursor,
            },
            _ => PagerState::Stopping(StopReason::PageExhausted),
        };
    }

    pub fn cancel(&mut self) {
        if matches!(self.state, PagerState::Paging { .. }) {
            self.state = PagerState::Stopping(StopReason::Cancelled);
        }
    }

    pub fn finish(mut self) -> ItemOutcome {
        let stop = match std::mem::replace(&mut self.state, PagerState::Done) {
            PagerState::Stopping(reason) => reason,
            // 아직 진행 중에 끝내면 취소로 본다
            PagerState::Paging { .. } | PagerState::Done => StopReason::Cancelled,
        };

        ItemOutcome {
            item_id: self.item.item_id,
            accepted: self.accepted,
            dropped: self.dropped,
            pages: self.pages,
            stop,
        }
    }
}

/// 판매자와 가격이 있는 노드만 기록으로 바꾼다. 나머지는 오류가 아니라 조용히 버린다.
pub fn validate_node(node: SaleNode, item: &InventoryItem) -> Option<SaleRecord> {
    let seller_id = node.seller_id.filter(|s| !s.trim().is_empty())?;
    let price_minor = node.price_minor.filter(|p| *p >= 0)?;

    Some(SaleRecord {
        id: node.id,
        item_id: item.item_id.clone(),
        category: item.category,
        variant_id: node.variant_id,
        season_eligibility: interface::SeasonEligibility::from_flag(node.season_flag),
        price_minor,
        buyer_id: node.buyer_id,
        seller_id,
        date: stored_precision(node.date),
    })
}

/// 저장소는 마이크로초까지만 보관하므로 비교와 저장 모두 같은 정밀도를 쓴다
fn stored_precision(date: DateTime<Utc>) -> DateTime<Utc> {
    date.trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use interface::{PageInfo, Rarity, SeasonEligibility};

    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 10, 0, 0, 0).unwrap() + Duration::days(offset)
    }

    fn item() -> InventoryItem {
        InventoryItem {
            item_id: "aaa".to_string(),
            category: Rarity::Rare,
            season_eligibility: SeasonEligibility::InSeason,
            purchase_price_minor: None,
        }
    }

    fn node(id: &str, offset: i64, price: Option<i64>, seller: Option<&str>) -> SaleNode {
        SaleNode {
            id: id.to_string(),
            price_minor: price,
            date: day(offset),
            buyer_id: None,
            seller_id: seller.map(str::to_string),
            variant_id: format!("card-{}", id),
            season_flag: true,
        }
    }

    fn page(nodes: Vec<SaleNode>, cursor: Option<&str>, more: bool) -> SalePage {
        SalePage {
            nodes,
            page_info: PageInfo {
                start_cursor: cursor.map(str::to_string),
                has_previous_page: more,
            },
        }
    }

    #[test]
    fn stops_at_watermark_without_inspecting_older_nodes() {
        let mut pager = ItemPager::new(item(), Some(day(-1)), 10, 100);
        pager.absorb(page(
            vec![
                node("new", 0, Some(20), Some("s")),
                node("known", -1, Some(15), Some("s")),
                node("older", -5, Some(10), None),
            ],
            Some("c1"),
            true,
        ));

        assert_eq!(
            pager.state(),
            &PagerState::Stopping(StopReason::KnownHistoryReached)
        );
        assert!(pager.next_request().is_none());

        let outcome = pager.finish();
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].id, "new");
        assert_eq!(outcome.dropped, 0);
    }

    #[test]
    fn drops_do_not_count_toward_quota() {
        let mut pager = ItemPager::new(item(), None, 10, 2);
        pager.absorb(page(
            vec![
                node("a", 0, Some(10), None),
                node("b", -1, None, Some("s")),
                node("c", -2, Some(-5), Some("s")),
                node("d", -3, Some(12), Some("s")),
            ],
            Some("c1"),
            true,
        ));
        assert!(pager.next_request().is_some());

        pager.absorb(page(
            vec![node("e", -4, Some(11), Some("s")), node("f", -5, Some(9), Some("s"))],
            Some("c2"),
            true,
        ));

        let outcome = pager.finish();
        assert_eq!(outcome.stop, StopReason::QuotaReached);
        let ids: Vec<&str> = outcome.accepted.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "e"]);
        assert_eq!(outcome.dropped, 3);
        assert_eq!(outcome.pages, 2);
    }

    #[test]
    fn follows_before_cursor_until_exhausted() {
        let mut pager = ItemPager::new(item(), None, 1, 100);
        assert_eq!(pager.next_request().unwrap().before, None);

        pager.absorb(page(vec![node("a", 0, Some(1), Some("s"))], Some("c1"), true));
        let request = pager.next_request().unwrap();
        assert_eq!(request.before.as_deref(), Some("c1"));
        assert_eq!(request.page_size, 1);
        assert_eq!(request.category, Rarity::Rare);

        pager.absorb(page(vec![node("b", -1, Some(1), Some("s"))], Some("c2"), false));
        assert_eq!(pager.state(), &PagerState::Stopping(StopReason::PageExhausted));
        assert_eq!(pager.finish().accepted.len(), 2);
    }

    #[test]
    fn empty_page_stops_paging() {
        let mut pager = ItemPager::new(item(), None, 10, 100);
        pager.absorb(page(vec![], Some("c1"), true));
        assert_eq!(pager.finish().stop, StopReason::PageExhausted);
    }

    #[test]
    fn zero_quota_never_requests() {
        let pager = ItemPager::new(item(), None, 10, 0);
        assert!(pager.next_request().is_none());
        assert_eq!(pager.finish().stop, StopReason::QuotaReached);
    }

    #[test]
    fn cancel_keeps_accepted_buffer() {
        let mut pager = ItemPager::new(item(), None, 1, 100);
        pager.absorb(page(vec![node("a", 0, Some(1), Some("s"))], Some("c1"), true));
        pager.cancel();
        assert!(pager.next_request().is_none());

        let outcome = pager.finish();
        assert_eq!(outcome.stop, StopReason::Cancelled);
        assert_eq!(outcome.accepted.len(), 1);
    }

    #[test]
    fn record_takes_category_from_item_and_season_from_node() {
        let mut raw = node("x", 0, Some(300), Some("seller"));
        raw.season_flag = false;
        let record = validate_node(raw, &item()).unwrap();
        assert_eq!(record.category, Rarity::Rare);
        assert_eq!(record.season_eligibility, SeasonEligibility::Classic);
        assert_eq!(record.item_id, "aaa");
    }

    #[test]
    fn sub_microsecond_dates_match_stored_watermark() {
        let precise = day(0) + Duration::nanoseconds(123_456_789);
        let stored = day(0) + Duration::nanoseconds(123_456_000);

        let mut sale = node("n", 0, Some(10), Some("s"));
        sale.date = precise;
        let record = validate_node(sale.clone(), &item()).unwrap();
        assert_eq!(record.date, stored);

        let mut pager = ItemPager::new(item(), Some(stored), 10, 100);
        pager.absorb(page(vec![sale], Some("c1"), true));
        assert_eq!(
            pager.state(),
            &PagerState::Stopping(StopReason::KnownHistoryReached)
        );
        assert!(pager.finish().accepted.is_empty());
    }
}
