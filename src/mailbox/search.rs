//! Message selection: turn a "days back" window into an IMAP `SINCE` search.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::MailboxTransport;
use crate::error::Result;
use crate::model::MessageId;

/// `now − days`, saturating at the earliest representable instant.
pub fn search_cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// IMAP date format (`date-day "-" date-month "-" date-year`): `25-Jun-2025`.
///
/// IMAP searches have day granularity; the time of day is discarded.
pub fn imap_date(instant: DateTime<Utc>) -> String {
    instant.format("%d-%b-%Y").to_string()
}

/// The `SEARCH` criteria for messages on or after `now − days`.
pub fn since_criteria(now: DateTime<Utc>, days: u32) -> String {
    format!("SINCE {}", imap_date(search_cutoff(now, days)))
}

/// Search the selected mailbox for messages from the last `days` days.
///
/// The cutoff is computed from the clock at call time. Identifiers come
/// back in server order; an empty window is an empty vector, not an error.
pub fn select_recent<T: MailboxTransport + ?Sized>(
    transport: &mut T,
    days: u32,
) -> Result<Vec<MessageId>> {
    let criteria = since_criteria(Utc::now(), days);
    debug!(%criteria, "Searching mailbox");

    let ids = transport.search(&criteria)?;
    info!(count = ids.len(), days, "Found messages in search window");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarvestError;
    use chrono::TimeZone;

    /// Answers every search with a fixed result and records the criteria.
    struct ScriptedSearch {
        answer: std::result::Result<Vec<u32>, String>,
        criteria: Vec<String>,
    }

    impl MailboxTransport for ScriptedSearch {
        fn select(&mut self, _mailbox: &str) -> Result<()> {
            Ok(())
        }

        fn search(&mut self, criteria: &str) -> Result<Vec<MessageId>> {
            self.criteria.push(criteria.to_string());
            match &self.answer {
                Ok(ids) => Ok(ids.iter().copied().map(MessageId::from).collect()),
                Err(response) => Err(HarvestError::Search {
                    response: response.clone(),
                }),
            }
        }

        fn fetch_rfc822(&mut self, id: &MessageId) -> Result<Vec<u8>> {
            Err(HarvestError::Fetch {
                id: id.clone(),
                reason: "not scripted".to_string(),
            })
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn logout(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_imap_date_format() {
        let dt = Utc.with_ymd_and_hms(2025, 6, 25, 17, 45, 0).unwrap();
        assert_eq!(imap_date(dt), "25-Jun-2025");
        let dt = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(imap_date(dt), "05-Jan-2024");
    }

    #[test]
    fn test_cutoff_is_now_minus_days() {
        let now = Utc.with_ymd_and_hms(2025, 6, 27, 9, 30, 0).unwrap();
        for days in [0u32, 1, 2, 30, 365] {
            assert_eq!(
                now - search_cutoff(now, days),
                Duration::days(i64::from(days))
            );
        }
        assert_eq!(search_cutoff(now, 0), now);
    }

    #[test]
    fn test_cutoff_moves_with_now() {
        let earlier = Utc.with_ymd_and_hms(2025, 6, 27, 9, 30, 0).unwrap();
        let later = earlier + Duration::days(3);
        assert_eq!(
            search_cutoff(later, 2) - search_cutoff(earlier, 2),
            Duration::days(3)
        );
    }

    #[test]
    fn test_cutoff_saturates() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(search_cutoff(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_since_criteria_crosses_month() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 3, 0, 0).unwrap();
        assert_eq!(since_criteria(now, 2), "SINCE 29-Jun-2025");
    }

    #[test]
    fn test_select_recent_uses_current_clock() {
        let mut transport = ScriptedSearch {
            answer: Ok(vec![3, 1, 2]),
            criteria: Vec::new(),
        };

        let before = since_criteria(Utc::now(), 2);
        let ids = select_recent(&mut transport, 2).unwrap();
        let after = since_criteria(Utc::now(), 2);

        let ids: Vec<&str> = ids.iter().map(MessageId::as_str).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(transport.criteria.len(), 1);
        assert!(transport.criteria[0] == before || transport.criteria[0] == after);
    }

    #[test]
    fn test_select_recent_empty_window() {
        let mut transport = ScriptedSearch {
            answer: Ok(Vec::new()),
            criteria: Vec::new(),
        };
        assert!(select_recent(&mut transport, 0).unwrap().is_empty());
    }

    #[test]
    fn test_select_recent_search_failure() {
        let mut transport = ScriptedSearch {
            answer: Err("NO [UNAVAILABLE] search backend down".to_string()),
            criteria: Vec::new(),
        };
        match select_recent(&mut transport, 2) {
            Err(HarvestError::Search { response }) => {
                assert_eq!(response, "NO [UNAVAILABLE] search backend down");
            }
            other => panic!("expected search error, got {other:?}"),
        }
    }
}
