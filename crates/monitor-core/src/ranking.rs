//! Presentation ordering of sessions.

use crate::models::{SessionRecord, SessionStatus};

/// Rank of a status: lower sorts first.
///
/// attention < working < starting < done < anything else.
pub fn status_rank(status: SessionStatus) -> u8 {
    match status {
        SessionStatus::Attention => 0,
        SessionStatus::Working => 1,
        SessionStatus::Starting => 2,
        SessionStatus::Done => 3,
        SessionStatus::Unknown => 9,
    }
}

/// Sort records by status rank, keeping enumeration order within a rank.
pub fn rank_sessions(records: &mut [SessionRecord]) {
    // `sort_by_key` is stable.
    records.sort_by_key(|r| status_rank(r.status));
}

/// Owned variant of [`rank_sessions`].
pub fn ranked(mut records: Vec<SessionRecord>) -> Vec<SessionRecord> {
    rank_sessions(&mut records);
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, status: SessionStatus) -> SessionRecord {
        let mut r = SessionRecord::new(id);
        r.status = status;
        r
    }

    fn statuses(records: &[SessionRecord]) -> Vec<SessionStatus> {
        records.iter().map(|r| r.status).collect()
    }

    #[test]
    fn test_rank_canonical_order() {
        let sorted = ranked(vec![
            rec("a", SessionStatus::Done),
            rec("b", SessionStatus::Attention),
            rec("c", SessionStatus::Working),
            rec("d", SessionStatus::Starting),
        ]);
        assert_eq!(
            statuses(&sorted),
            vec![
                SessionStatus::Attention,
                SessionStatus::Working,
                SessionStatus::Starting,
                SessionStatus::Done,
            ]
        );
    }

    #[test]
    fn test_rank_unknown_sorts_last() {
        let sorted = ranked(vec![
            rec("u", SessionStatus::Unknown),
            rec("d", SessionStatus::Done),
        ]);
        assert_eq!(sorted[0].session_id, "d");
        assert_eq!(sorted[1].session_id, "u");
    }

    #[test]
    fn test_rank_is_stable_within_status() {
        let sorted = ranked(vec![
            rec("w1", SessionStatus::Working),
            rec("d1", SessionStatus::Done),
            rec("w2", SessionStatus::Working),
            rec("w3", SessionStatus::Working),
        ]);
        let ids: Vec<&str> = sorted.iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w2", "w3", "d1"]);
    }

    #[test]
    fn test_rank_empty() {
        assert!(ranked(Vec::new()).is_empty());
    }
}
