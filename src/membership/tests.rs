//! Membership Module Tests
//!
//! - **Identity**: peer ids are derived deterministically from addresses.
//! - **Tracker**: idempotent joins, not-found updates, deletion, reaping.
//! - **Gossip application**: Join/Failure/Leave events folded into the view.

#[cfg(test)]
mod tests {
    use crate::dissemination::types::{EventKind, Update};
    use crate::membership::tracker::Tracker;
    use crate::membership::types::{MemberState, PeerId};
    use std::net::SocketAddr;
    use std::time::Duration;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    // ============================================================
    // PEER ID TESTS
    // ============================================================

    #[test]
    fn test_peer_id_is_deterministic() {
        let id1 = PeerId::from_addr(&addr(5000));
        let id2 = PeerId::from_addr(&addr(5000));
        let id3 = PeerId::from_addr(&addr(5001));

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_peer_id_display_is_fixed_width() {
        assert_eq!(PeerId(0xab).to_string(), "00000000000000ab");
    }

    // ============================================================
    // TRACKER TESTS
    // ============================================================

    #[test]
    fn test_add_member_creates_alive_record() {
        let tracker = Tracker::new();
        let id = PeerId(1);

        assert!(tracker.add_member(id, addr(5000)));

        let record = tracker.get(id).expect("member should exist");
        assert_eq!(record.id, id);
        assert_eq!(record.address, addr(5000));
        assert_eq!(record.state, MemberState::Alive);
    }

    #[test]
    fn test_add_member_is_idempotent() {
        let tracker = Tracker::new();
        let id = PeerId(1);

        assert!(tracker.add_member(id, addr(5000)));
        let first = tracker.get(id).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        assert!(!tracker.add_member(id, addr(6000)));

        assert_eq!(tracker.len(), 1);
        let second = tracker.get(id).unwrap();
        assert_eq!(second.last_ack, first.last_ack);
        assert_eq!(second.address, addr(5000), "Original address should be kept");
    }

    #[test]
    fn test_update_unknown_member_is_not_found() {
        let tracker = Tracker::new();
        tracker.add_member(PeerId(1), addr(5000));

        let err = tracker
            .update(PeerId(99), MemberState::Dead)
            .expect_err("update on unknown id should fail");

        assert!(err.is_not_found());
        assert_eq!(tracker.len(), 1);
        assert!(!tracker.contains(PeerId(99)));
        assert_eq!(tracker.state_of(PeerId(1)), Some(MemberState::Alive));
    }

    #[test]
    fn test_update_sets_state_and_refreshes_last_ack() {
        let tracker = Tracker::new();
        let id = PeerId(1);
        tracker.add_member(id, addr(5000));
        let before = tracker.get(id).unwrap().last_ack;

        std::thread::sleep(Duration::from_millis(5));
        tracker.update(id, MemberState::Suspicious).unwrap();

        let record = tracker.get(id).unwrap();
        assert_eq!(record.state, MemberState::Suspicious);
        assert!(record.last_ack > before);
    }

    #[test]
    fn test_reap_forgets_long_dead_members_only() {
        let tracker = Tracker::new();
        tracker.add_member(PeerId(1), addr(5000));
        tracker.add_member(PeerId(2), addr(5001));
        tracker.add_member(PeerId(3), addr(5002));
        tracker.update(PeerId(1), MemberState::Dead).unwrap();
        tracker.update(PeerId(2), MemberState::Suspicious).unwrap();

        assert!(tracker.reap_dead(Duration::from_secs(60)).is_empty());
        assert_eq!(tracker.len(), 3);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(tracker.reap_dead(Duration::from_millis(10)), vec![PeerId(1)]);
        assert!(!tracker.contains(PeerId(1)));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_repeated_dead_reports_do_not_delay_reaping() {
        let tracker = Tracker::new();
        tracker.add_member(PeerId(1), addr(5000));
        tracker.update(PeerId(1), MemberState::Dead).unwrap();
        let since = tracker.get(PeerId(1)).unwrap().state_since;

        std::thread::sleep(Duration::from_millis(20));
        tracker.update(PeerId(1), MemberState::Dead).unwrap();

        assert_eq!(tracker.get(PeerId(1)).unwrap().state_since, since);
        assert_eq!(tracker.reap_dead(Duration::from_millis(10)), vec![PeerId(1)]);
    }

    #[test]
    fn test_delete_and_list() {
        let tracker = Tracker::new();
        tracker.add_member(PeerId(1), addr(5000));
        tracker.add_member(PeerId(2), addr(5001));

        let mut ids = tracker.list_ids();
        ids.sort();
        assert_eq!(ids, vec![PeerId(1), PeerId(2)]);

        assert!(tracker.delete(PeerId(1)));
        assert!(!tracker.delete(PeerId(1)));
        assert_eq!(tracker.list_ids(), vec![PeerId(2)]);
        assert!(tracker.get(PeerId(1)).is_none());
    }

    #[test]
    fn test_views_sorted_by_id() {
        let tracker = Tracker::new();
        tracker.add_member(PeerId(3), addr(5003));
        tracker.add_member(PeerId(1), addr(5001));
        tracker.update(PeerId(3), MemberState::Dead).unwrap();

        let views = tracker.views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, PeerId(1));
        assert_eq!(views[1].state, MemberState::Dead);

        let json = serde_json::to_string(&views).expect("Serialization failed");
        assert!(json.contains("\"Dead\""));
    }

    #[test]
    fn test_concurrent_updates_keep_single_record() {
        let tracker = std::sync::Arc::new(Tracker::new());
        let id = PeerId(7);
        tracker.add_member(id, addr(5007));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let state = if i % 2 == 0 {
                            MemberState::Alive
                        } else {
                            MemberState::Dead
                        };
                        tracker.update(id, state).unwrap();
                        tracker.add_member(id, addr(6000));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.address_of(id), Some(addr(5007)));
    }

    // ============================================================
    // GOSSIP APPLICATION TESTS
    // ============================================================

    #[test]
    fn test_failure_event_marks_member_dead() {
        let tracker = Tracker::new();
        let x = PeerId(42);
        tracker.add_member(x, addr(5042));
        let before = tracker.get(x).unwrap().last_ack;

        std::thread::sleep(Duration::from_millis(5));
        tracker.apply_event(&Update::new(EventKind::Failure, x), addr(9999));

        let record = tracker.get(x).unwrap();
        assert_eq!(record.state, MemberState::Dead);
        assert!(record.last_ack > before);
    }

    #[test]
    fn test_failure_event_for_unknown_member_is_ignored() {
        let tracker = Tracker::new();

        tracker.apply_event(&Update::new(EventKind::Failure, PeerId(1)), addr(9999));

        assert!(tracker.is_empty());
    }

    #[test]
    fn test_join_event_uses_carried_address() {
        let tracker = Tracker::new();

        let join = Update::join(PeerId(5), addr(5005));
        tracker.apply_event(&join, addr(9999));

        assert_eq!(tracker.address_of(PeerId(5)), Some(addr(5005)));
    }

    #[test]
    fn test_join_event_revives_dead_member() {
        let tracker = Tracker::new();
        let x = PeerId(5);
        tracker.add_member(x, addr(5005));
        tracker.update(x, MemberState::Dead).unwrap();

        tracker.apply_event(&Update::join(x, addr(5005)), addr(9999));

        assert_eq!(tracker.state_of(x), Some(MemberState::Alive));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_join_event_clears_suspicion() {
        let tracker = Tracker::new();
        let x = PeerId(5);
        tracker.add_member(x, addr(5005));
        tracker.update(x, MemberState::Suspicious).unwrap();

        tracker.apply_event(&Update::new(EventKind::Join, x), addr(9999));

        assert_eq!(tracker.state_of(x), Some(MemberState::Alive));
        // The known address is kept
        assert_eq!(tracker.address_of(x), Some(addr(5005)));
    }

    #[test]
    fn test_join_event_without_address_uses_origin() {
        let tracker = Tracker::new();

        tracker.apply_event(&Update::new(EventKind::Join, PeerId(5)), addr(9999));

        assert_eq!(tracker.address_of(PeerId(5)), Some(addr(9999)));
    }

    #[test]
    fn test_leave_event_removes_member() {
        let tracker = Tracker::new();
        tracker.add_member(PeerId(5), addr(5005));

        tracker.apply_event(&Update::new(EventKind::Leave, PeerId(5)), addr(9999));

        assert!(!tracker.contains(PeerId(5)));
    }
}
