use crate::ledger::{HistoryLedger, LedgerStore};
use crate::messages::{Message, MessageService, ServiceError};

/// Turn a set of surviving ledger ids into full message records. An empty
/// id set short-circuits to an empty list without a service round trip;
/// a non-empty set costs exactly one batched fetch. The service orders
/// results by creation time descending, which may differ from the
/// ledger's own recently-appended-first order.
pub fn resolve(
    service: &dyn MessageService,
    ids: &[String],
) -> Result<Vec<Message>, ServiceError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    service.fetch_by_ids(ids)
}

/// Load the "my sent messages" view: prune-and-read the local ledger,
/// then resolve the survivors against the message store. Service errors
/// surface to the caller; the ledger keeps its pruned state either way.
pub fn load<S: LedgerStore>(
    ledger: &HistoryLedger<S>,
    service: &dyn MessageService,
) -> Result<Vec<Message>, ServiceError> {
    let ids: Vec<String> = ledger
        .list_active()
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    resolve(service, &ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedgerStore;
    use crate::messages::NewMessage;
    use assert_matches::assert_matches;
    use std::cell::Cell;

    struct FakeService {
        records: Vec<Message>,
        calls: Cell<usize>,
        fail: bool,
    }

    impl FakeService {
        fn with_records(records: Vec<Message>) -> Self {
            Self {
                records,
                calls: Cell::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                records: Vec::new(),
                calls: Cell::new(0),
                fail: true,
            }
        }
    }

    impl MessageService for FakeService {
        fn insert(&self, _message: &NewMessage) -> Result<Message, ServiceError> {
            unimplemented!("not used by history resolution")
        }

        fn fetch_by_id(&self, _id: &str) -> Result<Option<Message>, ServiceError> {
            unimplemented!("not used by history resolution")
        }

        fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Message>, ServiceError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(ServiceError::Status(500));
            }
            // Newest-first by created_at, as the real store orders.
            let mut matched: Vec<Message> = self
                .records
                .iter()
                .filter(|record| ids.contains(&record.id))
                .cloned()
                .collect();
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(matched)
        }

        fn fetch_all(&self, _limit: Option<usize>) -> Result<Vec<Message>, ServiceError> {
            unimplemented!("not used by history resolution")
        }
    }

    fn record(id: &str, created_at: &str) -> Message {
        Message {
            id: id.to_string(),
            recipient: "Rani".to_string(),
            message: "hello".to_string(),
            song_title: "Lucky".to_string(),
            artist: "Jason Mraz".to_string(),
            cover: None,
            preview: None,
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn empty_id_set_skips_the_service() {
        let service = FakeService::with_records(vec![record("a", "2026-08-01T00:00:00Z")]);
        let resolved = resolve(&service, &[]).expect("empty resolve");
        assert!(resolved.is_empty());
        assert_eq!(service.calls.get(), 0);
    }

    #[test]
    fn non_empty_set_costs_one_batched_fetch() {
        let service = FakeService::with_records(vec![
            record("a", "2026-08-01T00:00:00Z"),
            record("b", "2026-08-02T00:00:00Z"),
        ]);
        let ids = vec!["a".to_string(), "b".to_string()];
        let resolved = resolve(&service, &ids).expect("resolve");
        assert_eq!(resolved.len(), 2);
        assert_eq!(service.calls.get(), 1);
        // Service ordering wins: newest created_at first.
        assert_eq!(resolved[0].id, "b");
    }

    #[test]
    fn load_joins_ledger_survivors_against_the_store() {
        let ledger = HistoryLedger::new(MemoryLedgerStore::new());
        ledger.append("a");
        ledger.append("b");

        let service = FakeService::with_records(vec![
            record("a", "2026-08-01T00:00:00Z"),
            record("b", "2026-08-02T00:00:00Z"),
            record("unrelated", "2026-08-03T00:00:00Z"),
        ]);

        let resolved = load(&ledger, &service).expect("load history");
        let ids: Vec<&str> = resolved.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn service_failure_surfaces_and_leaves_the_ledger_intact() {
        let ledger = HistoryLedger::new(MemoryLedgerStore::new());
        ledger.append("a");

        let service = FakeService::failing();
        let result = load(&ledger, &service);
        assert_matches!(result, Err(ServiceError::Status(500)));

        assert_eq!(ledger.list_active().len(), 1);
    }
}
