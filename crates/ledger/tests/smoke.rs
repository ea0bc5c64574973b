use tempfile::TempDir;
use voxroom_core::{ChannelId, Ledger};
use voxroom_ledger::SqliteLedger;

fn ch(id: u64) -> ChannelId {
    ChannelId::new(id).unwrap()
}

#[tokio::test]
async fn ledger_smoke_add_list_remove() {
    let dir = TempDir::new().unwrap();
    let ledger = SqliteLedger::open(dir.path().join("store.db")).unwrap();

    ledger.add(ch(1130000000000000001)).await.unwrap();
    assert!(ledger.list_all().await.unwrap().contains(&ch(1130000000000000001)));

    ledger.remove(ch(1130000000000000001)).await.unwrap();
    assert!(!ledger.list_all().await.unwrap().contains(&ch(1130000000000000001)));
}

#[tokio::test]
async fn ledger_smoke_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");

    {
        let ledger = SqliteLedger::open(&path).unwrap();
        ledger.add(ch(10)).await.unwrap();
        ledger.add(ch(11)).await.unwrap();
        ledger.remove(ch(10)).await.unwrap();
    }

    let reopened = SqliteLedger::open(&path).unwrap();
    assert_eq!(reopened.list_all().await.unwrap(), vec![ch(11)]);
    assert_eq!(reopened.path(), Some(path.as_path()));
}
