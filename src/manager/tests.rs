use super::*;
use crate::session::Credential;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::oneshot;

const TOKEN: &str = "tok";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    List,
    Upload,
    Rows,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    List,
    Upload(String),
    Rows(String),
    Delete(Vec<DatasetId>),
}

impl Call {
    fn op(&self) -> Op {
        match self {
            Call::List => Op::List,
            Call::Upload(_) => Op::Upload,
            Call::Rows(_) => Op::Rows,
            Call::Delete(_) => Op::Delete,
        }
    }
}

#[derive(Default)]
struct FakeState {
    records: Vec<DatasetRecord>,
    rows: HashMap<String, Vec<Row>>,
    next_id: i64,
    calls: Vec<Call>,
    failures: HashMap<Op, AppError>,
    gates: HashMap<Op, VecDeque<oneshot::Receiver<()>>>,
}

/// In-memory dataset service. Results are computed when a call completes,
/// so a gated call sees whatever the server holds at release time.
#[derive(Default)]
struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    fn with_records(records: Vec<DatasetRecord>) -> Arc<Self> {
        let next_id = records.len() as i64 + 1;
        Arc::new(Self {
            state: Mutex::new(FakeState {
                records,
                next_id,
                ..Default::default()
            }),
        })
    }

    fn set_records(&self, records: Vec<DatasetRecord>) {
        self.state.lock().unwrap().records = records;
    }

    fn set_rows(&self, storage_name: &str, rows: Vec<Row>) {
        self.state
            .lock()
            .unwrap()
            .rows
            .insert(storage_name.to_string(), rows);
    }

    /// Fail the next completion of `op`.
    fn fail_next(&self, op: Op, error: AppError) {
        self.state.lock().unwrap().failures.insert(op, error);
    }

    /// Hold the next call of `op` until the returned sender fires.
    fn gate(&self, op: Op) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state
            .lock()
            .unwrap()
            .gates
            .entry(op)
            .or_default()
            .push_back(rx);
        tx
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|c| c.op() == op).count()
    }

    async fn enter(&self, token: &str, call: Call) -> AppResult<()> {
        let op = call.op();
        let gate = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            state.gates.get_mut(&op).and_then(|q| q.pop_front())
        };
        if let Some(gate) = gate {
            gate.await.ok();
        }
        if token != TOKEN {
            return Err(AppError::SessionExpired);
        }
        let failure = self.state.lock().unwrap().failures.remove(&op);
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DatasetApi for FakeApi {
    async fn list(&self, token: &str) -> AppResult<Vec<DatasetRecord>> {
        self.enter(token, Call::List).await?;
        Ok(self.state.lock().unwrap().records.clone())
    }

    async fn upload(&self, token: &str, file: UploadFile) -> AppResult<()> {
        self.enter(token, Call::Upload(file.file_name.clone())).await?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.records.push(DatasetRecord {
            id: DatasetId::Number(id),
            storage_name: format!("{}-{}", 1_718_000_000 + id, file.file_name),
            display_name: file.file_name,
            uploader: "ana@example.com".to_string(),
            status: "uploaded".to_string(),
        });
        Ok(())
    }

    async fn fetch_rows(&self, token: &str, storage_name: &str) -> AppResult<Vec<Row>> {
        self.enter(token, Call::Rows(storage_name.to_string())).await?;
        self.state
            .lock()
            .unwrap()
            .rows
            .get(storage_name)
            .cloned()
            .ok_or_else(|| AppError::Transport("File not found (404)".to_string()))
    }

    async fn delete_many(&self, token: &str, ids: &[DatasetId]) -> AppResult<()> {
        self.enter(token, Call::Delete(ids.to_vec())).await?;
        self.state
            .lock()
            .unwrap()
            .records
            .retain(|r| !ids.contains(&r.id));
        Ok(())
    }
}

fn record(id: i64, name: &str) -> DatasetRecord {
    DatasetRecord {
        id: DatasetId::Number(id),
        storage_name: name.to_string(),
        display_name: name.to_string(),
        uploader: "ana@example.com".to_string(),
        status: "processed".to_string(),
    }
}

fn sample_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            json!({"sku": format!("A-{}", i), "qty": i})
                .as_object()
                .cloned()
                .unwrap()
        })
        .collect()
}

fn credential() -> Credential {
    Credential {
        identity: "ana@example.com".to_string(),
        token: TOKEN.to_string(),
        profile: None,
        expires_at: None,
    }
}

async fn ready(api: &Arc<FakeApi>) -> DatasetManager {
    let mut manager = DatasetManager::new(api.clone(), SessionContext::with_credential(credential()));
    manager.activate();
    manager.settle().await;
    assert_eq!(manager.phase(), Phase::Ready);
    manager
}

fn assert_invariants(manager: &DatasetManager) {
    assert!(manager.selection().is_subset_of(manager.datasets()));
    if manager.in_flight() == 0 {
        assert!(!manager.is_busy());
    }
}

#[tokio::test]
async fn idle_until_authenticated() {
    let api = FakeApi::with_records(vec![record(1, "inv1.csv")]);
    let session = SessionContext::unauthenticated();
    let mut manager = DatasetManager::new(api.clone(), session.clone());

    manager.activate();
    assert_eq!(manager.phase(), Phase::Idle);
    assert_eq!(manager.refresh_list(), Err(AppError::AuthRequired));
    assert_eq!(
        manager.preview(&record(1, "inv1.csv")),
        Err(AppError::AuthRequired)
    );
    assert!(api.calls().is_empty());
    assert!(!manager.is_busy());

    session.establish(credential());
    manager.activate();
    assert_eq!(manager.phase(), Phase::Loading);
    assert!(manager.is_busy());

    manager.settle().await;
    assert_eq!(manager.phase(), Phase::Ready);
    assert_eq!(manager.datasets(), &[record(1, "inv1.csv")]);
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn refresh_replaces_collection_exactly() {
    let api = FakeApi::with_records(vec![record(1, "inv1.csv"), record(2, "inv2.csv")]);
    let mut manager = ready(&api).await;
    manager.toggle_select(&DatasetId::Number(1), true);

    api.set_records(vec![record(3, "inv3.csv")]);
    manager.refresh_list().unwrap();
    manager.settle().await;

    assert_eq!(manager.datasets(), &[record(3, "inv3.csv")]);
    assert!(manager.selection().is_empty());
    assert_invariants(&manager);
}

#[tokio::test]
async fn refresh_failure_keeps_previous_list() {
    let api = FakeApi::with_records(vec![record(1, "inv1.csv")]);
    let mut manager = ready(&api).await;

    api.set_records(Vec::new());
    api.fail_next(Op::List, AppError::Transport("connection reset".to_string()));
    manager.refresh_list().unwrap();
    assert!(manager.is_busy());
    manager.settle().await;

    assert_eq!(manager.datasets(), &[record(1, "inv1.csv")]);
    assert_eq!(
        manager.take_notice(),
        Some(Notice::Error(AppError::Transport(
            "connection reset".to_string()
        )))
    );
    assert!(!manager.is_busy());
    assert_eq!(manager.phase(), Phase::Ready);
}

#[tokio::test]
async fn later_refresh_completion_wins() {
    let api = FakeApi::with_records(Vec::new());
    let mut manager = ready(&api).await;

    let first = api.gate(Op::List);
    let second = api.gate(Op::List);
    manager.refresh_list().unwrap();
    manager.refresh_list().unwrap();
    assert_eq!(manager.in_flight(), 2);

    api.set_records(vec![record(2, "b.csv")]);
    second.send(()).unwrap();
    assert!(manager.next_event().await);
    assert_eq!(manager.datasets(), &[record(2, "b.csv")]);

    api.set_records(vec![record(1, "a.csv")]);
    first.send(()).unwrap();
    assert!(manager.next_event().await);
    assert_eq!(manager.datasets(), &[record(1, "a.csv")]);
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn results_after_logout_are_discarded() {
    let api = FakeApi::with_records(vec![record(1, "inv1.csv")]);
    let mut manager = ready(&api).await;
    let session = manager.session().clone();

    let gate = api.gate(Op::List);
    api.set_records(vec![record(1, "inv1.csv"), record(2, "inv2.csv")]);
    manager.refresh_list().unwrap();
    session.logout();
    assert_eq!(manager.phase(), Phase::Idle);

    gate.send(()).unwrap();
    manager.settle().await;
    assert_eq!(manager.phase(), Phase::Idle);
    assert!(manager.datasets().is_empty());
    assert!(manager.notice().is_none());
    assert!(!manager.is_busy());

    session.establish(credential());
    manager.activate();
    manager.settle().await;
    assert_eq!(manager.datasets().len(), 2);
}

#[tokio::test]
async fn delete_selected_sends_selection_and_refreshes() {
    let a = record(1, "inv1.csv");
    let b = record(2, "inv2.csv");
    let api = FakeApi::with_records(vec![a.clone(), b.clone()]);
    let mut manager = ready(&api).await;

    assert!(manager.toggle_select(&a.id, true));
    manager.delete_selected().unwrap();
    manager.settle().await;

    assert!(api
        .calls()
        .contains(&Call::Delete(vec![DatasetId::Number(1)])));
    assert_eq!(manager.datasets(), &[b]);
    assert!(manager.selection().is_empty());
    assert_eq!(api.count(Op::List), 2);
    assert_invariants(&manager);
}

#[tokio::test]
async fn failed_delete_keeps_selection() {
    let a = record(1, "inv1.csv");
    let api = FakeApi::with_records(vec![a.clone(), record(2, "inv2.csv")]);
    let mut manager = ready(&api).await;

    manager.toggle_select(&a.id, true);
    api.fail_next(
        Op::Delete,
        AppError::Transport("Internal Server Error (500)".to_string()),
    );
    manager.delete_selected().unwrap();
    manager.settle().await;

    assert!(manager.selection().contains(&a.id));
    assert_eq!(manager.datasets().len(), 2);
    assert_eq!(api.count(Op::List), 1);
    assert!(matches!(manager.notice(), Some(Notice::Error(_))));
    assert_invariants(&manager);
}

#[tokio::test]
async fn delete_selected_requires_a_selection() {
    let api = FakeApi::with_records(vec![record(1, "inv1.csv")]);
    let mut manager = ready(&api).await;

    assert!(matches!(
        manager.delete_selected(),
        Err(AppError::InvalidRequest(_))
    ));
    assert_eq!(api.count(Op::Delete), 0);
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn delete_one_resolves_locally() {
    let a = record(1, "inv1.csv");
    let b = record(2, "inv2.csv");
    let api = FakeApi::with_records(vec![a.clone(), b.clone()]);
    let mut manager = ready(&api).await;

    assert_eq!(
        manager.delete_one("missing.csv"),
        Err(AppError::NotFound("missing.csv".to_string()))
    );
    assert_eq!(api.count(Op::Delete), 0);

    manager.toggle_select(&a.id, true);
    manager.toggle_select(&b.id, true);
    manager.delete_one("inv1.csv").unwrap();
    manager.settle().await;

    assert!(api
        .calls()
        .contains(&Call::Delete(vec![DatasetId::Number(1)])));
    assert_eq!(manager.datasets(), &[b.clone()]);
    assert_eq!(manager.selection().to_vec(), vec![b.id]);
    assert_invariants(&manager);
}

#[tokio::test]
async fn selection_follows_the_listed_snapshot() {
    let a = record(1, "inv1.csv");
    let b = record(2, "inv2.csv");
    let api = FakeApi::with_records(vec![a.clone(), b.clone()]);
    let mut manager = ready(&api).await;

    assert!(!manager.toggle_select(&DatasetId::Number(42), true));
    manager.toggle_select(&b.id, true);

    // Deleted elsewhere.
    api.set_records(vec![a]);
    manager.refresh_list().unwrap();
    manager.settle().await;

    assert!(manager.selection().is_empty());
    assert!(!manager.toggle_select(&b.id, true));
    assert_invariants(&manager);
}

#[tokio::test]
async fn upload_adds_one_dataset_under_its_file_name() {
    let api = FakeApi::with_records(Vec::new());
    let mut manager = ready(&api).await;

    manager
        .upload_dataset(UploadFile::new("inv1.csv", "sku,qty\nA-1,4\n"))
        .unwrap();
    manager.settle().await;

    assert_eq!(manager.datasets().len(), 1);
    assert_eq!(manager.datasets()[0].display_name, "inv1.csv");
    assert_eq!(
        api.calls(),
        vec![Call::List, Call::Upload("inv1.csv".to_string()), Call::List]
    );
    assert_eq!(
        manager.take_notice(),
        Some(Notice::Info("Uploaded inv1.csv".to_string()))
    );
}

#[tokio::test]
async fn upload_rejects_non_csv_files() {
    let api = FakeApi::with_records(Vec::new());
    let mut manager = ready(&api).await;

    assert!(matches!(
        manager.upload_dataset(UploadFile::new("stock.xlsx", "")),
        Err(AppError::InvalidRequest(_))
    ));
    assert_eq!(api.count(Op::Upload), 0);
}

#[tokio::test]
async fn failed_upload_leaves_list_alone() {
    let api = FakeApi::with_records(vec![record(1, "inv1.csv")]);
    let mut manager = ready(&api).await;

    api.fail_next(
        Op::Upload,
        AppError::Transport("Internal Server Error (500)".to_string()),
    );
    manager
        .upload_dataset(UploadFile::new("inv2.csv", "sku\n"))
        .unwrap();
    manager.settle().await;

    assert_eq!(manager.datasets(), &[record(1, "inv1.csv")]);
    assert_eq!(api.count(Op::List), 1);
    assert!(matches!(manager.notice(), Some(Notice::Error(_))));
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn preview_is_capped_and_full_view_is_not() {
    let a = record(1, "inv1.csv");
    let api = FakeApi::with_records(vec![a.clone()]);
    api.set_rows("inv1.csv", sample_rows(25));
    let mut manager = ready(&api).await;

    manager.preview(&a).unwrap();
    assert_eq!(manager.pending_rows(), Some(("inv1.csv", RowsPurpose::Preview)));
    manager.settle().await;
    assert_eq!(manager.phase(), Phase::Previewing);
    assert_eq!(manager.view().rows().len(), 10);
    assert_eq!(manager.view().table().headers, vec!["sku", "qty"]);

    manager.close_view();
    assert_eq!(manager.phase(), Phase::Ready);

    manager.open_full_view(&a).unwrap();
    manager.settle().await;
    assert_eq!(manager.phase(), Phase::FullViewing);
    assert_eq!(manager.view().rows().len(), 25);
    assert_eq!(manager.view().record(), Some(&a));
}

#[tokio::test]
async fn failed_row_fetch_stays_on_listing() {
    let a = record(1, "inv1.csv");
    let api = FakeApi::with_records(vec![a.clone()]);
    let mut manager = ready(&api).await;

    // No rows registered: the fake answers 404.
    manager.preview(&a).unwrap();
    manager.settle().await;

    assert_eq!(manager.view(), &ViewState::Listing);
    assert_eq!(manager.datasets(), &[a]);
    assert!(manager.pending_rows().is_none());
    assert!(matches!(
        manager.notice(),
        Some(Notice::Error(AppError::Transport(_)))
    ));
}

#[tokio::test]
async fn chat_round_trip_leaves_collection_unchanged() {
    let a = record(1, "inv1.csv");
    let api = FakeApi::with_records(vec![a.clone(), record(2, "inv2.csv")]);
    api.set_rows("inv1.csv", sample_rows(25));
    let mut manager = ready(&api).await;
    manager.toggle_select(&a.id, true);
    let before = manager.datasets().to_vec();

    manager.start_chat(&a).unwrap();
    manager.settle().await;
    assert_eq!(manager.phase(), Phase::ChatHandoff);
    let dataset = manager.resolved_dataset().unwrap();
    assert_eq!(dataset.display_name, "inv1.csv");
    assert_eq!(dataset.rows.len(), 25);

    assert!(matches!(
        manager.refresh_list(),
        Err(AppError::InvalidRequest(_))
    ));
    assert!(manager
        .upload_dataset(UploadFile::new("inv3.csv", "sku\n"))
        .is_err());
    assert!(manager.delete_selected().is_err());

    manager.exit_chat();
    assert_eq!(manager.phase(), Phase::Ready);
    assert!(manager.resolved_dataset().is_none());
    assert_eq!(manager.datasets(), before.as_slice());
    assert!(manager.selection().contains(&a.id));
    assert_eq!(api.count(Op::List), 1);

    // The payload is not cached between chats.
    manager.start_chat(&a).unwrap();
    manager.settle().await;
    assert_eq!(api.count(Op::Rows), 2);
}

#[tokio::test]
async fn chat_from_full_view_reuses_rows() {
    let a = record(1, "inv1.csv");
    let api = FakeApi::with_records(vec![a.clone()]);
    api.set_rows("inv1.csv", sample_rows(3));
    let mut manager = ready(&api).await;

    manager.open_full_view(&a).unwrap();
    manager.settle().await;
    manager.start_chat(&a).unwrap();

    assert_eq!(manager.phase(), Phase::ChatHandoff);
    assert!(!manager.is_busy());
    assert_eq!(manager.resolved_dataset().unwrap().rows.len(), 3);
    assert_eq!(api.count(Op::Rows), 1);
}

#[tokio::test]
async fn superseded_row_result_is_dropped() {
    let a = record(1, "inv1.csv");
    let b = record(2, "inv2.csv");
    let api = FakeApi::with_records(vec![a.clone(), b.clone()]);
    api.set_rows("inv1.csv", sample_rows(5));
    api.set_rows("inv2.csv", sample_rows(7));
    let mut manager = ready(&api).await;

    let gate = api.gate(Op::Rows);
    manager.preview(&a).unwrap();
    tokio::task::yield_now().await;
    manager.open_full_view(&b).unwrap();

    assert!(manager.next_event().await);
    assert_eq!(manager.phase(), Phase::FullViewing);
    assert_eq!(manager.view().record(), Some(&b));

    gate.send(()).unwrap();
    manager.settle().await;
    assert_eq!(manager.view().record(), Some(&b));
    assert_eq!(manager.view().rows().len(), 7);
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn mutation_during_chat_refreshes_after_it() {
    let a = record(1, "inv1.csv");
    let api = FakeApi::with_records(vec![a.clone()]);
    api.set_rows("inv1.csv", sample_rows(2));
    let mut manager = ready(&api).await;

    let gate = api.gate(Op::Upload);
    manager
        .upload_dataset(UploadFile::new("inv2.csv", "sku\n"))
        .unwrap();
    manager.start_chat(&a).unwrap();
    assert!(manager.next_event().await);
    assert_eq!(manager.phase(), Phase::ChatHandoff);

    gate.send(()).unwrap();
    manager.settle().await;
    assert_eq!(manager.datasets(), &[a]);
    assert_eq!(api.count(Op::List), 1);

    manager.exit_chat();
    manager.settle().await;
    assert_eq!(manager.datasets().len(), 2);
    assert_eq!(api.count(Op::List), 2);
}

#[tokio::test]
async fn list_result_arriving_during_chat_is_held_until_exit() {
    let a = record(1, "inv1.csv");
    let api = FakeApi::with_records(vec![a.clone()]);
    api.set_rows("inv1.csv", sample_rows(2));
    let mut manager = ready(&api).await;

    let gate = api.gate(Op::List);
    manager.refresh_list().unwrap();
    manager.start_chat(&a).unwrap();
    assert!(manager.next_event().await);
    assert_eq!(manager.phase(), Phase::ChatHandoff);

    api.set_records(vec![a.clone(), record(2, "inv2.csv")]);
    gate.send(()).unwrap();
    manager.settle().await;
    assert_eq!(manager.datasets(), &[a.clone()]);
    assert_eq!(manager.phase(), Phase::ChatHandoff);
    assert!(!manager.is_busy());

    manager.exit_chat();
    assert_eq!(manager.datasets(), &[a]);
    manager.settle().await;
    assert_eq!(manager.datasets().len(), 2);
    assert_eq!(api.count(Op::List), 3);
    assert_invariants(&manager);
}

#[tokio::test]
async fn rejected_credential_ends_the_session() {
    let api = FakeApi::with_records(vec![record(1, "inv1.csv")]);
    let mut manager = ready(&api).await;

    api.fail_next(Op::List, AppError::SessionExpired);
    manager.refresh_list().unwrap();
    manager.settle().await;

    assert!(!manager.session().is_authenticated());
    assert_eq!(manager.phase(), Phase::Idle);
    assert!(manager.datasets().is_empty());
    assert_eq!(
        manager.take_notice(),
        Some(Notice::Error(AppError::SessionExpired))
    );
    assert_eq!(manager.refresh_list(), Err(AppError::AuthRequired));
}
