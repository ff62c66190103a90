use crate::*;
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn open_tos(config: GateConfig) -> (TermsOfService<MemoryCache, RedbTermsStore>, TempDir) {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = TempDir::new().unwrap();
    let tos = TermsOfService::open(temp_dir.path().join("tos.redb"), config).unwrap();
    tos.initialize().unwrap();
    (tos, temp_dir)
}

fn get(path: &str) -> GateRequest<'_> {
    GateRequest {
        method: "GET",
        path,
        is_ajax: false,
    }
}

#[test]
fn test_document_save_bumps_generation() {
    let (tos, _temp) = open_tos(GateConfig::default());
    let before = tos.generation().current().unwrap();

    tos.publish("first edition of the terms of service").unwrap();
    assert_eq!(tos.generation().current().unwrap(), before + 1);

    // Every save bumps, not only activations
    let mut draft = Document::new("second edition of the terms of service", false);
    tos.save_document(&mut draft, WriteOrigin::Save).unwrap();
    assert_eq!(tos.generation().current().unwrap(), before + 2);
}

#[test]
fn test_raw_document_load_leaves_cache_alone() {
    let (tos, _temp) = open_tos(GateConfig::default());
    let before = tos.generation().current().unwrap();

    let mut doc = Document::new("The only TOS", false);
    tos.save_document(&mut doc, WriteOrigin::Raw).unwrap();
    tos.load_documents_raw(&[Document::new("Another", false)]).unwrap();

    assert_eq!(tos.generation().current().unwrap(), before);
    assert_eq!(tos.list_documents().unwrap().len(), 2);
}

#[test]
fn test_deactivating_only_document_fails() {
    let (tos, _temp) = open_tos(GateConfig::default());
    let mut doc = tos.publish("only").unwrap();
    let version = tos.generation().current().unwrap();

    doc.active = false;
    let err = tos.save_document(&mut doc, WriteOrigin::Save).unwrap_err();
    assert!(matches!(err, TosError::NoActiveTerms));
    // Rejected saves do not invalidate
    assert_eq!(tos.generation().current().unwrap(), version);
}

#[test]
fn test_deactivating_only_document_warns_in_debug() {
    let (tos, _temp) = open_tos(GateConfig::default().with_debug(true));
    let mut doc = tos.publish("only").unwrap();

    doc.active = false;
    let outcome = tos.save_document(&mut doc, WriteOrigin::Save).unwrap();
    assert!(outcome.left_without_active);
    assert!(tos.current_document().unwrap().is_none());
}

#[test]
fn test_staff_index_survives_document_publish() {
    let (tos, _temp) = open_tos(GateConfig::default());
    tos.publish("v1").unwrap();
    tos.save_user(&User::new(1, "admin").with_superuser(true), WriteOrigin::Save)
        .unwrap();
    assert!(tos.staff().is_skipped(1).unwrap());

    tos.publish("v2").unwrap();
    assert!(tos.staff().is_skipped(1).unwrap());
}

#[test]
fn test_raw_user_save_skips_index() {
    let (tos, _temp) = open_tos(GateConfig::default());
    tos.save_user(&User::new(2, "fixture").with_staff(true), WriteOrigin::Raw)
        .unwrap();

    assert!(tos.store().get_user(2).unwrap().is_some());
    assert!(!tos.staff().is_skipped(2).unwrap());
}

#[test]
fn test_initialize_warms_staff_index() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(RedbTermsStore::open(temp_dir.path().join("tos.redb")).unwrap());
    store.put_user(&User::new(3, "ops").with_staff(true)).unwrap();

    let tos = TermsOfService::new(store, Arc::new(MemoryCache::default()), GateConfig::default());
    assert!(!tos.staff().is_skipped(3).unwrap());

    tos.initialize().unwrap();
    assert!(tos.staff().is_skipped(3).unwrap());
}

#[test]
fn test_end_to_end_reacceptance() {
    let (tos, _temp) = open_tos(GateConfig::default());
    let d1 = tos.publish("v1").unwrap();
    tos.save_user(&User::new(7, "user7"), WriteOrigin::Save).unwrap();
    let mut session = SessionData::authenticated(7, "password");

    let outcome = tos.gate().evaluate(&get("/"), &mut session).unwrap();
    assert!(matches!(outcome.decision, GateDecision::RedirectToAcceptance { .. }));

    let agreement = tos.accept(7).unwrap();
    assert_eq!(agreement.document_id, d1.id);
    assert!(tos.has_user_agreed_latest(7).unwrap());
    assert!(tos.gate().evaluate(&get("/"), &mut session).unwrap().is_allowed());

    let d2 = tos.publish("v2").unwrap();
    assert_eq!(tos.current_document().unwrap().unwrap().id, d2.id);
    assert!(!tos.has_user_agreed_latest(7).unwrap());

    let outcome = tos.gate().evaluate(&get("/"), &mut session).unwrap();
    assert!(!outcome.is_allowed());

    let user = tos.store().get_user(7).unwrap().unwrap();
    let d1 = tos.store().get_document(d1.id).unwrap().unwrap();
    assert_eq!(agreement.describe(&user, &d1), format!("user7 agreed to TOS: {}: inactive", d1.created));
}

#[test]
fn test_first_publish_without_initialize_forces_reacceptance() {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = TempDir::new().unwrap();
    let tos = TermsOfService::open(temp_dir.path().join("tos.redb"), GateConfig::default()).unwrap();

    let d1 = Document::new("v1", true);
    tos.load_documents_raw(std::slice::from_ref(&d1)).unwrap();
    tos.save_user(&User::new(7, "user7"), WriteOrigin::Raw).unwrap();
    tos.accept(7).unwrap();

    // Verdict cached before any counter exists
    let mut session = SessionData::authenticated(7, "password");
    let outcome = tos.gate().evaluate(&get("/"), &mut session).unwrap();
    assert_eq!(outcome.path, DecisionPath::StoreLookup);
    assert!(outcome.is_allowed());
    assert_eq!(tos.cache().counter(keys::KEY_VERSION).unwrap(), None);

    tos.publish("v2").unwrap();
    assert!(!tos.has_user_agreed_latest(7).unwrap());

    let outcome = tos.gate().evaluate(&get("/"), &mut session).unwrap();
    assert_eq!(outcome.path, DecisionPath::StoreLookup);
    assert!(!outcome.is_allowed());
}

#[derive(Debug, Clone)]
enum Op {
    Publish,
    Activate(usize),
    Deactivate(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Publish),
        (0usize..8).prop_map(Op::Activate),
        (0usize..8).prop_map(Op::Deactivate),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_exactly_one_active(ops in prop::collection::vec(op_strategy(), 1..20)) {
        let (tos, _temp) = open_tos(GateConfig::default());
        let mut ids = Vec::new();

        for op in ops {
            match op {
                Op::Publish => ids.push(tos.publish("revision").unwrap().id),
                _ if ids.is_empty() => {}
                Op::Activate(i) => {
                    let id = ids[i % ids.len()];
                    let mut doc = tos.store().get_document(id).unwrap().unwrap();
                    doc.active = true;
                    tos.save_document(&mut doc, WriteOrigin::Save).unwrap();
                }
                Op::Deactivate(i) => {
                    let id = ids[i % ids.len()];
                    let mut doc = tos.store().get_document(id).unwrap().unwrap();
                    doc.active = false;
                    // Rejected when it would leave nothing active
                    let _ = tos.save_document(&mut doc, WriteOrigin::Save);
                }
            }

            if !ids.is_empty() {
                let active = tos.list_documents().unwrap().iter().filter(|d| d.active).count();
                prop_assert_eq!(active, 1);
            }
        }
    }
}
