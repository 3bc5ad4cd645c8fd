// ==========================================
// 容量账本性质测试
// ==========================================
// 测试目标:
// - 容量不变式: in_use + reserved <= capacity
// - 库存不变式: 0 <= available <= contained
// - 预留往返、拣选往返
// - 同一货品的拣选预留/撤销任意交错时,队列与格口账本保持一致
// ==========================================


use pod_storage_alloc::domain::CAPACITY_EPSILON;
use pod_storage_alloc::engine::{NoOpEventPublisher, SharedRandomizer};
use pod_storage_alloc::{Compartment, CompartmentId, ExtractRequest, InsertRequest, Placement, Pod, PodId};
use proptest::prelude::*;
use std::sync::Arc;
use test_helpers::{bundle, item};

/// 账本操作
#[derive(Debug, Clone)]
enum LedgerOp {
    /// 预留并提交 (batch id 由序号生成)
    Insert { compartment: u32, item: u32, count: u32 },
    /// 只预留
    Reserve { compartment: u32, item: u32, count: u32 },
    /// 拣选预留
    ReservePick { item: u32 },
    /// 撤销第 n 个未完成的拣选预留
    ReleasePick { nth: usize },
    /// 完成第 n 个未完成的拣选预留
    CompletePick { nth: usize },
    /// 直接出库
    DirectRemove { item: u32 },
}

fn ledger_op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        (0u32..3, 1u32..3, 1u32..6).prop_map(|(compartment, item, count)| LedgerOp::Insert {
            compartment,
            item,
            count
        }),
        (0u32..3, 1u32..3, 1u32..6).prop_map(|(compartment, item, count)| LedgerOp::Reserve {
            compartment,
            item,
            count
        }),
        (1u32..3).prop_map(|item| LedgerOp::ReservePick { item }),
        (0usize..8).prop_map(|nth| LedgerOp::ReleasePick { nth }),
        (0usize..8).prop_map(|nth| LedgerOp::CompletePick { nth }),
        (1u32..3).prop_map(|item| LedgerOp::DirectRemove { item }),
    ]
}

fn assert_compartment_invariants(compartment: &Compartment) {
    assert!(
        compartment.capacity_in_use() + compartment.capacity_reserved()
            <= compartment.capacity() + CAPACITY_EPSILON,
        "capacity invariant broken: {:?}",
        compartment
    );
    for item in compartment.item_descriptions_contained() {
        let stock = compartment.stock(*item);
        assert!(stock.available <= stock.contained, "stock invariant broken: {:?}", compartment);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// 任意操作序列后账本不变式成立,拣选队列与格口一致
    #[test]
    fn prop_ledger_invariants_hold(ops in prop::collection::vec(ledger_op(), 1..60), seed in any::<u64>()) {
        let randomizer = SharedRandomizer::seeded(seed);
        let mut pod = Pod::new(PodId(0), &[20.0, 20.0, 20.0], randomizer, Arc::new(NoOpEventPublisher));
        let mut open_picks: Vec<ExtractRequest> = Vec::new();
        let mut next_bundle = 1u64;

        for op in ops {
            match op {
                LedgerOp::Insert { compartment, item: item_id, count } => {
                    let b = bundle(next_bundle, item_id, count);
                    next_bundle += 1;
                    let cid = CompartmentId(compartment);
                    if pod.compartment(cid).unwrap().fits_for_reservation(&b) {
                        pod.register_bundle(&b, cid).unwrap();
                        let mut request = InsertRequest::new(b.clone(), Placement::new(PodId(0), cid));
                        let before = pod.compartment(cid).unwrap().capacity_in_use();
                        prop_assert!(pod.add(cid, &b, &mut request).unwrap());
                        let after = pod.compartment(cid).unwrap();
                        prop_assert!((after.capacity_in_use() - before - b.bundle_weight()).abs() < 1e-9);
                        prop_assert!(after.capacity_reserved().abs() < 1e-9);
                    }
                }
                LedgerOp::Reserve { compartment, item: item_id, count } => {
                    let b = bundle(next_bundle, item_id, count);
                    next_bundle += 1;
                    let cid = CompartmentId(compartment);
                    if pod.compartment(cid).unwrap().fits_for_reservation(&b) {
                        pod.register_bundle(&b, cid).unwrap();
                        prop_assert!(!pod.compartment(cid).unwrap().fits_for_reservation(&b));
                    }
                }
                LedgerOp::ReservePick { item: item_id } => {
                    let mut request = ExtractRequest::new(item(item_id));
                    if pod.is_available(item(item_id).id) {
                        let contained = pod.count_contained(item(item_id).id);
                        pod.register_item_for_pick(item(item_id).id, &mut request).unwrap();
                        prop_assert_eq!(pod.count_contained(item(item_id).id), contained);
                        open_picks.push(request);
                    } else {
                        prop_assert!(pod.register_item_for_pick(item(item_id).id, &mut request).is_err());
                    }
                }
                LedgerOp::ReleasePick { nth } => {
                    if !open_picks.is_empty() {
                        let mut request = open_picks.remove(nth % open_picks.len());
                        let id = request.item().id;
                        let available = pod.count_available(id);
                        pod.unregister_item_for_pick(id, &mut request).unwrap();
                        prop_assert_eq!(pod.count_available(id), available + 1);
                    }
                }
                LedgerOp::CompletePick { nth } => {
                    if !open_picks.is_empty() {
                        let mut request = open_picks.remove(nth % open_picks.len());
                        let description = *request.item();
                        let contained = pod.count_contained(description.id);
                        let available = pod.count_available(description.id);
                        pod.remove(&description, &mut request).unwrap();
                        prop_assert_eq!(pod.count_contained(description.id), contained - 1);
                        prop_assert_eq!(pod.count_available(description.id), available);
                    }
                }
                LedgerOp::DirectRemove { item: item_id } => {
                    let description = item(item_id);
                    let mut request = ExtractRequest::new(description);
                    if pod.is_available(description.id) {
                        let available = pod.count_available(description.id);
                        pod.remove(&description, &mut request).unwrap();
                        prop_assert_eq!(pod.count_available(description.id), available - 1);
                    } else {
                        prop_assert!(pod.remove(&description, &mut request).is_err());
                    }
                }
            }

            for compartment in pod.compartments() {
                assert_compartment_invariants(compartment);
            }
            prop_assert!(pod.pick_reservations_consistent());
            let outstanding: usize = [1u32, 2]
                .iter()
                .map(|id| pod.pick_reservation_count(item(*id).id))
                .sum();
            prop_assert_eq!(outstanding, open_picks.len());
        }
    }

    /// 拣选往返: 预留后撤销恢复可用数,在库数不变
    #[test]
    fn prop_pick_roundtrip(count in 1u32..10, picks in 1usize..10, seed in any::<u64>()) {
        let randomizer = SharedRandomizer::seeded(seed);
        let mut pod = Pod::new(PodId(0), &[50.0, 50.0], randomizer, Arc::new(NoOpEventPublisher));
        for (idx, cid) in [CompartmentId(0), CompartmentId(1)].into_iter().enumerate() {
            let b = bundle(idx as u64 + 1, 1, count);
            pod.register_bundle(&b, cid).unwrap();
            let mut request = InsertRequest::new(b.clone(), Placement::new(PodId(0), cid));
            prop_assert!(pod.add(cid, &b, &mut request).unwrap());
        }

        let id = item(1).id;
        let picks = picks.min((count * 2) as usize);
        let mut requests: Vec<ExtractRequest> = (0..picks).map(|_| ExtractRequest::new(item(1))).collect();
        for request in requests.iter_mut() {
            pod.register_item_for_pick(id, request).unwrap();
        }
        prop_assert_eq!(pod.count_available(id), count * 2 - picks as u32);

        // 逆序撤销 (与预留顺序相反)
        for request in requests.iter_mut().rev() {
            pod.unregister_item_for_pick(id, request).unwrap();
            prop_assert!(pod.pick_reservations_consistent());
        }
        prop_assert_eq!(pod.count_available(id), count * 2);
        prop_assert_eq!(pod.count_contained(id), count * 2);
    }
}
